pub mod html;

use std::sync::Arc;

use nf_core::config::AppConfig;
use nf_core::source::SourceAdapter;
use nf_core::Result;

pub use self::html::HtmlSourceAdapter;

/// One configured source: its adapter plus the category paths to list,
/// in configuration order.
#[derive(Clone)]
pub struct SourceEntry {
    pub adapter: Arc<dyn SourceAdapter>,
    pub categories: Vec<(String, Vec<String>)>,
}

impl SourceEntry {
    pub fn new(adapter: Arc<dyn SourceAdapter>) -> Self {
        Self {
            adapter,
            categories: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: &str, paths: &[&str]) -> Self {
        self.categories.push((
            category.to_string(),
            paths.iter().map(|p| p.to_string()).collect(),
        ));
        self
    }

    pub fn name(&self) -> &str {
        self.adapter.name()
    }
}

impl std::fmt::Debug for SourceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceEntry")
            .field("adapter", &self.adapter.name())
            .field("categories", &self.categories)
            .finish()
    }
}

/// Builds an HTML adapter for every configured source.
pub fn sources_from_config(config: &AppConfig) -> Result<Vec<SourceEntry>> {
    let timeout = config.scheduler.request_timeout();
    config
        .sources
        .iter()
        .map(|(name, source)| {
            let adapter = HtmlSourceAdapter::new(name, source, timeout)?;
            let categories = source
                .categories
                .iter()
                .map(|(category, paths)| (category.clone(), paths.paths().to_vec()))
                .collect();
            Ok(SourceEntry {
                adapter: Arc::new(adapter),
                categories,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_one_entry_per_source_with_fan_in_paths() {
        let config = AppConfig::from_yaml_str(
            r#"
sources:
  yonhap:
    base_url: https://www.yna.co.kr
    categories:
      politics: /politics/all
      economy: [/economy/all, /economy/finance]
  hankyung:
    base_url: https://www.hankyung.com
    categories:
      economy: /economy
"#,
        )
        .unwrap();

        let entries = sources_from_config(&config).unwrap();
        let names: Vec<_> = entries.iter().map(SourceEntry::name).collect();
        assert_eq!(names, ["hankyung", "yonhap"]);
        assert_eq!(
            entries[1].categories,
            vec![
                (
                    "economy".to_string(),
                    vec!["/economy/all".to_string(), "/economy/finance".to_string()]
                ),
                ("politics".to_string(), vec!["/politics/all".to_string()]),
            ]
        );
    }
}
