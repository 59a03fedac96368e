//! Selector-driven adapter for publishers that serve plain HTML.
//!
//! A listing page is scanned for article links with the `link` selector; an
//! article page yields its headline from `title`, its text from every element
//! matching `body`, and its lead image from the `og:image` meta tag (falling
//! back to the `image` selector or the first `<img>` in the body).

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use nf_core::config::SourceConfig;
use nf_core::source::SourceAdapter;
use nf_core::{ArticleReference, Error, FetchError, FetchFailure, ListingError, RawArticle, Result};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use crate::text::cut_at_markers;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

struct Selectors {
    link: Selector,
    title: Selector,
    body: Selector,
    image: Option<Selector>,
    og_image: Selector,
    img: Selector,
}

fn parse_selector(source: &str, selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| Error::Config(format!("source {source}: invalid selector {selector:?}: {e}")))
}

pub struct HtmlSourceAdapter {
    name: String,
    base_url: Url,
    client: Client,
    selectors: Selectors,
    link_filter: Option<String>,
    cut_markers: Vec<String>,
}

impl HtmlSourceAdapter {
    pub fn new(name: &str, config: &SourceConfig, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("source {name}: invalid base_url: {e}")))?;
        let selectors = Selectors {
            link: parse_selector(name, &config.selectors.link)?,
            title: parse_selector(name, &config.selectors.title)?,
            body: parse_selector(name, &config.selectors.body)?,
            image: config
                .selectors
                .image
                .as_deref()
                .map(|s| parse_selector(name, s))
                .transpose()?,
            og_image: parse_selector(name, r#"meta[property="og:image"]"#)?,
            img: parse_selector(name, "img[src]")?,
        };
        let client = Client::builder()
            .user_agent(config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            name: name.to_string(),
            base_url,
            client,
            selectors,
            link_filter: config.link_filter.clone(),
            cut_markers: config.cut_markers.clone(),
        })
    }

    fn extract_links(&self, page_url: &Url, html: &str) -> Vec<ArticleReference> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut references = Vec::new();
        for element in document.select(&self.selectors.link) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Ok(url) = page_url.join(href.trim()) else {
                continue;
            };
            if !matches!(url.scheme(), "http" | "https") {
                continue;
            }
            let url = url.to_string();
            if let Some(filter) = &self.link_filter {
                if !url.contains(filter.as_str()) {
                    continue;
                }
            }
            let title = element_text(element, " ");
            if title.is_empty() || !seen.insert(url.clone()) {
                continue;
            }
            references.push(ArticleReference::new(title, url));
        }
        references
    }

    fn extract_article(
        &self,
        reference: &ArticleReference,
        category: &str,
        page_url: &Url,
        html: &str,
    ) -> std::result::Result<RawArticle, FetchFailure> {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.selectors.title)
            .map(|el| element_text(el, " "))
            .find(|t| !t.is_empty())
            .unwrap_or_else(|| reference.title.clone());

        let body_elements: Vec<ElementRef> = document.select(&self.selectors.body).collect();
        let body = body_elements
            .iter()
            .map(|el| element_text(*el, " "))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let body = cut_at_markers(&body, &self.cut_markers);
        if body.trim().is_empty() {
            return Err(FetchFailure::EmptyBody);
        }

        let image = document
            .select(&self.selectors.og_image)
            .find_map(|el| el.value().attr("content"))
            .or_else(|| {
                let selector = self.selectors.image.as_ref()?;
                document.select(selector).find_map(|el| el.value().attr("src"))
            })
            .or_else(|| {
                body_elements
                    .iter()
                    .find_map(|el| el.select(&self.selectors.img).next())
                    .and_then(|img| img.value().attr("src"))
            })
            .filter(|src| !src.trim().is_empty())
            .and_then(|src| page_url.join(src.trim()).ok())
            .map(String::from);

        Ok(RawArticle {
            url: reference.url.clone(),
            title,
            body_text: body,
            image_url: image,
            source_name: self.name.clone(),
            category: category.to_string(),
            fetched_at: Utc::now(),
        })
    }
}

/// Element text with whitespace runs collapsed.
fn element_text(element: ElementRef<'_>, separator: &str) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(separator)
}

impl fmt::Debug for HtmlSourceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlSourceAdapter")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("client", &"<reqwest::Client>")
            .field("link_filter", &self.link_filter)
            .finish()
    }
}

#[async_trait]
impl SourceAdapter for HtmlSourceAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "debug", skip(self), fields(source = %self.name))]
    async fn list_articles(
        &self,
        category_path: &str,
    ) -> std::result::Result<Vec<ArticleReference>, ListingError> {
        let listing_error = |reason: String| ListingError::new(&self.name, category_path, reason);
        let page_url = self
            .base_url
            .join(category_path)
            .map_err(|e| listing_error(format!("invalid category path: {e}")))?;

        let response = self
            .client
            .get(page_url.clone())
            .send()
            .await
            .map_err(|e| listing_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(listing_error(format!("listing page returned {status}")));
        }
        let html = response
            .text()
            .await
            .map_err(|e| listing_error(e.to_string()))?;

        let references = self.extract_links(&page_url, &html);
        debug!(count = references.len(), url = %page_url, "Listed articles");
        Ok(references)
    }

    #[instrument(level = "debug", skip(self, reference), fields(source = %self.name, url = %reference.url))]
    async fn fetch_article(
        &self,
        reference: &ArticleReference,
        category: &str,
    ) -> std::result::Result<RawArticle, FetchError> {
        let url = &reference.url;
        let page_url =
            Url::parse(url).map_err(|_| FetchError::new(url, FetchFailure::ParseFailure))?;

        let response = self
            .client
            .get(page_url.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                url,
                FetchFailure::HttpError {
                    status: Some(status.as_u16()),
                },
            ));
        }
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        self.extract_article(reference, category, &page_url, &html)
            .map_err(|reason| FetchError::new(url, reason))
    }
}
