use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use nf_collector::{init_logging, LogFormat, Pipeline, RunOutput};
use nf_core::config::{AppConfig, GroupingConfig};
use nf_core::storage::PersistenceGateway;
use nf_core::ProcessedArticle;
use nf_inference::SimilarityGrouper;
use nf_storage::{create_storage, StorageKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Interval such as `90`, `30m`, `1h15m` or `1d`. A bare number is seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut digits = String::new();
        let mut seen_number = false;

        for c in s.chars().filter(|c| !c.is_whitespace()) {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let value: u64 = digits
                .parse()
                .map_err(|_| format!("expected a number before '{c}'"))?;
            let unit = match c {
                's' => 1,
                'm' => 60,
                'h' => 3_600,
                'd' => 86_400,
                _ => return Err(format!("invalid duration unit: {c}")),
            };
            total_seconds = total_seconds.saturating_add(value.saturating_mul(unit));
            digits.clear();
            seen_number = true;
        }

        if !digits.is_empty() {
            let value: u64 = digits.parse().map_err(|_| "invalid number in duration")?;
            total_seconds = total_seconds.saturating_add(value);
            seen_number = true;
        }
        if !seen_number {
            return Err("duration must include a number".to_string());
        }
        if total_seconds == 0 {
            return Err("duration must be positive".to_string());
        }
        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Collects news articles and folds duplicate coverage into stories", long_about = None)]
struct Cli {
    /// YAML configuration with sources and tuning
    #[arg(long, global = true, default_value = "newsfold.yaml")]
    config: PathBuf,
    #[arg(long, global = true, value_enum, default_value_t = StorageKind::Memory)]
    storage: StorageKind,
    /// Database file for the sqlite backend
    #[arg(long, global = true, default_value = "newsfold.db")]
    database: PathBuf,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fetch, group and store articles from every configured source
    Collect {
        /// Repeat the run with this interval (e.g. 1h, 30m, 1h15m30s)
        #[arg(long)]
        interval: Option<HumanDuration>,
        /// Write the run report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
        #[arg(long)]
        max_in_flight: Option<usize>,
        #[command(flatten)]
        grouping: GroupingArgs,
    },
    /// List configured sources and their categories
    Sources,
    /// Group a JSON array of processed articles and print the result
    Group {
        #[arg(long)]
        input: PathBuf,
        #[command(flatten)]
        grouping: GroupingArgs,
    },
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct GroupingArgs {
    /// Neighborhood radius in cosine distance
    #[arg(long)]
    eps: Option<f64>,
    #[arg(long)]
    min_samples: Option<usize>,
}

impl GroupingArgs {
    fn apply(self, config: &mut GroupingConfig) -> Result<()> {
        if let Some(eps) = self.eps {
            config.eps = eps;
        }
        if let Some(min_samples) = self.min_samples {
            config.min_samples = min_samples;
        }
        config.validate()?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        config: config_path,
        storage,
        database,
        log_format,
        command,
    } = Cli::parse();
    init_logging(log_format);

    match command {
        Commands::Collect {
            interval,
            report,
            max_in_flight,
            grouping,
        } => {
            let mut config = load_config(&config_path)?;
            if let Some(max_in_flight) = max_in_flight {
                if max_in_flight == 0 {
                    bail!("--max-in-flight must be at least 1");
                }
                config.scheduler.max_in_flight = max_in_flight;
            }
            grouping.apply(&mut config.grouping)?;
            let storage = create_storage(storage, &database)
                .await
                .with_context(|| format!("failed to open {storage:?} storage"))?;
            collect(&config, storage, interval, report.as_deref()).await
        }
        Commands::Sources => {
            let config = load_config(&config_path)?;
            for (name, source) in &config.sources {
                println!("{name} ({})", source.base_url);
                for (category, paths) in &source.categories {
                    println!("  {category}: {}", paths.paths().join(", "));
                }
            }
            Ok(())
        }
        Commands::Group { input, grouping } => {
            let mut config = if config_path.exists() {
                load_config(&config_path)?.grouping
            } else {
                GroupingConfig::default()
            };
            grouping.apply(&mut config)?;
            group_file(&input, config)
        }
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let config = AppConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    info!(
        sources = config.sources.len(),
        path = %path.display(),
        "📰 Configuration loaded"
    );
    Ok(config)
}

async fn collect(
    config: &AppConfig,
    storage: Arc<dyn PersistenceGateway>,
    interval: Option<HumanDuration>,
    report_path: Option<&Path>,
) -> Result<()> {
    let pipeline = Pipeline::from_config(config, storage)?;
    info!(sources = pipeline.sources().len(), "🦗 Collector ready");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current run");
            on_signal.cancel();
        }
    });

    loop {
        let output = pipeline.run(&cancel).await;
        if let Some(path) = report_path {
            write_report(&output, path, interval.is_some())?;
        }
        if output.report.cancelled {
            break;
        }
        let Some(HumanDuration(every)) = interval else {
            break;
        };
        info!(seconds = every.as_secs(), "Waiting before next run");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(every) => {}
        }
    }
    Ok(())
}

/// In periodic mode a failed write is logged and the loop goes on.
fn write_report(output: &RunOutput, path: &Path, periodic: bool) -> Result<()> {
    match output.report.write_json(path) {
        Ok(()) => {
            info!(path = %path.display(), "Run report written");
            Ok(())
        }
        Err(e) if periodic => {
            error!(path = %path.display(), error = %e, "Failed to write run report");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("failed to write report to {}", path.display())),
    }
}

fn group_file(input: &Path, config: GroupingConfig) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let articles: Vec<ProcessedArticle> =
        serde_json::from_str(&raw).context("input must be a JSON array of processed articles")?;
    let grouping = SimilarityGrouper::new(config).group(articles);
    println!("{}", serde_json::to_string_pretty(&grouping)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_human_durations() {
        let parse = |s: &str| s.parse::<HumanDuration>().map(|d| d.0.as_secs());
        assert_eq!(parse("90"), Ok(90));
        assert_eq!(parse("30m"), Ok(1_800));
        assert_eq!(parse("1h15m30s"), Ok(4_530));
        assert_eq!(parse("1d"), Ok(86_400));
        assert!(parse("").is_err());
        assert!(parse("h").is_err());
        assert!(parse("5w").is_err());
        assert!(parse("0s").is_err());
    }

    #[test]
    fn cli_accepts_collect_overrides() {
        let cli = Cli::try_parse_from([
            "newsfold",
            "--log-format",
            "json",
            "collect",
            "--interval",
            "1h",
            "--eps",
            "0.4",
            "--max-in-flight",
            "4",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Collect {
                interval,
                max_in_flight,
                grouping,
                ..
            } => {
                assert_eq!(interval, Some(HumanDuration(Duration::from_secs(3_600))));
                assert_eq!(max_in_flight, Some(4));
                assert_eq!(grouping.eps, Some(0.4));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn grouping_overrides_are_validated() {
        let mut config = GroupingConfig::default();
        let args = GroupingArgs {
            eps: Some(-1.0),
            min_samples: None,
        };
        assert!(args.apply(&mut config).is_err());
    }
}
