use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use clickdash::config::EngineConfig;
use clickdash::dashboard::{DashboardController, RenderPayload, RenderTarget, Renderer};
use clickdash::filters::FilterDimension;
use clickdash::prefs::FilePreferenceStore;
use clickdash::query::{HttpQueryApi, Summary};
use clickdash::series::share_of_total;
use clickdash::timerange::RelativeRange;
use clickdash::view::MetricMode;

/// Render link analytics from a stats API in the terminal.
#[derive(Debug, Parser)]
#[command(name = "clickdash")]
struct Cli {
    /// Relative range preset, e.g. last-7-days
    #[arg(long, default_value = "last-24-hours", conflicts_with_all = ["from", "to"])]
    range: String,

    /// Custom range start, e.g. "now-2h" or "2024-01-01"
    #[arg(long, requires = "to")]
    from: Option<String>,

    /// Custom range end, e.g. "now"
    #[arg(long, requires = "from")]
    to: Option<String>,

    /// Dimension filter as <dimension>=<value>, repeatable
    #[arg(long = "filter", value_name = "DIM=VALUE")]
    filters: Vec<String>,

    /// Show a dimension as a full table instead of a top-N chart
    #[arg(long, value_name = "DIM")]
    table: Vec<String>,

    /// Re-query every N seconds until interrupted
    #[arg(long, value_name = "SECS")]
    watch: Option<u64>,
}

/// Prints every panel the engine derives. Pixels, terminal-style.
struct ConsoleRenderer;

impl Renderer for ConsoleRenderer {
    fn render(&self, target: RenderTarget, _mode: MetricMode, payload: RenderPayload) {
        let heading = match target {
            RenderTarget::Dimension(dimension) => dimension.title().to_string(),
            RenderTarget::Time => "Over time".to_string(),
        };
        println!("\n== {heading} ==");

        match payload {
            RenderPayload::Series(series) => {
                for point in &series {
                    match share_of_total(&series, point) {
                        Some(share) => {
                            println!("  {:<30} {:>8}  {:>5.1}%", point.label, point.value, share * 100.0)
                        }
                        None => println!("  {:<30} {:>8}", point.label, point.value),
                    }
                }
            }
            RenderPayload::Compare { total, unique } => {
                for point in &total {
                    let unique_value = unique
                        .iter()
                        .find(|p| p.label == point.label)
                        .map_or(0, |p| p.value);
                    println!("  {:<30} {:>8} {:>8}", point.label, point.value, unique_value);
                }
            }
            RenderPayload::Table(rows) => {
                println!("  {:<30} {:>8} {:>8}", "value", "total", "unique");
                for row in rows {
                    println!("  {:<30} {:>8} {:>8}", row.label, row.total, row.unique);
                }
            }
        }
    }

    fn render_summary(&self, summary: &Summary) {
        println!(
            "\n{} clicks, {} unique, {} links",
            summary.clicks, summary.unique_clicks, summary.links
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Load configuration
    let config = EngineConfig::from_env()?;
    info!("Querying {}", config.api.base_url);

    let api = Arc::new(HttpQueryApi::new(&config)?);
    let prefs = Arc::new(FilePreferenceStore::open(&config.prefs_path));
    let dashboard = DashboardController::new(api, Arc::new(ConsoleRenderer), prefs);
    dashboard.start();

    for spec in &cli.filters {
        let (field, value) = spec
            .split_once('=')
            .with_context(|| format!("--filter expects <dimension>=<value>, got '{spec}'"))?;
        let dimension = parse_dimension(field)?;
        dashboard.begin_filter_edit(dimension).await;
        dashboard.add_filter(dimension, value).await;
        dashboard.commit_filter_edit(dimension).await;
    }

    for field in &cli.table {
        dashboard.toggle_view(parse_dimension(field)?).await;
    }

    // Apply the range; this issues the first query and renders.
    match (&cli.from, &cli.to) {
        (Some(from), Some(to)) => {
            dashboard.apply_custom_range(from, to).await?;
        }
        _ => {
            let range = RelativeRange::from_id(&cli.range)
                .with_context(|| format!("unknown range '{}'", cli.range))?;
            dashboard.apply_relative_range(range).await?;
        }
    }

    if let Some(secs) = cli.watch {
        if secs == 0 {
            bail!("--watch must be at least 1 second");
        }
        dashboard.set_auto_reload(Some(Duration::from_secs(secs))).await;
        info!("Watching; press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        dashboard.set_auto_reload(None).await;
    }

    Ok(())
}

fn parse_dimension(field: &str) -> Result<FilterDimension> {
    FilterDimension::from_field(field).with_context(|| {
        let known: Vec<_> = FilterDimension::ALL.iter().map(|d| d.field()).collect();
        format!("unknown dimension '{field}' (expected one of: {})", known.join(", "))
    })
}
