//! TopicTally - concurrent topic signal analyzer
//!
//! A CLI tool that fetches batches of web pages on a bounded worker pool,
//! extracts keyword or section-heading signals from each page, and reports
//! per-batch frequency tables.
//!
//! Exit codes:
//!   0 - Success (including batches where every page failed)
//!   1 - Runtime error (invalid config, worker pool failure, write failure)

mod analysis;
mod cli;
mod config;
mod dispatch;
mod fetcher;
mod models;
mod report;

use analysis::{Analyzer, TaskConfig};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use dispatch::Dispatcher;
use fetcher::HttpFetcher;
use models::{Report, ReportMetadata};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is loaded before logging so `[general] verbose` can set the level
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(args.log_level(config.general.verbose));

    info!("TopicTally v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    log_config_source(&source);

    if let Err(e) = run_analysis(args, config).await {
        error!("Analysis failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .topictally.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize batches, keywords, workers and timeouts.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete fetch-analyze-aggregate workflow.
async fn run_analysis(args: Args, config: Config) -> Result<()> {
    let start_time = Instant::now();

    config.validate()?;

    if args.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let workers = config
        .general
        .workers
        .unwrap_or_else(dispatch::default_workers);
    let deadline = config.general.deadline_seconds.map(Duration::from_secs);

    let fetcher = HttpFetcher::new(&config.fetch.user_agent).context("Failed to create HTTP client")?;
    let analyzer = Analyzer::new(Arc::new(fetcher), TaskConfig::from(&config));
    let dispatcher = Dispatcher::new(Arc::new(analyzer), workers)
        .with_deadline(deadline)
        .with_progress(!args.quiet);

    let total_pages: usize = config.batches.iter().map(|b| b.urls.len()).sum();
    println!("🌐 Fetching {} pages in {} batches...", total_pages, config.batches.len());
    println!("   Workers: {}", dispatcher.workers());
    println!("   Timeout: {}s per page", config.fetch.timeout_seconds);
    if let Some(deadline) = deadline {
        println!("   Deadline: {}s", deadline.as_secs());
    }

    let tasks = config.batches.iter().map(|b| b.tasks()).collect();
    let batch_results = dispatcher
        .run_batches(tasks)
        .await
        .context("Worker pool failed")?;

    println!("\n📝 Generating report...");

    let categories: Vec<_> = config
        .batches
        .iter()
        .zip(&batch_results)
        .map(|(batch, results)| {
            report::build_category_report(batch, results, config.analysis.max_label_len)
        })
        .collect();

    let pages_failed: usize = categories.iter().map(|c| c.pages_failed).sum();
    if pages_failed > 0 {
        warn!("{} of {} pages could not be analyzed", pages_failed, total_pages);
    }

    let duration = start_time.elapsed().as_secs_f64();
    let report = Report {
        metadata: ReportMetadata {
            analysis_date: Utc::now(),
            workers: dispatcher.workers(),
            pages_total: total_pages,
            pages_failed,
            duration_seconds: duration,
        },
        categories,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    std::fs::write(&config.general.output, &output)
        .with_context(|| format!("Failed to write report to {}", config.general.output))?;

    println!("\n📊 Analysis Summary:");
    for category in &report.categories {
        let leader = category
            .ranked
            .first()
            .map(|e| format!("{} ({})", e.label, e.count))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "   {}: {} signals, {} labels from {}/{} pages, most frequent: {}",
            category.title,
            category.frequencies.total(),
            category.frequencies.len(),
            category.pages - category.pages_failed,
            category.pages,
            leader
        );
    }
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        config.general.output
    );

    Ok(())
}

/// Handle --dry-run: list batches and pages, fetch nothing.
fn handle_dry_run(config: &Config) {
    println!("\n🔍 Dry run: no pages will be fetched.\n");
    println!("   Output: {}", config.general.output);
    println!("   Fetch timeout: {}s", config.fetch.timeout_seconds);
    println!("   Verbose: {}\n", config.general.verbose);

    for batch in &config.batches {
        let limit = batch
            .top_n
            .map(|n| format!("top {}", n))
            .unwrap_or_else(|| "all labels".to_string());
        println!("   📂 {} [{}, {}]", batch.title, batch.category, limit);
        for url in &batch.urls {
            println!("     🔗 {}", url);
        }
    }

    println!("\n✅ Dry run complete.");
}

/// Where the active configuration came from.
enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile,
    Builtin,
    Fallback(anyhow::Error),
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so the source is returned for logging later.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigSource::Builtin)),
        Err(e) => Ok((Config::default(), ConfigSource::Fallback(e))),
    }
}

fn log_config_source(source: &ConfigSource) {
    match source {
        ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
        ConfigSource::DefaultFile => info!("Loaded default config from {}", DEFAULT_CONFIG_FILE),
        ConfigSource::Builtin => debug!("No config file found, using defaults"),
        ConfigSource::Fallback(e) => warn!("Failed to load config, using defaults: {:#}", e),
    }
}
