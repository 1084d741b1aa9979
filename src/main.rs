//! Spider-Scraper main entry point
//!
//! This is the command-line interface for the Spider-Scraper sitemap crawler.

use anyhow::{bail, Context};
use clap::Parser;
use spider_scraper::config::{load_config_with_hash, validate, Config, DomainScope};
use spider_scraper::output::{
    load_sitemap_entries, load_statistics, print_statistics, write_export, ExportFormat,
    SqliteSink,
};
use spider_scraper::storage::{SqliteStorage, Storage};
use spider_scraper::{Coordinator, CrawlState};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Spider-Scraper: A polite recursive sitemap crawler
///
/// Spider-Scraper crawls a site breadth-first from a seed URL while
/// respecting robots.txt and politeness delays, records every page in
/// SQLite and exports the result as an XML, HTML or CSV sitemap.
#[derive(Parser, Debug)]
#[command(name = "spider-scraper")]
#[command(version = "1.0.0")]
#[command(about = "A polite recursive sitemap crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the seed URL from the configuration
    #[arg(long, value_name = "URL")]
    seed: Option<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics of the latest run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Export the latest run as a sitemap (xml, html or csv) and exit
    #[arg(long, value_name = "FORMAT", conflicts_with_all = ["dry_run", "stats"])]
    export: Option<ExportFormat>,

    /// Where to write the export (default: sitemap.<format>)
    #[arg(long, value_name = "PATH", requires = "export")]
    export_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(seed) = cli.seed {
        config.crawl.seed_url = seed;
        validate(&config).context("Invalid --seed")?;
    }

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if let Some(format) = cli.export {
        let path = cli
            .export_path
            .unwrap_or_else(|| PathBuf::from(format!("sitemap.{}", format.extension())));
        handle_export(&config, format, &path)
    } else {
        handle_crawl(config, &config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("spider_scraper=info,warn"),
            1 => EnvFilter::new("spider_scraper=debug,info"),
            2 => EnvFilter::new("spider_scraper=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_storage(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.output.database_path);
    SqliteStorage::new(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Spider-Scraper Dry Run ===\n");

    println!("Crawl:");
    println!("  Seed: {}", config.crawl.seed_url);
    println!("  Max depth: {}", config.crawl.max_depth);
    match config.crawl.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: unlimited"),
    }
    println!("  Concurrency: {}", config.crawl.concurrency);
    if let Some(secs) = config.crawl.max_duration_secs {
        println!("  Max duration: {}s", secs);
    }

    println!("\nFetch:");
    println!("  User agent: {}", config.fetch.user_agent);
    if !config.fetch.user_agents.is_empty() {
        println!("  Rotating user agents: {}", config.fetch.user_agents.len());
    }
    println!("  Timeout: {}ms", config.fetch.timeout_ms);
    println!("  Max attempts: {}", config.fetch.max_attempts);
    println!("  Proxies: {}", config.fetch.proxies.len());

    println!("\nPoliteness:");
    println!("  Respect robots.txt: {}", config.robots.respect);
    println!(
        "  Delay: {}-{}ms",
        config.rate_limit.min_delay_ms, config.rate_limit.max_delay_ms
    );

    println!("\nFilters:");
    let scope = match &config.filters.domain {
        DomainScope::Any => "any host".to_string(),
        DomainScope::ExactHost { host } => {
            format!("exact host {}", host.as_deref().unwrap_or("(seed host)"))
        }
        DomainScope::Subdomains { host } => {
            format!("{} and subdomains", host.as_deref().unwrap_or("(seed host)"))
        }
        DomainScope::Pattern { pattern } => format!("hosts matching /{}/", pattern),
    };
    println!("  Domain: {}", scope);
    if !config.filters.allow_extensions.is_empty() {
        println!("  Allowed extensions: {}", config.filters.allow_extensions.join(", "));
    }
    if !config.filters.deny_extensions.is_empty() {
        println!("  Denied extensions: {}", config.filters.deny_extensions.join(", "));
    }
    if !config.filters.include_keywords.is_empty() {
        println!("  Include keywords: {}", config.filters.include_keywords.join(", "));
    }
    if !config.filters.exclude_keywords.is_empty() {
        println!("  Exclude keywords: {}", config.filters.exclude_keywords.join(", "));
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    // Builds the filter, robots guard and HTTP clients without fetching anything
    let coordinator = Coordinator::new(config.clone())?;

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling at {}", coordinator.seed());

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes the latest run as a sitemap
fn handle_export(config: &Config, format: ExportFormat, path: &Path) -> anyhow::Result<()> {
    println!("=== Exporting Sitemap ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {} ({})", path.display(), format);
    println!();

    let storage = open_storage(config)?;
    let entries = load_sitemap_entries(&storage)?;
    if entries.is_empty() {
        bail!("The latest run has no fetched pages to export");
    }

    write_export(&entries, format, path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✓ Exported {} pages to: {}", entries.len(), path.display());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config)?;

    let mut storage = open_storage(coordinator.config())?;
    let run_id = storage.create_run(config_hash, coordinator.seed().as_str())?;
    tracing::info!("Recording run {} to {}", run_id, coordinator.config().output.database_path);

    let storage: Arc<Mutex<dyn Storage>> = Arc::new(Mutex::new(storage));
    let sink = Arc::new(SqliteSink::new(storage, run_id));

    let handle = coordinator.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping crawl");
            if let Err(e) = handle.abort() {
                tracing::debug!("Interrupt ignored: {}", e);
            }
        }
    });

    let state = coordinator.run(sink.clone()).await?;

    if sink.write_errors() > 0 {
        tracing::warn!("{} crawl events could not be recorded", sink.write_errors());
    }

    match state {
        CrawlState::Completed => tracing::info!("Crawl completed successfully"),
        _ => tracing::warn!("Crawl stopped early ({})", state),
    }

    Ok(())
}
