//! Roster-Sweep main entry point
//!
//! This is the command-line interface for the Roster-Sweep registry crawler.

use anyhow::{Context, Result};
use clap::Parser;
use roster_sweep::config::{load_config_with_hash, Config};
use roster_sweep::output::{parse_delimiter, print_report, write_delimited};
use roster_sweep::sites::SiteKind;
use roster_sweep::{CrawlOrchestrator, ShardKey};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Roster-Sweep: a cached, two-phase registry crawler
///
/// Roster-Sweep enumerates a professional registry's listing shard by
/// shard, fetches every entry's detail page, and writes the joined table
/// as delimited text. Finished work is cached, so an interrupted run picks
/// up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "roster-sweep")]
#[command(version = "1.0.0")]
#[command(about = "A cached, two-phase registry crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Crawl this site instead of the configured one
    #[arg(long, value_name = "NAME")]
    site: Option<String>,

    /// Write the table here instead of the configured path
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Use this cache root instead of the configured one
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    apply_overrides(&mut config, &cli);
    let site: SiteKind = config.site.parse()?;
    let shards = shard_keys(&config)?;

    if cli.dry_run {
        handle_dry_run(&config, site, &shards);
        return Ok(());
    }

    handle_crawl(&config, &shards).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("roster_sweep=info,warn"),
            1 => EnvFilter::new("roster_sweep=debug,info"),
            2 => EnvFilter::new("roster_sweep=trace,debug"),
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

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(site) = &cli.site {
        config.site = site.clone();
    }
    if let Some(output) = &cli.output {
        config.output.path = output.display().to_string();
    }
    if let Some(cache_dir) = &cli.cache_dir {
        config.cache.root = cache_dir.display().to_string();
    }
}

fn shard_keys(config: &Config) -> Result<Vec<ShardKey>> {
    config
        .shards
        .keys
        .iter()
        .map(|key| ShardKey::new(key.as_str()).with_context(|| format!("Invalid shard key '{}'", key)))
        .collect()
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config, site: SiteKind, shards: &[ShardKey]) {
    println!("=== Roster-Sweep Dry Run ===\n");

    println!("Site: {}", site);
    if let Some(base_url) = &config.base_url {
        println!("  Base URL: {}", base_url);
    }

    println!("\nCrawler Configuration:");
    println!("  Workers: {}", config.crawler.concurrency.workers());
    println!(
        "  Max subdivision depth: {}",
        config.crawler.max_subdivision_depth
    );
    println!(
        "  Jitter: {:.0}% chance of {}ms",
        config.crawler.jitter_probability * 100.0,
        config.crawler.jitter_ms
    );

    println!("\nRetry:");
    println!("  Delay: {}ms", config.retry.delay_ms);
    match config.retry.max_attempts.as_option() {
        Some(n) => println!("  Max attempts: {}", n),
        None => println!("  Max attempts: unbounded"),
    }
    if let Some(budget) = config.retry.budget_secs {
        println!("  Budget per fetch: {}s", budget);
    }

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nCache: {}", Path::new(&config.cache.root).join(site.name()).display());
    println!("Output: {} (delimiter {:?})", config.output.path, config.output.delimiter);

    println!("\nShards ({}):", shards.len());
    let keys: Vec<&str> = shards.iter().map(ShardKey::as_str).collect();
    println!("  {}", keys.join(" "));

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, shards: &[ShardKey]) -> Result<()> {
    let delimiter = parse_delimiter(&config.output.delimiter)?;
    let orchestrator =
        CrawlOrchestrator::from_config(config).context("Failed to set up the crawler")?;

    tracing::info!(
        "Starting crawl of {} with {} shards",
        orchestrator.site_name(),
        shards.len()
    );

    let (table, report) = orchestrator
        .crawl(shards)
        .await
        .context("Crawl failed")?;

    let output = Path::new(&config.output.path);
    write_delimited(&table, output, delimiter)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    print_report(&report);
    println!("\n✓ Table written to: {}", output.display());

    Ok(())
}
