//! scholardock - Google Scholar literature harvester
//!
//! ## Usage
//!
//! ```bash
//! scholardock search "machine learning" --num-results 30 --start-year 2020
//! scholardock probe "https://scholar.google.com/scholar?q=test"
//! ```
//!
//! Settings are read from `SCHOLARDOCK_*` environment variables first;
//! command line flags override them.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scholardock::{HarvestConfig, HarvestSession, SearchQuery};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Google Scholar literature harvester
#[derive(Parser)]
#[command(name = "scholardock")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest result pages for a keyword
    Search {
        /// Search keywords
        keyword: String,

        /// Number of records to collect (1-1000)
        #[arg(short, long, default_value = "50")]
        num_results: usize,

        /// Results from this year onwards
        #[arg(long)]
        start_year: Option<i32>,

        /// Results up to this year
        #[arg(long)]
        end_year: Option<i32>,

        #[command(flatten)]
        session: SessionArgs,

        /// Write JSON records to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch one URL and report block status and entry count
    Probe {
        /// Page URL
        url: String,

        #[command(flatten)]
        session: SessionArgs,
    },
}

#[derive(clap::Args)]
struct SessionArgs {
    /// Proxy URL (e.g., http://127.0.0.1:7890)
    #[arg(long)]
    proxy: Option<String>,

    /// Mirror site URL
    #[arg(long)]
    mirror: Option<String>,

    /// Never open a browser for robot checks
    #[arg(long)]
    no_browser: bool,

    /// Run the fallback browser headless (no manual CAPTCHA solving)
    #[arg(long)]
    headless: bool,

    /// Chrome/Chromium executable
    #[arg(long)]
    browser_path: Option<PathBuf>,

    /// Save the first page here when it has no entries
    #[arg(long)]
    debug_html: Option<PathBuf>,
}

impl SessionArgs {
    fn into_config(self) -> Result<HarvestConfig> {
        let mut config = HarvestConfig::from_env().context("Invalid SCHOLARDOCK_* environment")?;
        if let Some(proxy) = self.proxy {
            config.proxy = Some(proxy);
        }
        if let Some(mirror) = self.mirror {
            config.base_url = mirror.trim_end_matches('/').to_string();
        }
        if self.no_browser {
            config.browser.enabled = false;
        }
        if self.headless {
            config.browser.headless = true;
        }
        if let Some(path) = self.browser_path {
            config.browser.executable = Some(path);
        }
        if let Some(path) = self.debug_html {
            config.debug_html_path = Some(path);
        }
        Ok(config)
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.json_logs {
        fmt().json().with_env_filter(filter).with_writer(std::io::stderr).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Search {
            keyword,
            num_results,
            start_year,
            end_year,
            session,
            output,
        } => {
            let query = SearchQuery::new(keyword, num_results, start_year, end_year)
                .context("Invalid search")?;
            run_search(query, session.into_config()?, output).await
        }
        Commands::Probe { url, session } => run_probe(&url, session.into_config()?).await,
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run_search(query: SearchQuery, config: HarvestConfig, output: Option<PathBuf>) -> Result<()> {
    let records = HarvestSession::run(config, &query)
        .await
        .context("Harvest failed")?;

    if records.is_empty() {
        info!("No results. The index may be blocking requests, or nothing matched.");
    }

    let json = serde_json::to_string_pretty(&records).context("Failed to serialize records")?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved {} records to {}", records.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn run_probe(url: &str, config: HarvestConfig) -> Result<()> {
    let session = HarvestSession::open(config).context("Failed to open session")?;
    let probe = session.probe(url).await;
    session.close().await;
    let probe = probe.context("Probe failed")?;

    println!("URL:     {}", probe.url);
    println!("Bytes:   {}", probe.bytes);
    println!("Blocked: {}", probe.blocked);
    println!("Entries: {}", probe.entries);
    Ok(())
}
