//! Command-line interface

use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::auth::{self, DEFAULT_CLIENT_SECRET_FILE};
use crate::browser;
use crate::client::{GmailClient, ProductionGmailClient};
use crate::collector::{RunSummary, StatsRun};
use crate::config::Config;
use crate::error::{GmailError, Result};
use crate::models::LabelInfo;

#[derive(Parser, Debug)]
#[command(name = "gmail-stats")]
#[command(version = "0.1.0")]
#[command(about = "Per-sender message count and size statistics for a Gmail account", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "gmail-stats.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 client secret file
    #[arg(long, default_value = DEFAULT_CLIENT_SECRET_FILE)]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value_os_t = auth::default_token_cache_path())]
    pub token_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Defaults to `collect`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Collect per-sender statistics into a timestamped JSON report
    Collect,

    /// Browse a previously written report for high-volume senders
    Browse,

    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// List the account's labels
    Labels,

    /// Generate example configuration file
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "gmail-stats.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Collect)
    }
}

pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        Self {
            multi,
            spinner_style,
        }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        eprintln!("  ✓ {}", msg);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(MultiProgress::new())
    }
}

async fn authenticate(cli: &Cli, reporter: &ProgressReporter) -> Result<ProductionGmailClient> {
    let spinner = reporter.add_spinner("Authenticating with Gmail API...");
    let client = auth::initialize_gmail_client(&cli.credentials, &cli.token_cache).await;
    match &client {
        Ok(_) => reporter.finish_spinner(&spinner, "Gmail API authenticated successfully"),
        Err(_) => spinner.finish_and_clear(),
    }
    client
}

/// Run a full collection and return its final numbers
pub async fn run_collect(cli: &Cli, multi: MultiProgress) -> Result<RunSummary> {
    let reporter = ProgressReporter::new(multi);
    let config = Config::load(&cli.config).await?;

    let client = authenticate(cli, &reporter).await?;

    let spinner = reporter.add_spinner("Loading labels...");
    let run = StatsRun::start(&client, &config).await;
    spinner.finish_and_clear();
    let run = run?;

    // Printed only once the spinner line is gone
    println!("{}", run.saving_results_line());
    run.run().await
}

/// Offline report browser; needs no credentials
pub async fn run_browse(cli: &Cli) -> Result<()> {
    let config = Config::load(&cli.config).await?;
    browser::run_browser(&config.browser, &config.report.file_prefix).await
}

/// Authenticate (optionally discarding the cached token) and return the
/// connected account address
pub async fn run_auth(cli: &Cli, force: bool, multi: MultiProgress) -> Result<String> {
    if force && cli.token_cache.exists() {
        tokio::fs::remove_file(&cli.token_cache).await?;
        info!("Removed existing token cache");
    }

    let reporter = ProgressReporter::new(multi);
    let client = authenticate(cli, &reporter).await?;
    client.email_address().await
}

/// Fetch the labels and print them as a table
pub async fn print_labels(cli: &Cli, multi: MultiProgress) -> Result<()> {
    let reporter = ProgressReporter::new(multi);
    let client = authenticate(cli, &reporter).await?;

    let spinner = reporter.add_spinner("Loading labels...");
    let labels = client.list_labels().await;
    spinner.finish_and_clear();

    println!("{}", format_label_table(&labels?));
    Ok(())
}

pub fn format_label_table(labels: &[LabelInfo]) -> String {
    if labels.is_empty() {
        return "No labels found.".to_string();
    }

    let rule = "-".repeat(79);
    let mut lines = vec!["Labels:".to_string(), rule.clone()];
    for label in labels {
        lines.push(format!("{:40} {:40} {:40}", label.id, label.name, label.label_type));
    }
    lines.push(rule);
    lines.join("\n")
}

/// Write a default configuration file, refusing to overwrite without `force`
pub async fn run_init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(GmailError::ConfigError(format!(
            "Configuration file already exists at {:?}. Use --force to overwrite.",
            output
        )));
    }
    Config::create_example(output).await
}

pub fn print_run_summary(summary: &RunSummary) {
    println!("\n========================================");
    println!("Collection Summary");
    println!("========================================");
    println!("Pages: {}", summary.pages);
    println!("Messages: {}", summary.total_messages);
    println!("Senders: {}", summary.total_senders);
    println!("Total size: {:.2} MiB", summary.total_size);
    if summary.malformed_messages > 0 {
        println!("Malformed messages skipped: {}", summary.malformed_messages);
    }
    if summary.failed_messages > 0 {
        println!("Failed messages: {}", summary.failed_messages);
    }
    println!("Elapsed: {:.2} s", summary.elapsed.as_secs_f64());
    println!("Report: {}", summary.output_path.display());
    println!("========================================");
}
