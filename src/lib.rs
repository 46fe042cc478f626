//! Gmail sender statistics
//!
//! Walks every message of a Gmail account, fetches the `From` header of each
//! page in a single batch request, and keeps per-sender totals of message
//! count, size and labels. After every page the totals are written to a
//! timestamped JSON report, so an interrupted run still leaves the last
//! complete snapshot on disk. A small offline browser lists the senders of
//! a report that exceed a message-count threshold.
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_stats::{auth, collector::StatsRun, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("gmail-stats.toml".as_ref()).await?;
//!
//!     let client = auth::initialize_gmail_client(
//!         "client_secret.json".as_ref(),
//!         &auth::default_token_cache_path(),
//!     )
//!     .await?;
//!
//!     let summary = StatsRun::start(&client, &config).await?.run().await?;
//!     println!("{} senders", summary.total_senders);
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 installed flow and client construction
//! - [`batch`] - Gmail batch endpoint: multipart encoding and decoding
//! - [`browser`] - Offline report browser
//! - [`cli`] - Command-line interface and command orchestration
//! - [`client`] - Gmail API client trait and production implementation
//! - [`collector`] - Run context tying pagination, aggregation and reports together
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`models`] - Core data structures
//! - [`report`] - Report snapshots, console summary and file writer
//! - [`scanner`] - Message-list pagination and response classification
//! - [`stats`] - Per-sender aggregation

pub mod auth;
pub mod batch;
pub mod browser;
pub mod cli;
pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod models;
pub mod report;
pub mod scanner;
pub mod stats;

pub use client::GmailClient;
pub use collector::{RunSummary, StatsRun};
pub use config::Config;
pub use error::{GmailError, Result};
pub use models::{LabelIndex, MessageOutcome, SenderStat};
pub use report::{Report, ReportWriter};
pub use stats::AggregateState;
