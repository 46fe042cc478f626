//! Report snapshots: console summary and the per-run JSON file

use chrono::{DateTime, Local};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{GmailError, Result};
use crate::models::SenderStat;
use crate::stats::{AggregateState, FailurePolicy};

/// Keys starting with this prefix are summary fields, not senders
pub const SUMMARY_KEY_PREFIX: &str = "total_";
pub const FAILED_KEY: &str = "failed_messages";
pub const MALFORMED_KEY: &str = "malformed_messages";

const SENDER_COLUMN_WIDTH: usize = 50;
const RULE_WIDTH: usize = 80;

/// True for report entries that carry run totals rather than a sender.
///
/// The failure counters are plain numbers while sender entries are objects,
/// so a sender literally named `failed_messages` is still a sender.
pub fn is_summary_entry(key: &str, value: &serde_json::Value) -> bool {
    key.starts_with(SUMMARY_KEY_PREFIX)
        || ((key == FAILED_KEY || key == MALFORMED_KEY) && value.is_number())
}

/// First `width` characters of a sender string
pub fn truncate_sender(sender: &str, width: usize) -> String {
    sender.chars().take(width).collect()
}

pub fn format_size(size_mib: f64) -> String {
    format!("{:.2} MiB", size_mib)
}

/// Point-in-time view of the aggregate, senders sorted by size descending
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub total_messages: u64,
    pub total_senders: usize,
    pub total_size: f64,
    pub malformed_messages: Option<u64>,
    pub failed_messages: Option<u64>,
    pub senders: Vec<(String, SenderStat)>,
}

impl Report {
    pub fn snapshot(state: &AggregateState) -> Self {
        let (malformed_messages, failed_messages) = match state.policy() {
            FailurePolicy::Surface => (
                Some(state.malformed_messages()),
                Some(state.failed_messages()),
            ),
            FailurePolicy::Swallow => (None, None),
        };

        Self {
            total_messages: state.total_messages(),
            total_senders: state.total_senders(),
            total_size: state.total_size(),
            malformed_messages,
            failed_messages,
            senders: state
                .sorted_by_size()
                .into_iter()
                .map(|(sender, stat)| (sender.clone(), stat.clone()))
                .collect(),
        }
    }

    /// Console summary: totals followed by the `top_n` largest senders
    pub fn render_summary(&self, top_n: usize) -> String {
        let rule = "-".repeat(RULE_WIDTH);
        let mut lines = vec![format!("Top {} results:", top_n), rule.clone()];

        lines.push(format!("total_messages = {}", self.total_messages));
        lines.push(format!("total_senders = {}", self.total_senders));
        lines.push(format!("total_size = {}", format_size(self.total_size)));
        if let Some(malformed) = self.malformed_messages {
            lines.push(format!("{} = {}", MALFORMED_KEY, malformed));
        }
        if let Some(failed) = self.failed_messages {
            lines.push(format!("{} = {}", FAILED_KEY, failed));
        }

        for (sender, stat) in self.senders.iter().take(top_n) {
            lines.push(format!(
                "{:>50} | {:>4} | {:>7.2} MiB",
                truncate_sender(sender, SENDER_COLUMN_WIDTH),
                stat.count,
                stat.size
            ));
        }

        lines.push(rule);
        lines.join("\n")
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// Summary keys first, then one key per sender in size order
impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("total_messages", &self.total_messages)?;
        map.serialize_entry("total_senders", &self.total_senders)?;
        map.serialize_entry("total_size", &format_size(self.total_size))?;
        if let Some(malformed) = self.malformed_messages {
            map.serialize_entry(MALFORMED_KEY, &malformed)?;
        }
        if let Some(failed) = self.failed_messages {
            map.serialize_entry(FAILED_KEY, &failed)?;
        }
        for (sender, stat) in &self.senders {
            map.serialize_entry(sender, stat)?;
        }
        map.end()
    }
}

/// `<prefix><YYYY-MM-DD_HH:MM:SS>.json`
pub fn results_filename(prefix: &str, now: DateTime<Local>) -> String {
    format!("{}{}.json", prefix, now.format("%Y-%m-%d_%H:%M:%S"))
}

/// Pick a timestamped report path in `dir` that does not exist yet,
/// waiting for the clock to tick when the current second is taken.
pub async fn unique_results_path(dir: &Path, prefix: &str) -> Result<PathBuf> {
    loop {
        let path = dir.join(results_filename(prefix, Local::now()));
        if !tokio::fs::try_exists(&path).await? {
            return Ok(path);
        }
        debug!("{:?} already exists, waiting for a fresh timestamp", path);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// Writes every snapshot of one run to the same file
#[derive(Debug, Clone)]
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    /// Choose the run's output file. Creates `dir` if needed.
    pub async fn create(dir: &Path, prefix: &str) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            GmailError::ReportError(format!("Failed to create output directory {:?}: {}", dir, e))
        })?;
        let path = unique_results_path(dir, prefix).await?;
        Ok(Self { path })
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    /// Replace the file contents with `report`
    pub async fn write(&self, report: &Report) -> Result<()> {
        let json = report.to_json_pretty()?;
        let temp = self.temp_path();

        tokio::fs::write(&temp, json.as_bytes()).await.map_err(|e| {
            GmailError::ReportError(format!("Failed to write report {:?}: {}", temp, e))
        })?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            GmailError::ReportError(format!("Failed to replace report {:?}: {}", self.path, e))
        })?;

        debug!(
            "Wrote report with {} senders to {:?}",
            report.total_senders, self.path
        );
        Ok(())
    }
}
