//! Offline browser for previously written report files

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::BrowserConfig;
use crate::error::{GmailError, Result};
use crate::models::SenderStat;
use crate::report::{is_summary_entry, truncate_sender};

/// Sender entries of a report file, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedReport {
    pub senders: Vec<(String, SenderStat)>,
}

impl LoadedReport {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)?;

        let senders = map
            .into_iter()
            .filter(|(key, value)| !is_summary_entry(key, value))
            .map(|(sender, value)| {
                serde_json::from_value::<SenderStat>(value)
                    .map(|stat| (sender.clone(), stat))
                    .map_err(|e| {
                        GmailError::ReportError(format!("Invalid entry for sender {:?}: {}", sender, e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { senders })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            GmailError::ReportError(format!("Failed to read report {:?}: {}", path, e))
        })?;
        Self::from_json_str(&content)
    }
}

/// Report files in `dir` whose name starts with `prefix`, sorted by name
pub async fn list_report_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        GmailError::ReportError(format!("Failed to read directory {:?}: {}", dir, e))
    })?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(prefix) && entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    debug!("Found {} report files in {:?}", files.len(), dir);
    Ok(files)
}

/// Resolve a selection index, or the most recent file when `choice` is `None`
pub fn select_file(files: &[PathBuf], choice: Option<usize>) -> Result<&PathBuf> {
    let last = files
        .len()
        .checked_sub(1)
        .ok_or_else(|| GmailError::ReportError("No report files to select from".to_string()))?;
    let index = choice.unwrap_or(last);

    files.get(index).ok_or_else(|| {
        GmailError::ReportError(format!(
            "Selection {} out of range (0..={})",
            index, last
        ))
    })
}

/// Senders with strictly more than `min_count` messages, most messages first
pub fn high_volume_senders(report: &LoadedReport, min_count: u64) -> Vec<(&str, u64)> {
    let mut senders: Vec<(&str, u64)> = report
        .senders
        .iter()
        .filter(|(_, stat)| stat.count > min_count)
        .map(|(sender, stat)| (sender.as_str(), stat.count))
        .collect();
    senders.sort_by(|a, b| b.1.cmp(&a.1));
    senders
}

pub fn format_sender_line(sender: &str, count: u64, width: usize) -> String {
    format!("{:>4} | {}", count, truncate_sender(sender, width))
}

/// Interactive browse: list files, prompt for one, print its high-volume senders
pub async fn run_browser(config: &BrowserConfig, prefix: &str) -> Result<()> {
    let files = list_report_files(&config.directory, prefix).await?;
    if files.is_empty() {
        println!("No results files found in {}", config.directory.display());
        return Ok(());
    }

    println!("Results files: (ID, Name)");
    for (i, file) in files.iter().enumerate() {
        println!("{:3} : {}", i, display_name(file));
    }

    let last = files.len() - 1;
    let choice = inquire::CustomType::<usize>::new("Enter selection file ID")
        .with_default(last)
        .with_error_message("Please enter a file ID")
        .prompt()
        .map_err(|e| GmailError::ReportError(format!("Selection aborted: {}", e)))?;

    let selected = select_file(&files, Some(choice))?;
    println!("Selected: ");
    println!("   {} : {}", choice, display_name(selected));
    println!("{}", "-".repeat(80));

    let report = LoadedReport::load(selected).await?;
    for (sender, count) in high_volume_senders(&report, config.min_count) {
        println!("{}", format_sender_line(sender, count, config.sender_width));
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
