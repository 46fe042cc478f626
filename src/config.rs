use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GmailError, Result};

/// Largest page the Gmail list endpoint accepts
pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScanConfig {
    /// Messages requested per list page; `None` leaves it to the API default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub include_spam_trash: bool,
    /// Restrict the scan to messages carrying all of these label ids
    #[serde(default)]
    pub label_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Swallow failed sub-requests silently and omit the failure counters
    #[serde(default)]
    pub strict_compat: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_prefix: default_file_prefix(),
            top_n: default_top_n(),
            strict_compat: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
    #[serde(default = "default_min_count")]
    pub min_count: u64,
    #[serde(default = "default_sender_width")]
    pub sender_width: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            min_count: default_min_count(),
            sender_width: default_sender_width(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_file_prefix() -> String {
    "results_".to_string()
}

fn default_top_n() -> usize {
    10
}

fn default_min_count() -> u64 {
    100
}

fn default_sender_width() -> usize {
    100
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GmailError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    GmailError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GmailError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if let Some(page_size) = self.scan.page_size {
            if page_size == 0 {
                return Err(GmailError::ConfigError(
                    "scan.page_size must be at least 1".to_string(),
                ));
            }
            if page_size > MAX_PAGE_SIZE {
                return Err(GmailError::ConfigError(format!(
                    "scan.page_size cannot exceed {} (Gmail API limit)",
                    MAX_PAGE_SIZE
                )));
            }
        }

        if self.scan.label_ids.iter().any(|id| id.is_empty()) {
            return Err(GmailError::ConfigError(
                "scan.label_ids cannot contain empty strings".to_string(),
            ));
        }

        if self.report.top_n == 0 {
            return Err(GmailError::ConfigError(
                "report.top_n must be at least 1".to_string(),
            ));
        }

        if self.report.file_prefix.is_empty() {
            return Err(GmailError::ConfigError(
                "report.file_prefix cannot be empty".to_string(),
            ));
        }
        if self.report.file_prefix.contains(['/', '\\']) {
            return Err(GmailError::ConfigError(
                "report.file_prefix cannot contain path separators".to_string(),
            ));
        }

        if self.browser.sender_width == 0 {
            return Err(GmailError::ConfigError(
                "browser.sender_width must be at least 1".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}
