//! Common test utilities and fixtures

#![allow(dead_code)]

use gmail_stats::batch::SubResponse;
use gmail_stats::client::GmailClient;
use gmail_stats::config::Config;
use gmail_stats::error::{GmailError, Result};
use gmail_stats::models::{LabelInfo, MessagePage, PageRequest};
use google_gmail1::api::Message;
use mockall::mock;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;

mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn list_labels(&self) -> Result<Vec<LabelInfo>>;
        async fn list_messages_page(&self, request: &PageRequest) -> Result<MessagePage>;
        async fn batch_get_metadata(&self, message_ids: &[String]) -> Result<Vec<SubResponse>>;
    }
}

pub const MIB: u64 = 1024 * 1024;

pub fn label(id: &str, name: &str) -> LabelInfo {
    LabelInfo {
        id: id.to_string(),
        name: name.to_string(),
        label_type: if id.starts_with("Label_") { "user" } else { "system" }.to_string(),
    }
}

pub fn default_labels() -> Vec<LabelInfo> {
    vec![
        label("INBOX", "INBOX"),
        label("UNREAD", "UNREAD"),
        label("Label_1", "Work"),
    ]
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn page(message_ids: &[&str], next: Option<&str>) -> MessagePage {
    MessagePage {
        message_ids: ids(message_ids),
        next_page_token: next.map(str::to_string),
    }
}

/// Metadata response as the API returns it for `metadataHeaders=From`
pub fn metadata_message(id: &str, from: &str, size_estimate: u64, label_ids: &[&str]) -> Message {
    serde_json::from_value(json!({
        "id": id,
        "threadId": format!("thread_{}", id),
        "labelIds": label_ids,
        "sizeEstimate": size_estimate,
        "payload": {
            "headers": [{"name": "From", "value": from}]
        }
    }))
    .expect("valid message json")
}

/// Response with two From headers, which the collector skips
pub fn double_header_message(id: &str) -> Message {
    serde_json::from_value(json!({
        "id": id,
        "sizeEstimate": 100,
        "payload": {
            "headers": [
                {"name": "From", "value": "a@example.com"},
                {"name": "From", "value": "b@example.com"}
            ]
        }
    }))
    .expect("valid message json")
}

/// Canned per-id batch answers; unknown ids come back as 404 sub-responses
#[derive(Clone, Default)]
pub struct Mailbox {
    messages: HashMap<String, Message>,
    failing: HashMap<String, u16>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, from: &str, size_estimate: u64, label_ids: &[&str]) -> Self {
        self.messages
            .insert(id.to_string(), metadata_message(id, from, size_estimate, label_ids));
        self
    }

    pub fn with_message(mut self, id: &str, message: Message) -> Self {
        self.messages.insert(id.to_string(), message);
        self
    }

    pub fn failing(mut self, id: &str, status: u16) -> Self {
        self.failing.insert(id.to_string(), status);
        self
    }

    pub fn respond(&self, message_ids: &[String]) -> Vec<SubResponse> {
        message_ids
            .iter()
            .map(|id| {
                let result = match (self.failing.get(id), self.messages.get(id)) {
                    (Some(status), _) => Err(GmailError::from_status(
                        *status,
                        format!("HTTP {} for {}", status, id),
                    )),
                    (None, Some(message)) => Ok(message.clone()),
                    (None, None) => Err(GmailError::NotFound(id.clone())),
                };
                SubResponse {
                    message_id: id.clone(),
                    result,
                }
            })
            .collect()
    }
}

/// Config writing reports into `dir`
pub fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.report.output_dir = dir.to_path_buf();
    config
}

pub async fn read_report(path: &Path) -> serde_json::Map<String, serde_json::Value> {
    let content = tokio::fs::read_to_string(path).await.expect("report exists");
    serde_json::from_str(&content).expect("report is a JSON object")
}
