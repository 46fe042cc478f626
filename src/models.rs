use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::GmailError;

/// Label as returned by the labels list endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
    /// `system` or `user`
    pub label_type: String,
}

/// Read-only mapping from label id to display name, built once per run
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    names: HashMap<String, String>,
}

impl LabelIndex {
    pub fn from_labels(labels: &[LabelInfo]) -> Self {
        let names = labels
            .iter()
            .map(|l| (l.id.clone(), l.name.clone()))
            .collect();
        Self { names }
    }

    pub fn name(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Map label ids to display names, keeping order and dropping ids the
    /// index does not know.
    pub fn resolve(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| match self.name(id) {
                Some(name) => Some(name.to_string()),
                None => {
                    tracing::debug!("Label id {} not present in label index", id);
                    None
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Per-sender totals. `size` is in MiB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderStat {
    pub count: u64,
    pub size: f64,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl SenderStat {
    pub fn new(size: f64, labels: Vec<String>) -> Self {
        let mut stat = Self {
            count: 1,
            size,
            labels: Vec::with_capacity(labels.len()),
        };
        stat.merge_labels(labels);
        stat
    }

    /// Count one more message of `size` MiB carrying `labels`
    pub fn add(&mut self, size: f64, labels: Vec<String>) {
        self.count += 1;
        self.size += size;
        self.merge_labels(labels);
    }

    fn merge_labels(&mut self, labels: Vec<String>) {
        for label in labels {
            if !self.labels.contains(&label) {
                self.labels.push(label);
            }
        }
    }
}

/// One page of message ids from the list endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub message_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Parameters for a single list-endpoint request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page_token: Option<String>,
    pub page_size: Option<u32>,
    pub label_ids: Vec<String>,
    pub include_spam_trash: bool,
}

/// Sender metadata extracted from a well-formed metadata response
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    pub message_id: String,
    pub sender: String,
    /// Provider estimate in bytes
    pub size_estimate: u64,
    pub label_ids: Vec<String>,
}

/// Result of fetching and parsing one message of a page
#[derive(Debug)]
pub enum MessageOutcome {
    Success(ParsedMessage),
    Malformed {
        message_id: String,
        reason: String,
        /// Pretty-printed response, for the warning log
        dump: String,
    },
    Failed {
        message_id: String,
        error: GmailError,
    },
}

impl MessageOutcome {
    pub fn message_id(&self) -> &str {
        match self {
            MessageOutcome::Success(parsed) => &parsed.message_id,
            MessageOutcome::Malformed { message_id, .. } => message_id,
            MessageOutcome::Failed { message_id, .. } => message_id,
        }
    }
}
