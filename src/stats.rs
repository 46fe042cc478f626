//! Per-sender aggregation

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::models::{LabelIndex, MessageOutcome, SenderStat};

/// Divisor turning a byte estimate into MiB
pub const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

pub fn size_in_mib(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MIB
}

/// What to do with sub-requests that came back as errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Count them, log a warning and report `failed_messages`
    #[default]
    Surface,
    /// Drop them silently
    Swallow,
}

/// How the outcomes of one page were folded in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageTally {
    pub aggregated: u64,
    pub malformed: u64,
    pub failed: u64,
}

/// Running per-sender totals for one collection run
#[derive(Debug, Clone, Default)]
pub struct AggregateState {
    senders: HashMap<String, SenderStat>,
    total_messages: u64,
    malformed_messages: u64,
    failed_messages: u64,
    policy: FailurePolicy,
}

impl AggregateState {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Fold one outcome into the totals
    pub fn record(&mut self, outcome: MessageOutcome, labels: &LabelIndex, tally: &mut PageTally) {
        match outcome {
            MessageOutcome::Success(parsed) => {
                let size = size_in_mib(parsed.size_estimate);
                let label_names = labels.resolve(&parsed.label_ids);
                match self.senders.get_mut(&parsed.sender) {
                    Some(stat) => stat.add(size, label_names),
                    None => {
                        self.senders
                            .insert(parsed.sender, SenderStat::new(size, label_names));
                    }
                }
                self.total_messages += 1;
                tally.aggregated += 1;
            }
            MessageOutcome::Malformed {
                message_id,
                reason,
                dump,
            } => {
                warn!("{} (message {})\n{}", reason, message_id, dump);
                self.malformed_messages += 1;
                tally.malformed += 1;
            }
            MessageOutcome::Failed { message_id, error } => match self.policy {
                FailurePolicy::Surface => {
                    warn!("Failed to fetch message {}: {}", message_id, error);
                    self.failed_messages += 1;
                    tally.failed += 1;
                }
                FailurePolicy::Swallow => {}
            },
        }
    }

    /// Fold a whole page of outcomes, in order
    pub fn record_page(&mut self, outcomes: Vec<MessageOutcome>, labels: &LabelIndex) -> PageTally {
        let mut tally = PageTally::default();
        for outcome in outcomes {
            self.record(outcome, labels, &mut tally);
        }
        debug!(
            "Page folded: {} aggregated, {} malformed, {} failed",
            tally.aggregated, tally.malformed, tally.failed
        );
        tally
    }

    pub fn get(&self, sender: &str) -> Option<&SenderStat> {
        self.senders.get(sender)
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages
    }

    pub fn total_senders(&self) -> usize {
        self.senders.len()
    }

    /// Sum of all sender sizes, in MiB
    pub fn total_size(&self) -> f64 {
        self.senders.values().map(|s| s.size).sum()
    }

    pub fn malformed_messages(&self) -> u64 {
        self.malformed_messages
    }

    pub fn failed_messages(&self) -> u64 {
        self.failed_messages
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// All senders, largest size first; ties by count then sender
    pub fn sorted_by_size(&self) -> Vec<(&String, &SenderStat)> {
        let mut entries: Vec<_> = self.senders.iter().collect();
        entries.sort_by(|(a_name, a), (b_name, b)| {
            b.size
                .total_cmp(&a.size)
                .then_with(|| b.count.cmp(&a.count))
                .then_with(|| a_name.cmp(b_name))
        });
        entries
    }
}
