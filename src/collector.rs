//! One collection run: label index, pagination, aggregation and snapshots

use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::client::GmailClient;
use crate::config::Config;
use crate::error::Result;
use crate::models::{LabelIndex, MessageOutcome, MessagePage};
use crate::report::{Report, ReportWriter};
use crate::scanner::{classify_sub_response, MessagePager};
use crate::stats::{AggregateState, FailurePolicy, PageTally};

/// Final numbers of a finished run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub pages: usize,
    pub total_messages: u64,
    pub total_senders: usize,
    pub total_size: f64,
    pub malformed_messages: u64,
    pub failed_messages: u64,
    pub output_path: PathBuf,
    pub elapsed: Duration,
}

/// Fetch the label id to name mapping once
pub async fn load_label_index(client: &dyn GmailClient) -> Result<LabelIndex> {
    let labels = client.list_labels().await?;
    if labels.is_empty() {
        info!("No labels found.");
    }
    Ok(LabelIndex::from_labels(&labels))
}

/// State owned by a single stats run
pub struct StatsRun<'a> {
    client: &'a dyn GmailClient,
    config: &'a Config,
    labels: LabelIndex,
    stats: AggregateState,
    writer: ReportWriter,
    pages: usize,
    started: Instant,
}

impl<'a> StatsRun<'a> {
    /// Load labels and pick the output file for this run
    pub async fn start(client: &'a dyn GmailClient, config: &'a Config) -> Result<Self> {
        let labels = load_label_index(client).await?;
        debug!("Label index holds {} labels", labels.len());

        let writer =
            ReportWriter::create(&config.report.output_dir, &config.report.file_prefix).await?;
        debug!("Report file for this run: {:?}", writer.path());

        Ok(Self::with_parts(client, config, labels, writer))
    }

    pub fn with_parts(
        client: &'a dyn GmailClient,
        config: &'a Config,
        labels: LabelIndex,
        writer: ReportWriter,
    ) -> Self {
        let policy = if config.report.strict_compat {
            FailurePolicy::Swallow
        } else {
            FailurePolicy::Surface
        };

        Self {
            client,
            config,
            labels,
            stats: AggregateState::new(policy),
            writer,
            pages: 0,
            started: Instant::now(),
        }
    }

    /// Walk every page, writing a snapshot after each one.
    ///
    /// Any list or batch error aborts the run; the file keeps the last
    /// complete snapshot.
    pub async fn run(mut self) -> Result<RunSummary> {
        let client = self.client;
        let mut pages = MessagePager::new(client, &self.config.scan).into_stream();

        while let Some(page) = pages.next().await {
            self.process_page(page?).await?;
        }

        let summary = RunSummary {
            pages: self.pages,
            total_messages: self.stats.total_messages(),
            total_senders: self.stats.total_senders(),
            total_size: self.stats.total_size(),
            malformed_messages: self.stats.malformed_messages(),
            failed_messages: self.stats.failed_messages(),
            output_path: self.writer.path().to_path_buf(),
            elapsed: self.started.elapsed(),
        };
        info!(
            "Run complete: {} messages from {} senders in {} pages",
            summary.total_messages, summary.total_senders, summary.pages
        );
        Ok(summary)
    }

    /// Fetch, classify and fold one page, then print and persist the snapshot
    pub async fn process_page(&mut self, page: MessagePage) -> Result<PageTally> {
        let page_started = Instant::now();

        let outcomes: Vec<MessageOutcome> = self
            .client
            .batch_get_metadata(&page.message_ids)
            .await?
            .into_iter()
            .map(classify_sub_response)
            .collect();
        let tally = self.stats.record_page(outcomes, &self.labels);

        info!(
            "[{:04}] Elapsed (s) = {:<7.2} (+{:.2}) [messages = {}]",
            self.pages,
            self.started.elapsed().as_secs_f64(),
            page_started.elapsed().as_secs_f64(),
            self.stats.total_messages()
        );
        self.pages += 1;

        let report = self.snapshot();
        println!("{}", report.render_summary(self.config.report.top_n));
        self.writer.write(&report).await?;

        Ok(tally)
    }

    pub fn snapshot(&self) -> Report {
        Report::snapshot(&self.stats)
    }

    pub fn stats(&self) -> &AggregateState {
        &self.stats
    }

    pub fn output_path(&self) -> &std::path::Path {
        self.writer.path()
    }

    /// Console line naming the report file of this run
    pub fn saving_results_line(&self) -> String {
        format!("- Saving results with filename: {}", self.output_path().display())
    }
}
