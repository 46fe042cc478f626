//! End-to-end collection runs against a mocked Gmail client

mod common;

use common::*;
use gmail_stats::collector::StatsRun;
use gmail_stats::error::GmailError;
use gmail_stats::models::LabelIndex;
use gmail_stats::report::ReportWriter;
use tempfile::TempDir;

fn two_page_client(mailbox: Mailbox) -> MockGmailClient {
    let mut client = MockGmailClient::new();
    client
        .expect_list_labels()
        .times(1)
        .returning(|| Ok(default_labels()));
    client
        .expect_list_messages_page()
        .withf(|req| req.page_token.is_none())
        .times(1)
        .returning(|_| Ok(page(&["m1", "m2"], Some("p2"))));
    client
        .expect_list_messages_page()
        .withf(|req| req.page_token.as_deref() == Some("p2"))
        .times(1)
        .returning(|_| Ok(page(&["m3"], None)));
    client
        .expect_batch_get_metadata()
        .times(2)
        .returning(move |ids| Ok(mailbox.respond(ids)));
    client
}

#[tokio::test]
async fn test_multi_page_run_aggregates_all_pages() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let client = two_page_client(
        Mailbox::new()
            .with("m1", "Alice <alice@example.com>", MIB, &["INBOX"])
            .with("m2", "bob@example.com", 2 * MIB, &[])
            .with("m3", "Alice <alice@example.com>", MIB, &["Label_1", "INBOX"]),
    );

    let run = StatsRun::start(&client, &config).await.unwrap();
    let output = run.output_path().to_path_buf();
    let summary = run.run().await.unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.total_messages, 3);
    assert_eq!(summary.total_senders, 2);
    assert!((summary.total_size - 4.0).abs() < 1e-9);
    assert_eq!(summary.output_path, output);

    let report = read_report(&output).await;
    assert_eq!(report["total_messages"], 3);
    assert_eq!(report["total_senders"], 2);
    assert_eq!(report["total_size"], "4.00 MiB");
    assert_eq!(report["failed_messages"], 0);

    let alice = &report["Alice <alice@example.com>"];
    assert_eq!(alice["count"], 2);
    assert_eq!(alice["size"], 2.0);
    assert_eq!(alice["labels"], serde_json::json!(["INBOX", "Work"]));

    let bob = &report["bob@example.com"];
    assert_eq!(bob["count"], 1);
    assert_eq!(bob["labels"], serde_json::json!([]));
}

#[tokio::test]
async fn test_report_senders_sorted_by_size() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let client = two_page_client(
        Mailbox::new()
            .with("m1", "small@example.com", 10, &[])
            .with("m2", "large@example.com", 5 * MIB, &[])
            .with("m3", "medium@example.com", MIB, &[]),
    );

    let run = StatsRun::start(&client, &config).await.unwrap();
    let output = run.output_path().to_path_buf();
    run.run().await.unwrap();

    let report = read_report(&output).await;
    let senders: Vec<&str> = report
        .iter()
        .filter(|(k, v)| !gmail_stats::report::is_summary_entry(k, v))
        .map(|(k, _)| k.as_str())
        .collect();
    assert_eq!(
        senders,
        vec!["large@example.com", "medium@example.com", "small@example.com"]
    );
}

#[tokio::test]
async fn test_malformed_message_is_skipped() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let client = two_page_client(
        Mailbox::new()
            .with("m1", "alice@example.com", MIB, &[])
            .with_message("m2", double_header_message("m2"))
            .with("m3", "alice@example.com", MIB, &[]),
    );

    let run = StatsRun::start(&client, &config).await.unwrap();
    let output = run.output_path().to_path_buf();
    let summary = run.run().await.unwrap();

    assert_eq!(summary.total_messages, 2);
    assert_eq!(summary.malformed_messages, 1);

    let report = read_report(&output).await;
    assert_eq!(report["total_messages"], 2);
    assert_eq!(report["total_senders"], 1);
    assert_eq!(report["malformed_messages"], 1);
    assert!(report.get("a@example.com").is_none());
}

#[tokio::test]
async fn test_failed_sub_requests_are_surfaced() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let client = two_page_client(
        Mailbox::new()
            .with("m1", "alice@example.com", MIB, &[])
            .failing("m2", 500)
            .with("m3", "bob@example.com", MIB, &[]),
    );

    let run = StatsRun::start(&client, &config).await.unwrap();
    let output = run.output_path().to_path_buf();
    let summary = run.run().await.unwrap();

    assert_eq!(summary.total_messages, 2);
    assert_eq!(summary.failed_messages, 1);
    assert_eq!(read_report(&output).await["failed_messages"], 1);
}

#[tokio::test]
async fn test_strict_compat_swallows_failures() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(dir.path());
    config.report.strict_compat = true;
    let client = two_page_client(
        Mailbox::new()
            .with("m1", "alice@example.com", MIB, &[])
            .failing("m2", 404)
            .with("m3", "bob@example.com", MIB, &[]),
    );

    let run = StatsRun::start(&client, &config).await.unwrap();
    let output = run.output_path().to_path_buf();
    let summary = run.run().await.unwrap();

    assert_eq!(summary.total_messages, 2);
    assert_eq!(summary.failed_messages, 0);

    let report = read_report(&output).await;
    assert!(report.get("failed_messages").is_none());
    assert!(report.get("malformed_messages").is_none());
    let keys: Vec<&str> = report.keys().map(String::as_str).take(3).collect();
    assert_eq!(keys, vec!["total_messages", "total_senders", "total_size"]);
}

#[tokio::test]
async fn test_start_leaves_console_output_to_caller() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    let mut client = MockGmailClient::new();
    client.expect_list_labels().returning(|| Ok(default_labels()));
    client.expect_list_messages_page().never();
    client.expect_batch_get_metadata().never();

    let run = StatsRun::start(&client, &config).await.unwrap();
    let line = run.saving_results_line();

    assert!(line.starts_with("- Saving results with filename: "));
    assert!(line.ends_with(&run.output_path().display().to_string()));
    assert!(run.output_path().starts_with(dir.path()));
}

#[tokio::test]
async fn test_list_error_aborts_and_keeps_last_snapshot() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let mailbox = Mailbox::new()
        .with("m1", "alice@example.com", MIB, &[])
        .with("m2", "bob@example.com", MIB, &[]);

    let mut client = MockGmailClient::new();
    client.expect_list_labels().returning(|| Ok(vec![]));
    client
        .expect_list_messages_page()
        .withf(|req| req.page_token.is_none())
        .times(1)
        .returning(|_| Ok(page(&["m1", "m2"], Some("p2"))));
    client
        .expect_list_messages_page()
        .withf(|req| req.page_token.is_some())
        .times(1)
        .returning(|_| {
            Err(GmailError::ServerError {
                status: 503,
                message: "backend unavailable".to_string(),
            })
        });
    client
        .expect_batch_get_metadata()
        .times(1)
        .returning(move |ids| Ok(mailbox.respond(ids)));

    let run = StatsRun::start(&client, &config).await.unwrap();
    let output = run.output_path().to_path_buf();
    let result = run.run().await;

    assert!(matches!(result, Err(GmailError::ServerError { status: 503, .. })));
    let report = read_report(&output).await;
    assert_eq!(report["total_messages"], 2);
}

#[tokio::test]
async fn test_batch_error_aborts_run() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    let mut client = MockGmailClient::new();
    client.expect_list_labels().returning(|| Ok(default_labels()));
    client
        .expect_list_messages_page()
        .times(1)
        .returning(|_| Ok(page(&["m1"], Some("p2"))));
    client
        .expect_batch_get_metadata()
        .times(1)
        .returning(|_| Err(GmailError::NetworkError("connection reset".to_string())));

    let run = StatsRun::start(&client, &config).await.unwrap();
    let output = run.output_path().to_path_buf();

    assert!(matches!(run.run().await, Err(GmailError::NetworkError(_))));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_empty_first_page_ends_run() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    let mut client = MockGmailClient::new();
    client.expect_list_labels().returning(|| Ok(default_labels()));
    client
        .expect_list_messages_page()
        .times(1)
        .returning(|_| Ok(page(&[], Some("ignored"))));
    client.expect_batch_get_metadata().never();

    let summary = StatsRun::start(&client, &config)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.pages, 0);
    assert_eq!(summary.total_messages, 0);
}

#[tokio::test]
async fn test_scan_config_flows_into_page_requests() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(dir.path());
    config.scan.page_size = Some(250);
    config.scan.label_ids = vec!["INBOX".to_string()];

    let mut client = MockGmailClient::new();
    client.expect_list_labels().returning(|| Ok(default_labels()));
    client
        .expect_list_messages_page()
        .withf(|req| {
            req.page_size == Some(250)
                && req.label_ids == vec!["INBOX".to_string()]
                && !req.include_spam_trash
        })
        .times(1)
        .returning(|_| Ok(page(&["m1"], None)));
    client
        .expect_batch_get_metadata()
        .withf(|ids| ids.len() == 1 && ids[0] == "m1")
        .times(1)
        .returning(|ids| Ok(Mailbox::new().with("m1", "a@example.com", 1, &[]).respond(ids)));

    let summary = StatsRun::start(&client, &config)
        .await
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(summary.pages, 1);
}

#[tokio::test]
async fn test_unknown_label_ids_are_dropped() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    let mut client = MockGmailClient::new();
    client.expect_list_labels().returning(|| Ok(vec![]));
    client
        .expect_list_messages_page()
        .returning(|_| Ok(page(&["m1"], None)));
    client.expect_batch_get_metadata().returning(|ids| {
        Ok(Mailbox::new()
            .with("m1", "a@example.com", MIB, &["INBOX", "Label_99"])
            .respond(ids))
    });

    let run = StatsRun::start(&client, &config).await.unwrap();
    let output = run.output_path().to_path_buf();
    run.run().await.unwrap();

    let report = read_report(&output).await;
    assert_eq!(report["a@example.com"]["labels"], serde_json::json!([]));
}

#[tokio::test]
async fn test_each_page_overwrites_same_file() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let mailbox = Mailbox::new()
        .with("m1", "a@example.com", MIB, &[])
        .with("m2", "b@example.com", MIB, &[])
        .with("m3", "c@example.com", MIB, &[]);

    let mut client = MockGmailClient::new();
    client.expect_list_labels().never();
    client.expect_list_messages_page().never();
    client
        .expect_batch_get_metadata()
        .times(2)
        .returning(move |ids| Ok(mailbox.respond(ids)));
    let path = dir.path().join("results_fixed.json");

    let mut run = StatsRun::with_parts(
        &client,
        &config,
        LabelIndex::from_labels(&default_labels()),
        ReportWriter::at(path.clone()),
    );

    run.process_page(page(&["m1", "m2"], Some("p2"))).await.unwrap();
    assert_eq!(read_report(&path).await["total_senders"], 2);

    run.process_page(page(&["m3"], None)).await.unwrap();
    let report = read_report(&path).await;
    assert_eq!(report["total_senders"], 3);
    assert_eq!(report["total_messages"], 3);

    let mut entries = std::fs::read_dir(dir.path()).unwrap();
    assert!(entries.next().is_some());
    assert!(entries.next().is_none(), "only the report file should exist");
}
