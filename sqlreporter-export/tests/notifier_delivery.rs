//! Notifier behavior tests that stop short of a live SMTP server: error
//! paths, attachment generation, and the validity interplay with report
//! definitions.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use sqlreporter_core::{
    CellValue, ColumnDescriptor, ReportDefinition, ReportError, ReportFormat, ReportResultSet,
    ResultRow, SqlValue,
};
use sqlreporter_export::{
    EmailNotifier, MessageOptions, OutputDirectory, SmtpCredentials,
};

fn sample_result(format: ReportFormat, recipients: Vec<String>) -> ReportResultSet {
    ReportResultSet {
        report: ReportDefinition::query("SELECT Id FROM people")
            .with_format(format)
            .with_recipients(recipients),
        columns: vec![ColumnDescriptor {
            index: 0,
            name: "Id".to_string(),
            type_name: "INTEGER".to_string(),
        }],
        rows: vec![ResultRow {
            index: 0,
            values: vec![CellValue {
                row: 0,
                column: 0,
                value: SqlValue::Int(1),
            }],
        }],
        elapsed_ms: 4,
    }
}

/// Configured against a port nothing listens on, so transport-level sends
/// fail deterministically.
fn unreachable_notifier() -> EmailNotifier {
    let mut notifier = EmailNotifier::new();
    let configured = notifier.configure(
        "127.0.0.1",
        1,
        SmtpCredentials::new("user", "pass"),
        "noreply@example.com",
        false,
    );
    assert!(configured);
    notifier
}

fn output_dir(tmp: &tempfile::TempDir) -> OutputDirectory {
    let mut dir = OutputDirectory::new();
    dir.set(&tmp.path().display().to_string()).expect("set output dir");
    dir
}

#[tokio::test]
async fn send_requires_recipients() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = output_dir(&tmp);
    let notifier = unreachable_notifier();

    let result = sample_result(ReportFormat::Html, Vec::new());
    let sent = notifier.send(&result, &dir, &MessageOptions::default()).await;

    assert!(matches!(sent, Err(ReportError::NoRecipients)));
}

#[tokio::test]
async fn send_rejects_unset_format() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = output_dir(&tmp);
    let notifier = unreachable_notifier();

    let result = sample_result(ReportFormat::Unset, vec!["ops@example.com".to_string()]);
    let sent = notifier.send(&result, &dir, &MessageOptions::default()).await;

    assert!(matches!(sent, Err(ReportError::OutputFormatNotSet)));
}

#[tokio::test]
async fn send_rejects_formats_without_delivery_path() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = output_dir(&tmp);
    let notifier = unreachable_notifier();

    for format in [ReportFormat::Xlsx, ReportFormat::Pdf] {
        let result = sample_result(format, vec!["ops@example.com".to_string()]);
        let sent = notifier.send(&result, &dir, &MessageOptions::default()).await;
        assert!(matches!(sent, Err(ReportError::UnsupportedFormat { .. })));
    }
}

#[tokio::test]
async fn transport_failure_propagates_and_keeps_attachment() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = output_dir(&tmp);
    let notifier = unreachable_notifier();

    let result = sample_result(ReportFormat::Html, vec!["ops@example.com".to_string()]);
    let sent = notifier.send(&result, &dir, &MessageOptions::default()).await;

    assert!(matches!(sent, Err(ReportError::Transport { .. })));

    // The attachment was generated before the send attempt and survives
    // the failure
    let generated: Vec<_> = std::fs::read_dir(tmp.path())
        .expect("read dir")
        .filter_map(std::result::Result::ok)
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "html")
        })
        .collect();
    assert_eq!(generated.len(), 1);
}

#[tokio::test]
async fn explicit_attachment_bypasses_format_generation() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = output_dir(&tmp);
    let notifier = unreachable_notifier();

    let attachment = tmp.path().join("prebuilt.xlsx");
    std::fs::write(&attachment, b"workbook bytes").expect("write attachment");

    // Xlsx has no generation path, but an explicit attachment skips
    // generation entirely; the failure comes from the dead transport
    let result = sample_result(ReportFormat::Xlsx, vec!["ops@example.com".to_string()]);
    let options = MessageOptions {
        attachment: Some(attachment),
        ..MessageOptions::default()
    };
    let sent = notifier.send(&result, &dir, &options).await;

    assert!(matches!(sent, Err(ReportError::Transport { .. })));
}

#[tokio::test]
async fn blocking_send_matches_async_error_semantics() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = output_dir(&tmp);
    let notifier = unreachable_notifier();

    let result = sample_result(ReportFormat::Html, Vec::new());
    let sent = notifier.send_blocking(&result, &dir, &MessageOptions::default());
    assert!(matches!(sent, Err(ReportError::NoRecipients)));

    let result = sample_result(ReportFormat::Html, vec!["ops@example.com".to_string()]);
    let sent = notifier.send_blocking(&result, &dir, &MessageOptions::default());
    assert!(matches!(sent, Err(ReportError::Transport { .. })));
}

#[tokio::test]
async fn definition_validity_follows_notifier_configuration() {
    let report = ReportDefinition::query("SELECT 1")
        .with_recipients(vec!["ops@example.com".to_string()]);

    let mut notifier = EmailNotifier::new();
    assert!(!report.is_valid(notifier.is_configured()));

    notifier.configure(
        "smtp.example.com",
        587,
        SmtpCredentials::new("user", "pass"),
        "noreply@example.com",
        true,
    );
    assert!(report.is_valid(notifier.is_configured()));
}
