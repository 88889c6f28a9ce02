//! Report execution.
//!
//! [`ReportRunner`] is the single pass that turns a [`ReportDefinition`]
//! into a [`ReportResultSet`]: validate, health-check the connection, probe
//! the column schema, buffer every row, attach elapsed time. Failures are
//! logged with the report's description and re-raised; nothing is retried
//! here — retry policy belongs to the caller.

use std::time::Instant;

use tracing::{debug, error, info};

use crate::connection::ReportConnection;
use crate::error::{ReportError, Result};
use crate::models::{
    ColumnDescriptor, ReportDefinition, ReportResultSet, ResultRow, format_parameters,
};
use crate::runtime;

/// Live view of whether report delivery is possible.
///
/// Implemented by the email notifier in `sqlreporter-export`; the runner
/// consults it at validation time so toggling notifier configuration
/// changes a definition's validity on the next run, not retroactively.
pub trait NotifierStatus {
    /// Whether the notifier is ready to send mail.
    fn is_configured(&self) -> bool;
}

/// Executes report definitions against a [`ReportConnection`].
///
/// A runner is a cheap, short-lived view: construct one per run, pointing
/// it at the connection and (when the report has recipients) the notifier.
pub struct ReportRunner<'a> {
    connection: &'a mut ReportConnection,
    notifier: Option<&'a dyn NotifierStatus>,
}

impl<'a> ReportRunner<'a> {
    /// Creates a runner with no notifier; reports with recipients will fail
    /// validation.
    pub fn new(connection: &'a mut ReportConnection) -> Self {
        Self {
            connection,
            notifier: None,
        }
    }

    /// Attaches the notifier consulted during validity checks.
    #[must_use]
    pub fn with_notifier(mut self, notifier: &'a dyn NotifierStatus) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Runs a single report and returns its fully populated result set.
    ///
    /// # Errors
    /// - `InvalidReport` if the definition fails validation (checked before
    ///   any I/O)
    /// - `ConnectionUnavailable` if the connection cannot be opened
    /// - `Database` for failures during the schema probe, execution, or row
    ///   iteration; these are logged and re-raised, never swallowed
    pub async fn run(&mut self, report: &ReportDefinition) -> Result<ReportResultSet> {
        let notifier_configured = self.notifier.is_some_and(|n| n.is_configured());
        report.validate(notifier_configured)?;

        if !self.connection.check_healthy().await {
            return Err(ReportError::connection_unavailable(format!(
                "health check failed before running {}",
                report.description()
            )));
        }

        let parameters = format_parameters(&report.parameters);
        if !parameters.is_empty() {
            debug!(report = %report.description(), "{}", parameters);
        }

        let started = Instant::now();
        let outcome = self.execute(report).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok((columns, rows)) => {
                info!(
                    report = %report.description(),
                    columns = columns.len(),
                    rows = rows.len(),
                    elapsed_ms,
                    "Report completed"
                );
                Ok(ReportResultSet {
                    report: report.clone(),
                    columns,
                    rows,
                    elapsed_ms,
                })
            }
            Err(e) => {
                error!(
                    report = %report.description(),
                    elapsed_ms,
                    error = %e,
                    "Report failed"
                );
                Err(e)
            }
        }
    }

    /// Blocking variant of [`Self::run`].
    pub fn run_blocking(&mut self, report: &ReportDefinition) -> Result<ReportResultSet> {
        runtime::block_on(self.run(report))?
    }

    /// Schema probe first, then the full fetch — columns are always
    /// established before any row is read.
    async fn execute(
        &self,
        report: &ReportDefinition,
    ) -> Result<(Vec<ColumnDescriptor>, Vec<ResultRow>)> {
        let client = self.connection.client()?;

        let columns = client.describe(report).await?;
        let rows = client.fetch_rows(report).await?;

        Ok((columns, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubNotifier {
        configured: bool,
    }

    impl NotifierStatus for StubNotifier {
        fn is_configured(&self) -> bool {
            self.configured
        }
    }

    #[tokio::test]
    async fn test_invalid_report_fails_before_connection() {
        // The connection is unconfigured; a blank query must fail validation
        // first, without ever touching it.
        let mut connection = ReportConnection::new();
        let report = ReportDefinition::query("  ");

        let result = ReportRunner::new(&mut connection).run(&report).await;
        assert!(matches!(result, Err(ReportError::InvalidReport { .. })));
    }

    #[tokio::test]
    async fn test_unconfigured_connection_is_unavailable() {
        let mut connection = ReportConnection::new();
        let report = ReportDefinition::query("SELECT 1");

        let result = ReportRunner::new(&mut connection).run(&report).await;
        assert!(matches!(
            result,
            Err(ReportError::ConnectionUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_recipients_without_notifier_fail_validation() {
        let mut connection = ReportConnection::new();
        let report = ReportDefinition::query("SELECT 1")
            .with_recipients(vec!["ops@example.com".to_string()]);

        let result = ReportRunner::new(&mut connection).run(&report).await;
        assert!(matches!(result, Err(ReportError::InvalidReport { .. })));

        let unconfigured = StubNotifier { configured: false };
        let result = ReportRunner::new(&mut connection)
            .with_notifier(&unconfigured)
            .run(&report)
            .await;
        assert!(matches!(result, Err(ReportError::InvalidReport { .. })));
    }

    #[tokio::test]
    async fn test_configured_notifier_passes_validation() {
        // With a configured notifier the same definition gets past
        // validation and fails later, on the unconfigured connection.
        let mut connection = ReportConnection::new();
        let report = ReportDefinition::query("SELECT 1")
            .with_recipients(vec!["ops@example.com".to_string()]);

        let configured = StubNotifier { configured: true };
        let result = ReportRunner::new(&mut connection)
            .with_notifier(&configured)
            .run(&report)
            .await;
        assert!(matches!(
            result,
            Err(ReportError::ConnectionUnavailable { .. })
        ));
    }
}
