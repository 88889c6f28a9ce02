//! Email delivery of rendered reports over SMTP.
//!
//! [`EmailNotifier`] is an explicitly-owned client object: configure it
//! once, thread a reference wherever reports with recipients run, and call
//! `send`/`send_blocking` with a result set. One message is sent per
//! recipient, all sharing the same attachment; the first transport failure
//! aborts the loop and propagates — there is no partial-success outcome.

use std::path::{Path, PathBuf};

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{
    AsyncSmtpTransport, AsyncTransport as _, Message, SmtpTransport, Tokio1Executor,
    Transport as _,
};
use sqlreporter_core::{
    NotifierStatus, ReportError, ReportFormat, ReportResultSet, Result,
};
use tracing::{debug, error, info, warn};

use crate::csv::{CsvOptions, export_csv};
use crate::html::{HtmlOptions, export_html};
use crate::output::OutputDirectory;

/// SMTP authentication credentials.
#[derive(Clone)]
pub struct SmtpCredentials {
    /// Account user name
    pub username: String,
    /// Account password or app token
    pub password: String,
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the password, even in debug output
        f.debug_struct("SmtpCredentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

impl SmtpCredentials {
    /// Creates credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Subject, body, and attachment settings for one send.
#[derive(Debug, Clone)]
pub struct MessageOptions {
    /// Message subject
    pub subject: String,
    /// Message body
    pub body: String,
    /// Send the body as `text/html` instead of plain text
    pub html_body: bool,
    /// Existing file to attach; generated from the report's output format
    /// when `None`
    pub attachment: Option<PathBuf>,
}

impl Default for MessageOptions {
    /// Dated subject, stock body, plain text, generated attachment.
    fn default() -> Self {
        Self {
            subject: format!(
                "Report Results - {}",
                chrono::Local::now().format("%Y-%m-%d")
            ),
            body: "A report has been generated and attached to this email for your viewing."
                .to_string(),
            html_body: false,
            attachment: None,
        }
    }
}

/// Checks whether a string parses as an email address.
///
/// This is the validation function used everywhere a recipient or from
/// address enters the system; parse failures are ordinary `None` results,
/// not faults.
pub fn parse_address(address: &str) -> Option<Mailbox> {
    address.trim().parse::<Mailbox>().ok()
}

/// SMTP client for report delivery.
///
/// Unconfigured by default: host blank, port 25, no credentials. It counts
/// as configured only once host/port have been customized, credentials are
/// set, and the from address parses — the same bar a report definition's
/// validity check applies through [`NotifierStatus`].
pub struct EmailNotifier {
    host: String,
    port: u16,
    credentials: Option<SmtpCredentials>,
    from_address: String,
    use_ssl: bool,
    sync_transport: Option<SmtpTransport>,
    async_transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl Default for EmailNotifier {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 25,
            credentials: None,
            from_address: String::new(),
            use_ssl: false,
            sync_transport: None,
            async_transport: None,
        }
    }
}

impl std::fmt::Debug for EmailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailNotifier")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("from_address", &self.from_address)
            .field("use_ssl", &self.use_ssl)
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl EmailNotifier {
    /// Creates an unconfigured notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the SMTP transport.
    ///
    /// `use_ssl` selects STARTTLS on the given port; without it the
    /// connection is plain text (suitable only for local relays). Returns
    /// whether the notifier is ready to send; transport build failures are
    /// logged and reported as `false`.
    pub fn configure(
        &mut self,
        host: &str,
        port: u16,
        credentials: SmtpCredentials,
        from_address: &str,
        use_ssl: bool,
    ) -> bool {
        self.host = host.trim().to_string();
        self.port = port;
        self.from_address = from_address.trim().to_string();
        self.credentials = Some(credentials);
        self.use_ssl = use_ssl;

        self.sync_transport = match self.build_sync_transport() {
            Ok(transport) => Some(transport),
            Err(e) => {
                error!(error = %e, "Failed to build SMTP transport");
                None
            }
        };
        self.async_transport = match self.build_async_transport() {
            Ok(transport) => Some(transport),
            Err(e) => {
                error!(error = %e, "Failed to build async SMTP transport");
                None
            }
        };

        self.is_configured() && self.sync_transport.is_some() && self.async_transport.is_some()
    }

    /// Whether the notifier can deliver mail.
    ///
    /// True only if host/port have been customized from the blank-host/25
    /// defaults, credentials are present, and the from address parses.
    pub fn is_configured(&self) -> bool {
        if self.host.trim().is_empty() && self.port == 25 {
            // No settings have been changed from the defaults
            return false;
        }

        if self.credentials.is_none() {
            return false;
        }

        parse_address(&self.from_address).is_some()
    }

    /// Emails the result set to every recipient on its definition.
    ///
    /// Without an explicit attachment one is generated through the
    /// exporter matching the definition's output format. Returns `true`
    /// only when every recipient's send succeeded.
    ///
    /// # Errors
    /// - `NoRecipients` if the definition has no usable recipients
    /// - `OutputFormatNotSet` / `UnsupportedFormat` when an attachment
    ///   cannot be generated for the definition's format
    /// - `Transport` on the first failed send; remaining recipients are
    ///   skipped
    pub async fn send(
        &self,
        result: &ReportResultSet,
        dir: &OutputDirectory,
        options: &MessageOptions,
    ) -> Result<bool> {
        let prepared = self.prepare(result, dir, options)?;
        let transport = self.async_transport.as_ref().ok_or_else(|| {
            ReportError::configuration("Email notifier transport is not configured")
        })?;

        for recipient in &prepared.recipients {
            let message = build_message(&prepared, recipient, options)?;
            transport.send(message).await.map_err(|e| {
                error!(
                    recipient = %recipient,
                    error = %e,
                    "Send failed; aborting remaining recipients"
                );
                ReportError::transport(format!("Failed to send to {}", recipient), e)
            })?;
            debug!(recipient = %recipient, "Report sent");
        }

        self.finish_send(result, &prepared);
        Ok(true)
    }

    /// Blocking variant of [`Self::send`], using the synchronous transport.
    pub fn send_blocking(
        &self,
        result: &ReportResultSet,
        dir: &OutputDirectory,
        options: &MessageOptions,
    ) -> Result<bool> {
        let prepared = self.prepare(result, dir, options)?;
        let transport = self.sync_transport.as_ref().ok_or_else(|| {
            ReportError::configuration("Email notifier transport is not configured")
        })?;

        for recipient in &prepared.recipients {
            let message = build_message(&prepared, recipient, options)?;
            transport.send(&message).map_err(|e| {
                error!(
                    recipient = %recipient,
                    error = %e,
                    "Send failed; aborting remaining recipients"
                );
                ReportError::transport(format!("Failed to send to {}", recipient), e)
            })?;
            debug!(recipient = %recipient, "Report sent");
        }

        self.finish_send(result, &prepared);
        Ok(true)
    }

    fn build_sync_transport(&self) -> Result<SmtpTransport> {
        let builder = if self.use_ssl {
            SmtpTransport::starttls_relay(&self.host)
                .map_err(|e| ReportError::transport("Failed to set up STARTTLS transport", e))?
        } else {
            SmtpTransport::builder_dangerous(&self.host)
        };

        Ok(builder
            .port(self.port)
            .credentials(self.lettre_credentials())
            .build())
    }

    fn build_async_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if self.use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
                .map_err(|e| ReportError::transport("Failed to set up STARTTLS transport", e))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
        };

        Ok(builder
            .port(self.port)
            .credentials(self.lettre_credentials())
            .build())
    }

    fn lettre_credentials(&self) -> Credentials {
        let credentials = self.credentials.clone().unwrap_or_else(|| {
            // Only reachable before configure(); the transport built from
            // this is unusable anyway
            SmtpCredentials::new("", "")
        });
        Credentials::new(credentials.username, credentials.password)
    }

    /// Everything shared by the sync and async send loops: recipient
    /// parsing, from-address validation, and attachment resolution.
    fn prepare(
        &self,
        result: &ReportResultSet,
        dir: &OutputDirectory,
        options: &MessageOptions,
    ) -> Result<PreparedMail> {
        let report = &result.report;
        if report.recipients.is_empty() {
            return Err(ReportError::NoRecipients);
        }

        let recipients = valid_recipients(&report.recipients);
        if recipients.is_empty() {
            return Err(ReportError::NoRecipients);
        }

        let from = parse_address(&self.from_address).ok_or_else(|| {
            ReportError::configuration("From address is missing or invalid")
        })?;

        let (attachment_path, generated) = match &options.attachment {
            Some(path) => (path.clone(), false),
            None => (generate_attachment(result, dir)?, true),
        };

        let attachment_bytes = std::fs::read(&attachment_path).map_err(|e| {
            ReportError::io(
                format!("Failed to read attachment {}", attachment_path.display()),
                e,
            )
        })?;

        let attachment_name = attachment_path
            .file_name()
            .map_or_else(|| "report".to_string(), |n| n.to_string_lossy().into_owned());
        let content_type = content_type_for(&attachment_path);

        Ok(PreparedMail {
            from,
            recipients,
            attachment_path,
            attachment_name,
            attachment_bytes,
            content_type,
            generated,
        })
    }

    /// Post-send bookkeeping: drop a generated attachment unless the
    /// definition asked to keep it on disk.
    fn finish_send(&self, result: &ReportResultSet, prepared: &PreparedMail) {
        if prepared.generated && !result.report.save_to_disk {
            if let Err(e) = std::fs::remove_file(&prepared.attachment_path) {
                warn!(
                    path = %prepared.attachment_path.display(),
                    error = %e,
                    "Failed to remove generated attachment"
                );
            }
        }

        info!(
            recipients = prepared.recipients.len(),
            report = %result.report.description(),
            "Report emailed"
        );
    }
}

impl NotifierStatus for EmailNotifier {
    fn is_configured(&self) -> bool {
        EmailNotifier::is_configured(self)
    }
}

struct PreparedMail {
    from: Mailbox,
    recipients: Vec<Mailbox>,
    attachment_path: PathBuf,
    attachment_name: String,
    attachment_bytes: Vec<u8>,
    content_type: ContentType,
    generated: bool,
}

/// Parses the usable recipients out of a raw address list, logging and
/// dropping blank or malformed entries.
pub fn valid_recipients(addresses: &[String]) -> Vec<Mailbox> {
    addresses
        .iter()
        .filter(|address| !address.trim().is_empty())
        .filter_map(|address| match parse_address(address) {
            Some(mailbox) => Some(mailbox),
            None => {
                warn!(address = %address, "Skipping unparseable recipient address");
                None
            }
        })
        .collect()
}

/// Renders the attachment for the definition's output format.
///
/// Spreadsheet and PDF delivery has no generation path; callers wanting
/// those formats export first and pass the file in
/// [`MessageOptions::attachment`].
fn generate_attachment(result: &ReportResultSet, dir: &OutputDirectory) -> Result<PathBuf> {
    match result.report.format {
        ReportFormat::Unset => Err(ReportError::OutputFormatNotSet),
        ReportFormat::Html => export_html(result, dir, &HtmlOptions::default()),
        ReportFormat::Csv => export_csv(result, dir, &CsvOptions::default()),
        ReportFormat::Xlsx | ReportFormat::Pdf => Err(ReportError::unsupported_format(
            result.report.format.to_string(),
        )),
    }
}

fn build_message(
    prepared: &PreparedMail,
    recipient: &Mailbox,
    options: &MessageOptions,
) -> Result<Message> {
    let body_type = if options.html_body {
        ContentType::TEXT_HTML
    } else {
        ContentType::TEXT_PLAIN
    };
    let body = SinglePart::builder()
        .header(body_type)
        .body(options.body.clone());

    let attachment = Attachment::new(prepared.attachment_name.clone()).body(
        prepared.attachment_bytes.clone(),
        prepared.content_type.clone(),
    );

    Message::builder()
        .from(prepared.from.clone())
        .to(recipient.clone())
        .subject(options.subject.clone())
        .multipart(MultiPart::mixed().singlepart(body).singlepart(attachment))
        .map_err(|e| ReportError::transport("Failed to build message", e))
}

fn content_type_for(path: &Path) -> ContentType {
    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html",
        Some("csv") => "text/csv",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    };
    ContentType::parse(mime).unwrap_or(ContentType::TEXT_PLAIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_by_default() {
        let notifier = EmailNotifier::new();
        assert!(!notifier.is_configured());
    }

    #[tokio::test]
    async fn test_configure_requires_valid_from_address() {
        let mut notifier = EmailNotifier::new();
        let configured = notifier.configure(
            "smtp.example.com",
            587,
            SmtpCredentials::new("user", "pass"),
            "not-an-address",
            false,
        );
        assert!(!configured);
        assert!(!notifier.is_configured());
    }

    #[tokio::test]
    async fn test_configure_with_full_settings() {
        let mut notifier = EmailNotifier::new();
        let configured = notifier.configure(
            "smtp.example.com",
            587,
            SmtpCredentials::new("user", "pass"),
            "noreply@example.com",
            false,
        );
        assert!(configured);
        assert!(notifier.is_configured());
    }

    #[test]
    fn test_default_host_and_port_do_not_count_as_configured() {
        let mut notifier = EmailNotifier::new();
        // Credentials and from address alone are not enough when host/port
        // are still the defaults
        notifier.credentials = Some(SmtpCredentials::new("user", "pass"));
        notifier.from_address = "noreply@example.com".to_string();
        assert!(!notifier.is_configured());

        // Any customized port flips the check
        notifier.port = 2525;
        assert!(notifier.is_configured());
    }

    #[test]
    fn test_parse_address() {
        assert!(parse_address("ops@example.com").is_some());
        assert!(parse_address("Ops Team <ops@example.com>").is_some());
        assert!(parse_address("nope").is_none());
        assert!(parse_address("").is_none());
    }

    #[test]
    fn test_valid_recipients_filters_bad_entries() {
        let addresses = vec![
            "a@example.com".to_string(),
            "   ".to_string(),
            "broken".to_string(),
            "b@example.com".to_string(),
        ];
        let recipients = valid_recipients(&addresses);
        assert_eq!(recipients.len(), 2);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = SmtpCredentials::new("user", "hunter2");
        let debug = format!("{:?}", credentials);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("****"));
    }
}
