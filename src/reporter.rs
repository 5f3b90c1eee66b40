//! Dispatch orchestration: normalize the selected item, classify it, send
//! the report over the configured channel(s), and hand the caller a result
//! whose destructive move step stays pending until explicitly resolved.
//!
//! This is the single place where transport failures are caught; nothing
//! below it is allowed to escape a dispatch call as an error.

use crate::config::{ReportAction, Settings, Transport};
use crate::error::ReportError;
use crate::ews::{EwsClient, MoveMessageStatus};
use crate::http_report::{HttpReporter, HttpTransport};
use crate::mailbox::{MailItem, MailboxHost};
use crate::message::Message;
use crate::simulation;
use indexmap::IndexMap;
use log::{info, warn};

const SMTP_REJECTED: &str = "The mail server rejected the report email";

/// Aggregate outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    Success,
    /// Delivered, and the message was an awareness-simulation test.
    Simulation,
    Error,
}

/// What one dispatch produced.
///
/// `move_status` starts `Pending` on the fraud path and is resolved exactly
/// once, by [`Reporter::resolve_move`], after any blocking acknowledgment
/// shown to the user has been dismissed.
#[derive(Debug, Clone)]
pub struct ReportResult {
    pub status: ReportStatus,
    /// Failure summary for display. Populated only on `Error`; never embeds
    /// the reported message's content or headers.
    pub diagnosis: Option<String>,
    pub move_status: MoveMessageStatus,
    /// Action to apply when the move resolves.
    pub move_target: ReportAction,
    item_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportKind {
    Fraud,
    Spam,
}

impl ReportKind {
    fn subject_prefix(&self) -> &'static str {
        match self {
            ReportKind::Fraud => "Phishing Report",
            ReportKind::Spam => "Spam Report",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ReportKind::Fraud => "fraud",
            ReportKind::Spam => "spam",
        }
    }
}

/// The report dispatch engine.
///
/// One value serves many dispatches; each call receives its own `Settings`
/// snapshot and owns its `Message` and `ReportResult` exclusively.
pub struct Reporter<'a> {
    host: &'a dyn MailboxHost,
    transport: &'a dyn HttpTransport,
}

impl<'a> Reporter<'a> {
    pub fn new(host: &'a dyn MailboxHost, transport: &'a dyn HttpTransport) -> Self {
        Reporter { host, transport }
    }

    /// Turn the host item into the canonical report payload: HTML-coerced
    /// body from the host, raw MIME bytes and header map over the wire.
    pub async fn normalize(&self, item: &MailItem) -> Result<Message, ReportError> {
        let preview = self
            .host
            .body_html(item)
            .await
            .map_err(|e| ReportError::Fetch(e.to_string()))?;
        let fetched = EwsClient::new(self.host)
            .fetch_message(&item.item_id)
            .await
            .map_err(|e| ReportError::Fetch(e.to_string()))?;
        Ok(Message::assemble(
            item,
            self.host.user_email(),
            preview,
            fetched.raw,
            fetched.headers,
        ))
    }

    /// Report the item as phishing, with an optional reporter comment
    /// (empty string for none). Never fails; failures come back as a
    /// result with status `Error`.
    pub async fn report_fraud(
        &self,
        item: &MailItem,
        settings: &Settings,
        comment: &str,
    ) -> ReportResult {
        self.guarded_dispatch(item, settings, comment, ReportKind::Fraud)
            .await
    }

    /// Report the item as spam. Simulation messages delegate to the fraud
    /// flow; real spam goes out via SMTP only and is moved to junk right
    /// away, since no acknowledgment dialog outlasts this path.
    pub async fn report_spam(&self, item: &MailItem, settings: &Settings) -> ReportResult {
        self.guarded_dispatch(item, settings, "", ReportKind::Spam)
            .await
    }

    /// Perform the deferred move once UI sequencing permits.
    ///
    /// Idempotent: a result whose move already resolved comes back
    /// unchanged, without further network traffic.
    pub async fn resolve_move(&self, mut result: ReportResult) -> ReportResult {
        if result.move_status != MoveMessageStatus::Pending {
            return result;
        }
        let ews = EwsClient::new(self.host);
        result.move_status = match ews
            .move_message_to(&result.item_id, result.move_target)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                warn!("Deferred move failed: {}", e);
                MoveMessageStatus::Error
            }
        };
        result
    }

    async fn guarded_dispatch(
        &self,
        item: &MailItem,
        settings: &Settings,
        comment: &str,
        kind: ReportKind,
    ) -> ReportResult {
        match self.dispatch(item, settings, comment, kind).await {
            Ok(result) => result,
            Err(e) => {
                warn!("{} report dispatch failed: {}", kind.label(), e);
                ReportResult {
                    status: ReportStatus::Error,
                    diagnosis: Some(e.to_string()),
                    move_status: MoveMessageStatus::Pending,
                    move_target: match kind {
                        ReportKind::Fraud => settings.report_action,
                        ReportKind::Spam => ReportAction::Junk,
                    },
                    item_id: item.item_id.clone(),
                }
            }
        }
    }

    async fn dispatch(
        &self,
        item: &MailItem,
        settings: &Settings,
        comment: &str,
        kind: ReportKind,
    ) -> Result<ReportResult, ReportError> {
        let message = self.normalize(item).await?;
        let is_simulation = simulation::belongs_to_simulation(&message.headers);
        info!(
            "Dispatching {} report for message {} ({})",
            kind.label(),
            item.item_id,
            if is_simulation { "simulation" } else { "real" }
        );

        if kind == ReportKind::Spam && !is_simulation {
            return self.dispatch_plain_spam(item, settings, &message).await;
        }

        // Fraud flow, also serving simulation messages reported as spam.
        let transport = if is_simulation {
            settings.simulation_transport
        } else {
            settings.phishing_transport
        };
        let comment = if comment.is_empty() {
            None
        } else {
            Some(comment)
        };
        let scenario = simulation::scenario_id(&message.headers);

        let mut http_ok: Option<bool> = None;
        let mut smtp_ok: Option<bool> = None;
        let mut smtp_failure: Option<ReportError> = None;

        // HTTP strictly before SMTP; callers' mocks depend on this order.
        if transport.uses_http() {
            let mut urls = if is_simulation {
                simulation::reporting_urls(&message.headers)
            } else {
                Vec::new()
            };
            if urls.is_empty() {
                // Missing or malformed simulation headers fall back to the
                // configured endpoint rather than blocking delivery.
                urls.push(settings.report_url()?);
            }
            let http = HttpReporter::new(self.transport);
            let sent = http
                .send_report(
                    &urls,
                    &message.reporter,
                    &message,
                    &request_headers(settings),
                    scenario.as_deref(),
                    comment,
                )
                .await;
            http_ok = Some(sent);
        }

        if transport.uses_smtp() {
            if settings.smtp_to.is_empty() {
                return Err(ReportError::Configuration(
                    "smtp_to is not configured".to_string(),
                ));
            }
            let subject = compose_subject(
                ReportKind::Fraud.subject_prefix(),
                &message.subject,
                settings.use_expressive_subject,
            );
            let ews = EwsClient::new(self.host);
            let sent = match ews
                .send_smtp_report(
                    &settings.smtp_to,
                    &subject,
                    settings.client_id,
                    &message,
                    &settings.extra_headers,
                    comment,
                )
                .await
            {
                Ok(sent) => sent,
                Err(e) => {
                    warn!("SMTP report failed: {}", e);
                    smtp_failure = Some(e);
                    false
                }
            };
            smtp_ok = Some(sent);
        }

        let success = http_ok.unwrap_or(true) && smtp_ok.unwrap_or(true);
        let status = if !success {
            ReportStatus::Error
        } else if is_simulation {
            ReportStatus::Simulation
        } else {
            ReportStatus::Success
        };
        let diagnosis = if success {
            None
        } else {
            Some(failure_diagnosis(http_ok, smtp_ok, smtp_failure))
        };

        let result = ReportResult {
            status,
            diagnosis,
            move_status: MoveMessageStatus::Pending,
            move_target: settings.report_action,
            item_id: item.item_id.clone(),
        };

        // A simulated phish reported through the spam entry point should
        // leave the inbox even under a keep policy. The deferred contract
        // stays untouched; this move is issued on top of it.
        if kind == ReportKind::Spam && settings.report_action == ReportAction::Keep {
            let ews = EwsClient::new(self.host);
            if let Err(e) = ews.move_message_to(&item.item_id, ReportAction::Junk).await {
                warn!("Forced junk move failed: {}", e);
            }
        }

        Ok(result)
    }

    /// Non-simulation spam: SMTP only, with the junk move resolved inline.
    async fn dispatch_plain_spam(
        &self,
        item: &MailItem,
        settings: &Settings,
        message: &Message,
    ) -> Result<ReportResult, ReportError> {
        if settings.phishing_transport == Transport::Http {
            return Err(ReportError::Configuration(
                "spam reports have no HTTP payload; an SMTP transport is required".to_string(),
            ));
        }
        if settings.smtp_to.is_empty() {
            return Err(ReportError::Configuration(
                "smtp_to is not configured".to_string(),
            ));
        }

        let subject = compose_subject(
            ReportKind::Spam.subject_prefix(),
            &message.subject,
            settings.use_expressive_subject,
        );
        let ews = EwsClient::new(self.host);
        let (sent, failure) = match ews
            .send_smtp_report(
                &settings.smtp_to,
                &subject,
                settings.client_id,
                message,
                &settings.extra_headers,
                None,
            )
            .await
        {
            Ok(sent) => (sent, None),
            Err(e) => (false, Some(e)),
        };

        if !sent {
            return Ok(ReportResult {
                status: ReportStatus::Error,
                diagnosis: Some(
                    failure
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| SMTP_REJECTED.to_string()),
                ),
                move_status: MoveMessageStatus::Pending,
                move_target: ReportAction::Junk,
                item_id: item.item_id.clone(),
            });
        }

        let move_status = match ews.move_message_to(&item.item_id, ReportAction::Junk).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Junk move failed: {}", e);
                MoveMessageStatus::Error
            }
        };
        Ok(ReportResult {
            status: ReportStatus::Success,
            diagnosis: None,
            move_status,
            move_target: ReportAction::Junk,
            item_id: item.item_id.clone(),
        })
    }
}

fn compose_subject(prefix: &str, original: &str, expressive: bool) -> String {
    if expressive {
        format!("{}: {}", prefix, original)
    } else {
        prefix.to_string()
    }
}

/// Extra request headers for the HTTP leg, with the deployment identity
/// appended when telemetry is opted in.
fn request_headers(settings: &Settings) -> IndexMap<String, String> {
    let mut headers = settings.extra_headers.clone();
    if settings.telemetry && !settings.plugin_id.is_empty() {
        headers.insert("X-Reported-By".to_string(), settings.plugin_id.clone());
    }
    headers
}

fn failure_diagnosis(
    http_ok: Option<bool>,
    smtp_ok: Option<bool>,
    smtp_failure: Option<ReportError>,
) -> String {
    let smtp_detail = smtp_failure
        .map(|e| e.to_string())
        .unwrap_or_else(|| SMTP_REJECTED.to_string());
    match (http_ok, smtp_ok) {
        (Some(true), Some(false)) => ReportError::PartialFailure(format!(
            "the HTTP report went out but the SMTP report failed: {}",
            smtp_detail
        ))
        .to_string(),
        (Some(false), Some(true)) => ReportError::PartialFailure(
            "the SMTP report went out but every report URL failed".to_string(),
        )
        .to_string(),
        (Some(false), Some(false)) => {
            format!("Every report URL failed; {}", smtp_detail)
        }
        (Some(false), None) => "Every report URL failed".to_string(),
        (None, Some(false)) => smtp_detail,
        _ => "The report could not be delivered".to_string(),
    }
}
