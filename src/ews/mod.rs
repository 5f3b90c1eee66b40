//! Legacy-protocol client: the three typed exchanges the report workflow
//! needs, executed over the host's raw request/response primitive.
//!
//! The host mail client's scripting surface has no native "send via SMTP"
//! and no simulation-aware reporting, and REST-style APIs are unreachable
//! from restricted on-premises deployments, so those capabilities are
//! reached through this one wire protocol instead.

pub mod requests;
pub mod response;

pub use response::FetchedMessage;

use crate::config::ReportAction;
use crate::error::ReportError;
use crate::mailbox::MailboxHost;
use crate::message::Message;
use indexmap::IndexMap;
use log::{debug, info, warn};

const RESPONSE_OK: &str = "NoError";

/// Outcome of the relocation step of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMessageStatus {
    /// Move not performed yet; the caller triggers it after dispatch.
    Pending,
    Success,
    Error,
}

pub struct EwsClient<'a> {
    host: &'a dyn MailboxHost,
}

impl<'a> EwsClient<'a> {
    pub fn new(host: &'a dyn MailboxHost) -> Self {
        EwsClient { host }
    }

    /// Fetch the item's base64 MIME bytes and its full header map.
    pub async fn fetch_message(&self, item_id: &str) -> Result<FetchedMessage, ReportError> {
        let request = requests::get_item(item_id)?;
        let response = self.host.send_soap(&request).await?;
        response::parse_fetch_response(&response)
    }

    /// Send the composed report email with the original message attached,
    /// via create-and-save-copy into sent items.
    ///
    /// Returns whether the server accepted the send.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_smtp_report(
        &self,
        destination: &str,
        subject: &str,
        client_id: Option<u32>,
        message: &Message,
        additional_headers: &IndexMap<String, String>,
        comment: Option<&str>,
    ) -> Result<bool, ReportError> {
        debug!(
            "Reporting selected mail via SMTP as {} to {}",
            message.reporter, destination
        );
        let body = requests::compose_report_body(message, client_id, additional_headers, comment);
        let request = requests::create_report(&requests::ReportEmail {
            destination,
            subject,
            body: &body,
            body_type: message.preview_type,
            raw_attachment: &message.raw,
        })?;
        let response = self.host.send_soap(&request).await?;
        let code = response::parse_response_code(&response)?;
        if code != RESPONSE_OK {
            warn!("Report send rejected with response code {}", code);
        }
        Ok(code == RESPONSE_OK)
    }

    /// Move the item into the folder the action names.
    ///
    /// `Keep` resolves to `Success` without any network traffic.
    pub async fn move_message_to(
        &self,
        item_id: &str,
        action: ReportAction,
    ) -> Result<MoveMessageStatus, ReportError> {
        let folder_id = match action {
            ReportAction::Junk => "junkemail",
            ReportAction::Trash => "deleteditems",
            ReportAction::Keep => return Ok(MoveMessageStatus::Success),
        };
        info!("Moving message {} to the {} folder", item_id, folder_id);
        let request = requests::move_item(item_id, folder_id)?;
        let response = self.host.send_soap(&request).await?;
        if response::parse_response_code(&response)? == RESPONSE_OK {
            Ok(MoveMessageStatus::Success)
        } else {
            Ok(MoveMessageStatus::Error)
        }
    }
}
