use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A display-name/address pair as the host exposes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub name: String,
    pub address: String,
}

impl EmailAddress {
    pub fn new(name: &str, address: &str) -> Self {
        EmailAddress {
            name: name.to_string(),
            address: address.to_string(),
        }
    }

    /// `"Name <addr>"`, or the bare address when the display name is empty.
    pub fn render(&self) -> String {
        if self.name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.name, self.address)
        }
    }
}

/// Metadata of the currently selected message, read from the host item.
///
/// `author` is the nominal From; `sender` is the envelope sender, which
/// differs when a delegate sent the message on the author's behalf.
#[derive(Debug, Clone)]
pub struct MailItem {
    pub item_id: String,
    pub subject: String,
    pub author: EmailAddress,
    pub sender: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub date: DateTime<Utc>,
}

/// Structured failure from a host primitive, carrying the host's own
/// error triple.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Error {code} ({name}): {message}")]
pub struct HostError {
    pub code: u32,
    pub name: String,
    pub message: String,
}

/// The mail-client surface this engine runs against.
///
/// Production hosts bridge to the client's scripting API; tests substitute
/// scripted implementations. `send_soap` is the host's raw request/response
/// network primitive: it takes a complete envelope and yields the raw XML
/// response text, or a structured failure.
#[async_trait]
pub trait MailboxHost: Send + Sync {
    /// Address of the mailbox owner, used as the reporter identity.
    fn user_email(&self) -> String;

    /// The item's body, coerced to HTML by the host.
    async fn body_html(&self, item: &MailItem) -> Result<String, HostError>;

    /// Execute one legacy-protocol request and return the raw response XML.
    async fn send_soap(&self, request: &str) -> Result<String, HostError>;
}
