pub mod config;
pub mod error;
pub mod ews;
pub mod http_report;
pub mod mailbox;
pub mod message;
pub mod reporter;
pub mod simulation;

// Re-export the dispatch surface and the types its signatures carry
pub use config::{ReportAction, Settings, Transport};
pub use error::ReportError;
pub use ews::{EwsClient, MoveMessageStatus};
pub use http_report::{HttpTransport, ReqwestTransport};
pub use mailbox::{EmailAddress, HostError, MailItem, MailboxHost};
pub use message::{BodyType, HeaderMap, Message};
pub use reporter::{ReportResult, ReportStatus, Reporter};
