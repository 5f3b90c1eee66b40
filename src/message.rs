use crate::mailbox::MailItem;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// Lowercase header name mapped to its values in arrival order.
///
/// Repeated headers keep every value. Iteration order is first-insertion
/// order, which classification and URL extraction rely on.
pub type HeaderMap = IndexMap<String, Vec<String>>;

/// Body format of a report preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    Plain,
    Html,
}

/// Canonical report payload built once per reported item and discarded
/// after dispatch.
#[derive(Debug, Clone)]
pub struct Message {
    /// Rendered author, with `"{author} via {sender}"` when a delegate sent
    /// the message.
    pub from: String,
    /// Rendered recipients, joined with `", "`.
    pub to: String,
    pub date: DateTime<Utc>,
    pub subject: String,
    pub headers: HeaderMap,
    /// Body content; the host coerces it to HTML, so on the live path this
    /// is always HTML.
    pub preview: String,
    pub preview_type: BodyType,
    /// Base64 of the original MIME bytes. Always populated before any
    /// dispatch is attempted.
    pub raw: String,
    /// Mailbox owner submitting the report.
    pub reporter: String,
}

impl Message {
    /// Shape host item metadata plus fetched content into a `Message`.
    ///
    /// Pure assembly; the caller performs the body/content retrieval.
    pub fn assemble(
        item: &MailItem,
        reporter: String,
        preview_html: String,
        raw: String,
        headers: HeaderMap,
    ) -> Self {
        let author = item.author.render();
        let from = if item.author.address != item.sender.address {
            format!("{} via {}", author, item.sender.render())
        } else {
            author
        };
        let to = item
            .to
            .iter()
            .map(|r| r.render())
            .collect::<Vec<_>>()
            .join(", ");
        Message {
            from,
            to,
            date: item.date,
            subject: item.subject.clone(),
            headers,
            preview: preview_html,
            preview_type: BodyType::Html,
            raw,
            reporter,
        }
    }

    /// Build a `Message` from a raw RFC 5322 email file.
    ///
    /// Used by the offline test harness; the live path assembles from host
    /// item data instead. Folded header lines are unfolded, keys lowercased,
    /// repeated headers accumulated in order.
    pub fn from_raw_email(content: &str) -> Self {
        let mut headers: HeaderMap = IndexMap::new();
        let mut body = String::new();
        let mut in_headers = true;
        let mut last_header_key: Option<String> = None;

        for line in content.lines() {
            if in_headers {
                if line.trim().is_empty() {
                    in_headers = false;
                    continue;
                }

                if line.starts_with(' ') || line.starts_with('\t') {
                    // Continuation of the previous header
                    if let Some(ref key) = last_header_key {
                        if let Some(values) = headers.get_mut(key) {
                            if let Some(last) = values.last_mut() {
                                last.push(' ');
                                last.push_str(line.trim());
                            }
                        }
                    }
                    continue;
                }

                if let Some((key, value)) = line.split_once(':') {
                    let key = key.trim().to_lowercase();
                    let value = value.trim().to_string();
                    last_header_key = Some(key.clone());
                    headers.entry(key).or_default().push(value);
                }
            } else {
                body.push_str(line);
                body.push('\n');
            }
        }

        let first = |key: &str| -> String {
            headers
                .get(key)
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or_default()
        };
        let date = headers
            .get("date")
            .and_then(|v| v.first())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Message {
            from: first("from"),
            to: first("to"),
            date,
            subject: first("subject"),
            headers,
            preview: body.clone(),
            preview_type: BodyType::Plain,
            raw: general_purpose::STANDARD.encode(content.as_bytes()),
            reporter: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::EmailAddress;

    fn item() -> MailItem {
        MailItem {
            item_id: "AAMkAD=".to_string(),
            subject: "Invoice 1234".to_string(),
            author: EmailAddress::new("Acme Billing", "billing@acme.example"),
            sender: EmailAddress::new("Acme Billing", "billing@acme.example"),
            to: vec![
                EmailAddress::new("Jane Doe", "jane@example.com"),
                EmailAddress::new("", "ops@example.com"),
            ],
            date: "2024-03-01T09:30:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_assemble_renders_from_and_to() {
        let msg = Message::assemble(
            &item(),
            "jane@example.com".to_string(),
            "<p>body</p>".to_string(),
            "cmF3".to_string(),
            IndexMap::new(),
        );
        assert_eq!(msg.from, "Acme Billing <billing@acme.example>");
        assert_eq!(msg.to, "Jane Doe <jane@example.com>, ops@example.com");
        assert_eq!(msg.preview_type, BodyType::Html);
        assert_eq!(msg.raw, "cmF3");
        assert_eq!(msg.reporter, "jane@example.com");
    }

    #[test]
    fn test_assemble_marks_delegate_sender() {
        let mut item = item();
        item.sender = EmailAddress::new("Mail Gateway", "relay@acme.example");
        let msg = Message::assemble(
            &item,
            "jane@example.com".to_string(),
            String::new(),
            String::new(),
            IndexMap::new(),
        );
        assert_eq!(
            msg.from,
            "Acme Billing <billing@acme.example> via Mail Gateway <relay@acme.example>"
        );
    }

    #[test]
    fn test_from_raw_email_parses_headers_and_body() {
        let content = "From: Alice <alice@example.com>\n\
                       To: bob@example.com\n\
                       Subject: Hello\n\
                       Date: Fri, 01 Mar 2024 09:30:00 +0000\n\
                       X-Test: first\n\
                       \tcontinued\n\
                       \n\
                       Body line.\n";
        let msg = Message::from_raw_email(content);
        assert_eq!(msg.from, "Alice <alice@example.com>");
        assert_eq!(msg.to, "bob@example.com");
        assert_eq!(msg.subject, "Hello");
        assert_eq!(msg.headers.get("x-test").unwrap()[0], "first continued");
        assert_eq!(msg.preview, "Body line.\n");
        assert_eq!(msg.preview_type, BodyType::Plain);
        assert!(!msg.raw.is_empty());
    }

    #[test]
    fn test_from_raw_email_accumulates_repeated_headers() {
        let content = "Received: from a.example\n\
                       Received: from b.example\n\
                       From: alice@example.com\n\
                       \n";
        let msg = Message::from_raw_email(content);
        let received = msg.headers.get("received").unwrap();
        assert_eq!(received, &vec!["from a.example", "from b.example"]);
        // Keys keep first-insertion order.
        let keys: Vec<&String> = msg.headers.keys().collect();
        assert_eq!(keys, vec!["received", "from"]);
    }
}
