//! Typed builders for the three legacy-protocol request envelopes.
//!
//! Every request shares one SOAP skeleton: the namespace declarations, a
//! header pinning the server version, and a single operation element in the
//! body. All caller-supplied values pass through the event writer, which
//! escapes them for both element text and attribute positions; nothing here
//! is assembled by string concatenation.

use crate::error::ReportError;
use crate::message::{BodyType, Message};
use indexmap::IndexMap;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

const XMLNS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XMLNS_M: &str = "http://schemas.microsoft.com/exchange/services/2006/messages";
const XMLNS_T: &str = "http://schemas.microsoft.com/exchange/services/2006/types";
const XMLNS_SOAP: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SERVER_VERSION: &str = "Exchange2013";

const ATTACHMENT_NAME: &str = "email.eml";
const ATTACHMENT_CONTENT_TYPE: &str = "application/octet-stream";

/// Parameters of one composed report email.
pub struct ReportEmail<'a> {
    pub destination: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
    pub body_type: BodyType,
    /// Base64 MIME bytes of the original message, attached verbatim.
    pub raw_attachment: &'a str,
}

fn build_envelope<F>(operation: F) -> Result<String, ReportError>
where
    F: FnOnce(&mut Writer<&mut Vec<u8>>) -> Result<(), quick_xml::Error>,
{
    let mut out = Vec::new();
    let mut writer = Writer::new(&mut out);

    let mut root = BytesStart::new("soap:Envelope");
    root.push_attribute(("xmlns:xsi", XMLNS_XSI));
    root.push_attribute(("xmlns:m", XMLNS_M));
    root.push_attribute(("xmlns:t", XMLNS_T));
    root.push_attribute(("xmlns:soap", XMLNS_SOAP));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new("soap:Header")))?;
    let mut version = BytesStart::new("t:RequestServerVersion");
    version.push_attribute(("Version", SERVER_VERSION));
    writer.write_event(Event::Empty(version))?;
    writer.write_event(Event::End(BytesEnd::new("soap:Header")))?;

    writer.write_event(Event::Start(BytesStart::new("soap:Body")))?;
    operation(&mut writer)?;
    writer.write_event(Event::End(BytesEnd::new("soap:Body")))?;
    writer.write_event(Event::End(BytesEnd::new("soap:Envelope")))?;

    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn text_element(
    writer: &mut Writer<&mut Vec<u8>>,
    name: &str,
    value: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn item_id_element(
    writer: &mut Writer<&mut Vec<u8>>,
    item_id: &str,
) -> Result<(), quick_xml::Error> {
    let mut id = BytesStart::new("t:ItemId");
    id.push_attribute(("Id", item_id));
    writer.write_event(Event::Empty(id))
}

/// `GetItem` requesting the item's full MIME content and internet-message
/// headers, by item id.
pub fn get_item(item_id: &str) -> Result<String, ReportError> {
    build_envelope(|w| {
        w.write_event(Event::Start(BytesStart::new("m:GetItem")))?;
        w.write_event(Event::Start(BytesStart::new("m:ItemShape")))?;
        text_element(w, "t:BaseShape", "IdOnly")?;
        text_element(w, "t:IncludeMimeContent", "true")?;
        w.write_event(Event::Start(BytesStart::new("t:AdditionalProperties")))?;
        let mut field = BytesStart::new("t:FieldURI");
        field.push_attribute(("FieldURI", "item:InternetMessageHeaders"));
        w.write_event(Event::Empty(field))?;
        w.write_event(Event::End(BytesEnd::new("t:AdditionalProperties")))?;
        w.write_event(Event::End(BytesEnd::new("m:ItemShape")))?;
        w.write_event(Event::Start(BytesStart::new("m:ItemIds")))?;
        item_id_element(w, item_id)?;
        w.write_event(Event::End(BytesEnd::new("m:ItemIds")))?;
        w.write_event(Event::End(BytesEnd::new("m:GetItem")))?;
        Ok(())
    })
}

/// `CreateItem` with disposition "send and save copy": the report email with
/// the original message attached as `email.eml`.
pub fn create_report(email: &ReportEmail<'_>) -> Result<String, ReportError> {
    build_envelope(|w| {
        let mut create = BytesStart::new("m:CreateItem");
        create.push_attribute(("MessageDisposition", "SendAndSaveCopy"));
        w.write_event(Event::Start(create))?;

        w.write_event(Event::Start(BytesStart::new("m:SavedItemFolderId")))?;
        let mut folder = BytesStart::new("t:DistinguishedFolderId");
        folder.push_attribute(("Id", "sentitems"));
        w.write_event(Event::Empty(folder))?;
        w.write_event(Event::End(BytesEnd::new("m:SavedItemFolderId")))?;

        w.write_event(Event::Start(BytesStart::new("m:Items")))?;
        w.write_event(Event::Start(BytesStart::new("t:Message")))?;
        text_element(w, "t:Subject", email.subject)?;

        let mut body = BytesStart::new("t:Body");
        body.push_attribute((
            "BodyType",
            match email.body_type {
                BodyType::Plain => "Text",
                BodyType::Html => "HTML",
            },
        ));
        w.write_event(Event::Start(body))?;
        // HTML bodies ride as escaped text, not CDATA, so a "]]>" inside a
        // hostile message cannot terminate the section early.
        w.write_event(Event::Text(BytesText::new(email.body)))?;
        w.write_event(Event::End(BytesEnd::new("t:Body")))?;

        w.write_event(Event::Start(BytesStart::new("t:Attachments")))?;
        w.write_event(Event::Start(BytesStart::new("t:FileAttachment")))?;
        text_element(w, "t:Name", ATTACHMENT_NAME)?;
        text_element(w, "t:ContentType", ATTACHMENT_CONTENT_TYPE)?;
        text_element(w, "t:Content", email.raw_attachment)?;
        w.write_event(Event::End(BytesEnd::new("t:FileAttachment")))?;
        w.write_event(Event::End(BytesEnd::new("t:Attachments")))?;

        w.write_event(Event::Start(BytesStart::new("t:ToRecipients")))?;
        w.write_event(Event::Start(BytesStart::new("t:Mailbox")))?;
        text_element(w, "t:EmailAddress", email.destination)?;
        w.write_event(Event::End(BytesEnd::new("t:Mailbox")))?;
        w.write_event(Event::End(BytesEnd::new("t:ToRecipients")))?;
        w.write_event(Event::End(BytesEnd::new("t:Message")))?;
        w.write_event(Event::End(BytesEnd::new("m:Items")))?;
        w.write_event(Event::End(BytesEnd::new("m:CreateItem")))?;
        Ok(())
    })
}

/// `MoveItem` relocating one item into a well-known folder.
pub fn move_item(item_id: &str, folder_id: &str) -> Result<String, ReportError> {
    build_envelope(|w| {
        w.write_event(Event::Start(BytesStart::new("m:MoveItem")))?;
        w.write_event(Event::Start(BytesStart::new("m:ToFolderId")))?;
        let mut folder = BytesStart::new("t:DistinguishedFolderId");
        folder.push_attribute(("Id", folder_id));
        w.write_event(Event::Empty(folder))?;
        w.write_event(Event::End(BytesEnd::new("m:ToFolderId")))?;
        w.write_event(Event::Start(BytesStart::new("m:ItemIds")))?;
        item_id_element(w, item_id)?;
        w.write_event(Event::End(BytesEnd::new("m:ItemIds")))?;
        w.write_event(Event::End(BytesEnd::new("m:MoveItem")))?;
        Ok(())
    })
}

/// Render the report email body in the message's preview format.
///
/// Plain bodies quote the original after a `-----Original Message-----`
/// divider; HTML bodies use `<br />` separators and HTML-escape the
/// sender-controlled header lines. The preview itself is already HTML on
/// the HTML path and is embedded as-is.
pub fn compose_report_body(
    message: &Message,
    client_id: Option<u32>,
    additional_headers: &IndexMap<String, String>,
    comment: Option<&str>,
) -> String {
    match message.preview_type {
        BodyType::Plain => {
            let client_line = client_id
                .map(|id| format!("X-Lucy-Client: {}\n", id))
                .unwrap_or_default();
            let comment_line = comment
                .map(|c| format!("X-More-Analysis: True\n{}\n", c))
                .unwrap_or_default();
            let ci_line = if client_id.is_some() {
                "X-CI-Report: True\n"
            } else {
                ""
            };
            let header_block = additional_headers
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "{}{}{}{}\n\n-----Original Message-----\nFrom: {}\nSent: {}\nTo: {}\nSubject: {}\n\n{}\r\n",
                client_line,
                comment_line,
                ci_line,
                header_block,
                message.from,
                message.date.to_rfc2822(),
                message.to,
                message.subject,
                message.preview
            )
        }
        BodyType::Html => {
            let client_line = client_id
                .map(|id| format!("X-Lucy-Client: {}<br />", id))
                .unwrap_or_default();
            let comment_line = comment
                .map(|c| format!("X-More-Analysis: True<br />{}<br />", c))
                .unwrap_or_default();
            let ci_line = if client_id.is_some() {
                "X-CI-Report: True<br />"
            } else {
                ""
            };
            let header_block = additional_headers
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("<br />");
            format!(
                "{}{}{}{}<br /><br />From: {}<br />Sent: {}<br />To: {}<br />Subject: {}<br /><br />{}",
                client_line,
                comment_line,
                ci_line,
                header_block,
                encode_html(&message.from),
                encode_html(&message.date.to_rfc2822()),
                encode_html(&message.to),
                encode_html(&message.subject),
                message.preview
            )
        }
    }
}

/// Replace HTML-significant characters so header strings like
/// `Name <name@example.com>` render as text instead of markup.
fn encode_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn message(preview_type: BodyType) -> Message {
        Message {
            from: "Acme Billing <billing@acme.example>".to_string(),
            to: "Jane Doe <jane@example.com>".to_string(),
            date: "2024-03-01T09:30:00Z".parse().unwrap(),
            subject: "Invoice 1234".to_string(),
            headers: IndexMap::new(),
            preview: match preview_type {
                BodyType::Plain => "Pay now.".to_string(),
                BodyType::Html => "<p>Pay now.</p>".to_string(),
            },
            preview_type,
            raw: "cmF3IGJ5dGVz".to_string(),
            reporter: "jane@example.com".to_string(),
        }
    }

    #[test]
    fn test_get_item_escapes_item_id() {
        let xml = get_item("AAMk\"&=").unwrap();
        assert!(xml.contains("<m:GetItem>"));
        assert!(xml.contains("<t:IncludeMimeContent>true</t:IncludeMimeContent>"));
        assert!(xml.contains("FieldURI=\"item:InternetMessageHeaders\""));
        assert!(xml.contains("Id=\"AAMk&quot;&amp;=\""));
        assert!(xml.contains("Version=\"Exchange2013\""));
    }

    #[test]
    fn test_create_report_escapes_subject_and_body() {
        let email = ReportEmail {
            destination: "cert@example.com",
            subject: "Fake <Invoice> & \"urgent\"",
            body: "<p>quoted</p>",
            body_type: BodyType::Html,
            raw_attachment: "cmF3IGJ5dGVz",
        };
        let xml = create_report(&email).unwrap();
        assert!(xml.contains("Fake &lt;Invoice&gt; &amp;"));
        assert!(!xml.contains("<Invoice>"));
        assert!(xml.contains("&lt;p&gt;quoted&lt;/p&gt;"));
        assert!(!xml.contains("<![CDATA["));
    }

    #[test]
    fn test_create_report_structure() {
        let email = ReportEmail {
            destination: "cert@example.com",
            subject: "Phishing Report",
            body: "body",
            body_type: BodyType::Plain,
            raw_attachment: "cmF3",
        };
        let xml = create_report(&email).unwrap();
        assert!(xml.contains("MessageDisposition=\"SendAndSaveCopy\""));
        assert!(xml.contains("Id=\"sentitems\""));
        assert!(xml.contains("BodyType=\"Text\""));
        assert!(xml.contains("<t:Name>email.eml</t:Name>"));
        assert!(xml.contains("<t:ContentType>application/octet-stream</t:ContentType>"));
        assert!(xml.contains("<t:Content>cmF3</t:Content>"));
        assert!(xml.contains("<t:EmailAddress>cert@example.com</t:EmailAddress>"));
    }

    #[test]
    fn test_move_item_targets_folder() {
        let xml = move_item("AAMkAD=", "junkemail").unwrap();
        assert!(xml.contains("<m:MoveItem>"));
        assert!(xml.contains("Id=\"junkemail\""));
        assert!(xml.contains("Id=\"AAMkAD=\""));
    }

    #[test]
    fn test_compose_plain_body() {
        let mut headers = IndexMap::new();
        headers.insert("X-Origin".to_string(), "mailreport".to_string());
        let body = compose_report_body(
            &message(BodyType::Plain),
            Some(2),
            &headers,
            Some("looks off"),
        );
        assert_eq!(
            body,
            "X-Lucy-Client: 2\nX-More-Analysis: True\nlooks off\nX-CI-Report: True\n\
             X-Origin: mailreport\n\n-----Original Message-----\n\
             From: Acme Billing <billing@acme.example>\n\
             Sent: Fri, 1 Mar 2024 09:30:00 +0000\n\
             To: Jane Doe <jane@example.com>\n\
             Subject: Invoice 1234\n\nPay now.\r\n"
        );
    }

    #[test]
    fn test_compose_plain_body_without_optional_parts() {
        let body = compose_report_body(&message(BodyType::Plain), None, &IndexMap::new(), None);
        assert!(!body.contains("X-Lucy-Client"));
        assert!(!body.contains("X-More-Analysis"));
        assert!(!body.contains("X-CI-Report"));
        assert!(body.starts_with("\n\n-----Original Message-----"));
    }

    #[test]
    fn test_compose_html_body_escapes_headers_not_preview() {
        let body = compose_report_body(&message(BodyType::Html), Some(2), &IndexMap::new(), None);
        assert!(body.contains("X-Lucy-Client: 2<br />"));
        assert!(body.contains("X-CI-Report: True<br />"));
        assert!(body.contains("From: Acme Billing &lt;billing@acme.example&gt;<br />"));
        assert!(body.contains("Subject: Invoice 1234<br /><br /><p>Pay now.</p>"));
        // The preview is already HTML and stays unescaped at this layer.
        assert!(body.ends_with("<p>Pay now.</p>"));
    }

    #[test]
    fn test_encode_html() {
        assert_eq!(
            encode_html("a & b <c> \"d\""),
            "a &amp; b &lt;c&gt; &quot;d&quot;"
        );
    }
}
