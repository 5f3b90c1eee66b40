//! Extraction of the few elements the engine needs from legacy-protocol
//! response XML.
//!
//! Responses are matched by local element name, so both prefixed
//! (`m:ResponseCode`) and unprefixed server output parse the same way.

use crate::error::ReportError;
use crate::message::HeaderMap;
use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// Raw content and header map returned by a fetch.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    /// Base64 of the item's full MIME bytes.
    pub raw: String,
    /// Lowercased header names to values in document order.
    pub headers: HeaderMap,
}

/// Parse a `GetItem` response: the MIME content element plus every
/// internet-message-header element, repeated names accumulated in order.
pub fn parse_fetch_response(xml: &str) -> Result<FetchedMessage, ReportError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut raw: Option<String> = None;
    let mut headers: HeaderMap = IndexMap::new();
    let mut in_mime_content = false;
    // Name of the header element currently open, with its text seen so far.
    let mut pending_header: Option<(String, String)> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => match e.local_name().as_ref() {
                b"MimeContent" => in_mime_content = true,
                b"InternetMessageHeader" => {
                    if let Ok(Some(attr)) = e.try_get_attribute("HeaderName") {
                        let name = attr.unescape_value()?.to_lowercase();
                        pending_header = Some((name, String::new()));
                    }
                }
                _ => {}
            },
            Event::Empty(e) => {
                // A self-closing header element carries an empty value.
                if e.local_name().as_ref() == b"InternetMessageHeader" {
                    if let Ok(Some(attr)) = e.try_get_attribute("HeaderName") {
                        let name = attr.unescape_value()?.to_lowercase();
                        headers.entry(name).or_default().push(String::new());
                    }
                }
            }
            Event::Text(e) => {
                if in_mime_content {
                    raw = Some(e.unescape()?.into_owned());
                } else if let Some((_, ref mut value)) = pending_header {
                    value.push_str(&e.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"MimeContent" => in_mime_content = false,
                b"InternetMessageHeader" => {
                    if let Some((name, value)) = pending_header.take() {
                        headers.entry(name).or_default().push(value);
                    }
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    let raw = raw.ok_or_else(|| {
        ReportError::MalformedResponse("fetch response has no MimeContent element".to_string())
    })?;
    Ok(FetchedMessage { raw, headers })
}

/// Text of the first response-code element.
pub fn parse_response_code(xml: &str) -> Result<String, ReportError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_code = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                if e.local_name().as_ref() == b"ResponseCode" {
                    in_code = true;
                }
            }
            Event::Text(e) => {
                if in_code {
                    return Ok(e.unescape()?.into_owned());
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"ResponseCode" {
                    in_code = false;
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Err(ReportError::MalformedResponse(
        "response has no ResponseCode element".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FETCH_RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
        <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
          <s:Body>
            <m:GetItemResponse xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages"
                               xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">
              <m:ResponseMessages>
                <m:GetItemResponseMessage ResponseClass="Success">
                  <m:ResponseCode>NoError</m:ResponseCode>
                  <m:Items>
                    <t:Message>
                      <t:MimeContent CharacterSet="UTF-8">UmVjZWl2ZWQ6IGZyb20=</t:MimeContent>
                      <t:InternetMessageHeaders>
                        <t:InternetMessageHeader HeaderName="Received">from a.example</t:InternetMessageHeader>
                        <t:InternetMessageHeader HeaderName="Received">from b.example</t:InternetMessageHeader>
                        <t:InternetMessageHeader HeaderName="X-Lucy-VictimUrl">https://sim.example/r/1</t:InternetMessageHeader>
                        <t:InternetMessageHeader HeaderName="X-Empty"/>
                      </t:InternetMessageHeaders>
                    </t:Message>
                  </m:Items>
                </m:GetItemResponseMessage>
              </m:ResponseMessages>
            </m:GetItemResponse>
          </s:Body>
        </s:Envelope>"#;

    #[test]
    fn test_parse_fetch_response() {
        let fetched = parse_fetch_response(FETCH_RESPONSE).unwrap();
        assert_eq!(fetched.raw, "UmVjZWl2ZWQ6IGZyb20=");
        assert_eq!(
            fetched.headers.get("received").unwrap(),
            &vec!["from a.example", "from b.example"]
        );
        assert_eq!(
            fetched.headers.get("x-lucy-victimurl").unwrap()[0],
            "https://sim.example/r/1"
        );
        assert_eq!(fetched.headers.get("x-empty").unwrap(), &vec![""]);
        // Keys are lowercased and keep document order.
        let keys: Vec<&String> = fetched.headers.keys().collect();
        assert_eq!(keys, vec!["received", "x-lucy-victimurl", "x-empty"]);
    }

    #[test]
    fn test_parse_fetch_response_without_mime_content() {
        let xml = "<Envelope><Body><GetItemResponse/></Body></Envelope>";
        let err = parse_fetch_response(xml).unwrap_err();
        assert!(matches!(err, ReportError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_fetch_response_unescapes_header_values() {
        let xml = r#"<r><t:MimeContent>cg==</t:MimeContent>
            <t:InternetMessageHeader HeaderName="Subject">Fake &lt;Invoice&gt; &amp; more</t:InternetMessageHeader></r>"#;
        let fetched = parse_fetch_response(xml).unwrap();
        assert_eq!(
            fetched.headers.get("subject").unwrap()[0],
            "Fake <Invoice> & more"
        );
    }

    #[test]
    fn test_parse_response_code() {
        let xml = r#"<Envelope><Body><m:CreateItemResponse>
            <m:ResponseMessages><m:CreateItemResponseMessage ResponseClass="Success">
            <m:ResponseCode>NoError</m:ResponseCode>
            </m:CreateItemResponseMessage></m:ResponseMessages>
            </m:CreateItemResponse></Body></Envelope>"#;
        assert_eq!(parse_response_code(xml).unwrap(), "NoError");
    }

    #[test]
    fn test_parse_response_code_error_value() {
        let xml = "<r><ResponseCode>ErrorItemNotFound</ResponseCode></r>";
        assert_eq!(parse_response_code(xml).unwrap(), "ErrorItemNotFound");
    }

    #[test]
    fn test_parse_response_code_missing() {
        let err = parse_response_code("<r><Other>x</Other></r>").unwrap_err();
        assert!(matches!(err, ReportError::MalformedResponse(_)));
    }
}
