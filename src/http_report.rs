//! HTTP JSON report client with ordered fallback across candidate URLs.
//!
//! The platform endpoint is intentionally opaque: responses are never
//! inspected, so "success" means only that a POST completed without a
//! transport-level failure.

use crate::error::ReportError;
use crate::message::Message;
use async_trait::async_trait;
use indexmap::IndexMap;
use log::{debug, warn};
use std::time::Duration;

/// Transport seam for the report POST.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Submit `body` to `url` with the given extra request headers,
    /// ignoring whatever the server answers.
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: &IndexMap<String, String>,
    ) -> Result<(), ReportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("mailreport/0.1.0")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        ReqwestTransport { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: &IndexMap<String, String>,
    ) -> Result<(), ReportError> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
            .send()
            .await
            .map_err(|e| ReportError::Network(e.to_string()))?;
        Ok(())
    }
}

pub struct HttpReporter<'a> {
    transport: &'a dyn HttpTransport,
}

impl<'a> HttpReporter<'a> {
    pub fn new(transport: &'a dyn HttpTransport) -> Self {
        HttpReporter { transport }
    }

    /// POST one report to each candidate URL in order, stopping at the first
    /// completed send. Returns false only when every URL failed.
    ///
    /// The JSON body carries the reporter address, the base64 raw message,
    /// whether a comment was supplied plus the comment text itself (empty
    /// string when absent), a fixed do-not-auto-respond flag, and the
    /// scenario id when the message came from a simulation.
    pub async fn send_report(
        &self,
        urls: &[String],
        reporter: &str,
        message: &Message,
        additional_headers: &IndexMap<String, String>,
        scenario_id: Option<&str>,
        comment: Option<&str>,
    ) -> bool {
        let mut payload = serde_json::json!({
            "email": reporter,
            "mail_content": message.raw,
            "more_analysis": comment.is_some(),
            "disable_incident_autoresponder": false,
            "enable_comment_to_deeper_analysis_request": comment.unwrap_or(""),
        });
        if let Some(id) = scenario_id {
            payload["scenario_id"] = serde_json::Value::String(id.to_string());
        }

        for url in urls {
            debug!("Submitting report for {} to {}", reporter, url);
            match self
                .transport
                .post_json(url, &payload, additional_headers)
                .await
            {
                Ok(()) => return true,
                Err(e) => warn!("Report to {} failed: {}", url, e),
            }
        }
        false
    }
}
