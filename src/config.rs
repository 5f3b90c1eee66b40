use crate::error::ReportError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// What happens to a message once its report has been delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportAction {
    Junk,
    Trash,
    Keep,
}

impl std::fmt::Display for ReportAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReportAction::Junk => "junk",
            ReportAction::Trash => "trash",
            ReportAction::Keep => "keep",
        };
        write!(f, "{}", s)
    }
}

/// Delivery channel(s) for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transport {
    #[serde(rename = "http")]
    Http,
    #[serde(rename = "smtp")]
    Smtp,
    #[serde(rename = "http+smtp")]
    HttpSmtp,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Transport::Http => "http",
            Transport::Smtp => "smtp",
            Transport::HttpSmtp => "http+smtp",
        };
        write!(f, "{}", s)
    }
}

impl Transport {
    pub fn uses_http(&self) -> bool {
        matches!(self, Transport::Http | Transport::HttpSmtp)
    }

    pub fn uses_smtp(&self) -> bool {
        matches!(self, Transport::Smtp | Transport::HttpSmtp)
    }
}

/// Immutable configuration snapshot for one dispatch call.
///
/// The engine never reads ambient state; callers load (or receive from the
/// host's settings store) a `Settings` value and pass it into each dispatch.
/// Unknown keys in a settings file are ignored and missing keys fall back to
/// the shipped defaults, mirroring the per-key fallback of the host add-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where to move the message after a successful report.
    pub report_action: ReportAction,
    /// Channel(s) for reports of real phishing.
    pub phishing_transport: Transport,
    /// Channel(s) for reports of awareness-simulation messages.
    pub simulation_transport: Transport,
    /// Security platform host the HTTP report endpoint lives on.
    pub report_server: String,
    /// Platform client id; selects the tenant path of the HTTP endpoint and
    /// tags SMTP report bodies.
    pub client_id: Option<u32>,
    /// Recipient address for SMTP reports.
    pub smtp_to: String,
    /// Append the original subject to the fixed report subject.
    pub use_expressive_subject: bool,
    /// Extra headers merged into HTTP report requests and serialized into
    /// SMTP report bodies, in file order.
    pub extra_headers: IndexMap<String, String>,
    /// Whether the deployment opted into report telemetry.
    pub telemetry: bool,
    /// Deployment identity, `id@provider/version` as stamped at packaging
    /// time. Sent with HTTP reports when telemetry is enabled.
    pub plugin_id: String,
    /// Whether the options UI may expose the advanced fields. Carried in the
    /// snapshot for the host; the engine itself does not branch on it.
    pub permit_advanced_config: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            report_action: ReportAction::Junk,
            phishing_transport: Transport::Smtp,
            simulation_transport: Transport::Smtp,
            report_server: String::new(),
            client_id: None,
            smtp_to: String::new(),
            use_expressive_subject: true,
            extra_headers: IndexMap::new(),
            telemetry: false,
            plugin_id: String::new(),
            permit_advanced_config: true,
        }
    }
}

impl Settings {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that the configured transports have the endpoints they need.
    pub fn validate(&self) -> Result<(), ReportError> {
        let smtp_needed =
            self.phishing_transport.uses_smtp() || self.simulation_transport.uses_smtp();
        if smtp_needed && self.smtp_to.is_empty() {
            return Err(ReportError::Configuration(
                "an SMTP transport is configured but smtp_to is empty".to_string(),
            ));
        }
        let http_needed =
            self.phishing_transport.uses_http() || self.simulation_transport.uses_http();
        if http_needed && self.report_server.is_empty() {
            return Err(ReportError::Configuration(
                "an HTTP transport is configured but report_server is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL of the HTTP report endpoint:
    /// `https://{server}[/{client_id}]/phishing-report`.
    pub fn report_url(&self) -> Result<String, ReportError> {
        if self.report_server.is_empty() {
            return Err(ReportError::Configuration(
                "report_server is not configured".to_string(),
            ));
        }
        let base = if self.report_server.starts_with("http://")
            || self.report_server.starts_with("https://")
        {
            self.report_server.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.report_server.trim_end_matches('/'))
        };
        let full = match self.client_id {
            Some(id) => format!("{}/{}/phishing-report", base, id),
            None => format!("{}/phishing-report", base),
        };
        url::Url::parse(&full)
            .map_err(|e| ReportError::Configuration(format!("invalid report_server: {}", e)))?;
        Ok(full)
    }
}
