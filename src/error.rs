/// Failures surfaced by the report dispatch engine.
///
/// The orchestrator is the only place that converts these into a
/// user-facing `ReportResult`; the display strings double as the result's
/// diagnosis text, so they must never embed the reported message's content
/// or headers.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to retrieve message for reporting: {0}")]
    Fetch(String),
    #[error("Mail server error {code} ({name}): {message}")]
    Protocol {
        code: u32,
        name: String,
        message: String,
    },
    #[error("Malformed mail server response: {0}")]
    MalformedResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Partial delivery failure: {0}")]
    PartialFailure(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl From<crate::mailbox::HostError> for ReportError {
    fn from(e: crate::mailbox::HostError) -> Self {
        ReportError::Protocol {
            code: e.code,
            name: e.name,
            message: e.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnosis_text_is_short_and_labelled() {
        let err = ReportError::Protocol {
            code: 9020,
            name: "ErrorInvalidRequest".to_string(),
            message: "The request is invalid.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Mail server error 9020 (ErrorInvalidRequest): The request is invalid."
        );

        let err = ReportError::Configuration("spam reports cannot use the http transport".to_string());
        assert!(err.to_string().starts_with("Configuration error:"));
    }
}
