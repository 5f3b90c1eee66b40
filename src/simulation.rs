//! Header-based detection of phishing-awareness simulation messages.
//!
//! The simulation platform stamps its test mails with vendor marker headers;
//! everything here is a pure function over an already-normalized header map.

use crate::message::HeaderMap;

/// Substring identifying vendor marker headers.
const SIMULATION_MARKER: &str = "x-lucy";
/// Substring identifying per-recipient report callback headers.
const VICTIM_URL_MARKER: &str = "victimurl";
/// Header naming the simulation campaign.
const SCENARIO_HEADER: &str = "x-lucy-scenario";

/// True iff any header name carries the simulation marker.
pub fn belongs_to_simulation(headers: &HeaderMap) -> bool {
    headers.keys().any(|key| key.contains(SIMULATION_MARKER))
}

/// Victim-report callback URLs, in header order.
///
/// One URL per matching header (its first value). Empty when the message
/// carries no callback headers, including on malformed simulation mails.
pub fn reporting_urls(headers: &HeaderMap) -> Vec<String> {
    headers
        .iter()
        .filter(|(key, _)| key.contains(SIMULATION_MARKER) && key.contains(VICTIM_URL_MARKER))
        .filter_map(|(_, values)| values.first().cloned())
        .collect()
}

/// Campaign id of a simulation message, if stamped.
pub fn scenario_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SCENARIO_HEADER)
        .and_then(|values| values.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map: HeaderMap = IndexMap::new();
        for (key, value) in pairs {
            map.entry(key.to_string())
                .or_default()
                .push(value.to_string());
        }
        map
    }

    #[test]
    fn test_simulation_marker_anywhere_in_key() {
        assert!(belongs_to_simulation(&headers(&[("x-lucy-id", "42")])));
        assert!(belongs_to_simulation(&headers(&[(
            "x-custom-x-lucy-tag",
            "1"
        )])));
        assert!(!belongs_to_simulation(&headers(&[
            ("from", "a@example.com"),
            ("subject", "hi")
        ])));
        assert!(!belongs_to_simulation(&IndexMap::new()));
    }

    #[test]
    fn test_scenario_id_first_value_or_none() {
        let map = headers(&[("x-lucy-scenario", "S1"), ("x-lucy-scenario", "S2")]);
        assert_eq!(scenario_id(&map), Some("S1".to_string()));
        assert_eq!(scenario_id(&headers(&[("from", "a@example.com")])), None);
        assert_eq!(scenario_id(&IndexMap::new()), None);
    }

    #[test]
    fn test_reporting_urls_in_header_order() {
        let map = headers(&[
            ("x-lucy-victimurl-a", "https://sim.example/r/1"),
            ("subject", "drill"),
            ("x-lucy-victimurl-b", "https://sim.example/r/2"),
            // Second value of a matching header is ignored.
            ("x-lucy-victimurl-a", "https://sim.example/r/ignored"),
        ]);
        assert_eq!(
            reporting_urls(&map),
            vec!["https://sim.example/r/1", "https://sim.example/r/2"]
        );
    }

    #[test]
    fn test_reporting_urls_requires_both_markers() {
        let map = headers(&[
            ("x-lucy-id", "42"),
            ("x-other-victimurl", "https://elsewhere.example/r"),
        ]);
        assert!(reporting_urls(&map).is_empty());
    }
}
