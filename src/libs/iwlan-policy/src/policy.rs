//! Carrier error-policy table: JSON parsing and the match/fallback ladder.
//!
//! The carrier supplies a JSON array of per-APN policies. Each policy lists
//! error-type entries in priority order; the first entry whose key matches a
//! raised error wins. A malformed entry discards only itself; the rest of
//! the document stays in force.

use std::collections::HashSet;

use serde::Deserialize;

use iwlan_core::IwlanEvent;

use crate::error::IwlanError;

/// The two error families a policy entry can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyErrorType {
    IkeProtocol,
    Generic,
}

/// Which errors an entry's `ErrorDetails` match.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PolicyDetails {
    /// `"*"`: every error of the entry's type.
    Wildcard,
    /// Explicit IKEv2 notify codes.
    IkeCodes(Vec<u16>),
    /// Symbolic generic error names.
    GenericNames(Vec<String>),
}

/// One validated policy entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEntry {
    error_type: PolicyErrorType,
    details: PolicyDetails,
    retry_secs: Vec<u64>,
    unthrottling_events: HashSet<IwlanEvent>,
    builtin: bool,
}

impl PolicyEntry {
    fn builtin_wildcard(error_type: PolicyErrorType) -> Self {
        PolicyEntry {
            error_type,
            details: PolicyDetails::Wildcard,
            retry_secs: DEFAULT_RETRY_SECS.to_vec(),
            unthrottling_events: HashSet::new(),
            builtin: true,
        }
    }

    pub fn matches(&self, error: &IwlanError) -> bool {
        match (self.error_type, error) {
            (PolicyErrorType::IkeProtocol, IwlanError::IkeProtocolError(code)) => {
                match &self.details {
                    PolicyDetails::Wildcard => true,
                    PolicyDetails::IkeCodes(codes) => codes.contains(code),
                    PolicyDetails::GenericNames(_) => false,
                }
            }
            (PolicyErrorType::Generic, error) => match error.generic_name() {
                Some(name) => match &self.details {
                    PolicyDetails::Wildcard => true,
                    PolicyDetails::GenericNames(names) => names.iter().any(|n| n == name),
                    PolicyDetails::IkeCodes(_) => false,
                },
                None => false,
            },
            _ => false,
        }
    }

    pub fn is_generic_wildcard(&self) -> bool {
        self.error_type == PolicyErrorType::Generic && self.details == PolicyDetails::Wildcard
    }

    pub fn retry_secs(&self) -> &[u64] {
        &self.retry_secs
    }

    pub fn unthrottles_on(&self, event: IwlanEvent) -> bool {
        self.unthrottling_events.contains(&event)
    }

    /// Built-in entries saturate at their tail; carrier-configured entries
    /// give up once the array is exhausted.
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }
}

/// Hard-coded fallback when nothing else matches.
pub const DEFAULT_RETRY_SECS: [u64; 3] = [5, 10, 15];

#[derive(Debug, Deserialize)]
struct RawApnPolicy {
    #[serde(rename = "ApnName")]
    apn_name: String,
    #[serde(rename = "ErrorTypes")]
    error_types: Vec<RawErrorType>,
}

#[derive(Debug, Deserialize)]
struct RawErrorType {
    #[serde(rename = "ErrorType")]
    error_type: String,
    #[serde(rename = "ErrorDetails")]
    error_details: Vec<String>,
    #[serde(rename = "RetryArray")]
    retry_array: Vec<String>,
    #[serde(rename = "UnthrottlingEvents", default)]
    unthrottling_events: Vec<String>,
}

/// Ordered per-APN policy table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyTable {
    policies: Vec<(String, Vec<PolicyEntry>)>,
}

impl PolicyTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a carrier JSON document. A document that fails to parse at the
    /// top level yields an empty table (the engine then serves defaults);
    /// a malformed entry inside an otherwise valid document is discarded
    /// alone.
    pub fn from_json(json: &str) -> Self {
        let raw: Vec<RawApnPolicy> = match serde_json::from_str(json) {
            Ok(raw) => raw,
            Err(e) => {
                log::error!("error policy config unparsable, using defaults: {e}");
                return Self::empty();
            }
        };

        let mut policies = Vec::new();
        for apn_policy in raw {
            let mut entries = Vec::new();
            for raw_entry in apn_policy.error_types {
                match validate_entry(&raw_entry) {
                    Some(entry) => entries.push(entry),
                    None => {
                        log::warn!(
                            "discarding malformed error policy entry for apn {:?} (type {:?})",
                            apn_policy.apn_name,
                            raw_entry.error_type
                        );
                    }
                }
            }
            policies.push((apn_policy.apn_name, entries));
        }
        PolicyTable { policies }
    }

    fn entries_for(&self, apn: &str) -> Option<&[PolicyEntry]> {
        self.policies
            .iter()
            .find(|(name, _)| name == apn)
            .map(|(_, entries)| entries.as_slice())
    }

    /// Resolve the policy for a raised error. Ladder: declaration-order
    /// first match within the APN, then the APN's generic wildcard entry,
    /// then the built-in default for the error's type.
    pub fn find(&self, apn: &str, error: &IwlanError) -> PolicyEntry {
        if let Some(entries) = self.entries_for(apn) {
            if let Some(entry) = entries.iter().find(|e| e.matches(error)) {
                return entry.clone();
            }
            if let Some(entry) = entries.iter().find(|e| e.is_generic_wildcard()) {
                return entry.clone();
            }
        }

        let error_type = match error {
            IwlanError::IkeProtocolError(_) => PolicyErrorType::IkeProtocol,
            _ => PolicyErrorType::Generic,
        };
        PolicyEntry::builtin_wildcard(error_type)
    }
}

fn validate_entry(raw: &RawErrorType) -> Option<PolicyEntry> {
    let error_type = match raw.error_type.as_str() {
        "IKE_PROTOCOL_ERROR_TYPE" => PolicyErrorType::IkeProtocol,
        "GENERIC_ERROR_TYPE" => PolicyErrorType::Generic,
        _ => return None,
    };

    if raw.error_details.is_empty() || raw.retry_array.is_empty() {
        return None;
    }

    let details = if raw.error_details.iter().any(|d| d == "*") {
        PolicyDetails::Wildcard
    } else {
        match error_type {
            PolicyErrorType::IkeProtocol => {
                let mut codes = Vec::with_capacity(raw.error_details.len());
                for detail in &raw.error_details {
                    let code: u16 = detail.parse().ok()?;
                    if code == 0 {
                        return None;
                    }
                    codes.push(code);
                }
                PolicyDetails::IkeCodes(codes)
            }
            PolicyErrorType::Generic => {
                for detail in &raw.error_details {
                    if !IwlanError::is_known_generic_name(detail) {
                        return None;
                    }
                }
                PolicyDetails::GenericNames(raw.error_details.clone())
            }
        }
    };

    let mut retry_secs = Vec::with_capacity(raw.retry_array.len());
    for value in &raw.retry_array {
        retry_secs.push(value.trim().parse::<u64>().ok()?);
    }

    // Unknown event names are dropped leniently; they never invalidate the
    // entry.
    let unthrottling_events = raw
        .unthrottling_events
        .iter()
        .filter_map(|name| IwlanEvent::from_unthrottling_name(name))
        .collect();

    Some(PolicyEntry {
        error_type,
        details,
        retry_secs,
        unthrottling_events,
        builtin: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ike_notify;

    fn config_with_entries(apn: &str, entries: &str) -> String {
        format!(r#"[{{"ApnName": "{apn}", "ErrorTypes": [{entries}]}}]"#)
    }

    const IKE_24_34: &str = r#"{"ErrorType": "IKE_PROTOCOL_ERROR_TYPE",
        "ErrorDetails": ["24", "34"],
        "RetryArray": ["4", "8", "16"],
        "UnthrottlingEvents": ["APM_ENABLE_EVENT", "WIFI_AP_CHANGED_EVENT"]}"#;

    #[test]
    fn test_first_matching_entry_wins() {
        let json = config_with_entries(
            "ims",
            &format!(
                r#"{IKE_24_34}, {{"ErrorType": "IKE_PROTOCOL_ERROR_TYPE",
                    "ErrorDetails": ["*"], "RetryArray": ["0"],
                    "UnthrottlingEvents": ["APM_ENABLE_EVENT"]}}"#
            ),
        );
        let table = PolicyTable::from_json(&json);

        let explicit = table.find("ims", &IwlanError::IkeProtocolError(24));
        assert_eq!(explicit.retry_secs(), &[4, 8, 16]);

        // Code 44 misses the explicit entry and lands on the same-type
        // wildcard declared after it.
        let wildcard = table.find("ims", &IwlanError::IkeProtocolError(44));
        assert_eq!(wildcard.retry_secs(), &[0]);
        assert!(!wildcard.is_builtin());
    }

    #[test]
    fn test_malformed_entry_discarded_alone() {
        let json = config_with_entries(
            "ims",
            r#"{"ErrorType": "IKE_PROTOCOL_ERROR_TYPE",
                "ErrorDetails": ["WRONG_ERROR_DETAIL"],
                "RetryArray": ["4", "8", "16"],
                "UnthrottlingEvents": []},
               {"ErrorType": "GENERIC_ERROR_TYPE",
                "ErrorDetails": ["SERVER_SELECTION_FAILED"],
                "RetryArray": ["0"],
                "UnthrottlingEvents": []}"#,
        );
        let table = PolicyTable::from_json(&json);

        // The broken IKE entry fell away, so code 24 resolves to the
        // built-in default.
        let fallback = table.find("ims", &IwlanError::IkeProtocolError(24));
        assert!(fallback.is_builtin());
        assert_eq!(fallback.retry_secs(), &DEFAULT_RETRY_SECS);

        // The valid generic entry survived.
        let generic = table.find("ims", &IwlanError::ServerSelectionFailed);
        assert_eq!(generic.retry_secs(), &[0]);
        assert!(!generic.is_builtin());
    }

    #[test]
    fn test_unparsable_document_yields_empty_table() {
        let table = PolicyTable::from_json("not json at all");
        assert_eq!(table, PolicyTable::empty());

        let entry = table.find("ims", &IwlanError::IkeProtocolError(24));
        assert!(entry.is_builtin());
    }

    #[test]
    fn test_generic_wildcard_catches_unmatched_ike_error() {
        let json = config_with_entries(
            "ims",
            r#"{"ErrorType": "GENERIC_ERROR_TYPE",
                "ErrorDetails": ["*"],
                "RetryArray": ["2", "4"],
                "UnthrottlingEvents": []}"#,
        );
        let table = PolicyTable::from_json(&json);

        let entry = table.find("ims", &IwlanError::IkeProtocolError(99));
        assert_eq!(entry.retry_secs(), &[2, 4]);
    }

    #[test]
    fn test_unknown_apn_uses_builtin_default() {
        let table = PolicyTable::from_json(&config_with_entries("ims", IKE_24_34));
        let entry = table.find("mms", &IwlanError::IkeProtocolError(24));
        assert!(entry.is_builtin());
        assert_eq!(entry.retry_secs(), &DEFAULT_RETRY_SECS);
    }

    #[test]
    fn test_unknown_unthrottling_event_dropped_leniently() {
        let json = config_with_entries(
            "ims",
            r#"{"ErrorType": "IKE_PROTOCOL_ERROR_TYPE",
                "ErrorDetails": ["24"],
                "RetryArray": ["4"],
                "UnthrottlingEvents": ["NOT_A_REAL_EVENT", "APM_ENABLE_EVENT"]}"#,
        );
        let table = PolicyTable::from_json(&json);
        let entry = table.find("ims", &IwlanError::IkeProtocolError(24));
        assert!(entry.unthrottles_on(IwlanEvent::ApmEnable));
        assert!(!entry.unthrottles_on(IwlanEvent::WifiDisable));
    }

    #[test]
    fn test_negative_retry_value_invalidates_entry() {
        let json = config_with_entries(
            "ims",
            r#"{"ErrorType": "IKE_PROTOCOL_ERROR_TYPE",
                "ErrorDetails": ["24"],
                "RetryArray": ["4", "-8"],
                "UnthrottlingEvents": []}"#,
        );
        let table = PolicyTable::from_json(&json);
        assert!(table.find("ims", &IwlanError::IkeProtocolError(24)).is_builtin());
    }

    #[test]
    fn test_generic_entry_never_matches_by_ike_code() {
        let json = config_with_entries(
            "ims",
            r#"{"ErrorType": "GENERIC_ERROR_TYPE",
                "ErrorDetails": ["SERVER_SELECTION_FAILED"],
                "RetryArray": ["1"],
                "UnthrottlingEvents": []}"#,
        );
        let table = PolicyTable::from_json(&json);
        let entry = table.find(
            "ims",
            &IwlanError::IkeProtocolError(ike_notify::AUTHENTICATION_FAILED),
        );
        assert!(entry.is_builtin());
    }
}
