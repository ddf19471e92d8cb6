//! Serializable record of one operation exchange
//!
//! JSON Schema is exported via [`generate_schema`] for consumers of the
//! CLI's `--output json`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Response bodies longer than this are truncated in reports.
pub const MAX_BODY_BYTES: usize = 4096;

/// Where the exchange ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Request built (and sent, unless planning), response not yet verified
    Sent,
    /// Response matched the expectation
    Verified,
    /// Response did not match, or the exchange failed
    Failed,
}

/// Request as handed to the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequestSnapshot {
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// Response as received
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseSnapshot {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ResponseSnapshot {
    /// Snapshot with the body cut to [`MAX_BODY_BYTES`] on a char boundary.
    #[must_use]
    pub fn new(status_code: u16, headers: BTreeMap<String, String>, body: &str) -> Self {
        let body = if body.is_empty() {
            None
        } else {
            Some(truncate(body, MAX_BODY_BYTES).to_string())
        };
        Self {
            status_code,
            headers,
            body,
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// One invoked operation and its verification result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExchangeReport {
    pub operation_id: String,
    pub method: String,
    pub request: RequestSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSnapshot>,
    /// Status the response was verified against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<u16>,
    pub outcome: Outcome,
    /// Human-readable mismatch lines, empty unless `outcome` is `failed`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<String>,
}

/// Generate JSON Schema for [`ExchangeReport`].
#[must_use]
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(ExchangeReport);
    serde_json::to_string_pretty(&schema).expect("schema serialization should not fail")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report() -> ExchangeReport {
        ExchangeReport {
            operation_id: "getPet".into(),
            method: "GET".into(),
            request: RequestSnapshot {
                url: "http://localhost:8080/pets/7".into(),
                headers: BTreeMap::new(),
                query: BTreeMap::new(),
                body: None,
            },
            response: Some(ResponseSnapshot::new(200, BTreeMap::new(), r#"{"id":7}"#)),
            expected_status: Some(200),
            outcome: Outcome::Verified,
            mismatches: vec![],
        }
    }

    #[test]
    fn serializes_without_empty_fields() {
        let text = serde_json::to_string_pretty(&report()).unwrap();
        insta::assert_snapshot!(text, @r#"
        {
          "operation_id": "getPet",
          "method": "GET",
          "request": {
            "url": "http://localhost:8080/pets/7"
          },
          "response": {
            "status_code": 200,
            "body": "{\"id\":7}"
          },
          "expected_status": 200,
          "outcome": "verified"
        }
        "#);
    }

    #[test]
    fn roundtrip() {
        let mut failed = report();
        failed.request.body = Some(json!({"name": "Rex"}));
        failed.outcome = Outcome::Failed;
        failed.mismatches = vec!["status: expected 200, got 500".into()];
        let text = serde_json::to_string(&failed).unwrap();
        let back: ExchangeReport = serde_json::from_str(&text).unwrap();
        assert_eq!(back, failed);
    }

    #[test]
    fn long_body_truncated_on_char_boundary() {
        let body = "é".repeat(MAX_BODY_BYTES);
        let snapshot = ResponseSnapshot::new(200, BTreeMap::new(), &body);
        let kept = snapshot.body.unwrap();
        assert!(kept.len() <= MAX_BODY_BYTES);
        assert_eq!(kept.len() % 2, 0);
    }

    #[test]
    fn empty_body_is_none() {
        assert!(ResponseSnapshot::new(204, BTreeMap::new(), "").body.is_none());
    }
}
