//! Response verification: the [`ResponseValidator`] seam and the default
//! matcher-based implementation
//!
//! No I/O. Every check appends to one mismatch list so a failed verification
//! reports everything that is wrong, not just the first problem.

use std::fmt;

use serde_json::Value;

use crate::matcher::Mismatch;
use crate::message::{ExpectedResponse, HttpResponse, media_type};

/// Verification failure carrying every mismatch found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Response mismatch: {}", summarize(.mismatches))]
pub struct ResponseMismatch {
    pub mismatches: Vec<Mismatch>,
}

fn summarize(mismatches: &[Mismatch]) -> String {
    match mismatches {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

impl ResponseMismatch {
    /// One line per mismatch.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.mismatches.iter().map(ToString::to_string).collect()
    }
}

/// Decides whether a received response satisfies the expectation.
pub trait ResponseValidator: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ResponseMismatch`] listing each failed expectation.
    fn validate(&self, response: &HttpResponse, expected: &ExpectedResponse) -> Result<(), ResponseMismatch>;
}

/// Checks status, required headers, content type and body matchers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatcherValidator;

impl ResponseValidator for MatcherValidator {
    fn validate(&self, response: &HttpResponse, expected: &ExpectedResponse) -> Result<(), ResponseMismatch> {
        let mut mismatches = Vec::new();

        // ── Check 1: status code ──
        if response.status != expected.status {
            mismatches.push(Mismatch::new(
                "status",
                expected.status.to_string(),
                response.status.to_string(),
            ));
        }

        // ── Check 2: required headers (names case-insensitive) ──
        for (name, matcher) in &expected.headers {
            let location = format!("header {name}");
            match response.header(name) {
                Some(value) => matcher.check_text(value, &location, &mut mismatches),
                None => mismatches.push(Mismatch::new(location, matcher.to_string(), "nothing")),
            }
        }

        // ── Check 3: content type (media type only, parameters ignored) ──
        if let Some(content_type) = &expected.content_type {
            check_content_type(content_type, response, &mut mismatches);
        }

        // ── Check 4: body ──
        if let Some(matcher) = &expected.body {
            match parse_body(&response.body) {
                Some(body) => matcher.check(&body, "body", &mut mismatches),
                None => mismatches.push(Mismatch::new("body", matcher.to_string(), "an empty body")),
            }
        }

        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(ResponseMismatch { mismatches })
        }
    }
}

fn check_content_type(expected: &str, response: &HttpResponse, mismatches: &mut Vec<Mismatch>) {
    let location = "header Content-Type";
    match response.content_type() {
        Some(actual) if media_type(actual) == media_type(expected) => {}
        Some(actual) => mismatches.push(Mismatch::new(location, expected, actual)),
        // an empty response carries no content type to compare
        None if response.body.is_empty() => {}
        None => mismatches.push(Mismatch::new(location, expected, "nothing")),
    }
}

/// JSON when it parses, the raw text otherwise. Empty bodies yield `None`.
fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

impl fmt::Display for ExpectedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.status)?;
        if let Some(content_type) = &self.content_type {
            write!(f, ", {content_type}")?;
        }
        for (name, matcher) in &self.headers {
            write!(f, ", header {name}: {matcher}")?;
        }
        if let Some(body) = &self.body {
            write!(f, ", body {body}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{Bounds, Matcher};

    fn expected() -> ExpectedResponse {
        ExpectedResponse {
            status: 200,
            headers: vec![("X-Rate-Limit".into(), Matcher::Integer(Bounds::default()))],
            body: Some(Matcher::Object(vec![
                ("id".into(), Matcher::Integer(Bounds::default())),
                ("name".into(), Matcher::AnyString),
            ])),
            content_type: Some("application/json".into()),
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![
                ("content-type".into(), "application/json; charset=utf-8".into()),
                ("x-rate-limit".into(), "100".into()),
            ],
            body: body.into(),
        }
    }

    #[test]
    fn matching_response_passes() {
        let result = MatcherValidator.validate(&response(200, r#"{"id": 1, "name": "Rex"}"#), &expected());
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn every_problem_is_reported() {
        let mut bad = response(500, r#"{"id": "x"}"#);
        bad.headers = vec![("Content-Type".into(), "text/html".into())];
        let err = MatcherValidator.validate(&bad, &expected()).unwrap_err();

        let locations: Vec<_> = err.mismatches.iter().map(|m| m.location.as_str()).collect();
        assert_eq!(
            locations,
            ["status", "header X-Rate-Limit", "header Content-Type", "body.id", "body.name"]
        );
        assert_eq!(err.lines()[0], "status: expected 200, got 500");
        assert_eq!(
            err.to_string(),
            "Response mismatch: status: expected 200, got 500 (and 4 more)"
        );
    }

    #[test]
    fn status_only_expectation() {
        let expected = ExpectedResponse {
            status: 404,
            headers: vec![],
            body: None,
            content_type: None,
        };
        assert!(MatcherValidator.validate(&response(404, "anything"), &expected).is_ok());
        assert!(MatcherValidator.validate(&response(200, ""), &expected).is_err());
    }

    #[test]
    fn empty_body_against_body_matcher_fails() {
        let err = MatcherValidator.validate(&response(200, ""), &expected()).unwrap_err();
        assert_eq!(err.mismatches.len(), 1);
        assert_eq!(err.mismatches[0].actual, "an empty body");
    }

    #[test]
    fn plain_text_body_checked_as_string() {
        let expected = ExpectedResponse {
            status: 200,
            headers: vec![],
            body: Some(Matcher::AnyString),
            content_type: Some("text/plain".into()),
        };
        let response = HttpResponse {
            status: 200,
            headers: vec![("Content-Type".into(), "text/plain".into())],
            body: "pong".into(),
        };
        assert!(MatcherValidator.validate(&response, &expected).is_ok());
    }

    #[test]
    fn expected_response_display() {
        insta::assert_snapshot!(
            expected().to_string(),
            @"status 200, application/json, header X-Rate-Limit: any integer, body {id: any integer, name: any string}"
        );
    }
}
