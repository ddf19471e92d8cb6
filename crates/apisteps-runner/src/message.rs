//! Synthesized messages and the wire-level request/response pair

use std::borrow::Cow;

use apisteps_core::{HttpMethod, RequestSnapshot, ResponseSnapshot, VariableContext, UnknownVariable};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::Value;

use crate::matcher::Matcher;

pub const CONTENT_TYPE: &str = "Content-Type";

/// Characters escaped in a single path segment (the URL standard's path set
/// plus `/` and `%`).
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encode `value` for use as one path segment.
#[must_use]
pub fn encode_path_segment(value: &str) -> Cow<'_, str> {
    utf8_percent_encode(value, PATH_SEGMENT).into()
}

/// Request built from an operation. `path` may still hold `${name}`
/// placeholders; they are resolved by [`RequestMessage::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMessage {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub content_type: Option<String>,
}

impl RequestMessage {
    /// Substitute path placeholders (values percent-encoded) and prefix
    /// `base_url`.
    ///
    /// `default_headers` are sent unless the message sets the same header.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownVariable`] for a placeholder with no value.
    pub fn resolve(
        &self,
        base_url: &str,
        default_headers: &[(String, String)],
        variables: &VariableContext,
    ) -> Result<HttpRequest, UnknownVariable> {
        let path = variables.resolve_with(&self.path, encode_path_segment)?;
        let url = format!("{}{}", base_url.trim_end_matches('/'), path);
        if path != self.path {
            tracing::debug!(template = %self.path, %path, "substituted path variables");
        }

        let mut headers: Vec<(String, String)> = default_headers
            .iter()
            .filter(|(name, _)| !self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)))
            .cloned()
            .collect();
        headers.extend(self.headers.iter().cloned());

        Ok(HttpRequest {
            method: self.method,
            url,
            headers,
            query: self.query.clone(),
            body: self.body.as_ref().map(Value::to_string),
        })
    }
}

/// Fully resolved request handed to a [`crate::Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    #[must_use]
    pub fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            url: self.url.clone(),
            headers: self.headers.iter().cloned().collect(),
            query: self.query.iter().cloned().collect(),
            body: self.body.as_deref().map(|text| {
                serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }

    #[must_use]
    pub fn snapshot(&self) -> ResponseSnapshot {
        ResponseSnapshot::new(self.status, self.headers.iter().cloned().collect(), &self.body)
    }
}

/// What a response must look like to pass verification.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedResponse {
    pub status: u16,
    pub headers: Vec<(String, Matcher)>,
    pub body: Option<Matcher>,
    pub content_type: Option<String>,
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Media type without parameters, lowercased (`application/json; charset=utf-8` → `application/json`).
#[must_use]
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
