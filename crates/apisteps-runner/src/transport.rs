//! Sending requests: the [`Transport`] seam and its reqwest implementation

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use apisteps_core::HttpMethod;

use crate::message::{HttpRequest, HttpResponse};

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Exchange thread panicked")]
    Panicked,
}

/// Performs one HTTP exchange.
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response could be obtained.
    fn exchange(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError>;
}

/// Blocking reqwest client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for ReqwestTransport {
    fn exchange(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(reqwest_method(request.method), &request.url)
            .timeout(timeout);
        for (name, value) in &request.headers {
            if reqwest::header::HeaderValue::from_str(value).is_err() {
                return Err(TransportError::InvalidRequest(format!(
                    "header {name} has a value HTTP cannot carry"
                )));
            }
            builder = builder.header(name, value);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().map_err(|e| TransportError::Http(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Trace => reqwest::Method::TRACE,
    }
}

/// A response that may still be in flight on a background thread.
#[derive(Debug)]
pub enum PendingResponse {
    Complete(Result<HttpResponse, TransportError>),
    Forked(JoinHandle<Result<HttpResponse, TransportError>>),
}

impl PendingResponse {
    /// Run the exchange now, or on a spawned thread when `fork` is set.
    pub fn start(transport: &Arc<dyn Transport>, request: HttpRequest, timeout: Duration, fork: bool) -> Self {
        if !fork {
            return Self::Complete(transport.exchange(&request, timeout));
        }
        let transport = Arc::clone(transport);
        Self::Forked(std::thread::spawn(move || transport.exchange(&request, timeout)))
    }

    /// Block until the response is available.
    ///
    /// # Errors
    ///
    /// Returns the transport's error, or [`TransportError::Panicked`].
    pub fn wait(self) -> Result<HttpResponse, TransportError> {
        match self {
            Self::Complete(result) => result,
            Self::Forked(handle) => handle.join().map_err(|_| TransportError::Panicked)?,
        }
    }
}
