//! Step-level API: configure, invoke an operation, verify its response
//!
//! [`OpenApiClient`] holds what every scenario shares (the document, server
//! and dictionaries). [`ClientSteps`] owns one scenario's state and walks a
//! single invocation through Idle → Located → Sent → Verified | Failed.

mod client;

use std::sync::Arc;
use std::time::Duration;

use apisteps_core::{ExchangeReport, Outcome, SchemaError, UnknownVariable, VariableContext};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::locator::LocatedOperation;
use crate::message::{HttpRequest, HttpResponse};
use crate::transport::{PendingResponse, ReqwestTransport, Transport, TransportError};
use crate::validate::{MatcherValidator, ResponseMismatch, ResponseValidator};

pub use client::OpenApiClient;

/// Default exchange timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("Operation not found: {0}")]
    OperationNotFound(String),
    #[error("No operation has been invoked")]
    NoActiveOperation,
    #[error("Invalid step order: {0}")]
    InvalidState(String),
    #[error("Invalid status code: {0}")]
    InvalidStatus(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    ResponseMismatch(#[from] ResponseMismatch),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    UnknownVariable(#[from] UnknownVariable),
}

impl StepError {
    /// Report lines: one per mismatch, or the error message.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::ResponseMismatch(mismatch) => mismatch.lines(),
            other => vec![other.to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSettings {
    pub timeout: Duration,
    /// Run the exchange on a background thread; verification joins it.
    pub fork: bool,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            fork: false,
        }
    }
}

/// Where the current invocation stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Located,
    Sent,
    Verified,
    Failed,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Located => "located",
            Self::Sent => "sent",
            Self::Verified => "verified",
            Self::Failed => "failed",
        }
    }
}

/// State of the most recent `invoke_operation`.
#[derive(Debug, Default)]
struct Invocation<'c> {
    operation_id: String,
    phase: Phase,
    located: Option<LocatedOperation<'c>>,
    request: Option<HttpRequest>,
    pending: Option<PendingResponse>,
    response: Option<HttpResponse>,
    expected_status: Option<u16>,
    mismatches: Vec<String>,
}

impl Invocation<'_> {
    fn new(operation_id: &str) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            ..Self::default()
        }
    }
}

/// Everything one scenario owns.
#[derive(Debug)]
struct ScenarioContext<'c> {
    variables: VariableContext,
    rng: SmallRng,
    invocation: Invocation<'c>,
}

/// Steps for one scenario against an [`OpenApiClient`].
pub struct ClientSteps<'c> {
    client: &'c OpenApiClient,
    transport: Arc<dyn Transport>,
    validator: Box<dyn ResponseValidator>,
    settings: StepSettings,
    context: ScenarioContext<'c>,
}

impl<'c> ClientSteps<'c> {
    #[must_use]
    pub fn new(client: &'c OpenApiClient) -> Self {
        Self {
            client,
            transport: Arc::new(ReqwestTransport::new()),
            validator: Box::new(MatcherValidator),
            settings: client.settings(),
            context: ScenarioContext {
                variables: client.initial_variables().clone(),
                rng: SmallRng::from_entropy(),
                invocation: Invocation::default(),
            },
        }
    }

    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: impl ResponseValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Replace the generator, e.g. with a seeded one for reproducible runs.
    #[must_use]
    pub fn with_rng(mut self, rng: SmallRng) -> Self {
        self.context.rng = rng;
        self
    }

    #[must_use]
    pub fn variables(&self) -> &VariableContext {
        &self.context.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableContext {
        &mut self.context.variables
    }

    #[must_use]
    pub const fn settings(&self) -> StepSettings {
        self.settings
    }

    pub fn configure_timeout(&mut self, timeout: Duration) {
        self.settings.timeout = timeout;
    }

    pub fn configure_fork_mode(&mut self, fork: bool) {
        self.settings.fork = fork;
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.context.invocation.phase
    }

    /// The request most recently sent.
    #[must_use]
    pub fn last_request(&self) -> Option<&HttpRequest> {
        self.context.invocation.request.as_ref()
    }

    /// The response most recently verified.
    #[must_use]
    pub fn last_response(&self) -> Option<&HttpResponse> {
        self.context.invocation.response.as_ref()
    }

    /// Locate `operation_id`, synthesize its request and send it.
    ///
    /// Discards the previous invocation. In fork mode the exchange continues
    /// on a background thread until the next verification.
    ///
    /// # Errors
    ///
    /// [`StepError::OperationNotFound`], [`StepError::Schema`] when the
    /// request cannot be synthesized, or [`StepError::UnknownVariable`] for an
    /// unresolvable placeholder. Transport failures surface on verification.
    pub fn invoke_operation(&mut self, operation_id: &str) -> Result<(), StepError> {
        let client = self.client;
        // join an exchange nobody verified so no forked request outlives its step
        if let Some(pending) = self.context.invocation.pending.take() {
            let previous = &self.context.invocation.operation_id;
            match pending.wait() {
                Ok(response) => {
                    tracing::warn!(operation = %previous, status = response.status, "response was never verified");
                }
                Err(e) => tracing::warn!(operation = %previous, error = %e, "unverified exchange failed"),
            }
        }
        self.context.invocation = Invocation::new(operation_id);

        let located = client.locate(operation_id).map_err(|e| self.fail(e))?;
        self.context.invocation.located = Some(located);
        self.context.invocation.phase = Phase::Located;

        let message = client
            .build_request(&located, &self.context.variables, &mut self.context.rng)
            .map_err(|e| self.fail(e))?;
        let request = client
            .resolve_request(&message, &self.context.variables)
            .map_err(|e| self.fail(e))?;

        tracing::info!(
            operation = %located.label(),
            url = %request.url,
            fork = self.settings.fork,
            "sending request"
        );
        let pending = PendingResponse::start(
            &self.transport,
            request.clone(),
            self.settings.timeout,
            self.settings.fork,
        );
        self.context.invocation.request = Some(request);
        self.context.invocation.pending = Some(pending);
        self.context.invocation.phase = Phase::Sent;
        Ok(())
    }

    /// Verify against the response declared for `status` (or `default`).
    ///
    /// # Errors
    ///
    /// See [`ClientSteps::verify_response_by_name`].
    pub fn verify_response_by_status(&mut self, status: u16) -> Result<(), StepError> {
        self.verify(&status.to_string())
    }

    /// Verify against the response declared under `name`. A numeric name is a
    /// status code; any other name expects status 200.
    ///
    /// # Errors
    ///
    /// [`StepError::NoActiveOperation`] before any invocation,
    /// [`StepError::InvalidState`] when the invocation is already settled,
    /// [`StepError::ResponseMismatch`] from the validator unchanged, or the
    /// transport's error.
    pub fn verify_response_by_name(&mut self, name: &str) -> Result<(), StepError> {
        self.verify(name)
    }

    fn verify(&mut self, key: &str) -> Result<(), StepError> {
        let invocation = &self.context.invocation;
        let located = match (invocation.phase, invocation.located) {
            (Phase::Idle, _) => return Err(StepError::NoActiveOperation),
            (Phase::Sent, Some(located)) => located,
            (phase, _) => {
                return Err(StepError::InvalidState(format!(
                    "operation {} is {}",
                    invocation.operation_id,
                    phase.as_str()
                )));
            }
        };

        let expected = self
            .client
            .expected_response(located.operation, key)
            .map_err(|e| self.fail(e))?;
        self.context.invocation.expected_status = Some(expected.status);

        let Some(pending) = self.context.invocation.pending.take() else {
            return Err(self.fail(StepError::InvalidState("no request in flight".into())));
        };
        let response = pending.wait().map_err(|e| self.fail(e.into()))?;
        let result = self.validator.validate(&response, &expected);
        self.context.invocation.response = Some(response);

        match result {
            Ok(()) => {
                tracing::info!(operation = %located.label(), %expected, "response verified");
                self.context.invocation.phase = Phase::Verified;
                Ok(())
            }
            Err(mismatch) => Err(self.fail(mismatch.into())),
        }
    }

    fn fail(&mut self, err: StepError) -> StepError {
        self.context.invocation.mismatches = err.lines();
        self.context.invocation.phase = Phase::Failed;
        err
    }

    /// Snapshot of the current invocation, once a request has been built.
    #[must_use]
    pub fn report(&self) -> Option<ExchangeReport> {
        let invocation = &self.context.invocation;
        let located = invocation.located?;
        let request = invocation.request.as_ref()?;
        let outcome = match invocation.phase {
            Phase::Verified => Outcome::Verified,
            Phase::Failed => Outcome::Failed,
            _ => Outcome::Sent,
        };
        Some(ExchangeReport {
            operation_id: invocation.operation_id.clone(),
            method: located.method.to_string(),
            request: request.snapshot(),
            response: invocation.response.as_ref().map(HttpResponse::snapshot),
            expected_status: invocation.expected_status,
            outcome,
            mismatches: invocation.mismatches.clone(),
        })
    }
}
