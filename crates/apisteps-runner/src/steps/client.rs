//! Operation → request message and expected response

use std::sync::Arc;

use apisteps_core::variables::placeholder;
use apisteps_core::{
    Config, DataDictionary, Document, Operation, ParamLocation, SchemaError, VariableContext,
};
use rand::Rng;
use serde_json::Value;

use super::{ClientSteps, StepError, StepSettings};
use crate::datagen;
use crate::locator::{LocatedOperation, find_operation};
use crate::message::{CONTENT_TYPE, ExpectedResponse, HttpRequest, RequestMessage, encode_path_segment};

/// Status expected when a response is named rather than numbered.
const DEFAULT_STATUS: u16 = 200;

/// A loaded document bound to a server, shared by every scenario.
#[derive(Debug, Clone)]
pub struct OpenApiClient {
    document: Arc<Document>,
    base_url: String,
    default_headers: Vec<(String, String)>,
    variables: VariableContext,
    outbound: DataDictionary,
    inbound: DataDictionary,
    settings: StepSettings,
}

impl OpenApiClient {
    pub fn new(document: Arc<Document>, base_url: impl Into<String>) -> Self {
        Self {
            document,
            base_url: base_url.into(),
            default_headers: Vec::new(),
            variables: VariableContext::new(),
            outbound: DataDictionary::new(),
            inbound: DataDictionary::new(),
            settings: StepSettings::default(),
        }
    }

    /// Load the configured document and apply the rest of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the document cannot be loaded.
    pub fn from_config(config: &Config) -> Result<Self, SchemaError> {
        let document = Document::load(&config.spec)?;
        Ok(Self {
            document: Arc::new(document),
            base_url: config.base_url.clone(),
            default_headers: config
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            variables: config.variables.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect(),
            outbound: config.outbound_dictionary.clone(),
            inbound: config.inbound_dictionary.clone(),
            settings: StepSettings {
                timeout: config.timeout(),
                fork: config.fork,
            },
        })
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_variables(mut self, variables: VariableContext) -> Self {
        self.variables = variables;
        self
    }

    #[must_use]
    pub fn with_outbound_dictionary(mut self, dictionary: DataDictionary) -> Self {
        self.outbound = dictionary;
        self
    }

    #[must_use]
    pub fn with_inbound_dictionary(mut self, dictionary: DataDictionary) -> Self {
        self.inbound = dictionary;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: StepSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub const fn settings(&self) -> StepSettings {
        self.settings
    }

    /// Variables every new scenario starts with.
    #[must_use]
    pub const fn initial_variables(&self) -> &VariableContext {
        &self.variables
    }

    /// Start a scenario using the default transport and validator.
    #[must_use]
    pub fn steps(&self) -> ClientSteps<'_> {
        ClientSteps::new(self)
    }

    /// # Errors
    ///
    /// Returns [`StepError::OperationNotFound`] if no operation has this id.
    pub fn locate(&self, operation_id: &str) -> Result<LocatedOperation<'_>, StepError> {
        find_operation(&self.document, operation_id)
            .ok_or_else(|| StepError::OperationNotFound(operation_id.to_string()))
    }

    /// Synthesize the request for `located`.
    ///
    /// Required header and query parameters get generated values. Every path
    /// parameter is substituted: with a `${name}` placeholder when the
    /// variable context defines `name`, otherwise with a generated value.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Schema`] if a parameter or body schema cannot be
    /// synthesized.
    pub fn build_request(
        &self,
        located: &LocatedOperation<'_>,
        variables: &VariableContext,
        rng: &mut impl Rng,
    ) -> Result<RequestMessage, StepError> {
        let operation = located.operation;
        let document = self.document.as_ref();

        let mut headers = Vec::new();
        for param in operation.parameters_in(ParamLocation::Header).filter(|p| p.required) {
            let value = datagen::generate(&param.schema, document, rng, &format!("header {}", param.name))?;
            headers.push((param.name.clone(), value_to_param_string(&value)));
        }

        let mut query = Vec::new();
        for param in operation.parameters_in(ParamLocation::Query).filter(|p| p.required) {
            let value = datagen::generate(&param.schema, document, rng, &format!("query {}", param.name))?;
            query.push((param.name.clone(), value_to_param_string(&value)));
        }

        for param in operation.parameters_in(ParamLocation::Cookie).filter(|p| p.required) {
            tracing::warn!(operation = %located.label(), cookie = %param.name, "cookie parameters are not sent");
        }

        let mut path = located.path.to_string();
        for param in operation.parameters_in(ParamLocation::Path) {
            let value = if variables.contains(&param.name) {
                placeholder(&param.name)
            } else {
                let generated = datagen::generate(&param.schema, document, rng, &format!("path {}", param.name))?;
                encode_path_segment(&value_to_param_string(&generated)).into_owned()
            };
            path = path.replace(&format!("{{{}}}", param.name), &value);
        }

        let body = match operation.request_body_schema() {
            Some(schema) => {
                let mut value = datagen::generate(schema, document, rng, "body")?;
                if schema.is_structured() {
                    self.outbound.apply(&mut value);
                }
                Some(value)
            }
            None => None,
        };

        let content_type = operation.request_content_type().map(String::from);
        if let Some(content_type) = &content_type {
            headers.push((CONTENT_TYPE.to_string(), content_type.clone()));
        }

        tracing::debug!(
            operation = %located.label(),
            %path,
            headers = headers.len(),
            query = query.len(),
            body = body.is_some(),
            "built request"
        );

        Ok(RequestMessage {
            method: located.method,
            path,
            headers,
            query,
            body,
            content_type,
        })
    }

    /// Expectation for response `key`: a status code (`"404"`) or a response
    /// name such as `default`, which expects status 200.
    ///
    /// A key with no declared response (and no `default`) yields a
    /// status-only expectation.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Schema`] if a header or body schema cannot be
    /// turned into a matcher, [`StepError::InvalidStatus`] for a numeric key
    /// outside the HTTP status range.
    pub fn expected_response(&self, operation: &Operation, key: &str) -> Result<ExpectedResponse, StepError> {
        let document = self.document.as_ref();
        let status = if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            key.parse::<u16>()
                .map_err(|_| StepError::InvalidStatus(key.to_string()))?
        } else {
            DEFAULT_STATUS
        };

        let mut expected = ExpectedResponse {
            status,
            headers: Vec::new(),
            body: None,
            content_type: None,
        };

        let Some(response) = operation.response_by_key(key) else {
            tracing::debug!(key, "no response declared, expecting status only");
            return Ok(expected);
        };
        if !operation.responses.iter().any(|(k, _)| k == key) {
            tracing::debug!(key, "falling back to default response");
        }

        for (name, schema) in response.required_headers() {
            let matcher = datagen::expect(schema, document, &format!("header {name}"))?;
            expected.headers.push((name.to_string(), matcher));
        }

        // a declared media type is expected even without a body schema
        expected.content_type = response.content_type.clone();
        if let Some(schema) = &response.schema {
            let mut matcher = datagen::expect(schema, document, "body")?;
            if schema.is_structured() {
                matcher.apply_dictionary(&self.inbound);
            }
            expected.body = Some(matcher);
            if expected.content_type.is_none() {
                expected.content_type = document.response_content_type(operation).map(String::from);
            }
        }

        Ok(expected)
    }

    /// Resolve placeholders and attach base URL and default headers.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::UnknownVariable`] for a placeholder with no value.
    pub fn resolve_request(
        &self,
        message: &RequestMessage,
        variables: &VariableContext,
    ) -> Result<HttpRequest, StepError> {
        Ok(message.resolve(&self.base_url, &self.default_headers, variables)?)
    }
}

/// Strings are sent bare, everything else as JSON text.
fn value_to_param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
