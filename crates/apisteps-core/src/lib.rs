//! apisteps-core: OpenAPI document model and shared types for apisteps
//!
//! This crate loads an OpenAPI (3.x or Swagger 2.0) document into a typed,
//! immutable model and provides the configuration, variable context, data
//! dictionaries and exchange report shared by the runner and the CLI.

pub mod config;
pub mod dictionary;
pub mod document;
pub mod error;
pub mod report;
pub mod schema;
pub mod variables;

pub use config::{Config, ConfigError};
pub use dictionary::DataDictionary;
pub use document::{
    Document, HeaderDefinition, HttpMethod, Operation, ParamLocation, Parameter, PathItem,
    RequestBody, ResponseDefinition, SpecVersion,
};
pub use error::SchemaError;
pub use report::{ExchangeReport, Outcome, RequestSnapshot, ResponseSnapshot};
pub use schema::{ObjectSchema, Primitive, PrimitiveType, Schema};
pub use variables::{UnknownVariable, VariableContext};
