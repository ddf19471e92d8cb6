//! apisteps-runner: request synthesis, response matchers and the step API

pub mod datagen;
pub mod locator;
pub mod matcher;
pub mod message;
pub mod steps;
pub mod transport;
pub mod validate;

pub use locator::{LocatedOperation, find_operation, operations};
pub use matcher::{Bounds, Matcher, Mismatch};
pub use message::{ExpectedResponse, HttpRequest, HttpResponse, RequestMessage};
pub use steps::{ClientSteps, OpenApiClient, Phase, StepError, StepSettings};
pub use transport::{PendingResponse, ReqwestTransport, Transport, TransportError};
pub use validate::{MatcherValidator, ResponseMismatch, ResponseValidator};
