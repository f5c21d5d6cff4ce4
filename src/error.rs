//! Startup and infrastructure errors.

use thiserror::Error;

/// The error type returned by swivel's fallible startup operations.
///
/// Request-time problems never surface as `Error`: they travel through the
/// chain as a [`Failure`](crate::Failure) and end up in the error escalator.
/// This type covers everything that must stop the process before it listens:
/// configuration, the API document, pipeline steps, readiness, sockets.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("api document: {0}")]
    Spec(#[from] SpecError),

    #[error("pipeline step `{step}` failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<Error>,
    },

    #[error("dependency not ready: {0}")]
    NotReady(String),
}

/// Problems loading an API document or turning it into a router.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("cannot read `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),

    #[error("route `{path}`: {reason}")]
    Route { path: String, reason: String },

    #[error("operation `{operation}` has an unusable schema: {reason}")]
    Schema { operation: String, reason: String },

    #[error("no controller registered for operation `{0}`")]
    MissingController(String),
}

impl Error {
    /// Wraps `self` as the failure of the named pipeline step.
    pub(crate) fn in_step(self, step: &str) -> Self {
        Self::Step { step: step.to_owned(), source: Box::new(self) }
    }
}
