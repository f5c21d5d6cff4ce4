//! Request-time failures.
//!
//! A [`Failure`] is what a stage hands to the chain instead of completing
//! normally. Once one is pending, request stages are skipped and only error
//! stages see it. It comes in two shapes:
//!
//! - a **structured error**: anything implementing [`std::error::Error`]. It
//!   exposes a message, and the escalator copies that message to the client.
//! - an **opaque value**: an arbitrary JSON value. It exposes no message; the
//!   client sees `{}`.
//!
//! ```rust
//! use swivel::Failure;
//!
//! let io = std::io::Error::other("db down");
//! assert_eq!(Failure::from(io).message().as_deref(), Some("db down"));
//! assert_eq!(Failure::value("oops").message(), None);
//! ```

use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;
use serde_json::Value;

enum Kind {
    Error(Box<dyn StdError + Send + Sync + 'static>),
    Value(Value),
}

/// A failure propagated through the request chain.
pub struct Failure {
    kind: Kind,
    status: Option<StatusCode>,
}

impl Failure {
    /// Structured failure carrying `message`.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self { kind: Kind::Error(message.into()), status: None }
    }

    /// Opaque failure. The escalator reports it without a message.
    pub fn value(value: impl Into<Value>) -> Self {
        Self { kind: Kind::Value(value.into()), status: None }
    }

    /// Attaches the status the escalator should answer with.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// The message of a structured failure, `None` for opaque values.
    pub fn message(&self) -> Option<String> {
        match &self.kind {
            Kind::Error(e) => Some(e.to_string()),
            Kind::Value(_) => None,
        }
    }

    /// The underlying error of a structured failure.
    pub fn as_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match &self.kind {
            Kind::Error(e) => Some(e.as_ref()),
            Kind::Value(_) => None,
        }
    }

    /// A JSON rendering for the request log. Never sent to clients.
    pub fn log_payload(&self) -> Value {
        match &self.kind {
            Kind::Error(e) => {
                let mut chain = Vec::new();
                let mut source = e.source();
                while let Some(s) = source {
                    chain.push(Value::String(s.to_string()));
                    source = s.source();
                }
                serde_json::json!({ "message": e.to_string(), "causes": chain })
            }
            Kind::Value(v) => v.clone(),
        }
    }
}

impl<E> From<E> for Failure
where
    E: StdError + Send + Sync + 'static,
{
    fn from(e: E) -> Self {
        Self { kind: Kind::Error(Box::new(e)), status: None }
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Failure");
        match &self.kind {
            Kind::Error(e) => d.field("error", e),
            Kind::Value(v) => d.field("value", v),
        };
        d.field("status", &self.status).finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Error(e) => fmt::Display::fmt(e, f),
            Kind::Value(v) => write!(f, "non-error value: {v}"),
        }
    }
}
