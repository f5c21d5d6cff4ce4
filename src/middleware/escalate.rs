//! Error escalator: the terminal error stage.
//!
//! Registered last so it observes failures raised by every stage before it.
//! For each failure it:
//!
//! 1. normalizes it into an [`EscalatedError`]: the message of a structured
//!    failure, or nothing for an opaque value. A fresh backtrace is captured
//!    here; the failure's own internals never reach the client;
//! 2. logs it once through the request's [`RequestLog`](crate::RequestLog);
//! 3. writes `{"message": …}` (or `{}`), unless a response already went out.
//!
//! The status is the failure's own hint (`400` for undecodable bodies and
//! schema violations), else whatever status a stage staged, else `500`.

use std::backtrace::Backtrace;

use http::StatusCode;
use serde::Serialize;

use crate::exchange::Exchange;
use crate::failure::Failure;
use crate::middleware::{BoxFuture, ErrorHandler, Flow};
use crate::response::Response;

/// Log message attached to every escalated failure.
pub const UNEXPECTED: &str = "Unexpected error has occurred";

/// The client-visible shape of a failure.
#[derive(Debug, Serialize)]
pub struct EscalatedError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    trace: Option<Backtrace>,
}

impl EscalatedError {
    pub fn from_failure(failure: &Failure) -> Self {
        match failure.message() {
            Some(message) => Self { message: Some(message), trace: Some(Backtrace::capture()) },
            None => Self { message: None, trace: None },
        }
    }

    /// Backtrace captured at the escalation point. Only populated when
    /// `RUST_BACKTRACE` enables capture.
    pub fn trace(&self) -> Option<&Backtrace> {
        self.trace.as_ref()
    }
}

/// The error escalation stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct Escalator;

impl Escalator {
    pub fn new() -> Self {
        Self
    }
}

impl ErrorHandler for Escalator {
    fn name(&self) -> &'static str {
        "escalator"
    }

    fn call<'a>(
        &'a self,
        failure: Failure,
        ex: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<Flow, Failure>> {
        Box::pin(async move {
            let escalated = EscalatedError::from_failure(&failure);
            ex.log().error(&failure.log_payload(), UNEXPECTED);

            if ex.headers_sent() {
                return Ok(Flow::Done);
            }

            let status = failure
                .status()
                .or(ex.staged_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let body = serde_json::to_vec(&escalated).unwrap_or_else(|_| b"{}".to_vec());
            ex.send(Response::json(body).with_status(status));
            Ok(Flow::Done)
        })
    }
}
