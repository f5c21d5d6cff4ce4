//! Per-request logging collaborator.
//!
//! Every [`Exchange`](crate::Exchange) carries a [`RequestLog`] created for
//! that request. The error escalator is the only core stage that writes to
//! it. The default, [`TracingLog`], emits `tracing` events tagged with the
//! request id, method and path; tests swap in a recording implementation via
//! [`App::request_log`](crate::App::request_log).

use std::sync::Arc;

use serde_json::Value;

use crate::request::Request;

/// The logger attached to one request.
pub trait RequestLog: Send + Sync {
    /// Records an error. `payload` describes the failure, `message` says what
    /// happened.
    fn error(&self, payload: &Value, message: &str);
}

/// Creates the [`RequestLog`] for each incoming request.
pub type LogFactory = Arc<dyn Fn(&Request) -> Arc<dyn RequestLog> + Send + Sync>;

/// Default request logger backed by `tracing`.
#[derive(Debug, Clone)]
pub struct TracingLog {
    request_id: String,
    method: String,
    path: String,
}

impl TracingLog {
    pub fn for_request(req: &Request) -> Self {
        Self {
            request_id: req.request_id().to_owned(),
            method: req.method().to_string(),
            path: req.path().to_owned(),
        }
    }

    pub(crate) fn factory() -> LogFactory {
        Arc::new(|req: &Request| Arc::new(TracingLog::for_request(req)) as Arc<dyn RequestLog>)
    }
}

impl RequestLog for TracingLog {
    fn error(&self, payload: &Value, message: &str) {
        tracing::error!(
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            error = %payload,
            "{message}"
        );
    }
}
