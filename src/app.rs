//! The server instance: one registration table, walked once per request.
//!
//! Exactly one `App` exists per process. The pipeline mutates it through
//! `&mut App` while assembling; [`App::serve`](crate::App::serve) then moves it
//! behind an `Arc`, after which the table is only ever read.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use tracing::{error, warn};

use crate::exchange::Exchange;
use crate::failure::Failure;
use crate::middleware::{ErrorHandler, Flow, Layer, Middleware};
use crate::request::Request;
use crate::request_log::{LogFactory, RequestLog, TracingLog};
use crate::response::Response;

/// The HTTP server instance.
pub struct App {
    layers: Vec<Layer>,
    log_factory: LogFactory,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App").field("layers", &self.layers()).finish_non_exhaustive()
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self { layers: Vec::new(), log_factory: TracingLog::factory() }
    }

    /// Appends a request stage.
    pub fn use_middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.layers.push(Layer::Stage(Arc::new(middleware)));
        self
    }

    /// Appends an error stage. It only sees failures raised by layers
    /// registered before it.
    pub fn use_error_handler(&mut self, handler: impl ErrorHandler) -> &mut Self {
        self.layers.push(Layer::Catch(Arc::new(handler)));
        self
    }

    /// Replaces the factory that builds each request's logger.
    pub fn request_log<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&Request) -> Arc<dyn RequestLog> + Send + Sync + 'static,
    {
        self.log_factory = Arc::new(factory);
        self
    }

    /// Names of the registered layers, in chain order.
    pub fn layers(&self) -> Vec<&'static str> {
        self.layers.iter().map(Layer::name).collect()
    }

    /// Runs one request through the chain and returns its single response.
    pub async fn handle(&self, request: Request) -> Response {
        let log = (self.log_factory)(&request);
        let mut ex = Exchange::new(request, log);
        let mut pending: Option<Failure> = None;

        for layer in &self.layers {
            let outcome = match (layer, pending.take()) {
                (Layer::Stage(stage), None) => stage.call(&mut ex).await,
                (Layer::Catch(handler), Some(failure)) => handler.call(failure, &mut ex).await,
                (Layer::Stage(_), Some(failure)) => Err(failure),
                (Layer::Catch(_), None) => Ok(Flow::Next),
            };
            match outcome {
                Ok(Flow::Next) => {}
                Ok(Flow::Done) => break,
                Err(failure) => pending = Some(failure),
            }
        }

        finish(ex, pending)
    }

    /// Drives a plain `http::Request` through the chain without a socket.
    pub async fn oneshot(&self, request: http::Request<Bytes>) -> http::Response<Full<Bytes>> {
        let (parts, body) = request.into_parts();
        self.handle(Request::from_parts(parts, body)).await.into_inner()
    }
}

/// Settles a request the chain left without a response.
fn finish(mut ex: Exchange, pending: Option<Failure>) -> Response {
    if !ex.headers_sent() {
        match pending {
            Some(failure) => {
                error!(
                    request_id = %ex.request().request_id(),
                    error = %failure,
                    "failure reached the end of the chain unhandled"
                );
                ex.send(StatusCode::INTERNAL_SERVER_ERROR);
            }
            None => {
                let req = ex.request();
                let body = format!("Cannot {} {}", req.method(), req.path());
                ex.send(Response::text(body).with_status(StatusCode::NOT_FOUND));
            }
        }
    } else if let Some(failure) = pending {
        warn!(
            request_id = %ex.request().request_id(),
            error = %failure,
            "failure raised after the response was sent"
        );
    }

    ex.into_response().unwrap_or_else(|| Response::status(StatusCode::INTERNAL_SERVER_ERROR))
}
