//! Request-time stages.
//!
//! An [`App`](crate::App) is an ordered list of layers. Each layer is either a
//! request stage ([`Middleware`]) or an error stage ([`ErrorHandler`]). A
//! request walks the list once, front to back:
//!
//! - a request stage returns [`Flow::Next`] to continue, [`Flow::Done`] to
//!   stop, or a [`Failure`];
//! - once a failure is pending, request stages are skipped and only error
//!   stages run. An error stage may stop the chain, pass the failure on, or
//!   recover with `Flow::Next`.
//!
//! Built-in stages, in the order the default pipeline registers them:
//!
//! | Stage | Module |
//! |---|---|
//! | cross-origin policy | [`cors`] |
//! | body decoding | [`body`] |
//! | schema routing | [`crate::schema::SchemaRouter`] |
//! | response bridge | [`bridge`] |
//! | error escalation | [`escalate`] |

pub mod body;
pub mod bridge;
pub mod cors;
pub mod escalate;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::exchange::Exchange;
use crate::failure::Failure;

pub use body::BodyParser;
pub use bridge::Bridge;
pub use cors::Cors;
pub use escalate::{EscalatedError, Escalator};

/// A boxed, `Send` future borrowing from the stage and the exchange.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A stage's decision about the rest of the chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flow {
    /// Hand the exchange to the next layer.
    Next,
    /// Stop here. Whatever was sent is the response.
    Done,
}

/// A request stage.
pub trait Middleware: Send + Sync + 'static {
    /// Short name used in logs and in [`App::layers`](crate::App::layers).
    fn name(&self) -> &'static str;

    fn call<'a>(&'a self, ex: &'a mut Exchange) -> BoxFuture<'a, Result<Flow, Failure>>;
}

/// An error stage. Only runs while a failure is pending.
pub trait ErrorHandler: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn call<'a>(
        &'a self,
        failure: Failure,
        ex: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<Flow, Failure>>;
}

/// One entry of the registration table.
#[derive(Clone)]
pub(crate) enum Layer {
    Stage(Arc<dyn Middleware>),
    Catch(Arc<dyn ErrorHandler>),
}

impl Layer {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Stage(m) => m.name(),
            Self::Catch(h) => h.name(),
        }
    }
}

/// A request stage built from a synchronous closure.
///
/// ```rust
/// use swivel::middleware::{Flow, from_fn};
///
/// let stamp = from_fn("stamp", |ex| {
///     ex.set_header(
///         http::header::HeaderName::from_static("x-served-by"),
///         http::HeaderValue::from_static("swivel"),
///     );
///     Ok(Flow::Next)
/// });
/// # let _ = stamp;
/// ```
pub fn from_fn<F>(name: &'static str, f: F) -> FnMiddleware<F>
where
    F: Fn(&mut Exchange) -> Result<Flow, Failure> + Send + Sync + 'static,
{
    FnMiddleware { name, f }
}

/// See [`from_fn`].
pub struct FnMiddleware<F> {
    name: &'static str,
    f: F,
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Exchange) -> Result<Flow, Failure> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn call<'a>(&'a self, ex: &'a mut Exchange) -> BoxFuture<'a, Result<Flow, Failure>> {
        let result = (self.f)(ex);
        Box::pin(async move { result })
    }
}
