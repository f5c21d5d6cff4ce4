//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! The schema router keeps handlers of *different* types in one
//! `operationId → handler` table, so each is hidden behind a trait object:
//!
//! ```text
//! async fn ping(req: Arc<Request>) -> Result<&'static str, Failure> { … }
//!        ↓ controllers.register("ping", ping)
//! ping.into_boxed_handler()                  ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(ping))                  ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at request time         ← returns a Reply, does not await it
//! ```
//!
//! Calling a handler never awaits anything. Whatever asynchronous work it
//! starts travels inside the returned [`Reply`] to the response bridge.

use std::sync::Arc;

use crate::reply::{IntoReply, Reply};
use crate::request::Request;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Arc<Request>) -> Reply;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any function
///
/// ```text
/// fn name(req: Arc<Request>) -> impl IntoReply
/// ```
///
/// which covers `async fn` handlers returning `Result<T, E>` as well as
/// synchronous handlers returning a [`Reply`] (`Reply::Absent`, for instance).
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, R> private::Sealed for F
where
    F: Fn(Arc<Request>) -> R + Send + Sync + 'static,
    R: IntoReply,
{
}

impl<F, R> Handler for F
where
    F: Fn(Arc<Request>) -> R + Send + Sync + 'static,
    R: IntoReply,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype bridging a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Arc<Request>) -> R + Send + Sync,
    R: IntoReply,
{
    fn call(&self, req: Arc<Request>) -> Reply {
        (self.0)(req).into_reply()
    }
}
