//! What a handler leaves behind for the response bridge.
//!
//! A handler does not write to the socket. It produces a [`Reply`], the
//! routing stage attaches it to the exchange, and the bridge turns it into at
//! most one response. The three variants are disjoint:
//!
//! | Variant | Meaning | Bridge outcome |
//! |---|---|---|
//! | `Value(pending)` | an asynchronous result | `200` + JSON body, or escalation on failure |
//! | `Absent` | the resource does not exist | `404` + `"Not Found"` |
//! | `NoResult` | the handler produced nothing | pass to the next stage |

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde_json::Value;

use crate::failure::Failure;

/// A handler's asynchronous result, already mapped to JSON.
pub type Pending = Pin<Box<dyn Future<Output = Result<Value, Failure>> + Send + 'static>>;

/// The tri-state result a handler attaches to its request.
pub enum Reply {
    Value(Pending),
    Absent,
    NoResult,
}

impl Reply {
    /// Wraps a future whose success value is serialized as the response body.
    pub fn resolve<F, T, E>(fut: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + Send + 'static,
        E: Into<Failure> + Send + 'static,
    {
        Self::Value(Box::pin(async move {
            let value = match fut.await {
                Ok(value) => value,
                Err(e) => return Err(e.into()),
            };
            serde_json::to_value(value).map_err(Failure::from)
        }))
    }

    /// An already-settled successful result.
    pub fn ready<T: Serialize>(value: T) -> Self {
        Self::settled(serde_json::to_value(value).map_err(Failure::from))
    }

    /// An already-settled failed result.
    pub fn reject(failure: impl Into<Failure>) -> Self {
        Self::settled(Err(failure.into()))
    }

    fn settled(result: Result<Value, Failure>) -> Self {
        Self::Value(Box::pin(async move { result }))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_no_result(&self) -> bool {
        matches!(self, Self::NoResult)
    }
}

impl Default for Reply {
    fn default() -> Self { Self::NoResult }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Reply::Value(<pending>)"),
            Self::Absent => f.write_str("Reply::Absent"),
            Self::NoResult => f.write_str("Reply::NoResult"),
        }
    }
}

/// Conversion of a handler's return value into a [`Reply`].
///
/// Implemented for `Reply` itself and for any `Send + 'static` future that
/// resolves to `Result<T, E>` where `T: Serialize` and `E: Into<Failure>`,
/// which is what a plain `async fn` handler returns.
pub trait IntoReply {
    fn into_reply(self) -> Reply;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Reply { self }
}

impl<F, T, E> IntoReply for F
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Serialize + Send + 'static,
    E: Into<Failure> + Send + 'static,
{
    fn into_reply(self) -> Reply {
        Reply::resolve(self)
    }
}
