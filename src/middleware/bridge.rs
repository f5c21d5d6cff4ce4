//! Response bridge: turns a handler's [`Reply`] into at most one response.
//!
//! Runs right after the routing stage. Per request it does exactly one of:
//! write `404`, write the resolved value, forward a failure, or pass through.
//!
//! ```text
//! Reply::Absent        → 404 "Not Found"                      → Done
//! Reply::NoResult      → (no write)                           → Next
//! Reply::Value(p) ok   → already sent? Next : 200 + JSON body → Done
//! Reply::Value(p) err  → (no write)                           → Err(failure)
//! ```
//!
//! Single attempt: no retries, no timeout, no cancellation. A handler that
//! needs any of these builds it into the future it returns.

use bytes::Bytes;
use http::StatusCode;
use tracing::debug;

use crate::exchange::Exchange;
use crate::failure::Failure;
use crate::middleware::{BoxFuture, Flow, Middleware};
use crate::reply::Reply;
use crate::response::{ContentType, Response};

/// Body written for [`Reply::Absent`]: the JSON string `"Not Found"`.
pub const NOT_FOUND_BODY: &[u8] = b"\"Not Found\"";

/// The response bridge stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct Bridge;

impl Bridge {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for Bridge {
    fn name(&self) -> &'static str {
        "bridge"
    }

    fn call<'a>(&'a self, ex: &'a mut Exchange) -> BoxFuture<'a, Result<Flow, Failure>> {
        Box::pin(async move {
            match ex.take_reply() {
                Reply::Absent => {
                    if !ex.headers_sent() {
                        ex.send(
                            Response::builder()
                                .status(StatusCode::NOT_FOUND)
                                .bytes(ContentType::Json, Bytes::from_static(NOT_FOUND_BODY)),
                        );
                    }
                    Ok(Flow::Done)
                }
                Reply::NoResult => Ok(Flow::Next),
                Reply::Value(pending) => {
                    let value = pending.await?;
                    if ex.headers_sent() {
                        debug!(
                            request_id = %ex.request().request_id(),
                            "handler settled after a response was sent"
                        );
                        return Ok(Flow::Next);
                    }
                    ex.send(Response::to_json(&value)?);
                    Ok(Flow::Done)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::request_log::TracingLog;
    use crate::request::Request;

    fn exchange() -> Exchange {
        let (parts, ()) = http::Request::builder().uri("/t").body(()).unwrap().into_parts();
        let req = Request::from_parts(parts, Bytes::new());
        let log = Arc::new(TracingLog::for_request(&req));
        Exchange::new(req, log)
    }

    #[tokio::test]
    async fn absent_writes_not_found() {
        let mut ex = exchange();
        ex.attach(Reply::Absent);
        assert_eq!(Bridge.call(&mut ex).await.unwrap(), Flow::Done);
        let res = ex.response().unwrap();
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.body().as_ref(), NOT_FOUND_BODY);
    }

    #[tokio::test]
    async fn no_result_passes_through() {
        let mut ex = exchange();
        assert_eq!(Bridge.call(&mut ex).await.unwrap(), Flow::Next);
        assert!(!ex.headers_sent());
    }

    #[tokio::test]
    async fn value_is_serialized() {
        let mut ex = exchange();
        ex.attach(Reply::ready(serde_json::json!({ "id": 7 })));
        assert_eq!(Bridge.call(&mut ex).await.unwrap(), Flow::Done);
        let res = ex.response().unwrap();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), br#"{"id":7}"#);
    }

    #[tokio::test]
    async fn late_value_does_not_overwrite() {
        let mut ex = exchange();
        ex.send("early");
        ex.attach(Reply::ready("late"));
        assert_eq!(Bridge.call(&mut ex).await.unwrap(), Flow::Next);
        assert_eq!(ex.response().unwrap().body().as_ref(), b"early");
    }

    #[tokio::test]
    async fn rejection_is_forwarded_without_writing() {
        let mut ex = exchange();
        ex.attach(Reply::reject(Failure::msg("boom")));
        let failure = Bridge.call(&mut ex).await.unwrap_err();
        assert_eq!(failure.message().as_deref(), Some("boom"));
        assert!(!ex.headers_sent());
    }
}
