//! Per-request context shared by every stage of the chain.

use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use tracing::warn;

use crate::request_log::RequestLog;
use crate::reply::Reply;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// What one request looks like while it travels through the chain.
///
/// Holds the request, the response slot (a staged status and staged headers
/// until something is sent), the handler's [`Reply`] once routing attached
/// one, and the request's logger.
///
/// The response slot enforces the one-response rule: the first
/// [`send`](Exchange::send) wins, later ones are refused.
pub struct Exchange {
    request: Arc<Request>,
    status: Option<StatusCode>,
    headers: HeaderMap,
    sent: Option<Response>,
    reply: Reply,
    log: Arc<dyn RequestLog>,
}

impl Exchange {
    pub fn new(request: Request, log: Arc<dyn RequestLog>) -> Self {
        Self {
            request: Arc::new(request),
            status: None,
            headers: HeaderMap::new(),
            sent: None,
            reply: Reply::NoResult,
            log,
        }
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// Mutable access for stages that run before the handler (body decoding,
    /// routing). Clones the request only if a handler still holds it.
    pub fn request_mut(&mut self) -> &mut Request {
        Arc::make_mut(&mut self.request)
    }

    pub fn log(&self) -> &dyn RequestLog {
        self.log.as_ref()
    }

    /// Stages a status for the eventual response. A response that keeps the
    /// default `200` picks it up when sent.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn staged_status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Stages a header for the eventual response, replacing earlier values.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn staged_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// `true` once a response has been written for this request.
    pub fn headers_sent(&self) -> bool {
        self.sent.is_some()
    }

    /// Writes the response. Returns `false`, and drops `res`, if one was
    /// already written.
    pub fn send(&mut self, res: impl IntoResponse) -> bool {
        let mut res = res.into_response();
        if self.sent.is_some() {
            warn!(
                request_id = %self.request.request_id(),
                status = res.status.as_u16(),
                "response already sent, dropping second write"
            );
            return false;
        }

        if let Some(status) = self.status {
            if res.status == StatusCode::OK {
                res.status = status;
            }
        }
        res.merge_headers(&self.headers);
        self.sent = Some(res);
        true
    }

    /// The response written so far, if any.
    pub fn response(&self) -> Option<&Response> {
        self.sent.as_ref()
    }

    /// Attaches a handler's result for the response bridge.
    pub fn attach(&mut self, reply: Reply) {
        self.reply = reply;
    }

    /// Takes the attached result, leaving [`Reply::NoResult`] behind.
    pub fn take_reply(&mut self) -> Reply {
        std::mem::take(&mut self.reply)
    }

    pub(crate) fn into_response(self) -> Option<Response> {
        self.sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_log::TracingLog;
    use bytes::Bytes;

    fn exchange() -> Exchange {
        let (parts, ()) = http::Request::builder().uri("/x").body(()).unwrap().into_parts();
        let req = Request::from_parts(parts, Bytes::new());
        let log = Arc::new(TracingLog::for_request(&req));
        Exchange::new(req, log)
    }

    #[test]
    fn first_send_wins() {
        let mut ex = exchange();
        assert!(!ex.headers_sent());
        assert!(ex.send("first"));
        assert!(!ex.send(StatusCode::INTERNAL_SERVER_ERROR));
        let res = ex.into_response().unwrap();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), &Bytes::from_static(b"first"));
    }

    #[test]
    fn staged_status_and_headers_apply_on_send() {
        let mut ex = exchange();
        ex.set_status(StatusCode::ACCEPTED);
        ex.set_header(HeaderName::from_static("x-stage"), HeaderValue::from_static("cors"));
        ex.send("queued");
        let res = ex.response().unwrap();
        assert_eq!(res.status_code(), StatusCode::ACCEPTED);
        assert_eq!(res.headers()["x-stage"], "cors");
    }

    #[test]
    fn explicit_status_beats_staged_status() {
        let mut ex = exchange();
        ex.set_status(StatusCode::ACCEPTED);
        ex.send(StatusCode::NOT_FOUND);
        assert_eq!(ex.response().unwrap().status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn request_mut_edits_in_place() {
        let mut ex = exchange();
        ex.request_mut().params.insert("id".into(), "7".into());
        assert_eq!(ex.request().param("id"), Some("7"));
    }
}
