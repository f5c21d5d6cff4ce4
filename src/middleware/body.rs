//! Request body decoding.
//!
//! Runs before routing so handlers and schema validation see a decoded
//! [`Body`]. JSON (`application/json`, `*+json`) and URL-encoded forms are
//! understood; anything else is left as [`Body::Raw`]. Undecodable input
//! fails the request with `400`.

use http::StatusCode;
use serde_json::{Map, Value};

use crate::exchange::Exchange;
use crate::failure::Failure;
use crate::middleware::{BoxFuture, Flow, Middleware};
use crate::request::Body;

/// The body decoding stage.
#[derive(Clone, Copy, Debug)]
pub struct BodyParser {
    json: bool,
    form: bool,
}

impl Default for BodyParser {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyParser {
    /// Decodes both JSON and URL-encoded bodies.
    pub fn new() -> Self {
        Self { json: true, form: true }
    }

    pub fn json(mut self, enabled: bool) -> Self {
        self.json = enabled;
        self
    }

    pub fn form(mut self, enabled: bool) -> Self {
        self.form = enabled;
        self
    }

    fn decode(&self, content_type: Option<&str>, raw: &[u8]) -> Result<Body, Failure> {
        if raw.is_empty() {
            return Ok(Body::Empty);
        }

        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|m| m.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if self.json && (mime == "application/json" || mime.ends_with("+json")) {
            return serde_json::from_slice(raw).map(Body::Json).map_err(|e| {
                Failure::msg(format!("invalid JSON body: {e}")).with_status(StatusCode::BAD_REQUEST)
            });
        }

        if self.form && mime == "application/x-www-form-urlencoded" {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(raw).map_err(|e| {
                Failure::msg(format!("invalid form body: {e}")).with_status(StatusCode::BAD_REQUEST)
            })?;
            return Ok(Body::Form(collect_form(pairs)));
        }

        Ok(Body::Raw)
    }
}

/// Repeated keys become arrays, in arrival order.
fn collect_form(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        match map.get_mut(&key) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                map.insert(key, Value::String(value));
            }
        }
    }
    map
}

impl Middleware for BodyParser {
    fn name(&self) -> &'static str {
        "body"
    }

    fn call<'a>(&'a self, ex: &'a mut Exchange) -> BoxFuture<'a, Result<Flow, Failure>> {
        let req = ex.request();
        let decoded = self.decode(req.header("content-type"), req.raw_body());
        let result = decoded.map(|body| {
            ex.request_mut().body = body;
            Flow::Next
        });
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_decoded() {
        let body = BodyParser::new()
            .decode(Some("application/json; charset=utf-8"), br#"{"name":"rex"}"#)
            .unwrap();
        assert_eq!(body, Body::Json(serde_json::json!({ "name": "rex" })));
    }

    #[test]
    fn malformed_json_is_a_bad_request() {
        let failure = BodyParser::new().decode(Some("application/json"), b"{nope").unwrap_err();
        assert_eq!(failure.status(), Some(StatusCode::BAD_REQUEST));
        assert!(failure.message().unwrap().starts_with("invalid JSON body"));
    }

    #[test]
    fn form_repeats_become_arrays() {
        let body = BodyParser::new()
            .decode(Some("application/x-www-form-urlencoded"), b"tag=a&tag=b&name=rex")
            .unwrap();
        let Body::Form(map) = body else { panic!("expected a form") };
        assert_eq!(map["tag"], serde_json::json!(["a", "b"]));
        assert_eq!(map["name"], "rex");
    }

    #[test]
    fn other_types_stay_raw() {
        let parser = BodyParser::new();
        assert_eq!(parser.decode(Some("text/plain"), b"hi").unwrap(), Body::Raw);
        assert_eq!(parser.decode(Some("application/json"), b"").unwrap(), Body::Empty);
        assert_eq!(parser.json(false).decode(Some("application/json"), b"{}").unwrap(), Body::Raw);
    }
}
