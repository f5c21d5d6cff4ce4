//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method};
use serde_json::{Map, Value};

/// A request body after the decoding stage has looked at it.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Body {
    /// No bytes were sent.
    #[default]
    Empty,
    /// `application/json`.
    Json(Value),
    /// `application/x-www-form-urlencoded`, flattened to string values.
    Form(Map<String, Value>),
    /// Anything else. The bytes are still available via [`Request::raw_body`].
    Raw,
}

/// An incoming HTTP request.
///
/// Handlers receive it behind an `Arc`, so it can be moved into the future a
/// handler returns without copying the body.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: HeaderMap,
    pub(crate) raw_body: Bytes,
    pub(crate) body: Body,
    pub(crate) params: HashMap<String, String>,
    pub(crate) id: String,
}

impl Request {
    pub(crate) fn from_parts(parts: http::request::Parts, raw_body: Bytes) -> Self {
        let query = parts
            .uri
            .query()
            .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
            .unwrap_or_default();

        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query,
            headers: parts.headers,
            raw_body,
            body: Body::Empty,
            params: HashMap::new(),
            id: uuid::Uuid::now_v7().to_string(),
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn raw_body(&self) -> &Bytes { &self.raw_body }
    pub fn body(&self) -> &Body { &self.body }

    /// Identifier assigned when the request entered the chain. Every log line
    /// the request produces carries it.
    pub fn request_id(&self) -> &str { &self.id }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// First value of a query-string parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// The decoded JSON body, if the request carried one.
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(v) => Some(v),
            _ => None,
        }
    }

    /// The decoded form body, if the request carried one.
    pub fn form(&self) -> Option<&Map<String, Value>> {
        match &self.body {
            Body::Form(m) => Some(m),
            _ => None,
        }
    }
}
