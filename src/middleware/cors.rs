//! Cross-origin resource sharing.
//!
//! Defaults follow the common `cors()` middleware behaviour: any origin,
//! methods `GET,HEAD,PUT,PATCH,POST,DELETE`, preflight answered with `204`.
//!
//! Headers are staged on the exchange rather than written, so they land on
//! whatever response the chain eventually produces, error responses included.
//!
//! ```rust
//! use std::time::Duration;
//! use swivel::middleware::Cors;
//!
//! let cors = Cors::new()
//!     .allow_origin("https://app.example.com")
//!     .allow_headers(["content-type", "authorization"])
//!     .allow_credentials(true)
//!     .max_age(Duration::from_secs(600));
//! # let _ = cors;
//! ```

use std::time::Duration;

use http::header::{self, HeaderName, HeaderValue};
use http::{Method, StatusCode};

use crate::exchange::Exchange;
use crate::failure::Failure;
use crate::middleware::{BoxFuture, Flow, Middleware};

#[derive(Clone, Debug, PartialEq)]
enum AllowOrigin {
    Any,
    List(Vec<String>),
}

/// The cross-origin policy stage.
#[derive(Clone, Debug)]
pub struct Cors {
    origin: AllowOrigin,
    methods: Vec<Method>,
    allow_headers: Option<Vec<String>>,
    expose_headers: Vec<String>,
    credentials: bool,
    max_age: Option<Duration>,
}

impl Default for Cors {
    fn default() -> Self {
        Self::new()
    }
}

impl Cors {
    pub fn new() -> Self {
        Self {
            origin: AllowOrigin::Any,
            methods: vec![
                Method::GET,
                Method::HEAD,
                Method::PUT,
                Method::PATCH,
                Method::POST,
                Method::DELETE,
            ],
            allow_headers: None,
            expose_headers: Vec::new(),
            credentials: false,
            max_age: None,
        }
    }

    /// Builds a policy from an origin list. `*` anywhere in it means any origin.
    pub fn from_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        origins.into_iter().fold(Self::new(), |cors, o| cors.allow_origin(o))
    }

    /// Restricts the policy to an explicit list; repeated calls extend it.
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        if origin == "*" {
            self.origin = AllowOrigin::Any;
            return self;
        }
        match &mut self.origin {
            AllowOrigin::List(list) => list.push(origin),
            AllowOrigin::Any => self.origin = AllowOrigin::List(vec![origin]),
        }
        self
    }

    pub fn allow_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Fixed preflight header list. Without one, the requested headers are
    /// reflected back.
    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    pub fn expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expose_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.credentials = allow;
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// The `Access-Control-Allow-Origin` value for a request, if it gets one.
    fn origin_for(&self, origin: Option<&str>) -> Option<String> {
        match (&self.origin, origin) {
            (AllowOrigin::Any, Some(o)) if self.credentials => Some(o.to_owned()),
            (AllowOrigin::Any, _) => Some("*".to_owned()),
            (AllowOrigin::List(list), Some(o)) if list.iter().any(|a| a == o) => {
                Some(o.to_owned())
            }
            (AllowOrigin::List(_), _) => None,
        }
    }

    fn stage_common(&self, ex: &mut Exchange) -> Vec<&'static str> {
        let mut vary = Vec::new();
        let origin = ex.request().header("origin").map(str::to_owned);

        if let Some(value) = self.origin_for(origin.as_deref()) {
            if value != "*" {
                vary.push("Origin");
            }
            if let Ok(v) = HeaderValue::from_str(&value) {
                ex.set_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, v);
            }
        } else if matches!(self.origin, AllowOrigin::List(_)) {
            vary.push("Origin");
        }

        if self.credentials {
            ex.set_header(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        vary
    }

    fn stage_preflight(&self, ex: &mut Exchange, vary: &mut Vec<&'static str>) {
        let methods = self.methods.iter().map(Method::as_str).collect::<Vec<_>>().join(",");
        set(ex, header::ACCESS_CONTROL_ALLOW_METHODS, &methods);

        let allowed = match &self.allow_headers {
            Some(list) => Some(list.join(",")),
            None => {
                vary.push("Access-Control-Request-Headers");
                ex.request()
                    .header("access-control-request-headers")
                    .map(str::to_owned)
            }
        };
        if let Some(allowed) = allowed.filter(|a| !a.is_empty()) {
            set(ex, header::ACCESS_CONTROL_ALLOW_HEADERS, &allowed);
        }

        if let Some(max_age) = self.max_age {
            set(ex, header::ACCESS_CONTROL_MAX_AGE, &max_age.as_secs().to_string());
        }
    }
}

fn set(ex: &mut Exchange, name: HeaderName, value: &str) {
    if let Ok(v) = HeaderValue::from_str(value) {
        ex.set_header(name, v);
    }
}

impl Middleware for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn call<'a>(&'a self, ex: &'a mut Exchange) -> BoxFuture<'a, Result<Flow, Failure>> {
        let mut vary = self.stage_common(ex);

        let flow = if ex.request().method() == Method::OPTIONS {
            self.stage_preflight(ex, &mut vary);
            set_vary(ex, &vary);
            ex.send(StatusCode::NO_CONTENT);
            Flow::Done
        } else {
            if !self.expose_headers.is_empty() {
                set(ex, header::ACCESS_CONTROL_EXPOSE_HEADERS, &self.expose_headers.join(","));
            }
            set_vary(ex, &vary);
            Flow::Next
        };

        Box::pin(async move { Ok(flow) })
    }
}

fn set_vary(ex: &mut Exchange, vary: &[&str]) {
    if !vary.is_empty() {
        set(ex, header::VARY, &vary.join(", "));
    }
}
