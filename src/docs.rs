//! Swagger UI mount.
//!
//! Serves two read-only endpoints from the same API document the router is
//! built from:
//!
//! - `GET {path}`: an HTML page loading Swagger UI from a CDN;
//! - `GET /api-docs`: the document itself as JSON.
//!
//! Everything else passes through.

use bytes::Bytes;
use http::Method;

use crate::exchange::Exchange;
use crate::failure::Failure;
use crate::middleware::{BoxFuture, Flow, Middleware};
use crate::response::Response;
use crate::schema::ApiSpec;

/// Where the JSON document is served.
pub const SPEC_JSON_PATH: &str = "/api-docs";

const SWAGGER_UI_VERSION: &str = "5.18.2";

/// The documentation stage.
#[derive(Debug, Clone)]
pub struct SwaggerUi {
    path: String,
    title: String,
    html: String,
    spec_json: Bytes,
}

impl SwaggerUi {
    pub fn new(path: impl Into<String>, spec: &ApiSpec) -> Self {
        let path = normalize(path.into());
        let title = format!("{} - Swagger UI", spec.title());
        let html = render(&title);
        let spec_json = Bytes::from(spec.document().to_string());
        Self { path, title, html, spec_json }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Whether a `GET` to `path` is answered by this mount.
    pub fn serves(&self, path: &str) -> bool {
        path.trim_end_matches('/') == self.path || path == SPEC_JSON_PATH
    }
}

fn normalize(path: String) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/docs".to_owned()
    } else if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

fn render(title: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@{v}/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@{v}/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {{
      window.ui = SwaggerUIBundle({{
        url: "{spec}",
        dom_id: "#swagger-ui",
        deepLinking: true,
        docExpansion: "list",
      }});
    }};
  </script>
</body>
</html>
"##,
        v = SWAGGER_UI_VERSION,
        spec = SPEC_JSON_PATH,
    )
}

impl Middleware for SwaggerUi {
    fn name(&self) -> &'static str {
        "docs"
    }

    fn call<'a>(&'a self, ex: &'a mut Exchange) -> BoxFuture<'a, Result<Flow, Failure>> {
        let req = ex.request();
        let flow = if req.method() != Method::GET && req.method() != Method::HEAD {
            Flow::Next
        } else if req.path() != SPEC_JSON_PATH && self.serves(req.path()) {
            ex.send(Response::html(self.html.clone()));
            Flow::Done
        } else if req.path() == SPEC_JSON_PATH {
            ex.send(Response::json(self.spec_json.clone()));
            Flow::Done
        } else {
            Flow::Next
        };
        Box::pin(async move { Ok(flow) })
    }
}
