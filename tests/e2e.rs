//! Requests driven through a fully assembled app, without a socket.

use std::io::Write;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{Method, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use swivel::middleware::{Bridge, Escalator, Flow, from_fn};
use swivel::pipeline::{self, Assembler};
use swivel::schema::{ApiSpec, Controllers};
use swivel::{App, Config, Failure, Reply, Request, RequestLog, Server};
use tempfile::NamedTempFile;

const SPEC: &str = r#"
openapi: 3.0.3
info:
  title: e2e
  version: "1"
paths:
  /ping:
    get: { operationId: ping }
  /missing:
    get: { operationId: missing }
  /fail:
    get: { operationId: fail }
  /opaque:
    get: { operationId: opaque }
  /silent:
    get: { operationId: silent }
  /race:
    get: { operationId: race }
  /pets:
    post:
      operationId: addPet
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              required: [name]
              properties:
                name: { type: string }
"#;

async fn ping(_req: Arc<Request>) -> Result<&'static str, Failure> {
    Ok("pong")
}

fn missing(_req: Arc<Request>) -> Reply {
    Reply::Absent
}

async fn fail(_req: Arc<Request>) -> Result<(), std::io::Error> {
    Err(std::io::Error::other("db down"))
}

fn opaque(_req: Arc<Request>) -> Reply {
    Reply::reject(Failure::value("oops"))
}

fn silent(_req: Arc<Request>) -> Reply {
    Reply::NoResult
}

fn race(_req: Arc<Request>) -> Reply {
    Reply::ready("late")
}

async fn add_pet(req: Arc<Request>) -> Result<Value, Failure> {
    let name = req.json().and_then(|b| b.get("name")).cloned().unwrap_or(Value::Null);
    Ok(json!({ "created": name }))
}

fn controllers() -> Controllers {
    Controllers::new()
        .register("ping", ping)
        .register("missing", missing)
        .register("fail", fail)
        .register("opaque", opaque)
        .register("silent", silent)
        .register("race", race)
        .register("addPet", add_pet)
}

fn spec_file() -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(SPEC.as_bytes()).unwrap();
    file
}

/// One `error` call, with the request it was made for.
#[derive(Clone, Debug)]
struct Entry {
    request_id: String,
    path: String,
    payload: Value,
    message: String,
}

#[derive(Default)]
struct Recorder(Mutex<Vec<Entry>>);

impl Recorder {
    fn entries(&self) -> Vec<Entry> {
        self.0.lock().unwrap().clone()
    }
}

/// The logger handed to one request.
struct Tagged {
    request_id: String,
    path: String,
    sink: Arc<Recorder>,
}

impl RequestLog for Tagged {
    fn error(&self, payload: &Value, message: &str) {
        self.sink.0.lock().unwrap().push(Entry {
            request_id: self.request_id.clone(),
            path: self.path.clone(),
            payload: payload.clone(),
            message: message.to_owned(),
        });
    }
}

struct Harness {
    app: App,
    log: Arc<Recorder>,
    _spec: NamedTempFile,
}

/// The default pipeline against a temporary document, with a recording
/// request logger.
async fn harness() -> Harness {
    let spec = spec_file();
    let config = Config {
        spec_path: spec.path().display().to_string(),
        ..Config::default()
    };

    let log = Arc::new(Recorder::default());
    let recorder = Arc::clone(&log);
    let steps = pipeline::default_steps(&config, controllers()).step(pipeline::from_fn(
        "recording_log",
        move |app| {
            let recorder = Arc::clone(&recorder);
            app.request_log(move |req: &Request| {
                Arc::new(Tagged {
                    request_id: req.request_id().to_owned(),
                    path: req.path().to_owned(),
                    sink: Arc::clone(&recorder),
                }) as Arc<dyn RequestLog>
            });
            Ok(())
        },
    ));

    let app = Server::new(steps).init().await.unwrap();
    Harness { app, log, _spec: spec }
}

fn request(method: Method, uri: &str) -> http::Request<Bytes> {
    http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap()
}

fn post_json(uri: &str, body: &'static str) -> http::Request<Bytes> {
    http::Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Bytes::from_static(body.as_bytes()))
        .unwrap()
}

async fn send(app: &App, req: http::Request<Bytes>) -> (StatusCode, http::HeaderMap, Bytes) {
    let res = app.oneshot(req).await;
    let status = res.status();
    let headers = res.headers().clone();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

#[tokio::test]
async fn default_chain_is_registered_in_order() {
    let h = harness().await;
    assert_eq!(h.app.layers(), ["cors", "body", "docs", "router", "bridge", "escalator"]);
}

#[tokio::test]
async fn resolved_value_is_sent_as_json() {
    let h = harness().await;
    let (status, headers, body) = send(&h.app, request(Method::GET, "/ping")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"\"pong\"");
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(h.log.entries().is_empty());
}

#[tokio::test]
async fn absent_resource_is_not_found() {
    let h = harness().await;
    let (status, _, body) = send(&h.app, request(Method::GET, "/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(&body[..], b"\"Not Found\"");
}

#[tokio::test]
async fn rejected_value_is_escalated_once() {
    let h = harness().await;
    let (status, _, body) = send(&h.app, request(Method::GET, "/fail")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({ "message": "db down" }));

    let calls = h.log.entries();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].message, "Unexpected error has occurred");
    assert_eq!(calls[0].path, "/fail");
    assert!(!calls[0].request_id.is_empty());
}

#[tokio::test]
async fn concurrent_failures_are_logged_against_their_own_request() {
    let h = harness().await;
    let (first, second) = tokio::join!(
        send(&h.app, request(Method::GET, "/fail")),
        send(&h.app, request(Method::GET, "/opaque")),
    );
    assert_eq!(first.0, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(second.0, StatusCode::INTERNAL_SERVER_ERROR);

    let mut calls = h.log.entries();
    calls.sort_by(|a, b| a.path.cmp(&b.path));
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].path, "/fail");
    assert_eq!(calls[1].path, "/opaque");
    assert_ne!(calls[0].request_id, calls[1].request_id);
}

#[tokio::test]
async fn head_is_answered_by_the_get_operation() {
    let h = harness().await;
    let (status, headers, _) = send(&h.app, request(Method::HEAD, "/ping")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn opaque_failure_has_no_message() {
    let h = harness().await;
    let (status, _, body) = send(&h.app, request(Method::GET, "/opaque")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&body[..], b"{}");
    assert_eq!(h.log.entries()[0].payload, json!("oops"));
}

#[tokio::test]
async fn no_result_falls_through() {
    let h = harness().await;
    let (status, _, body) = send(&h.app, request(Method::GET, "/silent")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(&body[..], b"Cannot GET /silent");

    let (status, _, _) = send(&h.app, request(Method::GET, "/unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preflight_is_answered_before_routing() {
    let h = harness().await;
    let req = http::Request::builder()
        .method(Method::OPTIONS)
        .uri("/ping")
        .header(header::ORIGIN, "https://app.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-trace")
        .body(Bytes::new())
        .unwrap();
    let (status, headers, body) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "x-trace");
}

#[tokio::test]
async fn validated_body_reaches_the_handler() {
    let h = harness().await;
    let (status, _, body) = send(&h.app, post_json("/pets", r#"{"name":"rex"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({ "created": "rex" }));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let h = harness().await;
    let (status, _, body) = send(&h.app, post_json("/pets", "{ nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["message"].as_str().unwrap().starts_with("invalid JSON body"));
    assert_eq!(h.log.entries().len(), 1);
}

#[tokio::test]
async fn schema_violation_is_a_bad_request() {
    let h = harness().await;
    let (status, _, _) = send(&h.app, post_json("/pets", r#"{"age":3}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn docs_mount_serves_html_and_json() {
    let h = harness().await;
    let (status, headers, body) = send(&h.app, request(Method::GET, "/docs")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
    assert!(std::str::from_utf8(&body).unwrap().contains("e2e - Swagger UI"));

    let (status, _, body) = send(&h.app, request(Method::GET, "/api-docs")).await;
    assert_eq!(status, StatusCode::OK);
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc["info"]["title"], "e2e");
}

#[tokio::test]
async fn earlier_response_wins_over_a_late_value() {
    let spec = ApiSpec::from_yaml_str(SPEC).unwrap();
    let controllers = controllers();
    let steps = Assembler::new()
        .step(pipeline::from_fn("routes", move |app| {
            pipeline::attach_routes(app, &spec, &controllers, "/docs")
        }))
        .step(pipeline::from_fn("early_writer", |app| {
            app.use_middleware(from_fn("early_writer", |ex| {
                if ex.request().path() == "/race" {
                    ex.send("early");
                }
                Ok(Flow::Next)
            }));
            Ok(())
        }))
        .step(pipeline::from_fn("bridge", |app| {
            app.use_middleware(Bridge);
            Ok(())
        }))
        .step(pipeline::from_fn("handle_errors", |app| {
            app.use_error_handler(Escalator);
            Ok(())
        }));

    let app = Server::new(steps).init().await.unwrap();
    let (status, _, body) = send(&app, request(Method::GET, "/race")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"early");
}
