//! Radix-tree router built from an API document.
//!
//! One `matchit` tree per HTTP method, O(path-length) lookup. Every route
//! carries what it needs to validate a request before its handler runs:
//! required parameters and a compiled body schema.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;
use serde_json::Value;
use tracing::{debug, info};

use super::controllers::Controllers;
use super::load::{ApiSpec, Location, Parameter};
use crate::error::SpecError;
use crate::exchange::Exchange;
use crate::failure::Failure;
use crate::handler::BoxedHandler;
use crate::middleware::{BoxFuture, Flow, Middleware};
use crate::request::{Body, Request};

struct Route {
    operation_id: String,
    handler: BoxedHandler,
    parameters: Vec<Parameter>,
    body: Option<BodyCheck>,
}

struct BodyCheck {
    required: bool,
    validator: Option<jsonschema::Validator>,
}

/// The schema-validated routing stage.
///
/// Unmatched requests pass through untouched. Matched requests are validated,
/// get their path parameters, and have their handler's
/// [`Reply`](crate::Reply) attached to the exchange for the response bridge.
pub struct SchemaRouter {
    routes: HashMap<Method, MatchitRouter<Arc<Route>>>,
}

impl SchemaRouter {
    /// Builds the router. Every operation needs a registered controller.
    pub fn build(spec: &ApiSpec, controllers: &Controllers) -> Result<Self, SpecError> {
        let mut routes: HashMap<Method, MatchitRouter<Arc<Route>>> = HashMap::new();

        for op in spec.operations() {
            let handler = controllers
                .resolve(op.controller.as_deref(), &op.operation_id)
                .ok_or_else(|| SpecError::MissingController(op.operation_id.clone()))?;

            let body = match &op.body {
                Some(body) => {
                    let validator = match &body.schema {
                        Some(schema) => Some(
                            jsonschema::validator_for(&spec.standalone_schema(schema)).map_err(
                                |e| SpecError::Schema {
                                    operation: op.operation_id.clone(),
                                    reason: e.to_string(),
                                },
                            )?,
                        ),
                        None => None,
                    };
                    Some(BodyCheck { required: body.required, validator })
                }
                None => None,
            };

            let route = Route {
                operation_id: op.operation_id.clone(),
                handler,
                parameters: op.parameters.clone(),
                body,
            };

            routes
                .entry(op.method.clone())
                .or_default()
                .insert(op.path.clone(), Arc::new(route))
                .map_err(|e| SpecError::Route { path: op.path.clone(), reason: e.to_string() })?;

            debug!(method = %op.method, path = %op.path, operation = %op.operation_id, "route registered");
        }

        info!(title = spec.title(), operations = spec.operations().len(), "schema router built");
        Ok(Self { routes })
    }

    /// `HEAD` falls back to the `GET` operation of the same path.
    fn lookup(&self, method: &Method, path: &str) -> Option<(Arc<Route>, HashMap<String, String>)> {
        let found = self.routes.get(method).and_then(|tree| tree.at(path).ok());
        let matched = match found {
            Some(matched) => matched,
            None if method == Method::HEAD => self.routes.get(&Method::GET)?.at(path).ok()?,
            None => return None,
        };
        let route = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((route, params))
    }
}

impl Route {
    fn validate(&self, req: &Request) -> Result<(), Failure> {
        for param in self.parameters.iter().filter(|p| p.required) {
            let present = match param.location {
                Location::Path => req.param(&param.name).is_some(),
                Location::Query => req.query(&param.name).is_some(),
                Location::Header => req.header(&param.name).is_some(),
                Location::Cookie => has_cookie(req, &param.name),
                Location::Form => req.form().is_some_and(|f| f.contains_key(&param.name)),
            };
            if !present {
                return Err(bad_request(format!(
                    "missing required {} parameter `{}`",
                    location_name(param.location),
                    param.name
                )));
            }
        }

        let Some(check) = &self.body else { return Ok(()) };
        match req.body() {
            Body::Empty if check.required => Err(bad_request("request body is required".into())),
            Body::Json(value) => validate_json(check, value),
            _ => Ok(()),
        }
    }
}

fn validate_json(check: &BodyCheck, value: &Value) -> Result<(), Failure> {
    let Some(validator) = &check.validator else { return Ok(()) };
    match validator.iter_errors(value).next() {
        Some(e) => Err(bad_request(format!("request body does not match schema: {e}"))),
        None => Ok(()),
    }
}

fn has_cookie(req: &Request, name: &str) -> bool {
    req.headers()
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .any(|pair| pair.trim().split('=').next() == Some(name))
}

fn location_name(location: Location) -> &'static str {
    match location {
        Location::Path => "path",
        Location::Query => "query",
        Location::Header => "header",
        Location::Cookie => "cookie",
        Location::Form => "form",
    }
}

fn bad_request(message: String) -> Failure {
    Failure::msg(message).with_status(StatusCode::BAD_REQUEST)
}

impl Middleware for SchemaRouter {
    fn name(&self) -> &'static str {
        "router"
    }

    fn call<'a>(&'a self, ex: &'a mut Exchange) -> BoxFuture<'a, Result<Flow, Failure>> {
        let result = self.route(ex);
        Box::pin(async move { result })
    }
}

impl SchemaRouter {
    fn route(&self, ex: &mut Exchange) -> Result<Flow, Failure> {
        let req = ex.request();
        let Some((route, params)) = self.lookup(req.method(), req.path()) else {
            return Ok(Flow::Next);
        };

        ex.request_mut().params = params;
        route.validate(ex.request())?;

        debug!(
            request_id = %ex.request().request_id(),
            operation = %route.operation_id,
            "dispatching to controller"
        );
        let reply = route.handler.call(Arc::clone(ex.request()));
        ex.attach(reply);
        Ok(Flow::Next)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::request_log::TracingLog;
    use crate::reply::Reply;

    const SPEC: &str = r#"
openapi: 3.0.3
info: { title: Pets, version: "1" }
paths:
  /pets:
    get:
      operationId: listPets
      parameters:
        - { name: limit, in: query, required: true }
    post:
      operationId: addPet
      requestBody:
        required: true
        content:
          application/json:
            schema: { $ref: '#/components/schemas/Pet' }
  /pets/{id}:
    get:
      operationId: getPet
components:
  schemas:
    Pet:
      type: object
      required: [name]
      properties: { name: { type: string } }
"#;

    fn echo_id(req: Arc<Request>) -> Reply {
        Reply::ready(req.param("id").unwrap_or_default().to_owned())
    }

    fn ok(_req: Arc<Request>) -> Reply {
        Reply::ready("ok")
    }

    fn router() -> SchemaRouter {
        let spec = ApiSpec::from_yaml_str(SPEC).unwrap();
        let controllers = Controllers::new()
            .register("listPets", ok)
            .register("addPet", ok)
            .register("getPet", echo_id);
        SchemaRouter::build(&spec, &controllers).unwrap()
    }

    fn exchange(method: &str, uri: &str, body: Body) -> Exchange {
        let (parts, ()) = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts();
        let mut req = Request::from_parts(parts, Bytes::new());
        req.body = body;
        let log = Arc::new(TracingLog::for_request(&req));
        Exchange::new(req, log)
    }

    async fn settle(ex: &mut Exchange) -> Value {
        match ex.take_reply() {
            Reply::Value(p) => p.await.unwrap(),
            other => panic!("expected a value, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn path_params_reach_the_handler() {
        let mut ex = exchange("GET", "/pets/42", Body::Empty);
        assert_eq!(router().call(&mut ex).await.unwrap(), Flow::Next);
        assert_eq!(ex.request().param("id"), Some("42"));
        assert_eq!(settle(&mut ex).await, Value::String("42".into()));
    }

    #[tokio::test]
    async fn unmatched_requests_pass_through() {
        let mut ex = exchange("DELETE", "/pets/42", Body::Empty);
        assert_eq!(router().call(&mut ex).await.unwrap(), Flow::Next);
        assert!(ex.take_reply().is_no_result());
    }

    #[tokio::test]
    async fn missing_query_parameter_is_rejected() {
        let mut ex = exchange("GET", "/pets", Body::Empty);
        let failure = router().call(&mut ex).await.unwrap_err();
        assert_eq!(failure.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(
            failure.message().as_deref(),
            Some("missing required query parameter `limit`")
        );
        assert!(ex.take_reply().is_no_result());
    }

    #[tokio::test]
    async fn body_is_checked_against_its_schema() {
        let mut ex = exchange("POST", "/pets", Body::Json(serde_json::json!({ "age": 3 })));
        let failure = router().call(&mut ex).await.unwrap_err();
        assert!(failure.message().unwrap().starts_with("request body does not match schema"));

        let mut ex = exchange("POST", "/pets", Body::Empty);
        let failure = router().call(&mut ex).await.unwrap_err();
        assert_eq!(failure.message().as_deref(), Some("request body is required"));

        let mut ex = exchange("POST", "/pets", Body::Json(serde_json::json!({ "name": "rex" })));
        assert_eq!(router().call(&mut ex).await.unwrap(), Flow::Next);
        assert_eq!(settle(&mut ex).await, Value::String("ok".into()));
    }

    #[tokio::test]
    async fn head_is_served_by_the_get_operation() {
        let mut ex = exchange("HEAD", "/pets/7", Body::Empty);
        assert_eq!(router().call(&mut ex).await.unwrap(), Flow::Next);
        assert_eq!(settle(&mut ex).await, Value::String("7".into()));
    }

    #[tokio::test]
    async fn path_item_controller_selects_the_qualified_handler() {
        let spec = ApiSpec::from_yaml_str(
            r#"
swagger: "2.0"
info: { title: t, version: "1" }
paths:
  /users:
    x-swagger-router-controller: users
    get: { operationId: list }
  /pets:
    x-swagger-router-controller: pets
    get: { operationId: list }
"#,
        )
        .unwrap();
        fn users(_req: Arc<Request>) -> Reply {
            Reply::ready("users")
        }
        fn pets(_req: Arc<Request>) -> Reply {
            Reply::ready("pets")
        }
        let controllers = Controllers::new().register("users.list", users).register("pets.list", pets);
        let router = SchemaRouter::build(&spec, &controllers).unwrap();

        let mut ex = exchange("GET", "/pets", Body::Empty);
        router.call(&mut ex).await.unwrap();
        assert_eq!(settle(&mut ex).await, Value::String("pets".into()));

        let mut ex = exchange("GET", "/users", Body::Empty);
        router.call(&mut ex).await.unwrap();
        assert_eq!(settle(&mut ex).await, Value::String("users".into()));
    }

    #[test]
    fn missing_controller_fails_the_build() {
        let spec = ApiSpec::from_yaml_str(SPEC).unwrap();
        let controllers = Controllers::new().register("listPets", ok);
        assert!(matches!(
            SchemaRouter::build(&spec, &controllers),
            Err(SpecError::MissingController(_))
        ));
    }
}
