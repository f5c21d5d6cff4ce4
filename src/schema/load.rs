//! Loading an API document into a flat list of operations.
//!
//! Both OpenAPI 3 (`openapi: 3.x`, `requestBody`) and Swagger 2
//! (`swagger: "2.0"`, `in: body` parameters, `basePath`) are understood.
//! Path-level parameters are merged into each operation; `$ref`s to
//! `#/parameters`, `#/components/parameters` and `#/components/requestBodies`
//! are resolved. Keys under a path item that are not HTTP verbs are ignored.

use std::path::Path;

use http::Method;
use serde_json::{Map, Value};

use crate::error::SpecError;

const CONTROLLER_KEY: &str = "x-swagger-router-controller";

const METHODS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Where a parameter lives.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Location {
    Path,
    Query,
    Header,
    Cookie,
    /// Swagger 2 `formData`.
    Form,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub location: Location,
    pub required: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BodySpec {
    pub required: bool,
    /// JSON Schema for `application/json` bodies.
    pub schema: Option<Value>,
}

/// One `method + path` of the document.
#[derive(Clone, Debug)]
pub struct Operation {
    pub method: Method,
    /// Full path including any `basePath`, in `{param}` form.
    pub path: String,
    pub operation_id: String,
    /// `x-swagger-router-controller` of the operation, else of its path item.
    pub controller: Option<String>,
    pub parameters: Vec<Parameter>,
    pub body: Option<BodySpec>,
}

/// A parsed API document.
#[derive(Clone, Debug)]
pub struct ApiSpec {
    document: Value,
    title: String,
    version: String,
    operations: Vec<Operation>,
}

impl ApiSpec {
    /// Reads a document from disk. `.yaml`/`.yml` files are parsed as YAML,
    /// everything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SpecError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(path, &content)
    }

    /// Async variant of [`load`](Self::load), for use inside pipeline steps.
    pub async fn load_async(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|source| SpecError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, SpecError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(content),
            _ => Self::from_json_str(content),
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, SpecError> {
        Self::from_value(serde_yaml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, SpecError> {
        Self::from_value(serde_json::from_str(content)?)
    }

    pub fn from_value(document: Value) -> Result<Self, SpecError> {
        let root = document
            .as_object()
            .ok_or_else(|| SpecError::Invalid("document root must be an object".into()))?;

        let swagger2 = match (version_of(root, "swagger"), version_of(root, "openapi")) {
            (Some(v), _) if v.starts_with('2') => true,
            (_, Some(v)) if v.starts_with('3') => false,
            _ => {
                return Err(SpecError::Invalid(
                    "expected `swagger: \"2.0\"` or `openapi: 3.x`".into(),
                ));
            }
        };

        let info = root.get("info");
        let title = str_at(info, "title").unwrap_or("api").to_owned();
        let version = str_at(info, "version").unwrap_or("0.0.0").to_owned();

        let base = base_path(root, swagger2);
        let paths = match root.get("paths") {
            Some(Value::Object(p)) => p,
            None => return Err(SpecError::Invalid("document has no `paths`".into())),
            Some(_) => return Err(SpecError::Invalid("`paths` must be an object".into())),
        };

        let mut operations = Vec::new();
        for (path, item) in paths {
            let Some(item) = item.as_object() else {
                return Err(SpecError::Invalid(format!("path item `{path}` must be an object")));
            };
            let shared = Shared {
                parameters: item.get("parameters"),
                controller: item.get(CONTROLLER_KEY).and_then(Value::as_str),
            };

            for verb in METHODS {
                let Some(op) = item.get(verb) else { continue };
                operations.push(operation(&document, &base, path, verb, op, &shared)?);
            }
        }

        Ok(Self { document, title, version, operations })
    }

    pub fn title(&self) -> &str { &self.title }
    pub fn version(&self) -> &str { &self.version }
    pub fn operations(&self) -> &[Operation] { &self.operations }

    /// The document as loaded, for the docs mount and `$ref` resolution.
    pub fn document(&self) -> &Value { &self.document }

    /// `schema` with the document's shared definitions attached, so local
    /// `$ref`s resolve when it is compiled on its own.
    pub(crate) fn standalone_schema(&self, schema: &Value) -> Value {
        let Value::Object(map) = schema else { return schema.clone() };
        let mut out = map.clone();
        for key in ["definitions", "components"] {
            if let Some(shared) = self.document.get(key) {
                out.entry(key).or_insert_with(|| shared.clone());
            }
        }
        Value::Object(out)
    }
}

/// The dialect marker, whether written as a string or left unquoted (YAML
/// reads `swagger: 2.0` as a number).
fn version_of(root: &Map<String, Value>, key: &str) -> Option<String> {
    match root.get(key)? {
        Value::String(v) => Some(v.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_at<'a>(value: Option<&'a Value>, key: &str) -> Option<&'a str> {
    value.and_then(|v| v.get(key)).and_then(Value::as_str)
}

/// `basePath` (Swagger 2) or the path of the first relative server URL
/// (OpenAPI 3), without a trailing slash.
fn base_path(root: &Map<String, Value>, swagger2: bool) -> String {
    let base = if swagger2 {
        root.get("basePath").and_then(Value::as_str)
    } else {
        root.get("servers")
            .and_then(|s| s.get(0))
            .and_then(|s| s.get("url"))
            .and_then(Value::as_str)
            .filter(|u| u.starts_with('/'))
    };
    base.unwrap_or("").trim_end_matches('/').to_owned()
}

/// What a path item hands down to each of its operations.
struct Shared<'a> {
    parameters: Option<&'a Value>,
    controller: Option<&'a str>,
}

fn resolve<'a>(document: &'a Value, value: &'a Value) -> Result<&'a Value, SpecError> {
    match value.get("$ref").and_then(Value::as_str) {
        Some(reference) => {
            let pointer = reference.strip_prefix('#').ok_or_else(|| {
                SpecError::Invalid(format!("only local references are supported: `{reference}`"))
            })?;
            document
                .pointer(pointer)
                .ok_or_else(|| SpecError::Invalid(format!("unresolved reference `{reference}`")))
        }
        None => Ok(value),
    }
}

fn operation(
    document: &Value,
    base: &str,
    path: &str,
    verb: &str,
    op: &Value,
    shared: &Shared<'_>,
) -> Result<Operation, SpecError> {
    let label = format!("{} {path}", verb.to_ascii_uppercase());
    let method = Method::from_bytes(verb.to_ascii_uppercase().as_bytes())
        .map_err(|e| SpecError::Invalid(format!("{label}: {e}")))?;

    let operation_id = op
        .get("operationId")
        .and_then(Value::as_str)
        .ok_or_else(|| SpecError::Invalid(format!("{label} has no operationId")))?
        .to_owned();
    let controller = op
        .get(CONTROLLER_KEY)
        .and_then(Value::as_str)
        .or(shared.controller)
        .map(str::to_owned);

    let mut parameters: Vec<Parameter> = Vec::new();
    let mut body = None;

    let declared = shared
        .parameters
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .chain(op.get("parameters").and_then(Value::as_array).into_iter().flatten());

    for raw in declared {
        let param = resolve(document, raw)?;
        let name = param
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| SpecError::Invalid(format!("{label}: parameter without a name")))?;
        let required = param.get("required").and_then(Value::as_bool).unwrap_or(false);

        let location = match param.get("in").and_then(Value::as_str) {
            Some("path") => Location::Path,
            Some("query") => Location::Query,
            Some("header") => Location::Header,
            Some("cookie") => Location::Cookie,
            Some("formData") => Location::Form,
            Some("body") => {
                body = Some(BodySpec { required, schema: param.get("schema").cloned() });
                continue;
            }
            other => {
                return Err(SpecError::Invalid(format!(
                    "{label}: parameter `{name}` has unknown location {other:?}"
                )));
            }
        };

        // Operation-level declarations override path-level ones.
        parameters.retain(|p| !(p.name == name && p.location == location));
        parameters.push(Parameter { name: name.to_owned(), location, required });
    }

    if let Some(raw) = op.get("requestBody") {
        let request_body = resolve(document, raw)?;
        let required = request_body.get("required").and_then(Value::as_bool).unwrap_or(false);
        let schema = request_body.get("content").and_then(|c| {
            c.get("application/json")
                .or_else(|| c.as_object().and_then(|m| m.values().next()))
                .and_then(|media| media.get("schema"))
                .cloned()
        });
        body = Some(BodySpec { required, schema });
    }

    Ok(Operation {
        method,
        path: format!("{base}{path}"),
        operation_id,
        controller,
        parameters,
        body,
    })
}
