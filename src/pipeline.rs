//! Sequential, fail-fast startup pipeline.
//!
//! A [`Step`] registers something on the [`App`]. The [`Assembler`] runs its
//! steps strictly one after another; step *i + 1* starts only after step *i*
//! completed. The first failing step stops assembly, and the steps after it
//! never run.
//!
//! ```rust
//! use swivel::pipeline::{self, Assembler};
//! use swivel::middleware::{BodyParser, Bridge, Cors, Escalator};
//! use swivel::App;
//!
//! # async fn run() -> Result<(), swivel::Error> {
//! let assembler = Assembler::new()
//!     .step(pipeline::from_fn("cors", |app| { app.use_middleware(Cors::new()); Ok(()) }))
//!     .step(pipeline::from_fn("body", |app| { app.use_middleware(BodyParser::new()); Ok(()) }))
//!     .step(pipeline::from_fn("bridge", |app| { app.use_middleware(Bridge); Ok(()) }))
//!     .step(pipeline::from_fn("errors", |app| { app.use_error_handler(Escalator); Ok(()) }));
//!
//! let mut app = App::new();
//! assembler.assemble(&mut app).await?;
//! assert_eq!(app.layers(), ["cors", "body", "bridge", "escalator"]);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use http::Method;
use tracing::{debug, error, info};

use crate::app::App;
use crate::config::Config;
use crate::docs::SwaggerUi;
use crate::error::{Error, SpecError};
use crate::middleware::{BodyParser, BoxFuture, Bridge, Cors, Escalator};
use crate::schema::{ApiSpec, Controllers, SchemaRouter};

/// One named unit of setup work.
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// Registers this step's behaviour on `app`. The borrow ends with the
    /// returned future; steps keep no handle to the app.
    fn apply<'a>(&'a self, app: &'a mut App) -> BoxFuture<'a, Result<(), Error>>;
}

/// A step built from a synchronous registration closure.
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnStep<F>
where
    F: Fn(&mut App) -> Result<(), Error> + Send + Sync,
{
    FnStep { name: name.into(), f }
}

/// See [`from_fn`].
pub struct FnStep<F> {
    name: String,
    f: F,
}

impl<F> Step for FnStep<F>
where
    F: Fn(&mut App) -> Result<(), Error> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply<'a>(&'a self, app: &'a mut App) -> BoxFuture<'a, Result<(), Error>> {
        let result = (self.f)(app);
        Box::pin(async move { result })
    }
}

/// Ordered list of startup steps.
#[derive(Default)]
pub struct Assembler {
    steps: Vec<Box<dyn Step>>,
}

impl Assembler {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Appends a step. Returns `self` for chaining.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Runs every step in order against `app`, stopping at the first failure.
    ///
    /// The failing step's error comes back wrapped in [`Error::Step`].
    pub async fn assemble(&self, app: &mut App) -> Result<(), Error> {
        for (position, step) in self.steps.iter().enumerate() {
            let name = step.name();
            debug!(step = name, position = position + 1, "applying pipeline step");

            if let Err(e) = step.apply(app).await {
                error!(step = name, error = %e, "pipeline step failed, aborting assembly");
                return Err(e.in_step(name));
            }

            info!(step = name, "pipeline step applied");
        }
        Ok(())
    }
}

/// Registers the schema router and the Swagger UI mount for `spec`.
pub fn attach_routes(
    app: &mut App,
    spec: &ApiSpec,
    controllers: &Controllers,
    docs_path: &str,
) -> Result<(), Error> {
    let docs = SwaggerUi::new(docs_path, spec);
    let shadowed = spec
        .operations()
        .iter()
        .find(|op| (op.method == Method::GET || op.method == Method::HEAD) && docs.serves(&op.path));
    if let Some(op) = shadowed {
        return Err(SpecError::Route {
            path: op.path.clone(),
            reason: format!("`{} {}` is shadowed by the documentation mount", op.method, op.path),
        }
        .into());
    }

    let router = SchemaRouter::build(spec, controllers)?;
    app.use_middleware(docs).use_middleware(router);
    Ok(())
}

/// Loads the API document from disk and attaches its routes.
pub struct AttachRoutes {
    spec_path: PathBuf,
    controllers: Controllers,
    docs_path: String,
}

impl AttachRoutes {
    pub fn new(spec_path: impl Into<PathBuf>, controllers: Controllers, docs_path: impl Into<String>) -> Self {
        Self { spec_path: spec_path.into(), controllers, docs_path: docs_path.into() }
    }
}

impl Step for AttachRoutes {
    fn name(&self) -> &str {
        "routes"
    }

    fn apply<'a>(&'a self, app: &'a mut App) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let spec = ApiSpec::load_async(&self.spec_path).await?;
            info!(
                path = %self.spec_path.display(),
                title = spec.title(),
                version = spec.version(),
                "api document loaded"
            );
            attach_routes(app, &spec, &self.controllers, &self.docs_path)
        })
    }
}

/// The standard startup sequence: CORS, body decoding, route attachment,
/// response bridge, error escalation.
pub fn default_steps(config: &Config, controllers: Controllers) -> Assembler {
    let origins = config.cors_origins.clone();
    Assembler::new()
        .step(from_fn("cors", move |app| {
            app.use_middleware(Cors::from_origins(&origins));
            Ok(())
        }))
        .step(from_fn("parse_body", |app| {
            app.use_middleware(BodyParser::new());
            Ok(())
        }))
        .step(AttachRoutes::new(&config.spec_path, controllers, &config.docs_path))
        .step(from_fn("bridge", |app| {
            app.use_middleware(Bridge);
            Ok(())
        }))
        .step(from_fn("handle_errors", |app| {
            app.use_error_handler(Escalator);
            Ok(())
        }))
}
