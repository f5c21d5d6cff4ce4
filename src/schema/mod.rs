//! API-document driven routing.
//!
//! The document (OpenAPI 3 or Swagger 2, YAML or JSON) is the contract: it
//! names every operation, its parameters and its body schema. This module
//! turns it into a [`SchemaRouter`], a request stage that matches, validates
//! and invokes the handler registered for each `operationId`.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use swivel::schema::{ApiSpec, Controllers, SchemaRouter};
//! use swivel::{Failure, Request};
//!
//! async fn ping(_req: Arc<Request>) -> Result<&'static str, Failure> {
//!     Ok("pong")
//! }
//!
//! # fn main() -> Result<(), swivel::SpecError> {
//! let spec = ApiSpec::load("api/swagger/swagger.yaml")?;
//! let controllers = Controllers::new().register("ping", ping);
//! let router = SchemaRouter::build(&spec, &controllers)?;
//! # let _ = router;
//! # Ok(())
//! # }
//! ```

mod controllers;
mod load;
mod router;

pub use controllers::Controllers;
pub use load::{ApiSpec, BodySpec, Location, Operation, Parameter};
pub use router::SchemaRouter;
