//! # swivel
//!
//! An HTTP service scaffold driven by an OpenAPI document.
//!
//! The document names every operation; the service only supplies a handler
//! per `operationId`. At startup a fixed pipeline configures the server:
//!
//! 1. cross-origin policy ([`middleware::Cors`])
//! 2. body decoding ([`middleware::BodyParser`])
//! 3. routes from the document ([`schema::SchemaRouter`], plus Swagger UI)
//! 4. the response bridge ([`middleware::Bridge`])
//! 5. the error escalator ([`middleware::Escalator`])
//!
//! Handlers never write responses. They return a [`Reply`] (or just an
//! `async` result) and the bridge turns it into exactly one response; a
//! failure travels to the escalator, which logs it once and answers with a
//! `{ "message": … }` JSON body.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use swivel::{AlwaysReady, Config, Failure, Request, Server};
//! use swivel::schema::Controllers;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), swivel::Error> {
//!     let config = Config::from_env()?;
//!     swivel::logging::init(&config)?;
//!
//!     let controllers = Controllers::new().register("ping", ping);
//!     let app = Server::with_defaults(&config, controllers)
//!         .boot(&AlwaysReady)
//!         .await?;
//!
//!     app.listen(config.addr()?).await
//! }
//!
//! async fn ping(_req: Arc<Request>) -> Result<&'static str, Failure> {
//!     Ok("pong")
//! }
//! ```

pub mod config;
pub mod docs;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod pipeline;
pub mod readiness;
pub mod schema;

mod app;
mod error;
mod exchange;
mod failure;
mod handler;
mod reply;
mod request;
mod request_log;
mod response;
mod server;

pub use app::App;
pub use config::Config;
pub use error::{Error, SpecError};
pub use exchange::Exchange;
pub use failure::Failure;
pub use handler::Handler;
pub use readiness::{AlwaysReady, Readiness, TcpProbe};
pub use reply::{IntoReply, Pending, Reply};
pub use request::{Body, Request};
pub use request_log::{RequestLog, TracingLog};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use server::Server;
