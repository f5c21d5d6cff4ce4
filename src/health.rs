//! Built-in health-check handlers.
//!
//! | Probe | Body | Question |
//! |---|---|---|
//! | **Liveness** | `"ok"` | Is the process alive? Failure → restart. |
//! | **Readiness** | `"ready"` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Both are ordinary controllers. Bind them to operations in the API
//! document:
//!
//! ```rust,no_run
//! use swivel::{health, schema::Controllers};
//!
//! let controllers = health::register(Controllers::new());
//! ```
//!
//! Startup already waits for dependencies (see [`crate::readiness`]), so an
//! initialized server is ready by definition. Replace `readiness` with your
//! own handler if traffic must also be gated on dependency health later on.

use std::sync::Arc;

use crate::failure::Failure;
use crate::request::Request;
use crate::schema::Controllers;

/// Liveness probe. Always `"ok"`.
pub async fn liveness(_req: Arc<Request>) -> Result<&'static str, Failure> {
    Ok("ok")
}

/// Readiness probe. Always `"ready"`.
pub async fn readiness(_req: Arc<Request>) -> Result<&'static str, Failure> {
    Ok("ready")
}

/// Registers both probes under the `liveness` and `readiness` operation ids.
pub fn register(controllers: Controllers) -> Controllers {
    controllers.register("liveness", liveness).register("readiness", readiness)
}
