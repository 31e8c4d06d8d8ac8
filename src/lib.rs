//! Liveness/readiness probe middleware for axum.
//!
//! On one configured path the middleware runs a user-supplied test and
//! answers with JSON: `200` plus the `healthy()` body when the test passes,
//! `500` plus the failure value when it does not. Every other request is
//! passed to the next handler untouched.
//!
//! ```rust,ignore
//! use simple_healthcheck::{healthcheck_middleware, Healthcheck, HealthcheckOptions, HealthTest};
//!
//! let hc = Healthcheck::new(
//!     HealthcheckOptions::new()
//!         .path("/ping")
//!         .test(HealthTest::sync(|| Ok(serde_json::Value::Null))),
//! );
//! let app = axum::Router::new()
//!     .route("/", axum::routing::get(|| async { "hello" }))
//!     .layer(axum::middleware::from_fn_with_state(hc, healthcheck_middleware));
//! ```

pub mod check;
pub mod config;
pub mod error;
pub mod middleware;
pub mod probe;

pub use check::{is_truthy, Completion, HealthTest};
pub use config::{Config, HealthcheckConfig};
pub use error::{BoxError, CheckFailure, ConfigurationError};
pub use middleware::{healthcheck_middleware, Healthcheck, HealthcheckOptions, DEFAULT_PATH};
