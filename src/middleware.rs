//! The healthcheck middleware.
//!
//! Mount it with [`axum::middleware::from_fn_with_state`]:
//!
//! ```rust,ignore
//! let hc = Healthcheck::new(HealthcheckOptions::new().path("/ping"));
//! let app = Router::new()
//!     .route("/", get(index))
//!     .layer(axum::middleware::from_fn_with_state(hc, healthcheck_middleware));
//! ```
//!
//! Requests whose URI path is exactly the configured path are answered here
//! with a JSON body; everything else goes to `next` untouched.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Instant,
};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    check::{is_truthy, uptime_since, CallbackFn, Completion, HealthTest, HealthyFn},
    config::HealthcheckConfig,
    error::{CheckFailure, ConfigurationError},
};

/// Path answered when none is configured.
pub const DEFAULT_PATH: &str = "/healthcheck";

/// Construction-time options. Every field is optional.
#[derive(Default)]
pub struct HealthcheckOptions {
    path: Option<String>,
    healthy: Option<HealthyFn>,
    test: Option<HealthTest>,
    started_at: Option<Instant>,
}

impl HealthcheckOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path to answer on. An empty string means [`DEFAULT_PATH`].
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Producer for the body of a healthy response.
    pub fn healthy<F>(mut self, healthy: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.healthy = Some(Arc::new(healthy));
        self
    }

    pub(crate) fn healthy_fn(mut self, healthy: HealthyFn) -> Self {
        self.healthy = Some(healthy);
        self
    }

    pub fn test(mut self, test: HealthTest) -> Self {
        self.test = Some(test);
        self
    }

    /// Instant the default `uptime` body counts from. Defaults to the moment
    /// [`Healthcheck::new`] runs.
    pub fn started_at(mut self, started_at: Instant) -> Self {
        self.started_at = Some(started_at);
        self
    }
}

/// A ready-to-mount healthcheck. Cheap to clone; the configuration inside is
/// immutable and shared by every request.
#[derive(Clone)]
pub struct Healthcheck {
    inner: Arc<Inner>,
}

struct Inner {
    path: String,
    healthy: HealthyFn,
    test: CallbackFn,
}

impl Healthcheck {
    pub fn new(options: HealthcheckOptions) -> Self {
        let path = options
            .path
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_owned());
        let started_at = options.started_at.unwrap_or_else(Instant::now);
        let healthy = options.healthy.unwrap_or_else(|| uptime_since(started_at));
        let test = options.test.unwrap_or_default().into_callback();

        Self {
            inner: Arc::new(Inner {
                path,
                healthy,
                test,
            }),
        }
    }

    /// Build from a declarative `[healthcheck]` config section.
    ///
    /// Fails if a `healthy` or `test` entry cannot be turned into a check;
    /// no handler exists in that case.
    pub fn from_config(config: &HealthcheckConfig) -> Result<Self, ConfigurationError> {
        Ok(Self::new(config.to_options()?))
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Answer on the configured path, delegate everything else.
    pub async fn handle(&self, req: Request, next: Next) -> Response {
        if req.uri().path() != self.inner.path {
            return next.run(req).await;
        }
        self.evaluate().await
    }

    /// Run the test once and render the JSON response.
    ///
    /// Only the synchronous part of the test call is guarded. `healthy()` is
    /// not: if it panics, the panic is the host's to handle.
    pub async fn evaluate(&self) -> Response {
        let (done, rx) = Completion::channel();
        let test = &self.inner.test;

        match panic::catch_unwind(AssertUnwindSafe(move || test(done))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return CheckFailure::thrown(&err).into_response(),
            Err(payload) => return CheckFailure::panicked(payload).into_response(),
        }

        let verdict = match rx.await {
            Ok(verdict) => verdict,
            Err(_) => {
                warn!(
                    path = %self.inner.path,
                    "healthcheck test dropped its completion without reporting; request left pending"
                );
                std::future::pending::<Value>().await
            }
        };

        if is_truthy(&verdict) {
            return CheckFailure(verdict).into_response();
        }

        let body = (self.inner.healthy)();
        debug!(path = %self.inner.path, "healthcheck healthy");
        (StatusCode::OK, Json(body)).into_response()
    }
}

impl fmt::Debug for Healthcheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Healthcheck")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

/// Axum middleware answering liveness/readiness probes.
pub async fn healthcheck_middleware(
    State(hc): State<Healthcheck>,
    req: Request,
    next: Next,
) -> Response {
    hc.handle(req, next).await
}
