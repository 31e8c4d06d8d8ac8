//! Check functions: the user-supplied `test` and `healthy` producers.
//!
//! A test comes in one of two explicit shapes:
//!
//! - [`HealthTest::Sync`]: returns its verdict directly. A truthy value
//!   means "unhealthy" and becomes the response body.
//! - [`HealthTest::Callback`]: receives a [`Completion`] and reports through
//!   it, either before returning or later from a spawned task.
//!
//! Before serving any request a `Sync` test is wrapped into the callback
//! shape (see [`HealthTest::into_callback`]) so dispatch only ever drives one
//! form.

use std::{fmt, sync::Arc, time::Instant};

use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::error::BoxError;

/// Produces the JSON body of a healthy response.
pub type HealthyFn = Arc<dyn Fn() -> Value + Send + Sync>;

pub type SyncFn = Arc<dyn Fn() -> Result<Value, BoxError> + Send + Sync>;
pub type CallbackFn = Arc<dyn Fn(Completion) -> Result<(), BoxError> + Send + Sync>;

/// A user-supplied health test.
#[derive(Clone)]
pub enum HealthTest {
    /// Returns `Ok(value)`; a falsy `value` is healthy. `Err` counts as a throw.
    Sync(SyncFn),
    /// Must call [`Completion::complete`] (or `ok`) once. `Err` counts as a throw.
    Callback(CallbackFn),
}

impl HealthTest {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn() -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Completion) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }

    /// The default test: always healthy.
    pub fn pass() -> Self {
        Self::sync(|| Ok(Value::Null))
    }

    /// Normalize to the callback shape.
    ///
    /// A sync test's return value is forwarded straight into the completion
    /// handle; its `Err` is returned before the handle is touched.
    pub(crate) fn into_callback(self) -> CallbackFn {
        match self {
            Self::Callback(f) => f,
            Self::Sync(f) => Arc::new(move |done: Completion| {
                let verdict = f()?;
                done.complete(verdict);
                Ok(())
            }),
        }
    }
}

impl Default for HealthTest {
    fn default() -> Self {
        Self::pass()
    }
}

impl fmt::Debug for HealthTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sync(_) => "HealthTest::Sync",
            Self::Callback(_) => "HealthTest::Callback",
        })
    }
}

/// One-shot handle a callback test uses to report its outcome.
///
/// Consumed on use, so a test can report at most once. Dropping it without
/// reporting leaves the request waiting forever.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<Value>,
}

impl Completion {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Value>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Report the outcome. A truthy `err` marks the check as failed and is
    /// sent back as the response body.
    pub fn complete(self, err: impl Into<Value>) {
        // Receiver gone means the request was cancelled; nothing to answer.
        let _ = self.tx.send(err.into());
    }

    /// Report success.
    pub fn ok(self) {
        self.complete(Value::Null);
    }
}

/// JavaScript truthiness over JSON values.
///
/// `null`, `false`, `0` and `""` are falsy. Every object and array is
/// truthy, empty ones included.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The default healthy producer: `{"uptime": <seconds since started_at>}`.
pub fn uptime_since(started_at: Instant) -> HealthyFn {
    Arc::new(move || json!({ "uptime": started_at.elapsed().as_secs_f64() }))
}

/// A healthy producer that always returns the same body.
pub fn static_body(body: Value) -> HealthyFn {
    Arc::new(move || body.clone())
}
