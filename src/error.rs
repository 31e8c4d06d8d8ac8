//! Error types for the healthcheck middleware.
//!
//! There are exactly two kinds of failure the middleware itself deals with:
//!
//! - [`ConfigurationError`]: raised while *building* a [`Healthcheck`]
//!   from a declarative config. Fatal; no handler is produced.
//! - [`CheckFailure`]: the check reported (or threw) a failure while serving
//!   one request. Rendered as a `500` JSON response via [`IntoResponse`],
//!   never propagated any further.
//!
//! Panics inside the `healthy` producer are neither: they belong to the host.
//!
//! [`Healthcheck`]: crate::Healthcheck

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};

/// Boxed error returned by check functions to signal a synchronous throw.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Raised when a declarative `healthy` / `test` entry cannot be turned into a
/// callable check.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// The entry is a scalar or array where a check table was expected.
    #[error("healthcheck `{option}` must be a check table, found {found}")]
    NotCallable { option: &'static str, found: &'static str },

    /// The entry is a table but names an unknown `kind` or has bad fields.
    #[error("healthcheck `{option}` is not a valid check: {source}")]
    InvalidCheck {
        option: &'static str,
        #[source]
        source: toml::de::Error,
    },

    #[error("healthcheck `{option}` has an invalid url `{url}`: {reason}")]
    InvalidUrl {
        option: &'static str,
        url: String,
        reason: String,
    },

    #[error("failed to build HTTP client for `{option}` check")]
    HttpClient {
        option: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// A failed health check: the value the check reported, sent back verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckFailure(pub Value);

impl CheckFailure {
    /// Failure produced by a check that returned `Err`.
    ///
    /// Error objects carry no serializable fields of their own, so the body
    /// is always `{}`. The message only reaches the logs.
    pub fn thrown(err: &BoxError) -> Self {
        tracing::warn!(error = %err, "healthcheck test threw");
        Self(Value::Object(Map::new()))
    }

    /// Failure produced by a check that panicked.
    ///
    /// A string payload (`panic!("...")`) is sent as a JSON string; anything
    /// else becomes `{}`.
    pub fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&'static str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned());
        tracing::warn!(message = ?message, "healthcheck test panicked");
        match message {
            Some(m) => Self(Value::String(m)),
            None => Self(Value::Object(Map::new())),
        }
    }
}

impl IntoResponse for CheckFailure {
    fn into_response(self) -> Response {
        tracing::warn!(body = %self.0, "healthcheck unhealthy");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self.0)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    // -----------------------------------------------------------------------
    // IntoResponse
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn into_response_returns_500_with_value_as_body() {
        let response = CheckFailure(json!({ "state": "unhealthy" })).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()["content-type"],
            "application/json"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"state":"unhealthy"}"#);
    }

    #[tokio::test]
    async fn scalar_failure_values_serialize_as_is() {
        let response = CheckFailure(Value::Bool(true)).into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"true");
    }

    // -----------------------------------------------------------------------
    // Thrown values
    // -----------------------------------------------------------------------

    #[test]
    fn thrown_error_serializes_to_empty_object() {
        let err: BoxError = "boom".into();
        assert_eq!(CheckFailure::thrown(&err).0, json!({}));
    }

    #[test]
    fn panic_with_static_str_keeps_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(CheckFailure::panicked(payload).0, json!("boom"));
    }

    #[test]
    fn panic_with_formatted_string_keeps_message() {
        let payload: Box<dyn Any + Send> = Box::new(format!("code {}", 7));
        assert_eq!(CheckFailure::panicked(payload).0, json!("code 7"));
    }

    #[test]
    fn panic_with_opaque_payload_serializes_to_empty_object() {
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(CheckFailure::panicked(payload).0, json!({}));
    }

    // -----------------------------------------------------------------------
    // Display
    // -----------------------------------------------------------------------

    #[test]
    fn not_callable_names_the_option() {
        let err = ConfigurationError::NotCallable {
            option: "test",
            found: "string",
        };
        let s = err.to_string();
        assert!(s.contains("`test`"), "display: {s}");
        assert!(s.contains("string"), "display: {s}");
    }
}
