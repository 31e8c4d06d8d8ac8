//! Configuration for servers that declare their healthcheck in a file.
//!
//! Config is loaded once at startup from a TOML file and validated before the
//! server opens any ports. A `healthy` / `test` entry that cannot be turned
//! into a check is rejected with a [`ConfigurationError`] rather than
//! silently falling back to the default.
//!
//! # Example
//! ```toml
//! [server]
//! port = 3000
//!
//! [healthcheck]
//! path = "/ping"
//!
//! [healthcheck.test]
//! kind  = "static"
//! value = { state = "unhealthy" }
//! ```

use std::{path::Path, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    check::{self, Completion, HealthTest, HealthyFn},
    error::ConfigurationError,
    middleware::{Healthcheck, HealthcheckOptions},
};

/// Top-level config for `healthcheck-demo`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub healthcheck: HealthcheckConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("parsing config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.server.port != 0, "[server] port must be non-zero");

        // Build once so bad checks fail before any port is opened.
        Healthcheck::from_config(&self.healthcheck).context("invalid [healthcheck] section")?;
        Ok(())
    }
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind")]
    pub bind: String,

    /// Log filter used when `RUST_LOG` is unset (e.g. `"debug"`).
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            log_level: None,
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_bind() -> String {
    "0.0.0.0".into()
}

/// The `[healthcheck]` section.
///
/// `healthy` and `test` are kept as raw TOML until the check is built so a
/// scalar in their place is reported as "not a check" instead of a generic
/// parse failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HealthcheckConfig {
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub healthy: Option<toml::Value>,

    #[serde(default)]
    pub test: Option<toml::Value>,
}

impl HealthcheckConfig {
    pub(crate) fn to_options(&self) -> Result<HealthcheckOptions, ConfigurationError> {
        let mut options = HealthcheckOptions::new();
        if let Some(path) = &self.path {
            options = options.path(path.clone());
        }
        if let Some(raw) = &self.healthy {
            let decl: HealthyDecl = decode("healthy", raw)?;
            if let Some(healthy) = decl.build() {
                options = options.healthy_fn(healthy);
            }
        }
        if let Some(raw) = &self.test {
            let decl: TestDecl = decode("test", raw)?;
            options = options.test(decl.build()?);
        }
        Ok(options)
    }
}

/// Declarative `healthy` producer.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HealthyDecl {
    /// `{"uptime": <seconds>}` counted from middleware construction.
    Uptime,
    /// Always the same body.
    Static { value: toml::Value },
}

impl HealthyDecl {
    /// `None` means "use the default producer".
    fn build(self) -> Option<HealthyFn> {
        match self {
            Self::Uptime => None,
            Self::Static { value } => Some(check::static_body(to_json(value))),
        }
    }
}

/// Declarative `test`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestDecl {
    /// Always healthy.
    Pass,
    /// Always reports `value`; truthy means unhealthy.
    Static { value: toml::Value },
    /// GET `url`; any non-2xx status or transport error is unhealthy.
    Http {
        url: String,
        #[serde(default = "default_http_timeout_ms")]
        timeout_ms: u64,
    },
}

fn default_http_timeout_ms() -> u64 {
    5_000
}

impl TestDecl {
    fn build(self) -> Result<HealthTest, ConfigurationError> {
        match self {
            Self::Pass => Ok(HealthTest::pass()),
            Self::Static { value } => {
                let verdict = to_json(value);
                Ok(HealthTest::sync(move || Ok(verdict.clone())))
            }
            Self::Http { url, timeout_ms } => http_test(url, Duration::from_millis(timeout_ms)),
        }
    }
}

/// Callback-form test probing an upstream over HTTP from a spawned task.
fn http_test(url: String, timeout: Duration) -> Result<HealthTest, ConfigurationError> {
    let url = reqwest::Url::parse(&url).map_err(|e| ConfigurationError::InvalidUrl {
        option: "test",
        url: url.clone(),
        reason: e.to_string(),
    })?;
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|source| ConfigurationError::HttpClient {
            option: "test",
            source,
        })?;

    Ok(HealthTest::callback(move |done: Completion| {
        let client = client.clone();
        let url = url.clone();
        tokio::spawn(async move {
            match client.get(url.clone()).send().await {
                Ok(resp) if resp.status().is_success() => done.ok(),
                Ok(resp) => done.complete(json!({
                    "url": url.as_str(),
                    "status": resp.status().as_u16(),
                })),
                Err(e) => done.complete(json!({
                    "url": url.as_str(),
                    "error": e.to_string(),
                })),
            }
        });
        Ok(())
    }))
}

fn decode<T: serde::de::DeserializeOwned>(
    option: &'static str,
    raw: &toml::Value,
) -> Result<T, ConfigurationError> {
    if !raw.is_table() {
        return Err(ConfigurationError::NotCallable {
            option,
            found: raw.type_str(),
        });
    }
    raw.clone()
        .try_into()
        .map_err(|source| ConfigurationError::InvalidCheck { option, source })
}

fn to_json(value: toml::Value) -> Value {
    // Non-finite floats have no JSON form and come out as null.
    serde_json::to_value(value).unwrap_or(Value::Null)
}
