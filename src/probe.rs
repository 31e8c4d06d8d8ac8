//! Client side of the healthcheck, for container `HEALTHCHECK` directives.
//!
//! `healthcheck-demo --healthcheck` calls [`probe`] against its own listener
//! and exits 0 on success, 1 otherwise. This avoids needing curl/wget in the
//! container image.

use anyhow::Context;

/// GET `url`. `Ok(true)` on any 2xx, `Ok(false)` on any other status.
///
/// Transport failures (connection refused, DNS, timeouts) are errors.
pub async fn probe(url: &str) -> anyhow::Result<bool> {
    let resp = reqwest::get(url)
        .await
        .with_context(|| format!("probing {url}"))?;
    let status = resp.status();
    tracing::debug!(%url, %status, "probe response");
    Ok(status.is_success())
}

/// Probe URL for a server bound on `port` answering on `path`.
pub fn local_url(port: u16, path: &str) -> String {
    format!("http://127.0.0.1:{port}{path}")
}
