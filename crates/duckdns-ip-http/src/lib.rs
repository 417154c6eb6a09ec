// # HTTP IP Probe
//
// This crate provides the public IPv4 probe for the DuckDNS agent.
//
// ## Purpose
//
// When no fixed IP is configured, the engine needs the host's current
// public IPv4 to compare against resolver answers. The probe fetches it
// from `https://v4.ident.me`, whose body is the client's source address
// as ASCII.
//
// ## Contract
//
// Best-effort with a 2 second deadline: a non-2xx status, timeout, empty
// body, or unparseable body yields `None`. The probe never fails a tick;
// `None` tells the engine to skip the skip check and update fail-open.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;

use duckdns_core::IpProbe;

/// Well-known public IP endpoint
const IDENT_ME_URL: &str = "https://v4.ident.me";

/// Connect/read/write deadline for the probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// IPv4 probe backed by `https://v4.ident.me`
///
/// Holds one HTTP client for the life of the process; ticks reuse its
/// connection pool.
pub struct IdentMeProbe {
    url: String,
    client: reqwest::Client,
}

impl IdentMeProbe {
    /// Probe against the well-known endpoint
    pub fn new() -> Self {
        Self::with_url(IDENT_ME_URL)
    }

    /// Probe against a custom endpoint (tests)
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .connect_timeout(PROBE_TIMEOUT)
                .timeout(PROBE_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for IdentMeProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IpProbe for IdentMeProbe {
    async fn fetch(&self) -> Option<Ipv4Addr> {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("IP probe request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("IP probe answered {}", response.status());
            return None;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("IP probe body unreadable: {}", e);
                return None;
            }
        };

        parse_probe_body(&body)
    }
}

/// Extract the IPv4 from a probe response body
///
/// The body, stripped of surrounding whitespace, is the result; anything
/// else is treated as a failed probe.
fn parse_probe_body(body: &str) -> Option<Ipv4Addr> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        tracing::warn!("IP probe returned an empty body");
        return None;
    }
    match trimmed.parse::<Ipv4Addr>() {
        Ok(ip) => Some(ip),
        Err(_) => {
            tracing::warn!("IP probe returned a non-IPv4 body: '{}'", trimmed);
            None
        }
    }
}
