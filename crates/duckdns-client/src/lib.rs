// # DuckDNS Update Client
//
// This crate issues the provider's update call and classifies the
// response for the DuckDNS agent.
//
// ## Protocol
//
// `GET https://www.duckdns.org/update?domains=<csv>&token=<token>[&ip=<ip>]`
//
// The body is ASCII: `OK` on success, `KO` on rejection. Classification,
// in order:
//
// 1. Body contains `OK` → ok, "OK"
// 2. Body contains `KO` → failed, "KO"
// 3. HTTP status 200 → ok, "HTTP 200"
// 4. Otherwise → failed, "HTTP <code>"
//
// Transport errors map to `ERROR: <message>`.
//
// ## Security
//
// The token appears only in the request URL. Every diagnostic string that
// may carry the URL (reqwest errors include it) passes through
// `redact_token` before leaving this crate.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;

use duckdns_core::{UpdateClient, UpdateOutcome, traits::redact_token};

/// Provider update endpoint
const UPDATE_URL: &str = "https://www.duckdns.org/update";

/// Connect/read/write deadline for the update call
const UPDATE_TIMEOUT: Duration = Duration::from_secs(15);

/// Update client for the DuckDNS provider
///
/// One HTTP client for the life of the process.
pub struct DuckDnsClient {
    url: String,
    client: reqwest::Client,
}

impl DuckDnsClient {
    /// Client against the production endpoint
    pub fn new() -> Self {
        Self::with_url(UPDATE_URL)
    }

    /// Client against a custom endpoint (tests)
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .connect_timeout(UPDATE_TIMEOUT)
                .timeout(UPDATE_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Build the update URL
    fn update_url(&self, domains: &[String], token: &str, ip: Option<Ipv4Addr>) -> String {
        let mut url = format!(
            "{}?domains={}&token={}",
            self.url,
            domains.join(","),
            token
        );
        if let Some(ip) = ip {
            url.push_str("&ip=");
            url.push_str(&ip.to_string());
        }
        url
    }
}

impl Default for DuckDnsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpdateClient for DuckDnsClient {
    async fn update(&self, domains: &[String], token: &str, ip: Option<Ipv4Addr>) -> UpdateOutcome {
        let url = self.update_url(domains, token, ip);
        tracing::debug!("update call: {}", redact_token(&url));

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                let message = redact_token(&e.to_string());
                tracing::warn!("update transport error: {}", message);
                return UpdateOutcome::failed(format!("ERROR: {}", message));
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let message = redact_token(&e.to_string());
                tracing::warn!("update body unreadable: {}", message);
                return UpdateOutcome::failed(format!("ERROR: {}", message));
            }
        };

        let outcome = classify_response(status, &body);
        tracing::debug!("update classified: ok={} ({})", outcome.ok, outcome.detail);
        outcome
    }
}

/// Classify the provider response body and status
///
/// Body content wins over the HTTP status; the status only decides when
/// the body carries neither `OK` nor `KO`.
fn classify_response(status: u16, body: &str) -> UpdateOutcome {
    if body.contains("OK") {
        UpdateOutcome::ok("OK")
    } else if body.contains("KO") {
        UpdateOutcome::failed("KO")
    } else if status == 200 {
        UpdateOutcome::ok("HTTP 200")
    } else {
        UpdateOutcome::failed(format!("HTTP {}", status))
    }
}
