// # DoH Resolver Quorum
//
// This crate provides the resolver quorum for the DuckDNS agent.
//
// ## Reference set
//
// - `1.1.1.1` via DoH JSON: `https://1.1.1.1/dns-query?name=…&type=A`
// - `8.8.8.8` via DoH JSON: `https://8.8.8.8/resolve?name=…&type=A`
// - The host's system resolver as the third voice
//
// DoH requests carry the `accept: application/dns-json` header and parse
// the JSON `Answer[].data` array, picking the first A record. The stock
// resolver cannot be pointed at a specific server, hence DoH for the two
// endpoints where it exists.
//
// ## Contract
//
// The quorum is best-effort and NEVER fails as a whole: a probe that
// times out, answers non-2xx, or returns a malformed body contributes an
// absent answer. Probes run in parallel, each under its own 2 second
// deadline.

use async_trait::async_trait;
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::lookup_host;

use duckdns_core::{Resolver, ResolverAnswer};

/// Cloudflare DoH JSON endpoint
const CLOUDFLARE_DOH_URL: &str = "https://1.1.1.1/dns-query";

/// Google DoH JSON endpoint
const GOOGLE_DOH_URL: &str = "https://8.8.8.8/resolve";

/// Per-probe deadline
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// DNS record type for A records in DoH JSON answers
const TYPE_A: u16 = 1;

/// DoH JSON response body (the fields the quorum cares about)
#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

/// One entry of the `Answer` array
#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type", default)]
    record_type: Option<u16>,
    #[serde(default)]
    data: String,
}

/// The reference resolver quorum
///
/// One HTTP client for both DoH endpoints, reused across ticks.
pub struct DohQuorum {
    client: reqwest::Client,
    cloudflare_url: String,
    google_url: String,
}

impl DohQuorum {
    /// Quorum over the reference endpoints
    pub fn new() -> Self {
        Self::with_urls(CLOUDFLARE_DOH_URL, GOOGLE_DOH_URL)
    }

    /// Quorum over custom DoH endpoints (tests)
    pub fn with_urls(cloudflare_url: impl Into<String>, google_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(PROBE_TIMEOUT)
                .timeout(PROBE_TIMEOUT)
                .build()
                .unwrap_or_default(),
            cloudflare_url: cloudflare_url.into(),
            google_url: google_url.into(),
        }
    }

    /// Query one DoH endpoint; any failure collapses to an absent answer
    async fn query_doh(&self, server: &str, base_url: &str, fqdn: &str) -> ResolverAnswer {
        let url = format!("{}?name={}&type=A", base_url, fqdn);

        let response = match self
            .client
            .get(&url)
            .header("accept", "application/dns-json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("resolver {} request failed for {}: {}", server, fqdn, e);
                return ResolverAnswer::absent(server);
            }
        };

        if !response.status().is_success() {
            tracing::debug!(
                "resolver {} answered {} for {}",
                server,
                response.status(),
                fqdn
            );
            return ResolverAnswer::absent(server);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("resolver {} body unreadable for {}: {}", server, fqdn, e);
                return ResolverAnswer::absent(server);
            }
        };

        match first_a_record(&body) {
            Some(ip) => {
                tracing::debug!("resolver {} resolved {} to {}", server, fqdn, ip);
                ResolverAnswer::resolved(server, ip)
            }
            None => {
                tracing::debug!("resolver {} returned no A record for {}", server, fqdn);
                ResolverAnswer::absent(server)
            }
        }
    }

    /// Query the host's system resolver under the same deadline
    async fn query_system(&self, fqdn: &str) -> ResolverAnswer {
        let lookup = tokio::time::timeout(PROBE_TIMEOUT, lookup_host((fqdn, 0)));
        match lookup.await {
            Ok(Ok(addrs)) => {
                let ip = addrs.into_iter().find_map(|addr| match addr {
                    SocketAddr::V4(v4) => Some(*v4.ip()),
                    SocketAddr::V6(_) => None,
                });
                match ip {
                    Some(ip) => {
                        tracing::debug!("system resolver resolved {} to {}", fqdn, ip);
                        ResolverAnswer::resolved("system", ip)
                    }
                    None => ResolverAnswer::absent("system"),
                }
            }
            Ok(Err(e)) => {
                tracing::debug!("system resolver failed for {}: {}", fqdn, e);
                ResolverAnswer::absent("system")
            }
            Err(_) => {
                tracing::debug!("system resolver timed out for {}", fqdn);
                ResolverAnswer::absent("system")
            }
        }
    }
}

impl Default for DohQuorum {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resolver for DohQuorum {
    async fn resolve(&self, fqdn: &str) -> Vec<ResolverAnswer> {
        let (cloudflare, google, system) = tokio::join!(
            self.query_doh("1.1.1.1", &self.cloudflare_url, fqdn),
            self.query_doh("8.8.8.8", &self.google_url, fqdn),
            self.query_system(fqdn),
        );
        vec![cloudflare, google, system]
    }
}

/// Extract the first A record from a DoH JSON body
///
/// Answers may interleave CNAME records before the terminal A records;
/// entries whose type is not A, or whose data is not an IPv4 literal,
/// are skipped.
fn first_a_record(body: &str) -> Option<Ipv4Addr> {
    let response: DohResponse = serde_json::from_str(body).ok()?;
    response
        .answer
        .into_iter()
        .filter(|answer| answer.record_type.is_none_or(|t| t == TYPE_A))
        .find_map(|answer| answer.data.parse::<Ipv4Addr>().ok())
}
