// # Resolver Trait
//
// Defines the interface for resolving a fully-qualified hostname against
// a quorum of independent resolvers.
//
// ## Contract
//
// The quorum is best-effort: it NEVER fails as a whole. A resolver that
// times out, returns a malformed body, or answers non-2xx contributes an
// answer with `ip: None`. Absent answers count neither for nor against
// the drift decision.

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// One resolver's answer for a hostname
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverAnswer {
    /// Resolver identifier (e.g., "1.1.1.1", "8.8.8.8", "system")
    pub server: String,

    /// The A record the resolver returned, or `None` if the probe failed
    pub ip: Option<Ipv4Addr>,
}

impl ResolverAnswer {
    /// Answer carrying a resolved address
    pub fn resolved(server: impl Into<String>, ip: Ipv4Addr) -> Self {
        Self {
            server: server.into(),
            ip: Some(ip),
        }
    }

    /// Answer for a failed probe
    pub fn absent(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ip: None,
        }
    }
}

/// Trait for resolver quorum implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe. Probes within one `resolve` call
/// may run in parallel, each under its own deadline.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `fqdn` against every resolver in the quorum
    ///
    /// Always returns one answer per configured resolver, in quorum order.
    async fn resolve(&self, fqdn: &str) -> Vec<ResolverAnswer>;
}
