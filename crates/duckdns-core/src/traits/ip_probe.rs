// # IP Probe Trait
//
// Defines the interface for fetching the host's current public IPv4.
//
// ## Implementations
//
// - ident.me: `duckdns-ip-http` crate
//
// ## Contract
//
// The probe is best-effort and never fails a tick. Any failure mode
// (non-2xx, timeout, empty or unparseable body) collapses to `None`,
// which the engine treats as "skip the skip check" and proceeds to
// update (fail-open).

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for public IP probe implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
/// They should reuse a single HTTP client across calls.
#[async_trait]
pub trait IpProbe: Send + Sync {
    /// Fetch the current public IPv4 address
    ///
    /// Returns `None` on any failure; the engine never sees a probe error.
    async fn fetch(&self) -> Option<Ipv4Addr>;
}
