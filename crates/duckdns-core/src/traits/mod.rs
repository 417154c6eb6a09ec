//! Core trait definitions
//!
//! These traits define the seams between the tick engine and its network
//! collaborators. Implementations live in separate crates:
//! - `duckdns-ip-http`: IpProbe backed by https://v4.ident.me
//! - `duckdns-resolver-doh`: Resolver backed by DoH endpoints plus the
//!   system resolver
//! - `duckdns-client`: UpdateClient for the DuckDNS update endpoint

pub mod ip_probe;
pub mod resolver;
pub mod update_client;

pub use ip_probe::IpProbe;
pub use resolver::{Resolver, ResolverAnswer};
pub use update_client::{redact_token, UpdateClient, UpdateOutcome};
