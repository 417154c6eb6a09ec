// # duckdns-core
//
// Core library for the DuckDNS auto-update agent.
//
// ## Architecture Overview
//
// This library provides the periodic update engine for keeping
// `<label>.duckdns.org` hostnames pointed at the host's public IPv4:
// - **IpProbe**: Trait for fetching the current public IPv4
// - **Resolver**: Trait for resolving a hostname against a quorum of resolvers
// - **UpdateClient**: Trait for issuing the provider update call
// - **ConfigStore**: Trait for durable agent configuration
// - **TickEngine**: One tick of the decide-then-update flow
// - **Scheduler**: Self-re-arming loop with at-most-one-in-flight semantics
// - **TokenVault**: At-rest protection of the update token
// - **AuditLog**: Append-only record of every update attempt
//
// ## Design Principles
//
// 1. **Separation of Concerns**: The engine never names a concrete network
//    implementation; probes, resolvers, and the update client live behind traits
// 2. **Best-Effort Quorum**: Resolver failures degrade to absent answers and
//    never fail a tick
// 3. **Library-First**: The daemon binary is a thin layer over this crate
// 4. **Single Writer**: The audit log is the only shared-mutable resource and
//    serialises appends internally

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod secret;
pub mod traits;

// Re-export core types for convenience
pub use audit::AuditLog;
pub use config::{AgentConfig, ConfigStore, FileConfigStore, MemoryConfigStore};
pub use engine::{TickEngine, TickOutcome, TickReport};
pub use error::{Error, Result};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use secret::{KeyProvider, PassphraseKeyProvider, StaticKeyProvider, TokenVault};
pub use traits::{IpProbe, Resolver, ResolverAnswer, UpdateClient, UpdateOutcome};
