//! Tick engine
//!
//! The TickEngine runs one scheduled execution of the update flow:
//! - Read configuration (the engine never edits it, except to re-wrap a
//!   legacy plaintext token)
//! - Establish the target IP: the operator-fixed address, or the public
//!   IP probe
//! - Resolve every configured hostname against the resolver quorum and
//!   decide whether DNS has drifted
//! - Issue the provider update when drift is detected
//! - Append audit lines for every branch
//!
//! ## Dataflow
//!
//! ```text
//! Scheduler ──tick──▶ ConfigStore ──▶ IpProbe / fixed IP
//!                                         │
//!                                         ▼
//!                                 Resolver (per domain)
//!                                         │
//!                                    drift? ──no──▶ SKIPPED
//!                                         │yes
//!                                         ▼
//!                                  UpdateClient ──▶ SUCCESS / FAILED / ERROR
//! ```
//!
//! Every branch writes exactly one terminal audit line, preceded by a
//! `triggered` marker. The tick never fails: all errors collapse into a
//! [`TickOutcome`] so the scheduler always re-arms.

use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audit::{self, AuditLog};
use crate::config::{AgentConfig, ConfigStore, DEFAULT_INTERVAL_MINUTES};
use crate::secret::{TokenVault, is_duckdns_token_shape};
use crate::traits::{IpProbe, Resolver, UpdateClient, redact_token};

/// Disagreeing present answers required before a domain counts as drifted
///
/// Two independent resolvers disagreeing with the target is taken as
/// evidence that authoritative data has not converged, while one flaky
/// resolver is tolerated. Absent answers count neither way.
pub const DRIFT_EVIDENCE_THRESHOLD: usize = 2;

/// Terminal classification of one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No usable configuration; the tick short-circuited
    NoConfig,

    /// The quorum already agrees with the target IP for every domain
    SkippedUpToDate,

    /// Provider accepted the update (body `OK`)
    UpdateOk,

    /// Provider rejected the update (body `KO`)
    UpdateKo,

    /// Neither `OK` nor `KO` in the body; classified by HTTP status
    UpdateHttp(u16),

    /// Transport failure or any other uncaught error
    Error(String),
}

impl TickOutcome {
    /// Whether the tick ended with an accepted update
    pub fn is_success(&self) -> bool {
        matches!(self, Self::UpdateOk | Self::UpdateHttp(200))
    }
}

/// Result of one tick, carrying the interval for the next arming
///
/// The interval is the one read from this tick's configuration, so a
/// change observed through the tick is honoured on the following arming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Terminal classification
    pub outcome: TickOutcome,

    /// Minutes until the next tick
    pub interval_minutes: u64,
}

/// The periodic update engine
///
/// One engine instance lives for the whole process; its collaborators
/// (probe, resolver, update client) each hold a long-lived HTTP client.
pub struct TickEngine {
    config_store: Box<dyn ConfigStore>,
    ip_probe: Box<dyn IpProbe>,
    resolver: Box<dyn Resolver>,
    update_client: Box<dyn UpdateClient>,
    vault: TokenVault,
    audit: Arc<AuditLog>,
}

impl TickEngine {
    /// Create an engine over the given collaborators
    pub fn new(
        config_store: Box<dyn ConfigStore>,
        ip_probe: Box<dyn IpProbe>,
        resolver: Box<dyn Resolver>,
        update_client: Box<dyn UpdateClient>,
        vault: TokenVault,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            config_store,
            ip_probe,
            resolver,
            update_client,
            vault,
            audit,
        }
    }

    /// The audit log shared with the host (for tail/clear commands)
    pub fn audit(&self) -> Arc<AuditLog> {
        Arc::clone(&self.audit)
    }

    /// Run one tick to completion
    ///
    /// Infallible by design: every failure mode is classified, audited,
    /// and returned so the scheduler re-arms unconditionally.
    pub async fn run_tick(&self) -> TickReport {
        debug!("tick started");
        self.audit.append(&audit::triggered_line()).await;

        let config = match self.config_store.load().await {
            Ok(Some(config)) => config,
            Ok(None) => {
                info!("no configuration found, skipping tick");
                self.audit.append(&audit::no_config_line()).await;
                return TickReport {
                    outcome: TickOutcome::NoConfig,
                    interval_minutes: DEFAULT_INTERVAL_MINUTES,
                };
            }
            Err(e) => {
                let message = redact_token(&e.to_string());
                warn!("failed to load configuration: {}", message);
                self.audit
                    .append(&audit::engine_error_line(&message))
                    .await;
                return TickReport {
                    outcome: TickOutcome::Error(message),
                    interval_minutes: DEFAULT_INTERVAL_MINUTES,
                };
            }
        };

        let interval_minutes = config.interval_minutes;

        let token = match self.unwrap_token(&config).await {
            Some(token) => token,
            None => {
                self.audit.append(&audit::no_config_line()).await;
                return TickReport {
                    outcome: TickOutcome::NoConfig,
                    interval_minutes,
                };
            }
        };

        let outcome = self.decide_and_update(&config, &token).await;
        debug!("tick finished: {:?}", outcome);

        TickReport {
            outcome,
            interval_minutes,
        }
    }

    /// Unwrap the stored token, migrating legacy plaintext tokens in place
    ///
    /// Returns `None` when the stored value is neither a valid ciphertext
    /// nor a plausible plaintext token; the tick then reports no-config.
    async fn unwrap_token(&self, config: &AgentConfig) -> Option<String> {
        match self.vault.unwrap(&config.token) {
            Ok(token) => Some(token),
            Err(e) if is_duckdns_token_shape(&config.token) => {
                info!("stored token is legacy plaintext, re-wrapping");
                let plaintext = config.token.clone();
                match self.vault.wrap(&plaintext) {
                    Ok(wrapped) => {
                        let migrated = AgentConfig {
                            token: wrapped,
                            ..config.clone()
                        };
                        if let Err(save_err) = self.config_store.save(&migrated).await {
                            warn!("failed to persist re-wrapped token: {}", save_err);
                        }
                    }
                    Err(wrap_err) => {
                        warn!("failed to wrap legacy token: {} ({})", wrap_err, e);
                    }
                }
                Some(plaintext)
            }
            Err(e) => {
                warn!("stored token is unusable, discarding: {}", e);
                None
            }
        }
    }

    /// Compare quorum answers with the target IP and update on drift
    async fn decide_and_update(&self, config: &AgentConfig, token: &str) -> TickOutcome {
        let target_ip = match config.ip {
            Some(ip) => {
                debug!("using configured IP: {}", ip);
                Some(ip)
            }
            None => match self.ip_probe.fetch().await {
                Some(ip) => {
                    debug!("current public IP: {}", ip);
                    Some(ip)
                }
                None => {
                    // Fail open: an unreachable probe must not let drift
                    // go unnoticed, so the skip check is skipped.
                    warn!("public IP probe failed, proceeding with update");
                    None
                }
            },
        };

        if let Some(target) = target_ip
            && !self.any_domain_drifted(config, target).await
        {
            info!("DNS already up to date with {}", target);
            self.audit
                .append(&audit::skipped_line(
                    &config.domains_csv(),
                    &target.to_string(),
                ))
                .await;
            return TickOutcome::SkippedUpToDate;
        }

        let result = self
            .update_client
            .update(&config.domains, token, config.ip)
            .await;

        let detail = redact_token(&result.detail);
        let fixed_ip = config.ip.map(|ip| ip.to_string());
        self.audit
            .append(&audit::verdict_line(
                &config.domains_csv(),
                fixed_ip.as_deref(),
                result.ok,
                &detail,
            ))
            .await;

        classify_update(result.ok, &detail)
    }

    /// OR-aggregate the per-domain drift decision
    async fn any_domain_drifted(&self, config: &AgentConfig, target: Ipv4Addr) -> bool {
        for fqdn in config.fqdns() {
            let answers = self.resolver.resolve(&fqdn).await;

            let mismatches = answers
                .iter()
                .filter(|answer| answer.ip.is_some_and(|ip| ip != target))
                .count();

            for answer in &answers {
                debug!(
                    "resolver {} answered {:?} for {}",
                    answer.server, answer.ip, fqdn
                );
            }

            if mismatches >= DRIFT_EVIDENCE_THRESHOLD {
                info!(
                    "drift detected for {}: {} resolvers disagree with {}",
                    fqdn, mismatches, target
                );
                return true;
            }
        }
        false
    }
}

/// Map a classified update result onto the tick outcome taxonomy
fn classify_update(ok: bool, detail: &str) -> TickOutcome {
    if let Some(message) = detail.strip_prefix("ERROR:") {
        return TickOutcome::Error(message.trim().to_string());
    }
    if detail == "OK" {
        return TickOutcome::UpdateOk;
    }
    if detail == "KO" {
        return TickOutcome::UpdateKo;
    }
    if let Some(code) = detail.strip_prefix("HTTP ") {
        if let Ok(code) = code.parse::<u16>() {
            return TickOutcome::UpdateHttp(code);
        }
    }
    if ok {
        TickOutcome::UpdateOk
    } else {
        TickOutcome::Error(detail.to_string())
    }
}
