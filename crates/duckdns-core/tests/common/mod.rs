//! Test doubles and common utilities for engine contract tests
//!
//! The doubles are Clone and share their state through Arcs, so a test
//! can keep one handle while the engine owns the boxed other.

// Each test binary uses a different subset of the doubles.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock, Semaphore};

use async_trait::async_trait;
use duckdns_core::config::{AgentConfig, ConfigStore};
use duckdns_core::error::Result;
use duckdns_core::secret::{StaticKeyProvider, TokenVault};
use duckdns_core::traits::{IpProbe, Resolver, ResolverAnswer, UpdateClient, UpdateOutcome};
use duckdns_core::{AuditLog, TickEngine};

/// Plaintext token used across scenarios (DuckDNS UUID shape)
pub const TEST_TOKEN: &str = "a1b2c3d4-0000-1111-2222-333344445555";

/// A probe that always answers the same way
#[derive(Clone)]
pub struct ScriptedProbe {
    ip: Option<Ipv4Addr>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn answering(ip: Ipv4Addr) -> Self {
        Self {
            ip: Some(ip),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            ip: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpProbe for ScriptedProbe {
    async fn fetch(&self) -> Option<Ipv4Addr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ip
    }
}

/// A resolver with per-fqdn scripted answers
///
/// Unscripted hostnames resolve to three absent answers.
#[derive(Clone, Default)]
pub struct ScriptedResolver {
    answers: Arc<RwLock<HashMap<String, Vec<ResolverAnswer>>>>,
    queried: Arc<Mutex<Vec<String>>>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn script(&self, fqdn: &str, answers: Vec<ResolverAnswer>) {
        self.answers
            .write()
            .await
            .insert(fqdn.to_string(), answers);
    }

    /// Script three present answers with the given addresses
    pub async fn script_ips(&self, fqdn: &str, ips: [&str; 3]) {
        let answers = vec![
            ResolverAnswer::resolved("1.1.1.1", ips[0].parse().unwrap()),
            ResolverAnswer::resolved("8.8.8.8", ips[1].parse().unwrap()),
            ResolverAnswer::resolved("system", ips[2].parse().unwrap()),
        ];
        self.script(fqdn, answers).await;
    }

    pub async fn queried(&self) -> Vec<String> {
        self.queried.lock().await.clone()
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    async fn resolve(&self, fqdn: &str) -> Vec<ResolverAnswer> {
        self.queried.lock().await.push(fqdn.to_string());
        self.answers
            .read()
            .await
            .get(fqdn)
            .cloned()
            .unwrap_or_else(|| {
                vec![
                    ResolverAnswer::absent("1.1.1.1"),
                    ResolverAnswer::absent("8.8.8.8"),
                    ResolverAnswer::absent("system"),
                ]
            })
    }
}

/// One recorded update call
#[derive(Debug, Clone)]
pub struct UpdateCall {
    pub domains: Vec<String>,
    pub token: String,
    pub ip: Option<Ipv4Addr>,
    pub at: tokio::time::Instant,
}

/// An update client with a scripted outcome and optional gating
///
/// When gated, each call blocks until the test releases a permit,
/// letting tests hold a tick in flight.
#[derive(Clone)]
pub struct ScriptedUpdateClient {
    outcome: Arc<RwLock<UpdateOutcome>>,
    calls: Arc<Mutex<Vec<UpdateCall>>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedUpdateClient {
    pub fn answering(outcome: UpdateOutcome) -> Self {
        Self {
            outcome: Arc::new(RwLock::new(outcome)),
            calls: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    /// Gated variant; `release()` lets one blocked call proceed
    pub fn gated(outcome: UpdateOutcome) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let client = Self {
            outcome: Arc::new(RwLock::new(outcome)),
            calls: Arc::new(Mutex::new(Vec::new())),
            gate: Some(Arc::clone(&gate)),
        };
        (client, gate)
    }

    pub async fn set_outcome(&self, outcome: UpdateOutcome) {
        *self.outcome.write().await = outcome;
    }

    pub async fn calls(&self) -> Vec<UpdateCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl UpdateClient for ScriptedUpdateClient {
    async fn update(&self, domains: &[String], token: &str, ip: Option<Ipv4Addr>) -> UpdateOutcome {
        self.calls.lock().await.push(UpdateCall {
            domains: domains.to_vec(),
            token: token.to_string(),
            ip,
            at: tokio::time::Instant::now(),
        });
        if let Some(ref gate) = self.gate {
            let permit = gate.acquire().await.expect("gate closed");
            permit.forget();
        }
        self.outcome.read().await.clone()
    }
}

/// Shareable in-memory config store
#[derive(Clone, Default)]
pub struct SharedConfigStore {
    config: Arc<RwLock<Option<AgentConfig>>>,
    save_calls: Arc<AtomicUsize>,
}

impl SharedConfigStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_config(config: AgentConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(Some(config))),
            save_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn set(&self, config: AgentConfig) {
        *self.config.write().await = Some(config);
    }

    pub async fn current(&self) -> Option<AgentConfig> {
        self.config.read().await.clone()
    }

    pub fn save_call_count(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigStore for SharedConfigStore {
    async fn load(&self) -> Result<Option<AgentConfig>> {
        Ok(self.config.read().await.clone())
    }

    async fn save(&self, config: &AgentConfig) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        *self.config.write().await = Some(config.clone());
        Ok(())
    }
}

/// Vault over a fixed test key
pub fn test_vault() -> TokenVault {
    TokenVault::new(&StaticKeyProvider::new([42u8; 32]))
}

/// [`TEST_TOKEN`] wrapped with the test key
pub fn wrapped_test_token() -> String {
    test_vault().wrap(TEST_TOKEN).unwrap()
}

/// Single-domain configuration in the shape most scenarios use
pub fn home_config(ip: Option<Ipv4Addr>, interval_minutes: u64) -> AgentConfig {
    AgentConfig::new(
        vec!["home".to_string()],
        wrapped_test_token(),
        ip,
        interval_minutes,
    )
}

/// Everything a contract test needs to drive one engine
pub struct Harness {
    pub engine: Arc<TickEngine>,
    pub audit: Arc<AuditLog>,
    pub config_store: SharedConfigStore,
    pub probe: ScriptedProbe,
    pub resolver: ScriptedResolver,
    pub client: ScriptedUpdateClient,
    _audit_dir: tempfile::TempDir,
}

/// Wire an engine over the given doubles with a temp-file audit log
pub fn harness(
    config_store: SharedConfigStore,
    probe: ScriptedProbe,
    resolver: ScriptedResolver,
    client: ScriptedUpdateClient,
) -> Harness {
    let audit_dir = tempfile::tempdir().expect("tempdir");
    let audit = Arc::new(AuditLog::new(audit_dir.path().join("audit.log")));

    let engine = Arc::new(TickEngine::new(
        Box::new(config_store.clone()),
        Box::new(probe.clone()),
        Box::new(resolver.clone()),
        Box::new(client.clone()),
        test_vault(),
        Arc::clone(&audit),
    ));

    Harness {
        engine,
        audit,
        config_store,
        probe,
        resolver,
        client,
        _audit_dir: audit_dir,
    }
}
