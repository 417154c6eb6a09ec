//! Agent configuration and the durable config store
//!
//! Configuration is produced by an external editor and read by the engine
//! on every tick; the engine itself writes only when re-wrapping a legacy
//! plaintext token. The durable form is a string-typed key/value document:
//!
//! - `domains` — comma-separated labels
//! - `token` — base64 of `iv(12) ‖ AEAD ciphertext ‖ tag` (see `secret`)
//! - `ip` — optional IPv4 literal
//! - `interval` — decimal minutes, clamped to ≥ 1
//!
//! Empty strings are treated as absent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Default tick interval when no configuration exists
pub const DEFAULT_INTERVAL_MINUTES: u64 = 15;

/// Suffix appended to bare labels at resolution and update time
pub const DUCKDNS_SUFFIX: &str = ".duckdns.org";

/// In-memory agent configuration
///
/// `token` holds the *wrapped* token as stored; plaintext never touches
/// this struct or durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Ordered, caller-deduplicated DuckDNS labels
    pub domains: Vec<String>,

    /// Wrapped update token (base64, IV-prefixed AEAD)
    pub token: String,

    /// Operator-fixed IPv4; `None` means "probe the public IP"
    pub ip: Option<Ipv4Addr>,

    /// Tick interval in minutes, always ≥ 1
    pub interval_minutes: u64,
}

impl AgentConfig {
    /// Create a configuration, clamping the interval to ≥ 1
    pub fn new(
        domains: Vec<String>,
        token: impl Into<String>,
        ip: Option<Ipv4Addr>,
        interval_minutes: u64,
    ) -> Self {
        Self {
            domains,
            token: token.into(),
            ip,
            interval_minutes: interval_minutes.max(1),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.domains.is_empty() {
            return Err(Error::config("no domains configured"));
        }
        for label in &self.domains {
            if label.is_empty() {
                return Err(Error::config("domain label cannot be empty"));
            }
            if label.chars().any(|c| c.is_whitespace() || c == ',') {
                return Err(Error::config(format!("invalid domain label: '{}'", label)));
            }
        }
        if self.token.is_empty() {
            return Err(Error::config("token cannot be empty"));
        }
        Ok(())
    }

    /// Fully-qualified hostnames for resolution
    ///
    /// A label without a dot is implicitly suffixed with `.duckdns.org`.
    pub fn fqdns(&self) -> Vec<String> {
        self.domains
            .iter()
            .map(|label| {
                if label.contains('.') {
                    label.clone()
                } else {
                    format!("{}{}", label, DUCKDNS_SUFFIX)
                }
            })
            .collect()
    }

    /// Comma-separated domain list as it appears in audit lines and the
    /// provider update call
    pub fn domains_csv(&self) -> String {
        self.domains.join(",")
    }
}

/// Durable key/value form of the configuration
///
/// All values are strings so the file stays editable by the external
/// front-end; conversion to [`AgentConfig`] happens on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedConfig {
    #[serde(default)]
    domains: String,
    #[serde(default)]
    token: String,
    #[serde(default)]
    ip: String,
    #[serde(default)]
    interval: String,
}

impl PersistedConfig {
    fn from_agent(config: &AgentConfig) -> Self {
        Self {
            domains: config.domains_csv(),
            token: config.token.clone(),
            ip: config.ip.map(|ip| ip.to_string()).unwrap_or_default(),
            interval: config.interval_minutes.to_string(),
        }
    }

    /// Convert to the in-memory form; `None` when domains or token are absent
    fn into_agent(self) -> Option<AgentConfig> {
        let domains: Vec<String> = self
            .domains
            .split(',')
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .collect();

        let token = self.token.trim().to_string();
        if domains.is_empty() || token.is_empty() {
            return None;
        }

        let ip = self.ip.trim().parse::<Ipv4Addr>().ok();
        let interval = self
            .interval
            .trim()
            .parse::<u64>()
            .unwrap_or(DEFAULT_INTERVAL_MINUTES)
            .max(1);

        Some(AgentConfig {
            domains,
            token,
            ip,
            interval_minutes: interval,
        })
    }
}

/// Trait for durable configuration stores
///
/// Stores must be safe for concurrent readers with a single writer, and a
/// partially-written save must never be observable.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the configuration, or `None` when no usable one exists
    async fn load(&self) -> Result<Option<AgentConfig>>;

    /// Persist the configuration atomically
    async fn save(&self, config: &AgentConfig) -> Result<()>;
}

/// File-backed config store with atomic writes
///
/// Saves write to a temporary sibling and rename into place, so readers
/// observe either the previous or the new document, never a torn one.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    /// Create a store at `path`; parent directories are created on save
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> Result<Option<AgentConfig>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("config file does not exist: {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::config(format!(
                    "failed to read config file {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let persisted: PersistedConfig = serde_json::from_str(&content).map_err(|e| {
            Error::config(format!(
                "failed to parse config file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(persisted.into_agent())
    }

    async fn save(&self, config: &AgentConfig) -> Result<()> {
        config.validate()?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(&PersistedConfig::from_agent(config))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::config(format!(
                    "failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::config(format!(
                    "failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.flush().await.map_err(|e| {
                Error::config(format!(
                    "failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::config(format!(
                "failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("config written to {}", self.path.display());
        Ok(())
    }
}

/// In-memory config store (tests and embedders)
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: RwLock<Option<AgentConfig>>,
}

impl MemoryConfigStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `config`
    pub fn with_config(config: AgentConfig) -> Self {
        Self {
            config: RwLock::new(Some(config)),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<Option<AgentConfig>> {
        Ok(self.config.read().await.clone())
    }

    async fn save(&self, config: &AgentConfig) -> Result<()> {
        config.validate()?;
        *self.config.write().await = Some(config.clone());
        Ok(())
    }
}
