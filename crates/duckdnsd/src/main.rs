// # duckdnsd - DuckDNS Agent Daemon
//
// Thin integration layer over duckdns-core. The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing tracing and the runtime
// 3. Wiring the probe, resolver quorum, and update client into the engine
// 4. Running the scheduler and the operator commands
//
// All update logic lives in duckdns-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `DUCKDNS_PASSPHRASE`: Passphrase the token-wrapping key is derived from (required)
// - `DUCKDNS_CONFIG_PATH`: Path to the durable config store (default: ./duckdns-config.json)
// - `DUCKDNS_LOG_PATH`: Path to the audit log (default: ./duckdns-audit.log)
// - `DUCKDNS_DOMAINS`: Comma-separated labels; with DUCKDNS_TOKEN, seeds the config store
// - `DUCKDNS_TOKEN`: Plaintext update token; wrapped before it is persisted
// - `DUCKDNS_IP`: Optional fixed IPv4
// - `DUCKDNS_INTERVAL_MINUTES`: Tick interval in minutes (default: 15)
// - `DUCKDNS_LOG_LEVEL`: trace | debug | info | warn | error (default: info)
//
// ## Commands
//
// ```bash
// duckdnsd            # run the scheduled loop (default)
// duckdnsd run        # same
// duckdnsd once       # one immediate tick, then exit
// duckdnsd tail       # print the last 100 audit lines
// duckdnsd clear-log  # truncate the audit log
// ```

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use duckdns_client::DuckDnsClient;
use duckdns_core::audit::TAIL_WINDOW;
use duckdns_core::{
    AgentConfig, AuditLog, ConfigStore, FileConfigStore, PassphraseKeyProvider, Scheduler,
    TickEngine, TokenVault,
};
use duckdns_ip_http::IdentMeProbe;
use duckdns_resolver_doh::DohQuorum;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum AgentExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<AgentExitCode> for ExitCode {
    fn from(code: AgentExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Operator command selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliCommand {
    /// Scheduled loop (default)
    Run,
    /// One immediate tick
    Once,
    /// Print the audit tail
    Tail,
    /// Truncate the audit log
    ClearLog,
}

impl CliCommand {
    fn parse(args: &[String]) -> Result<Self> {
        match args.first().map(String::as_str) {
            None | Some("run") => Ok(Self::Run),
            Some("once") => Ok(Self::Once),
            Some("tail") => Ok(Self::Tail),
            Some("clear-log") => Ok(Self::ClearLog),
            Some(other) => anyhow::bail!(
                "unknown command '{}'. Commands: run, once, tail, clear-log",
                other
            ),
        }
    }
}

/// Daemon configuration from environment variables
struct DaemonConfig {
    passphrase: String,
    config_path: String,
    log_path: String,
    seed_domains: Vec<String>,
    seed_token: Option<String>,
    seed_ip: Option<String>,
    interval_minutes: u64,
    log_level: String,
}

impl DaemonConfig {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            passphrase: env::var("DUCKDNS_PASSPHRASE").unwrap_or_default(),
            config_path: env::var("DUCKDNS_CONFIG_PATH")
                .unwrap_or_else(|_| "duckdns-config.json".to_string()),
            log_path: env::var("DUCKDNS_LOG_PATH")
                .unwrap_or_else(|_| "duckdns-audit.log".to_string()),
            seed_domains: env::var("DUCKDNS_DOMAINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            seed_token: env::var("DUCKDNS_TOKEN").ok().filter(|t| !t.is_empty()),
            seed_ip: env::var("DUCKDNS_IP").ok().filter(|ip| !ip.is_empty()),
            interval_minutes: env::var("DUCKDNS_INTERVAL_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(15),
            log_level: env::var("DUCKDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.passphrase.is_empty() {
            anyhow::bail!(
                "DUCKDNS_PASSPHRASE is required. \
                Set it via: export DUCKDNS_PASSPHRASE=your_passphrase"
            );
        }

        if self.config_path.is_empty() {
            anyhow::bail!("DUCKDNS_CONFIG_PATH cannot be empty");
        }

        if self.log_path.is_empty() {
            anyhow::bail!("DUCKDNS_LOG_PATH cannot be empty");
        }

        if self.seed_token.is_some() && self.seed_domains.is_empty() {
            anyhow::bail!("DUCKDNS_TOKEN is set but DUCKDNS_DOMAINS is empty");
        }

        if let Some(ref ip) = self.seed_ip
            && ip.parse::<std::net::Ipv4Addr>().is_err()
        {
            anyhow::bail!("DUCKDNS_IP is not an IPv4 literal: {}", ip);
        }

        if self.interval_minutes == 0 {
            anyhow::bail!("DUCKDNS_INTERVAL_MINUTES must be ≥ 1");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DUCKDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match CliCommand::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            return AgentExitCode::ConfigError.into();
        }
    };

    let config = match DaemonConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return AgentExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return AgentExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return AgentExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return AgentExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_command(command, config).await {
            error!("Daemon error: {}", e);
            AgentExitCode::RuntimeError
        } else {
            AgentExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Build the engine from daemon configuration
///
/// Seeds the config store when the environment carries domains and a
/// plaintext token; the token is wrapped before it is persisted.
async fn build_engine(config: &DaemonConfig) -> Result<Arc<TickEngine>> {
    let vault = TokenVault::new(&PassphraseKeyProvider::new(&config.passphrase));
    let config_store = FileConfigStore::new(&config.config_path);
    let audit = Arc::new(AuditLog::new(&config.log_path));

    if let Some(ref token) = config.seed_token {
        let wrapped = vault.wrap(token)?;
        let seed = AgentConfig::new(
            config.seed_domains.clone(),
            wrapped,
            config.seed_ip.as_deref().and_then(|ip| ip.parse().ok()),
            config.interval_minutes,
        );
        config_store.save(&seed).await?;
        info!(
            "seeded config store with {} domain(s)",
            seed.domains.len()
        );
    }

    Ok(Arc::new(TickEngine::new(
        Box::new(config_store),
        Box::new(IdentMeProbe::new()),
        Box::new(DohQuorum::new()),
        Box::new(DuckDnsClient::new()),
        vault,
        audit,
    )))
}

/// Dispatch the selected operator command
async fn run_command(command: CliCommand, config: DaemonConfig) -> Result<()> {
    match command {
        CliCommand::Run => run_daemon(config).await,
        CliCommand::Once => {
            let engine = build_engine(&config).await?;
            let report = engine.run_tick().await;
            info!("tick finished: {:?}", report.outcome);
            Ok(())
        }
        CliCommand::Tail => {
            let audit = AuditLog::new(&config.log_path);
            for line in audit.tail(TAIL_WINDOW).await? {
                println!("{}", line);
            }
            Ok(())
        }
        CliCommand::ClearLog => {
            let audit = AuditLog::new(&config.log_path);
            audit.clear().await?;
            info!("audit log cleared");
            Ok(())
        }
    }
}

/// Run the scheduled loop until a shutdown signal arrives
async fn run_daemon(config: DaemonConfig) -> Result<()> {
    info!("Starting duckdnsd daemon");

    let interval_minutes = config.interval_minutes;
    let engine = build_engine(&config).await?;
    let (scheduler, handle) = Scheduler::new(engine);

    let scheduler_task = tokio::spawn(scheduler.run(interval_minutes));

    let signal_name = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal_name);

    // Cancel the next arming; an in-flight tick runs to completion.
    handle.stop().await;
    scheduler_task
        .await
        .map_err(|e| anyhow::anyhow!("scheduler task failed: {}", e))?;

    info!("Shutting down daemon");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for shutdown signals (CTRL-C only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
