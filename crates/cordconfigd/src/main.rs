// # cordconfigd - CORD Config Daemon
//
// Thin integration layer: all synchronization logic lives in cordconfig-core.
//
// The cordconfigd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Loading the network config document into an in-memory registry
// 4. Running the CORD config manager and logging every event it publishes
// 5. Reloading the document on SIGHUP
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `CORDCONFIG_NETCFG_PATH`: Network config document to serve (required)
// - `CORDCONFIG_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
// - `CORDCONFIG_DEACTIVATION`: retain, clear_and_notify (default: retain)
//
// ## Example
//
// ```bash
// export CORDCONFIG_NETCFG_PATH=/etc/cord/netcfg.json
// export CORDCONFIG_LOG_LEVEL=debug
//
// cordconfigd
// # edit /etc/cord/netcfg.json, then
// kill -HUP $(pidof cordconfigd)
// ```

use anyhow::{Context, Result};
use cordconfig_core::{
    ChannelListener, CordConfigManager, CordConfigService, DeactivationPolicy, EventStream,
    ManagerConfig, MemoryConfigRegistry, NetworkConfigDocument,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long to wait for the event logger to drain on shutdown
const EVENT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum CordConfigExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<CordConfigExitCode> for ExitCode {
    fn from(code: CordConfigExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    netcfg_path: PathBuf,
    log_level: String,
    deactivation: DeactivationPolicy,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let netcfg_path = env::var("CORDCONFIG_NETCFG_PATH").context(
            "CORDCONFIG_NETCFG_PATH is required. \
            Set it via: export CORDCONFIG_NETCFG_PATH=/etc/cord/netcfg.json",
        )?;

        let deactivation = match env::var("CORDCONFIG_DEACTIVATION") {
            Ok(value) => value.parse()?,
            Err(_) => DeactivationPolicy::default(),
        };

        Ok(Self {
            netcfg_path: PathBuf::from(netcfg_path),
            log_level: env::var("CORDCONFIG_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            deactivation,
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.netcfg_path.as_os_str().is_empty() {
            anyhow::bail!("CORDCONFIG_NETCFG_PATH cannot be empty");
        }

        if !self.netcfg_path.is_file() {
            anyhow::bail!(
                "CORDCONFIG_NETCFG_PATH does not point to a file: {}",
                self.netcfg_path.display()
            );
        }

        self.level()?;
        Ok(())
    }

    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "CORDCONFIG_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return CordConfigExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return CordConfigExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CordConfigExitCode::ConfigError.into();
    }

    info!("Starting cordconfigd daemon");
    info!(
        "Serving {} (deactivation policy: {})",
        config.netcfg_path.display(),
        config.deactivation
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CordConfigExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => CordConfigExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup error: {:#}", e);
                CordConfigExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                CordConfigExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Failure of [`run_daemon`], split by the exit code it maps to
enum DaemonError {
    Startup(anyhow::Error),
    Runtime(anyhow::Error),
}

/// Run the daemon
async fn run_daemon(config: Config) -> std::result::Result<(), DaemonError> {
    let registry = Arc::new(MemoryConfigRegistry::new());

    let document = NetworkConfigDocument::load(&config.netcfg_path)
        .await
        .map_err(|e| DaemonError::Startup(e.into()))?;
    let applied = document.apply_to(&registry);
    info!("Loaded {} network config(s)", applied);

    let manager = CordConfigManager::new(
        registry.clone(),
        ManagerConfig::default().with_deactivation(config.deactivation),
    );

    // Subscribe before activating so reconciliation events are logged too
    let (listener, events) = ChannelListener::new();
    manager.add_listener(listener);
    let logger = tokio::spawn(log_events(events));

    manager
        .activate()
        .map_err(|e| DaemonError::Startup(e.into()))?;
    info!(
        "Tracking {} access device(s) and {} access agent(s)",
        manager.access_devices().len(),
        manager.access_agents().len()
    );

    let mut signals = Signals::new().map_err(DaemonError::Runtime)?;
    loop {
        match signals.next().await {
            DaemonSignal::Reload => reload(&config, &registry).await,
            DaemonSignal::Shutdown(name) => {
                info!("Received shutdown signal: {}", name);
                break;
            }
        }
    }

    info!("Shutting down daemon");
    manager
        .deactivate()
        .map_err(|e| DaemonError::Runtime(e.into()))?;

    // Dropping the manager drops the channel listener, which ends the stream
    drop(manager);
    match tokio::time::timeout(EVENT_DRAIN_TIMEOUT, logger).await {
        Ok(Ok(())) => debug!("Event logger drained"),
        Ok(Err(e)) => warn!("Event logger task failed: {}", e),
        Err(_) => warn!("Event logger did not drain within {:?}", EVENT_DRAIN_TIMEOUT),
    }

    Ok(())
}

/// Re-read the network config document and apply the difference
async fn reload(config: &Config, registry: &MemoryConfigRegistry) {
    info!("Reloading {}", config.netcfg_path.display());

    match NetworkConfigDocument::load(&config.netcfg_path).await {
        Ok(document) => {
            let summary = document.sync(registry);
            debug!("Reload summary: {:?}", summary);
        }
        Err(e) => warn!("Keeping current network config: {}", e),
    }
}

/// Log every event published by the manager
async fn log_events(mut events: EventStream) {
    while let Some(event) = events.next().await {
        info!("{}", event);
    }
    debug!("Event stream closed");
}

/// Signals the daemon reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaemonSignal {
    /// Re-read the network config document (SIGHUP)
    Reload,
    /// Stop the daemon
    Shutdown(&'static str),
}

/// Signal handlers, installed once for the daemon's lifetime
#[cfg(unix)]
struct Signals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
    sighup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn new() -> Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())
                .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?,
            sigint: signal(SignalKind::interrupt())
                .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?,
            sighup: signal(SignalKind::hangup())
                .map_err(|e| anyhow::anyhow!("Failed to setup SIGHUP handler: {}", e))?,
        })
    }

    async fn next(&mut self) -> DaemonSignal {
        tokio::select! {
            _ = self.sigterm.recv() => DaemonSignal::Shutdown("SIGTERM"),
            _ = self.sigint.recv() => DaemonSignal::Shutdown("SIGINT"),
            _ = self.sighup.recv() => DaemonSignal::Reload,
        }
    }
}

/// Signal handlers (CTRL-C only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn next(&mut self) -> DaemonSignal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
        }
        DaemonSignal::Shutdown("SIGINT")
    }
}
