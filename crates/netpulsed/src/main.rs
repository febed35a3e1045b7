// # netpulsed - NetPulse Daemon
//
// Thin integration layer: it reads the environment once, builds a
// `MonitorConfig`, wires the concrete collaborators into a
// `NetPulseMonitor` and drives it. All cycle logic lives in netpulse-core.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables and CLI flags
// 2. Initializing logging and the runtime
// 3. Waiting for the storage backend before the first cycle
// 4. Running one cycle (`--once`) or cycles until SIGTERM/SIGINT
// 5. Closing the storage session on every exit path
//
// ## Configuration
//
// ### Storage
// - `INFLUXDB_URL`: Backend base URL (default `http://localhost:8086`)
// - `INFLUXDB_VERSION`: `1` or `2`. When unset, a token selects v2 and a
//   username/password selects v1
// - `INFLUXDB_TOKEN`, `INFLUXDB_ORG`, `INFLUXDB_BUCKET`: v2 credentials
// - `INFLUXDB_USERNAME`, `INFLUXDB_PASSWORD`, `INFLUXDB_DATABASE`: v1 credentials
//
// ### Measurement
// - `SPEEDTEST_INTERVAL`: Seconds between cycles (default 1800)
// - `SPEEDTEST_BINARY`: Measurement binary (default `speedtest`)
//
// ### State Store
// - `NETPULSE_STATE_STORE_TYPE`: `file` or `memory` (default `file`)
// - `NETPULSE_STATE_FILE`: Path to the state file
//
// ### Geolocation
// - `NETPULSE_GEO_PRIMARY_URL`: ipinfo.io-shaped endpoint
// - `NETPULSE_GEO_FALLBACK_URL`: ip-api.com-shaped endpoint, `none` disables it
//
// ### Logging
// - `NETPULSE_LOG_LEVEL`: trace, debug, info, warn or error (default info)
//
// ## Example
//
// ```bash
// export INFLUXDB_URL=http://influxdb:8086
// export INFLUXDB_TOKEN=your_token
// export NETPULSE_STATE_FILE=/var/lib/netpulse/state.json
//
// netpulsed --interval 900
// ```

use anyhow::Result;
use clap::Parser;
use netpulse_core::config::{DEFAULT_DATABASE, DEFAULT_ORG, DEFAULT_STORAGE_URL};
use netpulse_core::state::build_state_store;
use netpulse_core::{
    ChangeDetector, MonitorConfig, MonitorEvent, NetPulseMonitor, SpeedMeasurer, StateStoreConfig,
    StorageConfig,
};
use netpulse_influx::InfluxWriter;
use netpulse_speedtest::OoklaSpeedtest;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown, or `--once` completed
/// - 1: Configuration or startup error (including storage never ready)
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NetPulseExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<NetPulseExitCode> for ExitCode {
    fn from(code: NetPulseExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Network speed and ISP-change monitor
#[derive(Parser, Debug)]
#[command(name = "netpulsed", version, about, long_about = None)]
struct Cli {
    /// Run a single cycle and exit
    #[arg(short = '1', long)]
    once: bool,

    /// Seconds between cycles (overrides SPEEDTEST_INTERVAL)
    #[arg(short, long, value_name = "SECS")]
    interval: Option<u64>,
}

/// Application configuration
#[derive(Debug)]
struct Config {
    monitor: MonitorConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Blank values count as unset.
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut monitor = MonitorConfig::new(storage_from_lookup(&var)?);

        if let Some(interval) = parse_var(&var, "SPEEDTEST_INTERVAL")? {
            monitor.schedule.interval_secs = interval;
        }
        if let Some(binary) = var("SPEEDTEST_BINARY") {
            monitor.speedtest.binary = binary;
        }

        monitor.state_store = match var("NETPULSE_STATE_STORE_TYPE").as_deref() {
            None | Some("file") => match var("NETPULSE_STATE_FILE") {
                Some(path) => StateStoreConfig::File { path },
                None => StateStoreConfig::default(),
            },
            Some("memory") => StateStoreConfig::Memory,
            Some(other) => anyhow::bail!(
                "NETPULSE_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                other
            ),
        };

        if let Some(url) = var("NETPULSE_GEO_PRIMARY_URL") {
            monitor.geo.primary_url = url;
        }
        match var("NETPULSE_GEO_FALLBACK_URL") {
            Some(url) if url.eq_ignore_ascii_case("none") => monitor.geo.fallback_url = None,
            Some(url) => monitor.geo.fallback_url = Some(url),
            None => {}
        }

        Ok(Self {
            monitor,
            log_level: var("NETPULSE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Missing credentials for the selected storage protocol are fatal.
    fn validate(&self) -> Result<()> {
        self.monitor.validate()?;
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
                "NETPULSE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

/// Select and build the storage protocol variant
fn storage_from_lookup<F>(var: &F) -> Result<StorageConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let url = var("INFLUXDB_URL").unwrap_or_else(|| DEFAULT_STORAGE_URL.to_string());
    let has_token = var("INFLUXDB_TOKEN").is_some();
    let has_login = var("INFLUXDB_USERNAME").is_some() || var("INFLUXDB_PASSWORD").is_some();

    let v1 = match var("INFLUXDB_VERSION").as_deref() {
        Some("1") | Some("v1") => true,
        Some("2") | Some("v2") => false,
        Some(other) => anyhow::bail!(
            "INFLUXDB_VERSION '{}' is not supported. Supported versions: 1, 2",
            other
        ),
        None => !has_token && has_login,
    };

    let storage = if v1 {
        StorageConfig::V1 {
            url,
            username: var("INFLUXDB_USERNAME").unwrap_or_default(),
            password: var("INFLUXDB_PASSWORD").unwrap_or_default(),
            database: var("INFLUXDB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
        }
    } else {
        StorageConfig::V2 {
            url,
            token: var("INFLUXDB_TOKEN").unwrap_or_default(),
            org: var("INFLUXDB_ORG").unwrap_or_else(|| DEFAULT_ORG.to_string()),
            bucket: var("INFLUXDB_BUCKET").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
        }
    };

    Ok(storage)
}

fn parse_var<F, T>(var: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} '{}' is not valid: {}", key, raw, e))
        })
        .transpose()
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration from environment
    let mut config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return NetPulseExitCode::ConfigError.into();
        }
    };

    if let Some(interval) = cli.interval {
        config.monitor.schedule.interval_secs = interval;
    }

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return NetPulseExitCode::ConfigError.into();
    }

    let log_level = config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return NetPulseExitCode::ConfigError.into();
    }

    info!("Starting netpulsed");
    info!(
        "Storage: {} at {} (target: {})",
        config.monitor.storage.protocol_name(),
        config.monitor.storage.url(),
        config.monitor.storage.target()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return NetPulseExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config, cli.once, wait_for_shutdown()))
        .into()
}

/// Build the monitor from configuration
async fn build_monitor(
    config: &MonitorConfig,
) -> Result<(NetPulseMonitor, mpsc::Receiver<MonitorEvent>)> {
    let locator = netpulse_geo_http::build_locator(&config.geo);
    let detector = ChangeDetector::new(build_state_store(&config.state_store).await);
    let measurer = OoklaSpeedtest::new(&config.speedtest);
    let writer = InfluxWriter::from_config(&config.storage)?;

    info!(
        "State store: {}, measurer: {}",
        detector.store_name(),
        measurer.measurer_name()
    );

    let monitor = NetPulseMonitor::new(
        locator,
        detector,
        Box::new(measurer),
        Box::new(writer),
        &config.schedule,
    )?;

    Ok(monitor)
}

/// Run the daemon
async fn run_daemon<S>(config: Config, once: bool, shutdown: S) -> NetPulseExitCode
where
    S: Future<Output = Result<&'static str>>,
{
    let (monitor, events) = match build_monitor(&config.monitor).await {
        Ok(built) => built,
        Err(e) => {
            error!("Failed to build monitor: {}", e);
            return NetPulseExitCode::ConfigError;
        }
    };

    let event_logger = tokio::spawn(log_events(events));

    let code = drive(&monitor, once, shutdown).await;

    // The writer is closed on every path once it exists
    if let Err(e) = monitor.close().await {
        warn!("Failed to close storage writer: {}", e);
    }

    // Dropping the monitor closes the event channel
    drop(monitor);
    if let Err(e) = event_logger.await {
        warn!("Event logger task failed: {}", e);
    }

    info!("netpulsed exiting with {:?}", code);
    code
}

/// Drive the monitor until it finishes or `shutdown` resolves
///
/// The shutdown future is polled from the start of the readiness wait, so a
/// signal during the wait or the single `--once` cycle still ends in an
/// orderly exit.
async fn drive<S>(monitor: &NetPulseMonitor, once: bool, shutdown: S) -> NetPulseExitCode
where
    S: Future<Output = Result<&'static str>>,
{
    tokio::pin!(shutdown);

    tokio::select! {
        ready = monitor.ensure_storage_ready() => {
            if let Err(e) = ready {
                error!("Storage backend unavailable: {}", e);
                return NetPulseExitCode::ConfigError;
            }
        }
        signal = &mut shutdown => {
            return interrupted(signal, "waiting for storage");
        }
    }

    if once {
        tokio::select! {
            report = monitor.run_cycle() => {
                info!(
                    "Single cycle finished (clean: {}, written: {:?}, failed: {:?})",
                    report.is_clean(),
                    report.points_written,
                    report.write_failures
                );
            }
            signal = &mut shutdown => {
                return interrupted(signal, "running the single cycle");
            }
        }
        // Degraded cycles still exit cleanly
        return NetPulseExitCode::CleanShutdown;
    }

    info!("Running a cycle every {}s", monitor.interval().as_secs());

    let mut signal_error = None;
    let result = monitor
        .run_until(async {
            match (&mut shutdown).await {
                Ok(signal) => info!("Received shutdown signal: {}", signal),
                Err(e) => signal_error = Some(e),
            }
        })
        .await;

    if let Some(e) = signal_error {
        error!("Shutdown error: {}", e);
        return NetPulseExitCode::RuntimeError;
    }

    match result {
        Ok(()) => NetPulseExitCode::CleanShutdown,
        Err(e) => {
            error!("Monitor error: {}", e);
            NetPulseExitCode::RuntimeError
        }
    }
}

fn interrupted(signal: Result<&'static str>, stage: &str) -> NetPulseExitCode {
    match signal {
        Ok(signal) => {
            info!("Received shutdown signal while {}: {}", stage, signal);
            NetPulseExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Shutdown error: {}", e);
            NetPulseExitCode::RuntimeError
        }
    }
}

async fn log_events(mut events: mpsc::Receiver<MonitorEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            MonitorEvent::IspChanged {
                previous_isp,
                current_isp,
                ..
            } => info!(
                "ISP changed: {} -> {}",
                previous_isp.as_deref().unwrap_or("unknown"),
                current_isp.as_deref().unwrap_or("unknown")
            ),
            MonitorEvent::WriteFailed { measurement, error } => {
                warn!("Failed to write {} point: {}", measurement, error)
            }
            other => debug!("Monitor event: {:?}", other),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received, or an error if the handlers
/// could not be installed.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_token_selects_v2() {
        let config = load(&[("INFLUXDB_TOKEN", "abc")]).unwrap();

        assert!(config.validate().is_ok());
        match &config.monitor.storage {
            StorageConfig::V2 {
                url, org, bucket, ..
            } => {
                assert_eq!(url, DEFAULT_STORAGE_URL);
                assert_eq!(org, "netpulse");
                assert_eq!(bucket, "netpulse");
            }
            other => panic!("expected v2, got {:?}", other),
        }
    }

    #[test]
    fn test_login_selects_v1() {
        let config = load(&[
            ("INFLUXDB_URL", "http://influx:8086"),
            ("INFLUXDB_USERNAME", "admin"),
            ("INFLUXDB_PASSWORD", "pw"),
        ])
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.monitor.storage.protocol_name(), "v1");
        assert_eq!(config.monitor.storage.target(), "netpulse");
    }

    #[test]
    fn test_explicit_version_wins() {
        let config = load(&[
            ("INFLUXDB_VERSION", "1"),
            ("INFLUXDB_TOKEN", "abc"),
            ("INFLUXDB_USERNAME", "admin"),
            ("INFLUXDB_PASSWORD", "pw"),
            ("INFLUXDB_DATABASE", "speed"),
        ])
        .unwrap();

        assert_eq!(config.monitor.storage.protocol_name(), "v1");
        assert_eq!(config.monitor.storage.target(), "speed");
    }

    #[test]
    fn test_missing_credentials_are_fatal() {
        assert!(load(&[]).unwrap().validate().is_err());
        assert!(
            load(&[("INFLUXDB_VERSION", "1"), ("INFLUXDB_USERNAME", "admin")])
                .unwrap()
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_unknown_version_rejected() {
        assert!(load(&[("INFLUXDB_VERSION", "3")]).is_err());
    }

    #[test]
    fn test_interval_and_paths() {
        let config = load(&[
            ("INFLUXDB_TOKEN", "abc"),
            ("SPEEDTEST_INTERVAL", "600"),
            ("SPEEDTEST_BINARY", "/usr/local/bin/speedtest"),
            ("NETPULSE_STATE_FILE", "/var/lib/netpulse/state.json"),
            ("NETPULSE_GEO_FALLBACK_URL", "none"),
        ])
        .unwrap();

        assert_eq!(config.monitor.schedule.interval_secs, 600);
        assert_eq!(config.monitor.speedtest.binary, "/usr/local/bin/speedtest");
        assert!(matches!(
            &config.monitor.state_store,
            StateStoreConfig::File { path } if path == "/var/lib/netpulse/state.json"
        ));
        assert_eq!(config.monitor.geo.fallback_url, None);
    }

    #[test]
    fn test_invalid_interval_rejected() {
        assert!(load(&[("INFLUXDB_TOKEN", "abc"), ("SPEEDTEST_INTERVAL", "soon")]).is_err());
    }

    #[test]
    fn test_memory_state_store() {
        let config = load(&[
            ("INFLUXDB_TOKEN", "abc"),
            ("NETPULSE_STATE_STORE_TYPE", "memory"),
        ])
        .unwrap();

        assert!(matches!(config.monitor.state_store, StateStoreConfig::Memory));
        assert!(load(&[("NETPULSE_STATE_STORE_TYPE", "redis")]).is_err());
    }

    #[test]
    fn test_log_level_validation() {
        let bad = load(&[("INFLUXDB_TOKEN", "abc"), ("NETPULSE_LOG_LEVEL", "loud")]).unwrap();
        assert!(bad.validate().is_err());

        let good = load(&[("INFLUXDB_TOKEN", "abc"), ("NETPULSE_LOG_LEVEL", "DEBUG")]).unwrap();
        assert_eq!(good.level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from(["netpulsed", "-1", "--interval", "60"]).unwrap();
        assert!(cli.once);
        assert_eq!(cli.interval, Some(60));

        let cli = Cli::try_parse_from(["netpulsed"]).unwrap();
        assert!(!cli.once);
        assert_eq!(cli.interval, None);
    }

    fn unreachable_storage() -> Config {
        let mut config = load(&[
            ("INFLUXDB_URL", "http://127.0.0.1:9"),
            ("INFLUXDB_TOKEN", "abc"),
            ("NETPULSE_STATE_STORE_TYPE", "memory"),
        ])
        .unwrap();
        config.monitor.schedule.readiness_retries = 1000;
        config.monitor.schedule.readiness_interval_secs = 1;
        config
    }

    async fn signal_after(delay: Duration) -> Result<&'static str> {
        tokio::time::sleep(delay).await;
        Ok("SIGTERM")
    }

    #[tokio::test]
    async fn test_signal_during_storage_wait_exits_cleanly() {
        for once in [false, true] {
            let started = std::time::Instant::now();
            let code = run_daemon(
                unreachable_storage(),
                once,
                signal_after(Duration::from_millis(200)),
            )
            .await;

            assert_eq!(code, NetPulseExitCode::CleanShutdown);
            assert!(started.elapsed() < Duration::from_secs(10));
        }
    }

    #[tokio::test]
    async fn test_failed_signal_setup_during_storage_wait_is_runtime_error() {
        let code = run_daemon(unreachable_storage(), false, async {
            Err(anyhow::anyhow!("Failed to setup SIGTERM handler"))
        })
        .await;

        assert_eq!(code, NetPulseExitCode::RuntimeError);
    }
}
