// # Ookla Speedtest Measurer
//
// This crate runs the Ookla `speedtest` CLI as a subprocess and parses its
// JSON report into a `MeasurementRecord`.
//
// ## Subprocess Contract
//
// ```text
// speedtest --accept-license --accept-gdpr                  (once, 30 s)
// speedtest --format=json --accept-license --accept-gdpr    (per cycle, 120 s)
// ```
//
// - Non-zero exit, timeout, spawn failure or invalid JSON is a failed
//   measurement
// - The child is killed when its future is dropped (timeout or shutdown)
// - The license handshake is best effort: its failure is logged only

mod report;

pub use report::parse_report;

use async_trait::async_trait;
use netpulse_core::config::SpeedtestConfig;
use netpulse_core::traits::{MeasurementRecord, SpeedMeasurer};
use netpulse_core::{Error, Result};
use std::process::{Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;

const CONSENT_ARGS: [&str; 2] = ["--accept-license", "--accept-gdpr"];

/// Ookla speedtest CLI measurer
///
/// # Trust Level: Semi-Trusted
///
/// - ✅ Spawn one bounded subprocess per measurement
/// - ❌ Leave the subprocess running after timeout or cancellation
#[derive(Debug)]
pub struct OoklaSpeedtest {
    binary: String,
    timeout: Duration,
    license_timeout: Duration,
    license_attempted: AtomicBool,
}

impl OoklaSpeedtest {
    /// Create a measurer from configuration
    pub fn new(config: &SpeedtestConfig) -> Self {
        Self::with_timeouts(
            &config.binary,
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.license_timeout_secs),
        )
    }

    /// Create a measurer with explicit timeouts
    pub fn with_timeouts(
        binary: impl Into<String>,
        timeout: Duration,
        license_timeout: Duration,
    ) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            license_timeout,
            license_attempted: AtomicBool::new(false),
        }
    }

    /// Run the license/consent handshake once per process
    async fn accept_license(&self) {
        if self.license_attempted.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::debug!("Accepting speedtest license");
        match self.run(&CONSENT_ARGS, self.license_timeout).await {
            Ok(output) if output.status.success() => {
                tracing::info!("Speedtest license accepted");
            }
            Ok(output) => {
                tracing::warn!(
                    "Speedtest license handshake exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Err(e) => {
                tracing::warn!("Speedtest license handshake failed: {}", e);
            }
        }
    }

    /// Spawn the binary and collect its output within `timeout`
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<Output> {
        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::measurement(format!("failed to spawn {}: {}", self.binary, e))
            })?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output.map_err(|e| {
                Error::measurement(format!("failed to read {} output: {}", self.binary, e))
            }),
            // The child future was dropped, which kills the process
            Err(_) => Err(Error::timeout(format!(
                "{} did not finish within {}s",
                self.binary,
                timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl SpeedMeasurer for OoklaSpeedtest {
    async fn measure(&self) -> Result<MeasurementRecord> {
        self.accept_license().await;

        tracing::info!("Starting speedtest");
        let mut args = vec!["--format=json"];
        args.extend(CONSENT_ARGS);

        let output = self.run(&args, self.timeout).await?;

        if !output.status.success() {
            return Err(Error::measurement(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_report(&output.stdout)
    }

    fn measurer_name(&self) -> &'static str {
        "ookla"
    }
}
