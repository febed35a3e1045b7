// # Speed Measurer Trait
//
// Defines the interface for one throughput/latency measurement.
//
// ## Implementations
//
// - Ookla `speedtest` CLI subprocess: `netpulse-speedtest` crate

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One measurement, flattened
///
/// Every field is optional: the measurement tool may omit any of them.
/// Bandwidths are in bytes per second, elapsed times in milliseconds,
/// latencies in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub timestamp: Option<String>,

    pub ping_jitter: Option<f64>,
    pub ping_latency: Option<f64>,
    pub ping_low: Option<f64>,
    pub ping_high: Option<f64>,

    pub download_bandwidth: Option<i64>,
    pub download_bytes: Option<i64>,
    pub download_elapsed: Option<i64>,
    pub download_latency_iqm: Option<f64>,
    pub download_latency_low: Option<f64>,
    pub download_latency_high: Option<f64>,

    pub upload_bandwidth: Option<i64>,
    pub upload_bytes: Option<i64>,
    pub upload_elapsed: Option<i64>,
    pub upload_latency_iqm: Option<f64>,
    pub upload_latency_low: Option<f64>,
    pub upload_latency_high: Option<f64>,

    pub packet_loss: Option<f64>,

    pub server_id: Option<i64>,
    pub server_name: Option<String>,
    pub server_location: Option<String>,
    pub server_country: Option<String>,
    pub server_host: Option<String>,

    pub result_id: Option<String>,
    pub result_url: Option<String>,

    /// ISP as reported by the measurement tool itself
    pub isp: Option<String>,
    pub external_ip: Option<String>,
    pub internal_ip: Option<String>,
}

impl MeasurementRecord {
    /// Download throughput in megabits per second
    pub fn download_mbps(&self) -> Option<f64> {
        bandwidth_to_mbps(self.download_bandwidth)
    }

    /// Upload throughput in megabits per second
    pub fn upload_mbps(&self) -> Option<f64> {
        bandwidth_to_mbps(self.upload_bandwidth)
    }
}

/// Convert bytes per second to megabits per second
///
/// A reported zero is a real (if grim) measurement and converts to `0.0`;
/// only a missing bandwidth yields `None`.
pub fn bandwidth_to_mbps(bytes_per_sec: Option<i64>) -> Option<f64> {
    bytes_per_sec.map(|bw| (bw as f64 * 8.0) / 1_000_000.0)
}

/// Trait for speed measurement implementations
///
/// # Trust Level: Semi-Trusted
///
/// - ✅ Spawn and await one bounded external process per call
/// - ✅ Return an error on timeout, non-zero exit or malformed output
/// - ❌ Write metrics (owned by `NetPulseMonitor`)
/// - ❌ Retry a failed measurement (the next cycle is the retry)
#[async_trait]
pub trait SpeedMeasurer: Send + Sync {
    /// Run one measurement
    ///
    /// # Returns
    ///
    /// - `Ok(MeasurementRecord)`: The parsed measurement
    /// - `Err(Error)`: Timeout, non-zero exit, spawn failure or invalid output
    async fn measure(&self) -> Result<MeasurementRecord, crate::Error>;

    /// Get the measurer name (for logging/debugging)
    fn measurer_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mbps_conversion() {
        let record = MeasurementRecord {
            download_bandwidth: Some(12_500_000),
            upload_bandwidth: Some(1_250_000),
            ..Default::default()
        };

        assert_eq!(record.download_mbps(), Some(100.0));
        assert_eq!(record.upload_mbps(), Some(10.0));
    }

    #[test]
    fn test_missing_bandwidth_has_no_mbps() {
        assert_eq!(MeasurementRecord::default().download_mbps(), None);
    }

    #[test]
    fn test_zero_bandwidth_is_a_measurement() {
        assert_eq!(bandwidth_to_mbps(Some(0)), Some(0.0));
    }
}
