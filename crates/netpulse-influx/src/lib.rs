// # InfluxDB Metrics Writers
//
// This crate provides the metrics writers for the two InfluxDB HTTP APIs.
//
// ## Variants
//
// - `WriterV1`: InfluxDB 1.x (username/password/database)
// - `WriterV2`: InfluxDB 2.x (token/org/bucket)
//
// The set is closed. `InfluxWriter::from_config` is the only place where the
// variant is chosen; everything downstream sees a `MetricsWriter`.
//
// ### Trust Level: Untrusted (Metrics Writer)
//
// - ✅ Perform HTTP calls to the configured backend only
// - ✅ One request per write
// - ❌ Retry failed writes (a failed write is logged by the monitor)
// - ❌ Spawn tasks or threads
//
// ## Security Requirements
//
// - Tokens and passwords NEVER appear in logs or `Debug` output
// - Missing credentials for the selected variant fail construction

pub mod line_protocol;
mod session;
mod v1;
mod v2;

pub use v1::WriterV1;
pub use v2::WriterV2;

use async_trait::async_trait;
use netpulse_core::config::StorageConfig;
use netpulse_core::point::MetricPoint;
use netpulse_core::traits::MetricsWriter;
use netpulse_core::Result;

/// The storage writer selected at startup
#[derive(Debug)]
pub enum InfluxWriter {
    V1(WriterV1),
    V2(WriterV2),
}

impl InfluxWriter {
    /// Build the writer for a storage configuration
    ///
    /// # Returns
    ///
    /// - `Ok(InfluxWriter)`: Writer for the configured variant
    /// - `Err(Error)`: Invalid configuration or missing credentials
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        config.validate()?;

        let writer = match config {
            StorageConfig::V1 {
                url,
                username,
                password,
                database,
            } => InfluxWriter::V1(WriterV1::new(
                url.as_str(),
                username.as_str(),
                password.as_str(),
                database.as_str(),
            )?),
            StorageConfig::V2 {
                url,
                token,
                org,
                bucket,
            } => InfluxWriter::V2(WriterV2::new(
                url.as_str(),
                token.as_str(),
                org.as_str(),
                bucket.as_str(),
            )?),
        };

        tracing::info!(
            "Storage writer: InfluxDB {} at {} (target: {})",
            writer.protocol_name(),
            config.url(),
            config.target()
        );

        Ok(writer)
    }

    fn inner(&self) -> &dyn MetricsWriter {
        match self {
            InfluxWriter::V1(w) => w,
            InfluxWriter::V2(w) => w,
        }
    }
}

#[async_trait]
impl MetricsWriter for InfluxWriter {
    async fn write(&self, point: &MetricPoint) -> Result<()> {
        self.inner().write(point).await
    }

    async fn health(&self) -> Result<()> {
        self.inner().health().await
    }

    async fn prepare(&self) -> Result<()> {
        self.inner().prepare().await
    }

    async fn close(&self) -> Result<()> {
        self.inner().close().await
    }

    fn protocol_name(&self) -> &'static str {
        self.inner().protocol_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_selects_variant() {
        let v1 = InfluxWriter::from_config(&StorageConfig::V1 {
            url: "http://localhost:8086".to_string(),
            username: "admin".to_string(),
            password: "pw".to_string(),
            database: "netpulse".to_string(),
        })
        .unwrap();
        assert!(matches!(v1, InfluxWriter::V1(_)));
        assert_eq!(v1.protocol_name(), "v1");

        let v2 = InfluxWriter::from_config(&StorageConfig::V2 {
            url: "http://localhost:8086".to_string(),
            token: "t".to_string(),
            org: "netpulse".to_string(),
            bucket: "netpulse".to_string(),
        })
        .unwrap();
        assert!(matches!(v2, InfluxWriter::V2(_)));
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let result = InfluxWriter::from_config(&StorageConfig::V2 {
            url: "http://localhost:8086".to_string(),
            token: String::new(),
            org: "netpulse".to_string(),
            bucket: "netpulse".to_string(),
        });
        assert!(result.is_err());
    }
}
