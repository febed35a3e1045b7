// # Metrics Writer Trait
//
// Defines the interface for persisting metric points to a time-series backend.
//
// ## Implementations
//
// - InfluxDB 1.x (username/password/database) and 2.x (token/org/bucket):
//   `netpulse-influx` crate, behind the closed `InfluxWriter` enum
//
// ## Lifecycle
//
// ```rust,ignore
// writer.health().await?;   // polled at startup until ready
// writer.prepare().await?;  // one-time backend setup (e.g. create database)
// writer.write(&point).await?;
// writer.close().await?;    // release the HTTP session
// ```

use async_trait::async_trait;

use crate::point::MetricPoint;

/// Trait for metrics writer implementations
///
/// Callers never learn which protocol variant is active: construction is the
/// only point of divergence.
///
/// # Trust Level: Untrusted
///
/// - ✅ Perform HTTP calls to the configured backend only
/// - ✅ Drop `None` tags and fields before transmission
/// - ❌ Mutate the caller's point (it is borrowed immutably)
/// - ❌ Retry failed writes (a failed write is logged and the cycle moves on)
/// - ❌ Log credentials
#[async_trait]
pub trait MetricsWriter: Send + Sync {
    /// Write one point
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The backend accepted the point
    /// - `Err(Error)`: Transport error, rejected point, or writer closed
    async fn write(&self, point: &MetricPoint) -> Result<(), crate::Error>;

    /// Query the backend's health endpoint
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The backend is ready to accept writes
    /// - `Err(Error)`: Not (yet) reachable or not healthy
    async fn health(&self) -> Result<(), crate::Error>;

    /// One-time backend setup after the backend is reachable
    async fn prepare(&self) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Release the network session
    ///
    /// Writes after `close` fail. Closing twice is a no-op.
    async fn close(&self) -> Result<(), crate::Error>;

    /// Get the protocol name (for logging/debugging)
    fn protocol_name(&self) -> &'static str;
}
