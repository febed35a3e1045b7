// # Geolocation Provider Trait
//
// Defines the interface for external IP-geolocation services.
//
// ## Implementations
//
// - ipinfo.io and ip-api.com: `netpulse-geo-http` crate
//
// ## Usage
//
// ```rust,ignore
// use netpulse_core::{GeoLocator, GeoProvider};
//
// let locator = GeoLocator::new(primary, Some(fallback));
// let record = locator.locate().await; // never fails
// ```

use async_trait::async_trait;

use crate::geo::GeoRecord;

/// Trait for geolocation provider implementations
///
/// A provider performs one lookup per call and normalizes the response into
/// a [`GeoRecord`] (see [`GeoRecord::from_fields`]).
///
/// # Trust Level: Untrusted
///
/// Providers are external integrations:
/// - ✅ Perform one bounded HTTP request per call
/// - ✅ Return an error on transport, status or decoding failure
/// - ❌ Retry or fall back to another provider (owned by `GeoLocator`)
/// - ❌ Access the ISP state store (owned by `ChangeDetector`)
#[async_trait]
pub trait GeoProvider: Send + Sync {
    /// Look up the current public IP and ISP
    ///
    /// # Returns
    ///
    /// - `Ok(GeoRecord)`: The normalized record (fields may be `None`)
    /// - `Err(Error)`: If the provider could not be queried
    async fn lookup(&self) -> Result<GeoRecord, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
