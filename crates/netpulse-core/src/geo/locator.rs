//! Primary/fallback chaining of geolocation providers

use super::GeoRecord;
use crate::traits::GeoProvider;
use tracing::{debug, warn};

/// Locates the current public IP and ISP
///
/// Providers are tried in order until one yields an IP. `locate` never
/// fails: provider errors degrade to a record with more `None` fields.
pub struct GeoLocator {
    providers: Vec<Box<dyn GeoProvider>>,
}

impl GeoLocator {
    /// Create a locator with a primary and an optional fallback provider
    pub fn new(primary: Box<dyn GeoProvider>, fallback: Option<Box<dyn GeoProvider>>) -> Self {
        let mut providers = vec![primary];
        providers.extend(fallback);
        Self { providers }
    }

    /// Locate the current connection
    ///
    /// Returns the first record that carries an IP. If no provider yields an
    /// IP, the first partial record is returned, and if every provider failed
    /// outright, an empty record.
    pub async fn locate(&self) -> GeoRecord {
        let mut partial: Option<GeoRecord> = None;

        for provider in &self.providers {
            match provider.lookup().await {
                Ok(record) if record.has_ip() => {
                    debug!(
                        "Located via {}: ip={:?} isp={:?} asn={:?}",
                        provider.provider_name(),
                        record.ip(),
                        record.isp(),
                        record.asn()
                    );
                    return record;
                }
                Ok(record) => {
                    warn!(
                        "Geolocation provider {} returned no IP, trying next provider",
                        provider.provider_name()
                    );
                    partial.get_or_insert(record);
                }
                Err(e) => {
                    warn!(
                        "Geolocation provider {} failed: {}",
                        provider.provider_name(),
                        e
                    );
                }
            }
        }

        partial.unwrap_or_else(GeoRecord::empty)
    }
}
