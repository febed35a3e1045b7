// # ISP State Store Trait
//
// Defines the interface for the durable last-known ISP observation.
//
// ## Purpose
//
// The store lets change detection survive process restarts, which matters
// most for `--once` runs driven by an external timer: every run is a fresh
// process and only the file remembers what the previous run saw.
//
// Only the most recent observation is kept. It is a single overwritten
// record, not a history.
//
// ## Implementations
//
// - File-based: JSON document (`FileIspStateStore`)
// - In-memory: `MemoryIspStateStore`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::geo::{ConnectionType, GeoRecord};

/// Last observed ISP identity
///
/// All fields `None` means "no prior observation" (cold start).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedIspState {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub isp: Option<String>,
    #[serde(default)]
    pub asn: Option<String>,
    #[serde(default)]
    pub connection_type: Option<ConnectionType>,
    /// RFC 3339 timestamp of the observation
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl PersistedIspState {
    /// The cold-start state
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot a located record, stamped with the current time
    pub fn from_record(record: &GeoRecord) -> Self {
        Self {
            ip: record.ip().map(str::to_string),
            isp: record.isp().map(str::to_string),
            asn: record.asn().map(str::to_string),
            connection_type: Some(record.connection_type()),
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    /// Whether there is a prior observation to compare against
    pub fn has_baseline(&self) -> bool {
        self.ip.is_some()
    }
}

/// Trait for ISP state store implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// - ✅ Perform I/O for persistent storage
/// - ✅ Cache the record in memory (with write-through on `save`)
/// - ❌ Compare observations (owned by `ChangeDetector`)
///
/// Errors returned here never abort a cycle: the detector treats a failed
/// `load` as a cold start and a failed `save` as a logged warning.
#[async_trait]
pub trait IspStateStore: Send + Sync {
    /// Load the last observation
    ///
    /// # Returns
    ///
    /// - `Ok(state)`: The stored state, or [`PersistedIspState::empty`] if none exists
    /// - `Err(Error)`: Storage error
    async fn load(&self) -> Result<PersistedIspState, crate::Error>;

    /// Replace the stored observation
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Successfully persisted
    /// - `Err(Error)`: Storage error
    async fn save(&self, state: &PersistedIspState) -> Result<(), crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}
