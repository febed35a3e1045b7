//! Configuration types for the NetPulse system
//!
//! This module defines all configuration structures used throughout the
//! workspace. A [`MonitorConfig`] is built once at startup (by `netpulsed`
//! from environment variables) and handed to every component constructor.
//! Library code never reads process state itself.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default storage backend URL
pub const DEFAULT_STORAGE_URL: &str = "http://localhost:8086";

/// Default bucket (v2) / database (v1) name
pub const DEFAULT_DATABASE: &str = "netpulse";

/// Default organization for the v2 protocol
pub const DEFAULT_ORG: &str = "netpulse";

/// Main NetPulse configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Storage backend configuration
    pub storage: StorageConfig,

    /// Geolocation provider configuration
    #[serde(default)]
    pub geo: GeoConfig,

    /// Speed measurement configuration
    #[serde(default)]
    pub speedtest: SpeedtestConfig,

    /// ISP state store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Cycle scheduling and startup settings
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl MonitorConfig {
    /// Create a configuration with defaults for everything but the storage backend
    pub fn new(storage: StorageConfig) -> Self {
        Self {
            storage,
            geo: GeoConfig::default(),
            speedtest: SpeedtestConfig::default(),
            state_store: StateStoreConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.storage.validate()?;
        self.geo.validate()?;
        self.speedtest.validate()?;
        self.state_store.validate()?;
        self.schedule.validate()?;

        Ok(())
    }
}

/// Storage backend configuration
///
/// Exactly two protocol variants exist. Which one is active is decided once,
/// here, and never re-evaluated per cycle.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "version", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Username/password/database addressing (InfluxDB 1.x)
    V1 {
        /// Base URL of the backend
        url: String,
        /// Username
        username: String,
        /// Password
        password: String,
        /// Database name (created on startup if missing)
        #[serde(default = "default_database")]
        database: String,
    },

    /// Token/org/bucket addressing (InfluxDB 2.x)
    V2 {
        /// Base URL of the backend
        url: String,
        /// API token
        token: String,
        /// Organization
        #[serde(default = "default_org")]
        org: String,
        /// Bucket
        #[serde(default = "default_database")]
        bucket: String,
    },
}

// Credentials never reach the logs
impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageConfig::V1 {
                url,
                username,
                database,
                ..
            } => f
                .debug_struct("V1")
                .field("url", url)
                .field("username", username)
                .field("password", &"<REDACTED>")
                .field("database", database)
                .finish(),
            StorageConfig::V2 {
                url, org, bucket, ..
            } => f
                .debug_struct("V2")
                .field("url", url)
                .field("token", &"<REDACTED>")
                .field("org", org)
                .field("bucket", bucket)
                .finish(),
        }
    }
}

impl StorageConfig {
    /// Validate the storage configuration
    ///
    /// A missing credential for the selected protocol is fatal at startup.
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_url("storage URL", self.url())?;

        match self {
            StorageConfig::V1 {
                username,
                password,
                database,
                ..
            } => {
                if username.is_empty() {
                    return Err(crate::Error::config("v1 storage requires a username"));
                }
                if password.is_empty() {
                    return Err(crate::Error::config("v1 storage requires a password"));
                }
                if database.is_empty() {
                    return Err(crate::Error::config("v1 database name cannot be empty"));
                }
                Ok(())
            }
            StorageConfig::V2 {
                token, org, bucket, ..
            } => {
                if token.is_empty() {
                    return Err(crate::Error::config("v2 storage requires an API token"));
                }
                if org.is_empty() {
                    return Err(crate::Error::config("v2 organization cannot be empty"));
                }
                if bucket.is_empty() {
                    return Err(crate::Error::config("v2 bucket cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Base URL of the backend
    pub fn url(&self) -> &str {
        match self {
            StorageConfig::V1 { url, .. } | StorageConfig::V2 { url, .. } => url,
        }
    }

    /// Name of the database (v1) or bucket (v2) points are written to
    pub fn target(&self) -> &str {
        match self {
            StorageConfig::V1 { database, .. } => database,
            StorageConfig::V2 { bucket, .. } => bucket,
        }
    }

    /// Get the protocol name
    pub fn protocol_name(&self) -> &'static str {
        match self {
            StorageConfig::V1 { .. } => "v1",
            StorageConfig::V2 { .. } => "v2",
        }
    }
}

/// Geolocation provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    /// Primary provider endpoint (ipinfo.io response shape)
    #[serde(default = "default_geo_primary_url")]
    pub primary_url: String,

    /// Fallback provider endpoint (ip-api.com response shape)
    #[serde(default = "default_geo_fallback_url")]
    pub fallback_url: Option<String>,

    /// Timeout for a single provider request (in seconds)
    #[serde(default = "default_geo_timeout_secs")]
    pub timeout_secs: u64,
}

impl GeoConfig {
    /// Validate the geolocation configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_url("geolocation primary URL", &self.primary_url)?;
        if let Some(ref fallback) = self.fallback_url {
            validate_url("geolocation fallback URL", fallback)?;
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("geolocation timeout must be > 0"));
        }
        Ok(())
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            primary_url: default_geo_primary_url(),
            fallback_url: default_geo_fallback_url(),
            timeout_secs: default_geo_timeout_secs(),
        }
    }
}

/// Speed measurement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedtestConfig {
    /// Measurement binary (looked up on `PATH` unless absolute)
    #[serde(default = "default_speedtest_binary")]
    pub binary: String,

    /// Timeout for one measurement run (in seconds)
    #[serde(default = "default_speedtest_timeout_secs")]
    pub timeout_secs: u64,

    /// Timeout for the one-time license/consent handshake (in seconds)
    #[serde(default = "default_license_timeout_secs")]
    pub license_timeout_secs: u64,
}

impl SpeedtestConfig {
    /// Validate the measurement configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.binary.trim().is_empty() {
            return Err(crate::Error::config("speedtest binary cannot be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("speedtest timeout must be > 0"));
        }
        if self.license_timeout_secs == 0 {
            return Err(crate::Error::config("license handshake timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for SpeedtestConfig {
    fn default() -> Self {
        Self {
            binary: default_speedtest_binary(),
            timeout_secs: default_speedtest_timeout_secs(),
            license_timeout_secs: default_license_timeout_secs(),
        }
    }
}

/// ISP state store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    Memory,
}

impl StateStoreConfig {
    /// Validate the state store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path } if path.trim().is_empty() => {
                Err(crate::Error::config("state file path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        StateStoreConfig::File {
            path: default_state_path(),
        }
    }
}

/// Cycle scheduling and startup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between the start of consecutive cycles in daemon mode
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Number of storage health checks before giving up at startup
    #[serde(default = "default_readiness_retries")]
    pub readiness_retries: usize,

    /// Delay between storage health checks (in seconds)
    #[serde(default = "default_readiness_interval_secs")]
    pub readiness_interval_secs: u64,

    /// Capacity of the monitor event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ScheduleConfig {
    /// Validate the schedule configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("cycle interval must be > 0"));
        }
        if self.readiness_retries == 0 {
            return Err(crate::Error::config("readiness retries must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Interval between cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Delay between readiness checks
    pub fn readiness_interval(&self) -> Duration {
        Duration::from_secs(self.readiness_interval_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            readiness_retries: default_readiness_retries(),
            readiness_interval_secs: default_readiness_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn validate_url(what: &str, url: &str) -> Result<(), crate::Error> {
    if url.is_empty() {
        return Err(crate::Error::config(format!("{} cannot be empty", what)));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(crate::Error::config(format!(
            "{} must use HTTP or HTTPS scheme. Got: {}",
            what, url
        )));
    }
    Ok(())
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_org() -> String {
    DEFAULT_ORG.to_string()
}

fn default_geo_primary_url() -> String {
    "https://ipinfo.io/json".to_string()
}

fn default_geo_fallback_url() -> Option<String> {
    Some("http://ip-api.com/json".to_string())
}

fn default_geo_timeout_secs() -> u64 {
    10
}

fn default_speedtest_binary() -> String {
    "speedtest".to_string()
}

fn default_speedtest_timeout_secs() -> u64 {
    120
}

fn default_license_timeout_secs() -> u64 {
    30
}

fn default_state_path() -> String {
    "/tmp/netpulse_state.json".to_string()
}

fn default_interval_secs() -> u64 {
    1800
}

fn default_readiness_retries() -> usize {
    30
}

fn default_readiness_interval_secs() -> u64 {
    5
}

fn default_event_channel_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v2() -> StorageConfig {
        StorageConfig::V2 {
            url: DEFAULT_STORAGE_URL.to_string(),
            token: "secret-token".to_string(),
            org: DEFAULT_ORG.to_string(),
            bucket: DEFAULT_DATABASE.to_string(),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = MonitorConfig::new(v2());
        assert!(config.validate().is_ok());
        assert_eq!(config.geo.timeout_secs, 10);
        assert_eq!(config.speedtest.timeout_secs, 120);
        assert_eq!(config.speedtest.license_timeout_secs, 30);
        assert_eq!(config.schedule.readiness_retries, 30);
        assert_eq!(config.schedule.readiness_interval_secs, 5);
    }

    #[test]
    fn test_missing_v2_token_is_fatal() {
        let storage = StorageConfig::V2 {
            url: DEFAULT_STORAGE_URL.to_string(),
            token: String::new(),
            org: DEFAULT_ORG.to_string(),
            bucket: DEFAULT_DATABASE.to_string(),
        };
        assert!(storage.validate().is_err());
    }

    #[test]
    fn test_missing_v1_password_is_fatal() {
        let storage = StorageConfig::V1 {
            url: DEFAULT_STORAGE_URL.to_string(),
            username: "netpulse".to_string(),
            password: String::new(),
            database: DEFAULT_DATABASE.to_string(),
        };
        assert!(storage.validate().is_err());
    }

    #[test]
    fn test_storage_url_scheme() {
        let storage = StorageConfig::V2 {
            url: "localhost:8086".to_string(),
            token: "t".to_string(),
            org: "o".to_string(),
            bucket: "b".to_string(),
        };
        assert!(storage.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let debug = format!("{:?}", v2());
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[test]
    fn test_storage_config_deserializes_with_defaults() {
        let storage: StorageConfig = serde_json::from_value(serde_json::json!({
            "version": "v1",
            "url": "http://influx:8086",
            "username": "admin",
            "password": "pw",
        }))
        .unwrap();

        assert_eq!(storage.protocol_name(), "v1");
        assert_eq!(storage.target(), "netpulse");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let schedule = ScheduleConfig {
            interval_secs: 0,
            ..ScheduleConfig::default()
        };
        assert!(schedule.validate().is_err());
    }
}
