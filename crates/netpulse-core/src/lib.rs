// # netpulse-core
//
// Core library for the NetPulse network speed and ISP-change monitor.
//
// ## Architecture Overview
//
// - **GeoProvider** / **GeoLocator**: locate the current public IP and ISP,
//   falling back to a secondary provider
// - **IspStateStore**: durable last-known ISP observation
// - **ChangeDetector**: compare the current observation with the stored one
// - **SpeedMeasurer**: run one throughput/latency measurement
// - **MetricsWriter**: persist metric points to a time-series backend
// - **NetPulseMonitor**: sequence the above into cycles
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Library-First**: No component reads process state; the daemon builds a
//    `MonitorConfig` once and passes it in
// 3. **Partial-Failure Tolerance**: Nothing inside a cycle is fatal

pub mod config;
pub mod detector;
pub mod error;
pub mod geo;
pub mod monitor;
pub mod point;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    GeoConfig, MonitorConfig, ScheduleConfig, SpeedtestConfig, StateStoreConfig, StorageConfig,
};
pub use detector::{ChangeDetector, ChangeReport};
pub use error::{Error, Result};
pub use geo::{ConnectionType, GeoFields, GeoLocator, GeoRecord};
pub use monitor::{CycleOutcome, CyclePhase, CycleReport, MonitorEvent, NetPulseMonitor};
pub use point::{FieldValue, MetricPoint};
pub use state::{FileIspStateStore, MemoryIspStateStore};
pub use traits::{
    GeoProvider, IspStateStore, MeasurementRecord, MetricsWriter, PersistedIspState,
    SpeedMeasurer,
};
