//! Core traits for the NetPulse system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`GeoProvider`]: Look up the current public IP and ISP
//! - [`IspStateStore`]: Durable last-known ISP observation
//! - [`SpeedMeasurer`]: Run one throughput/latency measurement
//! - [`MetricsWriter`]: Persist metric points to a time-series backend

pub mod geo_provider;
pub mod isp_state_store;
pub mod metrics_writer;
pub mod speed_measurer;

pub use geo_provider::GeoProvider;
pub use isp_state_store::{IspStateStore, PersistedIspState};
pub use metrics_writer::MetricsWriter;
pub use speed_measurer::{MeasurementRecord, SpeedMeasurer};
