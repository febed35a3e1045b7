//! Test doubles and common utilities for contract tests
//!
//! The doubles record what the monitor does to them so tests can assert on
//! calls without any network or subprocess.

#![allow(dead_code)]

use netpulse_core::error::{Error, Result};
use netpulse_core::geo::{GeoFields, GeoLocator, GeoRecord};
use netpulse_core::traits::{GeoProvider, MeasurementRecord, MetricsWriter, SpeedMeasurer};
use netpulse_core::{
    ChangeDetector, IspStateStore, MetricPoint, MonitorEvent, NetPulseMonitor, ScheduleConfig,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Build a located record
pub fn geo(ip: &str, isp: &str, asn: Option<&str>) -> GeoRecord {
    GeoRecord::from_fields(
        "fixed",
        GeoFields {
            ip: Some(ip.to_string()),
            isp: Some(isp.to_string()),
            asn: asn.map(str::to_string),
            ..Default::default()
        },
    )
}

/// A geolocation provider that always returns the same record
pub struct FixedGeoProvider {
    record: Option<GeoRecord>,
    calls: Arc<AtomicUsize>,
}

impl FixedGeoProvider {
    pub fn new(record: GeoRecord) -> Self {
        Self {
            record: Some(record),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A provider whose every lookup fails
    pub fn failing() -> Self {
        Self {
            record: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait::async_trait]
impl GeoProvider for FixedGeoProvider {
    async fn lookup(&self) -> Result<GeoRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.record
            .clone()
            .ok_or_else(|| Error::geo("lookup failed"))
    }

    fn provider_name(&self) -> &'static str {
        "fixed"
    }
}

/// What a scripted measurement does
#[derive(Clone)]
pub enum MeasureBehavior {
    Succeed(MeasurementRecord),
    Fail(String),
    /// Sleep, then succeed (for shutdown tests)
    Hang(Duration),
}

/// A speed measurer with scripted behavior
pub struct ScriptedMeasurer {
    behavior: MeasureBehavior,
    calls: Arc<AtomicUsize>,
}

impl ScriptedMeasurer {
    pub fn new(behavior: MeasureBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait::async_trait]
impl SpeedMeasurer for ScriptedMeasurer {
    async fn measure(&self) -> Result<MeasurementRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MeasureBehavior::Succeed(record) => Ok(record.clone()),
            MeasureBehavior::Fail(msg) => Err(Error::timeout(msg.clone())),
            MeasureBehavior::Hang(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(sample_measurement())
            }
        }
    }

    fn measurer_name(&self) -> &'static str {
        "scripted"
    }
}

/// A typical successful measurement
pub fn sample_measurement() -> MeasurementRecord {
    MeasurementRecord {
        ping_latency: Some(12.5),
        ping_jitter: Some(1.2),
        download_bandwidth: Some(12_500_000),
        upload_bandwidth: Some(1_250_000),
        packet_loss: Some(0.0),
        server_id: Some(1234),
        server_name: Some("Example Server".to_string()),
        server_location: Some("Denver, CO".to_string()),
        server_country: Some("United States".to_string()),
        result_url: Some("https://www.speedtest.net/result/c/abc".to_string()),
        isp: Some("Tool ISP".to_string()),
        ..Default::default()
    }
}

/// Shared view of everything a [`RecordingWriter`] saw
#[derive(Clone, Default)]
pub struct WriterLog {
    pub points: Arc<Mutex<Vec<MetricPoint>>>,
    pub write_attempts: Arc<AtomicUsize>,
    pub health_calls: Arc<AtomicUsize>,
    pub prepare_calls: Arc<AtomicUsize>,
    pub close_calls: Arc<AtomicUsize>,
}

impl WriterLog {
    pub fn measurements(&self) -> Vec<String> {
        self.points
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.measurement().to_string())
            .collect()
    }

    pub fn count(&self, measurement: &str) -> usize {
        self.measurements()
            .iter()
            .filter(|m| m.as_str() == measurement)
            .count()
    }

    pub fn point(&self, measurement: &str) -> Option<MetricPoint> {
        self.points
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.measurement() == measurement)
            .cloned()
    }
}

/// A metrics writer that records points in memory
pub struct RecordingWriter {
    log: WriterLog,
    /// Writes of this measurement fail
    reject: Option<String>,
    /// Health checks fail this many times before succeeding
    unhealthy_for: usize,
    /// Error returned by a failing health check
    health_error: fn() -> Error,
    closed: AtomicBool,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self {
            log: WriterLog::default(),
            reject: None,
            unhealthy_for: 0,
            health_error: || Error::http("connection refused"),
            closed: AtomicBool::new(false),
        }
    }

    pub fn rejecting(mut self, measurement: &str) -> Self {
        self.reject = Some(measurement.to_string());
        self
    }

    pub fn unhealthy_for(mut self, attempts: usize) -> Self {
        self.unhealthy_for = attempts;
        self
    }

    /// Health checks always fail with bad credentials
    pub fn with_permanent_health_error(self) -> Self {
        self.with_health_error(|| Error::auth("invalid token"))
            .unhealthy_for(usize::MAX)
    }

    pub fn with_health_error(mut self, error: fn() -> Error) -> Self {
        self.health_error = error;
        self
    }

    pub fn log(&self) -> WriterLog {
        self.log.clone()
    }
}

#[async_trait::async_trait]
impl MetricsWriter for RecordingWriter {
    async fn write(&self, point: &MetricPoint) -> Result<()> {
        self.log.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::storage("writer is closed"));
        }
        if self.reject.as_deref() == Some(point.measurement()) {
            return Err(Error::storage(format!("{} rejected", point.measurement())));
        }
        self.log.points.lock().unwrap().push(point.clone());
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        let call = self.log.health_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.unhealthy_for {
            return Err((self.health_error)());
        }
        Ok(())
    }

    async fn prepare(&self) -> Result<()> {
        self.log.prepare_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.log.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn protocol_name(&self) -> &'static str {
        "recording"
    }
}

/// Schedule suited to tests: long interval, instant readiness retries
pub fn test_schedule() -> ScheduleConfig {
    ScheduleConfig {
        interval_secs: 3600,
        readiness_retries: 5,
        readiness_interval_secs: 0,
        event_channel_capacity: 256,
    }
}

/// Assemble a monitor from test doubles
pub fn build_monitor(
    provider: FixedGeoProvider,
    store: Box<dyn IspStateStore>,
    measurer: ScriptedMeasurer,
    writer: RecordingWriter,
) -> (NetPulseMonitor, mpsc::Receiver<MonitorEvent>) {
    NetPulseMonitor::new(
        GeoLocator::new(Box::new(provider), None),
        ChangeDetector::new(store),
        Box::new(measurer),
        Box::new(writer),
        &test_schedule(),
    )
    .expect("monitor construction succeeds")
}

/// Drain every event currently buffered
pub fn drain(rx: &mut mpsc::Receiver<MonitorEvent>) -> Vec<MonitorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
