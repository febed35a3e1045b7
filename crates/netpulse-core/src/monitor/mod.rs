//! NetPulse monitor
//!
//! The NetPulseMonitor runs measurement cycles and is responsible for:
//! - Locating the current connection via GeoLocator
//! - Detecting ISP changes via ChangeDetector
//! - Measuring throughput via SpeedMeasurer
//! - Persisting metric points via MetricsWriter
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐        ┌────────────────┐
//! │ GeoLocator  │─ geo ─▶│ ChangeDetector │── ChangeReport ──┐
//! └─────────────┘        └────────────────┘                  │
//!                                                            ▼
//! ┌───────────────┐                               ┌──────────────────┐
//! │ SpeedMeasurer │──── MeasurementRecord ───────▶│ NetPulseMonitor  │
//! └───────────────┘                               └──────────────────┘
//!                                                            │
//!                              ┌─────────────────────────────┼──────────────┐
//!                              ▼                                            ▼
//!                      ┌───────────────┐                            ┌─────────────┐
//!                      │ MetricsWriter │                            │   Events    │
//!                      │ (points)      │                            │  (notify)   │
//!                      └───────────────┘                            └─────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. `Locating`: one geolocation lookup (never fails)
//! 2. `Detecting`: compare with and overwrite the stored ISP state (never fails)
//! 3. `Measuring`: one speed measurement
//! 4. `Persisting`: `speedtest` point, plus `isp_change` if the ISP changed,
//!    or `PersistingErrorMarker`: one `speedtest_error` point if measuring failed
//! 5. `Done`
//!
//! Cycles never overlap. Nothing inside a cycle is fatal.

pub mod points;

use crate::config::ScheduleConfig;
use crate::detector::{ChangeDetector, ChangeReport};
use crate::error::{Error, Result};
use crate::geo::{GeoLocator, GeoRecord};
use crate::point::MetricPoint;
use crate::traits::{MetricsWriter, SpeedMeasurer};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

/// Cycle state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Locating,
    Detecting,
    Measuring,
    Persisting,
    PersistingErrorMarker,
    Done,
}

/// How the measurement step of a cycle ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// A measurement was taken and its point was attempted
    Measured,

    /// The measurement failed and an error marker was attempted instead
    MeasurementFailed { error: String },
}

/// Summary of one completed cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Cycle sequence number, starting at 1
    pub cycle: u64,
    pub geo: GeoRecord,
    pub change: ChangeReport,
    pub outcome: CycleOutcome,
    /// Measurements of the points the backend accepted, in write order
    pub points_written: Vec<String>,
    /// Measurements of the points that failed to write
    pub write_failures: Vec<String>,
}

impl CycleReport {
    /// Whether the measurement succeeded and every point was written
    pub fn is_clean(&self) -> bool {
        self.outcome == CycleOutcome::Measured && self.write_failures.is_empty()
    }
}

/// Events emitted by the NetPulseMonitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Storage backend answered its health check
    StorageReady { attempts: usize },

    /// Monitor loop started
    Started { interval_secs: u64 },

    /// A cycle entered a new phase
    PhaseEntered { cycle: u64, phase: CyclePhase },

    /// The ISP, IP or ASN changed since the previous observation
    IspChanged {
        previous_ip: Option<String>,
        current_ip: Option<String>,
        previous_isp: Option<String>,
        current_isp: Option<String>,
    },

    /// The measurement failed
    MeasurementFailed { cycle: u64, error: String },

    /// A point was accepted by the backend
    PointWritten { measurement: String },

    /// A point could not be written
    WriteFailed { measurement: String, error: String },

    /// A cycle reached `Done`
    CycleCompleted { cycle: u64, clean: bool },

    /// Monitor loop stopped
    Stopped { reason: String },
}

/// NetPulse monitor
///
/// ## Lifecycle
///
/// 1. Create with [`NetPulseMonitor::new()`]
/// 2. Wait for storage with [`NetPulseMonitor::ensure_storage_ready()`]
/// 3. Run one cycle with [`NetPulseMonitor::run_cycle()`] or loop with
///    [`NetPulseMonitor::run_until()`]
/// 4. Release the writer with [`NetPulseMonitor::close()`]
///
/// ## Load Resistance
///
/// Events go through a bounded channel. When it is full, events are dropped
/// with a warning rather than blocking the cycle.
pub struct NetPulseMonitor {
    locator: GeoLocator,
    detector: ChangeDetector,
    measurer: Box<dyn SpeedMeasurer>,
    writer: Box<dyn MetricsWriter>,

    interval: Duration,
    readiness_retries: usize,
    readiness_interval: Duration,

    cycles: AtomicU64,
    event_tx: mpsc::Sender<MonitorEvent>,
}

impl NetPulseMonitor {
    /// Create a new monitor
    ///
    /// # Returns
    ///
    /// A tuple of (monitor, event_receiver) where event_receiver yields monitor events
    pub fn new(
        locator: GeoLocator,
        detector: ChangeDetector,
        measurer: Box<dyn SpeedMeasurer>,
        writer: Box<dyn MetricsWriter>,
        schedule: &ScheduleConfig,
    ) -> Result<(Self, mpsc::Receiver<MonitorEvent>)> {
        schedule.validate()?;

        let (tx, rx) = mpsc::channel(schedule.event_channel_capacity);

        let monitor = Self {
            locator,
            detector,
            measurer,
            writer,
            interval: schedule.interval(),
            readiness_retries: schedule.readiness_retries,
            readiness_interval: schedule.readiness_interval(),
            cycles: AtomicU64::new(0),
            event_tx: tx,
        };

        Ok((monitor, rx))
    }

    /// Interval between cycle starts in loop mode
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll the storage health check until it succeeds
    ///
    /// Makes at most `readiness_retries` attempts, sleeping
    /// `readiness_interval` between them (not after the last). Rejected
    /// credentials end the wait early; every other failure is retried.
    ///
    /// # Returns
    ///
    /// - `Ok(attempts)`: Number of attempts it took
    /// - `Err(Error)`: The budget was exhausted or the credentials were rejected
    pub async fn wait_for_storage(&self) -> Result<usize> {
        let mut last_error: Option<Error> = None;

        for attempt in 1..=self.readiness_retries {
            match self.writer.health().await {
                Ok(()) => {
                    info!(
                        "Storage backend ({}) is ready after {} attempt(s)",
                        self.writer.protocol_name(),
                        attempt
                    );
                    self.emit_event(MonitorEvent::StorageReady { attempts: attempt });
                    return Ok(attempt);
                }
                Err(e @ Error::Authentication(_)) => {
                    error!("Storage backend rejected credentials: {}", e);
                    return Err(e);
                }
                Err(e) if e.is_transient() => {
                    debug!(
                        "Storage not ready (attempt {}/{}): {}",
                        attempt, self.readiness_retries, e
                    );
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(
                        "Storage health check failed (attempt {}/{}): {}",
                        attempt, self.readiness_retries, e
                    );
                    last_error = Some(e);
                }
            }

            if attempt < self.readiness_retries {
                tokio::time::sleep(self.readiness_interval).await;
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string());
        Err(Error::storage(format!(
            "storage backend not ready after {} attempts: {}",
            self.readiness_retries, reason
        )))
    }

    /// Wait for storage, then run one-time backend preparation
    ///
    /// A failed preparation is logged and not fatal: writes will surface the
    /// problem if it persists.
    pub async fn ensure_storage_ready(&self) -> Result<()> {
        self.wait_for_storage().await?;

        if let Err(e) = self.writer.prepare().await {
            warn!(
                "Storage preparation failed ({}): {}",
                self.writer.protocol_name(),
                e
            );
        }

        Ok(())
    }

    /// Run one cycle to completion
    ///
    /// Never fails: every failure is collapsed into the returned report.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Starting cycle {}", cycle);

        self.enter(cycle, CyclePhase::Locating);
        let geo = self.locator.locate().await;
        info!(
            ip = geo.ip().unwrap_or("-"),
            isp = geo.isp().unwrap_or("-"),
            asn = geo.asn().unwrap_or("-"),
            connection_type = %geo.connection_type(),
            "Located connection"
        );

        self.enter(cycle, CyclePhase::Detecting);
        let change = self.detector.detect(&geo).await;
        if change.changed {
            self.emit_event(MonitorEvent::IspChanged {
                previous_ip: change.previous_ip.clone(),
                current_ip: geo.ip().map(str::to_string),
                previous_isp: change.previous_isp.clone(),
                current_isp: geo.isp().map(str::to_string),
            });
        }

        self.enter(cycle, CyclePhase::Measuring);
        let mut points_written = Vec::new();
        let mut write_failures = Vec::new();

        // A measurement that yields no storable field is a failed measurement
        let measured = self.measurer.measure().await.and_then(|measurement| {
            let point = points::speedtest_point(&geo, &measurement);
            if point.has_fields() {
                Ok((measurement, point))
            } else {
                Err(Error::measurement("measurement produced no fields"))
            }
        });

        let outcome = match measured {
            Ok((measurement, speedtest)) => {
                info!(
                    download_mbps = ?measurement.download_mbps(),
                    upload_mbps = ?measurement.upload_mbps(),
                    ping_ms = ?measurement.ping_latency,
                    "Measurement complete"
                );

                self.enter(cycle, CyclePhase::Persisting);
                let mut batch = vec![speedtest];
                if change.changed {
                    batch.push(points::isp_change_point(&geo, &change));
                }
                // Each point is attempted even if an earlier one failed
                for point in &batch {
                    self.persist(point, &mut points_written, &mut write_failures)
                        .await;
                }

                CycleOutcome::Measured
            }
            Err(e) => {
                error!(
                    "Measurement via {} failed: {}",
                    self.measurer.measurer_name(),
                    e
                );
                self.emit_event(MonitorEvent::MeasurementFailed {
                    cycle,
                    error: e.to_string(),
                });

                self.enter(cycle, CyclePhase::PersistingErrorMarker);
                let marker = points::error_point(&geo);
                self.persist(&marker, &mut points_written, &mut write_failures)
                    .await;

                CycleOutcome::MeasurementFailed {
                    error: e.to_string(),
                }
            }
        };

        self.enter(cycle, CyclePhase::Done);
        let report = CycleReport {
            cycle,
            geo,
            change,
            outcome,
            points_written,
            write_failures,
        };

        info!(
            "Cycle {} done (clean: {}, written: {:?})",
            cycle,
            report.is_clean(),
            report.points_written
        );
        self.emit_event(MonitorEvent::CycleCompleted {
            cycle,
            clean: report.is_clean(),
        });

        report
    }

    /// Run cycles until the given future resolves
    ///
    /// The first cycle starts immediately; later cycles start every
    /// `interval`. A cycle that overruns delays the next one instead of
    /// stacking up.
    ///
    /// The shutdown future interrupts both the wait between cycles and a
    /// running cycle. An interrupted cycle is abandoned mid-way; its
    /// measurement subprocess is killed when its future is dropped.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(ticker);

        self.emit_event(MonitorEvent::Started {
            interval_secs: self.interval.as_secs(),
        });
        info!("Monitor started, interval {}s", self.interval.as_secs());

        let reason = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    break "Shutdown signal";
                }

                Some(_) = ticks.next() => {
                    tokio::select! {
                        _ = &mut shutdown => {
                            warn!("Shutdown signal received during a cycle, abandoning it");
                            break "Shutdown signal during cycle";
                        }
                        _ = self.run_cycle() => {}
                    }
                    debug!("Next cycle in {}s", self.interval.as_secs());
                }
            }
        };

        info!("Monitor stopped: {}", reason);
        self.emit_event(MonitorEvent::Stopped {
            reason: reason.to_string(),
        });

        Ok(())
    }

    /// Run with a controlled shutdown channel
    ///
    /// Drop or send on the paired sender to stop the loop.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) -> Result<()> {
        self.run_until(async {
            let _ = shutdown_rx.await;
        })
        .await
    }

    /// Release the storage session
    pub async fn close(&self) -> Result<()> {
        self.writer.close().await?;
        debug!("Storage writer ({}) closed", self.writer.protocol_name());
        Ok(())
    }

    async fn persist(
        &self,
        point: &MetricPoint,
        written: &mut Vec<String>,
        failures: &mut Vec<String>,
    ) {
        match self.writer.write(point).await {
            Ok(()) => {
                debug!("Wrote {} point", point.measurement());
                written.push(point.measurement().to_string());
                self.emit_event(MonitorEvent::PointWritten {
                    measurement: point.measurement().to_string(),
                });
            }
            Err(e) => {
                warn!("Failed to write {} point: {}", point.measurement(), e);
                failures.push(point.measurement().to_string());
                self.emit_event(MonitorEvent::WriteFailed {
                    measurement: point.measurement().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn enter(&self, cycle: u64, phase: CyclePhase) {
        debug!("Cycle {} -> {:?}", cycle, phase);
        self.emit_event(MonitorEvent::PhaseEntered { cycle, phase });
    }

    fn emit_event(&self, event: MonitorEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
