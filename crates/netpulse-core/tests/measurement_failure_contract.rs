//! Contract Test: Measurement Failure
//!
//! A failed measurement is cycle-fatal but never process-fatal: the cycle
//! writes one error marker and completes.
//!
//! Constraints verified:
//! - Exactly one `speedtest_error` point, no `speedtest` or `isp_change`
//! - Detection still ran and persisted state
//! - A failed marker write still completes the cycle

mod common;

use common::*;
use netpulse_core::{
    CycleOutcome, CyclePhase, FieldValue, MeasurementRecord, MemoryIspStateStore, MonitorEvent,
    PersistedIspState,
};

#[tokio::test]
async fn measurement_timeout_writes_only_error_marker() {
    let store = MemoryIspStateStore::with_state(PersistedIspState {
        ip: Some("1.2.3.4".to_string()),
        isp: Some("Comcast".to_string()),
        ..Default::default()
    });
    let handle = store.clone();

    let writer = RecordingWriter::new();
    let log = writer.log();
    let (monitor, mut events) = build_monitor(
        // Even with an ISP change, a failed measurement writes no isp_change
        FixedGeoProvider::new(geo("5.6.7.8", "Verizon Wireless", None)),
        Box::new(store),
        ScriptedMeasurer::new(MeasureBehavior::Fail("speedtest timed out".to_string())),
        writer,
    );

    let report = monitor.run_cycle().await;

    assert!(matches!(
        report.outcome,
        CycleOutcome::MeasurementFailed { ref error } if error.contains("timed out")
    ));
    assert_eq!(log.measurements(), vec!["speedtest_error"]);

    let marker = log.point("speedtest_error").unwrap();
    assert_eq!(marker.tag_value("isp"), Some("Verizon Wireless"));
    assert_eq!(marker.tag_value("connection_type"), Some("cellular"));
    assert_eq!(marker.field_value("error"), Some(&FieldValue::Integer(1)));

    assert!(report.change.changed);
    assert_eq!(handle.snapshot().await.ip.as_deref(), Some("5.6.7.8"));

    let phases: Vec<CyclePhase> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            MonitorEvent::PhaseEntered { phase, .. } => Some(phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            CyclePhase::Locating,
            CyclePhase::Detecting,
            CyclePhase::Measuring,
            CyclePhase::PersistingErrorMarker,
            CyclePhase::Done,
        ]
    );
}

#[tokio::test]
async fn failed_marker_write_still_completes_cycle() {
    let writer = RecordingWriter::new().rejecting("speedtest_error");
    let log = writer.log();
    let (monitor, mut events) = build_monitor(
        FixedGeoProvider::new(geo("1.2.3.4", "Comcast", None)),
        Box::new(MemoryIspStateStore::new()),
        ScriptedMeasurer::new(MeasureBehavior::Fail("exit status 1".to_string())),
        writer,
    );

    let report = monitor.run_cycle().await;

    assert!(log.measurements().is_empty());
    assert_eq!(report.write_failures, vec!["speedtest_error"]);
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        MonitorEvent::CycleCompleted { clean: false, .. }
    )));

    // The next cycle runs normally
    let next = monitor.run_cycle().await;
    assert_eq!(next.cycle, 2);
}

#[tokio::test]
async fn measurement_without_fields_writes_error_marker() {
    let writer = RecordingWriter::new();
    let log = writer.log();
    let (monitor, _events) = build_monitor(
        FixedGeoProvider::new(geo("1.2.3.4", "Comcast", None)),
        Box::new(MemoryIspStateStore::new()),
        ScriptedMeasurer::new(MeasureBehavior::Succeed(MeasurementRecord::default())),
        writer,
    );

    let report = monitor.run_cycle().await;

    assert!(matches!(
        report.outcome,
        CycleOutcome::MeasurementFailed { ref error } if error.contains("no fields")
    ));
    assert_eq!(log.measurements(), vec!["speedtest_error"]);
    assert!(report.write_failures.is_empty());
}
