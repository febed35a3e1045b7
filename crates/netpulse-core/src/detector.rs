//! ISP change detection
//!
//! [`ChangeDetector`] compares the freshly located [`GeoRecord`] against the
//! last persisted observation and then replaces that observation.

use serde::Serialize;

use crate::geo::{ConnectionType, GeoRecord};
use crate::traits::{IspStateStore, PersistedIspState};

/// Outcome of one detection attempt
///
/// Invariant: `changed == ip_changed || isp_changed || asn_changed`.
/// Without a prior IP every flag is false.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeReport {
    pub changed: bool,
    pub ip_changed: bool,
    pub isp_changed: bool,
    pub asn_changed: bool,
    pub previous_ip: Option<String>,
    pub previous_isp: Option<String>,
    pub previous_asn: Option<String>,
    pub previous_connection_type: Option<ConnectionType>,
}

impl ChangeReport {
    /// Compare a prior observation with the current record
    ///
    /// No comparison is made when either side lacks an IP: a cold start has
    /// nothing to compare against, and a lookup that produced no IP says
    /// nothing about whether the link changed.
    pub fn compare(previous: &PersistedIspState, current: &GeoRecord) -> Self {
        let mut report = Self {
            previous_ip: previous.ip.clone(),
            previous_isp: previous.isp.clone(),
            previous_asn: previous.asn.clone(),
            previous_connection_type: previous.connection_type,
            ..Default::default()
        };

        if previous.has_baseline() && current.has_ip() {
            report.ip_changed = previous.ip.as_deref() != current.ip();
            report.isp_changed = previous.isp.as_deref() != current.isp();
            report.asn_changed = previous.asn.as_deref() != current.asn();
            report.changed = report.ip_changed || report.isp_changed || report.asn_changed;
        }

        report
    }
}

/// Stateful ISP change detector
///
/// Sole owner of the [`IspStateStore`]: every call to
/// [`detect`](Self::detect) overwrites the stored observation, including the
/// first one.
pub struct ChangeDetector {
    store: Box<dyn IspStateStore>,
}

impl ChangeDetector {
    pub fn new(store: Box<dyn IspStateStore>) -> Self {
        Self { store }
    }

    /// Detect whether the ISP identity changed since the last call
    ///
    /// Always succeeds. A failed load is treated as a cold start and a failed
    /// save is logged; neither aborts the cycle.
    pub async fn detect(&self, current: &GeoRecord) -> ChangeReport {
        let previous = match self.store.load().await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    store = self.store.store_name(),
                    "Failed to load ISP state, treating as cold start: {}",
                    e
                );
                PersistedIspState::empty()
            }
        };

        let report = ChangeReport::compare(&previous, current);

        if report.changed {
            tracing::info!(
                previous_ip = report.previous_ip.as_deref().unwrap_or("-"),
                current_ip = current.ip().unwrap_or("-"),
                previous_isp = report.previous_isp.as_deref().unwrap_or("-"),
                current_isp = current.isp().unwrap_or("-"),
                "ISP change detected"
            );
        } else if !previous.has_baseline() {
            tracing::info!("No previous ISP state, recording baseline");
        } else {
            tracing::debug!("ISP unchanged");
        }

        let next = PersistedIspState::from_record(current);
        if let Err(e) = self.store.save(&next).await {
            tracing::warn!(
                store = self.store.store_name(),
                "Failed to persist ISP state: {}",
                e
            );
        }

        report
    }

    /// Name of the underlying store (for logging)
    pub fn store_name(&self) -> &'static str {
        self.store.store_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoFields;
    use crate::state::MemoryIspStateStore;

    fn record(ip: Option<&str>, isp: Option<&str>, asn: Option<&str>) -> GeoRecord {
        GeoRecord::from_fields(
            "test",
            GeoFields {
                ip: ip.map(str::to_string),
                isp: isp.map(str::to_string),
                asn: asn.map(str::to_string),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_cold_start_reports_no_change_and_saves() {
        let store = MemoryIspStateStore::new();
        let detector = ChangeDetector::new(Box::new(store.clone()));

        let report = detector
            .detect(&record(Some("1.2.3.4"), Some("Comcast"), Some("AS7922")))
            .await;

        assert_eq!(report, ChangeReport::default());
        let saved = store.snapshot().await;
        assert_eq!(saved.ip.as_deref(), Some("1.2.3.4"));
        assert_eq!(saved.connection_type, Some(ConnectionType::Cable));
    }

    #[tokio::test]
    async fn test_second_identical_detect_is_unchanged() {
        let detector = ChangeDetector::new(Box::new(MemoryIspStateStore::new()));
        let current = record(Some("1.2.3.4"), Some("Comcast"), Some("AS7922"));

        detector.detect(&current).await;
        let report = detector.detect(&current).await;

        assert!(!report.changed);
        assert_eq!(report.previous_ip.as_deref(), Some("1.2.3.4"));
    }

    #[tokio::test]
    async fn test_each_flag_is_independent() {
        let detector = ChangeDetector::new(Box::new(MemoryIspStateStore::new()));
        detector
            .detect(&record(Some("1.2.3.4"), Some("Comcast"), Some("AS7922")))
            .await;

        let report = detector
            .detect(&record(Some("1.2.3.4"), Some("Comcast"), Some("AS7015")))
            .await;

        assert!(report.changed);
        assert!(!report.ip_changed);
        assert!(!report.isp_changed);
        assert!(report.asn_changed);
    }

    #[tokio::test]
    async fn test_null_versus_value_counts_as_change() {
        let detector = ChangeDetector::new(Box::new(MemoryIspStateStore::new()));
        detector.detect(&record(Some("1.2.3.4"), None, None)).await;

        let report = detector
            .detect(&record(Some("1.2.3.4"), Some("Comcast"), None))
            .await;

        assert!(report.isp_changed);
        assert!(!report.asn_changed);
    }

    #[tokio::test]
    async fn test_current_without_ip_is_not_a_change_but_still_saved() {
        let store = MemoryIspStateStore::new();
        let detector = ChangeDetector::new(Box::new(store.clone()));
        detector
            .detect(&record(Some("1.2.3.4"), Some("Comcast"), None))
            .await;

        let report = detector.detect(&GeoRecord::empty()).await;

        assert!(!report.changed);
        assert!(!report.ip_changed);
        assert_eq!(store.snapshot().await.ip, None);
    }

    #[test]
    fn test_compare_carries_previous_values() {
        let previous = PersistedIspState {
            ip: Some("1.2.3.4".to_string()),
            isp: Some("Comcast".to_string()),
            asn: Some("AS7922".to_string()),
            connection_type: Some(ConnectionType::Cable),
            updated_at: None,
        };
        let report = ChangeReport::compare(
            &previous,
            &record(Some("5.6.7.8"), Some("Verizon Wireless"), None),
        );

        assert!(report.ip_changed && report.isp_changed && report.asn_changed);
        assert_eq!(report.previous_isp.as_deref(), Some("Comcast"));
        assert_eq!(report.previous_connection_type, Some(ConnectionType::Cable));
    }
}
