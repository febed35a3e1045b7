//! Metric point construction for one cycle
//!
//! Absent values are passed through as `None` and dropped by the writer.

use crate::detector::ChangeReport;
use crate::geo::GeoRecord;
use crate::point::MetricPoint;
use crate::traits::MeasurementRecord;

pub const SPEEDTEST: &str = "speedtest";
pub const ISP_CHANGE: &str = "isp_change";
pub const SPEEDTEST_ERROR: &str = "speedtest_error";

/// The `speedtest` point
///
/// Geolocation values take precedence over what the measurement tool
/// reported for `isp` and `external_ip`.
pub fn speedtest_point(geo: &GeoRecord, m: &MeasurementRecord) -> MetricPoint {
    MetricPoint::new(SPEEDTEST)
        .tag_opt("server_name", m.server_name.clone())
        .tag_opt("server_location", m.server_location.clone())
        .tag_opt("server_country", m.server_country.clone())
        .tag_opt("isp", geo.isp().or(m.isp.as_deref()))
        .tag_opt("asn", geo.asn())
        .tag("connection_type", geo.connection_type().as_str())
        .tag_opt("external_ip", geo.ip().or(m.external_ip.as_deref()))
        .field_opt("download_mbps", m.download_mbps())
        .field_opt("upload_mbps", m.upload_mbps())
        .field_opt("download_bandwidth", m.download_bandwidth)
        .field_opt("upload_bandwidth", m.upload_bandwidth)
        .field_opt("download_bytes", m.download_bytes)
        .field_opt("upload_bytes", m.upload_bytes)
        .field_opt("download_elapsed", m.download_elapsed)
        .field_opt("upload_elapsed", m.upload_elapsed)
        .field_opt("ping_latency", m.ping_latency)
        .field_opt("ping_jitter", m.ping_jitter)
        .field_opt("ping_low", m.ping_low)
        .field_opt("ping_high", m.ping_high)
        .field_opt("download_latency_iqm", m.download_latency_iqm)
        .field_opt("download_latency_low", m.download_latency_low)
        .field_opt("download_latency_high", m.download_latency_high)
        .field_opt("upload_latency_iqm", m.upload_latency_iqm)
        .field_opt("upload_latency_low", m.upload_latency_low)
        .field_opt("upload_latency_high", m.upload_latency_high)
        .field_opt("packet_loss", m.packet_loss)
        .field_opt("server_id", m.server_id)
        .field_opt("result_id", m.result_id.clone())
        .field_opt("result_url", m.result_url.clone())
}

/// The `isp_change` annotation point
pub fn isp_change_point(geo: &GeoRecord, change: &ChangeReport) -> MetricPoint {
    MetricPoint::new(ISP_CHANGE)
        .tag_opt("previous_isp", change.previous_isp.clone())
        .tag_opt("current_isp", geo.isp())
        .tag_opt("previous_asn", change.previous_asn.clone())
        .tag_opt("current_asn", geo.asn())
        .tag_opt(
            "previous_connection_type",
            change.previous_connection_type.map(|c| c.as_str()),
        )
        .tag("current_connection_type", geo.connection_type().as_str())
        .field("ip_changed", change.ip_changed)
        .field("isp_changed", change.isp_changed)
        .field("asn_changed", change.asn_changed)
        .field_opt("previous_ip", change.previous_ip.clone())
        .field_opt("current_ip", geo.ip())
        .field("event", 1i64)
}

/// The `speedtest_error` marker point
pub fn error_point(geo: &GeoRecord) -> MetricPoint {
    MetricPoint::new(SPEEDTEST_ERROR)
        .tag_opt("isp", geo.isp())
        .tag("connection_type", geo.connection_type().as_str())
        .field("error", 1i64)
}
