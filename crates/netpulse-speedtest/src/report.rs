//! Ookla JSON report parsing

use netpulse_core::traits::MeasurementRecord;
use netpulse_core::{Error, Result};
use serde::{Deserialize, Deserializer};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Report {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
    timestamp: Option<String>,
    ping: Ping,
    download: Transfer,
    upload: Transfer,
    packet_loss: Option<f64>,
    isp: Option<String>,
    interface: Interface,
    server: Server,
    result: ResultLink,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Ping {
    jitter: Option<f64>,
    latency: Option<f64>,
    low: Option<f64>,
    high: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Transfer {
    bandwidth: Option<i64>,
    bytes: Option<i64>,
    elapsed: Option<i64>,
    latency: TransferLatency,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TransferLatency {
    iqm: Option<f64>,
    low: Option<f64>,
    high: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Interface {
    external_ip: Option<String>,
    internal_ip: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Server {
    #[serde(deserialize_with = "lenient_id")]
    id: Option<i64>,
    name: Option<String>,
    location: Option<String>,
    country: Option<String>,
    host: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResultLink {
    id: Option<String>,
    url: Option<String>,
}

/// Server ids appear both as numbers and as numeric strings
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<Id>::deserialize(deserializer)? {
        Some(Id::Number(n)) => Some(n),
        Some(Id::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

/// Parse the `--format=json` output of the speedtest CLI
///
/// Missing sections leave the corresponding fields `None`. Invalid JSON, a
/// document whose `type` is not `result` (the CLI reports errors as `log`
/// documents), and a result carrying neither a ping latency nor a bandwidth
/// are measurement failures.
pub fn parse_report(stdout: &[u8]) -> Result<MeasurementRecord> {
    let report: Report = serde_json::from_slice(stdout)
        .map_err(|e| Error::measurement(format!("invalid speedtest JSON: {}", e)))?;

    if let Some(kind) = report.kind.as_deref()
        && kind != "result"
    {
        return Err(Error::measurement(format!(
            "speedtest reported {} instead of a result: {}",
            kind,
            report.message.as_deref().unwrap_or("no message")
        )));
    }

    let record = into_record(report);
    if record.ping_latency.is_none()
        && record.download_bandwidth.is_none()
        && record.upload_bandwidth.is_none()
    {
        return Err(Error::measurement(
            "speedtest result carries no latency or bandwidth",
        ));
    }

    Ok(record)
}

fn into_record(report: Report) -> MeasurementRecord {
    MeasurementRecord {
        timestamp: report.timestamp,

        ping_jitter: report.ping.jitter,
        ping_latency: report.ping.latency,
        ping_low: report.ping.low,
        ping_high: report.ping.high,

        download_bandwidth: report.download.bandwidth,
        download_bytes: report.download.bytes,
        download_elapsed: report.download.elapsed,
        download_latency_iqm: report.download.latency.iqm,
        download_latency_low: report.download.latency.low,
        download_latency_high: report.download.latency.high,

        upload_bandwidth: report.upload.bandwidth,
        upload_bytes: report.upload.bytes,
        upload_elapsed: report.upload.elapsed,
        upload_latency_iqm: report.upload.latency.iqm,
        upload_latency_low: report.upload.latency.low,
        upload_latency_high: report.upload.latency.high,

        packet_loss: report.packet_loss,

        server_id: report.server.id,
        server_name: report.server.name,
        server_location: report.server.location,
        server_country: report.server.country,
        server_host: report.server.host,

        result_id: report.result.id,
        result_url: report.result.url,

        isp: report.isp,
        external_ip: report.interface.external_ip,
        internal_ip: report.interface.internal_ip,
    }
}
