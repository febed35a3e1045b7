// # InfluxDB 2.x Writer
//
// Token/org/bucket addressing.
//
// ## API Reference
//
// - Write: POST `/api/v2/write?org=<org>&bucket=<bucket>&precision=ns`
//   with `Authorization: Token <token>`, body in line protocol
// - Health: GET `/health` (no auth)

use async_trait::async_trait;
use netpulse_core::point::MetricPoint;
use netpulse_core::traits::MetricsWriter;
use netpulse_core::{Error, Result};

use crate::line_protocol;
use crate::session::{HEALTH_TIMEOUT, Session, status_error, transport_error};

/// InfluxDB 2.x writer
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
pub struct WriterV2 {
    url: String,
    /// API token
    /// ⚠️ NEVER log this value
    token: String,
    org: String,
    bucket: String,
    session: Session,
}

impl std::fmt::Debug for WriterV2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterV2")
            .field("url", &self.url)
            .field("token", &"<REDACTED>")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl WriterV2 {
    /// Create a writer; fails if the token, org or bucket is empty
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        org: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<Self> {
        let token = token.into();
        let org = org.into();
        let bucket = bucket.into();

        if token.is_empty() {
            return Err(Error::config("InfluxDB 2.x API token cannot be empty"));
        }
        if org.is_empty() || bucket.is_empty() {
            return Err(Error::config("InfluxDB 2.x org and bucket are required"));
        }

        Ok(Self {
            url: url.into().trim_end_matches('/').to_string(),
            token,
            org,
            bucket,
            session: Session::new(),
        })
    }
}

#[async_trait]
impl MetricsWriter for WriterV2 {
    async fn write(&self, point: &MetricPoint) -> Result<()> {
        let body = line_protocol::encode(point)?;
        let client = self.session.client()?;

        tracing::debug!(
            "Writing {} point to bucket {}",
            point.measurement(),
            self.bucket
        );

        let response = client
            .post(format!("{}/api/v2/write", self.url))
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error("v2", "write", response).await);
        }

        Ok(())
    }

    async fn health(&self) -> Result<()> {
        let client = self.session.client()?;
        let response = client
            .get(format!("{}/health", self.url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error("v2", "health check", response).await);
        }

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.session.close() {
            tracing::debug!("InfluxDB 2.x session closed");
        }
        Ok(())
    }

    fn protocol_name(&self) -> &'static str {
        "v2"
    }
}
