// # InfluxDB 1.x Writer
//
// Username/password/database addressing.
//
// ## API Reference
//
// - Write: POST `/write?db=<db>&u=<user>&p=<password>`, body in line protocol
// - Create database: POST `/query` with form field `q=CREATE DATABASE "<db>"`
//   (idempotent on the server)
// - Health: GET `/ping`

use async_trait::async_trait;
use netpulse_core::point::MetricPoint;
use netpulse_core::traits::MetricsWriter;
use netpulse_core::{Error, Result};

use crate::line_protocol;
use crate::session::{HEALTH_TIMEOUT, Session, status_error, transport_error};

/// InfluxDB 1.x writer
///
/// # Security
///
/// The Debug implementation does NOT expose the password. Transport errors
/// are stripped of the request URL because it carries the credentials.
pub struct WriterV1 {
    url: String,
    username: String,
    /// ⚠️ NEVER log this value
    password: String,
    database: String,
    session: Session,
}

impl std::fmt::Debug for WriterV1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterV1")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("database", &self.database)
            .finish()
    }
}

impl WriterV1 {
    /// Create a writer; fails if any credential or the database is empty
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Result<Self> {
        let username = username.into();
        let password = password.into();
        let database = database.into();

        if username.is_empty() || password.is_empty() {
            return Err(Error::config(
                "InfluxDB 1.x username and password are required",
            ));
        }
        if database.is_empty() {
            return Err(Error::config("InfluxDB 1.x database name cannot be empty"));
        }

        Ok(Self {
            url: url.into().trim_end_matches('/').to_string(),
            username,
            password,
            database,
            session: Session::new(),
        })
    }

    fn create_database_statement(&self) -> String {
        format!("CREATE DATABASE \"{}\"", self.database.replace('"', "\\\""))
    }
}

#[async_trait]
impl MetricsWriter for WriterV1 {
    async fn write(&self, point: &MetricPoint) -> Result<()> {
        let body = line_protocol::encode(point)?;
        let client = self.session.client()?;

        tracing::debug!(
            "Writing {} point to database {}",
            point.measurement(),
            self.database
        );

        let response = client
            .post(format!("{}/write", self.url))
            .query(&[
                ("db", self.database.as_str()),
                ("u", self.username.as_str()),
                ("p", self.password.as_str()),
            ])
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error("v1", "write", response).await);
        }

        Ok(())
    }

    async fn health(&self) -> Result<()> {
        let client = self.session.client()?;
        let response = client
            .get(format!("{}/ping", self.url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error("v1", "health check", response).await);
        }

        Ok(())
    }

    /// Create the target database
    async fn prepare(&self) -> Result<()> {
        let client = self.session.client()?;
        let statement = self.create_database_statement();

        let response = client
            .post(format!("{}/query", self.url))
            .query(&[
                ("u", self.username.as_str()),
                ("p", self.password.as_str()),
            ])
            .form(&[("q", statement.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error("v1", "create database", response).await);
        }

        tracing::info!("Ensured InfluxDB database {} exists", self.database);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.session.close() {
            tracing::debug!("InfluxDB 1.x session closed");
        }
        Ok(())
    }

    fn protocol_name(&self) -> &'static str {
        "v1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let writer = WriterV1::new("http://localhost:8086", "admin", "hunter2", "netpulse").unwrap();
        let debug = format!("{:?}", writer);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("admin"));
    }

    #[test]
    fn test_missing_credentials_are_rejected() {
        assert!(WriterV1::new("http://localhost:8086", "", "pw", "netpulse").is_err());
        assert!(WriterV1::new("http://localhost:8086", "admin", "", "netpulse").is_err());
    }

    #[test]
    fn test_create_database_statement_quotes_name() {
        let writer = WriterV1::new("http://localhost:8086", "a", "b", "net\"pulse").unwrap();
        assert_eq!(
            writer.create_database_statement(),
            r#"CREATE DATABASE "net\"pulse""#
        );
    }
}
