//! HTTP session shared by both writer variants

use netpulse_core::{Error, Result};
use std::sync::Mutex;
use std::time::Duration;

/// Default HTTP timeout for write requests
pub(crate) const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for a single health check
pub(crate) const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// A closable HTTP client
///
/// `close` drops the client; later requests fail instead of reopening it.
pub(crate) struct Session {
    client: Mutex<Option<reqwest::Client>>,
}

impl Session {
    pub(crate) fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client: Mutex::new(Some(client)),
        }
    }

    /// A handle to the open client
    pub(crate) fn client(&self) -> Result<reqwest::Client> {
        self.client
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| Error::storage("writer is closed"))
    }

    /// Drop the client. Returns whether it was open.
    pub(crate) fn close(&self) -> bool {
        self.client
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .is_some()
    }
}

/// Map a transport error without echoing the request URL
///
/// v1 URLs carry credentials in the query string.
pub(crate) fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::timeout("storage request timed out")
    } else {
        Error::http(format!("request failed: {}", e.without_url()))
    }
}

/// Map a non-success response to an error
pub(crate) async fn status_error(
    protocol: &'static str,
    what: &str,
    response: reqwest::Response,
) -> Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());
    let body = body.trim();

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{} rejected credentials. Status: {}",
            protocol, status
        )),
        404 => Error::not_found(format!("{}: {} - {}", what, status, body)),
        429 => Error::rate_limited(format!("{}: {}", what, status)),
        500..=599 => Error::storage(format!(
            "server error (transient) during {}: {} - {}",
            what, status, body
        )),
        _ => Error::provider(
            protocol,
            format!("{} failed: HTTP {} - {}", what, status, body),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_is_idempotent() {
        let session = Session::new();
        assert!(session.client().is_ok());
        assert!(session.close());
        assert!(!session.close());
        assert!(session.client().is_err());
    }
}
