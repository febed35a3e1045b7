// # HTTP Geolocation Providers
//
// This crate provides the HTTP geolocation providers for NetPulse.
//
// ## Providers
//
// - `IpInfoProvider`: ipinfo.io `/json` shape. The ASN is embedded in the
//   combined `org` string (`"AS7922 Comcast Cable"`).
// - `IpApiProvider`: ip-api.com `/json` shape. The ASN is the first token of
//   the `as` field, and `status == "fail"` marks a failed lookup.
//
// Neither provider retries. Chaining and fallback belong to `GeoLocator`.

use netpulse_core::config::GeoConfig;
use netpulse_core::geo::{GeoFields, GeoLocator, GeoRecord, parse_asn_token, split_org};
use netpulse_core::traits::GeoProvider;
use netpulse_core::{Error, Result};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default timeout for a single lookup
const DEFAULT_TIMEOUT_SECS: u64 = 10;

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// GET a URL and decode its JSON body
async fn fetch_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    provider: &'static str,
    url: &str,
) -> Result<T> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::timeout(format!("{} lookup timed out", provider))
            } else {
                Error::provider(provider, format!("Request failed: {}", e))
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::provider(provider, format!("HTTP error: {}", status)));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| Error::provider(provider, format!("Invalid response body: {}", e)))
}

/// ipinfo.io response (only the fields we use)
#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    ip: Option<String>,
    org: Option<String>,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
}

impl IpInfoResponse {
    fn into_record(self) -> GeoRecord {
        let (asn, isp) = self
            .org
            .as_deref()
            .map(split_org)
            .unwrap_or((None, None));

        GeoRecord::from_fields(
            "ipinfo",
            GeoFields {
                ip: self.ip,
                isp,
                asn,
                org: self.org,
                city: self.city,
                region: self.region,
                country: self.country,
            },
        )
    }
}

/// ipinfo.io geolocation provider
pub struct IpInfoProvider {
    url: String,
    client: reqwest::Client,
}

impl IpInfoProvider {
    /// Create a provider for the given endpoint (e.g. "https://ipinfo.io/json")
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a provider with a custom per-request timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            client: build_client(timeout),
        }
    }
}

#[async_trait::async_trait]
impl GeoProvider for IpInfoProvider {
    async fn lookup(&self) -> Result<GeoRecord> {
        let body: IpInfoResponse = fetch_json(&self.client, "ipinfo", &self.url).await?;
        Ok(body.into_record())
    }

    fn provider_name(&self) -> &'static str {
        "ipinfo"
    }
}

/// ip-api.com response (only the fields we use)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiResponse {
    status: Option<String>,
    message: Option<String>,
    query: Option<String>,
    isp: Option<String>,
    #[serde(rename = "as")]
    as_field: Option<String>,
    org: Option<String>,
    city: Option<String>,
    region_name: Option<String>,
    country_code: Option<String>,
}

impl IpApiResponse {
    fn into_record(self) -> Result<GeoRecord> {
        if self.status.as_deref() == Some("fail") {
            return Err(Error::provider(
                "ip-api",
                format!(
                    "Lookup failed: {}",
                    self.message.as_deref().unwrap_or("no message")
                ),
            ));
        }

        Ok(GeoRecord::from_fields(
            "ip-api",
            GeoFields {
                ip: self.query,
                isp: self.isp,
                asn: self.as_field.as_deref().and_then(parse_asn_token),
                org: self.org,
                city: self.city,
                region: self.region_name,
                country: self.country_code,
            },
        ))
    }
}

/// ip-api.com geolocation provider
pub struct IpApiProvider {
    url: String,
    client: reqwest::Client,
}

impl IpApiProvider {
    /// Create a provider for the given endpoint (e.g. "http://ip-api.com/json")
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a provider with a custom per-request timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            client: build_client(timeout),
        }
    }
}

#[async_trait::async_trait]
impl GeoProvider for IpApiProvider {
    async fn lookup(&self) -> Result<GeoRecord> {
        let body: IpApiResponse = fetch_json(&self.client, "ip-api", &self.url).await?;
        body.into_record()
    }

    fn provider_name(&self) -> &'static str {
        "ip-api"
    }
}

/// Build the primary/fallback locator described by the configuration
pub fn build_locator(config: &GeoConfig) -> GeoLocator {
    let timeout = config.timeout();
    let primary: Box<dyn GeoProvider> =
        Box::new(IpInfoProvider::with_timeout(&config.primary_url, timeout));
    let fallback = config.fallback_url.as_ref().map(|url| {
        Box::new(IpApiProvider::with_timeout(url, timeout)) as Box<dyn GeoProvider>
    });

    tracing::debug!(
        "Geolocation via {} (fallback: {})",
        config.primary_url,
        config.fallback_url.as_deref().unwrap_or("none")
    );

    GeoLocator::new(primary, fallback)
}
