// # Geolocation
//
// Canonical IP/ISP/ASN/location record, the normalization helpers shared by
// all geolocation providers, and the `GeoLocator` that chains them.
//
// ## Null vs `unknown`
//
// Every string field is optional: `None` means "the provider did not supply
// this field". The connection type is never optional; it is `Unknown` when an
// ISP name was supplied but matched no keyword, and `None` when there was no
// ISP name at all.

mod classify;
mod locator;

pub use classify::{classify_connection, parse_asn_token, split_org};
pub use locator::GeoLocator;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse connection classification inferred from ISP name keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Cellular,
    Cable,
    Fiber,
    Dsl,
    /// No ISP name to classify
    None,
    /// ISP name present but no keyword matched
    #[serde(other)]
    Unknown,
}

impl ConnectionType {
    /// Wire/tag representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Cellular => "cellular",
            ConnectionType::Cable => "cable",
            ConnectionType::Fiber => "fiber",
            ConnectionType::Dsl => "dsl",
            ConnectionType::Unknown => "unknown",
            ConnectionType::None => "none",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw provider fields, before normalization
///
/// Providers fill in what they have and hand this to
/// [`GeoRecord::from_fields`].
#[derive(Debug, Clone, Default)]
pub struct GeoFields {
    pub ip: Option<String>,
    pub isp: Option<String>,
    pub asn: Option<String>,
    pub org: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

/// Canonical geolocation record
///
/// Immutable once constructed. One instance is produced per detection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoRecord {
    ip: Option<String>,
    isp: Option<String>,
    asn: Option<String>,
    org: Option<String>,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    connection_type: ConnectionType,
    /// Provider that produced this record (for logging)
    #[serde(default)]
    source: Option<String>,
}

impl GeoRecord {
    /// Build a record from provider fields
    ///
    /// Blank strings are treated as absent and the connection type is
    /// inferred from the ISP name.
    pub fn from_fields(source: impl Into<String>, fields: GeoFields) -> Self {
        let isp = normalize(fields.isp);
        let connection_type = classify_connection(isp.as_deref());

        Self {
            ip: normalize(fields.ip),
            isp,
            asn: normalize(fields.asn),
            org: normalize(fields.org),
            city: normalize(fields.city),
            region: normalize(fields.region),
            country: normalize(fields.country),
            connection_type,
            source: Some(source.into()),
        }
    }

    /// A record with nothing located
    pub fn empty() -> Self {
        Self {
            ip: None,
            isp: None,
            asn: None,
            org: None,
            city: None,
            region: None,
            country: None,
            connection_type: ConnectionType::None,
            source: None,
        }
    }

    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    pub fn isp(&self) -> Option<&str> {
        self.isp.as_deref()
    }

    pub fn asn(&self) -> Option<&str> {
        self.asn.as_deref()
    }

    pub fn org(&self) -> Option<&str> {
        self.org.as_deref()
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    /// Name of the provider that produced the record, if any did
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Whether any provider yielded an IP
    pub fn has_ip(&self) -> bool {
        self.ip.is_some()
    }
}

impl Default for GeoRecord {
    fn default() -> Self {
        Self::empty()
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
