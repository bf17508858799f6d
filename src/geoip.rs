//! Lookup capabilities consumed by the enricher.
//!
//! The pipeline never talks to a database directly. It asks a [`CityLookup`] for
//! geolocation and, when ASN fields were requested, an [`AsnLookup`] for network
//! ownership. [`crate::mmdb`] implements both over MaxMind GeoLite2 files; tests
//! implement them over in-memory maps.

use std::net::IpAddr;

/// Geolocation answer for one address. Every part may be missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CityRecord {
    /// ISO 3166-1 alpha-2 code, as stored in the database (usually upper case).
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Autonomous-system answer for one address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AsnRecord {
    pub number: Option<u32>,
    pub organization: Option<String>,
}

/// Why a single lookup produced nothing.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The extracted text is not a parseable IP address (e.g. `999.1.1.1`).
    #[error("not a valid IP address: {ip}")]
    InvalidAddress { ip: String },

    /// The database has no entry for the address.
    #[error("no database entry for {ip}")]
    NotFound { ip: String },

    /// The database returned an error or a record that failed to decode.
    #[error("lookup failed for {ip}")]
    Database {
        ip: String,
        #[source]
        source: maxminddb::MaxMindDbError,
    },
}

/// Parse `ip` into an [`IpAddr`] or report it as an invalid address.
pub fn parse_ip(ip: &str) -> Result<IpAddr, LookupError> {
    ip.parse().map_err(|_| LookupError::InvalidAddress { ip: ip.to_string() })
}

/// Geolocation lookup for a single address.
pub trait CityLookup {
    fn lookup_city(&self, ip: &str) -> Result<CityRecord, LookupError>;
}

/// Autonomous-system lookup for a single address.
pub trait AsnLookup {
    fn lookup_asn(&self, ip: &str) -> Result<AsnRecord, LookupError>;
}

impl<T: CityLookup + ?Sized> CityLookup for &T {
    fn lookup_city(&self, ip: &str) -> Result<CityRecord, LookupError> {
        (**self).lookup_city(ip)
    }
}

impl<T: AsnLookup + ?Sized> AsnLookup for &T {
    fn lookup_asn(&self, ip: &str) -> Result<AsnRecord, LookupError> {
        (**self).lookup_asn(ip)
    }
}
