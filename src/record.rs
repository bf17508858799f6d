//! Enriched per-address records and the enricher that builds them.

use log::debug;
use serde::Serialize;

use crate::geoip::{AsnLookup, CityLookup};

/// Rendered in place of a missing country code.
pub const UNKNOWN_CODE: &str = "unknown";
/// Rendered in place of any other missing text field.
pub const UNKNOWN: &str = "Unknown";

/// Autonomous-system fields. Present on a record only when ASN enrichment ran.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AsnInfo {
    pub number: Option<u32>,
    pub organization: Option<String>,
}

impl AsnInfo {
    /// The AS number as text, or `"Unknown"`.
    pub fn number_or_unknown(&self) -> String {
        self.number
            .map(|n| n.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn organization_or_unknown(&self) -> &str {
        self.organization.as_deref().unwrap_or(UNKNOWN)
    }

    /// True when both the number and the organization resolved.
    pub fn is_known(&self) -> bool {
        self.number.is_some() && self.organization.is_some()
    }
}

/// One unique address with its geolocation and, optionally, ASN data.
///
/// Missing values stay `None`; the `*_or_unknown` accessors render the
/// sentinels used in output files.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnrichedRecord {
    pub ip: String,
    /// Lower-cased ISO code.
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// `None` when ASN enrichment was not requested.
    pub asn: Option<AsnInfo>,
}

impl EnrichedRecord {
    /// A record with every geolocation field unresolved.
    pub fn unresolved(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            country_code: None,
            country_name: None,
            city: None,
            latitude: None,
            longitude: None,
            asn: None,
        }
    }

    pub fn country_code_or_unknown(&self) -> &str {
        self.country_code.as_deref().unwrap_or(UNKNOWN_CODE)
    }

    pub fn country_name_or_unknown(&self) -> &str {
        self.country_name.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn city_or_unknown(&self) -> &str {
        self.city.as_deref().unwrap_or(UNKNOWN)
    }

    /// Both coordinates, when the lookup produced a location.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Builds [`EnrichedRecord`]s from lookup capabilities.
///
/// Enrichment is total: every lookup failure becomes `None` fields on the
/// record and is only logged at debug level.
pub struct Enricher<'a> {
    city: &'a dyn CityLookup,
    asn: Option<&'a dyn AsnLookup>,
    include_asn: bool,
}

impl<'a> Enricher<'a> {
    pub fn new(city: &'a dyn CityLookup) -> Self {
        Self {
            city,
            asn: None,
            include_asn: false,
        }
    }

    /// Request ASN fields. With `lookup` set to `None` the fields are still
    /// present on every record, but unresolved.
    pub fn with_asn(mut self, lookup: Option<&'a dyn AsnLookup>) -> Self {
        self.asn = lookup;
        self.include_asn = true;
        self
    }

    /// Enrich a single address.
    pub fn enrich(&self, ip: &str) -> EnrichedRecord {
        let mut record = EnrichedRecord::unresolved(ip);

        match self.city.lookup_city(ip) {
            Ok(found) => {
                record.country_code = found.country_code.map(|c| c.to_lowercase());
                record.country_name = found.country_name;
                record.city = found.city;
                record.latitude = found.latitude;
                record.longitude = found.longitude;
            }
            Err(e) => debug!("city lookup: {e}"),
        }

        if self.include_asn {
            let info = match self.asn.map(|lookup| lookup.lookup_asn(ip)) {
                Some(Ok(found)) => AsnInfo {
                    number: found.number,
                    organization: found.organization,
                },
                Some(Err(e)) => {
                    debug!("asn lookup: {e}");
                    AsnInfo::default()
                }
                None => AsnInfo::default(),
            };
            record.asn = Some(info);
        }

        record
    }

    /// Enrich every address, keeping input order.
    pub fn enrich_all<S: AsRef<str>>(&self, ips: &[S]) -> Vec<EnrichedRecord> {
        ips.iter().map(|ip| self.enrich(ip.as_ref())).collect()
    }
}
