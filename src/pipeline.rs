//! One run: enrich the collected addresses, filter them, and emit the result.

use std::net::SocketAddr;

use camino::Utf8Path;
use log::{info, warn};

use crate::error::{Error, Result};
use crate::files::{self, Written};
use crate::geoip::{AsnLookup, CityLookup};
use crate::output::{route, OutputConfig, Route};
use crate::record::{EnrichedRecord, Enricher};
use crate::visualize;

/// Where a run sends its result.
#[derive(Clone, Copy, Debug)]
pub enum Destination<'p> {
    /// Write files at (or derived from) this path.
    Files(&'p Utf8Path),
    /// Serve the map on this address.
    Live(SocketAddr),
}

/// Counts reported at the end of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub unique: usize,
    pub kept: usize,
    pub written: Vec<Written>,
}

/// Enrich `ips` in order and apply the country filter from `config`.
pub fn enrich_and_filter<S: AsRef<str>>(
    ips: &[S],
    city: &dyn CityLookup,
    asn: Option<&dyn AsnLookup>,
    config: &OutputConfig,
) -> Vec<EnrichedRecord> {
    let mut enricher = Enricher::new(city);
    if config.needs_asn() {
        enricher = enricher.with_asn(asn);
    }
    let records = enricher.enrich_all(ips);
    info!("Enriched {} IP addresses", records.len());

    if config.countries.is_empty() {
        return records;
    }
    let kept = config.countries.apply(records);
    info!(
        "{} IP addresses match the country filter ({} codes)",
        kept.len(),
        config.countries.len()
    );
    kept
}

/// Emit `records` as `config` dictates.
///
/// Live mode blocks until the map server stops and writes nothing.
pub fn emit(
    records: &[EnrichedRecord],
    config: &OutputConfig,
    destination: Destination<'_>,
) -> Result<Vec<Written>> {
    if records.is_empty() {
        warn!("No IP addresses left to output");
    }

    match (route(records, config), destination) {
        (Route::Visualize(records), Destination::Live(addr)) => {
            visualize::serve(records, addr)?;
            Ok(Vec::new())
        }
        (Route::Visualize(_), Destination::Files(_)) => Err(Error::Destination {
            reason: "the map needs a listen address, not an output file".to_string(),
        }),
        (_, Destination::Live(_)) => Err(Error::Destination {
            reason: "file output needs an output path".to_string(),
        }),
        (Route::Plain(ips), Destination::Files(path)) => Ok(vec![files::write_plain(&ips, path)?]),
        (Route::Single(rows), Destination::Files(path)) => Ok(vec![files::write_rows(&rows, path)?]),
        (Route::Split(groups), Destination::Files(base)) => {
            info!("Splitting output across {} countries", groups.len());
            files::write_split(&groups, base)
        }
    }
}

/// Run the whole pipeline over already collected addresses.
pub fn run<S: AsRef<str>>(
    ips: &[S],
    city: &dyn CityLookup,
    asn: Option<&dyn AsnLookup>,
    config: &OutputConfig,
    destination: Destination<'_>,
) -> Result<RunSummary> {
    let records = enrich_and_filter(ips, city, asn, config);
    let written = emit(&records, config, destination)?;
    Ok(RunSummary {
        unique: ips.len(),
        kept: records.len(),
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CountryFilter;
    use crate::geoip::{AsnRecord, CityRecord, LookupError};

    struct ByPrefix;

    impl CityLookup for ByPrefix {
        fn lookup_city(&self, ip: &str) -> std::result::Result<CityRecord, LookupError> {
            let code = match ip.split('.').next() {
                Some("1") => "HK",
                Some("2") => "SG",
                Some("3") => "US",
                _ => return Err(LookupError::NotFound { ip: ip.to_string() }),
            };
            Ok(CityRecord {
                country_code: Some(code.to_string()),
                ..CityRecord::default()
            })
        }
    }

    impl AsnLookup for ByPrefix {
        fn lookup_asn(&self, _ip: &str) -> std::result::Result<AsnRecord, LookupError> {
            Ok(AsnRecord {
                number: Some(64500),
                organization: Some("EXAMPLE".to_string()),
            })
        }
    }

    #[test]
    fn asn_only_enriched_when_needed() {
        let config = OutputConfig::default();
        let records = enrich_and_filter(&["1.1.1.1"], &ByPrefix, Some(&ByPrefix), &config);
        assert_eq!(records[0].asn, None);

        let config = OutputConfig {
            visualize: true,
            ..OutputConfig::default()
        };
        let records = enrich_and_filter(&["1.1.1.1"], &ByPrefix, Some(&ByPrefix), &config);
        assert!(records[0].asn.as_ref().is_some_and(|a| a.is_known()));
    }

    #[test]
    fn filter_applies_after_enrichment() {
        let config = OutputConfig {
            countries: CountryFilter::parse("hk,unknown"),
            ..OutputConfig::default()
        };
        let ips = ["1.0.0.1", "2.0.0.1", "3.0.0.1", "9.0.0.1"];
        let records = enrich_and_filter(&ips, &ByPrefix, None, &config);
        let kept: Vec<&str> = records.iter().map(|r| r.ip.as_str()).collect();
        assert_eq!(kept, vec!["1.0.0.1", "9.0.0.1"]);
    }

    #[test]
    fn mismatched_destination_is_an_error() {
        let config = OutputConfig {
            visualize: true,
            ..OutputConfig::default()
        };
        let err = emit(&[], &config, Destination::Files(Utf8Path::new("out.txt"))).unwrap_err();
        assert!(matches!(err, Error::Destination { .. }));

        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let err = emit(&[], &OutputConfig::default(), Destination::Live(addr)).unwrap_err();
        assert!(matches!(err, Error::Destination { .. }));
    }
}
