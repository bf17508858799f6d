//! The ipfilter library: geolocate, filter and export IPv4 addresses found in
//! log-like text.
//!
//! A run collects unique addresses with [`ipline`], enriches each one through
//! the [`CityLookup`] and [`AsnLookup`] capabilities, keeps the countries the
//! [`CountryFilter`] accepts and routes the result to plain text, CSV, one CSV
//! per country, or an interactive map.
//!
//! # Examples
//!
//! ```rust,no_run
//! use camino::Utf8Path;
//! use ipfilter::{mmdb, pipeline, CountryFilter, FieldGroups, OutputConfig};
//! use ipline::{collect, Extractor};
//!
//! let extractor = Extractor::new()?;
//! let ips = collect(&extractor, ["http://93.184.216.34:443/path", "8.8.8.8"]);
//!
//! let config = OutputConfig {
//!     fields: FieldGroups { country: true, asn: false },
//!     countries: CountryFilter::parse("us"),
//!     ..OutputConfig::default()
//! };
//! let dbs = mmdb::GeoDatabases::open(&mmdb::resolve_db_dir(None), config.needs_asn())?;
//! let summary = pipeline::run(
//!     &ips,
//!     &dbs.city,
//!     dbs.asn_lookup(),
//!     &config,
//!     pipeline::Destination::Files(Utf8Path::new("us.csv")),
//! )?;
//! println!("kept {} of {}", summary.kept, summary.unique);
//! # Ok::<(), ipfilter::Error>(())
//! ```

pub mod error;
pub mod files;
pub mod filter;
pub mod geoip;
pub mod input;
pub mod mmdb;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod template;
pub mod visualize;

pub use crate::error::{Error, Result};
pub use crate::filter::{CountryCode, CountryFilter};
pub use crate::geoip::{AsnLookup, AsnRecord, CityLookup, CityRecord, LookupError};
pub use crate::output::{FieldGroups, OutputConfig, Route, RowShape};
pub use crate::record::{AsnInfo, EnrichedRecord, Enricher};
