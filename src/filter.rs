//! Country-code filtering.

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashSet;

use crate::record::{EnrichedRecord, UNKNOWN_CODE};

/// A country code as accepted by the filter.
///
/// The literal token `unknown` selects records whose country did not resolve.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CountryCode {
    Known(String),
    Unresolved,
}

impl CountryCode {
    /// The code a record carries.
    pub fn of(record: &EnrichedRecord) -> Self {
        match &record.country_code {
            Some(code) => CountryCode::Known(code.to_lowercase()),
            None => CountryCode::Unresolved,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CountryCode::Known(code) => code,
            CountryCode::Unresolved => UNKNOWN_CODE,
        }
    }
}

impl FromStr for CountryCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_lowercase();
        if code == UNKNOWN_CODE {
            Ok(CountryCode::Unresolved)
        } else {
            Ok(CountryCode::Known(code))
        }
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of accepted country codes. Empty means "accept everything".
#[derive(Clone, Debug, Default)]
pub struct CountryFilter {
    accepted: FxHashSet<CountryCode>,
}

impl CountryFilter {
    /// Parse a comma-separated list such as `"hk, SG,us"`. Blank entries are ignored.
    pub fn parse(list: &str) -> Self {
        list.split(',').filter(|s| !s.trim().is_empty()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn accepts(&self, record: &EnrichedRecord) -> bool {
        self.accepted.is_empty() || self.accepted.contains(&CountryCode::of(record))
    }

    /// Keep the accepted records, preserving order.
    pub fn apply(&self, records: Vec<EnrichedRecord>) -> Vec<EnrichedRecord> {
        if self.accepted.is_empty() {
            return records;
        }
        records.into_iter().filter(|r| self.accepts(r)).collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for CountryFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let accepted = iter
            .into_iter()
            .filter_map(|s| s.as_ref().parse::<CountryCode>().ok())
            .collect();
        Self { accepted }
    }
}
