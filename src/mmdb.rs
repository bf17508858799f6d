use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use maxminddb::{geoip2, Reader};

use crate::error::{Error, Result};
use crate::geoip::{parse_ip, AsnLookup, AsnRecord, CityLookup, CityRecord, LookupError};

pub const CITY_DB_FILENAME: &str = "GeoLite2-City.mmdb";
pub const ASN_DB_FILENAME: &str = "GeoLite2-ASN.mmdb";

/// Directories searched, in order, when no database directory is given.
///
/// The current directory comes first so a GeoLite2 download dropped next to the
/// input keeps working.
pub fn default_search_paths() -> Vec<Utf8PathBuf> {
    vec![
        Utf8PathBuf::from("."),
        Utf8PathBuf::from("/usr/share/GeoIP"),
        Utf8PathBuf::from("/opt/homebrew/var/GeoIP"),
        Utf8PathBuf::from("/var/lib/GeoIP"),
    ]
}

/// Pick the database directory: the explicit one if given, else the first search
/// path holding a City database, else the current directory.
pub fn resolve_db_dir(explicit: Option<&Utf8Path>) -> Utf8PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    resolve_from(default_search_paths())
}

fn resolve_from(candidates: Vec<Utf8PathBuf>) -> Utf8PathBuf {
    candidates
        .into_iter()
        .find(|dir| dir.join(CITY_DB_FILENAME).exists())
        .unwrap_or_else(|| Utf8PathBuf::from("."))
}

/// A single opened MaxMind database.
pub struct MaxMindReader {
    path: Utf8PathBuf,
    reader: Reader<Vec<u8>>,
}

impl std::fmt::Debug for MaxMindReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaxMindReader")
            .field("path", &self.path)
            .field("database_type", &self.reader.metadata.database_type)
            .finish()
    }
}

impl MaxMindReader {
    /// Open the database at `path`, reporting a missing file distinctly.
    pub fn open(path: &Utf8Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::DatabaseNotFound {
                path: path.to_path_buf(),
            });
        }
        let reader = Reader::open_readfile(path).map_err(|source| Error::Database {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            "opened {} ({}, built {})",
            path, reader.metadata.database_type, reader.metadata.build_epoch
        );
        Ok(Self {
            path: path.to_path_buf(),
            reader,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl CityLookup for MaxMindReader {
    fn lookup_city(&self, ip: &str) -> std::result::Result<CityRecord, LookupError> {
        let addr = parse_ip(ip)?;
        let db_err = |source| LookupError::Database {
            ip: ip.to_string(),
            source,
        };

        let found = self.reader.lookup(addr).map_err(db_err)?;
        if !found.has_data() {
            return Err(LookupError::NotFound { ip: ip.to_string() });
        }
        let record: geoip2::City = found
            .decode()
            .map_err(db_err)?
            .ok_or_else(|| LookupError::NotFound { ip: ip.to_string() })?;

        Ok(CityRecord {
            country_code: record.country.iso_code.map(str::to_string),
            country_name: record.country.names.english.map(str::to_string),
            city: record.city.names.english.map(str::to_string),
            latitude: record.location.latitude,
            longitude: record.location.longitude,
        })
    }
}

impl AsnLookup for MaxMindReader {
    fn lookup_asn(&self, ip: &str) -> std::result::Result<AsnRecord, LookupError> {
        let addr = parse_ip(ip)?;
        let db_err = |source| LookupError::Database {
            ip: ip.to_string(),
            source,
        };

        let found = self.reader.lookup(addr).map_err(db_err)?;
        if !found.has_data() {
            return Err(LookupError::NotFound { ip: ip.to_string() });
        }
        let record: geoip2::Asn = found
            .decode()
            .map_err(db_err)?
            .ok_or_else(|| LookupError::NotFound { ip: ip.to_string() })?;

        Ok(AsnRecord {
            number: record.autonomous_system_number,
            organization: record.autonomous_system_organization.map(str::to_string),
        })
    }
}

/// The City database and, when ASN fields are needed, the ASN database.
///
/// Both are opened together at the start of a run and closed when this value is
/// dropped, including on early return.
#[derive(Debug)]
pub struct GeoDatabases {
    pub city: MaxMindReader,
    pub asn: Option<MaxMindReader>,
}

impl GeoDatabases {
    /// Open the databases in `dir`.
    ///
    /// Presence of every required file is checked before anything is opened, so a
    /// missing ASN database is reported even when the City database is fine.
    pub fn open(dir: &Utf8Path, with_asn: bool) -> Result<Self> {
        let city_path = dir.join(CITY_DB_FILENAME);
        let asn_path = dir.join(ASN_DB_FILENAME);

        let mut required = vec![&city_path];
        if with_asn {
            required.push(&asn_path);
        }
        if let Some(missing) = required.into_iter().find(|p| !p.exists()) {
            return Err(Error::DatabaseNotFound {
                path: missing.clone(),
            });
        }

        let city = MaxMindReader::open(&city_path)?;
        let asn = if with_asn {
            Some(MaxMindReader::open(&asn_path)?)
        } else {
            None
        };
        Ok(Self { city, asn })
    }

    /// The ASN capability, if the ASN database was opened.
    pub fn asn_lookup(&self) -> Option<&dyn AsnLookup> {
        self.asn.as_ref().map(|r| r as &dyn AsnLookup)
    }
}

impl Drop for GeoDatabases {
    fn drop(&mut self) {
        debug!("closing {}", self.city.path());
        if let Some(asn) = &self.asn {
            debug!("closing {}", asn.path());
        }
    }
}
