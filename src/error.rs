use std::net::SocketAddr;

use camino::Utf8PathBuf;

/// Error types for the ipfilter library.
///
/// Only input, configuration and output problems surface here. Per-address
/// lookup failures are [`crate::geoip::LookupError`] and never leave the enricher.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// MMDB database file was not found at the expected path.
    #[error("database not found: {path} (download it from MaxMind and place it there, or point -I/GEOIP_MMDB_DIR at its directory)")]
    DatabaseNotFound { path: Utf8PathBuf },

    /// MMDB database file exists but could not be opened.
    #[error("failed to open database {path}")]
    Database {
        path: Utf8PathBuf,
        #[source]
        source: maxminddb::MaxMindDbError,
    },

    /// Input file does not exist.
    #[error("input file '{path}' not found")]
    InputNotFound { path: Utf8PathBuf },

    /// Input or output file could not be accessed.
    #[error("permission denied when accessing '{path}'")]
    PermissionDenied { path: Utf8PathBuf },

    /// An output file could not be created or written.
    #[error("failed to write '{path}'")]
    Output {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The visualization server could not bind or failed while serving.
    #[error("visualization server failed on {addr}")]
    Serve {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The output mode and the destination disagree.
    #[error("invalid destination: {reason}")]
    Destination { reason: String },

    /// Page template string is malformed.
    #[error("invalid template: {reason}")]
    InvalidTemplate { reason: String },

    /// The address extractor could not be built.
    #[error(transparent)]
    Extractor(#[from] ipline::Error),

    /// A CSV encoding or write error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Map data could not be encoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify an I/O error raised while reading the input at `path`.
    pub fn input(err: std::io::Error, path: impl Into<Utf8PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::InputNotFound { path: path.into() },
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied { path: path.into() },
            _ => Error::Io(err),
        }
    }

    /// Classify an I/O error raised while writing the output at `path`.
    pub fn output(err: std::io::Error, path: impl Into<Utf8PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied { path: path.into() },
            _ => Error::Output {
                path: path.into(),
                source: err,
            },
        }
    }
}

/// Convenience type alias for Results using the library error.
pub type Result<T> = std::result::Result<T, Error>;
