//! Writing results to disk.

use std::fs::File;
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use log::info;

use crate::error::{Error, Result};
use crate::output::{split_path, CountryGroup, RowSet};

/// A file written by one of the writers below.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Written {
    pub path: Utf8PathBuf,
    /// Records written, excluding any header.
    pub records: usize,
}

fn create(path: &Utf8Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| Error::output(e, path))?;
    Ok(BufWriter::new(file))
}

/// One address per line.
pub fn write_plain(ips: &[&str], path: &Utf8Path) -> Result<Written> {
    let mut out = create(path)?;
    for ip in ips {
        writeln!(out, "{ip}").map_err(|e| Error::output(e, path))?;
    }
    out.flush().map_err(|e| Error::output(e, path))?;

    info!("Wrote {} IPs to {}", ips.len(), path);
    Ok(Written {
        path: path.to_owned(),
        records: ips.len(),
    })
}

/// A CSV file with a header row. An empty row set still gets its header.
pub fn write_rows(rows: &RowSet<'_>, path: &Utf8Path) -> Result<Written> {
    let mut writer = csv::Writer::from_writer(create(path)?);
    writer.write_record(&rows.header)?;
    for row in &rows.rows {
        writer.write_record(row.values())?;
    }
    writer.flush().map_err(|e| Error::output(e, path))?;

    info!("Wrote {} records to {}", rows.len(), path);
    Ok(Written {
        path: path.to_owned(),
        records: rows.len(),
    })
}

/// One CSV file per country, named after `base` with the code appended.
pub fn write_split(groups: &[CountryGroup<'_>], base: &Utf8Path) -> Result<Vec<Written>> {
    groups
        .iter()
        .map(|group| write_rows(&group.rows, &split_path(base, &group.code)))
        .collect()
}
