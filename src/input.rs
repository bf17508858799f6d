use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

use bstr::ByteSlice;
use camino::Utf8PathBuf;
use ipline::{Collector, Extractor};

use crate::error::{Error, Result};

/// A source that can be either a file or stdin.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub enum FileOrStdin {
    /// Input from a file.
    File(Utf8PathBuf),
    /// Input from stdin.
    #[default]
    Stdin,
}

impl fmt::Display for FileOrStdin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOrStdin::File(path) => write!(f, "{}", path),
            FileOrStdin::Stdin => write!(f, "<stdin>"),
        }
    }
}

impl FileOrStdin {
    /// Create a new FileOrStdin from a path.
    ///
    /// If the path is "-", stdin is used.
    pub fn from_path(path: Utf8PathBuf) -> Self {
        if path.as_str() == "-" {
            FileOrStdin::Stdin
        } else {
            FileOrStdin::File(path)
        }
    }

    /// Open the input source as a reader.
    ///
    /// A missing or unreadable file is reported as an input error naming the path.
    pub fn reader(&self) -> Result<InputReader> {
        match self {
            FileOrStdin::File(path) => {
                let file = File::open(path).map_err(|e| Error::input(e, path.clone()))?;
                Ok(InputReader::File(BufReader::new(file)))
            }
            FileOrStdin::Stdin => Ok(InputReader::Stdin(BufReader::new(io::stdin()))),
        }
    }
}

/// A reader for input from either a file or stdin.
pub enum InputReader {
    /// A reader for a file.
    File(BufReader<File>),
    /// A reader for stdin.
    Stdin(BufReader<io::Stdin>),
}

impl InputReader {
    /// Process each byte line from the input, without its line terminator.
    ///
    /// The provided function is called for each line. If it returns `false`,
    /// processing stops.
    pub fn for_byte_line<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let mut buf = Vec::with_capacity(1024);
        loop {
            buf.clear();
            let n = match self {
                InputReader::File(ref mut rdr) => rdr.read_until(b'\n', &mut buf),
                InputReader::Stdin(ref mut rdr) => rdr.read_until(b'\n', &mut buf),
            }?;
            if n == 0 {
                break;
            }
            let content = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
            if !f(content) {
                break;
            }
        }
        Ok(())
    }
}

/// Unique addresses read from one input.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Collected {
    /// Lines read, including ones without an address.
    pub lines: usize,
    /// Unique addresses in ascending string order.
    pub ips: Vec<String>,
}

/// Read `source` line by line and collect its unique addresses.
///
/// Lines are decoded lossily, so stray non-UTF-8 bytes never abort a run.
pub fn read_addresses(source: &FileOrStdin, extractor: &Extractor) -> Result<Collected> {
    collect_addresses(source.reader()?, source, extractor)
}

/// Like [`read_addresses`], over a reader that was opened up front.
pub fn collect_addresses(
    mut reader: InputReader,
    source: &FileOrStdin,
    extractor: &Extractor,
) -> Result<Collected> {
    let mut collector = Collector::new(extractor);
    reader
        .for_byte_line(|line| {
            collector.push(&line.to_str_lossy());
            true
        })
        .map_err(|e| match (e, source) {
            (Error::Io(io), FileOrStdin::File(path)) => Error::input(io, path.clone()),
            (e, _) => e,
        })?;

    Ok(Collected {
        lines: collector.lines_seen(),
        ips: collector.into_sorted(),
    })
}
