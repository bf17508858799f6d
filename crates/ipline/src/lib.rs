//! Line-oriented IPv4 address recovery.
//!
//! `ipline` pulls at most one IPv4 address out of each line of text. Lines may be
//! URLs (`http://93.184.216.34:443/path`), `ip:port` pairs (`93.184.216.34:8080`)
//! or bare addresses (`93.184.216.34`). The first rule that succeeds wins:
//!
//! 1. the line has a network location (`scheme://netloc/...` or `//netloc/...`)
//!    and the netloc text before its first `:` starts with an IPv4 shape;
//! 2. the text before the first `:` of the line starts with an IPv4 shape;
//! 3. the whole trimmed line is an IPv4 shape.
//!
//! Matching is purely syntactic: four dot-separated groups of one to three ASCII
//! digits. Octet ranges, ports and leading zeros are not validated, so
//! `http://999.1.1.1:99999/` yields `999.1.1.1` and `010.0.0.1` stays as written.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ipline::Extractor;
//!
//! # fn main() -> Result<(), ipline::Error> {
//! let extractor = Extractor::new()?;
//!
//! assert_eq!(
//!     extractor.extract("http://93.184.216.34:443/path"),
//!     Some("93.184.216.34")
//! );
//! assert_eq!(extractor.extract("not an ip"), None);
//! # Ok(())
//! # }
//! ```
//!
//! ## Collecting
//!
//! [`Collector`] applies an extractor to many lines, keeps each address once and
//! hands them back in ascending string order:
//!
//! ```no_run
//! use ipline::{Collector, Extractor};
//!
//! # fn main() -> Result<(), ipline::Error> {
//! let extractor = Extractor::new()?;
//! let mut collector = Collector::new(&extractor);
//! collector.extend(["10.0.0.2:22", "10.0.0.10", "10.0.0.2"]);
//! assert_eq!(collector.into_sorted(), vec!["10.0.0.10", "10.0.0.2"]);
//! # Ok(())
//! # }
//! ```

use regex_automata::meta::Regex;
use regex_automata::{Anchored, Input};
use rustc_hash::FxHashSet;

/// Four dot-separated groups of one to three ASCII digits.
pub const IPV4_PATTERN: &str = r"(?:[0-9]{1,3}\.){3}[0-9]{1,3}";

/// Errors raised while building an [`Extractor`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The IPv4 pattern failed to compile.
    #[error("failed to build IPv4 pattern: {0}")]
    Pattern(#[from] regex_automata::meta::BuildError),
}

/// Recovers a single IPv4 address from one line of text.
#[derive(Clone, Debug)]
pub struct Extractor {
    regex: Regex,
}

impl Extractor {
    /// Compile the IPv4 pattern.
    pub fn new() -> Result<Self, Error> {
        let regex = Regex::new(IPV4_PATTERN)?;
        Ok(Self { regex })
    }

    /// Length of the IPv4 shape at the very start of `candidate`, if any.
    #[inline]
    fn prefix_len(&self, candidate: &str) -> Option<usize> {
        let input = Input::new(candidate).anchored(Anchored::Yes);
        self.regex.search(&input).map(|m| m.end())
    }

    /// True when `candidate` starts with an IPv4 shape. Trailing text is tolerated.
    #[inline]
    pub fn starts_with_ipv4(&self, candidate: &str) -> bool {
        self.prefix_len(candidate).is_some()
    }

    /// True when `candidate` is an IPv4 shape and nothing else.
    #[inline]
    pub fn is_ipv4(&self, candidate: &str) -> bool {
        self.prefix_len(candidate) == Some(candidate.len())
    }

    /// Extract the address candidate from `line`, or `None` when no rule applies.
    ///
    /// The result is always a slice of `line`.
    pub fn extract<'a>(&self, line: &'a str) -> Option<&'a str> {
        let line = line.trim();

        if let Some(netloc) = netloc(line) {
            let host = netloc.split(':').next().unwrap_or(netloc);
            if self.starts_with_ipv4(host) {
                return Some(host);
            }
        }

        if let Some((before_colon, _)) = line.split_once(':') {
            if self.starts_with_ipv4(before_colon) {
                return Some(before_colon);
            }
        }

        if self.is_ipv4(line) {
            return Some(line);
        }

        None
    }
}

/// True when `candidate` can be a URL scheme: a letter, then letters, digits,
/// `+`, `-` or `.`.
fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// The raw network location of `line`: the text after `scheme://` or a leading
/// `//`, up to the next `/`, `?` or `#`. Userinfo and port are left in place and
/// nothing is normalized.
fn netloc(line: &str) -> Option<&str> {
    let rest = match line.split_once(':') {
        Some((scheme, rest)) if is_scheme(scheme) => rest,
        _ => line,
    };
    let authority = rest.strip_prefix("//")?;
    let end = authority
        .find(['/', '?', '#'])
        .unwrap_or(authority.len());
    Some(&authority[..end]).filter(|n| !n.is_empty())
}

/// Deduplicates extracted addresses across many lines.
#[derive(Debug)]
pub struct Collector<'e> {
    extractor: &'e Extractor,
    seen: FxHashSet<String>,
    lines: usize,
}

impl<'e> Collector<'e> {
    /// Create an empty collector that extracts with `extractor`.
    pub fn new(extractor: &'e Extractor) -> Self {
        Self {
            extractor,
            seen: FxHashSet::default(),
            lines: 0,
        }
    }

    /// Feed one line. Returns `true` if it produced an address not seen before.
    pub fn push(&mut self, line: &str) -> bool {
        self.lines += 1;
        match self.extractor.extract(line) {
            Some(ip) if !self.seen.contains(ip) => {
                self.seen.insert(ip.to_string());
                true
            }
            _ => false,
        }
    }

    /// Feed every line of `lines`.
    pub fn extend<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.push(line.as_ref());
        }
    }

    /// Number of lines fed so far.
    pub fn lines_seen(&self) -> usize {
        self.lines
    }

    /// Number of unique addresses collected so far.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Consume the collector, returning unique addresses in ascending string order.
    pub fn into_sorted(self) -> Vec<String> {
        let mut ips: Vec<String> = self.seen.into_iter().collect();
        ips.sort_unstable();
        ips
    }
}

/// Extract, deduplicate and sort the addresses found in `lines`.
pub fn collect<I, S>(extractor: &Extractor, lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut collector = Collector::new(extractor);
    collector.extend(lines);
    collector.into_sorted()
}
