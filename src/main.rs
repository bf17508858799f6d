use anyhow::{Context, Error, Result};
use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::info;
use std::io::{self, IsTerminal, Write};
use std::net::{Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use ipfilter::input::{collect_addresses, FileOrStdin};
use ipfilter::pipeline::{self, Destination};
use ipfilter::{mmdb, visualize, CountryFilter, FieldGroups, OutputConfig};
use ipline::Extractor;

/// Check if the error chain contains a broken pipe error.
#[inline(always)]
fn is_broken_pipe(err: &Error) -> bool {
    for cause in err.chain() {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::BrokenPipe {
                return true;
            }
        }
    }
    false
}

/// Geolocate, filter and export the IPv4 addresses found in a text file
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Input file with one IP, ip:port or URL per line. Use "-" to read from stdin
    #[clap(short, long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Output file. With --split, the country code is appended to its name
    #[clap(
        short,
        long,
        value_name = "FILE",
        value_hint = clap::ValueHint::FilePath,
        required_unless_present = "live"
    )]
    output: Option<Utf8PathBuf>,

    /// Comma-separated country codes to keep, e.g. "us,de,unknown"
    #[clap(short, long, value_name = "CODES")]
    filter: Option<String>,

    /// Write CSV with the ip, country_code, country_name, city, latitude and
    /// longitude columns (same as --country)
    #[clap(short, long)]
    csv: bool,

    /// Include country_code, country_name, city, latitude and longitude columns
    #[clap(long)]
    country: bool,

    /// Include asn and asn_description columns (requires GeoLite2-ASN.mmdb)
    #[clap(long)]
    asn: bool,

    /// Write one CSV file per country code
    #[clap(short, long)]
    split: bool,

    /// Serve an interactive map instead of writing files. The map URL is logged;
    /// open it in a browser yourself
    #[clap(short, long, conflicts_with_all = &["output", "split", "csv"])]
    live: bool,

    /// Port for the map server, bound on localhost
    #[clap(long, value_name = "PORT", default_value_t = visualize::DEFAULT_PORT)]
    port: u16,

    /// Directory containing GeoLite2-City.mmdb and GeoLite2-ASN.mmdb
    #[clap(
        short = 'I',
        long,
        value_name = "DIR",
        value_hint = clap::ValueHint::DirPath,
        env = "GEOIP_MMDB_DIR"
    )]
    mmdb_dir: Option<Utf8PathBuf>,

    /// Colorize the banner
    #[clap(short = 'C', long, value_enum, default_value_t = ArgsColorChoice::Auto)]
    color: ArgsColorChoice,

    /// Do not print the banner
    #[clap(long)]
    no_banner: bool,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum ArgsColorChoice {
    Always,
    Never,
    Auto,
}

impl Args {
    fn output_config(&self) -> OutputConfig {
        OutputConfig {
            fields: FieldGroups {
                country: self.csv || self.country,
                asn: self.asn,
            },
            csv: self.csv,
            split: self.split,
            visualize: self.live,
            countries: self
                .filter
                .as_deref()
                .map(CountryFilter::parse)
                .unwrap_or_default(),
        }
    }
}

fn main() -> ExitCode {
    let err = match run_main() {
        Ok(code) => return code,
        Err(err) => err,
    };

    if is_broken_pipe(&err) {
        return ExitCode::SUCCESS;
    }

    // Print detailed error information based on environment variables
    let mut stderr = io::stderr();
    let _ = if std::env::var("RUST_BACKTRACE").is_ok_and(|v| v == "1")
        && std::env::var("RUST_LIB_BACKTRACE").map_or(true, |v| v == "1")
    {
        writeln!(stderr, "Error: {:?}", err)
    } else {
        writeln!(stderr, "Error: {:#}", err)
    };

    ExitCode::FAILURE
}

fn run_main() -> Result<ExitCode> {
    let args = Args::parse();

    stderrlog::new()
        .module(module_path!())
        .module("ipline")
        .verbosity(args.verbose.log_level_filter())
        .init()
        .context("failed to initialize logging")?;

    // auto only colors when stderr is a terminal, since that is where
    // the banner goes
    let colormode = match args.color {
        ArgsColorChoice::Auto => {
            if io::stderr().is_terminal() {
                ColorChoice::Always
            } else {
                ColorChoice::Never
            }
        }
        ArgsColorChoice::Always => ColorChoice::Always,
        ArgsColorChoice::Never => ColorChoice::Never,
    };

    if !args.no_banner {
        print_banner(colormode)?;
    }

    run(args)?;

    Ok(ExitCode::SUCCESS)
}

fn print_banner(colormode: ColorChoice) -> Result<()> {
    let mut err = StandardStream::stderr(colormode);
    err.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(err, "ipfilter")?;
    err.reset()?;
    writeln!(
        err,
        " {} - IP geolocation filter",
        env!("CARGO_PKG_VERSION")
    )?;
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let config = args.output_config();

    // Both the input and the databases must be available before any line is read
    let source = FileOrStdin::from_path(args.input.clone());
    let reader = source.reader()?;

    let db_dir = mmdb::resolve_db_dir(args.mmdb_dir.as_deref());
    info!("Using MMDB directory {}", db_dir);
    let dbs = mmdb::GeoDatabases::open(&db_dir, config.needs_asn())?;

    let extractor = Extractor::new()?;
    let collected = collect_addresses(reader, &source, &extractor)?;
    info!(
        "Read {} lines from {}, found {} unique IP addresses",
        collected.lines,
        source,
        collected.ips.len()
    );

    let destination = match &args.output {
        Some(path) if !args.live => Destination::Files(path),
        _ => Destination::Live(SocketAddr::from((Ipv4Addr::LOCALHOST, args.port))),
    };

    let summary = pipeline::run(
        &collected.ips,
        &dbs.city,
        dbs.asn_lookup(),
        &config,
        destination,
    )
    .with_context(|| format!("failed to process {}", source))?;

    for written in &summary.written {
        info!("{}: {} records", written.path, written.records);
    }

    let mut stderr = io::stderr();
    writeln!(
        stderr,
        "Successfully processed {} IP addresses.",
        summary.kept
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(args: &[&str]) -> OutputConfig {
        let argv = ["ipfilter", "-i", "in.txt", "-o", "out.csv"]
            .into_iter()
            .chain(args.iter().copied());
        Args::try_parse_from(argv).unwrap().output_config()
    }

    #[test]
    fn csv_flag_selects_country_columns() {
        let config = config_for(&["-c"]);
        assert!(config.is_structured());
        assert_eq!(
            config.fields,
            FieldGroups {
                country: true,
                asn: false,
            }
        );
        assert_eq!(
            ipfilter::RowShape::new(config.fields).header(),
            vec!["ip", "country_code", "country_name", "city", "latitude", "longitude"]
        );
    }

    #[test]
    fn no_flags_is_plain_text() {
        let config = config_for(&[]);
        assert!(!config.is_structured());
        assert!(!config.needs_asn());
    }

    #[test]
    fn filter_and_asn_flags() {
        let config = config_for(&["--asn", "-f", "HK,sg"]);
        assert_eq!(config.fields, FieldGroups { country: false, asn: true });
        assert!(config.needs_asn());
        assert_eq!(config.countries.len(), 2);
    }

    #[test]
    fn live_help_says_to_open_the_url() {
        use clap::CommandFactory;
        let help = Args::command().render_long_help().to_string();
        assert!(help.contains("browser"), "{help}");
    }
}
