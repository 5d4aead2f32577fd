use clap::Parser;
use filmmap_core::Provider;
use std::path::PathBuf;

/// Plot IMDb filming locations for a year or a decade on an interactive map
#[derive(Parser, Debug)]
#[command(name = "filmmap")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Geocodes a locations.list file and maps the films of a year", long_about = None)]
pub struct Args {
    /// Listing file to read (asked for interactively when omitted)
    #[arg(value_name = "LISTING")]
    pub listing: Option<PathBuf>,

    /// Year of the films to show (asked for interactively when omitted)
    #[arg(short = 'y', long = "year", value_parser = parse_year_arg, conflicts_with = "decade")]
    pub year: Option<u16>,

    /// Show a decade instead of a year: 0 is 1951-1959, 6 is 2011-2019
    #[arg(short = 'd', long = "decade")]
    pub decade: Option<u16>,

    /// Home address to mark on the map; empty for none
    #[arg(long = "home")]
    pub home: Option<String>,

    /// Cache file holding the geocoded records
    #[arg(long = "cache", default_value = "film_data.csv")]
    pub cache: PathBuf,

    /// Map document to write
    #[arg(short = 'o', long = "output", default_value = "result_film_map.html")]
    pub output: PathBuf,

    /// GeoJSON file for the population overlay
    #[arg(long = "world", default_value = "world.json")]
    pub world: PathBuf,

    /// Geocoding service: arcgis or nominatim
    #[arg(long = "geocoder", default_value = "arcgis")]
    pub geocoder: Provider,

    /// Attempts per address when the geocoder times out
    #[arg(long = "max-retries", default_value_t = 5)]
    pub max_retries: u32,

    /// Geocoding request timeout in seconds
    #[arg(long = "timeout", default_value_t = 10)]
    pub timeout: u64,

    /// Fail on invalid UTF-8 in the listing instead of dropping the bytes
    #[arg(long = "strict-encoding")]
    pub strict_encoding: bool,

    /// Skip lines that cannot be parsed or geocoded instead of aborting
    #[arg(long = "skip-bad-records")]
    pub skip_bad_records: bool,

    /// Rebuild the cache when the listing file is newer than it
    #[arg(long = "refresh-if-stale")]
    pub refresh_if_stale: bool,

    /// Parse and geocode without writing the cache file
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

fn parse_year_arg(s: &str) -> Result<u16, String> {
    crate::prompt::parse_year(s)
}

/// Parses command-line arguments
pub fn parse_args() -> Args {
    Args::parse()
}
