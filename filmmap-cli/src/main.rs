use anyhow::{Context, Result};
use filmmap_core::{
    CacheFreshness, DecodePolicy, GeocoderConfig, HttpGeocoder, MapOptions, PipelineOptions,
    RecordErrorPolicy, Resolver, RetryPolicy,
};
use std::io;
use std::time::Duration;

mod cli;
mod prompt;

fn main() -> Result<()> {
    let args = cli::parse_args();

    // Initialize logger with appropriate level based on verbose flag
    if std::env::var("RUST_LOG").is_err() {
        if args.verbose {
            std::env::set_var("RUST_LOG", "debug");
        } else {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();

    let request = {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        prompt::complete_request(&args, &mut input, &mut output)?
    };

    if args.dry_run {
        log::info!("Running in DRY-RUN mode - the cache file will not be written");
    }

    let geocoder = HttpGeocoder::new(GeocoderConfig {
        provider: args.geocoder,
        timeout: Duration::from_secs(args.timeout),
        ..Default::default()
    })
    .context("Failed to set up the geocoding client")?;
    let retry = RetryPolicy {
        max_attempts: args.max_retries,
        ..Default::default()
    };
    let mut resolver = Resolver::new(geocoder, retry);

    let options = PipelineOptions {
        decode: if args.strict_encoding {
            DecodePolicy::Fail
        } else {
            DecodePolicy::Skip
        },
        freshness: if args.refresh_if_stale {
            CacheFreshness::NewerThanListing
        } else {
            CacheFreshness::Exists
        },
        on_record_error: if args.skip_bad_records {
            RecordErrorPolicy::Skip
        } else {
            RecordErrorPolicy::Fail
        },
        dry_run: args.dry_run,
        verbose: args.verbose,
    };

    filmmap_core::ensure_cache(&request.listing, &args.cache, &mut resolver, &options)?;

    if args.dry_run && !args.cache.is_file() {
        log::info!("[DRY RUN] No cache file to select from, not drawing a map");
        return Ok(());
    }

    let records = filmmap_core::select_from_cache(&args.cache, request.selection)
        .with_context(|| format!("Failed to read {}", args.cache.display()))?;

    let home = match &request.home_address {
        Some(address) => match resolver.resolve(address) {
            Ok(coords) => Some(coords),
            Err(e) => {
                log::warn!("Could not place home marker: {}", e);
                None
            }
        },
        None => None,
    };

    let map_options = MapOptions {
        layer_name: format!("Films_{}", request.selection),
        home,
        population_overlay: Some(args.world.clone()),
        ..Default::default()
    };
    filmmap_core::write_map(&args.output, &records, &map_options)?;

    println!("Done");
    println!(
        "Your map is in {}. Keep {} next to it to make the next run faster.",
        args.output.display(),
        args.cache.display()
    );

    Ok(())
}
