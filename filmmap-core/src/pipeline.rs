use crate::aggregator::LocationIndex;
use crate::cache::{CacheWriter, FilmRecord};
use crate::geocoding::Geocoder;
use crate::listing::{self, DecodePolicy};
use crate::resolver::{ResolveError, Resolver};
use anyhow::{Context, Result};
use log::Level;
use std::fs;
use std::path::Path;

/// When an existing cache file may be reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheFreshness {
    /// Any existing cache file is reused
    #[default]
    Exists,
    /// The cache is rebuilt when the listing was modified after it
    NewerThanListing,
}

/// What to do with a line that cannot be parsed or geocoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordErrorPolicy {
    #[default]
    Fail,
    Skip,
}

/// Configuration options for a conversion run
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub decode: DecodePolicy,
    pub freshness: CacheFreshness,
    pub on_record_error: RecordErrorPolicy,
    /// Parse, geocode and aggregate without writing the cache
    pub dry_run: bool,
    /// Log every resolved row at info level instead of debug
    pub verbose: bool,
}

/// Outcome of converting a listing file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionSummary {
    pub rows: usize,
    pub locations: usize,
    pub skipped: usize,
}

/// Converts a listing file into the cache file, one row per usable line
pub fn convert_listing<G: Geocoder>(
    listing_path: &Path,
    cache_path: &Path,
    resolver: &mut Resolver<G>,
    options: &PipelineOptions,
) -> Result<ConversionSummary> {
    log::info!(
        "Converting {} into {}{}",
        listing_path.display(),
        cache_path.display(),
        if options.dry_run { " [DRY RUN]" } else { "" }
    );

    let lines = listing::read_listing(listing_path, options.decode)?;
    log::info!("Found {} listing lines to process", lines.len());

    let mut writer = if options.dry_run {
        None
    } else {
        Some(
            CacheWriter::create(cache_path)
                .with_context(|| format!("Failed to create {}", cache_path.display()))?,
        )
    };

    let row_level = if options.verbose {
        Level::Info
    } else {
        Level::Debug
    };

    let mut index = LocationIndex::new();
    let mut rows = 0;
    let mut skipped = 0;

    for raw in &lines {
        let entry = match listing::parse_line(raw) {
            Ok(entry) => entry,
            Err(e) => {
                handle_record_error(options.on_record_error, e.into())?;
                skipped += 1;
                continue;
            }
        };

        let coords = match resolver.resolve(&entry.address) {
            Ok(coords) => coords,
            Err(e @ ResolveError::Unresolvable { .. }) => {
                let err = anyhow::Error::new(e).context(format!("line {}", entry.line));
                handle_record_error(options.on_record_error, err)?;
                skipped += 1;
                continue;
            }
            // A failing provider would fail every line after this one too
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("line {}", entry.line)));
            }
        };

        let label = index.merge(coords, &entry.title).to_string();
        let record = FilmRecord::new(entry.year, label, coords);
        log::log!(
            row_level,
            "{} | {} | {} -> {}",
            record.year,
            entry.title,
            entry.address,
            coords
        );

        if let Some(writer) = writer.as_mut() {
            writer.write(&record)?;
        }
        rows += 1;
    }

    if let Some(writer) = writer {
        writer
            .finish()
            .with_context(|| format!("Failed to commit {}", cache_path.display()))?;
    }

    let summary = ConversionSummary {
        rows,
        locations: index.len(),
        skipped,
    };
    log::info!(
        "Converted {} rows at {} distinct locations ({} skipped)",
        summary.rows,
        summary.locations,
        summary.skipped
    );
    Ok(summary)
}

fn handle_record_error(policy: RecordErrorPolicy, err: anyhow::Error) -> Result<()> {
    match policy {
        RecordErrorPolicy::Fail => Err(err),
        RecordErrorPolicy::Skip => {
            log::warn!("Skipping record: {:#}", err);
            Ok(())
        }
    }
}

/// Whether the cache file can be reused under the given policy
pub fn cache_is_fresh(
    listing_path: &Path,
    cache_path: &Path,
    freshness: CacheFreshness,
) -> Result<bool> {
    if !cache_path.is_file() {
        return Ok(false);
    }

    match freshness {
        CacheFreshness::Exists => Ok(true),
        CacheFreshness::NewerThanListing => {
            let cache_modified = fs::metadata(cache_path)?.modified()?;
            let listing_modified = fs::metadata(listing_path)
                .with_context(|| format!("Failed to stat {}", listing_path.display()))?
                .modified()?;
            Ok(listing_modified <= cache_modified)
        }
    }
}

/// Builds the cache unless a reusable one exists. Returns `None` when the
/// existing cache was kept.
pub fn ensure_cache<G: Geocoder>(
    listing_path: &Path,
    cache_path: &Path,
    resolver: &mut Resolver<G>,
    options: &PipelineOptions,
) -> Result<Option<ConversionSummary>> {
    if cache_is_fresh(listing_path, cache_path, options.freshness)? {
        log::info!("Reusing cached records from {}", cache_path.display());
        return Ok(None);
    }

    convert_listing(listing_path, cache_path, resolver, options).map(Some)
}
