use crate::geocoding::Coordinates;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Header row of the cache file. "Lattitude" is part of the file format.
pub const CACHE_HEADER: [&str; 4] = ["Year", "Titles", "Lattitude", "Longitude"];

/// Year value stored for titles without a known release year
pub const UNKNOWN_YEAR: u16 = 0;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One row of the cache file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmRecord {
    #[serde(rename = "Year")]
    pub year: u16,
    /// HTML-escaped label, possibly several titles joined with `<br>`
    #[serde(rename = "Titles")]
    pub title: String,
    #[serde(rename = "Lattitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
}

impl FilmRecord {
    pub fn new(year: Option<u16>, title: String, coords: Coordinates) -> Self {
        Self {
            year: year.unwrap_or(UNKNOWN_YEAR),
            title,
            latitude: coords.latitude,
            longitude: coords.longitude,
        }
    }
}

/// Writes cache rows to `<name>.partial` and moves the file into place on
/// [`CacheWriter::finish`]. Dropping an unfinished writer deletes the
/// partial file.
pub struct CacheWriter {
    writer: Option<csv::Writer<File>>,
    partial_path: PathBuf,
    final_path: PathBuf,
    rows: usize,
}

impl CacheWriter {
    pub fn create(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let partial_path = partial_path(path);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&partial_path)?;
        writer.write_record(CACHE_HEADER)?;
        writer.flush()?;

        Ok(Self {
            writer: Some(writer),
            partial_path,
            final_path: path.to_path_buf(),
            rows: 0,
        })
    }

    pub fn write(&mut self, record: &FilmRecord) -> Result<(), CacheError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.serialize(record)?;
            writer.flush()?;
            self.rows += 1;
        }
        Ok(())
    }

    /// Flushes the remaining rows and replaces the cache file
    pub fn finish(mut self) -> Result<usize, CacheError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        fs::rename(&self.partial_path, &self.final_path)?;
        log::debug!(
            "Committed {} rows to {}",
            self.rows,
            self.final_path.display()
        );
        Ok(self.rows)
    }
}

impl Drop for CacheWriter {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            if let Err(e) = fs::remove_file(&self.partial_path) {
                log::warn!(
                    "Failed to remove {}: {}",
                    self.partial_path.display(),
                    e
                );
            }
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("cache"));
    name.push(".partial");
    path.with_file_name(name)
}

/// Loads every row of a cache file
pub fn read_records(path: &Path) -> Result<Vec<FilmRecord>, CacheError> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader
        .deserialize()
        .collect::<Result<Vec<FilmRecord>, csv::Error>>()?;
    Ok(records)
}
