use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Line that precedes the data section of a listing file
pub const HEADER_MARKER: &str = "LOCATIONS";

/// Trailer lines at the end of the data section, always dropped
const FOOTER_LINES: usize = 3;

lazy_static! {
    static ref YEAR_RE: Regex = Regex::new(r"\(([0-9]{4})\)").unwrap();
    static ref UNKNOWN_YEAR_RE: Regex = Regex::new(r"\(\?{4}\)").unwrap();
    // Greedy on purpose: "Studio (stage 4) (interior)" loses everything from the first "("
    static ref ANNOTATION_RE: Regex = Regex::new(r"\(.+\)").unwrap();
}

/// What to do with bytes that are not valid UTF-8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Drop invalid byte sequences and keep going
    #[default]
    Skip,
    /// Abort on the first invalid byte sequence
    Fail,
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("failed to read listing file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("listing file is not valid UTF-8 (first bad byte at offset {offset})")]
    Decode { offset: usize },
    #[error("line {line}: expected a title and a location, found {fields} field(s)")]
    MalformedLine { line: usize, fields: usize },
}

/// One tab-split line of the data section with empty fields removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 1-based line number in the listing file
    pub number: usize,
    pub fields: Vec<String>,
}

/// A parsed listing line, ready for geocoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub line: usize,
    /// HTML-escaped title with the year and quotes removed
    pub title: String,
    pub year: Option<u16>,
    /// Location with its parenthetical annotation stripped
    pub address: String,
}

/// Reads the data section of a listing file
pub fn read_listing(path: &Path, policy: DecodePolicy) -> Result<Vec<RawLine>, ListingError> {
    let bytes = fs::read(path).map_err(|source| ListingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = decode(&bytes, policy)?;
    let lines = data_lines(&text);

    log::debug!(
        "Read {} data lines from {}",
        lines.len(),
        path.display()
    );
    Ok(lines)
}

fn decode(bytes: &[u8], policy: DecodePolicy) -> Result<String, ListingError> {
    match policy {
        DecodePolicy::Fail => std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| ListingError::Decode {
                offset: e.valid_up_to(),
            }),
        DecodePolicy::Skip => {
            let mut text = String::with_capacity(bytes.len());
            let mut dropped = 0;
            for chunk in bytes.utf8_chunks() {
                text.push_str(chunk.valid());
                dropped += chunk.invalid().len();
            }
            if dropped > 0 {
                log::debug!("Dropped {} invalid UTF-8 bytes", dropped);
            }
            Ok(text)
        }
    }
}

/// Splits the text after the header marker into tab-delimited lines
pub fn data_lines(text: &str) -> Vec<RawLine> {
    let mut lines = text.lines().enumerate();

    if !lines.by_ref().any(|(_, line)| line.starts_with(HEADER_MARKER)) {
        log::warn!("No {} header found, listing has no data", HEADER_MARKER);
        return Vec::new();
    }
    // Underline below the marker
    lines.next();

    let mut raw: Vec<RawLine> = lines
        .map(|(idx, line)| RawLine {
            number: idx + 1,
            fields: line
                .split('\t')
                .filter(|field| !field.is_empty())
                .map(str::to_string)
                .collect(),
        })
        .collect();

    raw.truncate(raw.len().saturating_sub(FOOTER_LINES));
    raw.retain(|line| !line.fields.is_empty());
    raw
}

/// Parses the title and location fields of one line
pub fn parse_line(raw: &RawLine) -> Result<ListingEntry, ListingError> {
    let (title_field, location_field) = match raw.fields.as_slice() {
        [title, location, ..] => (title, location),
        fields => {
            return Err(ListingError::MalformedLine {
                line: raw.number,
                fields: fields.len(),
            })
        }
    };

    let year = YEAR_RE
        .captures(title_field)
        .and_then(|caps| caps[1].parse::<u16>().ok());

    let title = YEAR_RE.replace_all(title_field, "");
    let title = UNKNOWN_YEAR_RE.replace_all(&title, "").replace('"', "");
    let title = escape_html(title.trim());

    let address = ANNOTATION_RE
        .replace_all(location_field, "")
        .trim()
        .to_string();

    Ok(ListingEntry {
        line: raw.number,
        title,
        year,
        address,
    })
}

/// Escapes text for use inside HTML markup and attribute values
pub fn escape_html(text: &str) -> String {
    askama::MarkupDisplay::new_unsafe(text, askama::Html).to_string()
}
