use crate::cache::{self, CacheError, FilmRecord};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Decade 0 covers the years strictly between 1950 and 1960
pub const DECADE_BASE_YEAR: u32 = 1950;

/// Exclusive bounds for the year asked for interactively
pub const MIN_YEAR: u16 = 1950;
pub const MAX_YEAR: u16 = 2019;

/// Which records to put on the map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Year(u16),
    /// Decade index counted from 1950
    Decade(u16),
}

impl Selection {
    pub fn matches(&self, year: u16) -> bool {
        match *self {
            Selection::Year(wanted) => year == wanted,
            Selection::Decade(decade) => {
                let (min, max) = decade_bounds(decade);
                let year = u32::from(year);
                min < year && year < max
            }
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Selection::Year(year) => write!(f, "year_{}", year),
            Selection::Decade(decade) => write!(f, "decade_{}", decade_bounds(decade).0),
        }
    }
}

/// Open interval `(1950 + 10d, 1950 + 10(d + 1))` for decade index `d`
pub fn decade_bounds(decade: u16) -> (u32, u32) {
    let decade = u32::from(decade);
    (
        DECADE_BASE_YEAR + decade * 10,
        DECADE_BASE_YEAR + (decade + 1) * 10,
    )
}

pub fn is_valid_year(year: u16) -> bool {
    MIN_YEAR < year && year < MAX_YEAR
}

pub fn select(records: Vec<FilmRecord>, selection: Selection) -> Vec<FilmRecord> {
    records
        .into_iter()
        .filter(|r| selection.matches(r.year))
        .collect()
}

/// Loads the whole cache file and keeps the rows matching `selection`
pub fn select_from_cache(
    path: &Path,
    selection: Selection,
) -> Result<Vec<FilmRecord>, CacheError> {
    let records = cache::read_records(path)?;

    if log::log_enabled!(log::Level::Debug) {
        for (year, count) in year_counts(&records) {
            log::debug!("{:>6} {}", year, count);
        }
    }

    let total = records.len();
    let selected = select(records, selection);
    log::info!(
        "Selected {} of {} cached records for {}",
        selected.len(),
        total,
        selection
    );
    Ok(selected)
}

/// Rows per year, most frequent first
pub fn year_counts(records: &[FilmRecord]) -> Vec<(u16, usize)> {
    let mut counts: HashMap<u16, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.year).or_default() += 1;
    }

    let mut counts: Vec<(u16, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheWriter;
    use crate::geocoding::Coordinates;
    use tempfile::TempDir;

    fn record(year: u16) -> FilmRecord {
        FilmRecord {
            year,
            title: format!("Film {}", year),
            latitude: 1.0,
            longitude: 2.0,
        }
    }

    fn all_years() -> Vec<FilmRecord> {
        let mut records: Vec<FilmRecord> = (1950..=2020).map(record).collect();
        records.push(record(0));
        records
    }

    #[test]
    fn test_decade_six_is_open_interval() {
        let years: Vec<u16> = select(all_years(), Selection::Decade(6))
            .iter()
            .map(|r| r.year)
            .collect();
        assert_eq!(years, (2011..=2019).collect::<Vec<u16>>());
    }

    #[test]
    fn test_year_is_exact() {
        let selected = select(all_years(), Selection::Year(1984));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].year, 1984);
    }

    #[test]
    fn test_unknown_year_only_when_targeted() {
        for decade in 0..8 {
            assert!(select(all_years(), Selection::Decade(decade))
                .iter()
                .all(|r| r.year != 0));
        }
        assert_eq!(select(all_years(), Selection::Year(0)).len(), 1);
    }

    #[test]
    fn test_decade_bounds() {
        assert_eq!(decade_bounds(0), (1950, 1960));
        assert_eq!(decade_bounds(6), (2010, 2020));
    }

    #[test]
    fn test_is_valid_year() {
        assert!(!is_valid_year(1950));
        assert!(is_valid_year(1951));
        assert!(is_valid_year(2018));
        assert!(!is_valid_year(2019));
    }

    #[test]
    fn test_year_counts() {
        let records = vec![record(2001), record(2015), record(2015), record(0)];
        assert_eq!(year_counts(&records), vec![(2015, 2), (0, 1), (2001, 1)]);
    }

    #[test]
    fn test_select_from_cache() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let cache_path = temp_dir.path().join("film_data.csv");

        let mut writer = CacheWriter::create(&cache_path)?;
        for year in [2014, 2015, 2015, 0] {
            writer.write(&FilmRecord::new(
                (year != 0).then_some(year),
                format!("Film {}", year),
                Coordinates::new(10.0, 20.0),
            ))?;
        }
        writer.finish()?;

        let selected = select_from_cache(&cache_path, Selection::Year(2015))?;
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|r| r.year == 2015));
        Ok(())
    }

    #[test]
    fn test_selection_display() {
        assert_eq!(Selection::Year(2015).to_string(), "year_2015");
        assert_eq!(Selection::Decade(3).to_string(), "decade_1980");
    }
}
