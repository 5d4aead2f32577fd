use anyhow::{bail, Result};
use filmmap_core::{is_valid_year, Selection, MAX_YEAR, MIN_YEAR};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::cli::Args;

/// Each question is asked at most this many times
const MAX_ANSWERS: usize = 2;

/// Everything a run needs, from flags or from the user
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub selection: Selection,
    pub home_address: Option<String>,
    pub listing: PathBuf,
}

pub fn parse_year(s: &str) -> Result<u16, String> {
    let year: u16 = s
        .trim()
        .parse()
        .map_err(|_| "You entered a wrong value, please check it and try again.".to_string())?;
    if !is_valid_year(year) {
        return Err(format!(
            "Year value must be greater than {} and less than {}.",
            MIN_YEAR, MAX_YEAR
        ));
    }
    Ok(year)
}

pub fn parse_listing_path(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s.trim());
    if !path.is_file() {
        return Err(format!(
            "{} is not a file. Please check the name and try again.",
            path.display()
        ));
    }
    Ok(path)
}

/// Asks `question` until `parse` accepts the answer, giving one retry
pub fn ask<R, W, T, F>(input: &mut R, output: &mut W, question: &str, parse: F) -> Result<T>
where
    R: BufRead,
    W: Write,
    F: Fn(&str) -> Result<T, String>,
{
    let mut last_error = String::new();

    for _ in 0..MAX_ANSWERS {
        write!(output, "{}", question)?;
        output.flush()?;

        let mut line = String::new();
        input.read_line(&mut line)?;

        match parse(line.trim_end_matches(['\r', '\n'])) {
            Ok(value) => return Ok(value),
            Err(message) => {
                writeln!(output, "{}", message)?;
                last_error = message;
            }
        }
    }

    bail!("No valid answer after {} attempts: {}", MAX_ANSWERS, last_error)
}

/// Fills in whatever the command line left out by asking the user
pub fn complete_request<R: BufRead, W: Write>(
    args: &Args,
    input: &mut R,
    output: &mut W,
) -> Result<Request> {
    let selection = match (args.decade, args.year) {
        (Some(decade), _) => Selection::Decade(decade),
        (None, Some(year)) => Selection::Year(year),
        (None, None) => Selection::Year(ask(
            input,
            output,
            "Enter the year of the films you want to see on the map: ",
            parse_year,
        )?),
    };

    let home_address = match &args.home {
        Some(home) => home.clone(),
        None => ask(
            input,
            output,
            "Enter your city and country, separated by commas (empty to skip): ",
            |s| Ok(s.to_string()),
        )?,
    };
    let home_address = Some(home_address.trim().to_string()).filter(|h| !h.is_empty());

    let listing = match &args.listing {
        Some(path) => match parse_listing_path(&path.to_string_lossy()) {
            Ok(path) => path,
            Err(message) => bail!(message),
        },
        None => ask(
            input,
            output,
            "Enter the path of the .list file to read: ",
            parse_listing_path,
        )?,
    };

    Ok(Request {
        selection,
        home_address,
        listing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["filmmap"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2015"), Ok(2015));
        assert_eq!(parse_year(" 1951 "), Ok(1951));
        assert!(parse_year("1950").is_err());
        assert!(parse_year("2019").is_err());
        assert!(parse_year("twenty").is_err());
    }

    #[test]
    fn test_ask_accepts_second_answer() {
        let mut input = Cursor::new("abc\n2001\n");
        let mut output = Vec::new();

        let year = ask(&mut input, &mut output, "Year: ", parse_year).unwrap();
        assert_eq!(year, 2001);

        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("Year: ").count(), 2);
        assert!(shown.contains("wrong value"));
    }

    #[test]
    fn test_ask_gives_up_after_two_failures() {
        let mut input = Cursor::new("1900\n3000\n2001\n");
        let mut output = Vec::new();

        let err = ask(&mut input, &mut output, "Year: ", parse_year).unwrap_err();
        assert!(err.to_string().contains("less than 2019"));
    }

    #[test]
    fn test_ask_at_end_of_input() {
        let mut input = Cursor::new("");
        let mut output = Vec::new();
        assert!(ask(&mut input, &mut output, "Year: ", parse_year).is_err());
    }

    #[test]
    fn test_complete_request_interactively() {
        let temp_dir = TempDir::new().unwrap();
        let listing = temp_dir.path().join("locations.list");
        fs::write(&listing, "LOCATIONS LIST\n").unwrap();

        let answers = format!("2015\nLviv, Ukraine\n{}\n", listing.display());
        let mut input = Cursor::new(answers);
        let mut output = Vec::new();

        let request = complete_request(&args(&[]), &mut input, &mut output).unwrap();
        assert_eq!(
            request,
            Request {
                selection: Selection::Year(2015),
                home_address: Some("Lviv, Ukraine".to_string()),
                listing,
            }
        );
    }

    #[test]
    fn test_complete_request_from_flags() {
        let temp_dir = TempDir::new().unwrap();
        let listing = temp_dir.path().join("locations.list");
        fs::write(&listing, "LOCATIONS LIST\n").unwrap();
        let listing_arg = listing.to_string_lossy().to_string();

        let mut input = Cursor::new("");
        let mut output = Vec::new();
        let request = complete_request(
            &args(&[listing_arg.as_str(), "--decade", "6", "--home", ""]),
            &mut input,
            &mut output,
        )
        .unwrap();

        assert_eq!(request.selection, Selection::Decade(6));
        assert_eq!(request.home_address, None);
        assert!(output.is_empty());
    }

    #[test]
    fn test_missing_listing_flag_fails() {
        let mut input = Cursor::new("");
        let mut output = Vec::new();
        let result = complete_request(
            &args(&["/definitely/not/here.list", "--year", "2015", "--home", ""]),
            &mut input,
            &mut output,
        );
        assert!(result.is_err());
    }
}
