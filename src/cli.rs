use std::path::PathBuf;

use chrono::{Duration, NaiveDate};
use clap::{App, Arg, ArgMatches};

use crate::common::DATE_FORMAT;
use crate::config::ValetConfig;
use crate::error::{Error, Result};
use crate::valet::ValetClient;

pub const MAX_SERIES: usize = 4;
pub const DEFAULT_CONFIG: &str = "config/valet.toml";

pub fn command_usage<'a, 'b>() -> App<'a, 'b> {
    App::new("fx-acquisition")
    .author("Matthew Scheffel <matt@dataheck.com>")
    .about("Appends Bank of Canada daily exchange rates to a CSV file")
    .arg(
        Arg::with_name("start-date")
            .index(1)
            .help("First day to request, yyyy-MM-dd. Defaults to a week before the end date.")
    )
    .arg(
        Arg::with_name("end-date")
            .index(2)
            .help("Last day to request, yyyy-MM-dd. Defaults to today.")
    )
    .arg(
        Arg::with_name("series")
            .index(3)
            .multiple(true)
            .help("Series codes to request, at most 4 (e.g. FXCADUSD FXAUDCAD)")
    )
    .arg(
        Arg::with_name("output")
            .short("o")
            .long("output")
            .takes_value(true)
            .help("CSV file to append to. Overrides the configured output.")
    )
    .arg(
        Arg::with_name("config")
            .short("c")
            .long("config")
            .takes_value(true)
            .default_value(DEFAULT_CONFIG)
            .help("Location of the Valet configuration")
    )
    .arg(
        Arg::with_name("list-series")
            .short("l")
            .long("list-series")
            .takes_value(false)
            .help("List the series of a group instead of fetching observations")
    )
    .arg(
        Arg::with_name("group")
            .short("g")
            .long("group")
            .takes_value(true)
            .help("Series group to list with --list-series")
    )
    .arg(
        Arg::with_name("http-connect-timeout")
            .long("http-connect-timeout")
            .takes_value(true)
            .help("HTTP connection timeout in milliseconds.")
    )
    .arg(
        Arg::with_name("http-receive-timeout")
            .long("http-receive-timeout")
            .takes_value(true)
            .help("HTTP receive timeout in milliseconds.")
    )
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub series: Vec<String>,
    pub output: PathBuf,
    pub list_series: bool,
    pub group: String,
    pub client: ValetClient
}

fn parse_date(name: &str, text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|_| Error::Usage(format!("Invalid {} `{}`, expected yyyy-MM-dd", name, text)))
}

fn parse_timeout(matches: &ArgMatches, name: &str, fallback: u64) -> Result<u64> {
    match matches.value_of(name) {
        Some(v) => {
            v.parse::<u64>().map_err(|_| Error::Usage(format!("Invalid {} specified: {}", name, v)))
        },
        None => { Ok(fallback) }
    }
}

impl RunOptions {
    /// Resolves positional arguments against `today` and the loaded configuration.
    ///
    /// With no dates the window is the configured lookback ending today. Series codes are only
    /// read after both dates; when none are given the configured defaults are used.
    pub fn from_matches(matches: &ArgMatches, config: &ValetConfig, today: NaiveDate) -> Result<RunOptions> {
        let series: Vec<String> = match matches.values_of("series") {
            Some(values) => { values.map(String::from).collect() },
            None => { config.default_series.clone() }
        };

        if series.len() > MAX_SERIES {
            return Err(Error::Usage(format!("Only {} series names are allowed", MAX_SERIES)));
        }

        let end_date = match matches.value_of("end-date") {
            Some(d) => { parse_date("end date", d)? },
            None => { today }
        };

        let start_date = match matches.value_of("start-date") {
            Some(d) => { parse_date("start date", d)? },
            None => { end_date - Duration::days(config.default_lookback_days) }
        };

        if end_date < start_date {
            return Err(Error::Usage(format!("End date {} is before start date {}", end_date, start_date)));
        }

        let client = ValetClient::new(
            &config.base_url,
            parse_timeout(matches, "http-connect-timeout", config.http_connect_timeout)?,
            parse_timeout(matches, "http-receive-timeout", config.http_receive_timeout)?
        );

        Ok(RunOptions {
            start_date,
            end_date,
            series,
            output: PathBuf::from(matches.value_of("output").unwrap_or(config.output.as_str())),
            list_series: matches.is_present("list-series"),
            group: matches.value_of("group").unwrap_or(config.group.as_str()).to_owned(),
            client
        })
    }
}

#[cfg(test)]
fn options_for(args: &[&str]) -> Result<RunOptions> {
    let mut argv = vec!["fx-acquisition"];
    argv.extend_from_slice(args);

    let matches = command_usage().get_matches_from_safe(argv).unwrap();
    RunOptions::from_matches(&matches, &ValetConfig::default(), NaiveDate::from_ymd_opt(2024, 5, 15).unwrap())
}

#[test]
fn test_no_arguments_uses_defaults() {
    let options = options_for(&[]).unwrap();
    assert_eq!(options.series, vec!["FXCADUSD".to_owned(), "FXAUDCAD".to_owned()]);
    assert_eq!(options.end_date, NaiveDate::from_ymd_opt(2024, 5, 15).unwrap());
    assert_eq!(options.start_date, NaiveDate::from_ymd_opt(2024, 5, 8).unwrap());
    assert_eq!(options.output, PathBuf::from("exchange_rate.csv"));
    assert!(!options.list_series);
}

#[test]
fn test_start_date_only() {
    let options = options_for(&["2024-05-01"]).unwrap();
    assert_eq!(options.start_date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    assert_eq!(options.end_date, NaiveDate::from_ymd_opt(2024, 5, 15).unwrap());
    assert_eq!(options.series.len(), 2);
}

#[test]
fn test_dates_and_series() {
    let options = options_for(&["2024-01-01", "2024-01-31", "FXUSDCAD", "FXEURCAD"]).unwrap();
    assert_eq!(options.start_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(options.end_date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    assert_eq!(options.series, vec!["FXUSDCAD".to_owned(), "FXEURCAD".to_owned()]);
}

#[test]
fn test_series_cap() {
    let four = options_for(&["2024-01-01", "2024-01-31", "FXUSDCAD", "FXEURCAD", "FXJPYCAD", "FXGBPCAD"]);
    assert_eq!(four.unwrap().series.len(), 4);

    let five = options_for(&["2024-01-01", "2024-01-31", "FXUSDCAD", "FXEURCAD", "FXJPYCAD", "FXGBPCAD", "FXCHFCAD"]);
    assert!(matches!(five, Err(Error::Usage(_))));
}

#[test]
fn test_bad_dates() {
    assert!(matches!(options_for(&["01/05/2024"]), Err(Error::Usage(_))));
    assert!(matches!(options_for(&["2024-02-01", "2024-01-01"]), Err(Error::Usage(_))));
}

#[test]
fn test_options_override_config() {
    let options = options_for(&["--output", "out.csv", "--http-connect-timeout", "250", "--list-series"]).unwrap();
    assert_eq!(options.output, PathBuf::from("out.csv"));
    assert_eq!(options.client.http_connect_timeout, 250);
    assert!(options.list_series);
    assert_eq!(options.group, "FX_RATES_DAILY");

    assert!(matches!(options_for(&["--http-receive-timeout", "soon"]), Err(Error::Usage(_))));
}
