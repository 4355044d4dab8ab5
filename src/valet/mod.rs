// https://www.bankofcanada.ca/valet/docs

pub mod observations;
pub mod series_group;

use chrono::NaiveDate;
use log::debug;

use crate::common::{USER_AGENT, DATE_FORMAT};
use crate::error::{Error, Result};

pub const API_ROOT: &str = "https://www.bankofcanada.ca/valet";

pub const CONNECT_TIMEOUT: u64 = 5000;
pub const RECEIVE_TIMEOUT: u64 = 15000;

/// Anything able to produce a raw observations payload for a set of series and a date range.
pub trait ObservationSource {
    fn fetch_observations(&self, series: &[String], start_date: NaiveDate, end_date: NaiveDate) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct ValetClient {
    pub api_root: String,
    pub http_connect_timeout: u64,
    pub http_receive_timeout: u64
}

impl Default for ValetClient {
    fn default() -> ValetClient {
        ValetClient::new(API_ROOT, CONNECT_TIMEOUT, RECEIVE_TIMEOUT)
    }
}

impl ValetClient {
    pub fn new(api_root: &str, http_connect_timeout: u64, http_receive_timeout: u64) -> ValetClient {
        ValetClient {
            api_root: api_root.trim_end_matches('/').to_owned(),
            http_connect_timeout,
            http_receive_timeout
        }
    }

    pub fn observations_url(&self, series: &[String], start_date: NaiveDate, end_date: NaiveDate) -> Result<String> {
        if series.is_empty() {
            return Err(Error::Usage("At least one series name is required.".to_owned()));
        }

        Ok(format!(
            "{root}/observations/{series}/json?start_date={start}&end_date={end}",
            root=self.api_root,
            series=series.join(","),
            start=start_date.format(DATE_FORMAT),
            end=end_date.format(DATE_FORMAT)
        ))
    }

    pub fn group_url(&self, group: &str) -> String {
        format!("{}/observations/group/{}/json", self.api_root, group)
    }

    /// Raw JSON listing every series of a group, with the group's observations.
    pub fn fetch_series_group(&self, group: &str) -> Result<String> {
        let target_url = self.group_url(group);
        self.get_string(&target_url)
    }

    fn get_string(&self, target_url: &str) -> Result<String> {
        debug!("Requesting {}", target_url);

        let response = ureq::get(target_url)
            .set("User-Agent", USER_AGENT)
            .set("Accept", "application/json")
            .timeout_connect(self.http_connect_timeout)
            .timeout_read(self.http_receive_timeout)
            .call();

        if let Some(error) = response.synthetic_error() {
            return Err(Error::Fetch(format!("Failed to retrieve data from Valet server with URL {}. Error: {}", target_url, error)));
        }

        if !response.ok() {
            return Err(Error::Fetch(format!("Valet server answered {} {} for URL {}", response.status(), response.status_text(), target_url)));
        }

        response.into_string()
            .map_err(|e| Error::Fetch(format!("Failed to read response body from URL {}. Error: {}", target_url, e)))
    }
}

impl ObservationSource for ValetClient {
    fn fetch_observations(&self, series: &[String], start_date: NaiveDate, end_date: NaiveDate) -> Result<String> {
        let target_url = self.observations_url(series, start_date, end_date)?;
        self.get_string(&target_url)
    }
}

#[test]
fn test_observations_url() {
    let client = ValetClient::default();
    let series = vec!["FXCADUSD".to_owned(), "FXAUDCAD".to_owned()];

    let url = client.observations_url(&series, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()).unwrap();
    assert_eq!(url, "https://www.bankofcanada.ca/valet/observations/FXCADUSD,FXAUDCAD/json?start_date=2024-01-01&end_date=2024-01-08");

    // series names belong to the call, nothing accumulates on the client
    let again = client.observations_url(&series[..1], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()).unwrap();
    assert_eq!(again, "https://www.bankofcanada.ca/valet/observations/FXCADUSD/json?start_date=2024-01-01&end_date=2024-01-08");
}

#[test]
fn test_observations_url_requires_series() {
    let client = ValetClient::default();
    assert!(client.observations_url(&[], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()).is_err());
}

#[test]
fn test_group_url_trims_root() {
    let client = ValetClient::new("http://localhost:8080/valet/", 10, 10);
    assert_eq!(client.group_url("FX_RATES_DAILY"), "http://localhost:8080/valet/observations/group/FX_RATES_DAILY/json");
}
