use std::collections::HashMap;

use chrono::NaiveDate;
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::common::{Observation, SeriesGroups, DATE_FORMAT};
use crate::error::{Error, Result};

const DATE_FIELD: &str = "d";
const VALUE_FIELD: &str = "v";

lazy_static! {
    static ref RE_SERIES_CODE: Regex = Regex::new(r"^FX").unwrap();
}

#[derive(Deserialize, Debug)]
struct SeriesDetail {
    label: Option<String>,
    description: Option<String>
}

#[derive(Deserialize, Debug)]
struct ObservationsResponse {
    // IndexMap keeps the field order of each observation as sent
    observations: Vec<IndexMap<String, Value>>,
    #[serde(rename(deserialize = "seriesDetail"), default)]
    series_detail: HashMap<String, SeriesDetail>
}

fn is_series_code(key: &str) -> bool {
    key != DATE_FIELD && RE_SERIES_CODE.is_match(key)
}

fn value_text(series_code: &str, date: &NaiveDate, field: &Value) -> Result<String> {
    match field.get(VALUE_FIELD) {
        Some(Value::String(s)) => { Ok(s.to_owned()) },
        Some(Value::Number(n)) => { Ok(n.to_string()) },
        _ => {
            Err(Error::Parse(format!("Observation for {} on {} has no usable `{}` field", series_code, date, VALUE_FIELD)))
        }
    }
}

/// Turns a Valet observations payload into per-series records.
///
/// Every key of an observation that looks like a series code yields one record, labelled from
/// the matching `seriesDetail` entry. Records are appended to their series in document order,
/// so a payload sorted by date produces date-ascending groups. Any missing piece fails the
/// whole payload; no partial groups are returned.
pub fn parse_observations(json: &str) -> Result<SeriesGroups<Observation>> {
    let response: ObservationsResponse = serde_json::from_str(json)
        .map_err(|e| Error::Parse(format!("Response from Valet server is not valid JSON, or the structure has changed significantly: {}", e)))?;

    let mut grouped: SeriesGroups<Observation> = SeriesGroups::new();

    for observation in &response.observations {
        let date = match observation.get(DATE_FIELD) {
            Some(Value::String(d)) => {
                NaiveDate::parse_from_str(d, DATE_FORMAT)
                    .map_err(|_| Error::Parse(format!("Observation date `{}` is not in yyyy-MM-dd form", d)))?
            },
            _ => {
                return Err(Error::Parse("Observation is missing its date field".to_owned()));
            }
        };

        for (key, field) in observation.iter().filter(|(k, _)| is_series_code(k)) {
            let detail = match response.series_detail.get(key) {
                Some(d) => { d },
                None => {
                    return Err(Error::Parse(format!("Series {} has no seriesDetail entry", key)));
                }
            };

            let (label, description) = match (&detail.label, &detail.description) {
                (Some(l), Some(d)) => { (l, d) },
                _ => {
                    return Err(Error::Parse(format!("seriesDetail for {} is missing its label or description", key)));
                }
            };

            let value = value_text(key, &date, field)?;

            grouped.entry(key.to_owned())
                .or_insert_with(Vec::new)
                .push(Observation::new(date, key, label, description, &value));
        }
    }

    Ok(grouped)
}

#[cfg(test)]
pub(crate) const SAMPLE_RESPONSE: &str = r#"{
    "terms": {"url": "https://www.bankofcanada.ca/terms/"},
    "seriesDetail": {
        "FXCADUSD": {"label": "CAD/USD", "description": "Canadian dollar to US dollar daily exchange rate", "dimension": {"key": "d", "name": "date"}},
        "FXAUDCAD": {"label": "AUD/CAD", "description": "Australian dollar to Canadian dollar daily exchange rate", "dimension": {"key": "d", "name": "date"}}
    },
    "observations": [
        {"d": "2024-01-02", "FXCADUSD": {"v": "0.7510"}, "FXAUDCAD": {"v": "0.9035"}},
        {"d": "2024-01-03", "FXCADUSD": {"v": "0.7490"}, "FXAUDCAD": {"v": "0.8990"}},
        {"d": "2024-01-04", "FXCADUSD": {"v": "0.7502"}, "FXAUDCAD": {"v": "0.8972"}}
    ]
}"#;

#[test]
fn test_parse_observations_groups_by_series() {
    let grouped = parse_observations(SAMPLE_RESPONSE).unwrap();

    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped.keys().collect::<Vec<_>>(), vec!["FXCADUSD", "FXAUDCAD"]);
    assert_eq!(grouped.values().map(|v| v.len()).sum::<usize>(), 6);

    let cad = &grouped["FXCADUSD"];
    assert!(cad.iter().all(|o| o.series_code == "FXCADUSD"));
    assert_eq!(cad[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    assert_eq!(cad[2].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
    assert_eq!(cad[1].value, "0.7490");
    assert_eq!(cad[1].label, "CAD/USD");
    assert_eq!(cad[1].description, "Canadian dollar to US dollar daily exchange rate");
}

#[test]
fn test_parse_observations_ignores_non_series_fields() {
    let json = r#"{
        "seriesDetail": {"FXUSDCAD": {"label": "USD/CAD", "description": "US dollar to Canadian dollar"}},
        "observations": [{"d": "2024-03-01", "note": {"v": "x"}, "FXUSDCAD": {"v": 1.3553}}]
    }"#;

    let grouped = parse_observations(json).unwrap();
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped["FXUSDCAD"][0].value, "1.3553");
}

#[test]
fn test_parse_observations_interleaved_series() {
    // a series absent from the first observation is grouped after the ones seen earlier
    let json = r#"{
        "seriesDetail": {
            "FXEURCAD": {"label": "EUR/CAD", "description": "Euro to Canadian dollar"},
            "FXJPYCAD": {"label": "JPY/CAD", "description": "Japanese yen to Canadian dollar"}
        },
        "observations": [
            {"d": "2024-01-02", "FXEURCAD": {"v": "1.4600"}},
            {"d": "2024-01-03", "FXJPYCAD": {"v": "0.009350"}, "FXEURCAD": {"v": "1.4580"}}
        ]
    }"#;

    let grouped = parse_observations(json).unwrap();
    assert_eq!(grouped.keys().collect::<Vec<_>>(), vec!["FXEURCAD", "FXJPYCAD"]);
    assert_eq!(grouped["FXEURCAD"].len(), 2);
    assert_eq!(grouped["FXJPYCAD"].len(), 1);
}

#[test]
fn test_parse_observations_missing_series_detail() {
    let json = r#"{
        "seriesDetail": {"FXCADUSD": {"label": "CAD/USD", "description": "Canadian dollar to US dollar"}},
        "observations": [
            {"d": "2024-01-02", "FXCADUSD": {"v": "0.7510"}},
            {"d": "2024-01-03", "FXGBPCAD": {"v": "1.6900"}}
        ]
    }"#;

    match parse_observations(json) {
        Err(Error::Parse(message)) => { assert!(message.contains("FXGBPCAD")) },
        other => { panic!("expected parse error, got {:?}", other) }
    }
}

#[test]
fn test_parse_observations_missing_label() {
    let json = r#"{
        "seriesDetail": {"FXCADUSD": {"description": "Canadian dollar to US dollar"}},
        "observations": [{"d": "2024-01-02", "FXCADUSD": {"v": "0.7510"}}]
    }"#;

    assert!(matches!(parse_observations(json), Err(Error::Parse(_))));
}

#[test]
fn test_parse_observations_rejects_bad_documents() {
    assert!(matches!(parse_observations("not json"), Err(Error::Parse(_))));
    assert!(matches!(parse_observations(r#"{"seriesDetail": {}}"#), Err(Error::Parse(_))));
    assert!(matches!(parse_observations(r#"{"observations": [{"FXCADUSD": {"v": "1"}}]}"#), Err(Error::Parse(_))));
}

#[test]
fn test_parse_observations_empty() {
    let grouped = parse_observations(r#"{"seriesDetail": {}, "observations": []}"#).unwrap();
    assert!(grouped.is_empty());
}
