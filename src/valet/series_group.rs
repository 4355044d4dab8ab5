use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_GROUP: &str = "FX_RATES_DAILY";

#[derive(Deserialize, Debug, Default)]
pub struct GroupDetail {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SeriesSummary {
    #[serde(skip)]
    pub code: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String
}

#[derive(Deserialize, Debug)]
struct GroupResponse {
    #[serde(rename(deserialize = "groupDetail"), default)]
    group_detail: GroupDetail,
    #[serde(rename(deserialize = "seriesDetail"))]
    series_detail: IndexMap<String, SeriesSummary>
}

#[derive(Debug)]
pub struct SeriesGroup {
    pub detail: GroupDetail,
    pub series: Vec<SeriesSummary>
}

/// Reads the series listed by a group observations payload, in the order the server lists them.
pub fn parse_series_group(json: &str) -> Result<SeriesGroup> {
    let response: GroupResponse = serde_json::from_str(json)
        .map_err(|e| Error::Parse(format!("Group response from Valet server is not valid JSON, or the structure has changed significantly: {}", e)))?;

    let series = response.series_detail.into_iter()
        .map(|(code, mut summary)| {
            summary.code = code;
            summary
        })
        .collect();

    Ok(SeriesGroup {
        detail: response.group_detail,
        series
    })
}

#[test]
fn test_parse_series_group() {
    let json = r#"{
        "groupDetail": {"label": "Daily exchange rates", "description": "Daily average exchange rates", "link": null},
        "seriesDetail": {
            "FXAUDCAD": {"label": "AUD/CAD", "description": "Australian dollar to Canadian dollar daily exchange rate"},
            "FXBRLCAD": {"label": "BRL/CAD", "description": "Brazilian real to Canadian dollar daily exchange rate"}
        },
        "observations": []
    }"#;

    let group = parse_series_group(json).unwrap();
    assert_eq!(group.detail.label, "Daily exchange rates");
    assert_eq!(group.series.len(), 2);
    assert_eq!(group.series[0].code, "FXAUDCAD");
    assert_eq!(group.series[1].label, "BRL/CAD");
}

#[test]
fn test_parse_series_group_requires_series() {
    assert!(matches!(parse_series_group(r#"{"groupDetail": {}}"#), Err(Error::Parse(_))));
}
