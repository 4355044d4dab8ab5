use chrono::NaiveDate;
use indexmap::IndexMap;

pub const USER_AGENT: &str = "fx-acquisition/0.1";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One dated rate for one series, as extracted from a Valet payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub series_code: String,
    pub label: String,
    pub description: String,
    pub value: String, // kept as text, the CSV carries it verbatim
}

impl Observation {
    pub fn new(date: NaiveDate, series_code: &str, label: &str, description: &str, value: &str) -> Observation {
        Observation {
            date,
            series_code: series_code.to_owned(),
            label: label.to_owned(),
            description: description.to_owned(),
            value: value.to_owned()
        }
    }
}

/// Series code -> observations, in order of first appearance in the payload.
pub type SeriesGroups<T> = IndexMap<String, Vec<T>>;
