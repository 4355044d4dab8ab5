use std::fmt;
use std::fmt::{Display, Formatter};

use chrono::NaiveDate;

use crate::common::{Observation, SeriesGroups, DATE_FORMAT};

/// A flattened observation in output column order: Date, Value, Label, Description, SeriesName.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub date: NaiveDate,
    pub value: String,
    pub label: String,
    pub description: String,
    pub series_code: String
}

/// The five text fields that identify a row in the output file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub date: String,
    pub value: String,
    pub label: String,
    pub description: String,
    pub series_code: String
}

impl Row {
    pub fn date_text(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    pub fn key(&self) -> RowKey {
        RowKey {
            date: self.date_text(),
            value: self.value.to_owned(),
            label: self.label.to_owned(),
            description: self.description.to_owned(),
            series_code: self.series_code.to_owned()
        }
    }
}

impl From<&Observation> for Row {
    fn from(observation: &Observation) -> Self {
        Row {
            date: observation.date,
            value: observation.value.to_owned(),
            label: observation.label.to_owned(),
            description: observation.description.to_owned(),
            series_code: observation.series_code.to_owned()
        }
    }
}

/// Console form, comma-space joined.
impl Display for Row {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}, {}, {}, {}, {}", self.date_text(), self.value, self.label, self.description, self.series_code)
    }
}

pub fn convert_to_rows(grouped: &SeriesGroups<Observation>) -> SeriesGroups<Row> {
    grouped.iter()
        .map(|(series, observations)| {
            (series.to_owned(), observations.iter().map(Row::from).collect())
        })
        .collect()
}

#[test]
fn test_convert_to_rows_preserves_order() {
    let mut grouped: SeriesGroups<Observation> = SeriesGroups::new();
    grouped.insert("FXCADUSD".to_owned(), vec![
        Observation::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), "FXCADUSD", "CAD/USD", "Canadian dollar to US dollar", "0.7510"),
        Observation::new(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), "FXCADUSD", "CAD/USD", "Canadian dollar to US dollar", "0.7490"),
    ]);
    grouped.insert("FXAUDCAD".to_owned(), vec![
        Observation::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), "FXAUDCAD", "AUD/CAD", "Australian dollar to Canadian dollar", "0.9035"),
    ]);

    let rows = convert_to_rows(&grouped);
    assert_eq!(rows.keys().collect::<Vec<_>>(), vec!["FXCADUSD", "FXAUDCAD"]);
    assert_eq!(rows["FXCADUSD"][1].value, "0.7490");
    assert_eq!(
        rows["FXCADUSD"][0].to_string(),
        "2024-01-02, 0.7510, CAD/USD, Canadian dollar to US dollar, FXCADUSD"
    );
    assert_eq!(rows["FXAUDCAD"][0].key().date, "2024-01-02");
}
