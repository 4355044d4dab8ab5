use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::{ByteRecord, ReaderBuilder, WriterBuilder};
use log::{info, warn};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::common::SeriesGroups;
use crate::error::{Error, Result};
use crate::rows::{Row, RowKey};

pub const HEADER: [&str; 6] = ["Date", "Value", "Label", "Description", "SeriesName", "Change"];

#[derive(Debug, PartialEq)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub written: usize,
    pub skipped: usize
}

fn parse_value(row: &Row) -> Result<f64> {
    row.value.trim().parse::<f64>().map_err(|_| Error::InvalidValue {
        series: row.series_code.to_owned(),
        date: row.date_text(),
        value: row.value.to_owned()
    })
}

/// Two decimals with halves rounded away from zero, taken from the shortest decimal form of
/// `change` so that 0.125 reads as `0.13%`.
fn format_change(change: f64) -> String {
    match Decimal::from_str(&change.to_string()) {
        Ok(d) => { format!("{:.2}%", d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)) },
        Err(_) => { format!("{:.2}%", change) }
    }
}

/// Sorts one series newest first and pairs every row with its change against the row before it.
///
/// The newest row is always `0.00%`. The sort is stable, so rows sharing a date keep their
/// input order.
pub fn rows_with_change(rows: &[Row]) -> Result<Vec<(Row, String)>> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));

    let mut result = Vec::with_capacity(sorted.len());
    let mut previous: Option<f64> = None;

    for row in sorted {
        let current = parse_value(&row)?;

        let change = match previous {
            None => { "0.00%".to_owned() },
            Some(p) if p == 0.0 => {
                warn!("Previous value of {} before {} is zero, reporting no change", row.series_code, row.date_text());
                "0.00%".to_owned()
            },
            Some(p) => { format_change((current - p) / p * 100.0) }
        };

        previous = Some(current);
        result.push((row, change));
    }

    Ok(result)
}

fn field(record: &ByteRecord, index: usize) -> String {
    String::from_utf8_lossy(&record[index]).into_owned()
}

/// Key of an existing line, or `None` for short lines. A line with more than six fields has
/// unquoted commas in its description, which are joined back.
fn record_key(record: &ByteRecord) -> Option<RowKey> {
    let len = record.len();
    if len < 5 {
        return None;
    }

    let (description, series_code) = if len > 6 {
        let parts: Vec<String> = (3..len - 2).map(|i| field(record, i)).collect();
        (parts.join(","), field(record, len - 2))
    } else {
        (field(record, 3), field(record, 4))
    };

    Some(RowKey {
        date: field(record, 0),
        value: field(record, 1),
        label: field(record, 2),
        description,
        series_code
    })
}

/// Keys of every row already present in an output file. The header and short lines never
/// match a real row, so they are simply ignored. Bytes that are not UTF-8 are read lossily
/// rather than failing the whole file.
fn existing_keys(path: &Path) -> Result<HashSet<RowKey>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut keys = HashSet::new();

    for record in reader.byte_records() {
        if let Some(key) = record_key(&record?) {
            keys.insert(key);
        }
    }

    Ok(keys)
}

/// Appends every row not already present in `path`, writing the header only when the file is new.
///
/// Changes are computed over the whole batch before the file is touched, so a bad value
/// leaves the file as it was.
pub fn append_rows(grouped: &SeriesGroups<Row>, path: &Path) -> Result<WriteSummary> {
    let mut prepared = Vec::new();
    for rows in grouped.values() {
        prepared.extend(rows_with_change(rows)?);
    }

    let file_exists = path.exists();
    let known = if file_exists { existing_keys(path)? } else { HashSet::new() };

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    if !file_exists {
        writer.write_record(&HEADER)?;
    }

    let mut written = 0;
    let mut skipped = 0;

    for (row, change) in &prepared {
        if known.contains(&row.key()) {
            skipped += 1;
            continue;
        }

        let date = row.date_text();
        writer.write_record(&[
            date.as_str(), row.value.as_str(), row.label.as_str(),
            row.description.as_str(), row.series_code.as_str(), change.as_str()
        ])?;
        written += 1;
    }

    writer.flush()?;

    Ok(WriteSummary {
        path: fs::canonicalize(path)?,
        written,
        skipped
    })
}

/// Writer boundary: failures are reported on stderr and end the write, nothing is raised further.
pub fn write_data_to_csv(grouped: &SeriesGroups<Row>, path: &Path) -> Option<WriteSummary> {
    match append_rows(grouped, path) {
        Ok(summary) => {
            info!("Appended {} rows, skipped {} already present", summary.written, summary.skipped);
            println!("Data has been written to CSV file.");
            println!("File path: {}", summary.path.display());
            Some(summary)
        },
        Err(e) => {
            eprintln!("An error occurred while writing data to CSV file: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn row(date: (i32, u32, u32), value: &str, series: &str) -> Row {
        Row {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            value: value.to_owned(),
            label: format!("{}/CAD", &series[2..5]),
            description: format!("{} daily exchange rate", series),
            series_code: series.to_owned()
        }
    }

    fn sample_groups() -> SeriesGroups<Row> {
        let mut grouped = SeriesGroups::new();
        grouped.insert("FXUSDCAD".to_owned(), vec![
            row((2024, 1, 1), "80", "FXUSDCAD"),
            row((2024, 1, 2), "90", "FXUSDCAD"),
            row((2024, 1, 3), "100", "FXUSDCAD"),
        ]);
        grouped.insert("FXEURCAD".to_owned(), vec![
            row((2024, 1, 2), "1.4600", "FXEURCAD"),
            row((2024, 1, 3), "1.4600", "FXEURCAD"),
        ]);
        grouped
    }

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path).unwrap().lines().map(String::from).collect()
    }

    #[test]
    fn change_is_relative_to_next_more_recent_row() {
        let grouped = sample_groups();
        let result = rows_with_change(&grouped["FXUSDCAD"]).unwrap();

        let summary: Vec<(String, &str)> = result.iter()
            .map(|(r, c)| (r.date_text(), c.as_str()))
            .collect();

        assert_eq!(summary, vec![
            ("2024-01-03".to_owned(), "0.00%"),
            ("2024-01-02".to_owned(), "-10.00%"),
            ("2024-01-01".to_owned(), "-11.11%"),
        ]);
    }

    #[test]
    fn change_rejects_non_numeric_value() {
        let rows = vec![row((2024, 1, 2), "1.0", "FXUSDCAD"), row((2024, 1, 1), "n/a", "FXUSDCAD")];
        assert!(matches!(rows_with_change(&rows), Err(Error::InvalidValue { .. })));
    }

    #[test]
    fn change_after_zero_value() {
        let rows = vec![row((2024, 1, 2), "0", "FXUSDCAD"), row((2024, 1, 1), "1.5", "FXUSDCAD")];
        let result = rows_with_change(&rows).unwrap();
        assert_eq!(result[1].1, "0.00%");
    }

    #[test]
    fn sort_is_stable_for_equal_dates() {
        let rows = vec![row((2024, 1, 2), "1.0", "FXUSDCAD"), row((2024, 1, 2), "2.0", "FXUSDCAD")];
        let result = rows_with_change(&rows).unwrap();
        assert_eq!(result[0].0.value, "1.0");
        assert_eq!(result[1].1, "100.00%");
    }

    #[test]
    fn first_write_creates_header_and_sorted_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exchange_rate.csv");

        let summary = append_rows(&sample_groups(), &path).unwrap();
        assert_eq!(summary.written, 5);
        assert_eq!(summary.skipped, 0);
        assert!(summary.path.is_absolute());

        assert_eq!(lines(&path), vec![
            "Date,Value,Label,Description,SeriesName,Change",
            "2024-01-03,100,USD/CAD,FXUSDCAD daily exchange rate,FXUSDCAD,0.00%",
            "2024-01-02,90,USD/CAD,FXUSDCAD daily exchange rate,FXUSDCAD,-10.00%",
            "2024-01-01,80,USD/CAD,FXUSDCAD daily exchange rate,FXUSDCAD,-11.11%",
            "2024-01-03,1.4600,EUR/CAD,FXEURCAD daily exchange rate,FXEURCAD,0.00%",
            "2024-01-02,1.4600,EUR/CAD,FXEURCAD daily exchange rate,FXEURCAD,0.00%",
        ]);
    }

    #[test]
    fn repeated_write_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exchange_rate.csv");

        append_rows(&sample_groups(), &path).unwrap();
        let before = lines(&path);

        let summary = append_rows(&sample_groups(), &path).unwrap();
        assert_eq!(summary.written, 0);
        assert_eq!(summary.skipped, 5);
        assert_eq!(lines(&path), before);

        let headers = lines(&path).iter().filter(|l| l.starts_with("Date,Value,")).count();
        assert_eq!(headers, 1);
    }

    #[test]
    fn overlapping_batch_appends_only_new_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exchange_rate.csv");

        append_rows(&sample_groups(), &path).unwrap();

        let mut next = SeriesGroups::new();
        next.insert("FXUSDCAD".to_owned(), vec![
            row((2024, 1, 3), "100", "FXUSDCAD"),
            row((2024, 1, 4), "110", "FXUSDCAD"),
        ]);

        let summary = append_rows(&next, &path).unwrap();
        assert_eq!(summary.written, 1);
        assert_eq!(summary.skipped, 1);

        let all = lines(&path);
        assert_eq!(all.len(), 7);
        assert_eq!(all[6], "2024-01-04,110,USD/CAD,FXUSDCAD daily exchange rate,FXUSDCAD,0.00%");
    }

    #[test]
    fn changed_value_for_same_date_is_a_new_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exchange_rate.csv");

        append_rows(&sample_groups(), &path).unwrap();

        let mut revised = SeriesGroups::new();
        revised.insert("FXUSDCAD".to_owned(), vec![row((2024, 1, 3), "101", "FXUSDCAD")]);

        let summary = append_rows(&revised, &path).unwrap();
        assert_eq!(summary.written, 1);
    }

    #[test]
    fn existing_file_without_header_gets_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exchange_rate.csv");
        fs::write(&path, "2024-01-03,100,USD/CAD,FXUSDCAD daily exchange rate,FXUSDCAD,0.00%\n").unwrap();

        let summary = append_rows(&sample_groups(), &path).unwrap();
        assert_eq!(summary.written, 4);
        assert!(lines(&path).iter().all(|l| !l.starts_with("Date,")));
    }

    #[test]
    fn bad_value_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exchange_rate.csv");

        let mut grouped = SeriesGroups::new();
        grouped.insert("FXUSDCAD".to_owned(), vec![row((2024, 1, 1), "bogus", "FXUSDCAD")]);

        assert!(append_rows(&grouped, &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn write_failure_is_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("exchange_rate.csv");

        assert_eq!(write_data_to_csv(&sample_groups(), &path), None);
        assert!(!path.exists());
    }

    #[test]
    fn change_rounds_halves_away_from_zero() {
        let rising = vec![row((2024, 1, 2), "800", "FXUSDCAD"), row((2024, 1, 1), "801", "FXUSDCAD")];
        assert_eq!(rows_with_change(&rising).unwrap()[1].1, "0.13%");

        let falling = vec![row((2024, 1, 2), "800", "FXUSDCAD"), row((2024, 1, 1), "799", "FXUSDCAD")];
        assert_eq!(rows_with_change(&falling).unwrap()[1].1, "-0.13%");
    }

    #[test]
    fn undecodable_existing_line_does_not_block_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exchange_rate.csv");

        let mut seeded = b"Date,Value,Label,Description,SeriesName,Change\n".to_vec();
        seeded.extend_from_slice(b"2023-12-29,1.0,L,D\xff,FXUSDCAD,0.00%\n");
        seeded.extend_from_slice(b"2024-01-03,100,USD/CAD,FXUSDCAD daily exchange rate,FXUSDCAD,0.00%\n");
        fs::write(&path, &seeded).unwrap();

        let summary = append_rows(&sample_groups(), &path).unwrap();
        assert_eq!(summary.written, 4);
        assert_eq!(summary.skipped, 1);

        let contents = fs::read(&path).unwrap();
        assert!(contents.starts_with(&seeded));
        assert_eq!(contents.iter().filter(|b| **b == b'\n').count(), 7);
    }

    #[test]
    fn unquoted_comma_in_existing_description_still_matches() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exchange_rate.csv");
        fs::write(&path, "Date,Value,Label,Description,SeriesName,Change\n2024-01-02,1.0,L,D, daily,FXUSDCAD,0.00%\n").unwrap();

        let mut grouped = SeriesGroups::new();
        grouped.insert("FXUSDCAD".to_owned(), vec![Row {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            value: "1.0".to_owned(),
            label: "L".to_owned(),
            description: "D, daily".to_owned(),
            series_code: "FXUSDCAD".to_owned()
        }]);

        let summary = append_rows(&grouped, &path).unwrap();
        assert_eq!(summary.written, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(lines(&path).len(), 2);
    }
}
