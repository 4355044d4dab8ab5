use std::io::Write;

use log::{info, warn};

use crate::cli::RunOptions;
use crate::common::SeriesGroups;
use crate::csv_store::{self, WriteSummary};
use crate::error::Result;
use crate::rows::{self, Row};
use crate::valet::observations::parse_observations;
use crate::valet::series_group::{parse_series_group, SeriesGroup};
use crate::valet::{ObservationSource, ValetClient};

/// Prints each requested series followed by its rows, before anything is persisted.
pub fn echo_rows<W: Write>(series: &[String], grouped: &SeriesGroups<Row>, out: &mut W) -> Result<()> {
    for code in series {
        writeln!(out, "{}", code)?;
        match grouped.get(code) {
            Some(rows) => {
                for row in rows {
                    writeln!(out, "{}", row)?;
                }
            },
            None => { warn!("No observations returned for {}", code) }
        }
    }

    Ok(())
}

/// Fetch, parse, echo and append. Transport and parse failures abort before the file is
/// opened; a failed write has already been reported and comes back as `None`.
pub fn run<S: ObservationSource, W: Write>(options: &RunOptions, source: &S, out: &mut W) -> Result<Option<WriteSummary>> {
    info!("Requesting {} from {} to {}", options.series.join(","), options.start_date, options.end_date);

    let response = source.fetch_observations(&options.series, options.start_date, options.end_date)?;
    let grouped = parse_observations(&response)?;
    let formatted = rows::convert_to_rows(&grouped);

    echo_rows(&options.series, &formatted, out)?;
    out.flush()?;

    Ok(csv_store::write_data_to_csv(&formatted, &options.output))
}

pub fn print_series_group<W: Write>(group: &str, series_group: &SeriesGroup, out: &mut W) -> Result<()> {
    writeln!(out, "{}: {}", group, series_group.detail.label)?;
    if !series_group.detail.description.is_empty() {
        writeln!(out, "{}", series_group.detail.description)?;
    }
    for series in &series_group.series {
        writeln!(out, "{}\t{}\t{}", series.code, series.label, series.description)?;
    }

    Ok(())
}

pub fn list_series<W: Write>(client: &ValetClient, group: &str, out: &mut W) -> Result<()> {
    let response = client.fetch_series_group(group)?;
    print_series_group(group, &parse_series_group(&response)?, out)
}
