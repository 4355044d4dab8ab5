use thiserror::Error;

/// Every failure the acquisition pipeline can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed command line input, fatal.
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure talking to the Valet server.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// The Valet payload did not have the shape we extract from.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A rate that could not be read as a number while computing change.
    #[error("Invalid value `{value}` for {series} on {date}")]
    InvalidValue {
        series: String,
        date: String,
        value: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
