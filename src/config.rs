use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::valet;

pub const DEFAULT_SERIES: [&str; 2] = ["FXCADUSD", "FXAUDCAD"];
pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;
pub const DEFAULT_OUTPUT: &str = "exchange_rate.csv";

/// Settings read from `config/valet.toml`. Every key is optional.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ValetConfig {
    pub base_url: String,
    pub default_series: Vec<String>,
    pub default_lookback_days: i64,
    pub output: String,
    pub group: String,
    pub http_connect_timeout: u64,
    pub http_receive_timeout: u64
}

impl Default for ValetConfig {
    fn default() -> ValetConfig {
        ValetConfig {
            base_url: valet::API_ROOT.to_owned(),
            default_series: DEFAULT_SERIES.iter().map(|s| s.to_string()).collect(),
            default_lookback_days: DEFAULT_LOOKBACK_DAYS,
            output: DEFAULT_OUTPUT.to_owned(),
            group: valet::series_group::DEFAULT_GROUP.to_owned(),
            http_connect_timeout: valet::CONNECT_TIMEOUT,
            http_receive_timeout: valet::RECEIVE_TIMEOUT
        }
    }
}

impl ValetConfig {
    pub fn from_toml(text: &str) -> Result<ValetConfig> {
        let config: ValetConfig = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse configuration TOML: {}", e)))?;

        if config.default_series.is_empty() {
            return Err(Error::Config("default_series must name at least one series".to_owned()));
        }
        if config.default_lookback_days < 0 {
            return Err(Error::Config("default_lookback_days cannot be negative".to_owned()));
        }

        Ok(config)
    }

    /// A missing file means built-in defaults; an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<ValetConfig> {
        match fs::read_to_string(path) {
            Ok(text) => { ValetConfig::from_toml(&text) },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No configuration at {}, using defaults", path.display());
                Ok(ValetConfig::default())
            },
            Err(e) => {
                Err(Error::Config(format!("Failed to read configuration {}: {}", path.display(), e)))
            }
        }
    }
}

#[test]
fn test_partial_config_keeps_defaults() {
    let config = ValetConfig::from_toml(r#"
        output = "rates/fx.csv"
        default_series = ["FXUSDCAD"]
    "#).unwrap();

    assert_eq!(config.output, "rates/fx.csv");
    assert_eq!(config.default_series, vec!["FXUSDCAD".to_owned()]);
    assert_eq!(config.base_url, valet::API_ROOT);
    assert_eq!(config.default_lookback_days, 7);
}

#[test]
fn test_invalid_config() {
    assert!(matches!(ValetConfig::from_toml("output = 3"), Err(Error::Config(_))));
    assert!(matches!(ValetConfig::from_toml("default_series = []"), Err(Error::Config(_))));
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = ValetConfig::load(&dir.path().join("valet.toml")).unwrap();
    assert_eq!(config, ValetConfig::default());
}
