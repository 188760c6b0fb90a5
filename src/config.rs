//! Till configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `JUICE_POS_DATA_DIR` - Directory for the database, logs and spooled
//!   receipts (default: platform data dir + `com.juicepos.till`)
//! - `JUICE_POS_TAX_RATE` - GST rate as a fraction (default: 0.05)
//! - `JUICE_POS_UTC_OFFSET_MINUTES` - Offset used when printing dates
//!   (default: 330, i.e. +05:30)
//! - `JUICE_POS_STORE_NAME`, `JUICE_POS_STORE_TAGLINE`,
//!   `JUICE_POS_STORE_ADDRESS`, `JUICE_POS_GSTIN` - Receipt header
//! - `JUICE_POS_PRINTER_PORT` - Serial port bound to the Bluetooth printer
//! - `JUICE_POS_PRINTER_BAUD` - Baud rate for that port (default: 9600)
//! - `JUICE_POS_LOG_FORMAT` - `text` or `json` for the log file (default: text)

use std::path::PathBuf;

use chrono::{FixedOffset, Offset, Utc};

use crate::error::ConfigError;
use crate::models::StoreDetails;
use crate::pricing::{TaxRate, DEFAULT_TAX_RATE};

pub const APP_IDENTIFIER: &str = "com.juicepos.till";
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;
pub const DEFAULT_PRINTER_BAUD: u32 = 9600;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub tax_rate: TaxRate,
    /// Minutes east of UTC.
    pub utc_offset_minutes: i32,
    pub store: StoreDetails,
    pub printer_port: Option<String>,
    pub printer_baud: u32,
    /// Write the rolling log file as JSON lines.
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            tax_rate: TaxRate::default(),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            store: StoreDetails::default(),
            printer_port: None,
            printer_baud: DEFAULT_PRINTER_BAUD,
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` when a numeric variable does not
    /// parse or is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = StoreDetails::default();

        let data_dir = get_optional_env("JUICE_POS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let raw_rate = get_env_or_default("JUICE_POS_TAX_RATE", &DEFAULT_TAX_RATE.to_string());
        let tax_rate = raw_rate
            .parse::<f64>()
            .map_err(|e| e.to_string())
            .and_then(|r| TaxRate::new(r).map_err(|e| e.to_string()))
            .map_err(|e| ConfigError::InvalidEnvVar("JUICE_POS_TAX_RATE".to_string(), e))?;

        let utc_offset_minutes = get_env_or_default(
            "JUICE_POS_UTC_OFFSET_MINUTES",
            &DEFAULT_UTC_OFFSET_MINUTES.to_string(),
        )
        .parse::<i32>()
        .map_err(|e| e.to_string())
        .and_then(|m| {
            if m.abs() < 24 * 60 {
                Ok(m)
            } else {
                Err(format!("{m} is outside +/-24h"))
            }
        })
        .map_err(|e| ConfigError::InvalidEnvVar("JUICE_POS_UTC_OFFSET_MINUTES".to_string(), e))?;

        let printer_baud = get_env_or_default("JUICE_POS_PRINTER_BAUD", &DEFAULT_PRINTER_BAUD.to_string())
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidEnvVar("JUICE_POS_PRINTER_BAUD".to_string(), e.to_string()))?;

        let log_json = match get_env_or_default("JUICE_POS_LOG_FORMAT", "text")
            .to_ascii_lowercase()
            .as_str()
        {
            "text" => false,
            "json" => true,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "JUICE_POS_LOG_FORMAT".to_string(),
                    format!("expected text or json, got {other}"),
                ))
            }
        };

        Ok(Self {
            data_dir,
            tax_rate,
            utc_offset_minutes,
            store: StoreDetails {
                name: get_env_or_default("JUICE_POS_STORE_NAME", &defaults.name),
                tagline: get_env_or_default("JUICE_POS_STORE_TAGLINE", &defaults.tagline),
                address: get_env_or_default("JUICE_POS_STORE_ADDRESS", &defaults.address),
                gstin: get_env_or_default("JUICE_POS_GSTIN", &defaults.gstin),
            },
            printer_port: get_optional_env("JUICE_POS_PRINTER_PORT"),
            printer_baud,
            log_json,
        })
    }

    /// Offset applied to ledger timestamps before display.
    pub fn utc_offset(&self) -> FixedOffset {
        offset_from_minutes(self.utc_offset_minutes)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn receipts_dir(&self) -> PathBuf {
        self.data_dir.join("receipts")
    }
}

/// `FixedOffset` for `minutes` east of UTC, UTC when out of range.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix())
}

/// Per-user data directory, falling back to the working directory.
fn default_data_dir() -> PathBuf {
    let base = if cfg!(windows) {
        get_optional_env("APPDATA").map(PathBuf::from)
    } else if cfg!(target_os = "macos") {
        get_optional_env("HOME").map(|h| PathBuf::from(h).join("Library/Application Support"))
    } else {
        get_optional_env("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| get_optional_env("HOME").map(|h| PathBuf::from(h).join(".local/share")))
    };
    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_IDENTIFIER)
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}
