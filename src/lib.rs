//! Juice POS - counter till backend
//!
//! Catalog, cart, GST pricing, an append-only sales ledger persisted in
//! SQLite, receipt rendering (text, HTML and ESC/POS), a Bluetooth thermal
//! printer client and sales reports with CSV export. The `juice-pos` binary
//! drives everything through [`commands`].

pub mod cart;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod escpos;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod pricing;
pub mod print;
pub mod printer;
pub mod receipt_renderer;
pub mod reports;
pub mod state;
pub mod storage;

pub use commands::Session;
pub use config::Config;
pub use error::{ConfigError, PosError, PrintError, StorageError};
pub use state::{Action, AppState, Outcome};
