//! Error types for the till.
//!
//! Persistence failures never reach [`PosError`]: reads fall
//! back to defaults and writes are logged and swallowed inside `storage`.

use thiserror::Error;

/// Errors raised by catalog, cart and checkout actions.
#[derive(Debug, Error, PartialEq)]
pub enum PosError {
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Unknown product: {0}")]
    UnknownProduct(String),
    #[error("Invalid product: {0}")]
    InvalidProduct(String),
    #[error("Unknown category: {0}")]
    UnknownCategory(String),
    #[error("Category already exists: {0}")]
    DuplicateCategory(String),
    #[error("Category {0} still has products assigned")]
    CategoryInUse(String),
    #[error("Invalid category label")]
    InvalidCategory,
    #[error("Unknown bill number: {0}")]
    UnknownBill(u64),
    #[error("Invalid tax rate: {0}")]
    InvalidTaxRate(f64),
}

/// Errors from the SQLite key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create data dir: {0}")]
    DataDir(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Database open failed after retry: {0}")]
    OpenRetry(String),
    #[error("Storage lock poisoned")]
    Lock,
}

/// Errors from the thermal printer link.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrintError {
    #[error("Printer not connected")]
    NotConnected,
    #[error("Printer is busy with another request")]
    Busy,
    #[error("Could not pair with printer: {0}")]
    Pairing(String),
    #[error("Printer write failed after {chunks_sent} chunks: {reason}")]
    Write { chunks_sent: usize, reason: String },
    #[error("Printer task aborted: {0}")]
    Aborted(String),
    #[error("System print failed: {0}")]
    SystemPrint(String),
    #[error("No sale with bill number {0}")]
    UnknownBill(u64),
    #[error("No completed sale to print")]
    NoSale,
}

/// Configuration errors that can occur while reading the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

pub type PosResult<T> = Result<T, PosError>;
