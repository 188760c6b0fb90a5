//! Command handlers behind the `juice-pos` binary.
//!
//! Handlers return the text to show; the caller writes it out.

pub mod menu;
pub mod printer;
pub mod reports;
pub mod till;

use tracing::{info, warn};

use crate::config::Config;
use crate::db;
use crate::error::{PrintError, StorageError};
use crate::models::PrinterKind;
use crate::print::{HtmlSpooler, SystemPrint};
use crate::printer::{GattLink, PrinterClient, PrinterLink, SerialLink};
use crate::state::AppState;
use crate::storage::Storage;

/// Everything one invocation of the till works with.
pub struct Session {
    pub state: AppState,
    pub printer: PrinterClient,
    pub system: Box<dyn SystemPrint + Send + Sync>,
}

impl Session {
    /// Open the on-disk database under `config.data_dir`.
    pub fn open(config: Config) -> Result<Self, StorageError> {
        let db = db::init(&config.data_dir)?;
        info!(data_dir = %config.data_dir.display(), "Session opened");
        Ok(Self::with_storage(Storage::new(db), config))
    }

    pub fn with_storage(storage: Storage, config: Config) -> Self {
        let system = Box::new(HtmlSpooler::new(&config.receipts_dir()));
        Self {
            state: AppState::load(storage, config),
            printer: PrinterClient::new(),
            system,
        }
    }

    /// The serial link for the configured port, otherwise a Bluetooth LE
    /// scan for the printer service.
    pub fn printer_link(&self) -> Result<Box<dyn PrinterLink>, PrintError> {
        let config = self.state.config();
        match &config.printer_port {
            Some(port) => Ok(Box::new(SerialLink::new(port, config.printer_baud))),
            None => Ok(Box::new(GattLink::current()?)),
        }
    }

    /// Link used to auto-connect before a Bluetooth print. `None` for the
    /// system printer, when already connected, or when no link can be built.
    pub(crate) fn auto_connect_link(&self) -> Option<Box<dyn PrinterLink>> {
        if self.state.printer_config().kind != PrinterKind::Bluetooth || self.printer.is_connected() {
            return None;
        }
        match self.printer_link() {
            Ok(link) => Some(link),
            Err(e) => {
                warn!(error = %e, "No printer link for auto-connect");
                None
            }
        }
    }
}
