//! Receipt print dispatch.
//!
//! With a Bluetooth printer configured the receipt is framed as ESC/POS and
//! streamed through the [`PrinterClient`]. Anything short of a complete
//! stream falls back to the generic print path, which spools an HTML copy
//! of the receipt under `<data_dir>/receipts`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PrintError;
use crate::ledger::Ledger;
use crate::models::{PrinterConfig, PrinterKind, SaleRecord};
use crate::printer::{PrinterClient, PrinterLink};
use crate::receipt_renderer::{self, LayoutConfig};

/// Result of one attempt on the Bluetooth path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOutcome {
    Printed { chunks: usize },
    ConnectFailed(String),
    WriteFailed { chunks_sent: usize, reason: String },
    NotConnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintRoute {
    Bluetooth,
    System,
    /// Bluetooth was attempted and the receipt went to the system path.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintReport {
    pub route: PrintRoute,
    pub bluetooth: Option<PrintOutcome>,
    pub spooled: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Generic print path
// ---------------------------------------------------------------------------

/// The host's generic print capability.
pub trait SystemPrint {
    /// Hand an HTML receipt to the host. Returns where it ended up.
    fn print_html(&self, sale: &SaleRecord, html: &str) -> Result<PathBuf, PrintError>;
}

/// Writes `<bill>_<timestamp>.html` into the receipts directory.
pub struct HtmlSpooler {
    receipts_dir: PathBuf,
}

impl HtmlSpooler {
    pub fn new(receipts_dir: &Path) -> Self {
        Self {
            receipts_dir: receipts_dir.to_path_buf(),
        }
    }
}

impl SystemPrint for HtmlSpooler {
    fn print_html(&self, sale: &SaleRecord, html: &str) -> Result<PathBuf, PrintError> {
        let receipts_dir = &self.receipts_dir;
        fs::create_dir_all(receipts_dir)
            .map_err(|e| PrintError::SystemPrint(format!("create receipts dir: {e}")))?;
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let file_path = receipts_dir.join(format!("{}_{timestamp}.html", sale.bill_no));
        fs::write(&file_path, html)
            .map_err(|e| PrintError::SystemPrint(format!("write receipt file: {e}")))?;
        info!(bill_no = sale.bill_no, path = %file_path.display(), "Receipt spooled");
        Ok(file_path)
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Receipt layout for the configured shop and paper.
pub fn layout_for(config: &Config, printer: PrinterConfig) -> LayoutConfig {
    LayoutConfig {
        paper_width: printer.paper_width.into(),
        store: config.store.clone(),
        tax_rate: config.tax_rate,
        utc_offset: config.utc_offset(),
    }
}

async fn try_bluetooth(
    client: &PrinterClient,
    connect_with: Option<Box<dyn PrinterLink>>,
    sale: &SaleRecord,
    layout: &LayoutConfig,
) -> PrintOutcome {
    if !client.is_connected() {
        let Some(link) = connect_with else {
            return PrintOutcome::NotConnected;
        };
        if let Err(e) = client.connect(link).await {
            return PrintOutcome::ConnectFailed(e.to_string());
        }
    }
    let bytes = receipt_renderer::render_escpos(sale, layout);
    match client.print(bytes).await {
        Ok(chunks) => PrintOutcome::Printed { chunks },
        Err(PrintError::NotConnected) => PrintOutcome::NotConnected,
        Err(PrintError::Write {
            chunks_sent,
            reason,
        }) => PrintOutcome::WriteFailed {
            chunks_sent,
            reason,
        },
        Err(other) => PrintOutcome::WriteFailed {
            chunks_sent: 0,
            reason: other.to_string(),
        },
    }
}

/// Print `sale` the configured way.
///
/// `connect_with` is paired first when the Bluetooth client is not connected.
/// Fails only when the generic print path itself fails.
pub async fn print_receipt(
    client: &PrinterClient,
    connect_with: Option<Box<dyn PrinterLink>>,
    system: &dyn SystemPrint,
    sale: &SaleRecord,
    printer: PrinterConfig,
    config: &Config,
) -> Result<PrintReport, PrintError> {
    let layout = layout_for(config, printer);

    let bluetooth = match printer.kind {
        PrinterKind::Bluetooth => {
            let outcome = try_bluetooth(client, connect_with, sale, &layout).await;
            if let PrintOutcome::Printed { .. } = outcome {
                return Ok(PrintReport {
                    route: PrintRoute::Bluetooth,
                    bluetooth: Some(outcome),
                    spooled: None,
                });
            }
            warn!(bill_no = sale.bill_no, outcome = ?outcome, "Bluetooth print failed, falling back");
            Some(outcome)
        }
        PrinterKind::System => None,
    };

    let html = receipt_renderer::render_html(sale, &layout);
    let path = system.print_html(sale, &html)?;
    Ok(PrintReport {
        route: if bluetooth.is_some() {
            PrintRoute::Fallback
        } else {
            PrintRoute::System
        },
        bluetooth,
        spooled: Some(path),
    })
}

/// Print an earlier sale again, looked up by bill number.
pub async fn reprint(
    ledger: &Ledger,
    bill_no: u64,
    client: &PrinterClient,
    connect_with: Option<Box<dyn PrinterLink>>,
    system: &dyn SystemPrint,
    printer: PrinterConfig,
    config: &Config,
) -> Result<PrintReport, PrintError> {
    let sale = ledger
        .find_by_bill_no(bill_no)
        .ok_or(PrintError::UnknownBill(bill_no))?;
    info!(bill_no, "Reprinting receipt");
    print_receipt(client, connect_with, system, sale, printer, config).await
}
