use tracing::info;

use super::Session;
use crate::error::{PosResult, PrintError};
use crate::escpos::EscPosBuilder;
use crate::models::{PaperSize, PrinterConfig, PrinterKind};
use crate::print::{self, PrintOutcome, PrintReport, PrintRoute};
use crate::printer::{self, THERMAL_PRINTER_SERVICE_UUID};
use crate::state::{Action, AppState, Outcome};

// -- Discovery and connection ------------------------------------------------

pub fn ports() -> Result<String, PrintError> {
    let found = printer::discover_bluetooth_ports()?;
    if found.is_empty() {
        return Ok(format!(
            "No Bluetooth serial ports found. Without JUICE_POS_PRINTER_PORT the till scans for printers exposing service {THERMAL_PRINTER_SERVICE_UUID}.\n"
        ));
    }
    Ok(found.into_iter().map(|p| format!("{p}\n")).collect())
}

/// Pair with the configured printer and keep the connection on the session.
pub async fn connect(session: &Session) -> Result<String, PrintError> {
    let link = session.printer_link()?;
    session.printer.connect(link).await?;
    let target = session.printer.description().unwrap_or_default();
    info!(target = %target, "Printer connected from CLI");
    Ok(format!("Connected to {target}"))
}

/// Short test page on the connected printer. Returns the chunks sent.
pub async fn test_page(session: &Session) -> Result<usize, PrintError> {
    let state = &session.state;
    let mut b = EscPosBuilder::new().with_paper(state.printer_config().paper_width.into());
    b.init()
        .center()
        .bold(true)
        .text_line(&state.config().store.name.to_uppercase())
        .bold(false)
        .text_line("Printer test")
        .separator()
        .left()
        .line_pair("Paper", &state.printer_config().paper_width.to_string())
        .feed_lines(3)
        .cut();
    session.printer.print(b.build()).await
}

pub fn disconnect(session: &Session) -> Result<String, PrintError> {
    session.printer.disconnect()?;
    Ok("Printer disconnected".to_string())
}

// -- Settings ----------------------------------------------------------------

fn describe_config(config: PrinterConfig) -> String {
    format!("Printer: {} ({} paper)", config.kind, config.paper_width)
}

/// Show the saved settings, or change whichever of `kind`/`paper` is given.
pub fn config(state: &mut AppState, kind: Option<PrinterKind>, paper: Option<PaperSize>) -> PosResult<String> {
    let current = state.printer_config();
    if kind.is_none() && paper.is_none() {
        return Ok(describe_config(current));
    }
    let updated = PrinterConfig {
        kind: kind.unwrap_or(current.kind),
        paper_width: paper.unwrap_or(current.paper_width),
    };
    match state.apply(Action::SetPrinterConfig(updated))? {
        Outcome::PrinterConfigSaved(saved) => Ok(format!("Saved. {}", describe_config(saved))),
        other => Ok(format!("{other:?}")),
    }
}

// -- Printing ----------------------------------------------------------------

pub fn describe_report(report: &PrintReport) -> String {
    let reason = match &report.bluetooth {
        Some(PrintOutcome::ConnectFailed(reason)) => format!("could not connect: {reason}"),
        Some(PrintOutcome::WriteFailed {
            chunks_sent,
            reason,
        }) => format!("write failed after {chunks_sent} chunks: {reason}"),
        Some(PrintOutcome::NotConnected) => "printer not connected".to_string(),
        Some(PrintOutcome::Printed { chunks }) => format!("{chunks} chunks"),
        None => String::new(),
    };
    let spooled = report
        .spooled
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    match report.route {
        PrintRoute::Bluetooth => format!("Printed on Bluetooth printer ({reason})"),
        PrintRoute::System => format!("Sent to system printer: {spooled}"),
        PrintRoute::Fallback => format!("Bluetooth print failed ({reason}); sent to system printer: {spooled}"),
    }
}

/// Print the receipt of the sale just completed.
pub async fn print_current(session: &Session) -> Result<String, PrintError> {
    let state = &session.state;
    let sale = state.current_sale().ok_or(PrintError::NoSale)?;
    let report = print::print_receipt(
        &session.printer,
        session.auto_connect_link(),
        session.system.as_ref(),
        sale,
        state.printer_config(),
        state.config(),
    )
    .await?;
    Ok(describe_report(&report))
}

pub async fn reprint(session: &Session, bill_no: u64) -> Result<String, PrintError> {
    let state = &session.state;
    let report = print::reprint(
        state.ledger(),
        bill_no,
        &session.printer,
        session.auto_connect_link(),
        session.system.as_ref(),
        state.printer_config(),
        state.config(),
    )
    .await?;
    Ok(describe_report(&report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::session;
    use crate::models::PaymentMethod;
    use crate::printer::testing::RecordingLink;
    use std::path::PathBuf;

    fn checkout(session: &mut Session) -> u64 {
        session
            .state
            .apply(Action::AddToCart("j1".to_string()))
            .expect("add");
        match session
            .state
            .apply(Action::Checkout(PaymentMethod::Cash))
            .expect("checkout")
        {
            Outcome::SaleCompleted(sale) => sale.bill_no,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_config_show_and_update() {
        let (mut session, _) = session();
        assert_eq!(
            config(&mut session.state, None, None).expect("show"),
            "Printer: SYSTEM (80mm paper)"
        );
        assert_eq!(
            config(&mut session.state, Some(PrinterKind::Bluetooth), None).expect("set"),
            "Saved. Printer: BLUETOOTH (80mm paper)"
        );
        assert_eq!(
            config(&mut session.state, None, Some(PaperSize::Mm58)).expect("set"),
            "Saved. Printer: BLUETOOTH (58mm paper)"
        );
    }

    #[tokio::test]
    async fn test_print_current_requires_sale() {
        let (session, _) = session();
        assert_eq!(print_current(&session).await, Err(PrintError::NoSale));
    }

    #[tokio::test]
    async fn test_system_print_spools() {
        let (mut session, spooler) = session();
        let bill = checkout(&mut session);
        let out = print_current(&session).await.expect("print");
        assert_eq!(out, format!("Sent to system printer: memory/{bill}.html"));
        assert_eq!(*spooler.jobs.lock().expect("lock"), vec![bill]);
    }

    #[tokio::test]
    async fn test_bluetooth_reprint_streams_chunks() {
        let (mut session, spooler) = session();
        config(&mut session.state, Some(PrinterKind::Bluetooth), Some(PaperSize::Mm58)).expect("set");
        let bill = checkout(&mut session);

        let link = RecordingLink::default();
        let written = link.written();
        session.printer.connect(Box::new(link)).await.expect("connect");

        let out = reprint(&session, bill).await.expect("reprint");
        assert!(out.starts_with("Printed on Bluetooth printer ("));
        assert!(!written.lock().expect("lock").is_empty());
        assert!(spooler.jobs.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn test_reprint_unknown_bill() {
        let (session, _) = session();
        assert_eq!(reprint(&session, 4242).await, Err(PrintError::UnknownBill(4242)));
    }

    #[tokio::test]
    async fn test_test_page_on_58mm() {
        let (mut session, _) = session();
        config(&mut session.state, None, Some(PaperSize::Mm58)).expect("set");
        assert_eq!(test_page(&session).await, Err(PrintError::NotConnected));

        let link = RecordingLink::default();
        let written = link.written();
        session.printer.connect(Box::new(link)).await.expect("connect");
        let chunks = test_page(&session).await.expect("print");

        let bytes: Vec<u8> = written.lock().expect("lock").concat();
        assert_eq!(chunks, bytes.len().div_ceil(20));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Printer test"));
        assert!(text.contains(&"-".repeat(32)));
    }

    #[test]
    fn test_describe_fallback() {
        let report = PrintReport {
            route: PrintRoute::Fallback,
            bluetooth: Some(PrintOutcome::WriteFailed {
                chunks_sent: 3,
                reason: "link lost".to_string(),
            }),
            spooled: Some(PathBuf::from("receipts/1001.html")),
        };
        assert_eq!(
            describe_report(&report),
            "Bluetooth print failed (write failed after 3 chunks: link lost); sent to system printer: receipts/1001.html"
        );
    }
}
