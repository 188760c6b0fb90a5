use std::io;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{PosError, PosResult};
use crate::models::{ItemSummary, SaleRecord};
use crate::pricing::format_money;
use crate::print::layout_for;
use crate::receipt_renderer::{self, format_date, format_time};
use crate::reports::{self, HourlyTotal, MethodTotal, SalesSummary};
use crate::state::{Action, AppState, Outcome};

/// Bars shown in the top-items series.
const TOP_ITEMS: usize = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportView {
    date: Option<String>,
    summary: SalesSummary,
    payment_split: Vec<MethodTotal>,
    hourly: Vec<HourlyTotal>,
    top_items: Vec<ItemSummary>,
    items: Vec<ItemSummary>,
}

fn selected_sales(state: &AppState, day: Option<NaiveDate>) -> Vec<SaleRecord> {
    let sales = state.ledger().records();
    match day {
        Some(day) => reports::for_day(sales, day, state.config().utc_offset()),
        None => sales.to_vec(),
    }
}

// -- Report ------------------------------------------------------------------

/// Sales report over the whole ledger, or one local day when `day` is set.
pub fn report(state: &AppState, day: Option<NaiveDate>, json: bool) -> Result<String, serde_json::Error> {
    let sales = selected_sales(state, day);
    let offset = state.config().utc_offset();
    if json {
        let view = ReportView {
            date: day.map(|d| d.format("%Y-%m-%d").to_string()),
            summary: reports::summarize(&sales),
            payment_split: reports::payment_split(&sales),
            hourly: reports::hourly_sales(&sales, offset),
            top_items: reports::top_items(&sales, TOP_ITEMS),
            items: reports::item_summary(&sales),
        };
        return serde_json::to_string_pretty(&view);
    }
    let title = match day {
        Some(d) => format!("Sales report {}", d.format("%d/%m/%Y")),
        None => "Sales report (all bills)".to_string(),
    };
    Ok(reports::render_summary_text(&title, &sales, offset))
}

/// Newest bills first, at most `limit`.
pub fn history(state: &AppState, limit: usize) -> String {
    let offset = state.config().utc_offset();
    let sales = state.ledger().records();
    if sales.is_empty() {
        return "No sales yet\n".to_string();
    }
    reports::recent(sales)
        .into_iter()
        .take(limit)
        .map(|s| {
            format!(
                "#{:<6} {} {}  {:<4}  Rs. {:>9}  {} items\n",
                s.bill_no,
                format_date(s.timestamp, offset),
                format_time(s.timestamp, offset),
                s.payment_method.as_str(),
                format_money(s.total),
                s.item_count()
            )
        })
        .collect()
}

/// On-screen receipt for `bill_no`.
pub fn receipt(state: &AppState, bill_no: u64) -> PosResult<String> {
    let sale = state
        .ledger()
        .find_by_bill_no(bill_no)
        .ok_or(PosError::UnknownBill(bill_no))?;
    let layout = layout_for(state.config(), state.printer_config());
    Ok(receipt_renderer::render_text(sale, &layout))
}

// -- Export ------------------------------------------------------------------

/// Write the whole ledger as CSV. Without `out` the file lands in the
/// working directory under the dated default name.
pub fn export_csv(state: &AppState, out: Option<PathBuf>, today: NaiveDate) -> io::Result<PathBuf> {
    let path = out.unwrap_or_else(|| PathBuf::from(reports::csv_file_name(today)));
    reports::export_csv(state.ledger().records(), state.config().utc_offset(), &path)
}

// -- Reset -------------------------------------------------------------------

pub fn reset_ledger(state: &mut AppState, confirmed: bool) -> PosResult<String> {
    if !confirmed {
        return Ok(format!(
            "This permanently deletes {} bills. Re-run with --yes to confirm.",
            state.ledger().len()
        ));
    }
    match state.apply(Action::ResetLedger)? {
        Outcome::LedgerReset { cleared } => Ok(format!(
            "Cleared {cleared} bills. Next bill is #{}",
            state.ledger().next_bill_no()
        )),
        other => Ok(format!("{other:?}")),
    }
}
