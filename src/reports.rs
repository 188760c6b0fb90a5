//! Sales reporting over the ledger.
//!
//! Every figure is recomputed from the full list of sale records on each
//! call; nothing is cached or persisted. The chart helpers return the data
//! series a dashboard would plot (hourly totals, payment split, top items).

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;
use tracing::info;

use crate::models::{ItemSummary, PaymentMethod, SaleRecord};
use crate::pricing::format_money;
use crate::receipt_renderer::{format_date, local_time};

pub const CSV_HEADER: [&str; 7] = ["Bill No", "Date", "Time", "Payment", "Subtotal", "GST", "Total"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub revenue: f64,
    pub gst_collected: f64,
    pub count: usize,
    /// CASH, UPI and CARD totals, always all three.
    pub by_method: Vec<MethodTotal>,
    /// Cash expected in the drawer at close.
    pub cash_closing: f64,
    pub upi_share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyTotal {
    /// `H:00`, hour of day in the shop's offset.
    pub label: String,
    pub hour: u32,
    pub total: f64,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

pub fn summarize(sales: &[SaleRecord]) -> SalesSummary {
    let revenue: f64 = sales.iter().map(|s| s.total).sum();
    let gst_collected = sales.iter().map(|s| s.gst).sum();
    let by_method = payment_split(sales);
    let method_total = |m: PaymentMethod| {
        by_method
            .iter()
            .find(|t| t.method == m)
            .map_or(0.0, |t| t.total)
    };
    let cash_closing = method_total(PaymentMethod::Cash);
    let upi_share_pct = if revenue > 0.0 {
        method_total(PaymentMethod::Upi) / revenue * 100.0
    } else {
        0.0
    };
    SalesSummary {
        revenue,
        gst_collected,
        count: sales.len(),
        by_method,
        cash_closing,
        upi_share_pct,
    }
}

/// Per-method totals in `CASH, UPI, CARD` order.
pub fn payment_split(sales: &[SaleRecord]) -> Vec<MethodTotal> {
    PaymentMethod::ALL
        .iter()
        .map(|&method| MethodTotal {
            method,
            total: sales
                .iter()
                .filter(|s| s.payment_method == method)
                .map(|s| s.total)
                .sum(),
        })
        .collect()
}

/// Quantity and revenue per product id, highest revenue first.
///
/// Revenue uses the unit price captured on each sale, so later catalog edits
/// do not change history. The name is the one on the most recent sale.
pub fn item_summary(sales: &[SaleRecord]) -> Vec<ItemSummary> {
    let mut order: Vec<String> = Vec::new();
    let mut items: HashMap<String, ItemSummary> = HashMap::new();
    for line in sales.iter().flat_map(|s| s.items.iter()) {
        let entry = items.entry(line.product.id.clone()).or_insert_with(|| {
            order.push(line.product.id.clone());
            ItemSummary {
                product_id: line.product.id.clone(),
                name: line.product.name.clone(),
                quantity: 0,
                revenue: 0.0,
            }
        });
        entry.name.clone_from(&line.product.name);
        entry.quantity += u64::from(line.quantity);
        entry.revenue += line.line_total();
    }
    let mut summary: Vec<ItemSummary> = order
        .into_iter()
        .filter_map(|id| items.remove(&id))
        .collect();
    // Stable sort keeps first-sold order among equal revenues.
    summary.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    summary
}

/// The `n` best sellers by quantity.
pub fn top_items(sales: &[SaleRecord], n: usize) -> Vec<ItemSummary> {
    let mut items = item_summary(sales);
    items.sort_by(|a, b| b.quantity.cmp(&a.quantity));
    items.truncate(n);
    items
}

/// Revenue per hour of day, in hour order. Hours without sales are omitted.
pub fn hourly_sales(sales: &[SaleRecord], offset: FixedOffset) -> Vec<HourlyTotal> {
    let mut totals = [0.0f64; 24];
    let mut seen = [false; 24];
    for sale in sales {
        let hour = chrono::Timelike::hour(&local_time(sale.timestamp, offset)) as usize;
        totals[hour] += sale.total;
        seen[hour] = true;
    }
    (0..24u32)
        .filter(|&h| seen[h as usize])
        .map(|hour| HourlyTotal {
            label: format!("{hour}:00"),
            hour,
            total: totals[hour as usize],
        })
        .collect()
}

/// Newest first.
pub fn recent(sales: &[SaleRecord]) -> Vec<&SaleRecord> {
    sales.iter().rev().collect()
}

/// Sales whose local date is `day`.
pub fn for_day(sales: &[SaleRecord], day: NaiveDate, offset: FixedOffset) -> Vec<SaleRecord> {
    sales
        .iter()
        .filter(|s| local_time(s.timestamp, offset).date_naive() == day)
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Text report
// ---------------------------------------------------------------------------

/// Plain-text end-of-day report.
pub fn render_summary_text(title: &str, sales: &[SaleRecord], offset: FixedOffset) -> String {
    let summary = summarize(sales);
    let mut out = String::new();
    out.push_str(&format!("{title}\n"));
    out.push_str(&format!("{}\n", "=".repeat(title.chars().count().max(32))));
    out.push_str(&format!("Bills:          {}\n", summary.count));
    out.push_str(&format!("Revenue:        Rs. {}\n", format_money(summary.revenue)));
    out.push_str(&format!("GST collected:  Rs. {}\n", format_money(summary.gst_collected)));
    out.push_str(&format!("Cash closing:   Rs. {}\n", format_money(summary.cash_closing)));
    out.push_str(&format!("UPI share:      {:.1}%\n", summary.upi_share_pct));

    out.push_str("\nPayment split\n");
    for m in &summary.by_method {
        out.push_str(&format!("  {:<6} Rs. {:>10}\n", m.method.as_str(), format_money(m.total)));
    }

    let hourly = hourly_sales(sales, offset);
    if !hourly.is_empty() {
        out.push_str("\nHourly sales\n");
        for h in &hourly {
            out.push_str(&format!("  {:>5}  Rs. {:>10}\n", h.label, format_money(h.total)));
        }
    }

    let items = item_summary(sales);
    if !items.is_empty() {
        out.push_str("\nItems sold\n");
        for item in &items {
            out.push_str(&format!(
                "  {:<28} {:>4}  Rs. {:>10}\n",
                item.name,
                item.quantity,
                format_money(item.revenue)
            ));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Quote a field when it holds a comma, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// One header row plus one row per sale, in ledger order.
pub fn to_csv(sales: &[SaleRecord], offset: FixedOffset) -> String {
    let mut rows = Vec::with_capacity(sales.len() + 1);
    rows.push(csv_row(CSV_HEADER));
    for s in sales {
        rows.push(csv_row([
            s.bill_no.to_string(),
            format_date(s.timestamp, offset),
            local_time(s.timestamp, offset).format("%I:%M:%S %p").to_string(),
            s.payment_method.to_string(),
            format_money(s.subtotal),
            format_money(s.gst),
            format_money(s.total),
        ]));
    }
    rows.join("\n")
}

/// `Sales_Report_2026-10-16.csv`
pub fn csv_file_name(day: NaiveDate) -> String {
    format!("Sales_Report_{}.csv", day.format("%Y-%m-%d"))
}

/// Write the CSV report to `path`, creating parent directories.
pub fn export_csv(sales: &[SaleRecord], offset: FixedOffset, path: &Path) -> io::Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_csv(sales, offset))?;
    info!(rows = sales.len(), path = %path.display(), "Sales report exported");
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CartLine, Product};

    const IST_MINUTES: i32 = 330;
    // 2023-11-15 03:43:20 +05:30
    const TS: i64 = 1_700_000_000_000;
    const HOUR_MS: i64 = 3_600_000;

    fn ist() -> FixedOffset {
        crate::config::offset_from_minutes(IST_MINUTES)
    }

    fn line(id: &str, name: &str, price: f64, quantity: u32) -> CartLine {
        CartLine {
            product: Product {
                id: id.to_string(),
                name: name.to_string(),
                price,
                category: "JUICES".to_string(),
                color: String::new(),
            },
            quantity,
        }
    }

    fn sale(bill_no: u64, items: Vec<CartLine>, method: PaymentMethod, timestamp: i64) -> SaleRecord {
        let subtotal: f64 = items.iter().map(CartLine::line_total).sum();
        SaleRecord {
            id: format!("id-{bill_no}"),
            bill_no,
            items,
            subtotal,
            gst: subtotal * 0.05,
            total: subtotal * 1.05,
            payment_method: method,
            timestamp,
        }
    }

    fn sample() -> Vec<SaleRecord> {
        vec![
            sale(1001, vec![line("j1", "Mango Juice", 80.0, 2)], PaymentMethod::Cash, TS),
            sale(
                1002,
                vec![line("s1", "Strawberry Shake", 120.0, 1), line("a1", "Extra Scoop", 30.0, 3)],
                PaymentMethod::Upi,
                TS + HOUR_MS,
            ),
            sale(1003, vec![line("j1", "Mango Juice", 80.0, 1)], PaymentMethod::Card, TS + 10 * 60_000),
        ]
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_ledger_reports_zero() {
        let summary = summarize(&[]);
        assert_eq!(summary.count, 0);
        assert!(close(summary.revenue, 0.0));
        assert!(close(summary.upi_share_pct, 0.0));
        assert_eq!(summary.by_method.len(), 3);
        assert!(item_summary(&[]).is_empty());
        assert!(hourly_sales(&[], ist()).is_empty());
        assert_eq!(to_csv(&[], ist()), CSV_HEADER.join(","));
    }

    #[test]
    fn test_summary_totals_and_methods() {
        let summary = summarize(&sample());
        assert_eq!(summary.count, 3);
        // (160 + 210 + 80) * 1.05
        assert!(close(summary.revenue, 472.5));
        assert!(close(summary.gst_collected, 22.5));
        assert!(close(summary.cash_closing, 168.0));
        assert!(close(summary.by_method[1].total, 220.5));
        assert!(close(summary.upi_share_pct, 220.5 / 472.5 * 100.0));
    }

    #[test]
    fn test_item_summary_sorted_by_revenue() {
        let items = item_summary(&sample());
        let ids: Vec<_> = items.iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, vec!["j1", "s1", "a1"]);
        assert_eq!(items[0].quantity, 3);
        assert!(close(items[0].revenue, 240.0));

        let top = top_items(&sample(), 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].product_id, "j1");
    }

    #[test]
    fn test_hourly_sales_use_shop_offset() {
        let hourly = hourly_sales(&sample(), ist());
        let labels: Vec<_> = hourly.iter().map(|h| h.label.as_str()).collect();
        assert_eq!(labels, vec!["3:00", "4:00"]);
        assert!(close(hourly[0].total, 168.0 + 84.0));

        let utc = hourly_sales(&sample(), crate::config::offset_from_minutes(0));
        assert_eq!(utc[0].label, "22:00");
    }

    #[test]
    fn test_recent_is_newest_first() {
        let sales = sample();
        let bills: Vec<_> = recent(&sales).iter().map(|s| s.bill_no).collect();
        assert_eq!(bills, vec![1003, 1002, 1001]);
    }

    #[test]
    fn test_for_day_filters_by_local_date() {
        let sales = sample();
        let day = NaiveDate::from_ymd_opt(2023, 11, 15).expect("date");
        assert_eq!(for_day(&sales, day, ist()).len(), 3);
        assert!(for_day(&sales, day, crate::config::offset_from_minutes(0)).is_empty());
    }

    #[test]
    fn test_csv_has_one_row_per_sale() {
        let csv = to_csv(&sample(), ist());
        let rows: Vec<_> = csv.lines().collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], "Bill No,Date,Time,Payment,Subtotal,GST,Total");
        assert_eq!(rows[1], "1001,15/11/2023,03:43:20 AM,CASH,160.00,8.00,168.00");
    }

    #[test]
    fn test_csv_quotes_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_file_name_uses_iso_date() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 16).expect("date");
        assert_eq!(csv_file_name(day), "Sales_Report_2026-10-16.csv");
    }

    #[test]
    fn test_export_writes_file() {
        let dir = std::env::temp_dir().join(format!("juice_pos_csv_{}", uuid::Uuid::new_v4()));
        let path = dir.join("out").join("report.csv");
        export_csv(&sample(), ist(), &path).expect("export");
        let written = fs::read_to_string(&path).expect("read");
        assert_eq!(written.lines().count(), 4);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_summary_text_mentions_totals() {
        let text = render_summary_text("DAY REPORT", &sample(), ist());
        assert!(text.contains("Bills:          3"));
        assert!(text.contains("Rs. 472.50"));
        assert!(text.contains("Mango Juice"));
        assert!(text.contains("3:00"));
    }
}
