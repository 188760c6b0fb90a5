//! Receipt rendering for a finalized sale.
//!
//! One layout feeds three surfaces: fixed-width text for the terminal,
//! a self-contained HTML page for the generic print path, and the ESC/POS
//! byte stream for the Bluetooth thermal printer.

use chrono::{DateTime, FixedOffset, Utc};

use crate::escpos::{pad_end, pad_start, truncate, EscPosBuilder, PaperWidth};
use crate::models::{SaleRecord, StoreDetails};
use crate::pricing::{format_money, tax_label, TaxRate};

/// Everything about a receipt that is not part of the sale itself.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    pub paper_width: PaperWidth,
    pub store: StoreDetails,
    pub tax_rate: TaxRate,
    pub utc_offset: FixedOffset,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            paper_width: PaperWidth::Mm80,
            store: StoreDetails::default(),
            tax_rate: TaxRate::default(),
            utc_offset: crate::config::offset_from_minutes(crate::config::DEFAULT_UTC_OFFSET_MINUTES),
        }
    }
}

/// Columns reserved after the item name: space, quantity, space, amount(8).
const ITEM_TAIL: usize = 12;

// ---------------------------------------------------------------------------
// Date helpers
// ---------------------------------------------------------------------------

/// Ledger timestamp (epoch ms) in the shop's offset.
pub fn local_time(timestamp_ms: i64, offset: FixedOffset) -> DateTime<FixedOffset> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .unwrap_or_default()
        .with_timezone(&offset)
}

/// `16/10/2026`
pub fn format_date(timestamp_ms: i64, offset: FixedOffset) -> String {
    local_time(timestamp_ms, offset).format("%d/%m/%Y").to_string()
}

/// `02:35 PM`
pub fn format_time(timestamp_ms: i64, offset: FixedOffset) -> String {
    local_time(timestamp_ms, offset).format("%I:%M %p").to_string()
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

fn centered(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let left = (width - len) / 2;
    format!("{}{}", " ".repeat(left), text)
}

fn pair(label: &str, value: &str, width: usize) -> String {
    let gap = width.saturating_sub(label.chars().count() + value.chars().count()).max(1);
    format!("{label}{}{value}", " ".repeat(gap))
}

/// Plain-text receipt for on-screen display.
pub fn render_text(sale: &SaleRecord, cfg: &LayoutConfig) -> String {
    let width = cfg.paper_width.chars();
    let rule = "-".repeat(width);
    let name_width = width.saturating_sub(ITEM_TAIL);
    let mut lines = vec![
        centered(&cfg.store.name.to_uppercase(), width),
        centered(&cfg.store.tagline, width),
        centered(&format!("{} | GSTIN: {}", cfg.store.address, cfg.store.gstin), width),
        rule.clone(),
        format!("Bill No: {}", sale.bill_no),
        pair(
            &format!("Date: {}", format_date(sale.timestamp, cfg.utc_offset)),
            &format!("Time: {}", format_time(sale.timestamp, cfg.utc_offset)),
            width,
        ),
        rule.clone(),
        format!("{} {:>3} {:>7}", pad_end("Item", name_width), "Qty", "Amt"),
    ];
    for item in &sale.items {
        lines.push(format!(
            "{} {:>3} {:>7}",
            pad_end(&truncate(&item.product.name, name_width), name_width),
            item.quantity,
            format_money(item.line_total())
        ));
    }
    lines.push(rule.clone());
    lines.push(pair("Subtotal", &format_money(sale.subtotal), width));
    lines.push(pair(&tax_label(cfg.tax_rate), &format_money(sale.gst), width));
    lines.push(pair("TOTAL", &format!("Rs. {}", format_money(sale.total)), width));
    lines.push(rule.clone());
    lines.push(centered(&format!("Payment: {}", sale.payment_method), width));
    lines.push(String::new());
    lines.push(centered("Thank You!", width));
    lines.push(centered("Visit Again!", width));
    lines.push(rule);
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

fn esc(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn html_shell(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8"/>
<meta name="viewport" content="width=device-width, initial-scale=1.0"/>
<title>{}</title>
<style>
@page {{ size: 80mm auto; margin: 0; }}
body {{ font-family: ui-monospace, SFMono-Regular, Menlo, monospace; width: 80mm; margin: 0 auto; padding: 12px; background: #fff; color: #111; font-size: 11px; }}
.line {{ display: flex; justify-content: space-between; gap: 8px; }}
.rule {{ border-top: 1px dashed #555; margin: 6px 0; }}
.center {{ text-align: center; }}
.bold {{ font-weight: bold; }}
h1 {{ font-size: 15px; margin: 0; text-transform: uppercase; }}
.small {{ font-size: 9px; }}
table {{ width: 100%; border-collapse: collapse; }}
th, td {{ padding: 2px 0; }}
.qty {{ text-align: center; }}
.amt {{ text-align: right; }}
</style>
</head>
<body>{}</body>
</html>"#,
        esc(title),
        body
    )
}

/// Standalone HTML receipt sized for 80mm paper.
pub fn render_html(sale: &SaleRecord, cfg: &LayoutConfig) -> String {
    let mut body = format!(
        "<div class=\"center\"><h1>{}</h1><div>{}</div><div class=\"small\">{} | GSTIN: {}</div></div>",
        esc(&cfg.store.name),
        esc(&cfg.store.tagline),
        esc(&cfg.store.address),
        esc(&cfg.store.gstin)
    );
    body.push_str("<div class=\"rule\"></div>");
    body.push_str(&format!(
        "<div class=\"line\"><span>Bill No: {}</span></div>\
         <div class=\"line\"><span>Date: {}</span><span>Time: {}</span></div>",
        sale.bill_no,
        format_date(sale.timestamp, cfg.utc_offset),
        format_time(sale.timestamp, cfg.utc_offset)
    ));
    body.push_str("<div class=\"rule\"></div>");
    body.push_str(
        "<table><thead><tr><th align=\"left\">Item</th><th class=\"qty\">Qty</th>\
         <th class=\"amt\">Amt</th></tr></thead><tbody>",
    );
    for item in &sale.items {
        body.push_str(&format!(
            "<tr><td>{}</td><td class=\"qty\">{}</td><td class=\"amt\">{}</td></tr>",
            esc(&item.product.name),
            item.quantity,
            format_money(item.line_total())
        ));
    }
    body.push_str("</tbody></table><div class=\"rule\"></div>");
    body.push_str(&format!(
        "<div class=\"line\"><span>Subtotal</span><span>{}</span></div>\
         <div class=\"line\"><span>{}</span><span>{}</span></div>\
         <div class=\"line bold\"><span>TOTAL</span><span>&#8377; {}</span></div>",
        format_money(sale.subtotal),
        esc(&tax_label(cfg.tax_rate)),
        format_money(sale.gst),
        format_money(sale.total)
    ));
    body.push_str("<div class=\"rule\"></div>");
    body.push_str(&format!(
        "<div class=\"center bold\">Payment: {}</div>\
         <div class=\"center\"><p>Thank You!</p><p>Visit Again!</p></div>",
        sale.payment_method
    ));
    html_shell(&format!("Bill {}", sale.bill_no), &body)
}

// ---------------------------------------------------------------------------
// ESC/POS
// ---------------------------------------------------------------------------

/// Thermal-printer byte stream, ending in a feed and partial cut.
pub fn render_escpos(sale: &SaleRecord, cfg: &LayoutConfig) -> Vec<u8> {
    let width = cfg.paper_width.chars();
    let name_width = width.saturating_sub(ITEM_TAIL);
    let value_width = width.saturating_sub(10);
    let mut b = EscPosBuilder::new().with_paper(cfg.paper_width);

    b.init().center().bold(true).text_line(&cfg.store.name).bold(false);
    b.text_line(&cfg.store.tagline)
        .text_line(&cfg.store.address)
        .text_line(&format!("GSTIN: {}", cfg.store.gstin))
        .separator();

    b.left()
        .text_line(&format!("Bill: {}", sale.bill_no))
        .text_line(&format!(
            "Date: {} {}",
            format_date(sale.timestamp, cfg.utc_offset),
            format_time(sale.timestamp, cfg.utc_offset)
        ))
        .separator();

    for item in &sale.items {
        let name = truncate(&item.product.name, name_width);
        b.text_line(&format!(
            "{} {} {}",
            pad_end(&name, name_width),
            item.quantity,
            pad_start(&format_money(item.line_total()), 8)
        ));
    }

    b.separator();
    b.text_line(&format!("SUBTOTAL: {}", pad_start(&format_money(sale.subtotal), value_width)));
    let gst_label = pad_end(&format!("{}:", tax_label(cfg.tax_rate)), 10);
    b.text_line(&format!(
        "{gst_label}{}",
        pad_start(&format_money(sale.gst), width.saturating_sub(gst_label.len()))
    ));
    b.bold(true)
        .text_line(&format!(
            "TOTAL:    Rs.{}",
            pad_start(&format_money(sale.total), width.saturating_sub(13))
        ))
        .bold(false)
        .separator();

    b.center()
        .text_line(&format!("Payment: {}", sale.payment_method))
        .lf()
        .text_line("Thank You!")
        .text_line("Visit Again!")
        .feed_lines(3)
        .cut();

    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CartLine, PaymentMethod, Product};

    // 2023-11-14 22:13:20 UTC, 2023-11-15 03:43:20 at +05:30
    const TS: i64 = 1_700_000_000_000;

    fn sale() -> SaleRecord {
        let line = |id: &str, name: &str, price: f64, quantity: u32| CartLine {
            product: Product {
                id: id.to_string(),
                name: name.to_string(),
                price,
                category: "JUICES".to_string(),
                color: String::new(),
            },
            quantity,
        };
        SaleRecord {
            id: "sale-1".to_string(),
            bill_no: 1001,
            items: vec![
                line("j1", "Mango Juice", 80.0, 2),
                line("a1", "Extra Scoop Ice-cream With Extra Long Name", 30.0, 1),
            ],
            subtotal: 190.0,
            gst: 9.5,
            total: 199.5,
            payment_method: PaymentMethod::Upi,
            timestamp: TS,
        }
    }

    fn count_sequence(bytes: &[u8], seq: &[u8]) -> usize {
        bytes.windows(seq.len()).filter(|window| *window == seq).count()
    }

    fn text_lines(bytes: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(bytes)
            .split('\n')
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_dates_use_shop_offset() {
        let ist = crate::config::offset_from_minutes(330);
        assert_eq!(format_date(TS, ist), "15/11/2023");
        assert_eq!(format_time(TS, ist), "03:43 AM");
        let utc = crate::config::offset_from_minutes(0);
        assert_eq!(format_date(TS, utc), "14/11/2023");
    }

    #[test]
    fn test_escpos_frame_starts_and_ends_correctly() {
        let bytes = render_escpos(&sale(), &LayoutConfig::default());
        assert_eq!(&bytes[..8], &[0x1B, 0x40, 0x1B, 0x61, 1, 0x1B, 0x45, 1]);
        assert!(bytes.ends_with(&[0x0A, 0x0A, 0x0A, 0x1D, 0x56, 0x42, 0x00]));
        assert!(bytes.iter().all(u8::is_ascii));
    }

    #[test]
    fn test_escpos_item_and_total_lines_fill_width() {
        for paper in [PaperWidth::Mm58, PaperWidth::Mm80] {
            let cfg = LayoutConfig {
                paper_width: paper,
                ..LayoutConfig::default()
            };
            let width = paper.chars();
            let bytes = render_escpos(&sale(), &cfg);
            let lines = text_lines(&bytes);

            let mango = lines
                .iter()
                .find(|l| l.starts_with("Mango Juice"))
                .expect("mango line");
            // name column, space, one-digit quantity, space, amount(8)
            assert_eq!(mango.len(), width - 1);
            assert!(mango.ends_with(" 2   160.00"));

            let long = lines
                .iter()
                .find(|l| l.starts_with("Extra Scoop"))
                .expect("long item line");
            assert_eq!(long.len(), width - 1);

            let subtotal = lines
                .iter()
                .find(|l| l.starts_with("SUBTOTAL: "))
                .expect("subtotal line");
            assert_eq!(subtotal.len(), width);
            assert!(subtotal.ends_with("190.00"));

            let gst = lines.iter().find(|l| l.starts_with("GST(5%):")).expect("gst line");
            assert_eq!(gst.len(), width);
            assert!(gst.ends_with("9.50"));

            let total = lines
                .iter()
                .find_map(|l| l.find("TOTAL:    Rs.").map(|i| &l[i..]))
                .expect("total line");
            assert!(total.ends_with("199.50"));
            assert_eq!(total.len(), width);

            assert_eq!(count_sequence(&bytes, &"-".repeat(width).into_bytes()), 4);
        }
    }

    #[test]
    fn test_escpos_header_and_footer_text() {
        let bytes = render_escpos(&sale(), &LayoutConfig::default());
        let lines = text_lines(&bytes);
        assert!(lines.iter().any(|l| l == "GSTIN: 24XXXXX1234A1Z1"));
        assert!(lines.iter().any(|l| l.ends_with("Bill: 1001")));
        assert!(lines.iter().any(|l| l == "Date: 15/11/2023 03:43 AM"));
        assert!(lines.iter().any(|l| l.ends_with("Payment: UPI")));
        assert!(lines.iter().any(|l| l == "Thank You!"));
        assert!(lines.iter().any(|l| l == "Visit Again!"));
    }

    #[test]
    fn test_text_receipt_lists_every_item() {
        let out = render_text(&sale(), &LayoutConfig::default());
        assert!(out.contains("BAJRANG JUICE CENTER"));
        assert!(out.contains("Bill No: 1001"));
        assert!(out.contains("160.00"));
        assert!(out.contains("Rs. 199.50"));
        assert!(out.contains("GST(5%)"));
        assert!(out.contains("Payment: UPI"));
        assert!(out.lines().all(|l| l.chars().count() <= 48));
    }

    #[test]
    fn test_html_receipt_escapes_names() {
        let mut s = sale();
        s.items[0].product.name = "Mango & <Lime>".to_string();
        let html = render_html(&s, &LayoutConfig::default());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Mango &amp; &lt;Lime&gt;"));
        assert!(html.contains("Bill No: 1001"));
        assert!(html.contains("&#8377; 199.50"));
        assert!(html.contains("size: 80mm auto"));
    }
}
