//! Domain types shared across the till.
//!
//! Field names serialize in camelCase so the persisted JSON keeps the layout
//! written by earlier builds of the till (`billNo`, `paymentMethod`, ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Style token applied to products created without one.
pub const NEUTRAL_COLOR: &str = "bg-gray-50 border-gray-200 text-gray-800";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub category: String,
    #[serde(default = "neutral_color")]
    pub color: String,
}

fn neutral_color() -> String {
    NEUTRAL_COLOR.to_string()
}

/// Editable product fields. `id` is never part of a draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub price: f64,
    pub category: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> f64 {
        self.product.price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    Cash,
    Upi,
    Card,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [PaymentMethod::Cash, PaymentMethod::Upi, PaymentMethod::Card];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Upi => "UPI",
            PaymentMethod::Card => "CARD",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CASH" => Ok(PaymentMethod::Cash),
            "UPI" => Ok(PaymentMethod::Upi),
            "CARD" => Ok(PaymentMethod::Card),
            other => Err(format!("Unknown payment method: {other}")),
        }
    }
}

/// A finalized sale. Immutable once appended to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaleRecord {
    pub id: String,
    #[serde(with = "bill_no")]
    pub bill_no: u64,
    pub items: Vec<CartLine>,
    pub subtotal: f64,
    pub gst: f64,
    pub total: f64,
    pub payment_method: PaymentMethod,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

impl SaleRecord {
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }
}

/// Bill numbers are written as decimal strings; older ledgers may hold plain
/// numbers, so both are accepted on read.
mod bill_no {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|e| de::Error::custom(format!("invalid bill number {s:?}: {e}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub product_id: String,
    pub name: String,
    pub quantity: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrinterKind {
    Bluetooth,
    #[default]
    System,
}

impl FromStr for PrinterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BLUETOOTH" | "BT" => Ok(PrinterKind::Bluetooth),
            "SYSTEM" => Ok(PrinterKind::System),
            other => Err(format!("Unknown printer type: {other}")),
        }
    }
}

impl fmt::Display for PrinterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrinterKind::Bluetooth => "BLUETOOTH",
            PrinterKind::System => "SYSTEM",
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PaperSize {
    #[serde(rename = "58mm")]
    Mm58,
    #[default]
    #[serde(rename = "80mm")]
    Mm80,
}

impl FromStr for PaperSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().trim_end_matches("mm") {
            "58" => Ok(PaperSize::Mm58),
            "80" => Ok(PaperSize::Mm80),
            other => Err(format!("Unsupported paper width: {other}")),
        }
    }
}

impl fmt::Display for PaperSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaperSize::Mm58 => "58mm",
            PaperSize::Mm80 => "80mm",
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PrinterConfig {
    #[serde(rename = "type")]
    pub kind: PrinterKind,
    pub paper_width: PaperSize,
}

/// Receipt header details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDetails {
    pub name: String,
    pub tagline: String,
    pub address: String,
    pub gstin: String,
}

impl Default for StoreDetails {
    fn default() -> Self {
        Self {
            name: "BAJRANG JUICE CENTER".to_string(),
            tagline: "Fresh Juice & Thick Shakes".to_string(),
            address: "Jamnagar, Gujarat".to_string(),
            gstin: "24XXXXX1234A1Z1".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_record_uses_source_json_layout() {
        let sale = SaleRecord {
            id: "s-1".to_string(),
            bill_no: 1001,
            items: vec![],
            subtotal: 0.0,
            gst: 0.0,
            total: 0.0,
            payment_method: PaymentMethod::Upi,
            timestamp: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&sale).expect("serialize");
        assert_eq!(json["billNo"], "1001");
        assert_eq!(json["paymentMethod"], "UPI");
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_bill_no_accepts_number_or_string() {
        let raw = r#"{"id":"a","billNo":1002,"items":[],"subtotal":0,"gst":0,"total":0,
                      "paymentMethod":"CASH","timestamp":0}"#;
        let sale: SaleRecord = serde_json::from_str(raw).expect("numeric bill");
        assert_eq!(sale.bill_no, 1002);

        let raw = raw.replace("1002", "\"1003\"");
        let sale: SaleRecord = serde_json::from_str(&raw).expect("string bill");
        assert_eq!(sale.bill_no, 1003);
    }

    #[test]
    fn test_cart_line_flattens_product() {
        let raw = r#"{"id":"j1","name":"Mango Juice","price":80,"category":"JUICES",
                      "color":"x","quantity":2}"#;
        let line: CartLine = serde_json::from_str(raw).expect("parse line");
        assert_eq!(line.product.id, "j1");
        assert_eq!(line.quantity, 2);
        assert!((line.line_total() - 160.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("cash".parse::<PaymentMethod>(), Ok(PaymentMethod::Cash));
        assert_eq!(" Upi ".parse::<PaymentMethod>(), Ok(PaymentMethod::Upi));
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_printer_config_layout() {
        let cfg = PrinterConfig {
            kind: PrinterKind::Bluetooth,
            paper_width: PaperSize::Mm58,
        };
        let json = serde_json::to_value(cfg).expect("serialize");
        assert_eq!(json, serde_json::json!({"type": "BLUETOOTH", "paperWidth": "58mm"}));
        assert_eq!(PrinterConfig::default().kind, PrinterKind::System);
        assert_eq!("58mm".parse::<PaperSize>(), Ok(PaperSize::Mm58));
    }
}
