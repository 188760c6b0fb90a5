//! Typed persistence for catalog, categories, ledger and printer settings.
//!
//! Each collection lives under its own key as a JSON blob. Reads never fail:
//! a missing key yields the default, a blob that does not parse or fails
//! validation is logged and replaced by the default. Writes are best-effort
//! and only logged on failure.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::{self, valid_price};
use crate::db::{self, DbState};
use crate::error::StorageError;
use crate::models::{PrinterConfig, Product, SaleRecord};

pub const KEY_PRODUCTS: &str = "bjc_pos_products";
pub const KEY_CATEGORIES: &str = "bjc_pos_categories";
pub const KEY_SALES: &str = "bjc_pos_sales";
pub const KEY_PRINTER: &str = "bjc_pos_printer";

pub struct Storage {
    db: DbState,
}

impl Storage {
    pub fn new(db: DbState) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DbState {
        &self.db
    }

    // -----------------------------------------------------------------------
    // Raw access
    // -----------------------------------------------------------------------

    fn read_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.db.conn.lock().map_err(|_| StorageError::Lock)?;
        db::get_value(&conn, key)
    }

    fn write_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.db.conn.lock().map_err(|_| StorageError::Lock)?;
        db::set_value(&conn, key, value)
    }

    fn remove_raw(&self, key: &str) -> Result<bool, StorageError> {
        let conn = self.db.conn.lock().map_err(|_| StorageError::Lock)?;
        db::remove_value(&conn, key)
    }

    /// Read and validate `key`, substituting `default()` on any failure.
    fn load_or<T, V, D>(&self, key: &str, validate: V, default: D) -> T
    where
        T: DeserializeOwned,
        V: FnOnce(&T) -> Result<(), String>,
        D: FnOnce() -> T,
    {
        let raw = match self.read_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "no stored value, using default");
                return default();
            }
            Err(e) => {
                warn!(key, error = %e, "storage read failed, using default");
                return default();
            }
        };
        let parsed: T = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, error = %e, "stored value is malformed, using default");
                return default();
            }
        };
        if let Err(reason) = validate(&parsed) {
            warn!(key, reason = %reason, "stored value failed validation, using default");
            return default();
        }
        parsed
    }

    /// Serialize and store `value`. Failures are logged, never returned.
    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize value for storage");
                return;
            }
        };
        if let Err(e) = self.write_raw(key, &json) {
            warn!(key, error = %e, "storage write failed");
        }
    }

    // -----------------------------------------------------------------------
    // Typed collections
    // -----------------------------------------------------------------------

    pub fn load_products(&self) -> Vec<Product> {
        self.load_or(KEY_PRODUCTS, |p| validate_products(p), catalog::default_products)
    }

    pub fn save_products(&self, products: &[Product]) {
        self.save(KEY_PRODUCTS, products);
    }

    pub fn load_categories(&self) -> Vec<String> {
        self.load_or(
            KEY_CATEGORIES,
            |c| validate_categories(c),
            catalog::default_categories,
        )
    }

    pub fn save_categories(&self, categories: &[String]) {
        self.save(KEY_CATEGORIES, categories);
    }

    pub fn load_sales(&self) -> Vec<SaleRecord> {
        self.load_or(KEY_SALES, |s| validate_sales(s), Vec::new)
    }

    pub fn save_sales(&self, sales: &[SaleRecord]) {
        self.save(KEY_SALES, sales);
    }

    /// Drop the persisted ledger so the next load starts empty.
    pub fn clear_ledger(&self) {
        if let Err(e) = self.remove_raw(KEY_SALES) {
            warn!(key = KEY_SALES, error = %e, "failed to remove stored ledger");
        }
    }

    pub fn load_printer_config(&self) -> PrinterConfig {
        self.load_or(KEY_PRINTER, |_| Ok(()), PrinterConfig::default)
    }

    pub fn save_printer_config(&self, config: &PrinterConfig) {
        self.save(KEY_PRINTER, config);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_products(products: &[Product]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for p in products {
        if p.id.trim().is_empty() {
            return Err("product with empty id".to_string());
        }
        if !seen.insert(p.id.as_str()) {
            return Err(format!("duplicate product id {}", p.id));
        }
        if p.name.trim().is_empty() {
            return Err(format!("product {} has no name", p.id));
        }
        if !valid_price(p.price) {
            return Err(format!("product {} has invalid price {}", p.id, p.price));
        }
        if p.category.trim().is_empty() {
            return Err(format!("product {} has no category", p.id));
        }
    }
    Ok(())
}

fn validate_categories(categories: &[String]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for c in categories {
        if c.trim().is_empty() {
            return Err("empty category label".to_string());
        }
        if !seen.insert(c.as_str()) {
            return Err(format!("duplicate category {c}"));
        }
    }
    Ok(())
}

fn validate_sales(sales: &[SaleRecord]) -> Result<(), String> {
    for s in sales {
        if s.items.is_empty() {
            return Err(format!("bill {} has no items", s.bill_no));
        }
        if let Some(line) = s.items.iter().find(|l| l.quantity == 0) {
            return Err(format!("bill {} has zero quantity for {}", s.bill_no, line.product.id));
        }
        if let Some(line) = s.items.iter().find(|l| !valid_price(l.product.price)) {
            return Err(format!("bill {} has invalid price for {}", s.bill_no, line.product.id));
        }
        if ![s.subtotal, s.gst, s.total].iter().all(|v| v.is_finite()) {
            return Err(format!("bill {} has non-finite totals", s.bill_no));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CartLine, PaperSize, PaymentMethod, PrinterKind};

    fn storage() -> Storage {
        Storage::new(db::init_in_memory().expect("in-memory db"))
    }

    fn sale(bill_no: u64) -> SaleRecord {
        let product = catalog::default_products().remove(0);
        SaleRecord {
            id: format!("sale-{bill_no}"),
            bill_no,
            items: vec![CartLine {
                product,
                quantity: 2,
            }],
            subtotal: 160.0,
            gst: 8.0,
            total: 168.0,
            payment_method: PaymentMethod::Cash,
            timestamp: 1_700_000_000_000 + bill_no as i64,
        }
    }

    #[test]
    fn test_defaults_when_absent() {
        let storage = storage();
        assert_eq!(storage.load_products(), catalog::default_products());
        assert_eq!(storage.load_categories(), catalog::default_categories());
        assert!(storage.load_sales().is_empty());
        assert_eq!(storage.load_printer_config(), PrinterConfig::default());
    }

    #[test]
    fn test_ledger_round_trip_preserves_order() {
        let storage = storage();
        let sales: Vec<SaleRecord> = (1001..1013).map(sale).collect();
        storage.save_sales(&sales);
        assert_eq!(storage.load_sales(), sales);
    }

    #[test]
    fn test_ledger_with_decimal_prices_reloads_exactly() {
        use crate::cart::Cart;
        use crate::ledger::Ledger;
        use crate::pricing::TaxRate;

        let storage = storage();
        let mut ledger = Ledger::default();
        let prices = [623.6, 49.99, 0.1, 12.35, 1964.34 / 3.0, 77.77, 18.05];
        for (i, price) in prices.iter().enumerate() {
            let product = Product {
                id: format!("p{i}"),
                name: format!("Item {i}"),
                price: *price,
                category: "JUICES".to_string(),
                color: String::new(),
            };
            let mut cart = Cart::new();
            for _ in 0..=i {
                cart.add(&product);
            }
            ledger
                .checkout(&cart, PaymentMethod::Upi, TaxRate::default(), 1_700_000_000_000 + i as i64)
                .expect("checkout");
        }

        storage.save_sales(ledger.records());
        let reloaded = storage.load_sales();
        assert_eq!(reloaded, ledger.records());
        for (a, b) in reloaded.iter().zip(ledger.records()) {
            assert_eq!(a.total.to_bits(), b.total.to_bits());
            assert_eq!(a.gst.to_bits(), b.gst.to_bits());
        }
    }

    #[test]
    fn test_malformed_json_falls_back() {
        let storage = storage();
        storage.write_raw(KEY_PRODUCTS, "{not json").expect("write");
        storage.write_raw(KEY_SALES, "{\"oops\": true}").expect("write");
        assert_eq!(storage.load_products(), catalog::default_products());
        assert!(storage.load_sales().is_empty());
    }

    #[test]
    fn test_invalid_shape_falls_back() {
        let storage = storage();
        let mut products = catalog::default_products();
        products[1].price = -5.0;
        storage.save_products(&products);
        assert_eq!(storage.load_products(), catalog::default_products());

        let mut products = catalog::default_products();
        products[1].id = products[0].id.clone();
        storage.save_products(&products);
        assert_eq!(storage.load_products(), catalog::default_products());

        storage.save_categories(&["JUICES".to_string(), "JUICES".to_string()]);
        assert_eq!(storage.load_categories(), catalog::default_categories());

        let mut bad = sale(1001);
        bad.items[0].quantity = 0;
        storage.save_sales(&[bad]);
        assert!(storage.load_sales().is_empty());
    }

    #[test]
    fn test_unknown_payment_method_falls_back() {
        let storage = storage();
        let mut raw = serde_json::to_value(vec![sale(1001)]).expect("to value");
        raw[0]["paymentMethod"] = "CHEQUE".into();
        storage.write_raw(KEY_SALES, &raw.to_string()).expect("write");
        assert!(storage.load_sales().is_empty());
    }

    #[test]
    fn test_clear_ledger_removes_record() {
        let storage = storage();
        storage.save_sales(&[sale(1001)]);
        storage.clear_ledger();
        assert_eq!(storage.read_raw(KEY_SALES).expect("read"), None);
        assert!(storage.load_sales().is_empty());
    }

    #[test]
    fn test_printer_config_round_trip() {
        let storage = storage();
        let cfg = PrinterConfig {
            kind: PrinterKind::Bluetooth,
            paper_width: PaperSize::Mm58,
        };
        storage.save_printer_config(&cfg);
        assert_eq!(storage.load_printer_config(), cfg);
    }

    #[test]
    fn test_reads_legacy_numeric_prices_and_string_bills() {
        let storage = storage();
        let raw = r#"[{"id":"1","billNo":"1001","items":[{"id":"j1","name":"Mango Juice",
            "price":80,"category":"JUICES","color":"c","quantity":1}],"subtotal":80,"gst":4,
            "total":84,"paymentMethod":"UPI","timestamp":1700000000000}]"#;
        storage.write_raw(KEY_SALES, raw).expect("write");
        let sales = storage.load_sales();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].bill_no, 1001);
        assert_eq!(sales[0].payment_method, PaymentMethod::Upi);
    }
}
