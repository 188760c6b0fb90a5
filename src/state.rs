//! Application state for one till session.
//!
//! Every mutation goes through [`AppState::apply`]. Handlers change the
//! in-memory state first and then persist the affected collection; a failed
//! save is logged by `storage` and never rolls the in-memory change back.

use chrono::Utc;
use tracing::{debug, info};

use crate::cart::Cart;
use crate::catalog::{self, Catalog};
use crate::config::Config;
use crate::error::{PosError, PosResult};
use crate::ledger::Ledger;
use crate::models::{PaymentMethod, PrinterConfig, Product, ProductDraft, SaleRecord};
use crate::pricing::{compute_totals, Totals};
use crate::storage::Storage;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SelectCategory(String),
    AddToCart(String),
    Decrement(String),
    SetQuantity { product_id: String, quantity: u32 },
    RemoveLine(String),
    ClearCart,
    Checkout(PaymentMethod),
    AddProduct(ProductDraft),
    UpdateProduct { id: String, draft: ProductDraft },
    DeleteProduct(String),
    AddCategory(String),
    RemoveCategory(String),
    ResetLedger,
    SetPrinterConfig(PrinterConfig),
    DismissReceipt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    CategorySelected(String),
    /// Quantity left in the cart for the product (0 when the line is gone).
    CartUpdated { product_id: String, quantity: u32 },
    CartCleared,
    SaleCompleted(SaleRecord),
    ProductSaved(Product),
    ProductDeleted(Product),
    CategoryAdded(String),
    CategoryRemoved { label: String, reassigned: usize },
    LedgerReset { cleared: usize },
    PrinterConfigSaved(PrinterConfig),
    ReceiptDismissed,
}

pub struct AppState {
    storage: Storage,
    config: Config,
    catalog: Catalog,
    cart: Cart,
    ledger: Ledger,
    printer_config: PrinterConfig,
    active_category: String,
    current_sale: Option<SaleRecord>,
}

impl AppState {
    /// Load every collection from `storage`, falling back to defaults.
    pub fn load(storage: Storage, config: Config) -> Self {
        let catalog = Catalog::new(storage.load_products(), storage.load_categories());
        let ledger = Ledger::new(storage.load_sales());
        let printer_config = storage.load_printer_config();
        let active_category = first_category(&catalog);
        info!(
            products = catalog.products().len(),
            categories = catalog.categories().len(),
            sales = ledger.len(),
            "Till state loaded"
        );
        Self {
            storage,
            config,
            catalog,
            cart: Cart::new(),
            ledger,
            printer_config,
            active_category,
            current_sale: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_totals(&self) -> Totals {
        compute_totals(self.cart.lines(), self.config.tax_rate)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn printer_config(&self) -> PrinterConfig {
        self.printer_config
    }

    pub fn active_category(&self) -> &str {
        &self.active_category
    }

    /// Products shown for the active category.
    pub fn visible_products(&self) -> Vec<&Product> {
        self.catalog.in_category(&self.active_category).collect()
    }

    /// The sale awaiting print or dismissal after checkout.
    pub fn current_sale(&self) -> Option<&SaleRecord> {
        self.current_sale.as_ref()
    }

    pub fn apply(&mut self, action: Action) -> PosResult<Outcome> {
        self.apply_at(action, Utc::now().timestamp_millis())
    }

    /// As [`apply`](Self::apply) with an explicit clock for checkout.
    pub fn apply_at(&mut self, action: Action, now_ms: i64) -> PosResult<Outcome> {
        debug!(?action, "Applying action");
        match action {
            Action::SelectCategory(label) => {
                let label = catalog::normalize_category(&label).ok_or(PosError::InvalidCategory)?;
                if !self.catalog.categories().contains(&label) {
                    return Err(PosError::UnknownCategory(label));
                }
                self.active_category = label.clone();
                Ok(Outcome::CategorySelected(label))
            }

            // ---------------------------------------------------------------
            // Cart
            // ---------------------------------------------------------------
            Action::AddToCart(product_id) => {
                let product = self
                    .catalog
                    .get(&product_id)
                    .ok_or_else(|| PosError::UnknownProduct(product_id.clone()))?;
                let quantity = self.cart.add(product);
                Ok(Outcome::CartUpdated {
                    product_id,
                    quantity,
                })
            }
            Action::Decrement(product_id) => {
                let quantity = self
                    .cart
                    .decrement(&product_id)
                    .ok_or_else(|| PosError::UnknownProduct(product_id.clone()))?;
                Ok(Outcome::CartUpdated {
                    product_id,
                    quantity,
                })
            }
            Action::SetQuantity {
                product_id,
                quantity,
            } => {
                if self.cart.quantity_of(&product_id) == 0 {
                    if quantity == 0 {
                        return Err(PosError::UnknownProduct(product_id));
                    }
                    let product = self
                        .catalog
                        .get(&product_id)
                        .ok_or_else(|| PosError::UnknownProduct(product_id.clone()))?;
                    self.cart.add(product);
                }
                let quantity = self
                    .cart
                    .set_quantity(&product_id, quantity)
                    .ok_or_else(|| PosError::UnknownProduct(product_id.clone()))?;
                Ok(Outcome::CartUpdated {
                    product_id,
                    quantity,
                })
            }
            Action::RemoveLine(product_id) => {
                self.cart
                    .remove(&product_id)
                    .ok_or_else(|| PosError::UnknownProduct(product_id.clone()))?;
                Ok(Outcome::CartUpdated {
                    product_id,
                    quantity: 0,
                })
            }
            Action::ClearCart => {
                self.cart.clear();
                Ok(Outcome::CartCleared)
            }

            // ---------------------------------------------------------------
            // Checkout and ledger
            // ---------------------------------------------------------------
            Action::Checkout(method) => {
                let sale = self
                    .ledger
                    .checkout(&self.cart, method, self.config.tax_rate, now_ms)?
                    .clone();
                self.storage.save_sales(self.ledger.records());
                self.cart.clear();
                self.current_sale = Some(sale.clone());
                Ok(Outcome::SaleCompleted(sale))
            }
            Action::ResetLedger => {
                let cleared = self.ledger.len();
                self.ledger.reset();
                self.storage.clear_ledger();
                self.current_sale = None;
                Ok(Outcome::LedgerReset { cleared })
            }
            Action::DismissReceipt => {
                self.current_sale = None;
                Ok(Outcome::ReceiptDismissed)
            }

            // ---------------------------------------------------------------
            // Catalog
            // ---------------------------------------------------------------
            Action::AddProduct(draft) => {
                let product = self.catalog.add_product(draft)?;
                self.storage.save_products(self.catalog.products());
                Ok(Outcome::ProductSaved(product))
            }
            Action::UpdateProduct { id, draft } => {
                let product = self.catalog.update_product(&id, draft)?;
                self.storage.save_products(self.catalog.products());
                self.sync_cart();
                Ok(Outcome::ProductSaved(product))
            }
            Action::DeleteProduct(id) => {
                let product = self.catalog.delete_product(&id)?;
                self.storage.save_products(self.catalog.products());
                self.sync_cart();
                Ok(Outcome::ProductDeleted(product))
            }
            Action::AddCategory(label) => {
                let label = self.catalog.add_category(&label)?;
                self.storage.save_categories(self.catalog.categories());
                Ok(Outcome::CategoryAdded(label))
            }
            Action::RemoveCategory(label) => {
                let normalized =
                    catalog::normalize_category(&label).ok_or(PosError::InvalidCategory)?;
                let reassigned = self.catalog.remove_category(&normalized)?;
                self.storage.save_categories(self.catalog.categories());
                if reassigned > 0 {
                    self.storage.save_products(self.catalog.products());
                    self.sync_cart();
                }
                if !self.catalog.categories().contains(&self.active_category) {
                    self.active_category = first_category(&self.catalog);
                }
                Ok(Outcome::CategoryRemoved {
                    label: normalized,
                    reassigned,
                })
            }

            Action::SetPrinterConfig(config) => {
                self.printer_config = config;
                self.storage.save_printer_config(&config);
                info!(kind = ?config.kind, paper = ?config.paper_width, "Printer settings saved");
                Ok(Outcome::PrinterConfigSaved(config))
            }
        }
    }

    fn sync_cart(&mut self) {
        let catalog = &self.catalog;
        self.cart.sync_with(|id| catalog.get(id));
    }
}

fn first_category(catalog: &Catalog) -> String {
    catalog
        .categories()
        .first()
        .cloned()
        .unwrap_or_else(|| catalog::UNCATEGORIZED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{PaperSize, PrinterKind};

    fn fresh_state() -> AppState {
        let storage = Storage::new(db::init_in_memory().expect("in-memory db"));
        AppState::load(storage, Config::default())
    }

    /// Reload from the same database to observe what was persisted.
    fn reload(state: AppState) -> AppState {
        let AppState {
            storage, config, ..
        } = state;
        AppState::load(storage, config)
    }

    #[test]
    fn test_loads_defaults() {
        let state = fresh_state();
        assert_eq!(state.catalog().products().len(), 16);
        assert_eq!(state.active_category(), "JUICES");
        assert!(state.visible_products().iter().all(|p| p.category == "JUICES"));
        assert!(state.cart().is_empty());
        assert!(state.ledger().is_empty());
        assert_eq!(state.printer_config(), PrinterConfig::default());
    }

    #[test]
    fn test_select_unknown_category_rejected() {
        let mut state = fresh_state();
        assert_eq!(
            state.apply(Action::SelectCategory("shakes".into())),
            Ok(Outcome::CategorySelected("SHAKES".into()))
        );
        assert_eq!(
            state.apply(Action::SelectCategory("TEAS".into())),
            Err(PosError::UnknownCategory("TEAS".into()))
        );
        assert_eq!(state.active_category(), "SHAKES");
    }

    #[test]
    fn test_checkout_persists_and_clears_cart() {
        let mut state = fresh_state();
        state.apply(Action::AddToCart("j1".into())).expect("add");
        state.apply(Action::AddToCart("j1".into())).expect("add");
        state.apply(Action::AddToCart("a1".into())).expect("add");
        let totals = state.cart_totals();
        assert!((totals.total - 199.5).abs() < 1e-9);

        let outcome = state
            .apply_at(Action::Checkout(PaymentMethod::Cash), 1_700_000_000_000)
            .expect("checkout");
        let Outcome::SaleCompleted(sale) = outcome else {
            panic!("expected a completed sale");
        };
        assert_eq!(sale.bill_no, 1001);
        assert!(state.cart().is_empty());
        assert_eq!(state.current_sale().map(|s| s.bill_no), Some(1001));

        let state = reload(state);
        assert_eq!(state.ledger().records(), &[sale]);
        assert!(state.current_sale().is_none());
    }

    #[test]
    fn test_empty_checkout_leaves_ledger_untouched() {
        let mut state = fresh_state();
        assert_eq!(
            state.apply(Action::Checkout(PaymentMethod::Upi)),
            Err(PosError::EmptyCart)
        );
        assert!(state.ledger().is_empty());
    }

    #[test]
    fn test_cart_actions() {
        let mut state = fresh_state();
        state.apply(Action::AddToCart("j1".into())).expect("add");
        assert_eq!(
            state.apply(Action::SetQuantity {
                product_id: "j1".into(),
                quantity: 4
            }),
            Ok(Outcome::CartUpdated {
                product_id: "j1".into(),
                quantity: 4
            })
        );
        assert_eq!(
            state.apply(Action::Decrement("j1".into())),
            Ok(Outcome::CartUpdated {
                product_id: "j1".into(),
                quantity: 3
            })
        );
        state
            .apply(Action::SetQuantity {
                product_id: "s1".into(),
                quantity: 2,
            })
            .expect("set quantity adds line");
        assert_eq!(state.cart().item_count(), 5);
        state.apply(Action::RemoveLine("j1".into())).expect("remove");
        assert_eq!(
            state.apply(Action::RemoveLine("j1".into())),
            Err(PosError::UnknownProduct("j1".into()))
        );
        assert_eq!(
            state.apply(Action::AddToCart("nope".into())),
            Err(PosError::UnknownProduct("nope".into()))
        );
        state.apply(Action::ClearCart).expect("clear");
        assert!(state.cart().is_empty());
    }

    #[test]
    fn test_catalog_edits_persist_and_sync_cart() {
        let mut state = fresh_state();
        state.apply(Action::AddToCart("j1".into())).expect("add");
        state.apply(Action::AddToCart("j2".into())).expect("add");

        state
            .apply(Action::UpdateProduct {
                id: "j1".into(),
                draft: ProductDraft {
                    name: "Alphonso Mango Juice".into(),
                    price: 95.0,
                    category: "JUICES".into(),
                    color: None,
                },
            })
            .expect("update");
        state.apply(Action::DeleteProduct("j2".into())).expect("delete");
        assert_eq!(state.cart().lines().len(), 1);
        assert!((state.cart().lines()[0].product.price - 95.0).abs() < f64::EPSILON);

        let added = match state
            .apply(Action::AddProduct(ProductDraft {
                name: "Kokum Sherbet".into(),
                price: 40.0,
                category: "juices".into(),
                color: None,
            }))
            .expect("add product")
        {
            Outcome::ProductSaved(p) => p,
            other => panic!("unexpected outcome {other:?}"),
        };

        let state = reload(state);
        assert!(state.catalog().get("j2").is_none());
        assert_eq!(state.catalog().get("j1").map(|p| p.price), Some(95.0));
        assert_eq!(state.catalog().get(&added.id).map(|p| p.name.as_str()), Some("Kokum Sherbet"));
    }

    #[test]
    fn test_remove_active_category_reassigns_and_persists() {
        let mut state = fresh_state();
        state.apply(Action::SelectCategory("COMBOS".into())).expect("select");
        let outcome = state.apply(Action::RemoveCategory("combos".into())).expect("remove");
        let Outcome::CategoryRemoved { label, reassigned } = outcome else {
            panic!("expected category removal");
        };
        assert_eq!(label, "COMBOS");
        assert!(reassigned > 0);
        assert_eq!(state.active_category(), "JUICES");

        let state = reload(state);
        assert!(!state.catalog().categories().contains(&"COMBOS".to_string()));
        assert!(state.catalog().categories().contains(&catalog::UNCATEGORIZED.to_string()));
        assert_eq!(state.catalog().in_category(catalog::UNCATEGORIZED).count(), reassigned);
    }

    #[test]
    fn test_reset_ledger_restarts_bill_numbers() {
        let mut state = fresh_state();
        for _ in 0..3 {
            state.apply(Action::AddToCart("j1".into())).expect("add");
            state.apply(Action::Checkout(PaymentMethod::Card)).expect("checkout");
        }
        assert_eq!(state.ledger().next_bill_no(), 1004);
        assert_eq!(
            state.apply(Action::ResetLedger),
            Ok(Outcome::LedgerReset { cleared: 3 })
        );
        assert!(state.current_sale().is_none());

        let mut state = reload(state);
        assert!(state.ledger().is_empty());
        state.apply(Action::AddToCart("j1".into())).expect("add");
        match state.apply(Action::Checkout(PaymentMethod::Cash)) {
            Ok(Outcome::SaleCompleted(sale)) => assert_eq!(sale.bill_no, 1001),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_printer_config_and_dismiss() {
        let mut state = fresh_state();
        let config = PrinterConfig {
            kind: PrinterKind::Bluetooth,
            paper_width: PaperSize::Mm58,
        };
        state.apply(Action::SetPrinterConfig(config)).expect("save");
        state.apply(Action::AddToCart("a1".into())).expect("add");
        state.apply(Action::Checkout(PaymentMethod::Upi)).expect("checkout");
        state.apply(Action::DismissReceipt).expect("dismiss");
        assert!(state.current_sale().is_none());

        let state = reload(state);
        assert_eq!(state.printer_config(), config);
    }
}
