//! Append-only sales ledger.
//!
//! Bill numbers derive from the ledger length at checkout plus a fixed
//! offset. Two terminals sharing a data dir can mint the same number.

use tracing::info;
use uuid::Uuid;

use crate::cart::Cart;
use crate::error::{PosError, PosResult};
use crate::models::{PaymentMethod, SaleRecord};
use crate::pricing::{compute_totals, TaxRate};

pub const BILL_NUMBER_OFFSET: u64 = 1000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    records: Vec<SaleRecord>,
}

impl Ledger {
    pub fn new(records: Vec<SaleRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[SaleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&SaleRecord> {
        self.records.last()
    }

    pub fn next_bill_no(&self) -> u64 {
        BILL_NUMBER_OFFSET + self.records.len() as u64 + 1
    }

    pub fn find_by_bill_no(&self, bill_no: u64) -> Option<&SaleRecord> {
        self.records.iter().rev().find(|r| r.bill_no == bill_no)
    }

    /// Snapshot the cart into a new sale and append it. The caller clears
    /// the cart once the record is persisted.
    pub fn checkout(
        &mut self,
        cart: &Cart,
        method: PaymentMethod,
        rate: TaxRate,
        now_ms: i64,
    ) -> PosResult<&SaleRecord> {
        if cart.is_empty() {
            return Err(PosError::EmptyCart);
        }
        let totals = compute_totals(cart.lines(), rate);
        let record = SaleRecord {
            id: Uuid::new_v4().to_string(),
            bill_no: self.next_bill_no(),
            items: cart.lines().to_vec(),
            subtotal: totals.subtotal,
            gst: totals.tax,
            total: totals.total,
            payment_method: method,
            timestamp: now_ms,
        };
        info!(
            bill_no = record.bill_no,
            total = record.total,
            method = %method,
            lines = record.items.len(),
            "Sale recorded"
        );
        self.records.push(record);
        self.records.last().ok_or(PosError::EmptyCart)
    }

    pub fn reset(&mut self) {
        info!(cleared = self.records.len(), "Ledger reset");
        self.records.clear();
    }
}
