//! Cart for the current customer.
//!
//! Lines are keyed by product id and keep insertion order. A line with a
//! quantity of zero is never stored.

use crate::models::{CartLine, Product};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |acc, l| acc.saturating_add(l.quantity))
    }

    pub fn quantity_of(&self, product_id: &str) -> u32 {
        self.lines
            .iter()
            .find(|l| l.product.id == product_id)
            .map_or(0, |l| l.quantity)
    }

    /// Add one unit. An existing line is incremented rather than duplicated.
    pub fn add(&mut self, product: &Product) -> u32 {
        if let Some(line) = self.lines.iter_mut().find(|l| l.product.id == product.id) {
            line.quantity = line.quantity.saturating_add(1);
            return line.quantity;
        }
        self.lines.push(CartLine {
            product: product.clone(),
            quantity: 1,
        });
        1
    }

    /// Remove one unit; the line disappears when it reaches zero.
    /// Returns the remaining quantity, or `None` if the product is not in the cart.
    pub fn decrement(&mut self, product_id: &str) -> Option<u32> {
        let idx = self.lines.iter().position(|l| l.product.id == product_id)?;
        let remaining = self.lines[idx].quantity.saturating_sub(1);
        if remaining == 0 {
            self.lines.remove(idx);
        } else {
            self.lines[idx].quantity = remaining;
        }
        Some(remaining)
    }

    /// Set an explicit quantity for a product already in the cart.
    /// Zero removes the line.
    pub fn set_quantity(&mut self, product_id: &str, quantity: u32) -> Option<u32> {
        let idx = self.lines.iter().position(|l| l.product.id == product_id)?;
        if quantity == 0 {
            self.lines.remove(idx);
        } else {
            self.lines[idx].quantity = quantity;
        }
        Some(quantity)
    }

    pub fn remove(&mut self, product_id: &str) -> Option<CartLine> {
        let idx = self.lines.iter().position(|l| l.product.id == product_id)?;
        Some(self.lines.remove(idx))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Drop lines whose product no longer exists and refresh the rest after
    /// a catalog edit. Prices in the cart follow the catalog until checkout.
    pub fn sync_with<'a>(&mut self, lookup: impl Fn(&str) -> Option<&'a Product>) {
        self.lines.retain_mut(|line| match lookup(&line.product.id) {
            Some(product) => {
                line.product = product.clone();
                true
            }
            None => false,
        });
    }
}
