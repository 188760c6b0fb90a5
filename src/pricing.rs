//! Subtotal, GST and grand-total computation.
//!
//! Stored values are never rounded; [`format_money`] rounds at display time.

use serde::{Deserialize, Serialize};

use crate::error::{PosError, PosResult};
use crate::models::CartLine;

/// GST rate applied in every shop configuration seen so far.
pub const DEFAULT_TAX_RATE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(f64);

impl TaxRate {
    pub fn new(rate: f64) -> PosResult<Self> {
        if !rate.is_finite() || !(0.0..1.0).contains(&rate) {
            return Err(PosError::InvalidTaxRate(rate));
        }
        Ok(Self(rate))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Receipt label, e.g. `GST(5%)`.
    pub fn label(self) -> String {
        let pct = self.0 * 100.0;
        if (pct.round() - pct).abs() < 1e-9 {
            format!("GST({pct:.0}%)")
        } else {
            format!("GST({pct:.1}%)")
        }
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        Self(DEFAULT_TAX_RATE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

pub fn subtotal(lines: &[CartLine]) -> f64 {
    lines.iter().map(CartLine::line_total).sum()
}

pub fn compute_totals(lines: &[CartLine], rate: TaxRate) -> Totals {
    let subtotal = subtotal(lines);
    let tax = subtotal * rate.value();
    Totals {
        subtotal,
        tax,
        total: subtotal + tax,
    }
}

/// Receipt label for `rate`, e.g. `GST(5%)`.
pub fn tax_label(rate: TaxRate) -> String {
    rate.label()
}

pub fn format_money(value: f64) -> String {
    format!("{value:.2}")
}
