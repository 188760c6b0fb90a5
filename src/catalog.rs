//! Product catalog and category set.
//!
//! Products keep catalog order. Categories are an ordered list of distinct
//! upper-case labels; removing one moves its products to [`UNCATEGORIZED`].

use tracing::info;
use uuid::Uuid;

use crate::error::{PosError, PosResult};
use crate::models::{Product, ProductDraft, NEUTRAL_COLOR};

pub const UNCATEGORIZED: &str = "UNCATEGORIZED";

pub const DEFAULT_CATEGORIES: &[&str] = &["JUICES", "SHAKES", "SMOOTHIES", "ADD-ONS", "COMBOS"];

const DEFAULT_PRODUCTS: &[(&str, &str, f64, &str, &str)] = &[
    ("j1", "Mango Juice", 80.0, "JUICES", "bg-orange-100 border-orange-200 text-orange-800"),
    ("j2", "Orange Juice", 70.0, "JUICES", "bg-orange-50 border-orange-100 text-orange-700"),
    ("j3", "Watermelon Juice", 60.0, "JUICES", "bg-red-50 border-red-100 text-red-700"),
    ("j4", "Pineapple Juice", 70.0, "JUICES", "bg-yellow-50 border-yellow-100 text-yellow-700"),
    ("j5", "Mosambi Juice", 70.0, "JUICES", "bg-green-50 border-green-100 text-green-700"),
    ("s1", "Strawberry Shake", 120.0, "SHAKES", "bg-pink-100 border-pink-200 text-pink-800"),
    ("s2", "Chocolate Shake", 130.0, "SHAKES", "bg-amber-100 border-amber-200 text-amber-900"),
    ("s3", "Kaju Anjeer Shake", 160.0, "SHAKES", "bg-stone-100 border-stone-200 text-stone-800"),
    ("s4", "Mango Shake", 110.0, "SHAKES", "bg-orange-100 border-orange-200 text-orange-800"),
    ("s5", "Vanilla Shake", 100.0, "SHAKES", "bg-slate-50 border-slate-200 text-slate-800"),
    ("sm1", "Berry Blast", 150.0, "SMOOTHIES", "bg-purple-100 border-purple-200 text-purple-800"),
    ("sm2", "Green Detox", 140.0, "SMOOTHIES", "bg-emerald-100 border-emerald-200 text-emerald-800"),
    ("a1", "Extra Scoop Ice-cream", 30.0, "ADD-ONS", "bg-blue-50 border-blue-100 text-blue-700"),
    ("a2", "Dry Fruits", 20.0, "ADD-ONS", "bg-orange-50 border-orange-100 text-orange-700"),
    ("a3", "Chocolate Chips", 15.0, "ADD-ONS", "bg-brown-50 border-brown-100 text-brown-700"),
    ("c1", "Duo Pack (2 Juices)", 130.0, "COMBOS", "bg-indigo-100 border-indigo-200 text-indigo-800"),
];

pub fn default_products() -> Vec<Product> {
    DEFAULT_PRODUCTS
        .iter()
        .map(|(id, name, price, category, color)| Product {
            id: (*id).to_string(),
            name: (*name).to_string(),
            price: *price,
            category: (*category).to_string(),
            color: (*color).to_string(),
        })
        .collect()
}

pub fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| (*c).to_string()).collect()
}

/// Trim and upper-case a category label. Returns `None` for blank input.
pub fn normalize_category(label: &str) -> Option<String> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_ascii_uppercase())
    }
}

/// Price must be a finite, non-negative amount.
pub fn valid_price(price: f64) -> bool {
    price.is_finite() && price >= 0.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    products: Vec<Product>,
    categories: Vec<String>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(default_products(), default_categories())
    }
}

impl Catalog {
    /// Build a catalog from loaded data. Any product category missing from
    /// the category set is appended so every product stays reachable.
    pub fn new(products: Vec<Product>, categories: Vec<String>) -> Self {
        let mut catalog = Self {
            products,
            categories,
        };
        let missing: Vec<String> = catalog
            .products
            .iter()
            .map(|p| p.category.clone())
            .filter(|c| !catalog.categories.contains(c))
            .collect();
        for category in missing {
            if !catalog.categories.contains(&category) {
                catalog.categories.push(category);
            }
        }
        catalog
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn in_category<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Product> + 'a {
        self.products.iter().filter(move |p| p.category == label)
    }

    fn validate(&self, draft: &ProductDraft) -> PosResult<(String, String)> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(PosError::InvalidProduct("name is required".to_string()));
        }
        if !valid_price(draft.price) {
            return Err(PosError::InvalidProduct(format!(
                "price must be a non-negative amount, got {}",
                draft.price
            )));
        }
        let category = normalize_category(&draft.category).ok_or(PosError::InvalidCategory)?;
        if !self.categories.contains(&category) {
            return Err(PosError::UnknownCategory(category));
        }
        Ok((name.to_string(), category))
    }

    pub fn add_product(&mut self, draft: ProductDraft) -> PosResult<Product> {
        let (name, category) = self.validate(&draft)?;
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name,
            price: draft.price,
            category,
            color: draft
                .color
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| NEUTRAL_COLOR.to_string()),
        };
        info!(product_id = %product.id, name = %product.name, "Product added");
        self.products.push(product.clone());
        Ok(product)
    }

    pub fn update_product(&mut self, id: &str, draft: ProductDraft) -> PosResult<Product> {
        let (name, category) = self.validate(&draft)?;
        let product = self
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| PosError::UnknownProduct(id.to_string()))?;
        product.name = name;
        product.price = draft.price;
        product.category = category;
        if let Some(color) = draft.color.filter(|c| !c.trim().is_empty()) {
            product.color = color;
        }
        info!(product_id = %id, "Product updated");
        Ok(product.clone())
    }

    pub fn delete_product(&mut self, id: &str) -> PosResult<Product> {
        let idx = self
            .products
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| PosError::UnknownProduct(id.to_string()))?;
        let removed = self.products.remove(idx);
        info!(product_id = %id, "Product deleted");
        Ok(removed)
    }

    pub fn add_category(&mut self, label: &str) -> PosResult<String> {
        let label = normalize_category(label).ok_or(PosError::InvalidCategory)?;
        if self.categories.contains(&label) {
            return Err(PosError::DuplicateCategory(label));
        }
        self.categories.push(label.clone());
        Ok(label)
    }

    /// Remove a category and move its products to [`UNCATEGORIZED`].
    /// Returns the number of reassigned products.
    pub fn remove_category(&mut self, label: &str) -> PosResult<usize> {
        let label = normalize_category(label).ok_or(PosError::InvalidCategory)?;
        let idx = self
            .categories
            .iter()
            .position(|c| *c == label)
            .ok_or_else(|| PosError::UnknownCategory(label.clone()))?;

        let affected = self.in_category(&label).count();
        if label == UNCATEGORIZED {
            if affected > 0 {
                return Err(PosError::CategoryInUse(label));
            }
            self.categories.remove(idx);
            return Ok(0);
        }

        self.categories.remove(idx);
        if affected > 0 {
            for product in self.products.iter_mut().filter(|p| p.category == label) {
                product.category = UNCATEGORIZED.to_string();
            }
            if !self.categories.iter().any(|c| c == UNCATEGORIZED) {
                self.categories.push(UNCATEGORIZED.to_string());
            }
        }
        info!(category = %label, reassigned = affected, "Category removed");
        Ok(affected)
    }
}
