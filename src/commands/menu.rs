use crate::error::{PosError, PosResult};
use crate::models::{Product, ProductDraft};
use crate::pricing::format_money;
use crate::state::{Action, AppState, Outcome};

// -- Products ----------------------------------------------------------------

fn product_row(product: &Product) -> String {
    format!(
        "{:<38} {:<24} {:>8}  {}",
        product.id,
        product.name,
        format_money(product.price),
        product.category
    )
}

/// Products grouped by category in menu order. With `category` set only that
/// group is listed.
pub fn list(state: &AppState, category: Option<&str>) -> String {
    let catalog = state.catalog();
    let wanted = category.map(|c| c.trim().to_uppercase());
    let mut out = String::new();
    for label in catalog.categories() {
        if wanted.as_ref().is_some_and(|w| w != label) {
            continue;
        }
        let products: Vec<&Product> = catalog.in_category(label).collect();
        out.push_str(&format!("{label} ({})\n", products.len()));
        for product in products {
            out.push_str("  ");
            out.push_str(&product_row(product));
            out.push('\n');
        }
    }
    if out.is_empty() {
        out.push_str("No matching category\n");
    }
    out
}

pub fn add(
    state: &mut AppState,
    name: &str,
    price: f64,
    category: &str,
    color: Option<String>,
) -> PosResult<String> {
    let draft = ProductDraft {
        name: name.to_string(),
        price,
        category: category.to_string(),
        color,
    };
    match state.apply(Action::AddProduct(draft))? {
        Outcome::ProductSaved(product) => Ok(format!("Added {}", product_row(&product))),
        other => Ok(format!("{other:?}")),
    }
}

/// Fields to change on an existing product. `None` keeps the current value.
#[derive(Debug, Default)]
pub struct ProductEdit {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub color: Option<String>,
}

/// Change only the given fields of product `id`.
pub fn edit(state: &mut AppState, id: &str, edit: ProductEdit) -> PosResult<String> {
    let current = state
        .catalog()
        .get(id)
        .ok_or_else(|| PosError::UnknownProduct(id.to_string()))?;
    let draft = ProductDraft {
        name: edit.name.unwrap_or_else(|| current.name.clone()),
        price: edit.price.unwrap_or(current.price),
        category: edit.category.unwrap_or_else(|| current.category.clone()),
        color: edit.color,
    };
    match state.apply(Action::UpdateProduct {
        id: id.to_string(),
        draft,
    })? {
        Outcome::ProductSaved(product) => Ok(format!("Updated {}", product_row(&product))),
        other => Ok(format!("{other:?}")),
    }
}

pub fn delete(state: &mut AppState, id: &str) -> PosResult<String> {
    match state.apply(Action::DeleteProduct(id.to_string()))? {
        Outcome::ProductDeleted(product) => Ok(format!("Deleted {} ({})", product.name, product.id)),
        other => Ok(format!("{other:?}")),
    }
}

// -- Categories --------------------------------------------------------------

pub fn categories(state: &AppState) -> String {
    let catalog = state.catalog();
    catalog
        .categories()
        .iter()
        .map(|label| format!("{label:<16} {:>3} products\n", catalog.in_category(label).count()))
        .collect()
}

pub fn add_category(state: &mut AppState, label: &str) -> PosResult<String> {
    match state.apply(Action::AddCategory(label.to_string()))? {
        Outcome::CategoryAdded(label) => Ok(format!("Added category {label}")),
        other => Ok(format!("{other:?}")),
    }
}

pub fn remove_category(state: &mut AppState, label: &str) -> PosResult<String> {
    match state.apply(Action::RemoveCategory(label.to_string()))? {
        Outcome::CategoryRemoved { label, reassigned } if reassigned > 0 => Ok(format!(
            "Removed category {label}; {reassigned} products moved to UNCATEGORIZED"
        )),
        Outcome::CategoryRemoved { label, .. } => Ok(format!("Removed category {label}")),
        other => Ok(format!("{other:?}")),
    }
}
