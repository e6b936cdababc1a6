//! # Catalog CSV Row
//!
//! Column layout shared by bulk import and export:
//!
//! ```text
//! sku, name, description, category, brand, buy_price, sale_price, current_qty, min_stock
//! ```
//!
//! Empty cells are absent. Prices parse as decimals, quantities as integers.

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::{clean_optional, validate_price, validate_required, validate_stock_level};

/// Header row written by export and recognised by import.
pub const CSV_HEADER: [&str; 9] = [
    "sku",
    "name",
    "description",
    "category",
    "brand",
    "buy_price",
    "sale_price",
    "current_qty",
    "min_stock",
];

/// Category used when a row leaves it empty.
pub const DEFAULT_IMPORT_CATEGORY: &str = "general";

/// One parsed catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    /// `None` asks the catalog to generate a SKU.
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub brand: Option<String>,
    pub buy_price: Money,
    pub sale_price: Money,
    pub current_qty: i64,
    pub min_stock: i64,
}

impl CatalogRow {
    /// Parses the nine cells of one record.
    ///
    /// ## Example
    /// ```rust
    /// use cellpos_core::import_row::CatalogRow;
    /// use cellpos_core::money::Money;
    ///
    /// let row = CatalogRow::parse(&["P1", "Case v2", "", "acc", "", "12", "25", "7", "2"]).unwrap();
    /// assert_eq!(row.sku.as_deref(), Some("P1"));
    /// assert_eq!(row.buy_price, Money::from_major(12));
    /// assert_eq!(row.current_qty, 7);
    /// ```
    pub fn parse(cells: &[&str]) -> Result<Self, ValidationError> {
        let cell = |i: usize| -> Option<String> { clean_optional(cells.get(i).map(|c| c.to_string())) };

        let name = cell(1).unwrap_or_default();
        validate_required("name", &name)?;

        let buy_price = parse_money("buy_price", cell(5))?;
        validate_price("buy_price", buy_price)?;
        let sale_price = parse_money("sale_price", cell(6))?;
        validate_price("sale_price", sale_price)?;

        let current_qty = parse_int("current_qty", cell(7))?;
        validate_stock_level("current_qty", current_qty)?;
        let min_stock = parse_int("min_stock", cell(8))?;
        validate_stock_level("min_stock", min_stock)?;

        Ok(CatalogRow {
            sku: cell(0),
            name,
            description: cell(2),
            category: cell(3).unwrap_or_else(|| DEFAULT_IMPORT_CATEGORY.to_string()),
            brand: cell(4),
            buy_price,
            sale_price,
            current_qty,
            min_stock,
        })
    }
}

fn parse_money(field: &str, value: Option<String>) -> Result<Money, ValidationError> {
    match value {
        None => Err(ValidationError::required(field)),
        Some(v) => v
            .parse::<Money>()
            .map_err(|_| ValidationError::invalid_format(field, format!("'{v}' is not a price"))),
    }
}

fn parse_int(field: &str, value: Option<String>) -> Result<i64, ValidationError> {
    match value {
        None => Ok(0),
        Some(v) => v
            .parse::<i64>()
            .map_err(|_| ValidationError::invalid_format(field, format!("'{v}' is not an integer"))),
    }
}
