//! # Validation Module
//!
//! Field-level rules applied before any database work.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Presentation                                                  │
//! │  └── Immediate feedback on empty fields                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Required fields, lengths, ranges                                   │
//! │  └── Prices positive, quantities sane                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                        │
//! │  ├── NOT NULL / CHECK constraints                                       │
//! │  └── UNIQUE (sku, sale_number, transaction_number)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cellpos_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("CASE-01").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::input::{
    CheckoutLine, CustomerPatch, NewCustomer, NewProduct, NewRepair, NewSupplier, ProductPatch,
    RepairCosts, RepairPatch, SupplierPatch,
};
use crate::money::{Money, Percent};
use crate::{MAX_AMOUNT_MAJOR, MAX_LINE_QUANTITY, MAX_SALE_LINES, MAX_STOCK_LEVEL};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_SKU_LEN: usize = 50;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens, underscores, dots
///
/// ## Example
/// ```rust
/// use cellpos_core::validation::validate_sku;
///
/// assert!(validate_sku("PRD-1700000000").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.chars().count() > MAX_SKU_LEN {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: MAX_SKU_LEN,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::invalid_format(
            "sku",
            "must contain only letters, numbers, hyphens, underscores, and dots",
        ));
    }

    Ok(())
}

/// Validates a required text field (non-blank, bounded length).
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Trims an optional string, mapping blank to `None`.
///
/// ## Example
/// ```rust
/// use cellpos_core::validation::clean_optional;
///
/// assert_eq!(clean_optional(Some("  ".into())), None);
/// assert_eq!(clean_optional(Some(" Apple ".into())), Some("Apple".to_string()));
/// ```
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

// =============================================================================
// Numeric Validators
// =============================================================================

fn validate_amount_ceiling(field: &str, amount: Money) -> ValidationResult<()> {
    if amount > Money::from_major(MAX_AMOUNT_MAJOR) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_MAJOR,
        });
    }
    Ok(())
}

/// Validates a price that must be strictly positive.
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if !price.is_positive() {
        return Err(ValidationError::must_be_positive(field));
    }
    validate_amount_ceiling(field, price)
}

/// Validates an amount that may be zero but not negative.
pub fn validate_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::must_not_be_negative(field));
    }
    validate_amount_ceiling(field, amount)
}

/// Validates a stock level field (min/max/initial), at most `MAX_STOCK_LEVEL`.
pub fn validate_stock_level(field: &str, qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::must_not_be_negative(field));
    }
    if qty > MAX_STOCK_LEVEL {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_STOCK_LEVEL,
        });
    }
    Ok(())
}

/// Validates a sale-line quantity.
///
/// ## Rules
/// - At least 1
/// - At most `MAX_LINE_QUANTITY`
///
/// ## Example
/// ```rust
/// use cellpos_core::validation::validate_quantity;
///
/// assert!(validate_quantity(1).is_ok());
/// assert!(validate_quantity(0).is_err());
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_LINE_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "qty".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a percentage in 0%..=100%.
pub fn validate_percent(field: &str, pct: Percent) -> ValidationResult<()> {
    if !pct.is_valid_fraction() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates a new product. A blank SKU is allowed here; the catalog fills it.
pub fn validate_new_product(p: &NewProduct) -> ValidationResult<()> {
    if !p.sku.trim().is_empty() {
        validate_sku(&p.sku)?;
    }
    validate_required("name", &p.name)?;
    validate_required("category", &p.category)?;
    validate_price("buy_price", p.buy_price)?;
    validate_price("sale_price", p.sale_price)?;
    validate_stock_level("initial_qty", p.initial_qty)?;
    validate_stock_level("min_stock", p.min_stock)?;
    validate_stock_level("max_stock", p.max_stock)?;
    if let Some(months) = p.warranty_months {
        validate_stock_level("warranty_months", months)?;
    }
    validate_percent("tax_rate", p.tax_rate)?;
    Ok(())
}

pub fn validate_product_patch(p: &ProductPatch) -> ValidationResult<()> {
    if let Some(name) = &p.name {
        validate_required("name", name)?;
    }
    if let Some(category) = &p.category {
        validate_required("category", category)?;
    }
    if let Some(price) = p.buy_price {
        validate_price("buy_price", price)?;
    }
    if let Some(price) = p.sale_price {
        validate_price("sale_price", price)?;
    }
    if let Some(min) = p.min_stock {
        validate_stock_level("min_stock", min)?;
    }
    if let Some(max) = p.max_stock {
        validate_stock_level("max_stock", max)?;
    }
    if let Some(months) = p.warranty_months {
        validate_stock_level("warranty_months", months)?;
    }
    if let Some(rate) = p.tax_rate {
        validate_percent("tax_rate", rate)?;
    }
    Ok(())
}

pub fn validate_new_supplier(s: &NewSupplier) -> ValidationResult<()> {
    validate_required("name", &s.name)
}

pub fn validate_supplier_patch(s: &SupplierPatch) -> ValidationResult<()> {
    if let Some(name) = &s.name {
        validate_required("name", name)?;
    }
    Ok(())
}

pub fn validate_new_customer(c: &NewCustomer) -> ValidationResult<()> {
    validate_required("name", &c.name)?;
    validate_percent("discount_percentage", c.discount_percentage)?;
    validate_non_negative("credit_limit", c.credit_limit)?;
    Ok(())
}

pub fn validate_customer_patch(c: &CustomerPatch) -> ValidationResult<()> {
    if let Some(name) = &c.name {
        validate_required("name", name)?;
    }
    if let Some(pct) = c.discount_percentage {
        validate_percent("discount_percentage", pct)?;
    }
    if let Some(limit) = c.credit_limit {
        validate_non_negative("credit_limit", limit)?;
    }
    Ok(())
}

pub fn validate_new_repair(r: &NewRepair) -> ValidationResult<()> {
    validate_required("customer_name", &r.customer_name)?;
    validate_required("device_type", &r.device_type)?;
    validate_non_negative("estimated_cost", r.estimated_cost)?;
    if let Some(days) = r.estimated_days {
        validate_stock_level("estimated_days", days)?;
    }
    validate_stock_level("warranty_days", r.warranty_days)?;
    Ok(())
}

pub fn validate_repair_patch(r: &RepairPatch) -> ValidationResult<()> {
    if let Some(name) = &r.customer_name {
        validate_required("customer_name", name)?;
    }
    if let Some(device) = &r.device_type {
        validate_required("device_type", device)?;
    }
    if let Some(days) = r.estimated_days {
        validate_stock_level("estimated_days", days)?;
    }
    if let Some(days) = r.warranty_days {
        validate_stock_level("warranty_days", days)?;
    }
    Ok(())
}

pub fn validate_repair_costs(c: &RepairCosts) -> ValidationResult<()> {
    validate_non_negative("actual_cost", c.actual_cost)?;
    validate_non_negative("parts_cost", c.parts_cost)?;
    validate_non_negative("labor_cost", c.labor_cost)?;
    Ok(())
}

/// Validates the shape of checkout lines. Emptiness is a domain error and
/// is checked by the caller.
pub fn validate_checkout_lines(lines: &[CheckoutLine]) -> ValidationResult<()> {
    if lines.len() > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_SALE_LINES as i64,
        });
    }
    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::required("product_id"));
        }
        validate_quantity(line.qty)?;
        validate_non_negative("unit_price", line.unit_price)?;
        validate_non_negative("discount", line.discount)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> NewProduct {
        NewProduct {
            sku: "P1".into(),
            name: "Case".into(),
            category: "acc".into(),
            buy_price: Money::from_major(10),
            sale_price: Money::from_major(20),
            initial_qty: 3,
            min_stock: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("ABC-123").is_ok());
        assert!(validate_sku("case_01.b").is_ok());
        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_new_product_rules() {
        assert!(validate_new_product(&product()).is_ok());

        let blank_sku = NewProduct { sku: String::new(), ..product() };
        assert!(validate_new_product(&blank_sku).is_ok());

        let no_category = NewProduct { category: " ".into(), ..product() };
        assert!(matches!(
            validate_new_product(&no_category),
            Err(ValidationError::Required { field }) if field == "category"
        ));

        let free = NewProduct { buy_price: Money::zero(), ..product() };
        assert!(matches!(
            validate_new_product(&free),
            Err(ValidationError::MustBePositive { field }) if field == "buy_price"
        ));

        let negative_min = NewProduct { min_stock: -1, ..product() };
        assert!(validate_new_product(&negative_min).is_err());
    }

    #[test]
    fn test_patch_only_checks_present_fields() {
        assert!(validate_product_patch(&ProductPatch::default()).is_ok());
        let bad = ProductPatch {
            sale_price: Some(Money::from_major(-1)),
            ..Default::default()
        };
        assert!(validate_product_patch(&bad).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_stock_and_amount_ceilings() {
        assert!(validate_stock_level("current_qty", MAX_STOCK_LEVEL).is_ok());
        assert!(matches!(
            validate_stock_level("current_qty", MAX_STOCK_LEVEL + 1),
            Err(ValidationError::OutOfRange { field, .. }) if field == "current_qty"
        ));

        let ceiling = Money::from_major(MAX_AMOUNT_MAJOR);
        assert!(validate_price("sale_price", ceiling).is_ok());
        assert!(validate_price("sale_price", ceiling + Money::from_units(1)).is_err());
        assert!(validate_non_negative("fees", ceiling + Money::from_units(1)).is_err());

        let huge = NewProduct { initial_qty: 999_999_999_999_999, ..product() };
        assert!(validate_new_product(&huge).is_err());

        let line = CheckoutLine {
            product_id: "p".into(),
            qty: 1,
            unit_price: Money::from_major(MAX_AMOUNT_MAJOR + 1),
            discount: Money::zero(),
        };
        assert!(validate_checkout_lines(&[line]).is_err());
    }

    #[test]
    fn test_validate_percent() {
        assert!(validate_percent("discount", Percent::from_bps(0)).is_ok());
        assert!(validate_percent("discount", Percent::FULL).is_ok());
        assert!(validate_percent("discount", Percent::from_bps(10_001)).is_err());
        assert!(validate_percent("discount", Percent::from_bps(-1)).is_err());
    }

    #[test]
    fn test_checkout_lines() {
        let line = CheckoutLine {
            product_id: "p1".into(),
            qty: 2,
            unit_price: Money::from_major(20),
            discount: Money::zero(),
        };
        assert!(validate_checkout_lines(std::slice::from_ref(&line)).is_ok());

        let zero_qty = CheckoutLine { qty: 0, ..line.clone() };
        assert!(validate_checkout_lines(&[zero_qty]).is_err());

        let too_many = vec![line; MAX_SALE_LINES + 1];
        assert!(validate_checkout_lines(&too_many).is_err());
    }

    #[test]
    fn test_new_repair_requires_device() {
        let repair = NewRepair {
            customer_name: "A".into(),
            device_type: "".into(),
            ..Default::default()
        };
        assert!(matches!(
            validate_new_repair(&repair),
            Err(ValidationError::Required { field }) if field == "device_type"
        ));
    }
}
