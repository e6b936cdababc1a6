//! # Checkout Math
//!
//! Pure pricing for a sale: line snapshots, per-product demand, and the
//! header totals. The store wraps these in one write transaction.
//!
//! ```text
//! CheckoutLine ×N ──► PricedLine ×N ──► Σ total = subtotal
//!                                          │
//!                     DiscountSpec ────────┤ discount (amount or % of subtotal)
//!                     tax / tax_rate ──────┤ tax
//!                                          ▼
//!                              total = subtotal − discount + tax
//!                              change = paid − total
//!                              status = paid | partial | unpaid
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::input::{CheckoutLine, DiscountSpec};
use crate::money::{Money, Percent};
use crate::status::PaymentStatus;
use crate::types::Product;
use crate::validation::validate_percent;

// =============================================================================
// Lines
// =============================================================================

/// A checkout line with the product snapshot frozen in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedLine {
    pub product_id: String,
    pub product_name: String,
    pub sku: String,
    pub qty: i64,
    pub unit_price: Money,
    pub discount: Money,
    pub total: Money,
    pub cost_price: Money,
    pub profit: Money,
}

impl PricedLine {
    /// Prices a line against the product as currently stored.
    ///
    /// Rejects inactive products and a line discount larger than the line.
    pub fn price(product: &Product, line: &CheckoutLine) -> CoreResult<Self> {
        if !product.active {
            return Err(CoreError::ProductInactive {
                sku: product.sku.clone(),
            });
        }

        let too_large = || ValidationError::invalid_format("line_total", "amount too large");
        let gross = line
            .unit_price
            .checked_multiply_quantity(line.qty)
            .ok_or_else(too_large)?;
        let profit = (line.unit_price - product.buy_price)
            .checked_multiply_quantity(line.qty)
            .ok_or_else(too_large)?;
        if line.discount > gross {
            return Err(CoreError::DiscountExceedsSubtotal {
                discount: line.discount.to_string(),
                subtotal: gross.to_string(),
            });
        }

        let cost_price = product.buy_price;
        Ok(PricedLine {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            sku: product.sku.clone(),
            qty: line.qty,
            unit_price: line.unit_price,
            discount: line.discount,
            total: gross - line.discount,
            cost_price,
            profit,
        })
    }
}

/// Total quantity requested per product, so repeated lines are checked together.
///
/// ## Example
/// ```rust
/// use cellpos_core::checkout::demand_by_product;
/// use cellpos_core::input::CheckoutLine;
/// use cellpos_core::money::Money;
///
/// let line = |id: &str, qty| CheckoutLine {
///     product_id: id.into(), qty, unit_price: Money::from_major(1), discount: Money::zero(),
/// };
/// let demand = demand_by_product(&[line("a", 2), line("b", 1), line("a", 3)]);
/// assert_eq!(demand.get("a"), Some(&5));
/// assert_eq!(demand.get("b"), Some(&1));
/// ```
pub fn demand_by_product(lines: &[CheckoutLine]) -> BTreeMap<String, i64> {
    let mut demand = BTreeMap::new();
    for line in lines {
        *demand.entry(line.product_id.clone()).or_insert(0) += line.qty;
    }
    demand
}

// =============================================================================
// Totals
// =============================================================================

/// Header amounts of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub discount_percentage: Percent,
    pub tax: Money,
    pub total: Money,
    pub paid_amount: Money,
    pub change_amount: Money,
    pub payment_status: PaymentStatus,
}

/// Computes header totals.
///
/// ## Arguments
/// * `lines` - priced lines
/// * `discount` - sale-level discount
/// * `tax` - explicit tax amount; when `None`, `default_tax_rate` applies to
///   `subtotal − discount`
/// * `paid_amount` - cash tendered
/// * `allow_underpayment` - accept `paid_amount < total`
///
/// ## Errors
/// `EmptySale`, `DiscountExceedsSubtotal`, `ZeroTotal`, `InvalidPaymentAmount`,
/// `Underpaid`, or a validation error for a bad percentage.
pub fn compute_totals(
    lines: &[PricedLine],
    discount: DiscountSpec,
    tax: Option<Money>,
    default_tax_rate: Percent,
    paid_amount: Money,
    allow_underpayment: bool,
) -> CoreResult<SaleTotals> {
    if lines.is_empty() {
        return Err(CoreError::EmptySale);
    }

    let subtotal: Money = lines.iter().map(|l| l.total).sum();

    let (discount_amount, discount_percentage) = match discount {
        DiscountSpec::Amount(amount) => {
            if amount.is_negative() {
                return Err(ValidationError::must_not_be_negative("discount").into());
            }
            (amount, Percent::zero())
        }
        DiscountSpec::Percentage(pct) => {
            validate_percent("discount_percentage", pct)?;
            (subtotal.percent_of(pct), pct)
        }
    };

    if discount_amount > subtotal {
        return Err(CoreError::DiscountExceedsSubtotal {
            discount: discount_amount.to_string(),
            subtotal: subtotal.to_string(),
        });
    }

    let taxable = subtotal - discount_amount;
    let tax = match tax {
        Some(explicit) => {
            if explicit.is_negative() {
                return Err(ValidationError::must_not_be_negative("tax").into());
            }
            explicit
        }
        None => taxable.percent_of(default_tax_rate),
    };

    let total = taxable + tax;
    if !total.is_positive() {
        return Err(CoreError::ZeroTotal);
    }

    if paid_amount.is_negative() {
        return Err(CoreError::InvalidPaymentAmount {
            reason: "paid amount must not be negative".to_string(),
        });
    }

    let payment_status = if paid_amount >= total {
        PaymentStatus::Paid
    } else if !allow_underpayment {
        return Err(CoreError::Underpaid {
            total: total.to_string(),
            paid: paid_amount.to_string(),
        });
    } else if paid_amount.is_zero() {
        PaymentStatus::Unpaid
    } else {
        PaymentStatus::Partial
    };

    Ok(SaleTotals {
        subtotal,
        discount: discount_amount,
        discount_percentage,
        tax,
        total,
        paid_amount,
        change_amount: paid_amount - total,
        payment_status,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
