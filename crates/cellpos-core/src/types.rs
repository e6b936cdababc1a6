//! # Domain Types
//!
//! Persisted entities of the shop back office.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────┐  1   *  ┌───────────────────┐                        │
//! │  │   Product    │ ──────► │ InventoryMovement │  signed qty ledger     │
//! │  └──────┬───────┘         └─────────▲─────────┘                        │
//! │         │ snapshot                  │ reference_id = sale id           │
//! │  ┌──────▼───────┐  *   1  ┌─────────┴─────────┐  *   1 ┌───────────┐  │
//! │  │   SaleItem   │ ──────► │       Sale        │ ─────► │ Customer  │  │
//! │  └──────────────┘         └───────────────────┘snapshot└───────────┘  │
//! │                                                                         │
//! │  ┌──────────────┐  1   *  ┌───────────────────────┐                    │
//! │  │    Repair    │ ──────► │ RepairStatusHistory   │  trigger-written   │
//! │  └──────────────┘         └───────────────────────┘                    │
//! │                                                                         │
//! │  ┌───────────────────┐  ┌────────────┐  ┌─────────┐                    │
//! │  │ WalletTransaction │  │  Supplier  │  │ Setting │                    │
//! │  └───────────────────┘  └────────────┘  └─────────┘                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! - `id`: UUID v4 string, used for relations (repairs use an integer ticket id)
//! - Business key: `sku`, `sale_number`, `transaction_number`
//!
//! Timestamps are local wall-clock `NaiveDateTime`; calendar fields are `NaiveDate`.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Percent};
use crate::status::{
    CustomerType, MovementType, PaymentMethod, PaymentStatus, RepairPriority, RepairStatus,
    WalletProvider, WalletTxStatus, WalletTxType,
};

// =============================================================================
// Product
// =============================================================================

/// A catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit. Unique across active and inactive products.
    pub sku: String,

    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    pub barcode: Option<String>,

    pub buy_price: Money,
    pub sale_price: Money,

    /// On-hand quantity. Only the inventory ledger writes this.
    pub current_qty: i64,

    pub min_stock: i64,
    pub max_stock: i64,

    pub location: Option<String>,

    /// Free-text supplier name, no foreign key.
    pub supplier: Option<String>,

    pub warranty_months: Option<i64>,
    pub active: bool,
    pub tax_rate: Percent,

    /// `(sale − buy) / buy · 100`, or 0 when buy price is 0.
    pub profit_margin: f64,

    #[ts(as = "String")]
    pub created_at: NaiveDateTime,
    #[ts(as = "String")]
    pub updated_at: NaiveDateTime,
}

impl Product {
    /// Value of on-hand stock at buy price.
    pub fn stock_value(&self) -> Money {
        self.buy_price.multiply_quantity(self.current_qty)
    }
}

/// Profit margin in percent for a buy/sale pair.
///
/// ## Example
/// ```rust
/// use cellpos_core::money::Money;
/// use cellpos_core::types::profit_margin;
///
/// assert_eq!(profit_margin(Money::from_major(10), Money::from_major(20)), 100.0);
/// assert_eq!(profit_margin(Money::zero(), Money::from_major(20)), 0.0);
/// ```
pub fn profit_margin(buy_price: Money, sale_price: Money) -> f64 {
    (sale_price - buy_price)
        .ratio_percent(buy_price)
        .map(|m| (m * 100.0).round() / 100.0)
        .unwrap_or(0.0)
}

// =============================================================================
// Supplier & Customer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub notes: Option<String>,
    pub customer_type: CustomerType,
    /// Default discount offered to this customer.
    pub discount_percentage: Percent,
    pub credit_limit: Money,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: NaiveDateTime,
    #[ts(as = "String")]
    pub updated_at: NaiveDateTime,
}

// =============================================================================
// Sale
// =============================================================================

/// A completed sale header.
///
/// ## Invariants
/// - `subtotal == Σ items.total`
/// - `total == subtotal − discount + tax`
/// - `change_amount == paid_amount − total` (negative on partial payment)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,

    /// `S-YYYYMMDD-NNNN`.
    pub sale_number: String,

    pub customer_id: Option<String>,
    /// Write-once snapshot of the customer at sale time.
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,

    pub subtotal: Money,
    pub discount: Money,
    pub discount_percentage: Percent,
    pub tax: Money,
    pub total: Money,
    pub paid_amount: Money,
    pub change_amount: Money,

    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub cashier: Option<String>,
    pub notes: Option<String>,
    pub is_refunded: bool,

    #[ts(as = "String")]
    pub created_at: NaiveDateTime,
}

/// A sale line with product snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub product_name: String,
    pub sku: String,
    pub qty: i64,
    pub unit_price: Money,
    pub discount: Money,
    /// `qty · unit_price − discount`
    pub total: Money,
    /// Buy price at sale time.
    pub cost_price: Money,
    /// `(unit_price − cost_price) · qty`
    pub profit: Money,
    #[ts(as = "String")]
    pub created_at: NaiveDateTime,
}

// =============================================================================
// Inventory
// =============================================================================

/// One signed change to a product's on-hand quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryMovement {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    /// Positive = inflow, negative = outflow.
    pub quantity: i64,
    pub cost_per_unit: Money,
    pub total_cost: Money,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: NaiveDateTime,
}

// =============================================================================
// Repairs
// =============================================================================

/// A repair ticket. `id` is the human-visible ticket number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Repair {
    pub id: i64,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub device_type: String,
    pub device_model: Option<String>,
    pub device_serial: Option<String>,
    pub device_color: Option<String>,
    pub device_password: Option<String>,
    pub problem_description: Option<String>,
    pub repair_type: Option<String>,
    pub priority: RepairPriority,
    pub estimated_cost: Money,
    pub actual_cost: Money,
    pub parts_cost: Money,
    pub labor_cost: Money,
    pub estimated_days: Option<i64>,
    pub actual_days: Option<i64>,
    #[ts(as = "String")]
    pub receive_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub delivery_date: Option<NaiveDate>,
    pub status: RepairStatus,
    pub technician: Option<String>,
    pub accessories: Option<String>,
    pub backup_created: bool,
    pub data_recovered: bool,
    pub warranty_days: i64,
    pub notes: Option<String>,
    pub internal_notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: NaiveDateTime,
    #[ts(as = "String")]
    pub updated_at: NaiveDateTime,
}

/// Append-only status log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RepairStatusHistory {
    pub id: i64,
    pub repair_id: i64,
    /// `None` for the row recorded at creation.
    pub old_status: Option<RepairStatus>,
    pub new_status: RepairStatus,
    pub notes: Option<String>,
    pub changed_by: Option<String>,
    #[ts(as = "String")]
    pub changed_at: NaiveDateTime,
}

// =============================================================================
// Wallet
// =============================================================================

/// One posting on a provider's wallet account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WalletTransaction {
    pub id: String,
    /// `WT-YYYYMMDD-NNNN`.
    pub transaction_number: String,
    pub provider: WalletProvider,
    pub service_type: Option<String>,
    pub transaction_type: WalletTxType,
    /// Signed: outflows negative, inflows positive.
    pub amount: Money,
    pub fees: Money,
    pub net_amount: Money,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub sender_number: Option<String>,
    pub recipient_number: Option<String>,
    pub reference: Option<String>,
    pub external_reference: Option<String>,
    /// Shared by both legs of a cross-provider transfer.
    pub transfer_id: Option<String>,
    pub status: WalletTxStatus,
    pub notes: Option<String>,
    pub cashier: Option<String>,
    #[ts(as = "String")]
    pub created_at: NaiveDateTime,
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub category: Option<String>,
    #[ts(as = "String")]
    pub updated_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profit_margin() {
        assert_eq!(profit_margin(Money::from_major(10), Money::from_major(20)), 100.0);
        assert_eq!(profit_margin(Money::from_major(12), Money::from_major(25)), 108.33);
        assert_eq!(profit_margin(Money::from_major(20), Money::from_major(10)), -50.0);
        assert_eq!(profit_margin(Money::zero(), Money::from_major(5)), 0.0);
    }
}
