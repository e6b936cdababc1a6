//! # Command Inputs
//!
//! Payloads accepted by the write and query operations of the store:
//! `New*` for creation, `*Patch` for partial updates (every `None` field is
//! left untouched), and `*Filter` for list queries.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Percent};
use crate::status::{
    CustomerType, FlowDirection, MovementType, PaymentMethod, RepairPriority, RepairStatus,
    WalletProvider, WalletTxStatus, WalletTxType,
};

// =============================================================================
// Catalog
// =============================================================================

/// Fields for a new product.
///
/// A blank `sku` asks the catalog to generate one (`PRD-<epoch>`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    pub barcode: Option<String>,
    pub buy_price: Money,
    pub sale_price: Money,
    /// Emitted as one `initial_stock` movement when positive.
    pub initial_qty: i64,
    pub min_stock: i64,
    pub max_stock: i64,
    pub location: Option<String>,
    pub supplier: Option<String>,
    /// Falls back to the `default_warranty` setting when absent.
    pub warranty_months: Option<i64>,
    pub tax_rate: Percent,
}

/// Partial product update. SKU is immutable and therefore absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    pub barcode: Option<String>,
    pub buy_price: Option<Money>,
    pub sale_price: Option<Money>,
    pub min_stock: Option<i64>,
    pub max_stock: Option<i64>,
    pub location: Option<String>,
    pub supplier: Option<String>,
    pub warranty_months: Option<i64>,
    pub tax_rate: Option<Percent>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.subcategory.is_none()
            && self.brand.is_none()
            && self.barcode.is_none()
            && self.buy_price.is_none()
            && self.sale_price.is_none()
            && self.min_stock.is_none()
            && self.max_stock.is_none()
            && self.location.is_none()
            && self.supplier.is_none()
            && self.warranty_months.is_none()
            && self.tax_rate.is_none()
    }
}

/// Catalog search. Every set field narrows the result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductFilter {
    pub sku: Option<String>,
    pub barcode: Option<String>,
    /// Substring match on name or brand.
    pub text: Option<String>,
    pub category: Option<String>,
    pub active: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSupplier {
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SupplierPatch {
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewCustomer {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub notes: Option<String>,
    pub customer_type: CustomerType,
    pub discount_percentage: Percent,
    pub credit_limit: Money,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub notes: Option<String>,
    pub customer_type: Option<CustomerType>,
    pub discount_percentage: Option<Percent>,
    pub credit_limit: Option<Money>,
}

// =============================================================================
// Inventory
// =============================================================================

/// One ledger write. `qty` is absolute; the sign comes from `movement_type`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockChange {
    pub product_id: String,
    pub movement_type: MovementType,
    pub qty: i64,
    pub cost_per_unit: Money,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub notes: Option<String>,
    pub actor: Option<String>,
    /// Persist even when the result would be negative.
    pub allow_negative: bool,
}

impl StockChange {
    /// A change with no reference, notes, or actor.
    pub fn new(product_id: impl Into<String>, movement_type: MovementType, qty: i64, cost_per_unit: Money) -> Self {
        StockChange {
            product_id: product_id.into(),
            movement_type,
            qty,
            cost_per_unit,
            reference_id: None,
            reference_type: None,
            notes: None,
            actor: None,
            allow_negative: false,
        }
    }

    pub fn reference(mut self, id: impl Into<String>, kind: impl Into<String>) -> Self {
        self.reference_id = Some(id.into());
        self.reference_type = Some(kind.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn allow_negative(mut self, allow: bool) -> Self {
        self.allow_negative = allow;
        self
    }
}

// =============================================================================
// Checkout
// =============================================================================

/// One line of a checkout.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutLine {
    pub product_id: String,
    pub qty: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub discount: Money,
}

/// Sale-level discount, given either as an amount or as a percentage of the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DiscountSpec {
    Amount(Money),
    Percentage(Percent),
}

impl Default for DiscountSpec {
    fn default() -> Self {
        DiscountSpec::Amount(Money::zero())
    }
}

/// Who is buying.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustomerRef {
    /// Anonymous counter sale.
    #[default]
    Anonymous,
    /// Registered customer; name and phone are snapshotted at sale time.
    Registered { id: String },
    /// Walk-in with details typed by the cashier.
    WalkIn { name: String, phone: Option<String> },
}

/// Everything needed to post one sale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutRequest {
    pub lines: Vec<CheckoutLine>,
    pub discount: DiscountSpec,
    /// When `None`, tax = (subtotal − discount) × `tax_rate` setting.
    pub tax: Option<Money>,
    pub paid_amount: Money,
    pub payment_method: PaymentMethod,
    pub allow_underpayment: bool,
    pub customer: CustomerRef,
    pub cashier: Option<String>,
    pub notes: Option<String>,
}

// =============================================================================
// Repairs
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewRepair {
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
    pub estimated_days: Option<i64>,
    /// Defaults to today.
    #[ts(as = "Option<String>")]
    pub receive_date: Option<NaiveDate>,
    /// Initial status, `waiting` unless the ticket is opened mid-flow.
    pub status: Option<RepairStatus>,
    pub technician: Option<String>,
    pub accessories: Option<String>,
    pub backup_created: bool,
    pub warranty_days: i64,
    pub notes: Option<String>,
    pub internal_notes: Option<String>,
}

/// Editable ticket fields. Status moves through `transition`, costs through `set_costs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RepairPatch {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub device_type: Option<String>,
    pub device_model: Option<String>,
    pub device_serial: Option<String>,
    pub device_color: Option<String>,
    pub device_password: Option<String>,
    pub problem_description: Option<String>,
    pub repair_type: Option<String>,
    pub priority: Option<RepairPriority>,
    pub estimated_days: Option<i64>,
    pub technician: Option<String>,
    pub accessories: Option<String>,
    pub backup_created: Option<bool>,
    pub data_recovered: Option<bool>,
    pub warranty_days: Option<i64>,
    pub notes: Option<String>,
    pub internal_notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RepairCosts {
    pub actual_cost: Money,
    pub parts_cost: Money,
    pub labor_cost: Money,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RepairFilter {
    pub status: Option<RepairStatus>,
    pub priority: Option<RepairPriority>,
    /// Substring match on customer name, phone, or device model.
    pub text: Option<String>,
    #[ts(as = "Option<String>")]
    pub from: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
}

// =============================================================================
// Wallet
// =============================================================================

/// A wallet posting before sign rules are applied.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewWalletTx {
    pub provider: WalletProvider,
    pub transaction_type: WalletTxType,
    /// Unsigned principal; must be positive.
    pub principal: Money,
    #[serde(default)]
    pub fees: Money,
    /// Only consulted for `transfer` and `payment`; defaults to outflow.
    pub direction: Option<FlowDirection>,
    pub service_type: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub sender_number: Option<String>,
    pub recipient_number: Option<String>,
    pub reference: Option<String>,
    pub external_reference: Option<String>,
    #[serde(default)]
    pub status: WalletTxStatus,
    pub notes: Option<String>,
    pub cashier: Option<String>,
}

impl NewWalletTx {
    /// A completed posting with no counterparty details.
    pub fn new(provider: WalletProvider, transaction_type: WalletTxType, principal: Money) -> Self {
        NewWalletTx {
            provider,
            transaction_type,
            principal,
            fees: Money::zero(),
            direction: None,
            service_type: None,
            customer_name: None,
            customer_phone: None,
            sender_number: None,
            recipient_number: None,
            reference: None,
            external_reference: None,
            status: WalletTxStatus::Completed,
            notes: None,
            cashier: None,
        }
    }
}

/// Move money from one provider account to another as two linked rows.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WalletTransfer {
    pub from: WalletProvider,
    pub to: WalletProvider,
    pub principal: Money,
    #[serde(default)]
    pub fees: Money,
    pub notes: Option<String>,
    pub cashier: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WalletFilter {
    pub provider: Option<WalletProvider>,
    pub transaction_type: Option<WalletTxType>,
    pub status: Option<WalletTxStatus>,
    #[ts(as = "Option<String>")]
    pub from: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
}

/// Which wallet rows count towards a balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BalanceScope {
    /// Every row regardless of status.
    #[default]
    All,
    /// Only `completed` rows.
    CompletedOnly,
}

// =============================================================================
// Reports
// =============================================================================

/// Inclusive calendar-day range over `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateRange {
    #[ts(as = "String")]
    pub from: NaiveDate,
    #[ts(as = "String")]
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        DateRange { from, to }
    }

    /// A single calendar day.
    pub fn day(day: NaiveDate) -> Self {
        DateRange { from: day, to: day }
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        let d = at.date();
        d >= self.from && d <= self.to
    }
}
