//! # Error Types
//!
//! Domain-specific error types for cellpos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cellpos-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - Stable code shown to the presentation layer    │
//! │                                                                         │
//! │  cellpos-db errors (separate crate)                                    │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ErrorKind → UI          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::status::RepairStatus;

// =============================================================================
// Error Kind
// =============================================================================

/// Machine-readable error category.
///
/// Every error returned by a core operation maps to exactly one kind.
/// The presentation layer switches on this, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller-supplied data failed a field-level rule.
    Validation,
    /// Uniqueness violated (duplicate SKU, duplicate document number).
    Conflict,
    /// Referenced entity absent.
    NotFound,
    /// Referenced product exists but is inactive.
    Gone,
    /// A sale line would drive stock negative.
    InsufficientStock,
    /// Paid amount below total without override.
    Underpaid,
    /// Repair state machine rejected the move.
    IllegalTransition,
    /// A ledger movement would drive current_qty negative.
    Underflow,
    /// Underlying database failure.
    Storage,
}

impl ErrorKind {
    /// Returns the snake_case code.
    pub const fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Gone => "gone",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::Underpaid => "underpaid",
            ErrorKind::IllegalTransition => "illegal_transition",
            ErrorKind::Underflow => "underflow",
            ErrorKind::Storage => "storage",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product exists but has been retired.
    #[error("Product {sku} is inactive")]
    ProductInactive { sku: String },

    /// Insufficient stock to complete a sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout line (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "CASE-01", available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// A ledger movement would leave the product below zero.
    #[error("Stock underflow for product {product_id}: on hand {on_hand}, delta {delta}")]
    Underflow {
        product_id: String,
        on_hand: i64,
        delta: i64,
    },

    /// Paid amount is below the sale total and underpayment was not allowed.
    #[error("Underpaid: total {total}, paid {paid}")]
    Underpaid { total: String, paid: String },

    /// Repair status move rejected by the state machine.
    #[error("Repair cannot move from {from} to {to}")]
    IllegalTransition { from: RepairStatus, to: RepairStatus },

    /// Sale has no lines.
    #[error("Sale must have at least one line")]
    EmptySale,

    /// Sale total is zero.
    #[error("Sale total must be greater than zero")]
    ZeroTotal,

    /// Discount larger than the amount it applies to.
    #[error("Discount {discount} exceeds subtotal {subtotal}")]
    DiscountExceedsSubtotal { discount: String, subtotal: String },

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Maps the error to its category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ProductInactive { .. } => ErrorKind::Gone,
            CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CoreError::Underflow { .. } => ErrorKind::Underflow,
            CoreError::Underpaid { .. } => ErrorKind::Underpaid,
            CoreError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            CoreError::EmptySale
            | CoreError::ZeroTotal
            | CoreError::DiscountExceedsSubtotal { .. }
            | CoreError::InvalidPaymentAmount { .. }
            | CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic or database work runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., unparsable amount, bad date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }

    pub fn must_not_be_negative(field: impl Into<String>) -> Self {
        ValidationError::MustNotBeNegative {
            field: field.into(),
        }
    }

    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
