//! # cellpos-core: Pure Business Logic for the Shop Back Office
//!
//! Domain types and rules with zero I/O dependencies. Storage lives in
//! `cellpos-db`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        cellpos Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Presentation (dashboards, forms, printing)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    cellpos-db (Store + components)              │   │
//! │  │   Catalog, InventoryLedger, Checkout, Repairs, Wallet, Reports  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cellpos-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌────────┐ ┌──────────┐ ┌────────────┐           │   │
//! │  │   │  money  │ │ status │ │ checkout │ │ repair_flow│           │   │
//! │  │   │ Money   │ │ enums  │ │ totals   │ │ transitions│           │   │
//! │  │   └─────────┘ └────────┘ └──────────┘ └────────────┘           │   │
//! │  │   ┌─────────┐ ┌────────┐ ┌──────────┐ ┌────────────┐           │   │
//! │  │   │  types  │ │ input  │ │validation│ │wallet_rules│           │   │
//! │  │   └─────────┘ └────────┘ └──────────┘ └────────────┘           │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money` in ten-thousandths and `Percent` in basis points
//! - [`status`] - closed enumerations stored as snake_case codes
//! - [`types`] - persisted entities
//! - [`input`] - create/patch/filter payloads
//! - [`validation`] - field-level rules
//! - [`numbering`] - ids and `PREFIX-YYYYMMDD-NNNN` document numbers
//! - [`repair_flow`] - repair ticket state machine
//! - [`wallet_rules`] - signed wallet postings
//! - [`checkout`] - sale line pricing and totals
//! - [`import_row`] - catalog CSV row layout
//! - [`error`] - domain errors and the `ErrorKind` taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use cellpos_core::money::{Money, Percent};
//!
//! let subtotal: Money = "200".parse().unwrap();
//! let discount = subtotal.percent_of(Percent::from_bps(1000));
//! assert_eq!((subtotal - discount).to_string(), "180.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod import_row;
pub mod input;
pub mod money;
pub mod numbering;
pub mod repair_flow;
pub mod status;
pub mod types;
pub mod validation;
pub mod wallet_rules;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use input::*;
pub use money::{Money, Percent};
pub use status::*;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines on a single sale.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity on a single sale line.
///
/// ## Business Reason
/// Catches a mistyped quantity (1000 instead of 10) at the counter.
pub const MAX_LINE_QUANTITY: i64 = 9_999;

/// Largest stock level a product may hold or receive in one movement.
pub const MAX_STOCK_LEVEL: i64 = 1_000_000;

/// Largest price, cost or payment amount accepted, in whole currency units.
///
/// Together with `MAX_STOCK_LEVEL` this keeps every line and ledger total
/// inside `i64` ten-thousandths.
pub const MAX_AMOUNT_MAJOR: i64 = 100_000_000;
