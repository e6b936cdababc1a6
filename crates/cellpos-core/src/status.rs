//! # Closed Enumerations
//!
//! Every closed set in the domain (movement type, payment method, repair
//! status, wallet transaction type, ...) is a tagged Rust enum. The database
//! stores the snake_case code; display strings belong to the presentation
//! layer.
//!
//! ```text
//! ┌──────────────┐  as_str()   ┌──────────────┐   sqlx::Type   ┌──────────┐
//! │ RepairStatus │ ──────────► │ "in_progress"│ ─────────────► │  TEXT    │
//! │  ::InProgress│ ◄────────── │              │ ◄───────────── │  column  │
//! └──────────────┘  FromStr    └──────────────┘                └──────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Declares a code-backed enum with `as_str`, `ALL`, `Display` and `FromStr`.
///
/// Codes must equal the snake_case variant names so the serde and sqlx
/// renames agree with `as_str`.
macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $code:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
        #[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
        #[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
        #[serde(rename_all = "snake_case")]
        #[ts(export)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Storage code.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $code, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $( $code => Ok($name::$variant), )+
                    _ => Err(ValidationError::NotAllowed {
                        field: stringify!($name).to_string(),
                        allowed: $name::ALL.iter().map(|v| v.as_str().to_string()).collect(),
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Inventory
// =============================================================================

code_enum! {
    /// Kind of stock movement. The sign of the stored quantity follows the type.
    ///
    /// | type               | sign |
    /// |--------------------|------|
    /// | initial_stock      |  +   |
    /// | stock_in           |  +   |
    /// | import             |  +   |
    /// | adjustment         |  +   |
    /// | return             |  +   |
    /// | sale               |  −   |
    /// | stock_out          |  −   |
    /// | damage             |  −   |
    /// | return_to_supplier |  −   |
    pub enum MovementType {
        InitialStock => "initial_stock",
        StockIn => "stock_in",
        StockOut => "stock_out",
        Adjustment => "adjustment",
        Sale => "sale",
        Return => "return",
        Damage => "damage",
        ReturnToSupplier => "return_to_supplier",
        Import => "import",
    }
}

impl MovementType {
    /// +1 for inflows, −1 for outflows.
    pub const fn sign(&self) -> i64 {
        match self {
            MovementType::InitialStock
            | MovementType::StockIn
            | MovementType::Import
            | MovementType::Adjustment
            | MovementType::Return => 1,
            MovementType::Sale
            | MovementType::StockOut
            | MovementType::Damage
            | MovementType::ReturnToSupplier => -1,
        }
    }

    /// Signed delta for an absolute quantity.
    pub const fn signed(&self, qty: i64) -> i64 {
        self.sign() * qty
    }
}

code_enum! {
    /// Stock level classification used by the inventory status report.
    pub enum StockStatus {
        Out => "out",
        Low => "low",
        Ok => "ok",
    }
}

impl StockStatus {
    /// `out` at zero or below, `low` at or under the threshold, else `ok`.
    pub fn classify(current_qty: i64, min_stock: i64) -> Self {
        if current_qty <= 0 {
            StockStatus::Out
        } else if current_qty <= min_stock {
            StockStatus::Low
        } else {
            StockStatus::Ok
        }
    }
}

// =============================================================================
// Sales
// =============================================================================

code_enum! {
    /// How the customer paid.
    pub enum PaymentMethod {
        Cash => "cash",
        Card => "card",
        Transfer => "transfer",
        Wallet => "wallet",
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

code_enum! {
    /// Settlement state of a sale.
    pub enum PaymentStatus {
        Paid => "paid",
        Partial => "partial",
        Unpaid => "unpaid",
        Refunded => "refunded",
    }
}

code_enum! {
    pub enum CustomerType {
        Regular => "regular",
        Vip => "vip",
        Wholesale => "wholesale",
    }
}

impl Default for CustomerType {
    fn default() -> Self {
        CustomerType::Regular
    }
}

// =============================================================================
// Repairs
// =============================================================================

code_enum! {
    /// Repair ticket lifecycle. Transition rules live in `repair_flow`.
    pub enum RepairStatus {
        Waiting => "waiting",
        InProgress => "in_progress",
        AwaitingParts => "awaiting_parts",
        Completed => "completed",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
}

impl Default for RepairStatus {
    fn default() -> Self {
        RepairStatus::Waiting
    }
}

code_enum! {
    pub enum RepairPriority {
        Normal => "normal",
        Urgent => "urgent",
        Emergency => "emergency",
    }
}

impl Default for RepairPriority {
    fn default() -> Self {
        RepairPriority::Normal
    }
}

// =============================================================================
// Wallet
// =============================================================================

code_enum! {
    /// Operator of an electronic wallet account held by the shop.
    pub enum WalletProvider {
        Vodafone => "vodafone",
        Orange => "orange",
        Etisalat => "etisalat",
    }
}

code_enum! {
    pub enum WalletTxType {
        Receive => "receive",
        Send => "send",
        Deposit => "deposit",
        Withdraw => "withdraw",
        Fees => "fees",
        Transfer => "transfer",
        Payment => "payment",
        Refund => "refund",
    }
}

code_enum! {
    pub enum WalletTxStatus {
        Completed => "completed",
        Pending => "pending",
        Failed => "failed",
    }
}

impl Default for WalletTxStatus {
    fn default() -> Self {
        WalletTxStatus::Completed
    }
}

code_enum! {
    /// Direction of money relative to the shop's wallet account.
    pub enum FlowDirection {
        Inflow => "inflow",
        Outflow => "outflow",
    }
}
