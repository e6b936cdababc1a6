//! # Wallet Posting Rules
//!
//! The stored `amount` is signed so that a provider's balance is a plain sum.
//!
//! ```text
//! ┌────────────────────────────┬──────────────────────┬──────────────────────┐
//! │ transaction_type           │ amount               │ net_amount           │
//! ├────────────────────────────┼──────────────────────┼──────────────────────┤
//! │ send, withdraw, fees       │ −(principal + fees)  │ = amount             │
//! │ receive, deposit, refund   │ +principal           │ principal − fees     │
//! │ transfer, payment          │ caller direction, outflow by default        │
//! └────────────────────────────┴──────────────────────┴──────────────────────┘
//! ```

use crate::error::CoreResult;
use crate::money::Money;
use crate::status::{FlowDirection, WalletTxType};
use crate::validation::{validate_non_negative, validate_price};

impl WalletTxType {
    /// Fixed direction, or `None` when the caller chooses.
    pub const fn fixed_direction(&self) -> Option<FlowDirection> {
        match self {
            WalletTxType::Send | WalletTxType::Withdraw | WalletTxType::Fees => {
                Some(FlowDirection::Outflow)
            }
            WalletTxType::Receive | WalletTxType::Deposit | WalletTxType::Refund => {
                Some(FlowDirection::Inflow)
            }
            WalletTxType::Transfer | WalletTxType::Payment => None,
        }
    }

    /// Types that must name a recipient number.
    pub const fn requires_recipient(&self) -> bool {
        matches!(self, WalletTxType::Send | WalletTxType::Transfer)
    }
}

/// Signed amounts for one wallet row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub direction: FlowDirection,
    pub amount: Money,
    pub net_amount: Money,
}

/// Applies the sign rule.
///
/// ## Example
/// ```rust
/// use cellpos_core::money::Money;
/// use cellpos_core::status::WalletTxType;
/// use cellpos_core::wallet_rules::post_amounts;
///
/// let send = post_amounts(WalletTxType::Send, Money::from_major(200), Money::from_major(5), None).unwrap();
/// assert_eq!(send.amount, Money::from_major(-205));
/// assert_eq!(send.net_amount, Money::from_major(-205));
/// ```
pub fn post_amounts(
    tx_type: WalletTxType,
    principal: Money,
    fees: Money,
    requested: Option<FlowDirection>,
) -> CoreResult<Posting> {
    validate_price("amount", principal)?;
    validate_non_negative("fees", fees)?;

    let direction = tx_type
        .fixed_direction()
        .or(requested)
        .unwrap_or(FlowDirection::Outflow);

    let posting = match direction {
        FlowDirection::Outflow => {
            let amount = -(principal + fees);
            Posting {
                direction,
                amount,
                net_amount: amount,
            }
        }
        FlowDirection::Inflow => Posting {
            direction,
            amount: principal,
            net_amount: principal - fees,
        },
    };
    Ok(posting)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(major: i64) -> Money {
        Money::from_major(major)
    }

    #[test]
    fn test_receive_is_inflow() {
        let p = post_amounts(WalletTxType::Receive, m(500), Money::zero(), None).unwrap();
        assert_eq!(p.amount, m(500));
        assert_eq!(p.net_amount, m(500));

        let p = post_amounts(WalletTxType::Deposit, m(100), m(2), None).unwrap();
        assert_eq!(p.amount, m(100));
        assert_eq!(p.net_amount, m(98));
    }

    #[test]
    fn test_outflows_include_fees() {
        for t in [WalletTxType::Send, WalletTxType::Withdraw, WalletTxType::Fees] {
            let p = post_amounts(t, m(200), m(5), None).unwrap();
            assert_eq!(p.amount, m(-205), "{t}");
            assert_eq!(p.net_amount, p.amount);
        }
    }

    #[test]
    fn test_fixed_direction_ignores_request() {
        let p = post_amounts(WalletTxType::Send, m(10), Money::zero(), Some(FlowDirection::Inflow)).unwrap();
        assert_eq!(p.direction, FlowDirection::Outflow);
    }

    #[test]
    fn test_transfer_direction() {
        let out = post_amounts(WalletTxType::Transfer, m(50), m(1), None).unwrap();
        assert_eq!(out.amount, m(-51));

        let inn = post_amounts(WalletTxType::Payment, m(50), m(1), Some(FlowDirection::Inflow)).unwrap();
        assert_eq!(inn.amount, m(50));
        assert_eq!(inn.net_amount, m(49));
    }

    #[test]
    fn test_rejects_non_positive_principal() {
        assert!(post_amounts(WalletTxType::Receive, Money::zero(), Money::zero(), None).is_err());
        assert!(post_amounts(WalletTxType::Receive, m(-1), Money::zero(), None).is_err());
        assert!(post_amounts(WalletTxType::Receive, m(1), m(-1), None).is_err());
    }

    #[test]
    fn test_requires_recipient() {
        assert!(WalletTxType::Send.requires_recipient());
        assert!(WalletTxType::Transfer.requires_recipient());
        assert!(!WalletTxType::Receive.requires_recipient());
    }
}
