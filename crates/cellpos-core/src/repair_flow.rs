//! # Repair State Machine
//!
//! ```text
//!           ┌──→ awaiting_parts ──┐
//! waiting ──┤         ▲           ├──→ in_progress ──→ completed ──→ delivered
//!           └──→ in_progress ─────┘         │               │
//!                     └─────────────────────┘               │
//!   any non-terminal state ─────────────────────────────────┴──→ cancelled
//!
//! delivered and cancelled are terminal. Same-state moves are rejected.
//! ```

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult};
use crate::status::RepairStatus;

impl RepairStatus {
    /// Terminal states accept no further transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, RepairStatus::Delivered | RepairStatus::Cancelled)
    }

    /// States reachable in one step.
    pub const fn allowed_next(&self) -> &'static [RepairStatus] {
        use RepairStatus::*;
        match self {
            Waiting => &[InProgress, AwaitingParts, Cancelled],
            AwaitingParts => &[InProgress, Cancelled],
            InProgress => &[AwaitingParts, Completed, Cancelled],
            Completed => &[Delivered, Cancelled],
            Delivered | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: RepairStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Whether reaching this state stamps `delivery_date`.
    pub const fn sets_delivery_date(&self) -> bool {
        matches!(self, RepairStatus::Completed | RepairStatus::Delivered)
    }
}

/// Checks a requested move.
///
/// ## Example
/// ```rust
/// use cellpos_core::repair_flow::check_transition;
/// use cellpos_core::status::RepairStatus;
///
/// assert!(check_transition(RepairStatus::Waiting, RepairStatus::InProgress).is_ok());
/// assert!(check_transition(RepairStatus::Waiting, RepairStatus::Delivered).is_err());
/// ```
pub fn check_transition(from: RepairStatus, to: RepairStatus) -> CoreResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoreError::IllegalTransition { from, to })
    }
}

/// Date fields a transition writes onto the ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionStamp {
    pub delivery_date: Option<NaiveDate>,
    pub actual_days: Option<i64>,
}

/// Computes the date fields for moving a ticket into `to` on `today`.
///
/// `delivery_date` is set once (on completion, or on delivery if still
/// empty); `actual_days` is computed on delivery.
pub fn transition_stamp(
    to: RepairStatus,
    receive_date: NaiveDate,
    current_delivery: Option<NaiveDate>,
    today: NaiveDate,
) -> TransitionStamp {
    let delivery_date = if to.sets_delivery_date() {
        Some(current_delivery.unwrap_or(today))
    } else {
        current_delivery
    };
    let actual_days = match (to, delivery_date) {
        (RepairStatus::Delivered, Some(delivered)) => {
            Some((delivered - receive_date).num_days().max(0))
        }
        _ => None,
    };
    TransitionStamp {
        delivery_date,
        actual_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RepairStatus::*;

    #[test]
    fn test_happy_path() {
        let path = [Waiting, InProgress, AwaitingParts, InProgress, Completed, Delivered];
        for pair in path.windows(2) {
            assert!(check_transition(pair[0], pair[1]).is_ok(), "{:?}", pair);
        }
    }

    #[test]
    fn test_terminal_states() {
        for next in RepairStatus::ALL {
            assert!(!Delivered.can_transition_to(*next));
            assert!(!Cancelled.can_transition_to(*next));
        }
        assert!(Delivered.is_terminal());
        assert!(!Completed.is_terminal());
    }

    #[test]
    fn test_cancel_from_any_open_state() {
        for from in [Waiting, InProgress, AwaitingParts, Completed] {
            assert!(from.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn test_rejected_moves() {
        assert!(check_transition(Waiting, Completed).is_err());
        assert!(check_transition(Waiting, Delivered).is_err());
        assert!(check_transition(AwaitingParts, Completed).is_err());
        assert!(check_transition(Completed, InProgress).is_err());
        for s in RepairStatus::ALL {
            assert!(check_transition(*s, *s).is_err(), "same-state {s}");
        }
    }

    #[test]
    fn test_transition_stamp() {
        let received = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

        let started = transition_stamp(InProgress, received, None, today);
        assert_eq!(started.delivery_date, None);

        let done = transition_stamp(Completed, received, None, today);
        assert_eq!(done.delivery_date, Some(today));
        assert_eq!(done.actual_days, None);

        let later = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        let delivered = transition_stamp(Delivered, received, Some(today), later);
        assert_eq!(delivered.delivery_date, Some(today));
        assert_eq!(delivered.actual_days, Some(3));
    }
}
