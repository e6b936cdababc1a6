//! # Identifiers & Document Numbers
//!
//! Two kinds of identifiers:
//! - **Opaque ids**: UUID v4 strings for products, sales, movements, ...
//! - **Document numbers**: `PREFIX-YYYYMMDD-NNNN`, sequenced per day.
//!
//! ```text
//! today = 2024-03-01, prefix = S
//!
//!   MAX(sale_number LIKE 'S-20240301-%')
//!        │
//!        ├── None               ──► S-20240301-0001
//!        └── S-20240301-0041    ──► S-20240301-0042
//! ```
//!
//! The store allocates inside the enclosing write transaction, so no
//! other serialization is needed.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::ValidationError;

/// Width of the per-day counter.
pub const SEQUENCE_WIDTH: usize = 4;

/// Business document kinds that carry a dated number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Sale,
    WalletTransaction,
}

impl DocumentKind {
    pub const fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Sale => "S",
            DocumentKind::WalletTransaction => "WT",
        }
    }

    /// `S-20240301-`
    pub fn day_prefix(&self, day: NaiveDate) -> String {
        format!("{}-{}-", self.prefix(), day.format("%Y%m%d"))
    }

    /// Formats a full document number.
    ///
    /// ## Example
    /// ```rust
    /// use cellpos_core::numbering::DocumentKind;
    /// use chrono::NaiveDate;
    ///
    /// let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    /// assert_eq!(DocumentKind::Sale.format(day, 7), "S-20240301-0007");
    /// ```
    pub fn format(&self, day: NaiveDate, seq: u32) -> String {
        format!("{}{:0width$}", self.day_prefix(day), seq, width = SEQUENCE_WIDTH)
    }

    /// Next number given today's highest issued number, if any.
    pub fn next(&self, day: NaiveDate, current_max: Option<&str>) -> Result<String, ValidationError> {
        let seq = match current_max {
            None => 1,
            Some(last) => parse_sequence(&self.day_prefix(day), last)? + 1,
        };
        Ok(self.format(day, seq))
    }
}

/// Extracts the counter from a number issued under `day_prefix`.
pub fn parse_sequence(day_prefix: &str, number: &str) -> Result<u32, ValidationError> {
    number
        .strip_prefix(day_prefix)
        .and_then(|seq| seq.parse::<u32>().ok())
        .ok_or_else(|| {
            ValidationError::invalid_format(
                "document_number",
                format!("'{number}' does not match '{day_prefix}NNNN'"),
            )
        })
}

/// New opaque entity id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generated SKU `PRD-<epoch>`; attempts after the first get `-2`, `-3`, ...
///
/// ## Example
/// ```rust
/// use cellpos_core::numbering::generated_sku;
///
/// assert_eq!(generated_sku(1_700_000_000, 1), "PRD-1700000000");
/// assert_eq!(generated_sku(1_700_000_000, 3), "PRD-1700000000-3");
/// ```
pub fn generated_sku(epoch_secs: i64, attempt: u32) -> String {
    if attempt <= 1 {
        format!("PRD-{epoch_secs}")
    } else {
        format!("PRD-{epoch_secs}-{attempt}")
    }
}
