//! # Repository Module
//!
//! Components of the shop back office, one per file.
//!
//! ## Component Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Components over the Store                            │
//! │                                                                         │
//! │  Presentation                                                          │
//! │       │  db.sales().checkout(request)                                  │
//! │       ▼                                                                 │
//! │  ┌──────────────┐   ┌────────────────┐   ┌──────────────────────┐     │
//! │  │ SaleRepo     │──►│ InventoryLedger│◄──│ ProductRepository    │     │
//! │  │ checkout     │   │ apply_in(conn) │   │ create (initial qty) │     │
//! │  │ refund       │   └───────▲────────┘   └──────────▲───────────┘     │
//! │  └──────┬───────┘           │                       │                 │
//! │         │ allocate          │                       │                 │
//! │  ┌──────▼───────┐   ┌───────┴────────┐   ┌──────────┴───────────┐     │
//! │  │ numbering    │◄──│ WalletLedger   │   │ ImportService (CSV)  │     │
//! │  └──────────────┘   └────────────────┘   └──────────────────────┘     │
//! │                                                                         │
//! │  RepairRepository · CustomerRepository · SupplierRepository            │
//! │  SettingsRepository · ReportRepository (read-only)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Components hold a cloned `Database`. Helpers that take
//! `&mut SqliteConnection` participate in the caller's transaction and are
//! the only way one component writes on behalf of another.

use chrono::{Local, NaiveDate, NaiveDateTime};

pub mod catalog;
pub mod customer;
pub mod import;
pub mod inventory;
pub mod numbering;
pub mod repair;
pub mod report;
pub mod sale;
pub mod settings;
pub mod supplier;
pub mod wallet;

/// Local wall-clock time stored on every row.
pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Local calendar day, used for document numbers and repair dates.
pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// `%term%` for LIKE searches, with the LIKE wildcards in `term` escaped.
/// Use with `ESCAPE '\'`.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" case "), "%case%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
