//! # cellpos-db: Store and Components for the Shop Back Office
//!
//! SQLite storage for cellpos through sqlx. Every multi-table write runs
//! inside one transaction under a process-wide write gate.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        cellpos Data Flow                                │
//! │                                                                         │
//! │  Presentation (checkout screen, repair board, reports)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   cellpos-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │   Components   │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (repository/)  │    │  (embedded)  │  │   │
//! │  │   │               │    │                │    │              │  │   │
//! │  │   │ SqlitePool    │    │ Catalog        │    │ 0001 schema  │  │   │
//! │  │   │ write gate    │◄───│ InventoryLedger│    │ 0002 legacy  │  │   │
//! │  │   │ StoreTx       │    │ Sales, Repairs │    │ 0003 triggers│  │   │
//! │  │   └───────────────┘    │ Wallet, Reports│    └──────────────┘  │   │
//! │  │                        └────────────────┘                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   ~/.local/share/cellpos/cellpos.db                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - connection pool, write gate, generic query primitives
//! - [`migrations`] - embedded schema migrations
//! - [`repository`] - one component per business area
//! - [`config`] - TOML + environment configuration
//! - [`value`] - dynamic SQL values for the generic primitives
//! - [`error`] - database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cellpos_db::{AppConfig, Database};
//!
//! let config = AppConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let receipt = db.sales().checkout(request).await?;
//! let stats = db.reports().dashboard(today).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
mod sample_data;
pub mod value;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::AppConfig;
pub use error::{DbError, DbResult, SqlClass};
pub use pool::{Database, DbConfig, StoreTx};
pub use value::{Record, SqlValue};

// Component re-exports for convenience
pub use repository::catalog::ProductRepository;
pub use repository::customer::CustomerRepository;
pub use repository::import::{ImportOptions, ImportService, ImportSummary};
pub use repository::inventory::{InventoryLedger, LedgerDrift};
pub use repository::repair::RepairRepository;
pub use repository::report::ReportRepository;
pub use repository::sale::{CheckoutReceipt, SaleRepository};
pub use repository::settings::SettingsRepository;
pub use repository::supplier::SupplierRepository;
pub use repository::wallet::{WalletBalance, WalletLedger};
