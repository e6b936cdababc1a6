//! # Store: Pool, Write Gate, Primitives
//!
//! Owns the database lifetime and exposes the three store primitives.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Store                                              │
//! │                                                                         │
//! │  DbConfig::new(path) ─► Database::new(config).await                    │
//! │                            │  WAL, foreign keys, busy timeout 30 s      │
//! │                            │  migrations (schema, triggers, settings)   │
//! │                            │  shop defaults, optional sample catalog    │
//! │                            ▼                                            │
//! │  ┌────────────────────────────────────────┐                            │
//! │  │ SqlitePool  ┌─────┐ ┌─────┐ ┌─────┐    │ readers: any connection    │
//! │  │             │Conn1│ │Conn2│ │Conn3│    │                            │
//! │  │             └─────┘ └─────┘ └─────┘    │                            │
//! │  └────────────────────────────────────────┘                            │
//! │  ┌────────────────────────────────────────┐                            │
//! │  │ write gate (tokio Mutex)               │ writers: one at a time     │
//! │  │   execute()      ─ single statement    │                            │
//! │  │   begin()        ─ StoreTx guard       │                            │
//! │  │   transaction(f) ─ commit / rollback   │                            │
//! │  └────────────────────────────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Component code inside a transaction must read through the transaction's
//! connection, never through the pool: an in-memory store has exactly one
//! connection.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult, SqlClass};
use crate::migrations;
use crate::repository::catalog::ProductRepository;
use crate::repository::customer::CustomerRepository;
use crate::repository::import::ImportService;
use crate::repository::inventory::InventoryLedger;
use crate::repository::repair::RepairRepository;
use crate::repository::report::ReportRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::settings::SettingsRepository;
use crate::repository::supplier::SupplierRepository;
use crate::repository::wallet::WalletLedger;
use crate::sample_data;
use crate::value::{bind_all, Record, SqlValue};

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/cellpos.db")
///     .max_connections(4)
///     .seed_sample_data(false);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file. `None` means a private in-memory database.
    pub database_path: Option<PathBuf>,

    /// Maximum number of connections in the pool.
    /// Default: 4
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a pooled connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// How long SQLite waits on a locked database before failing.
    /// Default: 30 seconds
    pub busy_timeout: Duration,

    /// Idle timeout before closing a connection. `None` keeps connections open.
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Insert the sample phone-shop catalog when the product table is empty.
    /// Default: true for files, false for in-memory
    pub seed_sample_data: bool,

    /// `shop_name` setting written on first open.
    pub shop_name: String,

    /// `currency` setting written on first open.
    pub currency: String,
}

/// Shop name used when neither config nor settings provide one.
pub const DEFAULT_SHOP_NAME: &str = "Mobile Shop";

/// Currency label used when neither config nor settings provide one.
pub const DEFAULT_CURRENCY: &str = "EGP";

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Created if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: Some(path.into()),
            max_connections: 4,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            run_migrations: true,
            seed_sample_data: true,
            shop_name: DEFAULT_SHOP_NAME.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// Single connection that never idles out, so the database lives as
    /// long as the pool. No sample data.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: None,
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(30),
            idle_timeout: None,
            run_migrations: true,
            seed_sample_data: false,
            shop_name: DEFAULT_SHOP_NAME.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the SQLite busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets whether to seed the sample catalog into an empty database.
    pub fn seed_sample_data(mut self, seed: bool) -> Self {
        self.seed_sample_data = seed;
        self
    }

    /// Sets the shop name and currency written on first open.
    pub fn shop(mut self, name: impl Into<String>, currency: impl Into<String>) -> Self {
        self.shop_name = name.into();
        self.currency = currency.into();
        self
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let base = match &self.database_path {
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
            None => SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?,
        };

        Ok(base
            // WAL: readers don't block the writer and vice versa
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }

    fn describe(&self) -> String {
        match &self.database_path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing the store primitives and component access.
///
/// Cheap to clone: the pool and the write gate are shared.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./cellpos.db")).await?;
///
/// let product = db.products().create(new_product, Some("admin")).await?;
/// let receipt = db.sales().checkout(request).await?;
/// let stats = db.reports().dashboard(today).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    write_gate: Arc<Mutex<()>>,
}

impl Database {
    /// Opens the database.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures WAL, NORMAL synchronous, foreign keys, busy timeout
    /// 3. Creates the connection pool
    /// 4. Runs migrations (schema, indexes, triggers, default settings)
    /// 5. Writes `shop_name` / `currency` if absent
    /// 6. Seeds the sample catalog if enabled and the catalog is empty
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use handle
    /// * `Err(DbError)` - Connection, migration, or seed failed (fatal at startup)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.describe(), "Initializing database connection");

        let connect_options = config.connect_options()?;
        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(if config.database_path.is_none() {
                None
            } else {
                Some(Duration::from_secs(30 * 60))
            })
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(max_connections = config.max_connections, "Database pool created");

        let db = Database {
            pool,
            write_gate: Arc::new(Mutex::new(())),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        db.settings()
            .init_defaults(&[
                ("shop_name", config.shop_name.as_str()),
                ("currency", config.currency.as_str()),
            ])
            .await?;

        if config.seed_sample_data {
            sample_data::seed_if_empty(&db).await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        let _gate = self.write_gate.lock().await;
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// For reads not covered by components. Writes go through
    /// `execute`, `begin`, or `transaction` so they take the write gate.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Store Primitives
    // =========================================================================

    /// Runs a read statement and returns every row as a `Record`.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let rows = db.query(
    ///     "SELECT sku, current_qty FROM products WHERE category = ?1",
    ///     &["acc".into()],
    /// ).await?;
    /// ```
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Record>> {
        let class = SqlClass::of(sql);
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DbError::from_sqlx(class, e))?;
        debug!(%class, rows = rows.len(), "query");
        rows.iter().map(Record::from_row).collect()
    }

    /// Runs a single write statement under the write gate and commits it.
    ///
    /// ## Returns
    /// Number of affected rows.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        let class = SqlClass::of(sql);
        let _gate = self.write_gate.lock().await;
        let result = bind_all(sqlx::query(sql), params)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::from_sqlx(class, e))?;
        debug!(%class, affected = result.rows_affected(), "execute");
        Ok(result.rows_affected())
    }

    /// Opens a write transaction.
    ///
    /// Holds the write gate until the returned guard is committed, rolled
    /// back, or dropped. Dropping without `commit` rolls back.
    pub async fn begin(&self) -> DbResult<StoreTx> {
        let gate = self.write_gate.clone().lock_owned().await;
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(StoreTx { tx, _gate: gate })
    }

    /// Runs `f` inside one transaction: commit on `Ok`, rollback on `Err`.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let moved = db.transaction(|conn| Box::pin(async move {
    ///     sqlx::query("UPDATE products SET location = 'B2' WHERE category = 'acc'")
    ///         .execute(&mut *conn)
    ///         .await?;
    ///     Ok(())
    /// })).await?;
    /// ```
    pub async fn transaction<T, F>(&self, f: F) -> DbResult<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, DbResult<T>> + Send,
    {
        let mut tx = self.begin().await?;
        let result = f(tx.conn()).await;
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    // =========================================================================
    // Components
    // =========================================================================

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.clone())
    }

    pub fn suppliers(&self) -> SupplierRepository {
        SupplierRepository::new(self.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.clone())
    }

    pub fn inventory(&self) -> InventoryLedger {
        InventoryLedger::new(self.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.clone())
    }

    pub fn repairs(&self) -> RepairRepository {
        RepairRepository::new(self.clone())
    }

    pub fn wallet(&self) -> WalletLedger {
        WalletLedger::new(self.clone())
    }

    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.clone())
    }

    pub fn import(&self) -> ImportService {
        ImportService::new(self.clone())
    }

    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.clone())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Closes the pool. Later operations fail with `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Write Transaction Guard
// =============================================================================

/// An open write transaction holding the write gate.
///
/// Field order matters: the transaction is dropped (rolled back) before the
/// gate is released.
pub struct StoreTx {
    tx: Transaction<'static, Sqlite>,
    _gate: OwnedMutexGuard<()>,
}

impl StoreTx {
    /// The transaction's connection, for component helpers.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    pub async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }

    pub async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }
}

impl std::fmt::Debug for StoreTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreTx").finish_non_exhaustive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
