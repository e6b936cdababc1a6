//! # Settings Repository
//!
//! Key/value shop settings. Values are strings at the storage layer and
//! reads never fail: a missing key or a storage error yields the caller's
//! default.
//!
//! ## Canonical Keys
//! ```text
//! shop_name, shop_address, shop_phone, currency   display only
//! tax_rate             default tax percentage at checkout ("14", "8.25")
//! low_stock_threshold  min_stock fallback for products without one
//! backup_frequency     days between backup reminders
//! last_backup          ISO date of the last backup
//! auto_generate_sku    "1" / "0"
//! default_warranty     months, for new products
//! ```

use std::str::FromStr;

use chrono::NaiveDate;
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use cellpos_core::{Percent, Setting};

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::now;

pub const TAX_RATE: &str = "tax_rate";
pub const LOW_STOCK_THRESHOLD: &str = "low_stock_threshold";
pub const BACKUP_FREQUENCY: &str = "backup_frequency";
pub const LAST_BACKUP: &str = "last_backup";
pub const AUTO_GENERATE_SKU: &str = "auto_generate_sku";
pub const DEFAULT_WARRANTY: &str = "default_warranty";

const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;
const DEFAULT_BACKUP_FREQUENCY_DAYS: i64 = 7;

/// Repository for shop settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    db: Database,
}

impl SettingsRepository {
    pub fn new(db: Database) -> Self {
        SettingsRepository { db }
    }

    /// Returns the value for `key`, or `default` when absent or unreadable.
    pub async fn get(&self, key: &str, default: &str) -> String {
        let result: Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = ?1")
                .bind(key)
                .fetch_optional(self.db.pool())
                .await;

        match result {
            Ok(Some(value)) => value,
            Ok(None) => default.to_string(),
            Err(e) => {
                warn!(key = %key, error = %e, "Setting read failed, using default");
                default.to_string()
            }
        }
    }

    /// Parses the value for `key`, falling back to `default` when absent,
    /// unreadable, or unparsable.
    pub async fn get_parsed<T: FromStr>(&self, key: &str, default: T) -> T {
        let raw = self.get(key, "").await;
        parse_or(key, &raw, default)
    }

    /// Inserts or replaces a setting.
    pub async fn set(&self, key: &str, value: &str, description: Option<&str>) -> DbResult<()> {
        debug!(key = %key, "Writing setting");
        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, description, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                description = COALESCE(excluded.description, settings.description),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(description)
        .bind(now())
        .execute(tx.conn())
        .await?;
        tx.commit().await
    }

    /// Every setting, ordered by key.
    pub async fn all(&self) -> DbResult<Vec<Setting>> {
        let settings = sqlx::query_as::<_, Setting>(
            "SELECT key, value, description, category, updated_at FROM settings ORDER BY key",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(settings)
    }

    /// Writes each `(key, value)` only if the key is absent.
    pub(crate) async fn init_defaults(&self, defaults: &[(&str, &str)]) -> DbResult<()> {
        let mut tx = self.db.begin().await?;
        for (key, value) in defaults {
            sqlx::query(
                "INSERT OR IGNORE INTO settings (key, value, category, updated_at) VALUES (?1, ?2, 'shop', ?3)",
            )
            .bind(*key)
            .bind(*value)
            .bind(now())
            .execute(tx.conn())
            .await?;
        }
        tx.commit().await
    }

    // =========================================================================
    // Typed Accessors
    // =========================================================================

    /// Default checkout tax rate. The stored value is a percentage, so `"14"`
    /// is 14 % and `"0.14"` is 0.14 %.
    pub async fn tax_rate(&self) -> Percent {
        self.get_parsed(TAX_RATE, Percent::zero()).await
    }

    pub async fn low_stock_threshold(&self) -> i64 {
        self.get_parsed(LOW_STOCK_THRESHOLD, DEFAULT_LOW_STOCK_THRESHOLD)
            .await
    }

    /// True when `last_backup` is absent or at least `backup_frequency` days old.
    pub async fn backup_due(&self, today: NaiveDate) -> bool {
        let frequency = self
            .get_parsed(BACKUP_FREQUENCY, DEFAULT_BACKUP_FREQUENCY_DAYS)
            .await;
        let last = self.get(LAST_BACKUP, "").await;
        match NaiveDate::parse_from_str(last.trim(), "%Y-%m-%d") {
            Ok(last) => (today - last).num_days() >= frequency,
            Err(_) => true,
        }
    }

    pub async fn mark_backup(&self, today: NaiveDate) -> DbResult<()> {
        self.set(
            LAST_BACKUP,
            &today.format("%Y-%m-%d").to_string(),
            Some("Date of the last database backup"),
        )
        .await
    }
}

/// Reads a setting through the caller's transaction. Never fails.
pub(crate) async fn get_in(conn: &mut SqliteConnection, key: &str) -> Option<String> {
    match sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?1")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
    {
        Ok(value) => value,
        Err(e) => {
            warn!(key = %key, error = %e, "Setting read failed, using default");
            None
        }
    }
}

/// Parsed setting through the caller's transaction.
pub(crate) async fn get_parsed_in<T: FromStr>(
    conn: &mut SqliteConnection,
    key: &str,
    default: T,
) -> T {
    match get_in(conn, key).await {
        Some(raw) => parse_or(key, &raw, default),
        None => default,
    }
}

fn parse_or<T: FromStr>(key: &str, raw: &str, default: T) -> T {
    let raw = raw.trim();
    if raw.is_empty() {
        return default;
    }
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key = %key, "Unparsable setting, using default");
            default
        }
    }
}
