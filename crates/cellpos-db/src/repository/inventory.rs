//! # Inventory Ledger
//!
//! The only writer of `products.current_qty`.
//!
//! ## Posting a Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    apply(StockChange)                                   │
//! │                                                                         │
//! │  StockChange { product, type: sale, qty: 2, cost: 10 }                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  delta = sign(type) · qty = −2                                         │
//! │       │                                                                 │
//! │       ├── current_qty + delta < 0 and no override? ──► Underflow       │
//! │       │                                                                 │
//! │       ▼  same transaction                                               │
//! │  UPDATE products SET current_qty = current_qty − 2                     │
//! │  INSERT inventory_movements (quantity = −2, total_cost = 20)           │
//! │                                                                         │
//! │  Invariant: current_qty == Σ movements.quantity                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use cellpos_core::numbering::new_id;
use cellpos_core::validation::{validate_non_negative, validate_stock_level};
use cellpos_core::{CoreError, DateRange, InventoryMovement, StockChange, ValidationError};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::now;

const MOVEMENT_COLUMNS: &str = "id, product_id, movement_type, quantity, cost_per_unit, total_cost, \
     reference_id, reference_type, notes, created_by, created_at";

/// A product whose stored quantity disagrees with its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LedgerDrift {
    pub product_id: String,
    pub sku: String,
    pub current_qty: i64,
    pub ledger_qty: i64,
}

/// Inventory ledger component.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    db: Database,
}

impl InventoryLedger {
    pub fn new(db: Database) -> Self {
        InventoryLedger { db }
    }

    /// Applies one stock change in its own transaction.
    ///
    /// ## Errors
    /// * `Validation` - qty not positive, negative cost
    /// * `NotFound` - unknown product
    /// * `Underflow` - result below zero without `allow_negative`
    pub async fn apply(&self, change: &StockChange) -> DbResult<InventoryMovement> {
        let mut tx = self.db.begin().await?;
        let movement = apply_in(tx.conn(), change).await?;
        tx.commit().await?;
        Ok(movement)
    }

    /// Movements of one product in chronological order, optionally limited
    /// to a calendar-day range.
    pub async fn history(
        &self,
        product_id: &str,
        range: Option<DateRange>,
    ) -> DbResult<Vec<InventoryMovement>> {
        let movements = match range {
            Some(range) => {
                sqlx::query_as::<_, InventoryMovement>(&format!(
                    "SELECT {MOVEMENT_COLUMNS} FROM inventory_movements \
                     WHERE product_id = ?1 AND date(created_at) BETWEEN ?2 AND ?3 \
                     ORDER BY created_at, rowid"
                ))
                .bind(product_id)
                .bind(range.from)
                .bind(range.to)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, InventoryMovement>(&format!(
                    "SELECT {MOVEMENT_COLUMNS} FROM inventory_movements \
                     WHERE product_id = ?1 ORDER BY created_at, rowid"
                ))
                .bind(product_id)
                .fetch_all(self.db.pool())
                .await?
            }
        };
        Ok(movements)
    }

    /// Movements referencing a document (a sale id, an import batch).
    pub async fn by_reference(&self, reference_id: &str) -> DbResult<Vec<InventoryMovement>> {
        let movements = sqlx::query_as::<_, InventoryMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM inventory_movements \
             WHERE reference_id = ?1 ORDER BY created_at, rowid"
        ))
        .bind(reference_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(movements)
    }

    /// Σ movements.quantity for one product.
    pub async fn ledger_sum(&self, product_id: &str) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM inventory_movements WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(sum)
    }

    /// Sets `current_qty` to the ledger sum. Idempotent.
    ///
    /// ## Returns
    /// The reconciled quantity.
    pub async fn reconcile(&self, product_id: &str) -> DbResult<i64> {
        let mut tx = self.db.begin().await?;
        let qty = reconcile_in(tx.conn(), product_id).await?;
        tx.commit().await?;
        Ok(qty)
    }

    /// Every product whose `current_qty` differs from its ledger sum.
    pub async fn verify_all(&self) -> DbResult<Vec<LedgerDrift>> {
        let drift = sqlx::query_as::<_, LedgerDrift>(
            r#"
            SELECT p.id AS product_id, p.sku, p.current_qty,
                   COALESCE((SELECT SUM(m.quantity) FROM inventory_movements m
                             WHERE m.product_id = p.id), 0) AS ledger_qty
            FROM products p
            WHERE p.current_qty <> COALESCE((SELECT SUM(m.quantity) FROM inventory_movements m
                                             WHERE m.product_id = p.id), 0)
            ORDER BY p.sku
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(drift)
    }

    /// Reconciles every drifting product in one transaction.
    ///
    /// ## Returns
    /// Number of products corrected.
    pub async fn reconcile_all(&self) -> DbResult<usize> {
        let drift = self.verify_all().await?;
        if drift.is_empty() {
            return Ok(0);
        }

        let mut tx = self.db.begin().await?;
        for d in &drift {
            warn!(
                sku = %d.sku,
                current_qty = d.current_qty,
                ledger_qty = d.ledger_qty,
                "Correcting stock drift"
            );
            reconcile_in(tx.conn(), &d.product_id).await?;
        }
        tx.commit().await?;

        info!(products = drift.len(), "Stock reconciled against ledger");
        Ok(drift.len())
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Applies a stock change on the caller's transaction.
pub(crate) async fn apply_in(
    conn: &mut SqliteConnection,
    change: &StockChange,
) -> DbResult<InventoryMovement> {
    if change.qty <= 0 {
        return Err(ValidationError::must_be_positive("qty").into());
    }
    validate_stock_level("qty", change.qty)?;
    validate_non_negative("cost_per_unit", change.cost_per_unit)?;
    let total_cost = change
        .cost_per_unit
        .checked_multiply_quantity(change.qty)
        .ok_or_else(|| ValidationError::invalid_format("total_cost", "amount too large"))?;

    let on_hand: i64 = sqlx::query_scalar("SELECT current_qty FROM products WHERE id = ?1")
        .bind(&change.product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", &change.product_id))?;

    let delta = change.movement_type.signed(change.qty);
    let after = on_hand
        .checked_add(delta)
        .ok_or_else(|| ValidationError::invalid_format("current_qty", "stock level too large"))?;
    if after < 0 && !change.allow_negative {
        return Err(CoreError::Underflow {
            product_id: change.product_id.clone(),
            on_hand,
            delta,
        }
        .into());
    }

    let at = now();
    sqlx::query("UPDATE products SET current_qty = current_qty + ?1, updated_at = ?2 WHERE id = ?3")
        .bind(delta)
        .bind(at)
        .bind(&change.product_id)
        .execute(&mut *conn)
        .await?;

    let movement = InventoryMovement {
        id: new_id(),
        product_id: change.product_id.clone(),
        movement_type: change.movement_type,
        quantity: delta,
        cost_per_unit: change.cost_per_unit,
        total_cost,
        reference_id: change.reference_id.clone(),
        reference_type: change.reference_type.clone(),
        notes: change.notes.clone(),
        created_by: change.actor.clone(),
        created_at: at,
    };

    sqlx::query(
        r#"
        INSERT INTO inventory_movements (
            id, product_id, movement_type, quantity, cost_per_unit, total_cost,
            reference_id, reference_type, notes, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(movement.movement_type)
    .bind(movement.quantity)
    .bind(movement.cost_per_unit)
    .bind(movement.total_cost)
    .bind(&movement.reference_id)
    .bind(&movement.reference_type)
    .bind(&movement.notes)
    .bind(&movement.created_by)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %movement.product_id,
        movement_type = %movement.movement_type,
        delta,
        "Stock movement applied"
    );
    Ok(movement)
}

async fn reconcile_in(conn: &mut SqliteConnection, product_id: &str) -> DbResult<i64> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Err(DbError::not_found("Product", product_id));
    }

    let sum: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0) FROM inventory_movements WHERE product_id = ?1",
    )
    .bind(product_id)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE products SET current_qty = ?1 WHERE id = ?2 AND current_qty <> ?1")
        .bind(sum)
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use cellpos_core::{ErrorKind, Money, MovementType, NewProduct, MAX_STOCK_LEVEL};

    async fn setup(initial_qty: i64) -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .create(
                NewProduct {
                    sku: "CHG-20W".into(),
                    name: "USB-C charger 20W".into(),
                    category: "chargers".into(),
                    buy_price: Money::from_major(150),
                    sale_price: Money::from_major(250),
                    initial_qty,
                    ..Default::default()
                },
                Some("admin"),
            )
            .await
            .unwrap();
        (db, product.id)
    }

    #[tokio::test]
    async fn test_apply_signs_and_costs() {
        let (db, id) = setup(5).await;
        let ledger = db.inventory();

        let out = ledger
            .apply(&StockChange::new(&id, MovementType::Damage, 2, Money::from_major(150)))
            .await
            .unwrap();
        assert_eq!(out.quantity, -2);
        assert_eq!(out.total_cost, Money::from_major(300));

        ledger
            .apply(&StockChange::new(&id, MovementType::StockIn, 10, Money::from_major(140)).actor("ali"))
            .await
            .unwrap();

        let product = db.products().get(&id).await.unwrap().unwrap();
        assert_eq!(product.current_qty, 13);
        assert_eq!(ledger.ledger_sum(&id).await.unwrap(), 13);

        let history = ledger.history(&id, None).await.unwrap();
        let quantities: Vec<i64> = history.iter().map(|m| m.quantity).collect();
        assert_eq!(quantities, vec![5, -2, 10]);
        assert_eq!(history[2].created_by.as_deref(), Some("ali"));
    }

    #[tokio::test]
    async fn test_underflow_rejected_unless_overridden() {
        let (db, id) = setup(1).await;
        let ledger = db.inventory();

        let err = ledger
            .apply(&StockChange::new(&id, MovementType::StockOut, 2, Money::zero()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Underflow);
        assert_eq!(ledger.ledger_sum(&id).await.unwrap(), 1);

        ledger
            .apply(&StockChange::new(&id, MovementType::StockOut, 2, Money::zero()).allow_negative(true))
            .await
            .unwrap();
        let product = db.products().get(&id).await.unwrap().unwrap();
        assert_eq!(product.current_qty, -1);
    }

    #[tokio::test]
    async fn test_apply_rejects_bad_input() {
        let (db, id) = setup(1).await;
        let ledger = db.inventory();

        let err = ledger
            .apply(&StockChange::new(&id, MovementType::StockIn, 0, Money::zero()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = ledger
            .apply(&StockChange::new("missing", MovementType::StockIn, 1, Money::zero()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_oversized_movement_is_a_validation_error() {
        let (db, id) = setup(1).await;
        let ledger = db.inventory();

        let err = ledger
            .apply(&StockChange::new(&id, MovementType::StockIn, MAX_STOCK_LEVEL + 1, Money::zero()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        db.execute(
            "UPDATE products SET current_qty = ?1 WHERE id = ?2",
            &[i64::MAX.into(), id.as_str().into()],
        )
        .await
        .unwrap();
        let err = ledger
            .apply(&StockChange::new(&id, MovementType::StockIn, 1, Money::from_major(150)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(ledger.history(&id, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_repairs_drift() {
        let (db, id) = setup(4).await;
        let ledger = db.inventory();
        assert!(ledger.verify_all().await.unwrap().is_empty());

        db.execute("UPDATE products SET current_qty = 99 WHERE id = ?1", &[id.as_str().into()])
            .await
            .unwrap();

        let drift = ledger.verify_all().await.unwrap();
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].current_qty, 99);
        assert_eq!(drift[0].ledger_qty, 4);

        assert_eq!(ledger.reconcile(&id).await.unwrap(), 4);
        assert_eq!(ledger.reconcile(&id).await.unwrap(), 4);
        assert!(ledger.verify_all().await.unwrap().is_empty());
        assert_eq!(ledger.reconcile_all().await.unwrap(), 0);
    }
}
