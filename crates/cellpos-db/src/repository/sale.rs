//! # Sale Repository
//!
//! Checkout posts a sale atomically across four tables; refunds reverse it.
//!
//! ## Checkout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    checkout(CheckoutRequest)                            │
//! │                                                                         │
//! │  BEGIN (write gate held)                                                │
//! │   1. load each product ──► missing: NotFound, inactive: Gone            │
//! │      snapshot name, sku, buy price                                      │
//! │   2. Σ qty per product ≤ current_qty ──► else InsufficientStock         │
//! │   3. totals: subtotal, discount, tax, total, change                     │
//! │   4. paid < total ──► Underpaid unless allow_underpayment               │
//! │   5. sale_number = S-YYYYMMDD-NNNN                                     │
//! │   6. INSERT sales, INSERT sale_items,                                   │
//! │      ledger: sale −qty per line (reference = sale id)                   │
//! │  COMMIT  ── any failure above rolls everything back                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use cellpos_core::checkout::{compute_totals, demand_by_product, PricedLine, SaleTotals};
use cellpos_core::numbering::{new_id, DocumentKind};
use cellpos_core::validation::{clean_optional, validate_checkout_lines};
use cellpos_core::{
    CheckoutRequest, CoreError, CustomerRef, DateRange, MovementType, PaymentStatus, Percent,
    Product, Sale, SaleItem, StockChange,
};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::catalog;
use crate::repository::inventory::apply_in;
use crate::repository::numbering::allocate;
use crate::repository::settings::{self, TAX_RATE};
use crate::repository::now;

const SALE_COLUMNS: &str = "id, sale_number, customer_id, customer_name, customer_phone, subtotal, \
     discount, discount_percentage, tax, total, paid_amount, change_amount, payment_method, \
     payment_status, cashier, notes, is_refunded, created_at";

const ITEM_COLUMNS: &str = "id, sale_id, product_id, product_name, sku, qty, unit_price, discount, \
     total, cost_price, profit, created_at";

/// Result of a posted sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutReceipt {
    pub sale_id: String,
    pub sale_number: String,
    pub totals: SaleTotals,
    pub created_at: NaiveDateTime,
}

/// Repository for sales.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    db: Database,
}

impl SaleRepository {
    pub fn new(db: Database) -> Self {
        SaleRepository { db }
    }

    /// Posts a sale.
    ///
    /// ## Errors
    /// * `EmptySale`, `Validation` - malformed request
    /// * `NotFound` - unknown product or registered customer
    /// * `ProductInactive` - a line references a retired product
    /// * `InsufficientStock` - summed line quantity exceeds on-hand
    /// * `DiscountExceedsSubtotal`, `ZeroTotal`, `Underpaid` - totals rejected
    ///
    /// Nothing is written when any of these is returned.
    pub async fn checkout(&self, req: CheckoutRequest) -> DbResult<CheckoutReceipt> {
        if req.lines.is_empty() {
            return Err(CoreError::EmptySale.into());
        }
        validate_checkout_lines(&req.lines)?;

        let mut tx = self.db.begin().await?;
        let receipt = checkout_in(tx.conn(), &req).await?;
        tx.commit().await?;

        info!(
            sale_number = %receipt.sale_number,
            lines = req.lines.len(),
            status = %receipt.totals.payment_status,
            "Sale posted"
        );
        Ok(receipt)
    }

    /// Marks a sale refunded and returns every line to stock.
    ///
    /// ## Errors
    /// * `NotFound` - unknown sale
    /// * `Conflict` - sale already refunded
    pub async fn refund(&self, sale_id: &str, actor: Option<&str>) -> DbResult<Sale> {
        let mut tx = self.db.begin().await?;
        let conn = tx.conn();

        let sale = get_in(conn, sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", sale_id))?;
        if sale.is_refunded {
            return Err(DbError::Conflict(format!(
                "sale {} is already refunded",
                sale.sale_number
            )));
        }

        let items = items_in(conn, sale_id).await?;
        for item in &items {
            let mut change = StockChange::new(&item.product_id, MovementType::Return, item.qty, item.cost_price)
                .reference(sale_id, "refund")
                .notes(format!("Refund of {}", sale.sale_number));
            change.actor = actor.map(str::to_string);
            apply_in(conn, &change).await?;
        }

        sqlx::query("UPDATE sales SET is_refunded = 1, payment_status = ?1 WHERE id = ?2")
            .bind(PaymentStatus::Refunded)
            .bind(sale_id)
            .execute(&mut *conn)
            .await?;

        let refunded = get_in(conn, sale_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", sale_id))?;
        tx.commit().await?;

        info!(sale_number = %refunded.sale_number, lines = items.len(), "Sale refunded");
        Ok(refunded)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub async fn get(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(sale)
    }

    pub async fn get_by_number(&self, sale_number: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE sale_number = ?1"
        ))
        .bind(sale_number.trim())
        .fetch_optional(self.db.pool())
        .await?;
        Ok(sale)
    }

    /// Lines of a sale in the order they were rung up.
    pub async fn items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY rowid"
        ))
        .bind(sale_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(items)
    }

    /// Sales in a calendar-day range, oldest first.
    pub async fn list(&self, range: DateRange) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE date(created_at) BETWEEN ?1 AND ?2 \
             ORDER BY created_at, sale_number"
        ))
        .bind(range.from)
        .bind(range.to)
        .fetch_all(self.db.pool())
        .await?;
        Ok(sales)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn checkout_in(conn: &mut SqliteConnection, req: &CheckoutRequest) -> DbResult<CheckoutReceipt> {
    // 1. Resolve prices against the stored products.
    let mut products: HashMap<String, Product> = HashMap::new();
    let mut priced = Vec::with_capacity(req.lines.len());
    for line in &req.lines {
        if !products.contains_key(&line.product_id) {
            let product = catalog::get_in(conn, &line.product_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", &line.product_id))?;
            products.insert(line.product_id.clone(), product);
        }
        if let Some(product) = products.get(&line.product_id) {
            priced.push(PricedLine::price(product, line)?);
        }
    }

    // 2. Stock check over the summed demand per product.
    for (product_id, requested) in demand_by_product(&req.lines) {
        if let Some(product) = products.get(&product_id) {
            if product.current_qty < requested {
                return Err(CoreError::InsufficientStock {
                    sku: product.sku.clone(),
                    available: product.current_qty,
                    requested,
                }
                .into());
            }
        }
    }

    // 3-4. Totals and payment.
    let default_tax_rate = match req.tax {
        Some(_) => Percent::zero(),
        None => settings::get_parsed_in(conn, TAX_RATE, Percent::zero()).await,
    };
    let totals = compute_totals(
        &priced,
        req.discount,
        req.tax,
        default_tax_rate,
        req.paid_amount,
        req.allow_underpayment,
    )?;

    let (customer_id, customer_name, customer_phone) = match &req.customer {
        CustomerRef::Anonymous => (None, None, None),
        CustomerRef::Registered { id } => {
            let customer = sqlx::query_as::<_, (String, Option<String>)>(
                "SELECT name, phone FROM customers WHERE id = ?1 AND active = 1",
            )
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;
            (Some(id.clone()), Some(customer.0), customer.1)
        }
        CustomerRef::WalkIn { name, phone } => (
            None,
            clean_optional(Some(name.clone())),
            clean_optional(phone.clone()),
        ),
    };

    // 5. Number.
    let at = now();
    let sale_id = new_id();
    let sale_number = allocate(conn, DocumentKind::Sale, at.date()).await?;

    // 6. Header, lines, ledger.
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, sale_number, customer_id, customer_name, customer_phone,
            subtotal, discount, discount_percentage, tax, total, paid_amount, change_amount,
            payment_method, payment_status, cashier, notes, is_refunded, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, 0, ?17)
        "#,
    )
    .bind(&sale_id)
    .bind(&sale_number)
    .bind(&customer_id)
    .bind(&customer_name)
    .bind(&customer_phone)
    .bind(totals.subtotal)
    .bind(totals.discount)
    .bind(totals.discount_percentage)
    .bind(totals.tax)
    .bind(totals.total)
    .bind(totals.paid_amount)
    .bind(totals.change_amount)
    .bind(req.payment_method)
    .bind(totals.payment_status)
    .bind(clean_optional(req.cashier.clone()))
    .bind(clean_optional(req.notes.clone()))
    .bind(at)
    .execute(&mut *conn)
    .await?;

    for line in &priced {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, product_name, sku, qty, unit_price, discount,
                total, cost_price, profit, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(new_id())
        .bind(&sale_id)
        .bind(&line.product_id)
        .bind(&line.product_name)
        .bind(&line.sku)
        .bind(line.qty)
        .bind(line.unit_price)
        .bind(line.discount)
        .bind(line.total)
        .bind(line.cost_price)
        .bind(line.profit)
        .bind(at)
        .execute(&mut *conn)
        .await?;

        let mut change = StockChange::new(&line.product_id, MovementType::Sale, line.qty, line.cost_price)
            .reference(&sale_id, "sale");
        change.actor = clean_optional(req.cashier.clone());
        apply_in(conn, &change).await?;

        debug!(sku = %line.sku, qty = line.qty, "Sale line posted");
    }

    Ok(CheckoutReceipt {
        sale_id,
        sale_number,
        totals,
        created_at: at,
    })
}

async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sale = sqlx::query_as::<_, Sale>(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(sale)
}

async fn items_in(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY rowid"
    ))
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use cellpos_core::{CheckoutLine, DiscountSpec, ErrorKind, Money, NewCustomer, NewProduct};

    async fn setup(sale_price: i64, qty: i64) -> (Database, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .create(
                NewProduct {
                    sku: "SP-A15".into(),
                    name: "Screen protector A15".into(),
                    category: "acc".into(),
                    buy_price: Money::from_major(sale_price / 2),
                    sale_price: Money::from_major(sale_price),
                    initial_qty: qty,
                    min_stock: 1,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        (db, product)
    }

    fn line(product: &Product, qty: i64) -> CheckoutLine {
        CheckoutLine {
            product_id: product.id.clone(),
            qty,
            unit_price: product.sale_price,
            discount: Money::zero(),
        }
    }

    fn request(lines: Vec<CheckoutLine>, paid: Money) -> CheckoutRequest {
        CheckoutRequest {
            lines,
            tax: Some(Money::zero()),
            paid_amount: paid,
            cashier: Some("Omar".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_checkout_posts_sale_items_and_movements() {
        let (db, p) = setup(20, 5).await;
        let receipt = db
            .sales()
            .checkout(request(vec![line(&p, 2)], Money::from_major(50)))
            .await
            .unwrap();

        assert!(receipt.sale_number.ends_with("-0001"));
        assert_eq!(receipt.totals.total, Money::from_major(40));
        assert_eq!(receipt.totals.change_amount, Money::from_major(10));
        assert_eq!(receipt.totals.payment_status, PaymentStatus::Paid);

        let items = db.sales().items(&receipt.sale_id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].profit, Money::from_major(20));
        assert_eq!(items[0].cost_price, Money::from_major(10));

        let movements = db.inventory().by_reference(&receipt.sale_id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].quantity, -2);
        assert_eq!(movements[0].movement_type, MovementType::Sale);
        assert_eq!(movements[0].created_by.as_deref(), Some("Omar"));

        let product = db.products().get(&p.id).await.unwrap().unwrap();
        assert_eq!(product.current_qty, 3);

        let second = db
            .sales()
            .checkout(request(vec![line(&p, 1)], Money::from_major(20)))
            .await
            .unwrap();
        assert!(second.sale_number.ends_with("-0002"));
    }

    #[tokio::test]
    async fn test_repeated_lines_are_checked_together() {
        let (db, p) = setup(20, 3).await;
        let err = db
            .sales()
            .checkout(request(vec![line(&p, 2), line(&p, 2)], Money::from_major(80)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(db.products().get(&p.id).await.unwrap().unwrap().current_qty, 3);
    }

    #[tokio::test]
    async fn test_inactive_and_missing_products() {
        let (db, p) = setup(20, 3).await;
        db.products().deactivate(&p.id).await.unwrap();
        let err = db
            .sales()
            .checkout(request(vec![line(&p, 1)], Money::from_major(20)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Gone);

        let mut ghost = line(&p, 1);
        ghost.product_id = "missing".into();
        let err = db
            .sales()
            .checkout(request(vec![ghost], Money::from_major(20)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = db
            .sales()
            .checkout(request(vec![], Money::zero()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_underpayment_requires_override() {
        let (db, p) = setup(100, 5).await;

        let err = db
            .sales()
            .checkout(request(vec![line(&p, 1)], Money::from_major(60)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Underpaid);

        let mut req = request(vec![line(&p, 1)], Money::from_major(60));
        req.allow_underpayment = true;
        let receipt = db.sales().checkout(req).await.unwrap();
        assert_eq!(receipt.totals.payment_status, PaymentStatus::Partial);
        assert_eq!(receipt.totals.change_amount, Money::from_major(-40));
    }

    #[tokio::test]
    async fn test_tax_rate_setting_applies_when_tax_omitted() {
        let (db, p) = setup(100, 5).await;
        db.settings().set(TAX_RATE, "14", None).await.unwrap();

        let mut req = request(vec![line(&p, 1)], Money::from_major(200));
        req.tax = None;
        req.discount = DiscountSpec::Amount(Money::from_major(10));
        let receipt = db.sales().checkout(req).await.unwrap();

        assert_eq!(receipt.totals.tax, Money::from_major_minor(12, 60));
        assert_eq!(receipt.totals.total, Money::from_major_minor(102, 60));
    }

    #[tokio::test]
    async fn test_registered_customer_snapshot() {
        let (db, p) = setup(20, 5).await;
        let customer = db
            .customers()
            .create(NewCustomer {
                name: "Mona Adel".into(),
                phone: Some("01112223334".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut req = request(vec![line(&p, 1)], Money::from_major(20));
        req.customer = CustomerRef::Registered { id: customer.id.clone() };
        let receipt = db.sales().checkout(req).await.unwrap();

        db.customers()
            .update(&customer.id, cellpos_core::CustomerPatch {
                name: Some("Mona A. Adel".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let sale = db.sales().get(&receipt.sale_id).await.unwrap().unwrap();
        assert_eq!(sale.customer_id.as_deref(), Some(customer.id.as_str()));
        assert_eq!(sale.customer_name.as_deref(), Some("Mona Adel"));
        assert_eq!(sale.customer_phone.as_deref(), Some("01112223334"));

        let mut req = request(vec![line(&p, 1)], Money::from_major(20));
        req.customer = CustomerRef::Registered { id: "missing".into() };
        let err = db.sales().checkout(req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_deactivated_customer_is_not_found() {
        let (db, p) = setup(20, 5).await;
        let customer = db
            .customers()
            .create(NewCustomer {
                name: "Hany Samir".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        db.customers().deactivate(&customer.id).await.unwrap();

        let mut req = request(vec![line(&p, 1)], Money::from_major(20));
        req.customer = CustomerRef::Registered { id: customer.id.clone() };
        let err = db.sales().checkout(req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(sales, 0);
        let product = db.products().get(&p.id).await.unwrap().unwrap();
        assert_eq!(product.current_qty, 5);

        let receipt = db
            .sales()
            .checkout(request(vec![line(&p, 1)], Money::from_major(20)))
            .await
            .unwrap();
        assert!(receipt.sale_number.ends_with("-0001"));
    }

    #[tokio::test]
    async fn test_refund_returns_stock_once() {
        let (db, p) = setup(20, 5).await;
        let receipt = db
            .sales()
            .checkout(request(vec![line(&p, 2)], Money::from_major(40)))
            .await
            .unwrap();

        let sale = db.sales().refund(&receipt.sale_id, Some("manager")).await.unwrap();
        assert!(sale.is_refunded);
        assert_eq!(sale.payment_status, PaymentStatus::Refunded);
        assert_eq!(db.products().get(&p.id).await.unwrap().unwrap().current_qty, 5);

        let movements = db.inventory().by_reference(&receipt.sale_id).await.unwrap();
        let quantities: Vec<i64> = movements.iter().map(|m| m.quantity).collect();
        assert_eq!(quantities, vec![-2, 2]);

        let err = db.sales().refund(&receipt.sale_id, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(db.products().get(&p.id).await.unwrap().unwrap().current_qty, 5);
    }
}
