//! Store-wide properties that must hold after any mix of operations.

use chrono::Local;

use cellpos_core::{
    CheckoutLine, CheckoutRequest, DateRange, ErrorKind, Money, MovementType, NewProduct,
    NewRepair, NewWalletTx, Product, RepairStatus, StockChange, WalletProvider, WalletTransfer,
    WalletTxType,
};
use cellpos_db::{Database, DbConfig, DbError, ImportOptions};

async fn open() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

async fn product(db: &Database, sku: &str, price: i64, qty: i64) -> Product {
    db.products()
        .create(
            NewProduct {
                sku: sku.into(),
                name: format!("Item {sku}"),
                category: "acc".into(),
                brand: Some("Generic".into()),
                buy_price: Money::from_major(price / 2),
                sale_price: Money::from_major(price),
                initial_qty: qty,
                min_stock: 2,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap()
}

fn line(p: &Product, qty: i64) -> CheckoutLine {
    CheckoutLine {
        product_id: p.id.clone(),
        qty,
        unit_price: p.sale_price,
        discount: Money::zero(),
    }
}

fn paid_in_full(lines: Vec<CheckoutLine>) -> CheckoutRequest {
    CheckoutRequest {
        lines,
        tax: Some(Money::zero()),
        paid_amount: Money::from_major(100_000),
        ..Default::default()
    }
}

fn today_range() -> DateRange {
    let today = Local::now().date_naive();
    DateRange { from: today, to: today }
}

/// A shop day: opening stock, sales, a restock, damage, and a refund.
async fn busy_day(db: &Database) -> (Product, Product) {
    let phone = product(db, "PH-1", 7_500, 4).await;
    let case = product(db, "CS-1", 90, 20).await;

    db.sales()
        .checkout(paid_in_full(vec![line(&phone, 1), line(&case, 3)]))
        .await
        .unwrap();
    let second = db
        .sales()
        .checkout(paid_in_full(vec![line(&case, 2), line(&case, 1)]))
        .await
        .unwrap();

    db.inventory()
        .apply(&StockChange::new(&case.id, MovementType::StockIn, 10, Money::from_major(40)))
        .await
        .unwrap();
    db.inventory()
        .apply(&StockChange::new(&phone.id, MovementType::Damage, 1, phone.buy_price).notes("cracked"))
        .await
        .unwrap();
    db.sales().refund(&second.sale_id, Some("manager")).await.unwrap();

    (phone, case)
}

#[tokio::test]
async fn current_qty_matches_ledger_sum() {
    let db = open().await;
    let (phone, case) = busy_day(&db).await;

    for p in [&phone, &case] {
        let stored = db.products().get(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.current_qty, db.inventory().ledger_sum(&p.id).await.unwrap());
    }
    assert_eq!(db.products().get(&case.id).await.unwrap().unwrap().current_qty, 27);
    assert_eq!(db.products().get(&phone.id).await.unwrap().unwrap().current_qty, 2);
    assert!(db.inventory().verify_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn reconcile_repairs_drift_and_is_idempotent() {
    let db = open().await;
    let (_, case) = busy_day(&db).await;

    db.execute(
        "UPDATE products SET current_qty = 999 WHERE id = ?1",
        &[case.id.clone().into()],
    )
    .await
    .unwrap();

    let drift = db.inventory().verify_all().await.unwrap();
    assert_eq!(drift.len(), 1);

    assert_eq!(db.inventory().reconcile(&case.id).await.unwrap(), 27);
    assert_eq!(db.inventory().reconcile(&case.id).await.unwrap(), 27);
    assert!(db.inventory().verify_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn sale_totals_and_movement_pairing() {
    let db = open().await;
    busy_day(&db).await;

    let mismatched: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sales s \
         WHERE s.subtotal != (SELECT COALESCE(SUM(total), 0) FROM sale_items WHERE sale_id = s.id) \
            OR s.total != s.subtotal - s.discount + s.tax \
            OR s.change_amount != s.paid_amount - s.total",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(mismatched, 0);

    // Each item has exactly one sale movement; repeated lines of one
    // product are paired by quantity through the per-item count.
    let unpaired: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sale_items i \
         WHERE (SELECT COUNT(*) FROM inventory_movements m \
                WHERE m.movement_type = 'sale' AND m.reference_id = i.sale_id \
                  AND m.product_id = i.product_id AND m.quantity = -i.qty) = 0",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(unpaired, 0);

    let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sale_items")
        .fetch_one(db.pool())
        .await
        .unwrap();
    let sale_movements: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM inventory_movements WHERE movement_type = 'sale'")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(items, sale_movements);
}

#[tokio::test]
async fn failed_checkout_rolls_back_every_line() {
    let db = open().await;
    let plenty = product(&db, "CB-1", 100, 50).await;
    let scarce = product(&db, "CB-2", 100, 1).await;

    let err = db
        .sales()
        .checkout(paid_in_full(vec![line(&plenty, 5), line(&scarce, 2)]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);

    assert_eq!(db.products().get(&plenty.id).await.unwrap().unwrap().current_qty, 50);
    assert_eq!(db.inventory().history(&plenty.id, None).await.unwrap().len(), 1);

    // The failed attempt must not burn a document number.
    let receipt = db.sales().checkout(paid_in_full(vec![line(&scarce, 1)])).await.unwrap();
    assert!(receipt.sale_number.ends_with("-0001"));
    assert_eq!(db.products().get(&scarce.id).await.unwrap().unwrap().current_qty, 0);
}

#[tokio::test]
async fn transaction_error_rolls_back() {
    let db = open().await;
    let p = product(&db, "SP-1", 60, 10).await;
    let id = p.id.clone();

    let result: Result<(), DbError> = db
        .transaction(|conn| {
            Box::pin(async move {
                sqlx::query("UPDATE products SET name = 'renamed' WHERE id = ?1")
                    .bind(&id)
                    .execute(&mut *conn)
                    .await?;
                Err(DbError::Conflict("abort".into()))
            })
        })
        .await;
    assert!(result.is_err());
    assert_eq!(db.products().get(&p.id).await.unwrap().unwrap().name, "Item SP-1");
}

#[tokio::test]
async fn document_numbers_are_gap_free() {
    let db = open().await;
    let p = product(&db, "CS-9", 50, 100).await;

    let mut numbers = Vec::new();
    for _ in 0..4 {
        let receipt = db.sales().checkout(paid_in_full(vec![line(&p, 1)])).await.unwrap();
        numbers.push(receipt.sale_number);
    }
    let sequences: Vec<&str> = numbers.iter().map(|n| &n[n.len() - 4..]).collect();
    assert_eq!(sequences, vec!["0001", "0002", "0003", "0004"]);
}

#[tokio::test]
async fn concurrent_checkouts_never_oversell() {
    let db = open().await;
    let p = product(&db, "PH-9", 5_000, 3).await;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let db = db.clone();
        let request = paid_in_full(vec![line(&p, 1)]);
        handles.push(tokio::spawn(async move { db.sales().checkout(request).await }));
    }

    let mut sold = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => sold += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::InsufficientStock),
        }
    }
    assert_eq!(sold, 3);
    assert_eq!(db.products().get(&p.id).await.unwrap().unwrap().current_qty, 0);
}

#[tokio::test]
async fn repair_history_counts_distinct_states() {
    let db = open().await;
    let repairs = db.repairs();

    let repair = repairs
        .create(NewRepair {
            customer_name: "Hany".into(),
            device_type: "Galaxy A35".into(),
            status: Some(RepairStatus::InProgress),
            ..Default::default()
        })
        .await
        .unwrap();
    let history = repairs.history(repair.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].old_status, None);

    let err = repairs
        .transition(repair.id, RepairStatus::InProgress, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalTransition);
    assert_eq!(repairs.history(repair.id).await.unwrap().len(), 1);

    repairs
        .transition(repair.id, RepairStatus::Cancelled, Some("customer declined"), None)
        .await
        .unwrap();
    let err = repairs
        .transition(repair.id, RepairStatus::InProgress, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalTransition);
    assert_eq!(repairs.history(repair.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn wallet_balance_is_sum_of_amounts() {
    let db = open().await;
    let wallet = db.wallet();

    wallet
        .post(NewWalletTx::new(WalletProvider::Orange, WalletTxType::Deposit, Money::from_major(1_000)))
        .await
        .unwrap();
    wallet
        .post(NewWalletTx {
            fees: Money::from_major(3),
            ..NewWalletTx::new(WalletProvider::Orange, WalletTxType::Withdraw, Money::from_major(150))
        })
        .await
        .unwrap();
    wallet
        .transfer_between(WalletTransfer {
            from: WalletProvider::Orange,
            to: WalletProvider::Etisalat,
            principal: Money::from_major(200),
            fees: Money::from_major(2),
            notes: None,
            cashier: None,
        })
        .await
        .unwrap();

    for balance in wallet.balances(Default::default()).await.unwrap() {
        let units: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM wallet_transactions WHERE provider = ?1",
        )
        .bind(balance.provider)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(balance.balance.units(), units);
    }

    let orange = wallet.balance(WalletProvider::Orange, Default::default()).await.unwrap();
    assert_eq!(orange, Money::from_major(1_000 - 153 - 202));
    let etisalat = wallet.balance(WalletProvider::Etisalat, Default::default()).await.unwrap();
    assert_eq!(etisalat, Money::from_major(200));
}

#[tokio::test]
async fn export_then_import_reproduces_catalog() {
    let source = open().await;
    busy_day(&source).await;
    product(&source, "CH-1", 499, 7).await;

    let mut csv = Vec::new();
    let written = source.import().export_csv(&mut csv).await.unwrap();
    assert_eq!(written, 3);

    let target = open().await;
    let summary = target
        .import()
        .import_csv(
            csv.as_slice(),
            ImportOptions {
                has_header: true,
                update_existing: true,
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(summary.imported, 3);
    assert_eq!(summary.errors, 0);

    let query = "SELECT sku, name, category, brand, buy_price, sale_price, current_qty, min_stock \
                 FROM products WHERE active = 1 ORDER BY sku";
    let before = source.query(query, &[]).await.unwrap();
    let after = target.query(query, &[]).await.unwrap();
    assert_eq!(before, after);
    assert!(target.inventory().verify_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn import_generates_sku_for_blank_cell() {
    let db = open().await;
    let csv = "sku,name,description,category,brand,buy_price,sale_price,current_qty,min_stock\n\
               ,Car holder,,acc,,30,75,4,1\n";
    let summary = db
        .import()
        .import_csv(csv.as_bytes(), ImportOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(summary.imported, 1);

    let rows = db.query("SELECT sku FROM products", &[]).await.unwrap();
    assert!(rows[0].get_str("sku").unwrap().starts_with("PRD-"));
}

#[tokio::test]
async fn single_day_reports() {
    let db = open().await;
    let (phone, _) = busy_day(&db).await;
    db.sales().checkout(paid_in_full(vec![line(&phone, 1)])).await.unwrap();

    let range = today_range();
    let summary = db.reports().financial_summary(range).await.unwrap();
    // The refunded sale is excluded.
    assert_eq!(summary.sale_count, 2);
    assert_eq!(summary.net_revenue, Money::from_major(7_500 * 2 + 90 * 3));

    let daily = db.reports().daily_sales(range).await.unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].day, range.from);
    assert_eq!(daily[0].count, 2);

    let top = db.reports().top_products(range, 1).await.unwrap();
    assert_eq!(top.len(), 1);
}

#[tokio::test]
async fn selling_the_last_unit_leaves_zero() {
    let db = open().await;
    let p = product(&db, "EA-1", 2_800, 2).await;

    db.sales().checkout(paid_in_full(vec![line(&p, 2)])).await.unwrap();
    assert_eq!(db.products().get(&p.id).await.unwrap().unwrap().current_qty, 0);

    let err = db.sales().checkout(paid_in_full(vec![line(&p, 1)])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
}
