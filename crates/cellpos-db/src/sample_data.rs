//! # Sample Catalog
//!
//! A small phone-shop catalog inserted into a fresh database so the
//! dashboards have something to show. Runs only when `products` is empty
//! and `DbConfig::seed_sample_data` is set.
//!
//! Every opening quantity goes through the ledger as `initial_stock`.

use tracing::{debug, info};

use cellpos_core::{Money, NewProduct};

use crate::error::DbResult;
use crate::pool::Database;

/// (sku, name, category, brand, buy, sale, qty, min_stock, warranty months)
type SampleProduct = (&'static str, &'static str, &'static str, &'static str, i64, i64, i64, i64, i64);

const SAMPLE_PRODUCTS: &[SampleProduct] = &[
    ("PH-SAM-A15", "Samsung Galaxy A15 128GB", "phones", "Samsung", 6_800, 7_499, 5, 2, 12),
    ("PH-SAM-A35", "Samsung Galaxy A35 256GB", "phones", "Samsung", 13_500, 14_999, 3, 1, 12),
    ("PH-XIA-RN13", "Xiaomi Redmi Note 13", "phones", "Xiaomi", 8_200, 8_999, 4, 2, 12),
    ("PH-APL-IP13", "iPhone 13 128GB", "phones", "Apple", 27_000, 29_999, 2, 1, 12),
    ("PH-OPP-A18", "Oppo A18 64GB", "phones", "Oppo", 4_300, 4_799, 6, 2, 12),
    ("CS-SIL-A15", "Silicone case Galaxy A15", "cases", "Generic", 40, 90, 25, 5, 0),
    ("CS-CLR-IP13", "Clear case iPhone 13", "cases", "Generic", 55, 120, 20, 5, 0),
    ("CS-BOOK-RN13", "Book cover Redmi Note 13", "cases", "Generic", 70, 150, 12, 3, 0),
    ("CH-SAM-25W", "Samsung 25W USB-C charger", "chargers", "Samsung", 350, 499, 10, 3, 6),
    ("CH-ANK-20W", "Anker 20W USB-C charger", "chargers", "Anker", 420, 599, 8, 3, 12),
    ("CB-USBC-1M", "USB-C cable 1m", "cables", "Generic", 45, 100, 30, 10, 0),
    ("CB-LTN-1M", "Lightning cable 1m", "cables", "Generic", 60, 130, 20, 5, 0),
    ("SP-GLS-A15", "Tempered glass Galaxy A15", "screen_protectors", "Generic", 20, 60, 40, 10, 0),
    ("SP-GLS-IP13", "Tempered glass iPhone 13", "screen_protectors", "Generic", 25, 75, 35, 10, 0),
    ("EA-SAM-BUDS", "Samsung Galaxy Buds FE", "audio", "Samsung", 2_300, 2_799, 4, 1, 6),
    ("PB-ANK-10K", "Anker power bank 10000mAh", "power_banks", "Anker", 900, 1_199, 6, 2, 12),
];

/// Seeds the sample catalog into an empty database.
pub(crate) async fn seed_if_empty(db: &Database) -> DbResult<()> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(db.pool())
        .await?;
    if existing > 0 {
        debug!(existing, "Catalog not empty, skipping sample data");
        return Ok(());
    }

    let products = db.products();
    for &(sku, name, category, brand, buy, sale, qty, min_stock, warranty) in SAMPLE_PRODUCTS {
        products
            .create(
                NewProduct {
                    sku: sku.to_string(),
                    name: name.to_string(),
                    category: category.to_string(),
                    brand: Some(brand.to_string()),
                    buy_price: Money::from_major(buy),
                    sale_price: Money::from_major(sale),
                    initial_qty: qty,
                    min_stock,
                    warranty_months: (warranty > 0).then_some(warranty),
                    ..Default::default()
                },
                Some("sample-data"),
            )
            .await?;
    }

    info!(count = SAMPLE_PRODUCTS.len(), "Sample catalog inserted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;

    #[tokio::test]
    async fn test_seed_runs_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert_eq!(db.products().count_active().await.unwrap(), 0);

        seed_if_empty(&db).await.unwrap();
        let count = db.products().count_active().await.unwrap();
        assert_eq!(count, SAMPLE_PRODUCTS.len() as i64);

        seed_if_empty(&db).await.unwrap();
        assert_eq!(db.products().count_active().await.unwrap(), count);

        let drift = db.inventory().verify_all().await.unwrap();
        assert!(drift.is_empty());
    }

    #[test]
    fn test_sample_skus_are_unique_and_priced() {
        let mut skus: Vec<&str> = SAMPLE_PRODUCTS.iter().map(|p| p.0).collect();
        skus.sort_unstable();
        skus.dedup();
        assert_eq!(skus.len(), SAMPLE_PRODUCTS.len());
        assert!(SAMPLE_PRODUCTS.iter().all(|p| p.4 > 0 && p.5 >= p.4));
    }
}
