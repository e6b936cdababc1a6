//! # Catalog Import / Export
//!
//! Bulk catalog load from CSV in the nine-column layout of
//! [`cellpos_core::import_row`], and the matching export.
//!
//! ## Row Handling
//! ```text
//! record ──parse──► CatalogRow ──┬── bad cells ───────────────► errors += 1
//!                                │
//!                                ├── SKU exists, update_existing ─► update
//!                                │   (name, category, prices, min_stock;
//!                                │    never current_qty)
//!                                ├── SKU exists ──────────────► skipped += 1
//!                                │
//!                                └── new ─► insert + `import` movement
//! ```
//!
//! Each row commits on its own, so one bad row never loses the others.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use cellpos_core::import_row::{CatalogRow, CSV_HEADER};
use cellpos_core::{MovementType, NewProduct, Product, ProductPatch};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::catalog::{
    get_by_sku_in, insert_product_in, update_product_in, PRODUCT_COLUMNS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Skip the first record.
    pub has_header: bool,
    /// Overwrite catalog fields of products whose SKU already exists.
    pub update_existing: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            has_header: true,
            update_existing: false,
        }
    }
}

/// A rejected row. `line` is 1-based and counts the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub failures: Vec<RowFailure>,
}

enum RowOutcome {
    Imported,
    Updated,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ImportService {
    db: Database,
}

impl ImportService {
    pub fn new(db: Database) -> Self {
        ImportService { db }
    }

    /// Imports every record of `reader`.
    ///
    /// Row-level problems are counted in the summary. Only an unreadable
    /// stream or a storage failure returns `Err`.
    pub async fn import_csv<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
        actor: Option<&str>,
    ) -> DbResult<ImportSummary> {
        // Parse up front so the reader is never held across an await.
        let rows = {
            let mut csv = csv::ReaderBuilder::new()
                .has_headers(options.has_header)
                .flexible(true)
                .trim(csv::Trim::All)
                .from_reader(reader);

            let first_line = if options.has_header { 2 } else { 1 };
            let mut rows = Vec::new();
            for (index, record) in csv.records().enumerate() {
                let parsed = match record {
                    Ok(record) => {
                        let cells: Vec<&str> = record.iter().collect();
                        CatalogRow::parse(&cells).map_err(|e| e.to_string())
                    }
                    Err(e) => Err(e.to_string()),
                };
                rows.push((index as u64 + first_line, parsed));
            }
            rows
        };

        let mut summary = ImportSummary::default();
        for (line, parsed) in rows {
            let outcome = match parsed {
                Ok(row) => self.import_row(row, options, actor).await,
                Err(message) => Err(DbError::Import(message)),
            };
            match outcome {
                Ok(RowOutcome::Imported) => summary.imported += 1,
                Ok(RowOutcome::Updated) => summary.updated += 1,
                Ok(RowOutcome::Skipped) => summary.skipped += 1,
                Err(e) if is_row_error(&e) => {
                    debug!(line, error = %e, "Import row rejected");
                    summary.errors += 1;
                    summary.failures.push(RowFailure {
                        line,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            imported = summary.imported,
            updated = summary.updated,
            skipped = summary.skipped,
            errors = summary.errors,
            "Catalog import finished"
        );
        Ok(summary)
    }

    pub async fn import_file(
        &self,
        path: impl AsRef<Path>,
        options: ImportOptions,
        actor: Option<&str>,
    ) -> DbResult<ImportSummary> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| DbError::Import(format!("cannot open {}: {e}", path.display())))?;
        self.import_csv(file, options, actor).await
    }

    /// Writes all active products, ordered by SKU, with a header row.
    /// Returns the number of products written.
    pub async fn export_csv<W: Write>(&self, writer: W) -> DbResult<usize> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE active = 1 ORDER BY sku"
        ))
        .fetch_all(self.db.pool())
        .await?;

        let mut out = csv::Writer::from_writer(writer);
        out.write_record(CSV_HEADER)?;
        for p in &products {
            out.write_record([
                p.sku.clone(),
                p.name.clone(),
                p.description.clone().unwrap_or_default(),
                p.category.clone(),
                p.brand.clone().unwrap_or_default(),
                p.buy_price.to_plain_string(),
                p.sale_price.to_plain_string(),
                p.current_qty.to_string(),
                p.min_stock.to_string(),
            ])?;
        }
        out.flush()
            .map_err(|e| DbError::Import(format!("flush failed: {e}")))?;

        debug!(count = products.len(), "Catalog exported");
        Ok(products.len())
    }

    async fn import_row(
        &self,
        row: CatalogRow,
        options: ImportOptions,
        actor: Option<&str>,
    ) -> DbResult<RowOutcome> {
        let mut tx = self.db.begin().await?;
        let conn = tx.conn();

        let existing = match row.sku.as_deref() {
            Some(sku) => get_by_sku_in(conn, sku).await?,
            None => None,
        };

        let outcome = match existing {
            Some(product) if options.update_existing => {
                let patch = ProductPatch {
                    name: Some(row.name),
                    category: Some(row.category),
                    description: row.description,
                    brand: row.brand,
                    buy_price: Some(row.buy_price),
                    sale_price: Some(row.sale_price),
                    min_stock: Some(row.min_stock),
                    ..Default::default()
                };
                update_product_in(conn, &product.id, patch).await?;
                RowOutcome::Updated
            }
            Some(product) => {
                warn!(sku = %product.sku, "Import skipped existing SKU");
                RowOutcome::Skipped
            }
            None => {
                let new = NewProduct {
                    sku: row.sku.unwrap_or_default(),
                    name: row.name,
                    description: row.description,
                    category: row.category,
                    brand: row.brand,
                    buy_price: row.buy_price,
                    sale_price: row.sale_price,
                    initial_qty: row.current_qty,
                    min_stock: row.min_stock,
                    ..Default::default()
                };
                insert_product_in(conn, &new, MovementType::Import, actor).await?;
                RowOutcome::Imported
            }
        };
        tx.commit().await?;
        Ok(outcome)
    }
}

/// Errors that reject one row rather than the whole import.
fn is_row_error(err: &DbError) -> bool {
    matches!(
        err,
        DbError::Import(_)
            | DbError::Domain(_)
            | DbError::UniqueViolation { .. }
            | DbError::Conflict(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use cellpos_core::Money;

    const CSV: &str = "\
sku,name,description,category,brand,buy_price,sale_price,current_qty,min_stock
CASE-1,Silicone case,,acc,Generic,15,35,10,2
CHG-1,Fast charger 25W,USB-C,chargers,Samsung,120,199.5,4,1
BAD-1,,,acc,,10,20,1,0
BAD-2,Cable,,acc,,zero,20,1,0
";

    #[tokio::test]
    async fn test_import_counts_and_movements() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let summary = db
            .import()
            .import_csv(CSV.as_bytes(), ImportOptions::default(), Some("admin"))
            .await
            .unwrap();

        assert_eq!(summary.imported, 2);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.failures[0].line, 4);

        let charger = db.products().get_by_sku("CHG-1").await.unwrap().unwrap();
        assert_eq!(charger.sale_price, Money::from_major_minor(199, 50));
        assert_eq!(charger.current_qty, 4);

        let history = db.inventory().history(&charger.id, None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].movement_type, MovementType::Import);
        assert_eq!(history[0].cost_per_unit, Money::from_major(120));
    }

    #[tokio::test]
    async fn test_oversized_row_counts_as_error() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let csv = "sku,name,description,category,brand,buy_price,sale_price,current_qty,min_stock\n\
                   OK-1,Case,,acc,,10,20,3,0\n\
                   BIG-1,Case,,acc,,100,200,999999999999999,0\n\
                   PRICEY-1,Case,,acc,,999999999999,200,1,0\n\
                   OK-2,Cable,,acc,,5,9,2,0\n";

        let summary = db
            .import()
            .import_csv(csv.as_bytes(), ImportOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.failures[0].line, 3);
        assert_eq!(summary.failures[1].line, 4);

        assert!(db.products().get_by_sku("BIG-1").await.unwrap().is_none());
        let cable = db.products().get_by_sku("OK-2").await.unwrap().unwrap();
        assert_eq!(cable.current_qty, 2);
        assert!(db.inventory().verify_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_existing_sku_skip_or_update() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let import = db.import();
        import
            .import_csv(CSV.as_bytes(), ImportOptions::default(), None)
            .await
            .unwrap();

        let again = "sku,name,description,category,brand,buy_price,sale_price,current_qty,min_stock\n\
                     CASE-1,Silicone case v2,,acc,,16,39,99,3\n";

        let summary = import
            .import_csv(again.as_bytes(), ImportOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(summary.skipped, 1);

        let summary = import
            .import_csv(
                again.as_bytes(),
                ImportOptions {
                    has_header: true,
                    update_existing: true,
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(summary.updated, 1);

        let case = db.products().get_by_sku("CASE-1").await.unwrap().unwrap();
        assert_eq!(case.name, "Silicone case v2");
        assert_eq!(case.sale_price, Money::from_major(39));
        assert_eq!(case.min_stock, 3);
        assert_eq!(case.current_qty, 10);
        assert_eq!(case.brand.as_deref(), Some("Generic"));
    }

    #[tokio::test]
    async fn test_export_matches_import_layout() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.import()
            .import_csv(CSV.as_bytes(), ImportOptions::default(), None)
            .await
            .unwrap();

        let mut buf = Vec::new();
        let written = db.import().export_csv(&mut buf).await.unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert_eq!(lines[1], "CASE-1,Silicone case,,acc,Generic,15,35,10,2");
        assert_eq!(lines[2], "CHG-1,Fast charger 25W,USB-C,chargers,Samsung,120,199.5,4,1");
    }
}
