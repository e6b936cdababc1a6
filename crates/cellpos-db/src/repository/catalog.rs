//! # Product Repository
//!
//! Catalog operations. Stock is never written here: a product's opening
//! quantity goes through the inventory ledger in the same transaction.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    create(NewProduct)                                   │
//! │                                                                         │
//! │  validate ──► SKU blank? ──yes──► auto_generate_sku = "1"?             │
//! │                  │                   ├── yes: PRD-<epoch>[-N]          │
//! │                  │ no                └── no:  Validation(sku)          │
//! │                  ▼                                                      │
//! │             SKU taken? ──yes──► Conflict                               │
//! │                  │                                                      │
//! │                  ▼  one transaction                                     │
//! │  INSERT products (current_qty = 0, profit_margin computed)             │
//! │  initial_qty > 0 ──► ledger: initial_stock +qty                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, info};

use cellpos_core::numbering::{generated_sku, new_id};
use cellpos_core::types::profit_margin;
use cellpos_core::validation::{clean_optional, validate_new_product, validate_product_patch};
use cellpos_core::{
    MovementType, NewProduct, Product, ProductFilter, ProductPatch, StockChange, ValidationError,
};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::inventory::apply_in;
use crate::repository::settings::{self, AUTO_GENERATE_SKU, DEFAULT_WARRANTY};
use crate::repository::{like_pattern, now};

pub(crate) const PRODUCT_COLUMNS: &str = "id, sku, name, description, category, subcategory, brand, barcode, \
     buy_price, sale_price, current_qty, min_stock, max_stock, location, supplier, \
     warranty_months, active, tax_rate, profit_margin, created_at, updated_at";

/// Upper bound on `PRD-<epoch>-N` suffixes tried within one second.
const MAX_SKU_ATTEMPTS: u32 = 1_000;

/// Default page size for `find`.
const DEFAULT_FIND_LIMIT: i64 = 500;

/// Repository for catalog operations.
///
/// ## Usage
/// ```rust,ignore
/// let products = db.products();
///
/// let case = products.create(new_case, Some("admin")).await?;
/// let hits = products.find(&ProductFilter { text: Some("case".into()), ..Default::default() }).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    db: Database,
}

impl ProductRepository {
    pub fn new(db: Database) -> Self {
        ProductRepository { db }
    }

    /// Creates a product, emitting an `initial_stock` movement for a
    /// positive opening quantity.
    ///
    /// ## Errors
    /// * `Validation` - bad field, or blank SKU with `auto_generate_sku = "0"`
    /// * `UniqueViolation` - SKU already used by any product, active or not
    pub async fn create(&self, new: NewProduct, actor: Option<&str>) -> DbResult<Product> {
        let mut tx = self.db.begin().await?;
        let product = insert_product_in(tx.conn(), &new, MovementType::InitialStock, actor).await?;
        tx.commit().await?;

        info!(sku = %product.sku, qty = product.current_qty, "Product created");
        Ok(product)
    }

    /// Applies a partial update. SKU and stock are not editable here.
    pub async fn update(&self, id: &str, patch: ProductPatch) -> DbResult<Product> {
        validate_product_patch(&patch)?;

        let mut tx = self.db.begin().await?;
        let product = update_product_in(tx.conn(), id, patch).await?;
        tx.commit().await?;

        debug!(sku = %product.sku, "Product updated");
        Ok(product)
    }

    /// Retires a product. Its movements and sale lines stay.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        self.set_active(id, false).await
    }

    pub async fn reactivate(&self, id: &str) -> DbResult<()> {
        self.set_active(id, true).await
    }

    async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let mut tx = self.db.begin().await?;
        let result = sqlx::query("UPDATE products SET active = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(active)
            .bind(now())
            .bind(id)
            .execute(tx.conn())
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        tx.commit().await?;

        debug!(id = %id, active, "Product active flag changed");
        Ok(())
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Gets a product by id, active or not.
    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        self.get_by("id", id).await
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        self.get_by("sku", sku.trim()).await
    }

    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        self.get_by("barcode", barcode.trim()).await
    }

    async fn get_by(&self, column: &'static str, value: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE {column} = ?1 LIMIT 1"
        ))
        .bind(value)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(product)
    }

    /// Searches the catalog. Every set filter narrows the result; ordered by name.
    pub async fn find(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE 1 = 1"));

        if let Some(sku) = clean_optional(filter.sku.clone()) {
            qb.push(" AND sku = ").push_bind(sku);
        }
        if let Some(barcode) = clean_optional(filter.barcode.clone()) {
            qb.push(" AND barcode = ").push_bind(barcode);
        }
        if let Some(text) = clean_optional(filter.text.clone()) {
            let pattern = like_pattern(&text);
            qb.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR brand LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(category) = clean_optional(filter.category.clone()) {
            qb.push(" AND category = ").push_bind(category);
        }
        if let Some(active) = filter.active {
            qb.push(" AND active = ").push_bind(active);
        }
        qb.push(" ORDER BY name COLLATE NOCASE, sku LIMIT ")
            .push_bind(filter.limit.unwrap_or(DEFAULT_FIND_LIMIT));

        let products = qb
            .build_query_as::<Product>()
            .fetch_all(self.db.pool())
            .await?;

        debug!(count = products.len(), "Catalog search");
        Ok(products)
    }

    pub async fn categories_distinct(&self) -> DbResult<Vec<String>> {
        self.distinct("category").await
    }

    pub async fn brands_distinct(&self) -> DbResult<Vec<String>> {
        self.distinct("brand").await
    }

    pub async fn suppliers_distinct(&self) -> DbResult<Vec<String>> {
        self.distinct("supplier").await
    }

    async fn distinct(&self, column: &'static str) -> DbResult<Vec<String>> {
        let values = sqlx::query_scalar::<_, String>(&format!(
            "SELECT DISTINCT {column} FROM products \
             WHERE {column} IS NOT NULL AND trim({column}) <> '' ORDER BY {column}"
        ))
        .fetch_all(self.db.pool())
        .await?;
        Ok(values)
    }

    /// Active products at or under their effective minimum.
    ///
    /// A product with `min_stock = 0` uses the `low_stock_threshold` setting.
    pub async fn low_stock(&self, limit: i64) -> DbResult<Vec<Product>> {
        let threshold = self.db.settings().low_stock_threshold().await;
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE active = 1 \
               AND current_qty <= CASE WHEN min_stock > 0 THEN min_stock ELSE ?1 END \
             ORDER BY current_qty, name \
             LIMIT ?2"
        ))
        .bind(threshold)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;
        Ok(products)
    }

    pub async fn count_active(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE active = 1")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(product)
}

pub(crate) async fn get_by_sku_in(
    conn: &mut SqliteConnection,
    sku: &str,
) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"
    ))
    .bind(sku)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(product)
}

/// Inserts a product on the caller's transaction. A positive opening
/// quantity is posted as one `opening` movement.
pub(crate) async fn insert_product_in(
    conn: &mut SqliteConnection,
    new: &NewProduct,
    opening: MovementType,
    actor: Option<&str>,
) -> DbResult<Product> {
    validate_new_product(new)?;

    let sku = resolve_sku(conn, &new.sku).await?;
    let warranty_months = match new.warranty_months {
        Some(months) => Some(months),
        None => {
            let default: i64 = settings::get_parsed_in(conn, DEFAULT_WARRANTY, 0).await;
            (default > 0).then_some(default)
        }
    };

    let at = now();
    let product = Product {
        id: new_id(),
        sku,
        name: new.name.trim().to_string(),
        description: clean_optional(new.description.clone()),
        category: new.category.trim().to_string(),
        subcategory: clean_optional(new.subcategory.clone()),
        brand: clean_optional(new.brand.clone()),
        barcode: clean_optional(new.barcode.clone()),
        buy_price: new.buy_price,
        sale_price: new.sale_price,
        current_qty: 0,
        min_stock: new.min_stock,
        max_stock: new.max_stock,
        location: clean_optional(new.location.clone()),
        supplier: clean_optional(new.supplier.clone()),
        warranty_months,
        active: true,
        tax_rate: new.tax_rate,
        profit_margin: profit_margin(new.buy_price, new.sale_price),
        created_at: at,
        updated_at: at,
    };

    sqlx::query(
        r#"
        INSERT INTO products (
            id, sku, name, description, category, subcategory, brand, barcode,
            buy_price, sale_price, current_qty, min_stock, max_stock, location, supplier,
            warranty_months, active, tax_rate, profit_margin, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
            ?16, ?17, ?18, ?19, ?20, ?21
        )
        "#,
    )
    .bind(&product.id)
    .bind(&product.sku)
    .bind(&product.name)
    .bind(&product.description)
    .bind(&product.category)
    .bind(&product.subcategory)
    .bind(&product.brand)
    .bind(&product.barcode)
    .bind(product.buy_price)
    .bind(product.sale_price)
    .bind(product.current_qty)
    .bind(product.min_stock)
    .bind(product.max_stock)
    .bind(&product.location)
    .bind(&product.supplier)
    .bind(product.warranty_months)
    .bind(product.active)
    .bind(product.tax_rate)
    .bind(product.profit_margin)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&mut *conn)
    .await?;

    if new.initial_qty > 0 {
        let mut change = StockChange::new(&product.id, opening, new.initial_qty, product.buy_price)
            .reference(&product.id, "product");
        change.actor = actor.map(str::to_string);
        apply_in(conn, &change).await?;
    }

    get_in(conn, &product.id)
        .await?
        .ok_or_else(|| DbError::Internal(format!("product {} vanished after insert", product.sku)))
}

/// Applies a patch on the caller's transaction.
pub(crate) async fn update_product_in(
    conn: &mut SqliteConnection,
    id: &str,
    patch: ProductPatch,
) -> DbResult<Product> {
    let mut p = get_in(conn, id)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))?;

    if patch.is_empty() {
        return Ok(p);
    }

    if let Some(name) = patch.name {
        p.name = name.trim().to_string();
    }
    if let Some(category) = patch.category {
        p.category = category.trim().to_string();
    }
    if patch.description.is_some() {
        p.description = clean_optional(patch.description);
    }
    if patch.subcategory.is_some() {
        p.subcategory = clean_optional(patch.subcategory);
    }
    if patch.brand.is_some() {
        p.brand = clean_optional(patch.brand);
    }
    if patch.barcode.is_some() {
        p.barcode = clean_optional(patch.barcode);
    }
    if patch.location.is_some() {
        p.location = clean_optional(patch.location);
    }
    if patch.supplier.is_some() {
        p.supplier = clean_optional(patch.supplier);
    }
    if let Some(price) = patch.buy_price {
        p.buy_price = price;
    }
    if let Some(price) = patch.sale_price {
        p.sale_price = price;
    }
    if let Some(min) = patch.min_stock {
        p.min_stock = min;
    }
    if let Some(max) = patch.max_stock {
        p.max_stock = max;
    }
    if let Some(months) = patch.warranty_months {
        p.warranty_months = Some(months);
    }
    if let Some(rate) = patch.tax_rate {
        p.tax_rate = rate;
    }
    p.profit_margin = profit_margin(p.buy_price, p.sale_price);
    p.updated_at = now();

    sqlx::query(
        r#"
        UPDATE products SET
            name = ?1, description = ?2, category = ?3, subcategory = ?4, brand = ?5,
            barcode = ?6, buy_price = ?7, sale_price = ?8, min_stock = ?9, max_stock = ?10,
            location = ?11, supplier = ?12, warranty_months = ?13, tax_rate = ?14,
            profit_margin = ?15, updated_at = ?16
        WHERE id = ?17
        "#,
    )
    .bind(&p.name)
    .bind(&p.description)
    .bind(&p.category)
    .bind(&p.subcategory)
    .bind(&p.brand)
    .bind(&p.barcode)
    .bind(p.buy_price)
    .bind(p.sale_price)
    .bind(p.min_stock)
    .bind(p.max_stock)
    .bind(&p.location)
    .bind(&p.supplier)
    .bind(p.warranty_months)
    .bind(p.tax_rate)
    .bind(p.profit_margin)
    .bind(p.updated_at)
    .bind(&p.id)
    .execute(&mut *conn)
    .await?;

    Ok(p)
}

/// Returns the SKU to store: the given one if free, else a generated one.
async fn resolve_sku(conn: &mut SqliteConnection, requested: &str) -> DbResult<String> {
    let requested = requested.trim();
    if !requested.is_empty() {
        if sku_exists(conn, requested).await? {
            return Err(DbError::duplicate("sku", requested));
        }
        return Ok(requested.to_string());
    }

    let auto = settings::get_in(conn, AUTO_GENERATE_SKU).await;
    if auto.as_deref().map(str::trim) == Some("0") {
        return Err(ValidationError::required("sku").into());
    }

    let epoch = Utc::now().timestamp();
    for attempt in 1..=MAX_SKU_ATTEMPTS {
        let candidate = generated_sku(epoch, attempt);
        if !sku_exists(conn, &candidate).await? {
            return Ok(candidate);
        }
    }
    Err(DbError::duplicate("sku", generated_sku(epoch, MAX_SKU_ATTEMPTS)))
}

async fn sku_exists(conn: &mut SqliteConnection, sku: &str) -> DbResult<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE sku = ?1")
        .bind(sku)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}
