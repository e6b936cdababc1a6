//! # Supplier Repository
//!
//! Products name their supplier as free text, so retiring a supplier does
//! not touch the catalog.

use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use cellpos_core::numbering::new_id;
use cellpos_core::validation::{clean_optional, validate_new_supplier, validate_supplier_patch};
use cellpos_core::{NewSupplier, Supplier, SupplierPatch};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::now;

const SUPPLIER_COLUMNS: &str =
    "id, name, contact_person, phone, email, address, notes, active, created_at";

#[derive(Debug, Clone)]
pub struct SupplierRepository {
    db: Database,
}

impl SupplierRepository {
    pub fn new(db: Database) -> Self {
        SupplierRepository { db }
    }

    pub async fn create(&self, new: NewSupplier) -> DbResult<Supplier> {
        validate_new_supplier(&new)?;

        let supplier = Supplier {
            id: new_id(),
            name: new.name.trim().to_string(),
            contact_person: clean_optional(new.contact_person),
            phone: clean_optional(new.phone),
            email: clean_optional(new.email),
            address: clean_optional(new.address),
            notes: clean_optional(new.notes),
            active: true,
            created_at: now(),
        };

        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, contact_person, phone, email, address, notes, active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.contact_person)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(&supplier.address)
        .bind(&supplier.notes)
        .bind(supplier.active)
        .bind(supplier.created_at)
        .execute(tx.conn())
        .await?;
        tx.commit().await?;

        debug!(id = %supplier.id, "Supplier created");
        Ok(supplier)
    }

    pub async fn update(&self, id: &str, patch: SupplierPatch) -> DbResult<Supplier> {
        validate_supplier_patch(&patch)?;

        let mut s = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Supplier", id))?;

        if let Some(name) = patch.name {
            s.name = name.trim().to_string();
        }
        if patch.contact_person.is_some() {
            s.contact_person = clean_optional(patch.contact_person);
        }
        if patch.phone.is_some() {
            s.phone = clean_optional(patch.phone);
        }
        if patch.email.is_some() {
            s.email = clean_optional(patch.email);
        }
        if patch.address.is_some() {
            s.address = clean_optional(patch.address);
        }
        if patch.notes.is_some() {
            s.notes = clean_optional(patch.notes);
        }

        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            UPDATE suppliers SET
                name = ?1, contact_person = ?2, phone = ?3, email = ?4, address = ?5, notes = ?6
            WHERE id = ?7
            "#,
        )
        .bind(&s.name)
        .bind(&s.contact_person)
        .bind(&s.phone)
        .bind(&s.email)
        .bind(&s.address)
        .bind(&s.notes)
        .bind(&s.id)
        .execute(tx.conn())
        .await?;
        tx.commit().await?;

        Ok(s)
    }

    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let affected = self
            .db
            .execute("UPDATE suppliers SET active = 0 WHERE id = ?1", &[id.into()])
            .await?;
        if affected == 0 {
            return Err(DbError::not_found("Supplier", id));
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(supplier)
    }

    /// Suppliers ordered by name.
    pub async fn list(&self, active_only: bool) -> DbResult<Vec<Supplier>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers"));
        if active_only {
            qb.push(" WHERE active = 1");
        }
        qb.push(" ORDER BY name COLLATE NOCASE");

        let suppliers = qb
            .build_query_as::<Supplier>()
            .fetch_all(self.db.pool())
            .await?;
        Ok(suppliers)
    }
}
