//! # Customer Repository
//!
//! Registered customers. Sales copy a customer's name and phone at
//! checkout, so later edits here never change past receipts.

use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use cellpos_core::numbering::new_id;
use cellpos_core::validation::{clean_optional, validate_customer_patch, validate_new_customer};
use cellpos_core::{Customer, CustomerPatch, NewCustomer};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::{like_pattern, now};

pub(crate) const CUSTOMER_COLUMNS: &str = "id, name, phone, email, address, city, notes, customer_type, \
     discount_percentage, credit_limit, active, created_at, updated_at";

const DEFAULT_FIND_LIMIT: i64 = 100;

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    db: Database,
}

impl CustomerRepository {
    pub fn new(db: Database) -> Self {
        CustomerRepository { db }
    }

    pub async fn create(&self, new: NewCustomer) -> DbResult<Customer> {
        validate_new_customer(&new)?;

        let at = now();
        let customer = Customer {
            id: new_id(),
            name: new.name.trim().to_string(),
            phone: clean_optional(new.phone),
            email: clean_optional(new.email),
            address: clean_optional(new.address),
            city: clean_optional(new.city),
            notes: clean_optional(new.notes),
            customer_type: new.customer_type,
            discount_percentage: new.discount_percentage,
            credit_limit: new.credit_limit,
            active: true,
            created_at: at,
            updated_at: at,
        };

        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, phone, email, address, city, notes, customer_type,
                discount_percentage, credit_limit, active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(&customer.city)
        .bind(&customer.notes)
        .bind(customer.customer_type)
        .bind(customer.discount_percentage)
        .bind(customer.credit_limit)
        .bind(customer.active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(tx.conn())
        .await?;
        tx.commit().await?;

        debug!(id = %customer.id, "Customer created");
        Ok(customer)
    }

    pub async fn update(&self, id: &str, patch: CustomerPatch) -> DbResult<Customer> {
        validate_customer_patch(&patch)?;

        let mut c = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;

        if let Some(name) = patch.name {
            c.name = name.trim().to_string();
        }
        if patch.phone.is_some() {
            c.phone = clean_optional(patch.phone);
        }
        if patch.email.is_some() {
            c.email = clean_optional(patch.email);
        }
        if patch.address.is_some() {
            c.address = clean_optional(patch.address);
        }
        if patch.city.is_some() {
            c.city = clean_optional(patch.city);
        }
        if patch.notes.is_some() {
            c.notes = clean_optional(patch.notes);
        }
        if let Some(customer_type) = patch.customer_type {
            c.customer_type = customer_type;
        }
        if let Some(pct) = patch.discount_percentage {
            c.discount_percentage = pct;
        }
        if let Some(limit) = patch.credit_limit {
            c.credit_limit = limit;
        }
        c.updated_at = now();

        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            UPDATE customers SET
                name = ?1, phone = ?2, email = ?3, address = ?4, city = ?5, notes = ?6,
                customer_type = ?7, discount_percentage = ?8, credit_limit = ?9, updated_at = ?10
            WHERE id = ?11
            "#,
        )
        .bind(&c.name)
        .bind(&c.phone)
        .bind(&c.email)
        .bind(&c.address)
        .bind(&c.city)
        .bind(&c.notes)
        .bind(c.customer_type)
        .bind(c.discount_percentage)
        .bind(c.credit_limit)
        .bind(c.updated_at)
        .bind(&c.id)
        .execute(tx.conn())
        .await?;
        tx.commit().await?;

        Ok(c)
    }

    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let affected = self
            .db
            .execute(
                "UPDATE customers SET active = 0, updated_at = datetime('now', 'localtime') WHERE id = ?1",
                &[id.into()],
            )
            .await?;
        if affected == 0 {
            return Err(DbError::not_found("Customer", id));
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(customer)
    }

    /// Active customers whose name or phone contains `query`; all active
    /// customers for an empty query. Ordered by name.
    pub async fn find(&self, query: &str) -> DbResult<Vec<Customer>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE active = 1"
        ));
        if !query.trim().is_empty() {
            let pattern = like_pattern(query);
            qb.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR phone LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        qb.push(" ORDER BY name COLLATE NOCASE LIMIT ")
            .push_bind(DEFAULT_FIND_LIMIT);

        let customers = qb
            .build_query_as::<Customer>()
            .fetch_all(self.db.pool())
            .await?;
        Ok(customers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use cellpos_core::{CustomerType, ErrorKind, Percent};

    #[tokio::test]
    async fn test_customer_lifecycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        let mona = repo
            .create(NewCustomer {
                name: "Mona Adel".into(),
                phone: Some("01112223334".into()),
                customer_type: CustomerType::Vip,
                discount_percentage: Percent::from_bps(500),
                ..Default::default()
            })
            .await
            .unwrap();
        repo.create(NewCustomer {
            name: "Karim Samy".into(),
            phone: Some("01229998887".into()),
            ..Default::default()
        })
        .await
        .unwrap();

        let by_phone = repo.find("2223").await.unwrap();
        assert_eq!(by_phone.len(), 1);
        assert_eq!(by_phone[0].customer_type, CustomerType::Vip);
        assert_eq!(repo.find("").await.unwrap().len(), 2);

        let updated = repo
            .update(&mona.id, CustomerPatch {
                city: Some("Giza".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.city.as_deref(), Some("Giza"));
        assert_eq!(updated.discount_percentage, Percent::from_bps(500));

        repo.deactivate(&mona.id).await.unwrap();
        assert_eq!(repo.find("mona").await.unwrap().len(), 0);
        assert!(!repo.get(&mona.id).await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_rejects_bad_discount() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .customers()
            .create(NewCustomer {
                name: "X".into(),
                discount_percentage: Percent::from_bps(12_000),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
