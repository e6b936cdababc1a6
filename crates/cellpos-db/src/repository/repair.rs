//! # Repair Repository
//!
//! Repair tickets and their status state machine.
//!
//! ## Status History
//! ```text
//! transition(id, to, note, actor)
//!      │
//!      ├── check_transition(from, to)      (same state is illegal)
//!      ├── transition_stamp(...)           (delivery_date, actual_days)
//!      │
//!      ▼
//! UPDATE repairs SET status, status_note, status_changed_by, ...
//!      │
//!      ▼  trg_repairs_status_history
//! INSERT repair_status_history (old, new, note, actor)
//! ```
//!
//! The trigger is the only writer of the history table, so a status change
//! made outside this repository is still logged.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, info};

use cellpos_core::repair_flow::{check_transition, transition_stamp};
use cellpos_core::validation::{
    clean_optional, validate_new_repair, validate_repair_costs, validate_repair_patch,
};
use cellpos_core::{
    NewRepair, Repair, RepairCosts, RepairFilter, RepairPatch, RepairStatus,
    RepairStatusHistory, ValidationError,
};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::{like_pattern, now, today};

const REPAIR_COLUMNS: &str = "id, customer_name, customer_phone, customer_email, device_type, \
     device_model, device_serial, device_color, device_password, problem_description, repair_type, \
     priority, estimated_cost, actual_cost, parts_cost, labor_cost, estimated_days, actual_days, \
     receive_date, delivery_date, status, technician, accessories, backup_created, data_recovered, \
     warranty_days, notes, internal_notes, created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, repair_id, old_status, new_status, notes, changed_by, changed_at";

const DEFAULT_LIST_LIMIT: i64 = 500;

#[derive(Debug, Clone)]
pub struct RepairRepository {
    db: Database,
}

impl RepairRepository {
    pub fn new(db: Database) -> Self {
        RepairRepository { db }
    }

    /// Opens a ticket. The returned `id` is the ticket number.
    pub async fn create(&self, new: NewRepair) -> DbResult<Repair> {
        validate_new_repair(&new)?;

        let at = now();
        let receive_date = new.receive_date.unwrap_or_else(|| at.date());
        let status = new.status.unwrap_or_default();

        let mut tx = self.db.begin().await?;
        let conn = tx.conn();
        let id = sqlx::query(
            r#"
            INSERT INTO repairs (
                customer_name, customer_phone, customer_email, device_type, device_model,
                device_serial, device_color, device_password, problem_description, repair_type,
                priority, estimated_cost, estimated_days, receive_date, status, technician,
                accessories, backup_created, warranty_days, notes, internal_notes,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                ?17, ?18, ?19, ?20, ?21, ?22, ?22
            )
            "#,
        )
        .bind(new.customer_name.trim())
        .bind(clean_optional(new.customer_phone))
        .bind(clean_optional(new.customer_email))
        .bind(new.device_type.trim())
        .bind(clean_optional(new.device_model))
        .bind(clean_optional(new.device_serial))
        .bind(clean_optional(new.device_color))
        .bind(clean_optional(new.device_password))
        .bind(clean_optional(new.problem_description))
        .bind(clean_optional(new.repair_type))
        .bind(new.priority)
        .bind(new.estimated_cost)
        .bind(new.estimated_days)
        .bind(receive_date)
        .bind(status)
        .bind(clean_optional(new.technician))
        .bind(clean_optional(new.accessories))
        .bind(new.backup_created)
        .bind(new.warranty_days)
        .bind(clean_optional(new.notes))
        .bind(clean_optional(new.internal_notes))
        .bind(at)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        let repair = get_in(conn, id)
            .await?
            .ok_or_else(|| DbError::Internal(format!("repair {id} vanished after insert")))?;
        tx.commit().await?;

        info!(ticket = id, status = %status, "Repair ticket opened");
        Ok(repair)
    }

    /// Edits descriptive fields. Status and costs have their own operations.
    pub async fn update(&self, id: i64, patch: RepairPatch) -> DbResult<Repair> {
        validate_repair_patch(&patch)?;

        let mut tx = self.db.begin().await?;
        let conn = tx.conn();
        let mut r = get_in(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Repair", id.to_string()))?;

        if let Some(name) = patch.customer_name {
            r.customer_name = name.trim().to_string();
        }
        if let Some(device) = patch.device_type {
            r.device_type = device.trim().to_string();
        }
        merge_text(&mut r.customer_phone, patch.customer_phone);
        merge_text(&mut r.customer_email, patch.customer_email);
        merge_text(&mut r.device_model, patch.device_model);
        merge_text(&mut r.device_serial, patch.device_serial);
        merge_text(&mut r.device_color, patch.device_color);
        merge_text(&mut r.device_password, patch.device_password);
        merge_text(&mut r.problem_description, patch.problem_description);
        merge_text(&mut r.repair_type, patch.repair_type);
        merge_text(&mut r.technician, patch.technician);
        merge_text(&mut r.accessories, patch.accessories);
        merge_text(&mut r.notes, patch.notes);
        merge_text(&mut r.internal_notes, patch.internal_notes);
        if let Some(priority) = patch.priority {
            r.priority = priority;
        }
        if patch.estimated_days.is_some() {
            r.estimated_days = patch.estimated_days;
        }
        if let Some(flag) = patch.backup_created {
            r.backup_created = flag;
        }
        if let Some(flag) = patch.data_recovered {
            r.data_recovered = flag;
        }
        if let Some(days) = patch.warranty_days {
            r.warranty_days = days;
        }

        sqlx::query(
            r#"
            UPDATE repairs SET
                customer_name = ?1, customer_phone = ?2, customer_email = ?3, device_type = ?4,
                device_model = ?5, device_serial = ?6, device_color = ?7, device_password = ?8,
                problem_description = ?9, repair_type = ?10, priority = ?11, estimated_days = ?12,
                technician = ?13, accessories = ?14, backup_created = ?15, data_recovered = ?16,
                warranty_days = ?17, notes = ?18, internal_notes = ?19
            WHERE id = ?20
            "#,
        )
        .bind(&r.customer_name)
        .bind(&r.customer_phone)
        .bind(&r.customer_email)
        .bind(&r.device_type)
        .bind(&r.device_model)
        .bind(&r.device_serial)
        .bind(&r.device_color)
        .bind(&r.device_password)
        .bind(&r.problem_description)
        .bind(&r.repair_type)
        .bind(r.priority)
        .bind(r.estimated_days)
        .bind(&r.technician)
        .bind(&r.accessories)
        .bind(r.backup_created)
        .bind(r.data_recovered)
        .bind(r.warranty_days)
        .bind(&r.notes)
        .bind(&r.internal_notes)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        let updated = get_in(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Repair", id.to_string()))?;
        tx.commit().await?;

        debug!(ticket = id, "Repair updated");
        Ok(updated)
    }

    /// Moves a ticket to `to`.
    ///
    /// ## Errors
    /// * `NotFound` - unknown ticket
    /// * `IllegalTransition` - move not allowed, including `to == from`
    pub async fn transition(
        &self,
        id: i64,
        to: RepairStatus,
        note: Option<&str>,
        actor: Option<&str>,
    ) -> DbResult<Repair> {
        let mut tx = self.db.begin().await?;
        let conn = tx.conn();
        let current = get_in(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Repair", id.to_string()))?;

        check_transition(current.status, to)?;
        let stamp = transition_stamp(to, current.receive_date, current.delivery_date, today());

        sqlx::query(
            r#"
            UPDATE repairs SET
                status = ?1, status_note = ?2, status_changed_by = ?3,
                delivery_date = ?4, actual_days = COALESCE(?5, actual_days)
            WHERE id = ?6
            "#,
        )
        .bind(to)
        .bind(clean_optional(note.map(str::to_string)))
        .bind(clean_optional(actor.map(str::to_string)))
        .bind(stamp.delivery_date)
        .bind(stamp.actual_days)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        let updated = get_in(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Repair", id.to_string()))?;
        tx.commit().await?;

        info!(ticket = id, from = %current.status, to = %to, "Repair status changed");
        Ok(updated)
    }

    /// Revises costs. Not allowed once a ticket is delivered or cancelled.
    pub async fn set_costs(&self, id: i64, costs: RepairCosts) -> DbResult<Repair> {
        validate_repair_costs(&costs)?;

        let mut tx = self.db.begin().await?;
        let conn = tx.conn();
        let current = get_in(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Repair", id.to_string()))?;
        if current.status.is_terminal() {
            return Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: open_statuses(),
            }
            .into());
        }

        sqlx::query(
            "UPDATE repairs SET actual_cost = ?1, parts_cost = ?2, labor_cost = ?3 WHERE id = ?4",
        )
        .bind(costs.actual_cost)
        .bind(costs.parts_cost)
        .bind(costs.labor_cost)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        let updated = get_in(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Repair", id.to_string()))?;
        tx.commit().await?;
        Ok(updated)
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<Repair>> {
        let repair = sqlx::query_as::<_, Repair>(&format!(
            "SELECT {REPAIR_COLUMNS} FROM repairs WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(repair)
    }

    /// Status log of a ticket, oldest first.
    pub async fn history(&self, id: i64) -> DbResult<Vec<RepairStatusHistory>> {
        let rows = sqlx::query_as::<_, RepairStatusHistory>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM repair_status_history WHERE repair_id = ?1 ORDER BY id"
        ))
        .bind(id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Tickets matching `filter`, newest first. Dates filter on `receive_date`.
    pub async fn list(&self, filter: &RepairFilter) -> DbResult<Vec<Repair>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {REPAIR_COLUMNS} FROM repairs WHERE 1 = 1"));

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(priority) = filter.priority {
            qb.push(" AND priority = ").push_bind(priority);
        }
        if let Some(text) = filter.text.as_deref().filter(|t| !t.trim().is_empty()) {
            let pattern = like_pattern(text);
            qb.push(" AND (customer_name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR customer_phone LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR device_model LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(from) = filter.from {
            qb.push(" AND receive_date >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND receive_date <= ").push_bind(to);
        }
        qb.push(" ORDER BY id DESC LIMIT ")
            .push_bind(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT));

        let repairs = qb.build_query_as::<Repair>().fetch_all(self.db.pool()).await?;
        Ok(repairs)
    }
}

/// Overwrites `target` when the patch carries a value; blank clears it.
fn merge_text(target: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *target = clean_optional(value);
    }
}

fn open_statuses() -> Vec<String> {
    [
        RepairStatus::Waiting,
        RepairStatus::InProgress,
        RepairStatus::AwaitingParts,
        RepairStatus::Completed,
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

async fn get_in(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Repair>> {
    let repair = sqlx::query_as::<_, Repair>(&format!(
        "SELECT {REPAIR_COLUMNS} FROM repairs WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(repair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use cellpos_core::{ErrorKind, Money, RepairPriority};
    use RepairStatus::*;

    fn ticket() -> NewRepair {
        NewRepair {
            customer_name: "Ahmed Ali".into(),
            customer_phone: Some("01005556667".into()),
            device_type: "iPhone".into(),
            device_model: Some("iPhone 13".into()),
            problem_description: Some("screen".into()),
            estimated_cost: Money::from_major(500),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let r = db.repairs().create(ticket()).await.unwrap();

        assert_eq!(r.id, 1);
        assert_eq!(r.status, Waiting);
        assert_eq!(r.priority, RepairPriority::Normal);
        assert_eq!(r.receive_date, today());
        assert!(r.delivery_date.is_none());
        assert!(db.repairs().history(r.id).await.unwrap().is_empty());

        let second = db.repairs().create(ticket()).await.unwrap();
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_create_in_non_default_status_logs_origin() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let r = db
            .repairs()
            .create(NewRepair {
                status: Some(InProgress),
                ..ticket()
            })
            .await
            .unwrap();

        let history = db.repairs().history(r.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_status, None);
        assert_eq!(history[0].new_status, InProgress);
    }

    #[tokio::test]
    async fn test_full_lifecycle_history() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.repairs();
        let r = repo.create(ticket()).await.unwrap();

        let steps = [
            (InProgress, "opened"),
            (AwaitingParts, "part ordered"),
            (InProgress, "part in"),
            (Completed, "tested"),
            (Delivered, "handed over"),
        ];
        for (to, note) in steps {
            repo.transition(r.id, to, Some(note), Some("tech-1")).await.unwrap();
        }

        let history = repo.history(r.id).await.unwrap();
        let pairs: Vec<_> = history.iter().map(|h| (h.old_status, h.new_status)).collect();
        assert_eq!(
            pairs,
            vec![
                (Some(Waiting), InProgress),
                (Some(InProgress), AwaitingParts),
                (Some(AwaitingParts), InProgress),
                (Some(InProgress), Completed),
                (Some(Completed), Delivered),
            ]
        );
        assert_eq!(history[3].notes.as_deref(), Some("tested"));
        assert_eq!(history[4].changed_by.as_deref(), Some("tech-1"));

        let delivered = repo.get(r.id).await.unwrap().unwrap();
        assert_eq!(delivered.delivery_date, Some(today()));
        assert_eq!(delivered.actual_days, Some(0));
    }

    #[tokio::test]
    async fn test_illegal_transitions() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.repairs();
        let r = repo.create(ticket()).await.unwrap();

        let err = repo.transition(r.id, Delivered, None, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);
        let err = repo.transition(r.id, Waiting, None, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);

        repo.transition(r.id, Cancelled, None, None).await.unwrap();
        let err = repo.transition(r.id, InProgress, None, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);

        let history = repo.history(r.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].notes.as_deref(),
            Some("Status changed from waiting to cancelled")
        );

        let err = repo.transition(999, InProgress, None, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_costs_locked_after_delivery() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.repairs();
        let r = repo.create(ticket()).await.unwrap();

        let costs = RepairCosts {
            actual_cost: Money::from_major(450),
            parts_cost: Money::from_major(300),
            labor_cost: Money::from_major(150),
        };
        let updated = repo.set_costs(r.id, costs).await.unwrap();
        assert_eq!(updated.actual_cost, Money::from_major(450));

        repo.transition(r.id, InProgress, None, None).await.unwrap();
        repo.transition(r.id, Completed, None, None).await.unwrap();
        repo.transition(r.id, Delivered, None, None).await.unwrap();

        let err = repo.set_costs(r.id, costs).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_update_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.repairs();
        let a = repo.create(ticket()).await.unwrap();
        repo.create(NewRepair {
            customer_name: "Sara".into(),
            device_type: "Samsung".into(),
            device_model: Some("Galaxy S21".into()),
            priority: RepairPriority::Urgent,
            ..Default::default()
        })
        .await
        .unwrap();

        let updated = repo
            .update(a.id, RepairPatch {
                technician: Some("Mahmoud".into()),
                data_recovered: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.technician.as_deref(), Some("Mahmoud"));
        assert!(updated.data_recovered);
        assert_eq!(updated.device_model.as_deref(), Some("iPhone 13"));

        let urgent = repo
            .list(&RepairFilter {
                priority: Some(RepairPriority::Urgent),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(urgent.len(), 1);

        let by_text = repo
            .list(&RepairFilter {
                text: Some("galaxy".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_text.len(), 1);
        assert_eq!(by_text[0].customer_name, "Sara");

        let all = repo.list(&RepairFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].id > all[1].id);
    }
}
