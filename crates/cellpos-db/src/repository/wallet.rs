//! # Wallet Ledger
//!
//! Electronic wallet postings per provider. `amount` is stored signed, so a
//! provider's balance is `SUM(amount)`.
//!
//! ## Cross-Provider Transfer
//! ```text
//! transfer_between(vodafone → orange, 300, fees 5)
//!
//!   WT-…-0007  vodafone  transfer  −305   transfer_id = T
//!   WT-…-0008  orange    transfer  +300   transfer_id = T
//!
//! Both rows commit together or not at all.
//! ```

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, info};

use cellpos_core::numbering::{new_id, DocumentKind};
use cellpos_core::validation::clean_optional;
use cellpos_core::wallet_rules::post_amounts;
use cellpos_core::{
    BalanceScope, FlowDirection, Money, NewWalletTx, ValidationError, WalletFilter, WalletProvider,
    WalletTransaction, WalletTransfer, WalletTxStatus, WalletTxType,
};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::numbering::allocate;
use crate::repository::now;

const WALLET_COLUMNS: &str = "id, transaction_number, provider, service_type, transaction_type, \
     amount, fees, net_amount, customer_name, customer_phone, sender_number, recipient_number, \
     reference, external_reference, transfer_id, status, notes, cashier, created_at";

const DEFAULT_HISTORY_LIMIT: i64 = 500;

/// Balance of one provider account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WalletBalance {
    pub provider: WalletProvider,
    pub balance: Money,
    pub transactions: i64,
}

#[derive(Debug, Clone)]
pub struct WalletLedger {
    db: Database,
}

impl WalletLedger {
    pub fn new(db: Database) -> Self {
        WalletLedger { db }
    }

    /// Posts one wallet transaction.
    ///
    /// ## Errors
    /// * `Validation` - principal not positive, negative fees, or a missing
    ///   recipient for `send`/`transfer`
    pub async fn post(&self, new: NewWalletTx) -> DbResult<WalletTransaction> {
        if new.transaction_type.requires_recipient()
            && clean_optional(new.recipient_number.clone()).is_none()
        {
            return Err(ValidationError::required("recipient_number").into());
        }
        let posting = post_amounts(new.transaction_type, new.principal, new.fees, new.direction)?;

        let mut tx = self.db.begin().await?;
        let conn = tx.conn();
        let at = now();
        let row = WalletTransaction {
            id: new_id(),
            transaction_number: allocate(conn, DocumentKind::WalletTransaction, at.date()).await?,
            provider: new.provider,
            service_type: clean_optional(new.service_type),
            transaction_type: new.transaction_type,
            amount: posting.amount,
            fees: new.fees,
            net_amount: posting.net_amount,
            customer_name: clean_optional(new.customer_name),
            customer_phone: clean_optional(new.customer_phone),
            sender_number: clean_optional(new.sender_number),
            recipient_number: clean_optional(new.recipient_number),
            reference: clean_optional(new.reference),
            external_reference: clean_optional(new.external_reference),
            transfer_id: None,
            status: new.status,
            notes: clean_optional(new.notes),
            cashier: clean_optional(new.cashier),
            created_at: at,
        };
        insert_in(conn, &row).await?;
        tx.commit().await?;

        info!(
            number = %row.transaction_number,
            provider = %row.provider,
            kind = %row.transaction_type,
            "Wallet transaction posted"
        );
        Ok(row)
    }

    /// Moves `principal` from one provider account to another as two rows
    /// sharing a `transfer_id`. Fees are charged on the source side.
    pub async fn transfer_between(
        &self,
        transfer: WalletTransfer,
    ) -> DbResult<(WalletTransaction, WalletTransaction)> {
        if transfer.from == transfer.to {
            return Err(ValidationError::invalid_format(
                "to",
                "must differ from the source provider",
            )
            .into());
        }
        let outflow = post_amounts(
            WalletTxType::Transfer,
            transfer.principal,
            transfer.fees,
            Some(FlowDirection::Outflow),
        )?;
        let inflow = post_amounts(
            WalletTxType::Transfer,
            transfer.principal,
            Money::zero(),
            Some(FlowDirection::Inflow),
        )?;

        let transfer_id = new_id();
        let notes = clean_optional(transfer.notes);
        let cashier = clean_optional(transfer.cashier);

        let mut tx = self.db.begin().await?;
        let conn = tx.conn();
        let at = now();

        let mut legs = Vec::with_capacity(2);
        for (provider, posting, fees, counterparty) in [
            (transfer.from, outflow, transfer.fees, transfer.to),
            (transfer.to, inflow, Money::zero(), transfer.from),
        ] {
            let (sender_number, recipient_number) = match posting.direction {
                FlowDirection::Outflow => (None, Some(counterparty.to_string())),
                FlowDirection::Inflow => (Some(counterparty.to_string()), None),
            };
            let row = WalletTransaction {
                id: new_id(),
                transaction_number: allocate(conn, DocumentKind::WalletTransaction, at.date()).await?,
                provider,
                service_type: None,
                transaction_type: WalletTxType::Transfer,
                amount: posting.amount,
                fees,
                net_amount: posting.net_amount,
                customer_name: None,
                customer_phone: None,
                sender_number,
                recipient_number,
                reference: None,
                external_reference: None,
                transfer_id: Some(transfer_id.clone()),
                status: WalletTxStatus::Completed,
                notes: notes.clone(),
                cashier: cashier.clone(),
                created_at: at,
            };
            insert_in(conn, &row).await?;
            legs.push(row);
        }
        tx.commit().await?;

        let inbound = legs.pop();
        let outbound = legs.pop();
        match (outbound, inbound) {
            (Some(outbound), Some(inbound)) => {
                info!(
                    from = %outbound.provider,
                    to = %inbound.provider,
                    transfer_id = %transfer_id,
                    "Wallet transfer posted"
                );
                Ok((outbound, inbound))
            }
            _ => Err(DbError::Internal("transfer legs missing".to_string())),
        }
    }

    /// Marks a pending transaction failed. The row stays in the ledger.
    pub async fn void(&self, id: &str) -> DbResult<WalletTransaction> {
        let mut tx = self.db.begin().await?;
        let conn = tx.conn();
        let row = get_in(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("WalletTransaction", id))?;
        if row.status != WalletTxStatus::Pending {
            return Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: vec![WalletTxStatus::Pending.to_string()],
            }
            .into());
        }

        sqlx::query("UPDATE wallet_transactions SET status = ?1 WHERE id = ?2")
            .bind(WalletTxStatus::Failed)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        tx.commit().await?;

        debug!(number = %row.transaction_number, "Wallet transaction voided");
        Ok(WalletTransaction {
            status: WalletTxStatus::Failed,
            ..row
        })
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<WalletTransaction>> {
        let row = sqlx::query_as::<_, WalletTransaction>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallet_transactions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row)
    }

    /// Balance of every provider, including those with no rows yet.
    pub async fn balances(&self, scope: BalanceScope) -> DbResult<Vec<WalletBalance>> {
        let sql = match scope {
            BalanceScope::All => {
                "SELECT provider, COALESCE(SUM(amount), 0), COUNT(*) \
                 FROM wallet_transactions GROUP BY provider"
            }
            BalanceScope::CompletedOnly => {
                "SELECT provider, COALESCE(SUM(amount), 0), COUNT(*) \
                 FROM wallet_transactions WHERE status = 'completed' GROUP BY provider"
            }
        };
        let rows: Vec<(WalletProvider, Money, i64)> =
            sqlx::query_as(sql).fetch_all(self.db.pool()).await?;

        let balances = WalletProvider::ALL
            .iter()
            .map(|provider| {
                rows.iter()
                    .find(|(p, _, _)| p == provider)
                    .map(|&(provider, balance, transactions)| WalletBalance {
                        provider,
                        balance,
                        transactions,
                    })
                    .unwrap_or(WalletBalance {
                        provider: *provider,
                        balance: Money::zero(),
                        transactions: 0,
                    })
            })
            .collect();
        Ok(balances)
    }

    pub async fn balance(&self, provider: WalletProvider, scope: BalanceScope) -> DbResult<Money> {
        let balance = self
            .balances(scope)
            .await?
            .into_iter()
            .find(|b| b.provider == provider)
            .map(|b| b.balance)
            .unwrap_or_default();
        Ok(balance)
    }

    /// Transactions matching `filter`, newest first.
    pub async fn history(&self, filter: &WalletFilter) -> DbResult<Vec<WalletTransaction>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {WALLET_COLUMNS} FROM wallet_transactions WHERE 1 = 1"
        ));
        if let Some(provider) = filter.provider {
            qb.push(" AND provider = ").push_bind(provider);
        }
        if let Some(kind) = filter.transaction_type {
            qb.push(" AND transaction_type = ").push_bind(kind);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(from) = filter.from {
            qb.push(" AND date(created_at) >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND date(created_at) <= ").push_bind(to);
        }
        qb.push(" ORDER BY created_at DESC, transaction_number DESC LIMIT ")
            .push_bind(filter.limit.unwrap_or(DEFAULT_HISTORY_LIMIT));

        let rows = qb
            .build_query_as::<WalletTransaction>()
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows)
    }
}

async fn insert_in(conn: &mut SqliteConnection, row: &WalletTransaction) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO wallet_transactions (
            id, transaction_number, provider, service_type, transaction_type,
            amount, fees, net_amount, customer_name, customer_phone, sender_number,
            recipient_number, reference, external_reference, transfer_id, status,
            notes, cashier, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
        "#,
    )
    .bind(&row.id)
    .bind(&row.transaction_number)
    .bind(row.provider)
    .bind(&row.service_type)
    .bind(row.transaction_type)
    .bind(row.amount)
    .bind(row.fees)
    .bind(row.net_amount)
    .bind(&row.customer_name)
    .bind(&row.customer_phone)
    .bind(&row.sender_number)
    .bind(&row.recipient_number)
    .bind(&row.reference)
    .bind(&row.external_reference)
    .bind(&row.transfer_id)
    .bind(row.status)
    .bind(&row.notes)
    .bind(&row.cashier)
    .bind(row.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<WalletTransaction>> {
    let row = sqlx::query_as::<_, WalletTransaction>(&format!(
        "SELECT {WALLET_COLUMNS} FROM wallet_transactions WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}
