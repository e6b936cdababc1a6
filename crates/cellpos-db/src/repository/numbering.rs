//! Document number allocation inside the enclosing transaction.

use chrono::NaiveDate;
use sqlx::SqliteConnection;
use tracing::debug;

use cellpos_core::numbering::DocumentKind;

use crate::error::DbResult;

/// Allocates the next `PREFIX-YYYYMMDD-NNNN` number for `day`.
///
/// Must run on the transaction that inserts the document; the write gate
/// keeps allocation and insert serial. Ordering by length first keeps the
/// counter correct past `9999`.
pub(crate) async fn allocate(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    day: NaiveDate,
) -> DbResult<String> {
    let prefix = kind.day_prefix(day);
    let sql = match kind {
        DocumentKind::Sale => {
            "SELECT sale_number FROM sales WHERE sale_number LIKE ?1 || '%' \
             ORDER BY length(sale_number) DESC, sale_number DESC LIMIT 1"
        }
        DocumentKind::WalletTransaction => {
            "SELECT transaction_number FROM wallet_transactions WHERE transaction_number LIKE ?1 || '%' \
             ORDER BY length(transaction_number) DESC, transaction_number DESC LIMIT 1"
        }
    };

    let last: Option<String> = sqlx::query_scalar(sql)
        .bind(&prefix)
        .fetch_optional(&mut *conn)
        .await?;

    let number = kind.next(day, last.as_deref())?;
    debug!(number = %number, "Allocated document number");
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_allocate_counts_per_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let mut tx = db.begin().await.unwrap();
        let first = allocate(tx.conn(), DocumentKind::WalletTransaction, day).await.unwrap();
        assert_eq!(first, "WT-20240301-0001");

        for number in ["WT-20240301-0009", "WT-20240301-10000", "WT-20240302-0050"] {
            sqlx::query(
                "INSERT INTO wallet_transactions (id, transaction_number, provider, transaction_type, amount, net_amount) \
                 VALUES (?1, ?2, 'orange', 'deposit', 1, 1)",
            )
            .bind(number)
            .bind(number)
            .execute(tx.conn())
            .await
            .unwrap();
        }

        let next = allocate(tx.conn(), DocumentKind::WalletTransaction, day).await.unwrap();
        assert_eq!(next, "WT-20240301-10001");

        let sale = allocate(tx.conn(), DocumentKind::Sale, day).await.unwrap();
        assert_eq!(sale, "S-20240301-0001");
    }
}
