//! PostgreSQL transaction log
//!
//! Status updates are CAS operations: `WHERE id = $1 AND status = PENDING`.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::error::TransactionLogError;
use super::state::TransactionStatus;
use super::store::TransactionLog;
use super::types::{NewTransaction, Stamp, Transaction, TransactionId};

const COLUMNS: &str = r#"
    id, account_id, receiver, value, status, err_message, idempotency_key,
    created_at, updated_at, processed_at
"#;

pub struct PgTransactionLog {
    pool: PgPool,
}

impl PgTransactionLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &PgRow) -> Result<Transaction, TransactionLogError> {
        let id: String = row.try_get("id")?;
        let id: TransactionId = id
            .parse()
            .map_err(|_| TransactionLogError::Database(format!("Invalid transaction id: {}", id)))?;

        let status_id: i16 = row.try_get("status")?;
        let status = TransactionStatus::from_id(status_id).ok_or_else(|| {
            TransactionLogError::Database(format!("Invalid status ID: {}", status_id))
        })?;

        Ok(Transaction {
            id,
            account_id: row.try_get("account_id")?,
            receiver: row.try_get("receiver")?,
            value: row.try_get("value")?,
            status,
            err_message: row.try_get("err_message")?,
            idempotency_key: row.try_get("idempotency_key")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            processed_at: row.try_get("processed_at")?,
        })
    }

    async fn current_status(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionStatus>, TransactionLogError> {
        let status = sqlx::query_scalar::<_, i16>("SELECT status FROM transactions WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(status.and_then(TransactionStatus::from_id))
    }
}

#[async_trait]
impl TransactionLog for PgTransactionLog {
    async fn create(&self, new: NewTransaction) -> Result<Transaction, TransactionLogError> {
        let tx = Transaction::pending(new);

        let result = sqlx::query(
            r#"
            INSERT INTO transactions
                (id, account_id, receiver, value, status, idempotency_key, created_at, updated_at)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(tx.id.to_string())
        .bind(tx.account_id)
        .bind(tx.receiver)
        .bind(tx.value)
        .bind(tx.status.id())
        .bind(&tx.idempotency_key)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(tx),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                TransactionLogError::DuplicateKey(tx.idempotency_key.clone().unwrap_or_default()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, TransactionLogError> {
        let sql = format!("SELECT {COLUMNS} FROM transactions WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Transaction>, TransactionLogError> {
        let sql = format!("SELECT {COLUMNS} FROM transactions WHERE idempotency_key = $1");
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn list(&self, ids: &[TransactionId]) -> Result<Vec<Transaction>, TransactionLogError> {
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let sql = format!("SELECT {COLUMNS} FROM transactions WHERE id = ANY($1) ORDER BY id");
        let rows = sqlx::query(&sql).bind(ids).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_record).collect()
    }

    async fn mark_failed(&self, id: TransactionId, error: &str) -> Result<bool, TransactionLogError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $1, err_message = $2, updated_at = NOW()
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(TransactionStatus::Failed.id())
        .bind(error)
        .bind(id.to_string())
        .bind(TransactionStatus::Pending.id())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.current_status(id).await? {
            Some(_) => Ok(false),
            None => Err(TransactionLogError::NotFound(id)),
        }
    }

    async fn mark_processed(&self, id: TransactionId) -> Result<Stamp, TransactionLogError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $1, processed_at = NOW(), updated_at = NOW()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(TransactionStatus::Completed.id())
        .bind(id.to_string())
        .bind(TransactionStatus::Pending.id())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(Stamp::Stamped);
        }
        match self.current_status(id).await? {
            Some(TransactionStatus::Completed) => Ok(Stamp::AlreadyProcessed),
            Some(from) => Err(TransactionLogError::InvalidTransition {
                from,
                to: TransactionStatus::Completed,
            }),
            None => Err(TransactionLogError::NotFound(id)),
        }
    }
}
