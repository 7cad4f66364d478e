//! PostgreSQL ledger store
//!
//! `apply_transfer` locks both account rows with `SELECT ... FOR UPDATE` in id
//! order, so two transfers touching the same pair cannot deadlock, and checks
//! every precondition before either UPDATE runs. The `balance >= 0` CHECK on
//! the table is the last line behind the in-transaction balance check.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::error::LedgerError;
use super::models::{Account, AccountId, Key, KeyId, KeyType, NewAccount};
use super::store::LedgerStore;
use crate::money::Amount;

const ACCOUNT_COLUMNS: &str = r#"
    a.id, a.user_id, u.name AS holder_name, u.tax_id AS holder_tax_id,
    a.balance, a.agency, a.bank, a.blocked_at, a.created_at, a.updated_at, a.deleted_at
"#;

const KEY_COLUMNS: &str = "id, account_id, name, key_type, created_at, updated_at";

pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_account(row: &PgRow) -> Result<Account, LedgerError> {
        Ok(Account {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            holder_name: row.try_get("holder_name")?,
            holder_tax_id: row.try_get("holder_tax_id")?,
            balance: row.try_get("balance")?,
            agency: row.try_get("agency")?,
            bank: row.try_get("bank")?,
            blocked_at: row.try_get("blocked_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }

    fn row_to_key(row: &PgRow) -> Result<Key, LedgerError> {
        let key_type: String = row.try_get("key_type")?;
        let key_type = key_type
            .parse::<KeyType>()
            .map_err(LedgerError::Database)?;

        Ok(Key {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            name: row.try_get("name")?,
            key_type,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Map unique violations to `DuplicateKey`, everything else to `Database`
fn key_write_error(e: sqlx::Error) -> LedgerError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => LedgerError::DuplicateKey,
        _ => LedgerError::from(e),
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn find_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a JOIN users u ON u.id = a.user_id WHERE a.id = $1"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;
        Self::row_to_account(&row)
    }

    async fn find_account_by_alias(&self, alias: &str) -> Result<Account, LedgerError> {
        let sql = format!(
            r#"
            SELECT {ACCOUNT_COLUMNS}
            FROM keys k
            JOIN accounts a ON a.id = k.account_id
            JOIN users u ON u.id = a.user_id
            WHERE k.name = $1
            "#
        );
        let row = sqlx::query(&sql)
            .bind(alias)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LedgerError::KeyNotFound)?;
        Self::row_to_account(&row)
    }

    async fn is_account_active(&self, id: AccountId) -> Result<bool, LedgerError> {
        let active = sqlx::query_scalar::<_, bool>(
            "SELECT (blocked_at IS NULL AND deleted_at IS NULL) FROM accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::AccountNotFound(id))?;
        Ok(active)
    }

    async fn apply_transfer(
        &self,
        sender: AccountId,
        receiver: AccountId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if sender == receiver {
            return Err(LedgerError::SameAccount);
        }

        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, balance, blocked_at IS NOT NULL AS blocked
            FROM accounts
            WHERE id = ANY($1) AND deleted_at IS NULL
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(vec![sender, receiver])
        .fetch_all(&mut *tx)
        .await?;

        let mut sender_row = None;
        let mut receiver_row = None;
        for row in &rows {
            let id: Uuid = row.try_get("id")?;
            let balance: Decimal = row.try_get("balance")?;
            let blocked: bool = row.try_get("blocked")?;
            if id == sender {
                sender_row = Some((balance, blocked));
            } else if id == receiver {
                receiver_row = Some(blocked);
            }
        }

        // Early returns drop `tx`, which rolls back and releases the locks
        let (sender_balance, sender_blocked) =
            sender_row.ok_or(LedgerError::AccountNotFound(sender))?;
        if sender_blocked {
            return Err(LedgerError::SenderBlocked);
        }
        if sender_balance < amount.value() {
            return Err(LedgerError::InsufficientBalance);
        }
        let receiver_blocked = receiver_row.ok_or(LedgerError::AccountNotFound(receiver))?;
        if receiver_blocked {
            return Err(LedgerError::ReceiverBlocked);
        }

        sqlx::query("UPDATE accounts SET balance = balance - $1, updated_at = NOW() WHERE id = $2")
            .bind(amount.value())
            .bind(sender)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE accounts SET balance = balance + $1, updated_at = NOW() WHERE id = $2")
            .bind(amount.value())
            .bind(receiver)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(%sender, %receiver, amount = %amount, "Ledger transfer applied");
        Ok(())
    }

    async fn set_blocked(&self, id: AccountId, blocked: bool) -> Result<Account, LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET blocked_at = CASE WHEN $2 THEN COALESCE(blocked_at, NOW()) ELSE NULL END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(blocked)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::AccountNotFound(id));
        }
        self.find_account(id).await
    }

    async fn open_account(&self, new: NewAccount) -> Result<Account, LedgerError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, tax_id, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(new.user_id)
        .bind(&new.holder_name)
        .bind(&new.holder_tax_id)
        .execute(&mut *tx)
        .await?;

        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO accounts (id, user_id, balance, agency, bank, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(new.user_id)
        .bind(new.balance)
        .bind(&new.agency)
        .bind(&new.bank)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.find_account(id).await
    }

    async fn insert_key(&self, key: Key) -> Result<Key, LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO keys (id, account_id, name, key_type, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(key.id)
        .bind(key.account_id)
        .bind(&key.name)
        .bind(key.key_type.as_str())
        .bind(key.created_at)
        .bind(key.updated_at)
        .execute(&self.pool)
        .await
        .map_err(key_write_error)?;
        Ok(key)
    }

    async fn find_key(&self, id: KeyId) -> Result<Key, LedgerError> {
        let sql = format!("SELECT {KEY_COLUMNS} FROM keys WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LedgerError::KeyIdNotFound(id))?;
        Self::row_to_key(&row)
    }

    async fn find_key_by_name(&self, name: &str) -> Result<Key, LedgerError> {
        let sql = format!("SELECT {KEY_COLUMNS} FROM keys WHERE name = $1");
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LedgerError::KeyNotFound)?;
        Self::row_to_key(&row)
    }

    async fn list_keys(&self, account_id: AccountId) -> Result<Vec<Key>, LedgerError> {
        let sql = format!("SELECT {KEY_COLUMNS} FROM keys WHERE account_id = $1 ORDER BY created_at");
        let rows = sqlx::query(&sql)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_key).collect()
    }

    async fn update_key(&self, id: KeyId, name: &str, key_type: KeyType) -> Result<Key, LedgerError> {
        let sql = format!(
            "UPDATE keys SET name = $2, key_type = $3, updated_at = NOW() WHERE id = $1 RETURNING {KEY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(name)
            .bind(key_type.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(key_write_error)?
            .ok_or(LedgerError::KeyIdNotFound(id))?;
        Self::row_to_key(&row)
    }

    async fn delete_key(&self, id: KeyId) -> Result<(), LedgerError> {
        let result = sqlx::query("DELETE FROM keys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::KeyIdNotFound(id));
        }
        Ok(())
    }
}
