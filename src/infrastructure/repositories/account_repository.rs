use crate::infrastructure::db::DbPool;
use crate::{domain::account::Account, error::AppResult};
use std::sync::Arc;
use uuid::Uuid;

pub struct AccountRepository {
    pool: Arc<DbPool>,
}

impl AccountRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Find account by ID
    pub async fn find_by_id(&self, account_id: Uuid) -> AppResult<Option<Account>> {
        let pool = self.pool.as_ref();
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(pool)
            .await?;

        Ok(account)
    }

    /// Accounts that receive the weekly digest
    pub async fn list_digest_enabled(&self) -> AppResult<Vec<Account>> {
        let pool = self.pool.as_ref();
        let accounts = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE digest_enabled = TRUE ORDER BY created_at",
        )
        .fetch_all(pool)
        .await?;

        Ok(accounts)
    }
}
