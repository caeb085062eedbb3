use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct EntitlementRecord {
    pub account_id: Uuid,
    pub tokens_used: i32,
    pub cycle_started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct EntitlementRepository {
    pool: Arc<DbPool>,
}

impl EntitlementRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Fetch the ledger row, creating it on first use and resetting the
    /// 30-day cycle when it has expired.
    pub async fn find_or_roll(&self, account_id: Uuid) -> AppResult<EntitlementRecord> {
        let pool = self.pool.as_ref();
        let now = Utc::now();
        let cycle_cutoff = now - chrono::Duration::days(30);

        sqlx::query(
            r#"
            INSERT INTO entitlements (account_id, tokens_used, cycle_started_at, updated_at)
            VALUES ($1, 0, $2, $2)
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(now)
        .execute(pool)
        .await?;

        let record = sqlx::query_as::<_, EntitlementRecord>(
            r#"
            UPDATE entitlements
            SET tokens_used = CASE WHEN cycle_started_at <= $2 THEN 0 ELSE tokens_used END,
                cycle_started_at = CASE WHEN cycle_started_at <= $2 THEN $3 ELSE cycle_started_at END,
                updated_at = $3
            WHERE account_id = $1
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(cycle_cutoff)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(record)
    }

    /// Atomic check-and-increment: one conditional UPDATE that only succeeds
    /// while the new total stays within the tier limit. Two concurrent callers
    /// cannot jointly overspend because the predicate and the increment are one
    /// database-side statement.
    ///
    /// Returns the new `tokens_used` on success, None when the balance was
    /// insufficient.
    pub async fn try_consume(
        &self,
        account_id: Uuid,
        tokens: i32,
        limit: i32,
    ) -> AppResult<Option<i32>> {
        let pool = self.pool.as_ref();
        let now = Utc::now();

        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE entitlements
            SET tokens_used = tokens_used + $2, updated_at = $4
            WHERE account_id = $1 AND tokens_used + $2 <= $3
            RETURNING tokens_used
            "#,
        )
        .bind(account_id)
        .bind(tokens)
        .bind(limit)
        .bind(now)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(used,)| used))
    }
}
