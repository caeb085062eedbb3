use crate::domain::jobs::NarrationMode;
use crate::domain::synthesis::{Narration, NarrationStatus};
use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub struct NarrationRepository {
    pool: Arc<DbPool>,
}

impl NarrationRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub async fn find(&self, account_id: Uuid, record_key: &str) -> AppResult<Option<Narration>> {
        let pool = self.pool.as_ref();
        let narration = sqlx::query_as::<_, Narration>(
            "SELECT * FROM narrations WHERE account_id = $1 AND record_key = $2",
        )
        .bind(account_id)
        .bind(record_key)
        .fetch_optional(pool)
        .await?;

        Ok(narration)
    }

    /// Upsert the record into `queued`, clearing any previous terminal result.
    pub async fn upsert_queued(
        &self,
        account_id: Uuid,
        record_key: &str,
        mode: NarrationMode,
    ) -> AppResult<Narration> {
        let pool = self.pool.as_ref();
        let id = Uuid::new_v4();
        let now = Utc::now();

        let narration = sqlx::query_as::<_, Narration>(
            r#"
            INSERT INTO narrations (id, account_id, record_key, status, mode, created_at, updated_at)
            VALUES ($1, $2, $3, 'queued', $4, $5, $5)
            ON CONFLICT (account_id, record_key) DO UPDATE SET
                status = 'queued',
                mode = EXCLUDED.mode,
                audio_data = NULL,
                first_chunk_data = NULL,
                error_message = NULL,
                generation_started_at = NULL,
                generation_completed_at = NULL,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(account_id)
        .bind(record_key)
        .bind(mode)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(narration)
    }

    /// Enter `processing` and stamp the generation start time. Returns false
    /// when the record went terminal since it was read, so a racing cancel is
    /// not overwritten.
    pub async fn mark_processing(&self, narration_id: Uuid) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let now = Utc::now();

        let updated = sqlx::query(
            r#"
            UPDATE narrations
            SET status = 'processing', generation_started_at = $2, updated_at = $2,
                error_message = NULL
            WHERE id = $1 AND status IN ('queued', 'processing', 'failed')
            "#,
        )
        .bind(narration_id)
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    /// Persist the first synthesized chunk so observers can preview audio early.
    pub async fn store_first_chunk(
        &self,
        narration_id: Uuid,
        mime_type: &str,
        chunk: &[u8],
    ) -> AppResult<()> {
        let pool = self.pool.as_ref();
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE narrations
            SET first_chunk_data = $2, mime_type = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(narration_id)
        .bind(chunk)
        .bind(mime_type)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Commit the finished audio. The conditional on status keeps a result from
    /// overwriting a record the caller canceled mid-flight.
    pub async fn mark_ready(
        &self,
        narration_id: Uuid,
        mime_type: &str,
        audio_data: &[u8],
        content_hash: &str,
    ) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let now = Utc::now();

        let updated = sqlx::query(
            r#"
            UPDATE narrations
            SET status = 'ready', audio_data = $2, mime_type = $3, content_hash = $4,
                generation_completed_at = $5, updated_at = $5
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(narration_id)
        .bind(audio_data)
        .bind(mime_type)
        .bind(content_hash)
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    pub async fn mark_failed(&self, narration_id: Uuid, reason: &str) -> AppResult<()> {
        let pool = self.pool.as_ref();
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE narrations
            SET status = 'failed', error_message = $2, generation_completed_at = $3, updated_at = $3
            WHERE id = $1 AND status IN ('queued', 'processing')
            "#,
        )
        .bind(narration_id)
        .bind(reason)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Client-initiated abort. Only queued/processing records can be canceled.
    pub async fn cancel(&self, account_id: Uuid, record_key: &str) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let now = Utc::now();

        let updated = sqlx::query(
            r#"
            UPDATE narrations
            SET status = 'canceled', updated_at = $3
            WHERE account_id = $1 AND record_key = $2 AND status IN ('queued', 'processing')
            "#,
        )
        .bind(account_id)
        .bind(record_key)
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    /// Record the ledger charge exactly once. Returns false when a charge
    /// timestamp already exists, which tells the caller to skip the ledger.
    pub async fn record_charge(&self, narration_id: Uuid, credits: i32) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let now = Utc::now();

        let updated = sqlx::query(
            r#"
            UPDATE narrations
            SET credits_charged = $2, credits_charged_at = $3, updated_at = $3
            WHERE id = $1 AND credits_charged_at IS NULL
            "#,
        )
        .bind(narration_id)
        .bind(credits)
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    /// Fail `processing` records whose generation started before the cutoff and
    /// that no worker ever finished. Returns the number of records swept.
    pub async fn fail_stale_processing(&self, started_before: DateTime<Utc>) -> AppResult<i64> {
        let pool = self.pool.as_ref();
        let now = Utc::now();

        let swept = sqlx::query(
            r#"
            UPDATE narrations
            SET status = 'failed', error_message = 'stale processing record',
                generation_completed_at = $2, updated_at = $2
            WHERE status = 'processing' AND generation_started_at < $1
            "#,
        )
        .bind(started_before)
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(swept as i64)
    }
}
