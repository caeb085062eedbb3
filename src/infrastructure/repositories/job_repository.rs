use crate::domain::jobs::{Job, JobStatus, JobType};
use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct JobRepository {
    pool: Arc<DbPool>,
}

impl JobRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Upsert a job keyed by its dedupe key.
    ///
    /// A key already held by a queued or processing job only has its payload
    /// refreshed; in-flight work is never duplicated. Keys held by completed,
    /// failed or dead-lettered jobs are rescheduled from scratch, so a record
    /// that went terminal can be requested again under the same key.
    pub async fn enqueue(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
        dedupe_key: &str,
        max_attempts: i32,
    ) -> AppResult<Job> {
        let pool = self.pool.as_ref();
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (id, job_type, payload, dedupe_key, status, attempts, max_attempts, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'queued', 0, $5, $6, $6)
            ON CONFLICT (dedupe_key) DO UPDATE SET
                payload = EXCLUDED.payload,
                updated_at = EXCLUDED.updated_at,
                status = CASE
                    WHEN jobs.status IN ('queued', 'processing') THEN jobs.status
                    ELSE 'queued'
                END,
                attempts = CASE
                    WHEN jobs.status IN ('queued', 'processing') THEN jobs.attempts
                    ELSE 0
                END,
                last_error = CASE
                    WHEN jobs.status IN ('queued', 'processing') THEN jobs.last_error
                    ELSE NULL
                END,
                completed_at = CASE
                    WHEN jobs.status IN ('queued', 'processing') THEN jobs.completed_at
                    ELSE NULL
                END
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(job_type)
        .bind(payload)
        .bind(dedupe_key)
        .bind(max_attempts)
        .bind(now)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            job_id = %job.id,
            job_type = %job_type,
            dedupe_key = dedupe_key,
            status = %job.status,
            "Job enqueued"
        );

        Ok(job)
    }

    /// Claim up to `limit` jobs of a type for this worker.
    ///
    /// Candidates are selected oldest-first, then each is flipped to
    /// `processing` by a conditional update that only succeeds while the row is
    /// still claimable (queued, or processing under an expired lease). Only the
    /// rows this caller actually won are returned; a concurrent worker racing
    /// for the same row loses the conditional update and skips it.
    pub async fn claim_batch(
        &self,
        job_type: JobType,
        lease_owner: &str,
        limit: i64,
        lease_duration_secs: i64,
    ) -> AppResult<Vec<Job>> {
        let pool = self.pool.as_ref();
        let now = chrono::Utc::now();
        let lease_cutoff = now - chrono::Duration::seconds(lease_duration_secs);

        let candidate_ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM jobs
            WHERE job_type = $1
              AND (status = 'queued' OR (status = 'processing' AND updated_at < $2))
            ORDER BY created_at ASC
            LIMIT $3
            "#,
        )
        .bind(job_type)
        .bind(lease_cutoff)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        let mut claimed = Vec::new();
        for (id,) in candidate_ids {
            let job = sqlx::query_as::<_, Job>(
                r#"
                UPDATE jobs
                SET status = 'processing', lease_owner = $2, updated_at = $3
                WHERE id = $1
                  AND (status = 'queued' OR (status = 'processing' AND updated_at < $4))
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(lease_owner)
            .bind(now)
            .bind(lease_cutoff)
            .fetch_optional(pool)
            .await?;

            if let Some(job) = job {
                claimed.push(job);
            }
        }

        if !claimed.is_empty() {
            tracing::info!(
                job_type = %job_type,
                lease_owner = lease_owner,
                claimed = claimed.len(),
                "Claimed job batch"
            );
        }

        Ok(claimed)
    }

    /// Mark a claimed job as completed
    pub async fn complete(&self, job_id: Uuid, lease_owner: &str) -> AppResult<()> {
        let pool = self.pool.as_ref();
        let now = chrono::Utc::now();

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', completed_at = $3, updated_at = $3
            WHERE id = $1 AND lease_owner = $2
            "#,
        )
        .bind(job_id)
        .bind(lease_owner)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Record a handler failure: requeue while attempts remain, else dead-letter.
    pub async fn fail(&self, job: &Job, lease_owner: &str, error_message: &str) -> AppResult<JobStatus> {
        let pool = self.pool.as_ref();
        let now = chrono::Utc::now();
        let attempts = job.attempts + 1;
        let next_status = if attempts >= job.max_attempts {
            JobStatus::DeadLetter
        } else {
            JobStatus::Queued
        };

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $3, attempts = $4, last_error = $5, updated_at = $6
            WHERE id = $1 AND lease_owner = $2
            "#,
        )
        .bind(job.id)
        .bind(lease_owner)
        .bind(next_status)
        .bind(attempts)
        .bind(error_message)
        .bind(now)
        .execute(pool)
        .await?;

        tracing::warn!(
            job_id = %job.id,
            job_type = %job.job_type,
            attempts = attempts,
            max_attempts = job.max_attempts,
            next_status = %next_status,
            error = error_message,
            "Job failed"
        );

        Ok(next_status)
    }

    pub async fn count_by_status(&self, job_type: JobType, status: JobStatus) -> AppResult<i64> {
        let pool = self.pool.as_ref();
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE job_type = $1 AND status = $2")
                .bind(job_type)
                .bind(status)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }

    /// Reset up to `limit` dead-lettered jobs of a type back to queued.
    pub async fn replay(&self, job_type: JobType, limit: i64, reason: &str) -> AppResult<i64> {
        let pool = self.pool.as_ref();
        let now = chrono::Utc::now();

        let replayed = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'queued', attempts = 0, last_error = NULL, replay_reason = $3, updated_at = $4
            WHERE id IN (
                SELECT id FROM jobs
                WHERE job_type = $1 AND status = 'dead_letter'
                ORDER BY updated_at ASC
                LIMIT $2
            )
            "#,
        )
        .bind(job_type)
        .bind(limit)
        .bind(reason)
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();

        tracing::info!(
            job_type = %job_type,
            replayed = replayed,
            reason = reason,
            "Replayed dead-lettered jobs"
        );

        Ok(replayed as i64)
    }

    pub async fn find_by_dedupe_key(&self, dedupe_key: &str) -> AppResult<Option<Job>> {
        let pool = self.pool.as_ref();
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE dedupe_key = $1")
            .bind(dedupe_key)
            .fetch_optional(pool)
            .await?;

        Ok(job)
    }
}
