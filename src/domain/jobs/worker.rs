use super::types::{Job, JobType};
use crate::domain::synthesis::SynthesisService;
use crate::infrastructure::repositories::{AccountRepository, JobRepository};
use chrono::{Datelike, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct WorkerConfig {
    pub poll_interval_secs: u64,
    pub batch_size: i64,
    pub lease_duration_secs: i64,
}

/// Single-threaded polling worker. Multiple instances can run against the same
/// database; lease claiming keeps each job with exactly one of them.
pub struct Worker {
    job_repo: Arc<JobRepository>,
    account_repo: Arc<AccountRepository>,
    synthesis_service: Arc<SynthesisService>,
    config: WorkerConfig,
    lease_owner: String,
}

impl Worker {
    pub fn new(
        job_repo: Arc<JobRepository>,
        account_repo: Arc<AccountRepository>,
        synthesis_service: Arc<SynthesisService>,
        config: WorkerConfig,
    ) -> Self {
        let lease_owner = format!("worker-{}", Uuid::new_v4());
        Self {
            job_repo,
            account_repo,
            synthesis_service,
            config,
            lease_owner,
        }
    }

    pub async fn run(self) {
        tracing::info!(
            lease_owner = %self.lease_owner,
            poll_interval_secs = self.config.poll_interval_secs,
            batch_size = self.config.batch_size,
            "Job worker started"
        );

        let mut last_digest_key: Option<String> = None;
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            if let Err(e) = self.tick(&mut last_digest_key).await {
                tracing::error!(error = %e, "Worker tick failed");
            }
        }
    }

    async fn tick(&self, last_digest_key: &mut Option<String>) -> anyhow::Result<()> {
        let digest_key = current_digest_key();
        if last_digest_key.as_deref() != Some(&digest_key) {
            self.schedule_digests(&digest_key).await?;
            *last_digest_key = Some(digest_key);
        }

        for job_type in [JobType::AudioRequested, JobType::DigestGenerate] {
            let batch = self
                .job_repo
                .claim_batch(
                    job_type,
                    &self.lease_owner,
                    self.config.batch_size,
                    self.config.lease_duration_secs,
                )
                .await?;

            for job in batch {
                self.dispatch(&job).await;
            }
        }

        self.synthesis_service.sweep_stale_records().await?;

        Ok(())
    }

    async fn dispatch(&self, job: &Job) {
        let outcome = match job.job_type {
            JobType::AudioRequested => match job.audio_payload() {
                Ok(payload) => self
                    .synthesis_service
                    .process_audio_job(&payload)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(format!("Malformed audio payload: {}", e)),
            },
            JobType::DigestGenerate => match job.digest_payload() {
                Ok(payload) => self
                    .synthesis_service
                    .process_digest_job(&payload)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(format!("Malformed digest payload: {}", e)),
            },
        };

        let result = match outcome {
            Ok(()) => self.job_repo.complete(job.id, &self.lease_owner).await,
            Err(message) => self
                .job_repo
                .fail(job, &self.lease_owner, &message)
                .await
                .map(|_| ()),
        };

        if let Err(e) = result {
            tracing::error!(job_id = %job.id, error = %e, "Failed to record job outcome");
        }
    }

    /// Enqueue one digest job per digest-enabled account for the current
    /// delivery window. The dedupe key makes repeat scheduling a no-op.
    async fn schedule_digests(&self, digest_key: &str) -> anyhow::Result<()> {
        let accounts = self.account_repo.list_digest_enabled().await?;
        if accounts.is_empty() {
            return Ok(());
        }

        tracing::info!(
            digest_key = digest_key,
            accounts = accounts.len(),
            "Scheduling weekly digests"
        );

        for account in accounts {
            if let Err(e) = self
                .synthesis_service
                .schedule_digest(account.id, digest_key)
                .await
            {
                tracing::error!(
                    account_id = %account.id,
                    digest_key = digest_key,
                    error = %e,
                    "Failed to schedule digest"
                );
            }
        }

        Ok(())
    }
}

/// Delivery key for the current weekly window, e.g. `2026-W35`
fn current_digest_key() -> String {
    let week = Utc::now().iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}
