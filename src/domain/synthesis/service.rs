use super::error::SynthesisError;
use super::hash::content_hash;
use super::model::{Narration, NarrationStatus};
use crate::domain::entitlement::{EntitlementService, TokenCost};
use crate::domain::jobs::{
    audio_dedupe_key, AudioJobPayload, DigestJobPayload, JobType, NarrationMode,
};
use crate::domain::script::{self, ScriptSection};
use crate::error::AppError;
use crate::infrastructure::repositories::{
    AudioCacheRepository, CondenserRepository, IssueRepository, JobRepository, MetricRepository,
    NarrationRepository, SpeechRepository, EVENT_CACHE_HIT, EVENT_CACHE_MISS,
    EVENT_SYNTHESIS_FAILURE, EVENT_SYNTHESIS_SUCCESS,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const NARRATION_MIME_TYPE: &str = "audio/mpeg";
const AUDIO_JOB_MAX_ATTEMPTS: i32 = 3;
const DIGEST_WINDOW_DAYS: i64 = 7;
const STALE_SWEEP_AFTER_SECS: i64 = 30 * 60;

fn is_permanent(error: &SynthesisError) -> bool {
    match error {
        SynthesisError::Invalid(_) | SynthesisError::PaymentRequired(_) => true,
        SynthesisError::Provider(e) => e.is_permanent(),
        SynthesisError::Dependency(_) => false,
    }
}

/// Source material for one generation run
struct ScriptSource {
    title: String,
    sender: String,
    date: String,
    sections: Vec<ScriptSection>,
    mode: NarrationMode,
    content_type: &'static str,
}

pub struct SynthesisService {
    issue_repo: Arc<IssueRepository>,
    narration_repo: Arc<NarrationRepository>,
    audio_cache_repo: Arc<AudioCacheRepository>,
    metric_repo: Arc<MetricRepository>,
    job_repo: Arc<JobRepository>,
    entitlement_service: Arc<EntitlementService>,
    speech_repo: Arc<dyn SpeechRepository>,
    condenser_repo: Arc<dyn CondenserRepository>,
    voice: String,
    condense_word_threshold: usize,
    record_stale_after_secs: i64,
}

impl SynthesisService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        issue_repo: Arc<IssueRepository>,
        narration_repo: Arc<NarrationRepository>,
        audio_cache_repo: Arc<AudioCacheRepository>,
        metric_repo: Arc<MetricRepository>,
        job_repo: Arc<JobRepository>,
        entitlement_service: Arc<EntitlementService>,
        speech_repo: Arc<dyn SpeechRepository>,
        condenser_repo: Arc<dyn CondenserRepository>,
        voice: String,
        condense_word_threshold: usize,
        record_stale_after_secs: i64,
    ) -> Self {
        Self {
            issue_repo,
            narration_repo,
            audio_cache_repo,
            metric_repo,
            job_repo,
            entitlement_service,
            speech_repo,
            condenser_repo,
            voice,
            condense_word_threshold,
            record_stale_after_secs,
        }
    }

    /// Caller-facing entry point: schedule narration of one issue.
    ///
    /// Validates the issue, pre-checks the entitlement balance, upserts the
    /// account record as queued and enqueues the deduped job. Repeating the
    /// call while a request is in flight returns the existing record.
    pub async fn request_issue_narration(
        &self,
        account_id: Uuid,
        issue_id: Uuid,
        mode: NarrationMode,
    ) -> Result<Narration, SynthesisError> {
        if mode == NarrationMode::Digest {
            return Err(SynthesisError::Invalid(
                "Digest narrations are scheduled by the digest job, not per issue".to_string(),
            ));
        }

        self.issue_repo
            .find_by_id(issue_id)
            .await
            .map_err(|e| SynthesisError::Dependency(e.to_string()))?
            .ok_or_else(|| SynthesisError::Invalid(format!("Issue {} not found", issue_id)))?;

        let record_key = Narration::issue_record_key(issue_id);

        // In-flight or finished requests are returned as-is; no duplicate work
        if let Some(existing) = self
            .narration_repo
            .find(account_id, &record_key)
            .await
            .map_err(|e| SynthesisError::Dependency(e.to_string()))?
        {
            match existing.status {
                NarrationStatus::Queued | NarrationStatus::Processing | NarrationStatus::Ready => {
                    return Ok(existing);
                }
                NarrationStatus::Failed | NarrationStatus::Canceled => {}
            }
        }

        let cost = TokenCost::for_mode(mode);
        let check = self
            .entitlement_service
            .ensure_available(account_id, cost.0)
            .await?;
        if !check.allowed {
            return Err(SynthesisError::PaymentRequired(
                check
                    .reason
                    .unwrap_or_else(|| "Insufficient tokens".to_string()),
            ));
        }

        let narration = self
            .narration_repo
            .upsert_queued(account_id, &record_key, mode)
            .await
            .map_err(|e| SynthesisError::Dependency(e.to_string()))?;

        let payload = AudioJobPayload {
            issue_id,
            account_id,
            mode,
        };
        self.job_repo
            .enqueue(
                JobType::AudioRequested,
                json!(payload),
                &audio_dedupe_key(issue_id, account_id),
                AUDIO_JOB_MAX_ATTEMPTS,
            )
            .await
            .map_err(|e| SynthesisError::Dependency(e.to_string()))?;

        Ok(narration)
    }

    pub async fn get_narration(
        &self,
        account_id: Uuid,
        issue_id: Uuid,
    ) -> Result<Option<Narration>, AppError> {
        self.narration_repo
            .find(account_id, &Narration::issue_record_key(issue_id))
            .await
    }

    /// Cooperative cancellation: flips queued/processing to canceled. The
    /// in-flight processor observes the flag and discards its result.
    pub async fn cancel(&self, account_id: Uuid, issue_id: Uuid) -> Result<bool, AppError> {
        self.narration_repo
            .cancel(account_id, &Narration::issue_record_key(issue_id))
            .await
    }

    /// Job handler for `audio.requested`
    pub async fn process_audio_job(&self, payload: &AudioJobPayload) -> Result<(), SynthesisError> {
        let record_key = Narration::issue_record_key(payload.issue_id);
        let Some(narration) = self.claim_record(payload.account_id, &record_key).await? else {
            return Ok(());
        };

        let issue = self
            .issue_repo
            .find_by_id(payload.issue_id)
            .await
            .map_err(|e| SynthesisError::Dependency(e.to_string()))?
            .ok_or_else(|| {
                SynthesisError::Invalid(format!("Issue {} not found", payload.issue_id))
            })?;

        let source = ScriptSource {
            title: issue.title.clone(),
            sender: issue.sender.clone(),
            date: issue.published_at.format("%Y-%m-%d").to_string(),
            sections: vec![ScriptSection {
                heading: None,
                text: script::clean_body(&issue.body_html),
            }],
            mode: payload.mode,
            content_type: "issue",
        };

        self.generate(&narration, source).await
    }

    /// Job handler for `digest.generate`: one spoken digest over the issues of
    /// the past week.
    pub async fn process_digest_job(
        &self,
        payload: &DigestJobPayload,
    ) -> Result<(), SynthesisError> {
        let record_key = Narration::digest_record_key(&payload.delivery_key);
        let Some(narration) = self.claim_record(payload.account_id, &record_key).await? else {
            return Ok(());
        };

        let since = Utc::now() - chrono::Duration::days(DIGEST_WINDOW_DAYS);
        let issues = self
            .issue_repo
            .list_published_since(since)
            .await
            .map_err(|e| SynthesisError::Dependency(e.to_string()))?;

        if issues.is_empty() {
            self.narration_repo
                .mark_failed(narration.id, "no issues in digest window")
                .await
                .map_err(|e| SynthesisError::Dependency(e.to_string()))?;
            return Ok(());
        }

        let sections: Vec<ScriptSection> = issues
            .iter()
            .map(|issue| ScriptSection {
                heading: Some(issue.title.clone()),
                text: script::clean_body(&issue.body_html),
            })
            .collect();

        let source = ScriptSource {
            title: format!("Your weekly digest, {}", payload.delivery_key),
            sender: "echopost digest".to_string(),
            date: payload.delivery_key.clone(),
            sections,
            mode: NarrationMode::Digest,
            content_type: "digest",
        };

        self.generate(&narration, source).await
    }

    /// Scheduler hook: upsert the digest record and enqueue its job.
    pub async fn schedule_digest(
        &self,
        account_id: Uuid,
        delivery_key: &str,
    ) -> Result<(), AppError> {
        let record_key = Narration::digest_record_key(delivery_key);

        // One digest per account per delivery window
        if let Some(existing) = self.narration_repo.find(account_id, &record_key).await? {
            if existing.status != NarrationStatus::Failed {
                return Ok(());
            }
        }

        self.narration_repo
            .upsert_queued(account_id, &record_key, NarrationMode::Digest)
            .await?;

        let payload = DigestJobPayload {
            account_id,
            delivery_key: delivery_key.to_string(),
        };
        self.job_repo
            .enqueue(
                JobType::DigestGenerate,
                json!(payload),
                &crate::domain::jobs::digest_dedupe_key(account_id, delivery_key),
                AUDIO_JOB_MAX_ATTEMPTS,
            )
            .await?;

        Ok(())
    }

    /// Idempotent entry into `processing`.
    ///
    /// Returns None when the job should be skipped without failing: the record
    /// is gone, already terminal, or another attempt started recently enough
    /// that its lease is still considered live.
    async fn claim_record(
        &self,
        account_id: Uuid,
        record_key: &str,
    ) -> Result<Option<Narration>, SynthesisError> {
        let Some(narration) = self
            .narration_repo
            .find(account_id, record_key)
            .await
            .map_err(|e| SynthesisError::Dependency(e.to_string()))?
        else {
            tracing::warn!(
                account_id = %account_id,
                record_key = record_key,
                "Narration record missing for claimed job, skipping"
            );
            return Ok(None);
        };

        match narration.status {
            NarrationStatus::Ready | NarrationStatus::Canceled => {
                return Ok(None);
            }
            // A retried or replayed job picks a failed record back up
            NarrationStatus::Failed => {}
            NarrationStatus::Processing => {
                let stale_cutoff =
                    Utc::now() - chrono::Duration::seconds(self.record_stale_after_secs);
                let started = narration.generation_started_at.unwrap_or(narration.updated_at);
                if started > stale_cutoff {
                    tracing::info!(
                        narration_id = %narration.id,
                        "Generation already in flight and not stale, skipping re-entry"
                    );
                    return Ok(None);
                }
                tracing::warn!(
                    narration_id = %narration.id,
                    started_at = %started,
                    "Re-entering stale processing record"
                );
            }
            NarrationStatus::Queued => {}
        }

        let claimed = self
            .narration_repo
            .mark_processing(narration.id)
            .await
            .map_err(|e| SynthesisError::Dependency(e.to_string()))?;
        if !claimed {
            // A cancel landed between the read above and the flip
            tracing::info!(
                narration_id = %narration.id,
                "Record went terminal before claim, skipping"
            );
            return Ok(None);
        }

        Ok(Some(narration))
    }

    async fn generate(
        &self,
        narration: &Narration,
        source: ScriptSource,
    ) -> Result<(), SynthesisError> {
        let started = Instant::now();

        match self.run_generation(narration, source).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.narration_repo
                    .mark_failed(narration.id, &e.to_string())
                    .await
                    .ok();
                self.metric_repo
                    .record(EVENT_SYNTHESIS_FAILURE, None, Some(&e.to_string()))
                    .await
                    .ok();
                tracing::error!(
                    narration_id = %narration.id,
                    elapsed_ms = started.elapsed().as_millis() as i64,
                    error = %e,
                    "Synthesis failed"
                );
                // Permanent failures complete the job; a retry cannot succeed
                if is_permanent(&e) {
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn run_generation(
        &self,
        narration: &Narration,
        source: ScriptSource,
    ) -> Result<(), SynthesisError> {
        let started = Instant::now();
        let cost = TokenCost::for_mode(source.mode);

        let combined_body: String = source
            .sections
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let hash = content_hash(
            &source.title,
            &source.sender,
            &source.date,
            &combined_body,
            source.mode.as_str(),
        );

        // Cross-account cache: a hit is copied over, never re-synthesized and
        // never charged
        if let Some(cached) = self
            .audio_cache_repo
            .find(&hash, source.content_type)
            .await
            .map_err(|e| SynthesisError::Dependency(e.to_string()))?
        {
            tracing::info!(
                narration_id = %narration.id,
                content_hash = %hash,
                audio_size = cached.audio_data.len(),
                "Global audio cache hit"
            );
            self.metric_repo
                .record(EVENT_CACHE_HIT, None, Some(source.content_type))
                .await
                .ok();
            self.narration_repo
                .mark_ready(narration.id, &cached.mime_type, &cached.audio_data, &hash)
                .await
                .map_err(|e| SynthesisError::Dependency(e.to_string()))?;
            return Ok(());
        }

        self.metric_repo
            .record(EVENT_CACHE_MISS, None, Some(source.content_type))
            .await
            .ok();

        let script_text = self.build_script(&source).await?;
        let chunks = script::split_into_chunks(&script_text);
        if chunks.is_empty() {
            return Err(SynthesisError::Invalid(
                "Script is empty after cleaning".to_string(),
            ));
        }

        tracing::info!(
            narration_id = %narration.id,
            chunk_count = chunks.len(),
            script_length = script_text.len(),
            "Synthesizing script chunks"
        );

        // Sequential, in script order; chunk order in the concatenated audio
        // must match
        let mut audio = Vec::new();
        let mut model_used = String::new();
        for (index, chunk) in chunks.iter().enumerate() {
            let chunk_audio = self.speech_repo.synthesize_chunk(chunk, &self.voice).await?;
            model_used = chunk_audio.model.clone();

            if index == 0 {
                self.narration_repo
                    .store_first_chunk(narration.id, &chunk_audio.mime_type, &chunk_audio.data)
                    .await
                    .map_err(|e| SynthesisError::Dependency(e.to_string()))?;
            }

            audio.extend_from_slice(&chunk_audio.data);

            if self.is_canceled(narration).await? {
                tracing::info!(
                    narration_id = %narration.id,
                    chunks_done = index + 1,
                    "Narration canceled mid-flight, discarding result"
                );
                return Ok(());
            }
        }

        self.charge_once(narration, cost).await?;

        self.audio_cache_repo
            .upsert(
                &hash,
                source.content_type,
                NARRATION_MIME_TYPE,
                &audio,
                &script_text,
                self.speech_repo.provider_name(),
                &model_used,
            )
            .await
            .map_err(|e| SynthesisError::Dependency(e.to_string()))?;

        let committed = self
            .narration_repo
            .mark_ready(narration.id, NARRATION_MIME_TYPE, &audio, &hash)
            .await
            .map_err(|e| SynthesisError::Dependency(e.to_string()))?;
        if !committed {
            // Canceled between the last chunk and the commit
            tracing::info!(narration_id = %narration.id, "Ready result discarded after cancellation");
            return Ok(());
        }

        let elapsed_ms = started.elapsed().as_millis() as i64;
        self.metric_repo
            .record(EVENT_SYNTHESIS_SUCCESS, Some(elapsed_ms), None)
            .await
            .ok();

        tracing::info!(
            narration_id = %narration.id,
            content_hash = %hash,
            audio_size = audio.len(),
            chunk_count = chunks.len(),
            latency_ms = elapsed_ms,
            "Narration ready"
        );

        Ok(())
    }

    /// Condense overlong bodies, classify tone, assemble the spoken script.
    async fn build_script(&self, source: &ScriptSource) -> Result<String, SynthesisError> {
        let mut sections = source.sections.clone();

        let word_count: usize = sections.iter().map(|s| s.text.split_whitespace().count()).sum();
        let condense = source.mode == NarrationMode::Condensed
            || (source.mode == NarrationMode::Full && word_count > self.condense_word_threshold);

        if condense {
            let body: String = sections
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            let condensed = self
                .condenser_repo
                .condense(&source.title, &body)
                .await
                .map_err(SynthesisError::Dependency)?;
            sections = vec![ScriptSection {
                heading: None,
                text: condensed,
            }];
        }

        let body_for_tone: String = sections
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let tone = script::classify_tone(&body_for_tone);

        Ok(script::assemble(&source.title, &sections, tone))
    }

    async fn is_canceled(&self, narration: &Narration) -> Result<bool, SynthesisError> {
        let current = self
            .narration_repo
            .find(narration.account_id, &narration.record_key)
            .await
            .map_err(|e| SynthesisError::Dependency(e.to_string()))?;

        Ok(matches!(
            current.map(|n| n.status),
            Some(NarrationStatus::Canceled) | None
        ))
    }

    /// Charge the ledger exactly once per record, guarded by the charge
    /// timestamp. A retried job that already charged skips the ledger.
    async fn charge_once(
        &self,
        narration: &Narration,
        cost: TokenCost,
    ) -> Result<(), SynthesisError> {
        let current = self
            .narration_repo
            .find(narration.account_id, &narration.record_key)
            .await
            .map_err(|e| SynthesisError::Dependency(e.to_string()))?;

        if current.and_then(|n| n.credits_charged_at).is_some() {
            tracing::info!(
                narration_id = %narration.id,
                "Charge timestamp already present, skipping ledger"
            );
            return Ok(());
        }

        let check = self
            .entitlement_service
            .consume_atomic(narration.account_id, cost.0)
            .await?;
        if !check.allowed {
            return Err(SynthesisError::PaymentRequired(
                check
                    .reason
                    .unwrap_or_else(|| "Insufficient tokens".to_string()),
            ));
        }

        self.narration_repo
            .record_charge(narration.id, cost.0)
            .await
            .map_err(|e| SynthesisError::Dependency(e.to_string()))?;

        Ok(())
    }

    /// Terminal-failure sweep for records abandoned in `processing`. The
    /// cutoff sits well past the re-entry lease so a crashed-and-retried job
    /// gets its chances before the record is written off.
    pub async fn sweep_stale_records(&self) -> Result<i64, AppError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(STALE_SWEEP_AFTER_SECS);
        let swept = self.narration_repo.fail_stale_processing(cutoff).await?;
        if swept > 0 {
            tracing::warn!(swept = swept, "Swept stale processing narrations to failed");
        }
        Ok(swept)
    }
}
