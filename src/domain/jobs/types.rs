use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The closed set of deferred-work kinds this service schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum JobType {
    #[serde(rename = "audio.requested")]
    #[sqlx(rename = "audio.requested")]
    AudioRequested,
    #[serde(rename = "digest.generate")]
    #[sqlx(rename = "digest.generate")]
    DigestGenerate,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::AudioRequested => "audio.requested",
            JobType::DigestGenerate => "digest.generate",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio.requested" => Ok(JobType::AudioRequested),
            "digest.generate" => Ok(JobType::DigestGenerate),
            other => Err(format!("unknown job type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    DeadLetter,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::DeadLetter => "dead_letter",
        };
        write!(f, "{}", s)
    }
}

/// A unit of deferred work, persisted in the `jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub dedupe_key: String,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub lease_owner: Option<String>,
    pub last_error: Option<String>,
    pub replay_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Payload for `audio.requested` jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioJobPayload {
    pub issue_id: Uuid,
    pub account_id: Uuid,
    pub mode: NarrationMode,
}

/// Payload for `digest.generate` jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestJobPayload {
    pub account_id: Uuid,
    /// Stable key for the delivery window, e.g. `2026-W35`
    pub delivery_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NarrationMode {
    Full,
    Condensed,
    Digest,
}

impl NarrationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrationMode::Full => "full",
            NarrationMode::Condensed => "condensed",
            NarrationMode::Digest => "digest",
        }
    }
}

impl std::fmt::Display for NarrationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Job {
    /// Decode the typed payload for an `audio.requested` job
    pub fn audio_payload(&self) -> Result<AudioJobPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Decode the typed payload for a `digest.generate` job
    pub fn digest_payload(&self) -> Result<DigestJobPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Dedupe key for a single-issue narration job
pub fn audio_dedupe_key(issue_id: Uuid, account_id: Uuid) -> String {
    format!("audio:issue-{}:account-{}", issue_id, account_id)
}

/// Dedupe key for a weekly digest job
pub fn digest_dedupe_key(account_id: Uuid, delivery_key: &str) -> String {
    format!("digest:{}:{}", account_id, delivery_key)
}
