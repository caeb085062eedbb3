use crate::domain::jobs::NarrationMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-(content, account) narration state. "Missing" is the absence of a row.
#[derive(Debug, Clone, FromRow)]
pub struct Narration {
    pub id: Uuid,
    pub account_id: Uuid,
    pub record_key: String,
    pub status: NarrationStatus,
    pub mode: NarrationMode,
    pub mime_type: Option<String>,
    pub audio_data: Option<Vec<u8>>,
    pub first_chunk_data: Option<Vec<u8>>,
    pub content_hash: Option<String>,
    pub credits_charged: Option<i32>,
    pub credits_charged_at: Option<DateTime<Utc>>,
    pub generation_started_at: Option<DateTime<Utc>>,
    pub generation_completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NarrationStatus {
    Queued,
    Processing,
    Ready,
    Failed,
    Canceled,
}

impl NarrationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NarrationStatus::Ready | NarrationStatus::Failed | NarrationStatus::Canceled
        )
    }
}

impl std::fmt::Display for NarrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NarrationStatus::Queued => "queued",
            NarrationStatus::Processing => "processing",
            NarrationStatus::Ready => "ready",
            NarrationStatus::Failed => "failed",
            NarrationStatus::Canceled => "canceled",
        };
        write!(f, "{}", s)
    }
}

impl Narration {
    /// Record key for a single-issue narration
    pub fn issue_record_key(issue_id: Uuid) -> String {
        format!("issue:{}", issue_id)
    }

    /// Record key for a recurring digest delivery
    pub fn digest_record_key(delivery_key: &str) -> String {
        format!("digest:{}", delivery_key)
    }
}
