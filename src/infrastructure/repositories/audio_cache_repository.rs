use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::sync::Arc;

/// Account-independent, content-addressed audio. A hit here is never
/// re-synthesized and never charges any ledger.
#[derive(Debug, Clone, FromRow)]
pub struct CachedAudio {
    pub content_hash: String,
    pub content_type: String,
    pub mime_type: String,
    pub audio_data: Vec<u8>,
    pub script_text: String,
    pub provider: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

pub struct AudioCacheRepository {
    pool: Arc<DbPool>,
}

impl AudioCacheRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub async fn find(
        &self,
        content_hash: &str,
        content_type: &str,
    ) -> AppResult<Option<CachedAudio>> {
        let pool = self.pool.as_ref();
        let cached = sqlx::query_as::<_, CachedAudio>(
            "SELECT * FROM audio_cache WHERE content_hash = $1 AND content_type = $2",
        )
        .bind(content_hash)
        .bind(content_type)
        .fetch_optional(pool)
        .await?;

        Ok(cached)
    }

    /// Last-writer-wins upsert. Concurrent writers racing on the same hash
    /// produce identical audio, so overwriting is harmless.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert(
        &self,
        content_hash: &str,
        content_type: &str,
        mime_type: &str,
        audio_data: &[u8],
        script_text: &str,
        provider: &str,
        model: &str,
    ) -> AppResult<()> {
        let pool = self.pool.as_ref();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO audio_cache (content_hash, content_type, mime_type, audio_data, script_text, provider, model, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (content_hash, content_type) DO UPDATE SET
                mime_type = EXCLUDED.mime_type,
                audio_data = EXCLUDED.audio_data,
                script_text = EXCLUDED.script_text,
                provider = EXCLUDED.provider,
                model = EXCLUDED.model
            "#,
        )
        .bind(content_hash)
        .bind(content_type)
        .bind(mime_type)
        .bind(audio_data)
        .bind(script_text)
        .bind(provider)
        .bind(model)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(())
    }
}
