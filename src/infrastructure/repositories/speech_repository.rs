use async_trait::async_trait;

/// Audio produced for one script chunk
#[derive(Debug, Clone)]
pub struct ChunkAudio {
    pub data: Vec<u8>,
    pub mime_type: String,
    /// Model identifier that actually produced the audio
    pub model: String,
}

/// Provider failures, split by whether a retry could ever succeed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SpeechError {
    #[error("speech input too long: {0}")]
    InputTooLong(String),

    #[error("speech quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("speech provider error: {0}")]
    Transient(String),
}

impl SpeechError {
    /// Permanent errors abort the whole job; requeuing would never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            SpeechError::InputTooLong(_) | SpeechError::QuotaExhausted(_)
        )
    }
}

/// Repository for speech synthesis.
/// Abstracts the underlying provider (OpenAI-compatible HTTP endpoint, fakes in
/// tests). Implementations are responsible for trying their candidate model
/// identifiers in order and classifying provider failures.
#[async_trait]
pub trait SpeechRepository: Send + Sync {
    /// Synthesize one bounded-length text chunk into audio.
    ///
    /// The chunk is expected to already respect provider length limits; an
    /// `InputTooLong` error is still surfaced if the provider disagrees.
    async fn synthesize_chunk(&self, text: &str, voice: &str) -> Result<ChunkAudio, SpeechError>;

    /// Provider name recorded into the global cache
    fn provider_name(&self) -> &str;
}
