pub mod account_repository;
pub mod audio_cache_repository;
pub mod condenser_repository;
pub mod entitlement_repository;
pub mod issue_repository;
pub mod job_repository;
pub mod metric_repository;
pub mod narration_repository;
pub mod openai_speech_repository;
pub mod speech_repository;

pub use account_repository::AccountRepository;
pub use audio_cache_repository::{AudioCacheRepository, CachedAudio};
pub use condenser_repository::{CondenserRepository, OpenAiCondenserRepository};
pub use entitlement_repository::{EntitlementRecord, EntitlementRepository};
pub use issue_repository::{Issue, IssueRepository};
pub use job_repository::JobRepository;
pub use metric_repository::{
    MetricRepository, MetricsSummary, EVENT_CACHE_HIT, EVENT_CACHE_MISS, EVENT_SYNTHESIS_FAILURE,
    EVENT_SYNTHESIS_SUCCESS,
};
pub use narration_repository::NarrationRepository;
pub use openai_speech_repository::OpenAiSpeechRepository;
pub use speech_repository::{ChunkAudio, SpeechError, SpeechRepository};
