pub mod types;
pub mod worker;

pub use types::{
    audio_dedupe_key, digest_dedupe_key, AudioJobPayload, DigestJobPayload, Job, JobStatus,
    JobType, NarrationMode,
};
pub use worker::{Worker, WorkerConfig};
