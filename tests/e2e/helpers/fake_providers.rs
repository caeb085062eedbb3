use async_trait::async_trait;
use echopost_backend::infrastructure::repositories::{
    ChunkAudio, CondenserRepository, SpeechError, SpeechRepository,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory speech provider. Audio for each chunk is a readable marker
/// embedding the call sequence number, so tests can assert both chunk order
/// and call counts from the concatenated output.
pub struct FakeSpeechRepository {
    calls: Mutex<Vec<String>>,
    sequence: AtomicUsize,
    /// Errors returned before any synthesis succeeds
    failures: Mutex<Vec<SpeechError>>,
}

impl FakeSpeechRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            sequence: AtomicUsize::new(0),
            failures: Mutex::new(Vec::new()),
        })
    }

    /// Queue errors to return on upcoming calls, oldest first
    pub fn push_failure(&self, error: SpeechError) {
        self.failures.lock().push(error);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn synthesized_texts(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SpeechRepository for FakeSpeechRepository {
    async fn synthesize_chunk(&self, text: &str, _voice: &str) -> Result<ChunkAudio, SpeechError> {
        self.calls.lock().push(text.to_string());

        let queued_failure = {
            let mut failures = self.failures.lock();
            if failures.is_empty() {
                None
            } else {
                Some(failures.remove(0))
            }
        };
        if let Some(error) = queued_failure {
            return Err(error);
        }

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        Ok(ChunkAudio {
            data: format!("[chunk-{}]", seq).into_bytes(),
            mime_type: "audio/mpeg".to_string(),
            model: "fake-tts".to_string(),
        })
    }

    fn provider_name(&self) -> &str {
        "fake"
    }
}

/// Condenser that returns a fixed short body and counts invocations
pub struct FakeCondenserRepository {
    calls: AtomicUsize,
}

impl FakeCondenserRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CondenserRepository for FakeCondenserRepository {
    async fn condense(&self, title: &str, _body: &str) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "A condensed summary of {}. It keeps the substance and drops the rest.",
            title
        ))
    }
}
