use super::speech_repository::{ChunkAudio, SpeechError, SpeechRepository};
use async_trait::async_trait;
use serde_json::json;

/// OpenAI-compatible `/audio/speech` implementation of the speech repository.
/// Candidate models are tried in order; the next model is attempted only after
/// the previous one fails, and permanent failures stop the fallback chain.
pub struct OpenAiSpeechRepository {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    models: Vec<String>,
}

impl OpenAiSpeechRepository {
    pub fn new(api_base: String, api_key: String, models: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            api_key,
            models,
        }
    }

    async fn call_provider(
        &self,
        model: &str,
        text: &str,
        voice: &str,
    ) -> Result<ChunkAudio, SpeechError> {
        let preview: String = text.chars().take(200).collect();
        tracing::info!(
            model = model,
            voice = voice,
            text_length = text.len(),
            text_preview = %preview,
            "Calling speech provider"
        );

        let response = self
            .client
            .post(format!("{}/audio/speech", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": model,
                "input": text,
                "voice": voice,
                "response_format": "mp3",
            }))
            .send()
            .await
            .map_err(|e| SpeechError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                model = model,
                status = status.as_u16(),
                body = %body,
                "Speech provider returned an error"
            );
            return Err(classify_provider_error(status.as_u16(), &body));
        }

        let audio_bytes = response
            .bytes()
            .await
            .map_err(|e| SpeechError::Transient(format!("failed to read audio body: {}", e)))?
            .to_vec();

        tracing::debug!(
            model = model,
            audio_size = audio_bytes.len(),
            "Speech audio received"
        );

        Ok(ChunkAudio {
            data: audio_bytes,
            mime_type: "audio/mpeg".to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl SpeechRepository for OpenAiSpeechRepository {
    async fn synthesize_chunk(&self, text: &str, voice: &str) -> Result<ChunkAudio, SpeechError> {
        let mut last_error = SpeechError::Transient("no speech models configured".to_string());

        for model in &self.models {
            match self.call_provider(model, text, voice).await {
                Ok(audio) => return Ok(audio),
                Err(e) if e.is_permanent() => {
                    // Another model will hit the same length/quota wall
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        model = %model,
                        error = %e,
                        "Speech model failed, advancing to next candidate"
                    );
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

/// Map a provider HTTP failure onto the retry taxonomy.
///
/// 413 and "too long"/"maximum length" bodies mean the input can never fit;
/// 429 with a quota body (or 402) means the account budget is gone for the
/// billing period. Everything else is worth a retry.
fn classify_provider_error(status: u16, body: &str) -> SpeechError {
    let lowered = body.to_lowercase();

    if status == 413 || lowered.contains("too long") || lowered.contains("maximum length") {
        return SpeechError::InputTooLong(format!("status {}: {}", status, truncate(body)));
    }

    if status == 402
        || lowered.contains("insufficient_quota")
        || lowered.contains("quota exceeded")
        || lowered.contains("billing")
    {
        return SpeechError::QuotaExhausted(format!("status {}: {}", status, truncate(body)));
    }

    SpeechError::Transient(format!("status {}: {}", status, truncate(body)))
}

fn truncate(body: &str) -> String {
    body.chars().take(300).collect()
}
