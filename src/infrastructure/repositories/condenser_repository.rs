use async_trait::async_trait;
use serde_json::json;

/// Repository for condensing long bodies before narration.
/// The script engine stays pure; the processor decides when to substitute a
/// condensed body based on the configured word threshold.
#[async_trait]
pub trait CondenserRepository: Send + Sync {
    /// Return a shorter body that preserves the substance of the original.
    async fn condense(&self, title: &str, body: &str) -> Result<String, String>;
}

/// OpenAI-compatible chat-completion condenser.
pub struct OpenAiCondenserRepository {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiCondenserRepository {
    pub fn new(api_base: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl CondenserRepository for OpenAiCondenserRepository {
    async fn condense(&self, title: &str, body: &str) -> Result<String, String> {
        tracing::info!(
            title = title,
            body_length = body.len(),
            model = %self.model,
            "Condensing body before narration"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {
                        "role": "system",
                        "content": "Condense the following newsletter issue into a narration-ready summary of at most 600 words. Keep the substance, drop promotional asides, write flowing prose suitable for listening.",
                    },
                    {
                        "role": "user",
                        "content": format!("Title: {}\n\n{}", title, body),
                    }
                ],
            }))
            .send()
            .await
            .map_err(|e| format!("condense request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("condense failed with status {}: {}", status, body));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("condense response was not JSON: {}", e))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "condense response had no content".to_string())
    }
}
