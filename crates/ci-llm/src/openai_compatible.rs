use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::traits::{EmbeddingProvider, EmbedResult, SummarizationProvider};

/// Talks to any OpenAI-compatible `/v1` endpoint (Ollama, LM Studio, the
/// real OpenAI API). The first call after process start gets a longer
/// timeout — local model servers often need to load weights before they
/// can answer — tracked with a one-shot `AtomicBool` rather than a timer,
/// since "warm" means "has answered once", not "N seconds have passed".
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    normal_timeout: Duration,
    warmed_up: AtomicBool,
}

const WARMUP_MULTIPLIER: u32 = 4;

impl OpenAiCompatibleProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            normal_timeout: timeout,
            warmed_up: AtomicBool::new(false),
        }
    }

    fn effective_timeout(&self) -> Duration {
        if self.warmed_up.load(Ordering::Acquire) {
            self.normal_timeout
        } else {
            self.normal_timeout * WARMUP_MULTIPLIER
        }
    }

    fn mark_warm(&self) {
        self.warmed_up.store(true, Ordering::Release);
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(format!("{}{}", self.base_url, path)).timeout(self.effective_timeout());
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResult> {
        let response = self
            .request("/embeddings")
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::BadResponse(format!("embeddings request failed: {}", response.status())));
        }

        let parsed: EmbeddingsResponse = response.json().await?;
        if parsed.data.is_empty() {
            return Err(Error::BadResponse("empty embeddings response".to_string()));
        }

        self.mark_warm();
        let dimensions = parsed.data[0].embedding.len();
        Ok(EmbedResult { vectors: parsed.data.into_iter().map(|d| d.embedding).collect(), dimensions })
    }

    fn dimensions(&self) -> usize {
        0 // unknown until the first embed call; callers read EmbedResult::dimensions
    }

    fn name(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn check_availability(&self) -> Result<()> {
        let response = self.client.get(&self.base_url).timeout(Duration::from_secs(2)).send().await;
        match response {
            Ok(_) => Ok(()),
            Err(_) => Err(Error::Unavailable(self.base_url.clone())),
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl SummarizationProvider for OpenAiCompatibleProvider {
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String> {
        let effective = if self.warmed_up.load(Ordering::Acquire) { timeout } else { timeout * WARMUP_MULTIPLIER };
        let mut builder = self.client.post(format!("{}/chat/completions", self.base_url)).timeout(effective);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::BadResponse(format!("completion request failed: {}", response.status())));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::BadResponse("no choices in completion response".to_string()))?;

        self.mark_warm();
        Ok(content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warmup_timeout_is_quadrupled_until_first_success() {
        let provider = OpenAiCompatibleProvider::new("http://localhost:11434", "test-model", None, Duration::from_secs(5));
        assert_eq!(provider.effective_timeout(), Duration::from_secs(20));

        provider.mark_warm();
        assert_eq!(provider.effective_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn name_reflects_configured_model() {
        let provider = OpenAiCompatibleProvider::new("http://localhost:11434", "nomic-embed-text", None, Duration::from_secs(5));
        assert_eq!(EmbeddingProvider::name(&provider), "nomic-embed-text");
        assert_eq!(SummarizationProvider::name(&provider), "nomic-embed-text");
    }
}
