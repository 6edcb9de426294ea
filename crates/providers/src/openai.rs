//! OpenAI-compatible HTTP adapters.
//!
//! Works against any server exposing `/v1/embeddings` and
//! `/v1/chat/completions` with the OpenAI request/response shapes (OpenAI,
//! Ollama, vLLM, LiteLLM, ...).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use nodes::{EmbeddingProvider, GenerationProvider, ProviderError};

use crate::pad_to_width;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

const EMBEDDER: &str = "openai-embeddings";
const GENERATOR: &str = "openai-chat";

// ---------------------------------------------------------------------------
// Shared request plumbing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Endpoint {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl Endpoint {
    fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(
        &self,
        provider: &'static str,
        path: &str,
        body: &Value,
    ) -> Result<Value, ProviderError> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::unavailable(provider, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                provider,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::malformed(provider, e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Extract the first embedding from a `/v1/embeddings` response body.
pub fn parse_embedding(body: Value) -> Result<Vec<f32>, ProviderError> {
    let response: EmbeddingResponse = serde_json::from_value(body)
        .map_err(|e| ProviderError::malformed(EMBEDDER, e.to_string()))?;
    response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProviderError::malformed(EMBEDDER, "no embedding in response"))
}

/// Embeds text through `/v1/embeddings`, padding results to `dimensions`.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    endpoint: Endpoint,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            endpoint: Endpoint::new(base_url, api_key),
            model: model.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = serde_json::to_value(EmbeddingRequest {
            model: &self.model,
            input: text,
        })
        .map_err(|e| ProviderError::malformed(EMBEDDER, e.to_string()))?;

        let response = self.endpoint.post(EMBEDDER, "/v1/embeddings", &body).await?;
        let vector = parse_embedding(response)?;
        debug!(model = %self.model, "received {}-wide embedding", vector.len());
        Ok(pad_to_width(vector, self.dimensions))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ---------------------------------------------------------------------------
// Chat completions
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Extract the first choice's text from a `/v1/chat/completions` body.
pub fn parse_completion(body: Value) -> Result<String, ProviderError> {
    let response: CompletionResponse = serde_json::from_value(body).map_err(|e| {
        ProviderError::malformed(GENERATOR, format!("failed to parse response: {e}"))
    })?;
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| ProviderError::malformed(GENERATOR, "no choices in response"))
}

/// Generates text through `/v1/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    endpoint: Endpoint,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAiGenerator {
    pub fn new(base_url: &str, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::new(base_url, api_key),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn build_request(&self, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}

#[async_trait]
impl GenerationProvider for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = self.build_request(prompt);
        let response = self
            .endpoint
            .post(GENERATOR, "/v1/chat/completions", &body)
            .await?;
        parse_completion(response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
