//! Provider selection from configuration.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use nodes::{EmbeddingProvider, GenerationProvider, ProviderError};

use crate::openai::DEFAULT_OPENAI_BASE_URL;
use crate::{
    DisabledGenerator, FallbackEmbedder, HashedEmbedder, OpenAiEmbedder, OpenAiGenerator,
    EMBEDDING_WIDTH,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic, offline.
    #[default]
    Hashed,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingBackend,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
    /// Fall back to hashed embeddings when the remote provider fails or
    /// has no API key.
    pub fallback_to_hashed: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Hashed,
            base_url: DEFAULT_OPENAI_BASE_URL.to_owned(),
            api_key: None,
            model: "text-embedding-3-small".to_owned(),
            dimensions: EMBEDDING_WIDTH,
            fallback_to_hashed: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackend {
    #[serde(rename = "openai")]
    OpenAi,
    #[default]
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub provider: GenerationBackend,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: GenerationBackend::Disabled,
            base_url: DEFAULT_OPENAI_BASE_URL.to_owned(),
            api_key: None,
            model: "gpt-4o-mini".to_owned(),
            temperature: Some(0.7),
            max_tokens: Some(2048),
        }
    }
}

fn non_blank(key: &Option<String>) -> Option<String> {
    key.as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_owned)
}

/// Build the configured embedder.
///
/// # Errors
/// [`ProviderError::NotConfigured`] for `openai` without an API key when
/// hashed fallback is disabled.
pub fn build_embedder(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    let hashed = HashedEmbedder::new(settings.dimensions);

    match settings.provider {
        EmbeddingBackend::Hashed => {
            info!(dimensions = settings.dimensions, "using hashed embeddings");
            Ok(Arc::new(hashed))
        }
        EmbeddingBackend::OpenAi => match non_blank(&settings.api_key) {
            Some(key) => {
                info!(model = %settings.model, "using OpenAI-compatible embeddings");
                let remote: Arc<dyn EmbeddingProvider> = Arc::new(OpenAiEmbedder::new(
                    &settings.base_url,
                    Some(key),
                    settings.model.clone(),
                    settings.dimensions,
                ));
                if settings.fallback_to_hashed {
                    Ok(Arc::new(FallbackEmbedder::new(remote, hashed)))
                } else {
                    Ok(remote)
                }
            }
            None if settings.fallback_to_hashed => {
                warn!("embedding API key not set, using hashed embeddings");
                Ok(Arc::new(hashed))
            }
            None => Err(ProviderError::NotConfigured("embedding provider")),
        },
    }
}

/// Build the configured generator. A missing API key yields the
/// [`DisabledGenerator`].
pub fn build_generator(settings: &GenerationSettings) -> Arc<dyn GenerationProvider> {
    match (settings.provider, non_blank(&settings.api_key)) {
        (GenerationBackend::OpenAi, Some(key)) => {
            info!(model = %settings.model, "using OpenAI-compatible generation");
            Arc::new(
                OpenAiGenerator::new(&settings.base_url, Some(key), settings.model.clone())
                    .with_sampling(settings.temperature, settings.max_tokens),
            )
        }
        (GenerationBackend::OpenAi, None) => {
            warn!("generation API key not set, generation is disabled");
            Arc::new(DisabledGenerator)
        }
        (GenerationBackend::Disabled, _) => Arc::new(DisabledGenerator),
    }
}
