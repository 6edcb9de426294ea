//! Stand-in used when no language model is configured.

use async_trait::async_trait;

use nodes::{GenerationProvider, ProviderError};

/// Fails every call with [`ProviderError::NotConfigured`], so generation
/// steps degrade to an apology instead of aborting the run.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGenerator;

#[async_trait]
impl GenerationProvider for DisabledGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured("generation provider"))
    }

    async fn generate_with_context(
        &self,
        _query: &str,
        _context_texts: &[String],
    ) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured("generation provider"))
    }

    fn model_name(&self) -> &str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_call_reports_not_configured() {
        let generator = DisabledGenerator;
        let err = generator.generate("hi").await.unwrap_err();
        assert_eq!(err.to_string(), "generation provider is not configured");

        let err = generator
            .generate_with_context("q", &["ctx".to_owned()])
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::NotConfigured("generation provider"));
    }
}
