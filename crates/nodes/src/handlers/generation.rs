//! Language-model call.
//!
//! With retrieved context the generator is asked to answer grounded in it;
//! without, it gets a plain prompt. Failures are turned into an apologetic
//! answer plus an `error` annotation, so this step never aborts a run.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::{ExecutionContext, NodeEnv, NodeError};

const NO_CONTEXT_HINT: &str = "Please provide a helpful response based on your knowledge. \
     If you need additional context, please let the user know.";

/// Tuning options.
///
/// `temperature` and `max_tokens` are accepted for forward compatibility;
/// the generator applies its own configured values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub custom_prompt: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Config {
    pub fn from_value(value: &Value) -> Result<Self, NodeError> {
        super::parse_config("generation", value)
    }

    /// Decode for a run: fields that do not fit fall back to their
    /// defaults and are reported as warnings.
    pub fn from_value_lenient(value: &Value) -> (Self, Vec<String>) {
        super::parse_config_lenient("generation", value)
    }
}

/// Assemble the prompt sent when there is no retrieved context, or used for
/// token accounting when there is.
pub fn build_prompt(instructions: Option<&str>, context: &str, query: &str) -> String {
    let mut parts = Vec::with_capacity(4);
    if let Some(instructions) = instructions {
        parts.push(format!("Instructions: {instructions}"));
    }
    if !context.is_empty() {
        parts.push(format!("Context from documents:\n{context}"));
    }
    parts.push(format!("User Question: {query}"));
    if context.is_empty() {
        parts.push(NO_CONTEXT_HINT.to_owned());
    }
    parts.join("\n\n")
}

pub fn apology(reason: &str) -> String {
    format!("I apologize, but I encountered an error while processing your request: {reason}")
}

pub async fn run(
    config: &Config,
    ctx: ExecutionContext,
    env: &NodeEnv<'_>,
) -> Result<ExecutionContext, NodeError> {
    let generator = &env.providers.generator;

    let query = ctx.query.clone().unwrap_or_default();
    let context = ctx.retrieved_context.clone().unwrap_or_default();
    let instructions = config
        .custom_prompt
        .as_deref()
        .or_else(|| ctx.extra_str("custom_prompt"))
        .filter(|p| !p.trim().is_empty())
        .map(str::to_owned);

    let prompt = build_prompt(instructions.as_deref(), &context, &query);
    let prompt_tokens = prompt.split_whitespace().count();
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| generator.model_name().to_owned());

    let outcome = if context.is_empty() {
        env.bounded(generator.generate(&prompt)).await
    } else {
        let question = match &instructions {
            Some(instructions) => format!("{query}\n\nInstructions: {instructions}"),
            None => query.clone(),
        };
        env.bounded(generator.generate_with_context(&question, &[context]))
            .await
    };

    match outcome {
        Ok(text) => {
            info!(
                run_id = %env.run_id,
                model = %model,
                "generated response ({} chars)",
                text.len()
            );
            Ok(ctx.with_generation(text, model, prompt_tokens))
        }
        Err(e) => {
            warn!(run_id = %env.run_id, "generation failed: {e}");
            let reason = e.to_string();
            Ok(ctx.with_failed_generation(apology(&reason), reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{providers, FixedClock, GenerationCall, StubEmbedder, StubGenerator};
    use crate::{InMemoryDocumentStore, ProviderError};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    async fn generate_with(
        generator: StubGenerator,
        config: &Config,
        ctx: ExecutionContext,
        timeout: Duration,
    ) -> (ExecutionContext, Vec<GenerationCall>) {
        let calls = Arc::clone(&generator.calls);
        let providers = providers(
            StubEmbedder::constant(vec![1.0]),
            generator,
            InMemoryDocumentStore::new(),
        );
        let clock = FixedClock::default();
        let env = NodeEnv {
            run_id: Uuid::nil(),
            owner_id: Uuid::nil(),
            providers: &providers,
            clock: &clock,
            step_timeout: timeout,
        };
        let out = run(config, ctx, &env).await.expect("generation never fails the run");
        let calls = calls.lock().unwrap().clone();
        (out, calls)
    }

    fn query_ctx(query: &str) -> ExecutionContext {
        ExecutionContext::from_input(json!({ "query": query })).unwrap()
    }

    #[test]
    fn prompt_without_context_carries_hint() {
        let prompt = build_prompt(Some("be brief"), "", "What is 2+2?");
        assert_eq!(
            prompt,
            format!("Instructions: be brief\n\nUser Question: What is 2+2?\n\n{NO_CONTEXT_HINT}")
        );
    }

    #[test]
    fn prompt_with_context_has_no_hint() {
        let prompt = build_prompt(None, "some facts", "q");
        assert_eq!(prompt, "Context from documents:\nsome facts\n\nUser Question: q");
    }

    #[tokio::test]
    async fn without_context_uses_plain_prompt() {
        let (ctx, calls) = generate_with(
            StubGenerator::replying("4"),
            &Config::default(),
            query_ctx("What is 2+2?"),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(ctx.generated_text.as_deref(), Some("4"));
        assert_eq!(ctx.model_used.as_deref(), Some("stub-model"));
        assert!(ctx.prompt_tokens.unwrap() > 0);
        assert!(matches!(&calls[..], [GenerationCall::Prompt(p)] if p.contains("What is 2+2?")));
    }

    #[tokio::test]
    async fn with_context_grounds_the_answer() {
        let ctx = query_ctx("q").with_retrieval(vec![crate::RetrievedChunk {
            content: "fact".into(),
            similarity: 0.9,
            document_title: "t".into(),
            document_id: Uuid::nil(),
        }]);
        let config = Config {
            model: Some("custom-model".into()),
            ..Config::default()
        };

        let (ctx, calls) =
            generate_with(StubGenerator::replying("grounded"), &config, ctx, Duration::from_secs(1))
                .await;

        assert_eq!(ctx.generated_text.as_deref(), Some("grounded"));
        assert_eq!(ctx.model_used.as_deref(), Some("custom-model"));
        assert_eq!(
            calls,
            vec![GenerationCall::WithContext {
                query: "q".into(),
                context: vec!["fact".into()],
            }]
        );
    }

    #[tokio::test]
    async fn caller_custom_prompt_is_used_when_config_has_none() {
        let ctx = ExecutionContext::from_input(json!({ "query": "q", "custom_prompt": "rhyme" }))
            .unwrap();
        let (_, calls) = generate_with(
            StubGenerator::replying("ok"),
            &Config::default(),
            ctx,
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(
            &calls[..],
            [GenerationCall::Prompt(p)] if p.starts_with("Instructions: rhyme")
        ));
    }

    #[tokio::test]
    async fn failure_becomes_apology() {
        let (ctx, _) = generate_with(
            StubGenerator::failing(ProviderError::unavailable("stub", "quota exceeded")),
            &Config::default(),
            query_ctx("q"),
            Duration::from_secs(1),
        )
        .await;

        let text = ctx.generated_text.unwrap();
        assert!(text.starts_with("I apologize"), "{text}");
        assert!(ctx.error.unwrap().contains("quota exceeded"));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_generator_times_out() {
        let (ctx, _) = generate_with(
            StubGenerator::hanging(),
            &Config::default(),
            query_ctx("q"),
            Duration::from_secs(5),
        )
        .await;

        assert!(ctx.error.unwrap().contains("timed out"));
        assert!(ctx.generated_text.unwrap().starts_with("I apologize"));
    }
}
