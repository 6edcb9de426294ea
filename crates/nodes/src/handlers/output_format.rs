//! Renders the final answer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::context::{AnswerMetadata, StructuredAnswer};
use crate::{ExecutionContext, FinalOutput, NodeEnv, NodeError, OutputFormat};

const NO_RESPONSE: &str = "No response generated";
const MAX_LISTED_SOURCES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub format: OutputFormat,
    pub include_sources: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            include_sources: true,
        }
    }
}

impl Config {
    pub fn from_value(value: &Value) -> Result<Self, NodeError> {
        super::parse_config("output_format", value)
    }

    /// Decode for a run: fields that do not fit fall back to their
    /// defaults and are reported as warnings.
    pub fn from_value_lenient(value: &Value) -> (Self, Vec<String>) {
        super::parse_config_lenient("output_format", value)
    }
}

pub async fn run(
    config: &Config,
    ctx: ExecutionContext,
    env: &NodeEnv<'_>,
) -> Result<ExecutionContext, NodeError> {
    let output = render(config, &ctx);
    let answer = ctx.generated_text.clone().unwrap_or_else(|| NO_RESPONSE.to_owned());

    info!(run_id = %env.run_id, format = config.format.as_str(), "final output rendered");
    Ok(ctx.with_output(output, answer, config.format))
}

/// Render `ctx` per `config`. Pure.
///
/// Text layout is the answer, one blank line, then `Sources:` and at most
/// three numbered sources. The single blank line is intentional.
pub fn render(config: &Config, ctx: &ExecutionContext) -> FinalOutput {
    let answer = ctx.generated_text.as_deref().unwrap_or(NO_RESPONSE);

    match config.format {
        OutputFormat::Json => FinalOutput::Json(StructuredAnswer {
            answer: answer.to_owned(),
            sources: if config.include_sources {
                ctx.retrieved_chunks.clone()
            } else {
                Vec::new()
            },
            metadata: AnswerMetadata {
                context_documents_count: ctx.context_documents_count.unwrap_or(0),
                model_used: ctx.model_used.clone().unwrap_or_else(|| "unknown".to_owned()),
                timestamp: ctx.timestamp,
            },
        }),
        OutputFormat::Text => {
            let mut lines = vec![answer.to_owned()];
            if config.include_sources && !ctx.retrieved_chunks.is_empty() {
                lines.push(String::new());
                lines.push("Sources:".to_owned());
                lines.extend(
                    ctx.retrieved_chunks
                        .iter()
                        .take(MAX_LISTED_SOURCES)
                        .enumerate()
                        .map(|(i, chunk)| {
                            format!(
                                "{}. {} (similarity: {:.2})",
                                i + 1,
                                chunk.document_title,
                                chunk.similarity
                            )
                        }),
                );
            }
            FinalOutput::Text(lines.join("\n"))
        }
    }
}
