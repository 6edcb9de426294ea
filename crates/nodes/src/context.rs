//! The execution context threaded through every node of a run.
//!
//! Each handler takes the accumulated context by value and returns an
//! extended copy. Fields written by earlier nodes are never cleared by later
//! ones, so the final context is a superset of everything the run produced.
//! Keys supplied by the caller that have no typed field are kept in
//! [`ExecutionContext::extra`] and serialised back at the top level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::lenient::decode_fields;

// ---------------------------------------------------------------------------
// RetrievedChunk
// ---------------------------------------------------------------------------

/// A document fragment that matched the query during retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub similarity: f32,
    pub document_title: String,
    pub document_id: Uuid,
}

// ---------------------------------------------------------------------------
// Output shapes
// ---------------------------------------------------------------------------

/// How the output node renders the final answer.
///
/// Anything other than `"json"` renders as text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl Serialize for OutputFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OutputFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(if raw.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        })
    }
}

/// Metadata block of a structured answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerMetadata {
    pub context_documents_count: usize,
    pub model_used: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Answer rendered with `format = "json"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnswer {
    pub answer: String,
    pub sources: Vec<RetrievedChunk>,
    pub metadata: AnswerMetadata,
}

/// The rendered result of the output node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FinalOutput {
    Text(String),
    Json(StructuredAnswer),
}

impl FinalOutput {
    /// The text rendering, if this output was rendered as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Accumulating record of a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_context: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retrieved_chunks: Vec<RetrievedChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_documents_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<FinalOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,

    /// Last recoverable failure recorded by a degrading step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Input keys and node config fields that were ignored because their
    /// values did not fit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Caller-supplied keys with no typed field.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExecutionContext {
    /// Build the initial context from caller input.
    ///
    /// An object is decoded field by field: a key whose value does not fit
    /// its typed field is dropped with a warning. A bare string is taken as
    /// the query; `null` yields an empty context.
    ///
    /// # Errors
    /// Any other JSON value (number, bool, array).
    pub fn from_input(input: Value) -> Result<Self, serde_json::Error> {
        match input {
            Value::Null => Ok(Self::default()),
            Value::String(query) => Ok(Self {
                query: Some(query),
                ..Self::default()
            }),
            Value::Object(fields) => {
                let (ctx, rejected): (Self, _) = decode_fields(Map::new(), fields)?;
                Ok(ctx.with_warnings(rejected.iter().map(|r| format!("input {r}"))))
            }
            other => serde_json::from_value(other),
        }
    }

    /// A string-valued caller key from [`Self::extra`].
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// `true` when a degrading step recorded a failure.
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    pub fn with_query(mut self, query: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.query = Some(query.into());
        self.timestamp = Some(at);
        self
    }

    /// Record a successful retrieval.
    pub fn with_retrieval(mut self, chunks: Vec<RetrievedChunk>) -> Self {
        let joined = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        self.retrieved_context = Some(joined);
        self.context_documents_count = Some(chunks.len());
        self.retrieved_chunks = chunks;
        self
    }

    /// Record a failed retrieval: empty context plus an error annotation.
    pub fn with_failed_retrieval(mut self, error: impl Into<String>) -> Self {
        self.retrieved_context = Some(String::new());
        self.error = Some(error.into());
        self
    }

    pub fn with_generation(
        mut self,
        text: impl Into<String>,
        model: impl Into<String>,
        prompt_tokens: usize,
    ) -> Self {
        self.generated_text = Some(text.into());
        self.model_used = Some(model.into());
        self.prompt_tokens = Some(prompt_tokens);
        self
    }

    /// Record a failed generation: fallback text plus an error annotation.
    pub fn with_failed_generation(
        mut self,
        fallback: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        self.generated_text = Some(fallback.into());
        self.error = Some(error.into());
        self
    }

    pub fn with_output(
        mut self,
        output: FinalOutput,
        answer: impl Into<String>,
        format: OutputFormat,
    ) -> Self {
        self.final_output = Some(output);
        self.answer = Some(answer.into());
        self.output_format = Some(format);
        self
    }
}
