//! Node-level error types.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by a node handler.
///
/// Any handler error aborts the run. Steps that degrade gracefully
/// (retrieval, generation) never surface a `NodeError` for provider
/// failures; they annotate the context instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    /// The query intake node found neither `query` nor `user_query`.
    #[error("no user query provided")]
    MissingQuery,

    /// The node's config block could not be decoded.
    #[error("invalid {kind} config: {message}")]
    InvalidConfig {
        kind: &'static str,
        message: String,
    },
}

/// Failures from an embedding provider, generation provider, or document
/// store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    /// The service could not be reached or refused the request.
    #[error("{provider} unavailable: {message}")]
    Unavailable {
        provider: &'static str,
        message: String,
    },

    /// The service answered with a non-success HTTP status.
    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("{provider} returned a malformed response: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },

    /// No provider is configured for this capability.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// The call did not finish within the step deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The document store failed to list chunks.
    #[error("document store error: {0}")]
    Store(String),
}

impl ProviderError {
    pub fn unavailable(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            provider,
            message: message.into(),
        }
    }

    pub fn malformed(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            provider,
            message: message.into(),
        }
    }
}
