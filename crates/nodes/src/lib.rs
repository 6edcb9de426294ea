//! `nodes` crate: the execution context, provider seams, and the four
//! built-in node handlers.
//!
//! The engine crate dispatches each node kind to the matching module in
//! [`handlers`]. Handlers never talk to an embedding service, a language
//! model, or a database directly; they go through the traits in [`traits`]
//! so runs can be driven by deterministic doubles from [`mock`].

pub mod context;
pub mod error;
pub mod handlers;
pub mod lenient;
pub mod mock;
pub mod retrieval;
pub mod similarity;
pub mod store;
pub mod traits;

pub use context::{ExecutionContext, FinalOutput, OutputFormat, RetrievedChunk};
pub use error::{NodeError, ProviderError};
pub use similarity::cosine_similarity;
pub use store::InMemoryDocumentStore;
pub use traits::{
    Clock, DocumentStore, EmbeddingProvider, GenerationProvider, NodeEnv, Providers, StoredChunk,
    SystemClock,
};
