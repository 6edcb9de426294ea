//! `providers` crate: concrete embedding and generation adapters.
//!
//! Everything here implements the traits from `nodes::traits`; the CLI
//! picks an implementation from configuration via [`settings`].

pub mod disabled;
pub mod fallback;
pub mod hashed;
pub mod openai;
pub mod padding;
pub mod settings;

pub use disabled::DisabledGenerator;
pub use fallback::FallbackEmbedder;
pub use hashed::HashedEmbedder;
pub use openai::{OpenAiEmbedder, OpenAiGenerator};
pub use padding::{pad_to_width, EMBEDDING_WIDTH};
pub use settings::{
    build_embedder, build_generator, EmbeddingBackend, EmbeddingSettings, GenerationBackend,
    GenerationSettings,
};
