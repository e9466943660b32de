//! Model Engine - Unified text embedding and completion backends
//!
//! This crate puts heterogeneous inference backends behind one calling
//! convention: models are declared in an [`EngineConfig`], loaded into an
//! [`Engine`], and invoked by name with a [`ModelInput`]. Completion models
//! additionally expose incremental streaming with UTF-8-safe chunking and
//! stop-string handling; see [`generation`] for the session internals.

#![warn(missing_docs)]

// Public modules
pub mod backends;
pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod logging;
pub mod runtime;
pub mod types;

/// Crate version, taken from the manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-exports for public API
pub use backends::{Backend, TextCompleter, TextEmbedder};
pub use config::{CompletionConfig, EmbeddingConfig, EngineConfig, ModelConfig};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use generation::GenerationStream;
pub use runtime::{GgufRuntime, ModelRuntime};
pub use types::{
    Completion, FinishReason, GenerationRequest, ModelInput, ModelOutput, SamplingParams,
    StreamChunk,
};
