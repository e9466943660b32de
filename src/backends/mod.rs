//! Backend families behind the uniform calling convention

mod completion;
mod embedding;

pub use completion::TextCompleter;
pub use embedding::TextEmbedder;

use crate::config::ModelConfig;
use crate::error::{EngineError, Result};
use crate::runtime::{GgufRuntime, ModelRuntime};
use crate::types::{ModelInput, ModelOutput};

/// The closed set of backend families.
///
/// Every configured model loads into exactly one variant; `invoke` matches
/// input against backend exhaustively, so adding a family means extending
/// this enum and the match arms below.
pub enum Backend<M: ModelRuntime = GgufRuntime> {
    /// Sentence embedding.
    Embedding(TextEmbedder),
    /// Autoregressive text completion.
    Completion(TextCompleter<M>),
}

impl Backend {
    /// Load the backend a model config describes.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        match config {
            ModelConfig::Embedding(config) => {
                Ok(Backend::Embedding(TextEmbedder::load(config)?))
            }
            ModelConfig::Completion(config) => {
                Ok(Backend::Completion(TextCompleter::load(config)?))
            }
        }
    }
}

impl<M: ModelRuntime> Backend<M> {
    /// Name callers use to select this model.
    pub fn name(&self) -> &str {
        match self {
            Backend::Embedding(embedder) => embedder.name(),
            Backend::Completion(completer) => completer.name(),
        }
    }

    /// Backend family label, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Embedding(_) => "embedding",
            Backend::Completion(_) => "completion",
        }
    }

    /// Run one input through this backend.
    ///
    /// An input meant for the other family is a structured error, not a
    /// panic or a silent no-op.
    pub fn invoke(&mut self, input: ModelInput) -> Result<ModelOutput> {
        match (self, input) {
            (Backend::Embedding(embedder), ModelInput::Embed(text)) => {
                Ok(ModelOutput::Embedding(embedder.embed(&text)?))
            }
            (Backend::Completion(completer), ModelInput::Complete { prompt, request }) => {
                Ok(ModelOutput::Completion(completer.complete(&prompt, &request)?))
            }
            (backend, input) => Err(EngineError::UnsupportedOperation {
                backend: backend.name().to_string(),
                operation: input.operation(),
            }),
        }
    }
}
