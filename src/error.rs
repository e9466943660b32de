//! Crate-wide error and result types

use std::error::Error as StdError;
use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by backends, the model runtime, and the engine facade.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A config value failed validation.
    #[error("configuration error for {parameter}: {message}")]
    Configuration {
        /// What went wrong.
        message: String,
        /// Name of the offending parameter.
        parameter: String,
    },

    /// Model weights or companion files could not be loaded.
    #[error("failed to load model from {}: {message}", path.display())]
    ModelLoad {
        /// What went wrong.
        message: String,
        /// Path the load was attempted from.
        path: PathBuf,
        /// Underlying failure, when one exists.
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// Text could not be encoded or the tokenizer failed to load.
    #[error("tokenizer error: {message}")]
    Tokenizer {
        /// What went wrong.
        message: String,
    },

    /// The model failed while evaluating context or sampling.
    #[error("model runtime error: {message}")]
    Runtime {
        /// What went wrong.
        message: String,
    },

    /// An input was routed to a backend of the wrong family.
    #[error("backend '{backend}' does not support {operation}")]
    UnsupportedOperation {
        /// Name of the backend that received the input.
        backend: String,
        /// Operation the input asked for.
        operation: &'static str,
    },

    /// No configured model carries the requested name.
    #[error("no model named '{name}' is configured")]
    UnknownModel {
        /// The name that failed to resolve.
        name: String,
    },

    /// Tensor-level failure from the inference library.
    #[error(transparent)]
    Candle(#[from] candle_core::Error),

    /// Filesystem failure outside model loading.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EngineError::Configuration {
            message: "must be greater than zero".to_string(),
            parameter: "context_length".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "configuration error for context_length: must be greater than zero"
        );
    }

    #[test]
    fn test_load_error_preserves_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let error = EngineError::ModelLoad {
            message: "missing file".to_string(),
            path: PathBuf::from("/models/absent.gguf"),
            source: Some(Box::new(io)),
        };
        assert!(StdError::source(&error).is_some());
        assert!(error.to_string().contains("/models/absent.gguf"));
    }

    #[test]
    fn test_unsupported_operation_display() {
        let error = EngineError::UnsupportedOperation {
            backend: "encoder".to_string(),
            operation: "text completion",
        };
        assert_eq!(
            error.to_string(),
            "backend 'encoder' does not support text completion"
        );
    }
}
