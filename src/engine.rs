//! Engine facade: named backends behind one invoke surface

use std::collections::HashMap;

use tracing::info;

use crate::backends::Backend;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::generation::GenerationStream;
use crate::runtime::GgufRuntime;
use crate::types::{GenerationRequest, ModelInput, ModelOutput};

/// All configured backends, selected by model name at call time.
pub struct Engine {
    backends: HashMap<String, Backend>,
}

impl Engine {
    /// Validate the configuration and load every configured model.
    ///
    /// Any single load failure fails the whole construction; a partially
    /// usable engine is worse than a clear startup error.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;

        let mut backends = HashMap::with_capacity(config.models.len());
        for model in &config.models {
            let backend = Backend::load(model)?;
            backends.insert(backend.name().to_string(), backend);
        }

        info!(models = backends.len(), "engine ready");
        Ok(Self { backends })
    }

    /// Names of the loaded models.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    /// Route one input to the named backend.
    pub fn invoke(&mut self, name: &str, input: ModelInput) -> Result<ModelOutput> {
        self.backend_mut(name)?.invoke(input)
    }

    /// Start a lazy completion stream on the named backend.
    ///
    /// Streaming only exists for completion models; asking an embedding
    /// model to stream is the same structured error `invoke` would give.
    pub fn stream(
        &mut self,
        name: &str,
        prompt: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationStream<'_, GgufRuntime>> {
        match self.backend_mut(name)? {
            Backend::Completion(completer) => completer.stream(prompt, request),
            backend => Err(EngineError::UnsupportedOperation {
                backend: backend.name().to_string(),
                operation: "streaming text completion",
            }),
        }
    }

    fn backend_mut(&mut self, name: &str) -> Result<&mut Backend> {
        self.backends.get_mut(name).ok_or_else(|| EngineError::UnknownModel {
            name: name.to_string(),
        })
    }
}
