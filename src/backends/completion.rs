//! Text-completion backend over a [`ModelRuntime`]

use crate::config::CompletionConfig;
use crate::error::{EngineError, Result};
use crate::generation::GenerationStream;
use crate::runtime::{GgufRuntime, ModelRuntime};
use crate::types::{Completion, GenerationRequest, TokenId};

/// Prompt-to-text completion over one owned model runtime.
///
/// `complete` aggregates a whole generation into a [`Completion`]; `stream`
/// hands back the underlying lazy chunk sequence. Either way the prompt is
/// tokenized eagerly at call time and the model is borrowed exclusively
/// until the call (or the returned stream) is done.
pub struct TextCompleter<M: ModelRuntime> {
    name: String,
    model: M,
}

impl TextCompleter<GgufRuntime> {
    /// Load the configured GGUF model and wrap it as a completer.
    pub fn load(config: &CompletionConfig) -> Result<Self> {
        Ok(Self::new(&config.name, GgufRuntime::load(config)?))
    }
}

impl<M: ModelRuntime> TextCompleter<M> {
    /// Wrap an already-built runtime.
    pub fn new(name: &str, model: M) -> Self {
        Self { name: name.to_string(), model }
    }

    /// Name callers use to select this model.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run a full generation and aggregate the chunks.
    pub fn complete(&mut self, prompt: &str, request: &GenerationRequest) -> Result<Completion> {
        let prompt_ids = self.encode_prompt(prompt)?;
        let prompt_tokens = prompt_ids.len();

        let mut stream = GenerationStream::new(&mut self.model, prompt_ids, request);
        let mut text = String::new();
        let mut finish = None;
        for item in &mut stream {
            let chunk = item?;
            text.push_str(&chunk.text);
            if chunk.finish.is_some() {
                finish = chunk.finish;
            }
        }
        let generated_tokens = stream.tokens_generated();

        // The stream guarantees a final chunk with a reason on every
        // non-error path.
        let finish_reason = finish.ok_or_else(|| EngineError::Runtime {
            message: "generation ended without a finish reason".to_string(),
        })?;

        Ok(Completion { text, finish_reason, prompt_tokens, generated_tokens })
    }

    /// Start a lazy generation; nothing touches the model until the first
    /// chunk is pulled.
    pub fn stream(
        &mut self,
        prompt: &str,
        request: &GenerationRequest,
    ) -> Result<GenerationStream<'_, M>> {
        let prompt_ids = self.encode_prompt(prompt)?;
        Ok(GenerationStream::new(&mut self.model, prompt_ids, request))
    }

    fn encode_prompt(&self, prompt: &str) -> Result<Vec<TokenId>> {
        let tokens = self.model.tokenize(prompt)?;
        if tokens.is_empty() {
            return Err(EngineError::Tokenizer {
                message: "prompt tokenized to an empty sequence".to_string(),
            });
        }
        Ok(tokens)
    }
}
