//! Common type definitions used throughout the engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token identifier produced and consumed by a model runtime.
pub type TokenId = u32;

/// Seed used for sampling when the caller does not supply one.
pub const DEFAULT_SEED: u64 = 299792458;

/// Why a generation session terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model emitted end-of-sequence or a stop string matched.
    Stop,
    /// The configured token budget was exhausted.
    Length,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
        }
    }
}

/// Sampling knobs forwarded to the model runtime.
///
/// The sampling math itself lives behind [`crate::runtime::ModelRuntime`];
/// these values are passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Softmax temperature; values <= 0 select greedy decoding.
    pub temperature: f64,
    /// Nucleus sampling cutoff; values >= 1 disable the cutoff.
    pub top_p: f64,
    /// Penalty applied to recently generated tokens; 1.0 disables it.
    pub repetition_penalty: f32,
    /// RNG seed for reproducible sampling.
    pub seed: u64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.9,
            repetition_penalty: 1.1,
            seed: DEFAULT_SEED,
        }
    }
}

/// Per-call generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    /// Stop strings; generation ends before any of them is surfaced.
    pub stops: Vec<String>,
    /// Token budget; `None` or `Some(0)` means unbounded.
    pub max_tokens: Option<usize>,
    /// Sampling parameters for this call.
    pub sampling: SamplingParams,
}

/// One element of a generation stream.
///
/// Every chunk before the last carries `finish: None`; the final chunk always
/// carries a reason, even when its text is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Text ready to surface to the caller.
    pub text: String,
    /// Present exactly once, on the final chunk.
    pub finish: Option<FinishReason>,
}

impl StreamChunk {
    /// True for the terminal element of a stream.
    pub fn is_final(&self) -> bool {
        self.finish.is_some()
    }
}

/// Aggregated result of a non-streaming completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Full generated text with stop strings trimmed away.
    pub text: String,
    /// Why generation ended.
    pub finish_reason: FinishReason,
    /// Number of prompt tokens ingested.
    pub prompt_tokens: usize,
    /// Number of tokens sampled during generation.
    pub generated_tokens: usize,
}

/// Input accepted by the uniform `invoke` convention.
#[derive(Debug, Clone)]
pub enum ModelInput {
    /// Embed a piece of text.
    Embed(String),
    /// Generate a completion for a prompt.
    Complete {
        /// Prompt text fed to the model.
        prompt: String,
        /// Generation settings for this call.
        request: GenerationRequest,
    },
}

impl ModelInput {
    /// Human-readable name of the operation this input requests.
    pub fn operation(&self) -> &'static str {
        match self {
            ModelInput::Embed(_) => "text embedding",
            ModelInput::Complete { .. } => "text completion",
        }
    }
}

/// Output produced by the uniform `invoke` convention.
#[derive(Debug, Clone)]
pub enum ModelOutput {
    /// Embedding vector.
    Embedding(Vec<f32>),
    /// Aggregated completion.
    Completion(Completion),
}
