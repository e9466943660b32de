//! Quantized GGUF model runtime backed by candle

use std::error::Error as StdError;
use std::fs::File;
use std::path::Path;

use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::quantized_llama::ModelWeights;
use tokenizers::Tokenizer;
use tracing::info;

use crate::config::{CompletionConfig, DeviceRequest};
use crate::error::{EngineError, Result};
use crate::runtime::ModelRuntime;
use crate::types::{SamplingParams, TokenId};

/// Number of recent context tokens considered by the repetition penalty.
const REPEAT_CONTEXT_SIZE: usize = 128;

/// Autoregressive llama-family model loaded from a quantized GGUF file.
///
/// Weights and forward passes go through candle's `quantized_llama`, prompt
/// encoding through the companion HF tokenizer, and per-token output bytes
/// through the GGUF vocabulary, which preserves raw byte-fallback pieces the
/// string decoder would mangle. The vocabulary must be SentencePiece-style,
/// with `▁` word markers and `<0xNN>` byte-fallback entries.
pub struct GgufRuntime {
    model: ModelWeights,
    tokenizer: Tokenizer,
    pieces: Vec<Vec<u8>>,
    eos_token: TokenId,
    context_length: usize,
    device: Device,
    position: usize,
    context: Vec<TokenId>,
    last_logits: Option<Tensor>,
    sampler: Option<CachedSampler>,
}

struct CachedSampler {
    params: SamplingParams,
    processor: LogitsProcessor,
}

impl GgufRuntime {
    /// Load quantized weights and the companion tokenizer onto the
    /// configured device.
    pub fn load(config: &CompletionConfig) -> Result<Self> {
        let device = DeviceRequest::parse(&config.device)?.resolve()?;

        let tokenizer = Tokenizer::from_file(&config.tokenizer).map_err(|error| {
            EngineError::Tokenizer {
                message: format!(
                    "failed to load {}: {}",
                    config.tokenizer.display(),
                    error
                ),
            }
        })?;

        let mut file =
            File::open(&config.path).map_err(|error| load_error(&config.path, error))?;
        let content = gguf_file::Content::read(&mut file)
            .map_err(|error| load_error(&config.path, error))?;

        let pieces = vocab_pieces(&content, &config.path)?;
        let eos_token = eos_token(&content, &tokenizer, &config.path)?;

        let model = ModelWeights::from_gguf(content, &mut file, &device)
            .map_err(|error| load_error(&config.path, error))?;

        info!(
            name = %config.name,
            path = %config.path.display(),
            device = %config.device,
            context_length = config.context_length,
            vocab_size = pieces.len(),
            "loaded completion model"
        );

        Ok(Self {
            model,
            tokenizer,
            pieces,
            eos_token,
            context_length: config.context_length,
            device,
            position: 0,
            context: Vec::new(),
            last_logits: None,
            sampler: None,
        })
    }
}

impl ModelRuntime for GgufRuntime {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>> {
        let encoding = self.tokenizer.encode(text, true).map_err(|error| {
            EngineError::Tokenizer {
                message: format!("tokenization failed: {}", error),
            }
        })?;
        Ok(encoding.get_ids().to_vec())
    }

    fn detokenize(&self, tokens: &[TokenId]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for &token in tokens {
            if let Some(piece) = self.pieces.get(token as usize) {
                bytes.extend_from_slice(piece);
            }
        }
        bytes
    }

    fn eval(&mut self, tokens: &[TokenId]) -> Result<()> {
        if tokens.is_empty() {
            return Ok(());
        }
        if self.position + tokens.len() > self.context_length {
            return Err(EngineError::Runtime {
                message: format!(
                    "context window exhausted: {} + {} tokens exceeds {}",
                    self.position,
                    tokens.len(),
                    self.context_length
                ),
            });
        }

        let input = Tensor::new(tokens, &self.device)?.unsqueeze(0)?;
        let logits = self.model.forward(&input, self.position)?;
        self.last_logits = Some(logits.squeeze(0)?);
        self.position += tokens.len();
        self.context.extend_from_slice(tokens);
        Ok(())
    }

    fn sample(&mut self, params: &SamplingParams) -> Result<TokenId> {
        let logits = self.last_logits.as_ref().ok_or_else(|| EngineError::Runtime {
            message: "sample called before any context was evaluated".to_string(),
        })?;

        let logits = if params.repetition_penalty != 1.0 {
            let start_at = self.context.len().saturating_sub(REPEAT_CONTEXT_SIZE);
            candle_transformers::utils::apply_repeat_penalty(
                logits,
                params.repetition_penalty,
                &self.context[start_at..],
            )?
        } else {
            logits.clone()
        };

        // Rebuilding the processor re-seeds its RNG, so reuse it as long as
        // the parameters stay the same.
        if self.sampler.as_ref().is_some_and(|cached| cached.params != *params) {
            self.sampler = None;
        }
        let cached = self.sampler.get_or_insert_with(|| CachedSampler {
            params: *params,
            processor: build_processor(params),
        });

        Ok(cached.processor.sample(&logits)?)
    }

    fn is_eos(&self, token: TokenId) -> bool {
        token == self.eos_token
    }

    fn reset(&mut self) {
        // The next forward pass at position zero makes the model rebuild
        // its KV cache from scratch.
        self.position = 0;
        self.context.clear();
        self.last_logits = None;
    }
}

/// Translate the requested sampling behavior into a candle processor.
fn build_processor(params: &SamplingParams) -> LogitsProcessor {
    let temperature = params.temperature;
    let sampling = if temperature <= 0.0 {
        Sampling::ArgMax
    } else if params.top_p >= 1.0 {
        Sampling::All { temperature }
    } else {
        Sampling::TopP { p: params.top_p, temperature }
    };
    LogitsProcessor::from_sampling(params.seed, sampling)
}

fn load_error(path: &Path, error: impl StdError + Send + Sync + 'static) -> EngineError {
    EngineError::ModelLoad {
        message: error.to_string(),
        path: path.to_path_buf(),
        source: Some(Box::new(error)),
    }
}

/// Raw output bytes for every vocabulary entry, in token-id order.
fn vocab_pieces(content: &gguf_file::Content, path: &Path) -> Result<Vec<Vec<u8>>> {
    let tokens = content
        .metadata
        .get("tokenizer.ggml.tokens")
        .ok_or_else(|| EngineError::ModelLoad {
            message: "GGUF metadata is missing tokenizer.ggml.tokens".to_string(),
            path: path.to_path_buf(),
            source: None,
        })?
        .to_vec()
        .map_err(|error| load_error(path, error))?;

    let mut pieces = Vec::with_capacity(tokens.len());
    for value in tokens {
        let piece = value.to_string().map_err(|error| load_error(path, error))?;
        pieces.push(piece_bytes(piece));
    }
    Ok(pieces)
}

/// End-of-sequence token id from GGUF metadata, falling back to the
/// tokenizer's `</s>` entry.
fn eos_token(
    content: &gguf_file::Content,
    tokenizer: &Tokenizer,
    path: &Path,
) -> Result<TokenId> {
    if let Some(value) = content.metadata.get("tokenizer.ggml.eos_token_id") {
        return value.to_u32().map_err(|error| load_error(path, error));
    }
    tokenizer.token_to_id("</s>").ok_or_else(|| EngineError::ModelLoad {
        message: "no end-of-sequence token in GGUF metadata or tokenizer".to_string(),
        path: path.to_path_buf(),
        source: None,
    })
}

/// Map a vocabulary piece to the raw bytes it contributes to output text.
///
/// SentencePiece byte-fallback entries are spelled `<0xNN>` and stand for a
/// single raw byte; ordinary pieces mark word boundaries with U+2581.
fn piece_bytes(piece: &str) -> Vec<u8> {
    if let Some(byte) = byte_fallback(piece) {
        return vec![byte];
    }
    piece.replace('\u{2581}', " ").into_bytes()
}

fn byte_fallback(piece: &str) -> Option<u8> {
    let hex = piece.strip_prefix("<0x")?.strip_suffix('>')?;
    u8::from_str_radix(hex, 16).ok()
}
