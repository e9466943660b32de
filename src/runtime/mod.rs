//! Model runtime contract and implementations

mod gguf;

pub use gguf::GgufRuntime;

use crate::error::Result;
use crate::types::{SamplingParams, TokenId};

/// Operations a generation session needs from an autoregressive model.
///
/// Tokenization, detokenization, sampling math and context management are
/// owned by the implementor; the session only drives these calls in order.
/// The context is stateful: `eval` appends to it and `reset` clears it.
pub trait ModelRuntime {
    /// Encode text into model tokens.
    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>>;

    /// Raw bytes for the given tokens, without decode validation.
    ///
    /// The returned bytes may end mid-character; callers are expected to
    /// reassemble them across token boundaries.
    fn detokenize(&self, tokens: &[TokenId]) -> Vec<u8>;

    /// Feed tokens into the running context.
    fn eval(&mut self, tokens: &[TokenId]) -> Result<()>;

    /// Sample the next token from the current context state.
    fn sample(&mut self, params: &SamplingParams) -> Result<TokenId>;

    /// True when the token marks end-of-sequence.
    fn is_eos(&self, token: TokenId) -> bool;

    /// Clear the running context so the model can serve an independent call.
    fn reset(&mut self);
}
