//! The streaming generation session
//!
//! Drives one autoregressive loop over a [`ModelRuntime`]: sample a token,
//! reassemble its bytes into text, withhold anything that could still become
//! a stop string, and hand completed chunks to the caller. The session is a
//! lazy iterator; all generation work happens inside `next()`.

use std::iter::FusedIterator;

use tracing::debug;

use crate::error::Result;
use crate::generation::stop::{StopScan, StopSet};
use crate::generation::utf8::Utf8Assembler;
use crate::runtime::ModelRuntime;
use crate::types::{FinishReason, GenerationRequest, SamplingParams, StreamChunk, TokenId};

/// Where the session resumes on the next pull.
#[derive(Debug)]
enum State {
    /// Prompt tokens not yet fed to the model.
    Start,
    /// A chunk was just emitted; the sampled token still needs to be
    /// counted against the budget and fed back into the context.
    Resume(TokenId),
    /// Ready to sample the next token.
    Sampling,
    /// Terminal; every further pull returns `None`.
    Done,
}

/// Lazy, finite, non-restartable stream of generated text chunks.
///
/// Each element before the last carries `finish: None`; the final element
/// always carries a [`FinishReason`], even when its text is empty. A runtime
/// failure ends the stream with an `Err` and no final chunk. The runtime is
/// borrowed exclusively for the life of the stream and is reset only when
/// the session completes normally; dropping the stream early leaves the
/// context as-is.
pub struct GenerationStream<'model, M: ModelRuntime> {
    model: &'model mut M,
    prompt: Vec<TokenId>,
    sampling: SamplingParams,
    stops: StopSet,
    max_tokens: Option<usize>,
    assembler: Utf8Assembler,
    held: String,
    generated: usize,
    state: State,
}

impl<'model, M: ModelRuntime> GenerationStream<'model, M> {
    /// Set up a session over already-tokenized prompt tokens.
    ///
    /// Nothing touches the model until the first pull; prompt ingestion is
    /// as lazy as sampling. A `max_tokens` of zero means unbounded.
    pub fn new(model: &'model mut M, prompt: Vec<TokenId>, request: &GenerationRequest) -> Self {
        Self {
            model,
            prompt,
            sampling: request.sampling,
            stops: StopSet::new(request.stops.clone()),
            max_tokens: request.max_tokens.filter(|&max| max > 0),
            assembler: Utf8Assembler::new(),
            held: String::new(),
            generated: 0,
            state: State::Start,
        }
    }

    /// Number of tokens sampled so far.
    pub fn tokens_generated(&self) -> usize {
        self.generated
    }

    /// Produce the guaranteed final chunk and retire the session.
    fn finish(&mut self, reason: FinishReason) -> StreamChunk {
        self.state = State::Done;
        self.model.reset();
        debug!(reason = %reason, tokens = self.generated, "generation finished");
        StreamChunk {
            text: std::mem::take(&mut self.held),
            finish: Some(reason),
        }
    }

    /// Count a sampled token against the budget and feed it back into the
    /// model context. Returns the stream item that ends this pull, if any.
    fn account_and_feed(&mut self, token: TokenId) -> Option<Result<StreamChunk>> {
        self.generated += 1;
        if let Some(max) = self.max_tokens {
            if self.generated >= max {
                return Some(Ok(self.finish(FinishReason::Length)));
            }
        }
        if let Err(error) = self.model.eval(&[token]) {
            self.state = State::Done;
            return Some(Err(error));
        }
        None
    }

    /// Sample tokens until a chunk is ready or the session terminates.
    fn advance(&mut self) -> Option<Result<StreamChunk>> {
        loop {
            let token = match self.model.sample(&self.sampling) {
                Ok(token) => token,
                Err(error) => {
                    self.state = State::Done;
                    return Some(Err(error));
                }
            };

            if self.model.is_eos(token) {
                return Some(Ok(self.finish(FinishReason::Stop)));
            }

            let bytes = self.model.detokenize(&[token]);
            let decoded = self.assembler.push(&bytes);
            self.held.push_str(&decoded);

            match self.stops.scan(&self.held) {
                StopScan::Matched { end } => {
                    self.held.truncate(end);
                    return Some(Ok(self.finish(FinishReason::Stop)));
                }
                StopScan::Clear { withheld } => {
                    let ready = self.held.len() - withheld;
                    if ready > 0 {
                        let text: String = self.held.drain(..ready).collect();
                        self.state = State::Resume(token);
                        return Some(Ok(StreamChunk { text, finish: None }));
                    }
                }
            }

            // Nothing emittable yet; account for the token and keep going.
            if let Some(item) = self.account_and_feed(token) {
                return Some(item);
            }
        }
    }
}

impl<M: ModelRuntime> Iterator for GenerationStream<'_, M> {
    type Item = Result<StreamChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        match std::mem::replace(&mut self.state, State::Sampling) {
            State::Done => {
                self.state = State::Done;
                return None;
            }
            State::Start => {
                let prompt = std::mem::take(&mut self.prompt);
                debug!(prompt_tokens = prompt.len(), "generation started");
                if let Err(error) = self.model.eval(&prompt) {
                    self.state = State::Done;
                    return Some(Err(error));
                }
            }
            State::Resume(token) => {
                if let Some(item) = self.account_and_feed(token) {
                    return Some(item);
                }
            }
            State::Sampling => {}
        }
        self.advance()
    }
}

impl<M: ModelRuntime> FusedIterator for GenerationStream<'_, M> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::runtime::testing::ScriptedModel;
    use pretty_assertions::assert_eq;

    fn request(stops: &[&str], max_tokens: Option<usize>) -> GenerationRequest {
        GenerationRequest {
            stops: stops.iter().map(|s| s.to_string()).collect(),
            max_tokens,
            ..GenerationRequest::default()
        }
    }

    /// Drain a stream into (chunks, error) for assertions.
    fn collect(
        model: &mut ScriptedModel,
        stops: &[&str],
        max_tokens: Option<usize>,
    ) -> (Vec<StreamChunk>, Option<EngineError>) {
        let request = request(stops, max_tokens);
        let mut stream = GenerationStream::new(model, vec![11, 12], &request);
        let mut chunks = Vec::new();
        let mut failure = None;
        for item in &mut stream {
            match item {
                Ok(chunk) => chunks.push(chunk),
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }
        assert!(stream.next().is_none(), "stream must stay exhausted");
        (chunks, failure)
    }

    fn concat(chunks: &[StreamChunk]) -> String {
        chunks.iter().map(|chunk| chunk.text.as_str()).collect()
    }

    #[test]
    fn test_streams_words_then_finishes_on_eos() {
        let mut model = ScriptedModel::from_words(&["Hello", " world"]);
        let (chunks, failure) = collect(&mut model, &[], None);

        assert!(failure.is_none());
        assert_eq!(
            chunks,
            vec![
                StreamChunk { text: "Hello".to_string(), finish: None },
                StreamChunk { text: " world".to_string(), finish: None },
                StreamChunk { text: String::new(), finish: Some(FinishReason::Stop) },
            ]
        );
        assert_eq!(model.reset_calls, 1);
    }

    #[test]
    fn test_eos_on_first_token_yields_single_stop_chunk() {
        let mut model = ScriptedModel::new(&[]);
        let (chunks, failure) = collect(&mut model, &[], None);

        assert!(failure.is_none());
        assert_eq!(
            chunks,
            vec![StreamChunk { text: String::new(), finish: Some(FinishReason::Stop) }]
        );
    }

    #[test]
    fn test_max_tokens_bounds_generation() {
        let mut model = ScriptedModel::from_words(&["a", "b", "c", "d", "e"]);
        let (chunks, failure) = collect(&mut model, &[], Some(3));

        assert!(failure.is_none());
        assert_eq!(concat(&chunks), "abc");
        assert_eq!(chunks.last().unwrap().finish, Some(FinishReason::Length));

        // Prompt plus the first two tokens; the budget-ending token is
        // never fed back.
        assert_eq!(model.eval_calls.len(), 3);
        assert_eq!(model.eval_calls[0], vec![11, 12]);
        assert_eq!(model.eval_calls[1], vec![1]);
        assert_eq!(model.eval_calls[2], vec![2]);
        assert_eq!(model.reset_calls, 1);
    }

    #[test]
    fn test_max_tokens_zero_means_unbounded() {
        let mut model = ScriptedModel::from_words(&["a", "b", "c", "d", "e"]);
        let (chunks, failure) = collect(&mut model, &[], Some(0));

        assert!(failure.is_none());
        assert_eq!(concat(&chunks), "abcde");
        assert_eq!(chunks.last().unwrap().finish, Some(FinishReason::Stop));
    }

    #[test]
    fn test_multibyte_char_held_until_complete() {
        // '世' split across two tokens, then ASCII.
        let mut model = ScriptedModel::new(&[&[0xE4, 0xB8], &[0x96], b"!"]);
        let (chunks, failure) = collect(&mut model, &[], None);

        assert!(failure.is_none());
        assert_eq!(
            chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
            vec!["世", "!", ""]
        );
    }

    #[test]
    fn test_stop_string_never_surfaces() {
        let mut model = ScriptedModel::from_words(&["hel", "lo wo", "rld STOP tail"]);
        let (chunks, failure) = collect(&mut model, &["STOP"], None);

        assert!(failure.is_none());
        let text = concat(&chunks);
        assert_eq!(text, "hello world ");
        assert!(!text.contains("STOP"));
        assert_eq!(chunks.last().unwrap().finish, Some(FinishReason::Stop));
    }

    #[test]
    fn test_partial_stop_withheld_until_confirmed() {
        // "###" assembled one '#' per token across three tokens.
        let mut model = ScriptedModel::from_words(&["see #", "#", "# done"]);
        let (chunks, failure) = collect(&mut model, &["###"], None);

        assert!(failure.is_none());
        assert_eq!(concat(&chunks), "see ");
        assert_eq!(
            chunks,
            vec![
                StreamChunk { text: "see ".to_string(), finish: None },
                StreamChunk { text: String::new(), finish: Some(FinishReason::Stop) },
            ]
        );
    }

    #[test]
    fn test_withheld_partial_stop_flushes_at_eos() {
        // The trailing "E" could have begun "END" but never did; it belongs
        // to the caller once the model signals end-of-sequence.
        let mut model = ScriptedModel::from_words(&["finale E"]);
        let (chunks, failure) = collect(&mut model, &["END"], None);

        assert!(failure.is_none());
        assert_eq!(
            chunks,
            vec![
                StreamChunk { text: "finale ".to_string(), finish: None },
                StreamChunk { text: "E".to_string(), finish: Some(FinishReason::Stop) },
            ]
        );
    }

    #[test]
    fn test_withheld_text_flushes_on_length() {
        let mut model = ScriptedModel::from_words(&["aX"]);
        let (chunks, failure) = collect(&mut model, &["XY"], Some(1));

        assert!(failure.is_none());
        assert_eq!(
            chunks,
            vec![
                StreamChunk { text: "a".to_string(), finish: None },
                StreamChunk { text: "X".to_string(), finish: Some(FinishReason::Length) },
            ]
        );
    }

    #[test]
    fn test_no_leakage_for_any_split() {
        // The stop string arrives in varying piece shapes; emitted text may
        // never contain it.
        let cases: Vec<Vec<&[u8]>> = vec![
            vec![b"alpha <", b"|end|", b"> beta"],
            vec![b"alpha <|", b"en", b"d|> beta"],
            vec![b"alpha ", b"<|end|> beta"],
            vec![b"<|end|>"],
        ];
        for pieces in cases {
            let expected = if pieces[0] == b"<|end|>" { "" } else { "alpha " };
            let mut model = ScriptedModel::new(&pieces);
            let (chunks, failure) = collect(&mut model, &["<|end|>"], None);
            assert!(failure.is_none());
            let text = concat(&chunks);
            assert!(!text.contains("<|end|>"), "leaked stop in {:?}", text);
            assert_eq!(text, expected);
        }
    }

    #[test]
    fn test_sample_failure_propagates_without_final_chunk() {
        let mut model = ScriptedModel::from_words(&["a", "b"]);
        model.fail_sample_at = Some(0);
        let (chunks, failure) = collect(&mut model, &[], None);

        assert!(chunks.is_empty());
        assert!(matches!(failure, Some(EngineError::Runtime { .. })));
        assert_eq!(model.reset_calls, 0);
    }

    #[test]
    fn test_eval_failure_aborts_after_emitted_chunk() {
        let mut model = ScriptedModel::from_words(&["a", "b"]);
        // Call 0 ingests the prompt; call 1 feeds back the first token.
        model.fail_eval_at = Some(1);
        let (chunks, failure) = collect(&mut model, &[], None);

        assert_eq!(concat(&chunks), "a");
        assert!(chunks.iter().all(|chunk| chunk.finish.is_none()));
        assert!(matches!(failure, Some(EngineError::Runtime { .. })));
        assert_eq!(model.reset_calls, 0);
    }

    #[test]
    fn test_prompt_eval_failure_is_fatal() {
        let mut model = ScriptedModel::from_words(&["a"]);
        model.fail_eval_at = Some(0);
        let (chunks, failure) = collect(&mut model, &[], None);

        assert!(chunks.is_empty());
        assert!(failure.is_some());
    }

    #[test]
    fn test_nothing_runs_before_first_pull() {
        let mut model = ScriptedModel::from_words(&["a"]);
        {
            let request = request(&[], None);
            let _stream = GenerationStream::new(&mut model, vec![11], &request);
            // Dropped unpulled.
        }
        assert!(model.eval_calls.is_empty());
        assert_eq!(model.reset_calls, 0);
    }

    #[test]
    fn test_abandoned_stream_skips_reset() {
        let mut model = ScriptedModel::from_words(&["a", "b", "c"]);
        {
            let request = request(&[], None);
            let mut stream = GenerationStream::new(&mut model, vec![11], &request);
            let first = stream.next().unwrap().unwrap();
            assert_eq!(first.text, "a");
        }
        // Prompt was ingested, the sampled token was not fed back, and no
        // reset happened.
        assert_eq!(model.eval_calls, vec![vec![11]]);
        assert_eq!(model.reset_calls, 0);
    }

    #[test]
    fn test_token_count_tracks_sampled_tokens() {
        let mut model = ScriptedModel::from_words(&["a", "b", "c"]);
        let request = request(&[], Some(3));
        let mut stream = GenerationStream::new(&mut model, vec![11], &request);
        while let Some(item) = stream.next() {
            item.unwrap();
        }
        assert_eq!(stream.tokens_generated(), 3);
    }
}
