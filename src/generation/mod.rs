//! Streaming text generation over a model runtime

mod stop;
mod stream;
mod utf8;

pub use stop::{StopScan, StopSet};
pub use stream::GenerationStream;
pub use utf8::Utf8Assembler;
