//! Incremental UTF-8 reassembly for byte-level token streams
//!
//! Detokenizing one token at a time can split a multi-byte character across
//! token boundaries. The assembler buffers raw bytes and only releases text
//! once trailing bytes form complete characters.

/// Accumulates raw token bytes and yields decodable text.
#[derive(Debug, Default)]
pub struct Utf8Assembler {
    pending: Vec<u8>,
}

impl Utf8Assembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the raw bytes of one detokenized token and return every
    /// character that became decodable.
    ///
    /// A trailing incomplete sequence is withheld for the next call. Bytes
    /// that can never form a valid character are dropped silently; the
    /// emitted text is lossy but never mangled.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let buffer = std::mem::take(&mut self.pending);
        let mut complete = String::new();
        let mut offset = 0;

        while offset < buffer.len() {
            match std::str::from_utf8(&buffer[offset..]) {
                Ok(text) => {
                    complete.push_str(text);
                    offset = buffer.len();
                }
                Err(error) => {
                    let valid_end = offset + error.valid_up_to();
                    complete.push_str(&String::from_utf8_lossy(&buffer[offset..valid_end]));
                    match error.error_len() {
                        // Undecodable bytes are discarded, not surfaced.
                        Some(invalid) => offset = valid_end + invalid,
                        // Incomplete trailing sequence: hold it back until
                        // the next token supplies the rest.
                        None => {
                            self.pending.extend_from_slice(&buffer[valid_end..]);
                            offset = buffer.len();
                        }
                    }
                }
            }
        }

        complete
    }

    /// Bytes withheld as the possible start of an unfinished character.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}
