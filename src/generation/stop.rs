//! Stop-string detection over accumulated generation text
//!
//! Emitting text the moment it decodes would leak stop-sequence fragments one
//! token before the stop is recognized. The matcher therefore reports both
//! full matches and the longest trailing run that could still grow into a
//! stop string, so the session can withhold it.

/// Outcome of scanning accumulated text against a stop set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopScan {
    /// A stop string occurs in the text. Only `text[..end]` may be emitted;
    /// everything at or after `end` is discarded.
    Matched {
        /// Byte offset of the leftmost stop occurrence.
        end: usize,
    },
    /// No stop string occurs. The trailing `withheld` bytes form the longest
    /// suffix that is still a prefix of some stop string and must be held
    /// back from emission.
    Clear {
        /// Byte length of the suffix to withhold.
        withheld: usize,
    },
}

/// Immutable set of stop strings, fixed for one generation call.
#[derive(Debug, Clone, Default)]
pub struct StopSet {
    stops: Vec<String>,
}

impl StopSet {
    /// Build a stop set from caller-supplied strings.
    pub fn new(stops: Vec<String>) -> Self {
        Self { stops }
    }

    /// True when no stop strings are configured.
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Scan `text` for full and partial stop matches.
    ///
    /// With an empty set this is a no-op: everything is emittable.
    pub fn scan(&self, text: &str) -> StopScan {
        if self.stops.is_empty() {
            return StopScan::Clear { withheld: 0 };
        }
        if let Some(end) = self.find_match(text) {
            return StopScan::Matched { end };
        }
        StopScan::Clear { withheld: self.longest_partial_suffix(text) }
    }

    /// Byte offset of the leftmost occurrence of any stop string.
    fn find_match(&self, text: &str) -> Option<usize> {
        self.stops.iter().filter_map(|stop| text.find(stop.as_str())).min()
    }

    /// Length of the longest suffix of `text` that is a prefix of any stop
    /// string. Ties across stops resolve to the longer prefix, so the
    /// longest possible pending match is always preserved.
    fn longest_partial_suffix(&self, text: &str) -> usize {
        let mut longest = 0;
        for stop in &self.stops {
            for len in (1..=stop.len()).rev() {
                if !stop.is_char_boundary(len) {
                    continue;
                }
                if text.ends_with(&stop[..len]) {
                    longest = longest.max(len);
                    break;
                }
            }
        }
        longest
    }
}
