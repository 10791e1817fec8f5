//! Incremental sentence segmentation over a fragment stream.
//!
//! Fragments are appended to a growing buffer; every completed sentence --
//! the shortest prefix ending at `.`, `!` or `?` followed by whitespace --
//! is emitted in order and consumed from the buffer, along with the
//! delimiting whitespace. Whatever remains when the stream ends is flushed
//! as one final segment.
//!
//! Abbreviations and decimal numbers can split early; the cost is a
//! mistimed speech cut, nothing more.

/// Splits a stream of text fragments into speakable sentences.
#[derive(Debug, Default)]
pub struct SentenceSegmenter {
    buffer: String,
}

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return every sentence completed by it.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.buffer.push_str(fragment);

        let mut sentences = Vec::new();
        while let Some(split) = boundary(&self.buffer) {
            let sentence = self.buffer[..split].trim().to_string();
            self.buffer = self.buffer[split..].trim_start().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
        }
        sentences
    }

    /// Emit the trailing text that never reached a sentence boundary.
    ///
    /// Call once when the stream ends; the buffer is left empty.
    pub fn flush(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let trimmed = rest.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Byte index just past the first sentence-terminal punctuation mark that
/// is followed by whitespace, if any.
fn boundary(buffer: &str) -> Option<usize> {
    let mut chars = buffer.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(_, next)) = chars.peek() {
                if next.is_whitespace() {
                    return Some(i + c.len_utf8());
                }
            }
        }
    }
    None
}
