//! Re-batching of incremental model output into display tokens

/// Buffers text increments and releases them at natural boundaries
///
/// Sentence ends (`.`, `!`, `?` followed by whitespace) and newlines flush
/// immediately. Otherwise text is held until `min_chars` are buffered and
/// then released up to the last whitespace. A word is never split; text with
/// no boundary stays buffered until [`TokenBatcher::finish`].
#[derive(Debug)]
pub struct TokenBatcher {
    buffer: String,
    min_chars: usize,
}

impl TokenBatcher {
    pub fn new(min_chars: usize) -> Self {
        Self {
            buffer: String::new(),
            min_chars: min_chars.max(1),
        }
    }

    /// Add an increment; returns a batch if a boundary was reached
    pub fn push(&mut self, chunk: &str) -> Option<String> {
        self.buffer.push_str(chunk);

        let end = self
            .sentence_boundary()
            .or_else(|| self.word_boundary())?;

        let rest = self.buffer.split_off(end);
        Some(std::mem::replace(&mut self.buffer, rest))
    }

    /// Remaining buffered text, if any
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    /// Byte offset just past the last sentence end or newline
    fn sentence_boundary(&self) -> Option<usize> {
        let mut boundary = None;
        let mut prev = None;
        for (idx, ch) in self.buffer.char_indices() {
            let after = idx + ch.len_utf8();
            if ch == '\n' || (ch.is_whitespace() && matches!(prev, Some('.' | '!' | '?'))) {
                boundary = Some(after);
            }
            prev = Some(ch);
        }
        boundary
    }

    /// Byte offset just past the last whitespace, once enough text is buffered
    fn word_boundary(&self) -> Option<usize> {
        if self.buffer.chars().count() < self.min_chars {
            return None;
        }
        self.buffer
            .char_indices()
            .filter(|(_, ch)| ch.is_whitespace())
            .last()
            .map(|(idx, ch)| idx + ch.len_utf8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(chunks: &[&str], min_chars: usize) -> Vec<String> {
        let mut batcher = TokenBatcher::new(min_chars);
        let mut out: Vec<String> = chunks.iter().filter_map(|c| batcher.push(c)).collect();
        out.extend(batcher.finish());
        out
    }

    #[test]
    fn test_flushes_at_sentence_end() {
        let out = run(&["The soup ", "was cold. The", " staff was kind."], 100);
        assert_eq!(out, vec!["The soup was cold. ", "The staff was kind."]);
    }

    #[test]
    fn test_newline_is_a_boundary() {
        let out = run(&["- cold soup\n- rude", " staff"], 100);
        assert_eq!(out, vec!["- cold soup\n", "- rude staff"]);
    }

    #[test]
    fn test_word_boundary_after_min_chars() {
        let out = run(&["many customers men", "tion friendly service"], 10);
        assert_eq!(out[0], "many customers ");
        assert_eq!(out.concat(), "many customers mention friendly service");
        for batch in &out[..out.len() - 1] {
            assert!(batch.ends_with(char::is_whitespace));
        }
    }

    #[test]
    fn test_never_splits_a_word() {
        let out = run(&["supercalifragilistic", "expialidocious"], 4);
        assert_eq!(out, vec!["supercalifragilisticexpialidocious"]);
    }

    #[test]
    fn test_concatenation_preserves_text() {
        let text = "Reviewers love the brisket! Some say it's pricey.\nOverall: 4.5 stars, mostly.";
        let chunks: Vec<String> = text.chars().map(|c| c.to_string()).collect();
        let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        assert_eq!(run(&refs, 8).concat(), text);
    }
}
