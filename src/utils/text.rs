//! Sentence splitting and text truncation shared by chunking, snippets and
//! the highlight fallback.

/// Split text into sentences on `.`/`!`/`?` followed by whitespace (or end of
/// input). Sentences keep their trailing terminator; surrounding whitespace is
/// trimmed and empty pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = match chars.peek() {
                Some(next) => next.is_whitespace(),
                None => true,
            };
            if at_boundary {
                let sentence = current.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                current.clear();
            }
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// Truncate to at most `max` characters without splitting a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        let text = "Sentence one. Sentence two! Sentence three? Sentence four.";
        assert_eq!(
            split_sentences(text),
            vec![
                "Sentence one.",
                "Sentence two!",
                "Sentence three?",
                "Sentence four.",
            ]
        );
    }

    #[test]
    fn test_split_keeps_inline_periods() {
        // "3.5" has no whitespace after the period, so it is not a boundary.
        let text = "Accuracy was 3.5 points higher. A second claim.";
        assert_eq!(
            split_sentences(text),
            vec!["Accuracy was 3.5 points higher.", "A second claim."]
        );
    }

    #[test]
    fn test_split_unterminated_tail() {
        assert_eq!(
            split_sentences("First. trailing fragment"),
            vec!["First.", "trailing fragment"]
        );
    }

    #[test]
    fn test_split_empty() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello world", 5), "hello");
        // Multi-byte chars are counted as chars, not bytes.
        assert_eq!(truncate_chars("héllo", 2), "hé");
    }
}
