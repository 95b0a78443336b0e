//! Sentence-aware text chunking for dense retrieval.
//!
//! Chunks target ~512 tokens with a ~64-token overlapping stride between
//! consecutive chunks, approximated at 4 characters per token. Ordinals are
//! assigned contiguously from 0 in text order.

use crate::utils::split_sentences;

const TARGET_CHUNK_TOKENS: usize = 512;
const STRIDE_TOKENS: usize = 64;
const CHARS_PER_TOKEN: usize = 4;

const TARGET_CHUNK_CHARS: usize = TARGET_CHUNK_TOKENS * CHARS_PER_TOKEN;
const STRIDE_CHARS: usize = STRIDE_TOKENS * CHARS_PER_TOKEN;

/// One chunk of a document's text, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPiece {
    pub chunk_index: usize,
    pub text: String,
    pub section: String,
}

/// Chunk a block of text, keeping sentence boundaries intact and carrying an
/// overlapping tail of sentences into the next chunk.
pub fn chunk_text(text: &str, section: &str) -> Vec<ChunkPiece> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let sentences = split_sentences(text);
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;
    let mut chunk_index = 0usize;

    for sentence in sentences {
        let sentence_len = sentence.chars().count();

        if current_len + sentence_len > TARGET_CHUNK_CHARS && !current.is_empty() {
            chunks.push(ChunkPiece {
                chunk_index,
                text: current.join(" "),
                section: section.to_string(),
            });
            chunk_index += 1;

            // Drop leading sentences until only the stride-sized tail remains.
            while !current.is_empty() && current_len > STRIDE_CHARS {
                let removed = current.remove(0);
                current_len = current_len.saturating_sub(removed.chars().count() + 1);
            }
        }

        current_len += sentence_len + if current.is_empty() { 0 } else { 1 };
        current.push(sentence);
    }

    if !current.is_empty() {
        chunks.push(ChunkPiece {
            chunk_index,
            text: current.join(" "),
            section: section.to_string(),
        });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("One sentence. Another sentence.", "abstract");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "One sentence. Another sentence.");
        assert_eq!(chunks[0].section, "abstract");
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", "abstract").is_empty());
        assert!(chunk_text("   \n ", "abstract").is_empty());
    }

    #[test]
    fn test_long_text_splits_with_contiguous_ordinals() {
        // ~60 sentences of ~60 chars each, well past one chunk target.
        let sentence = "This sentence is used to pad the chunking input with text.";
        let text = vec![sentence; 60].join(" ");

        let chunks = chunk_text(&text, "description");
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert!(chunk.text.chars().count() <= TARGET_CHUNK_CHARS + sentence.len());
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let sentence = "Overlap padding sentence for the stride window check here.";
        let text = vec![sentence; 80].join(" ");

        let chunks = chunk_text(&text, "abstract");
        assert!(chunks.len() > 1);

        // The first chunk's last sentence reappears at the start of the next.
        let first_tail = chunks[0].text.split(". ").last().unwrap();
        assert!(chunks[1].text.contains(first_tail.trim_end_matches('.')));
    }
}
