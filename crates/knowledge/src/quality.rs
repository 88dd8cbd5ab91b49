//! Chunk quality filtering.
//!
//! Runs as a separate pass after chunking: fragments that are too short
//! to carry meaning are dropped and the survivors re-indexed.

use crate::chunker::chunk_id;
use crate::types::Chunk;
use ragbot_core::config::ChunkingSettings;

/// Minimum size a chunk must reach to be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityFilter {
    pub min_chars: usize,
    pub min_words: usize,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self {
            min_chars: 50,
            min_words: 5,
        }
    }
}

impl From<&ChunkingSettings> for QualityFilter {
    fn from(settings: &ChunkingSettings) -> Self {
        Self {
            min_chars: settings.min_chars,
            min_words: settings.min_words,
        }
    }
}

impl QualityFilter {
    /// True when the trimmed text is long enough and has enough words.
    pub fn accepts(&self, text: &str) -> bool {
        let trimmed = text.trim();
        trimmed.chars().count() >= self.min_chars
            && trimmed.split_whitespace().count() >= self.min_words
    }

    /// Drop rejected chunks and re-index the rest `0..N-1`.
    ///
    /// Ids are re-derived for the new positions. Applying the filter to
    /// its own output changes nothing.
    pub fn apply(&self, document_id: &str, chunks: Vec<Chunk>) -> Vec<Chunk> {
        let before = chunks.len();

        let kept: Vec<Chunk> = chunks
            .into_iter()
            .filter(|chunk| self.accepts(&chunk.text))
            .enumerate()
            .map(|(i, mut chunk)| {
                let index = i as u32;
                if chunk.index != index {
                    chunk.index = index;
                    chunk.id = chunk_id(document_id, index, &chunk.text);
                }
                chunk
            })
            .collect();

        if kept.len() < before {
            tracing::debug!(
                "Quality filter dropped {} of {} chunks",
                before - kept.len(),
                before
            );
        }

        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk_document;
    use chrono::Utc;

    fn chunk(index: u32, text: &str) -> Chunk {
        Chunk::new(chunk_id("doc", index, text), index, text.to_string(), Utc::now())
    }

    #[test]
    fn test_tiny_chunk_is_dropped() {
        let chunks = chunk_document("doc", "Hi.", 1000, 0).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(QualityFilter::default().apply("doc", chunks).is_empty());
    }

    #[test]
    fn test_six_words_sixty_chars_survives() {
        let text = "Embedding networks transform paragraphs into representations.";
        assert_eq!(text.split_whitespace().count(), 6);
        assert!(text.chars().count() >= 60);

        let chunks = vec![chunk(0, text)];
        let kept = QualityFilter::default().apply("doc", chunks);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, text);
    }

    #[test]
    fn test_long_but_few_words_rejected() {
        let text = "Supercalifragilisticexpialidocious antidisestablishmentarianism";
        assert!(text.chars().count() >= 50);
        assert!(!QualityFilter::default().accepts(text));
    }

    #[test]
    fn test_reindexes_contiguously() {
        let good_a = "This chunk has plenty of words and more than fifty characters.";
        let good_b = "Another chunk that also has plenty of words and enough length.";
        let chunks = vec![
            chunk(0, "too short"),
            chunk(1, good_a),
            chunk(2, "x"),
            chunk(3, good_b),
        ];

        let kept = QualityFilter::default().apply("doc", chunks);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].index, 0);
        assert_eq!(kept[1].index, 1);
        assert_eq!(kept[0].text, good_a);
        assert_eq!(kept[0].id, chunk_id("doc", 0, good_a));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let text = "Retrieval augmented generation grounds answers in documents. \
                    Short. The quality filter removes fragments that carry no meaning.";
        let chunks = chunk_document("doc", text, 70, 10).unwrap();
        let filter = QualityFilter::default();

        let once = filter.apply("doc", chunks);
        let twice = filter.apply("doc", once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_from_settings() {
        let settings = ChunkingSettings {
            min_chars: 10,
            min_words: 2,
            ..ChunkingSettings::default()
        };
        let filter = QualityFilter::from(&settings);
        assert!(filter.accepts("two words here"));
    }
}
