
use crate::semantic::{Embedder, EmbeddingError};

/// Counts occurrences of a fixed vocabulary, one dimension per word.
pub struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
        }
    }
}

impl Embedder for KeywordEmbedder {
    fn name(&self) -> &str {
        "keywords"
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
            .collect();

        Ok(self
            .vocabulary
            .iter()
            .map(|word| tokens.iter().filter(|t| t.as_str() == *word).count() as f32)
            .collect())
    }
}

/// Always fails, like a model whose weights never loaded.
pub struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn name(&self) -> &str {
        "broken"
    }

    fn dimensions(&self) -> usize {
        0
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::EmbeddingFailed("model not loaded".to_string()))
    }
}
