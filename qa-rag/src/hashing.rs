//! Offline embedding provider based on signed feature hashing.
//!
//! Each lower-cased alphanumeric word and each pair of adjacent words is
//! hashed with 64-bit FNV-1a into one of `dimensions` buckets; a second bit
//! of the hash picks the sign. The bucket counts are L2-normalised, so two
//! texts score mostly by the words and word pairs they share; unrelated
//! features that land in the same bucket can push a score either way. Only
//! text with no words at all embeds to the zero vector. Nothing is
//! downloaded and the same text always produces the same vector.

use async_trait::async_trait;

use crate::embedding::{EmbeddingProvider, normalize};
use crate::error::{RagError, Result};

/// Default vector width for [`HashingEmbeddingProvider`].
pub const DEFAULT_HASHING_DIMENSIONS: usize = 512;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Bigram features count for half as much as single words.
const BIGRAM_WEIGHT: f32 = 0.5;

/// A deterministic, dependency-free [`EmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    /// Create a provider producing vectors of the given width.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::ConfigError(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimensions })
    }

    fn add_feature(&self, v: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.dimensions as u64) as usize;
        let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        let words = tokenize(text);
        for word in &words {
            self.add_feature(&mut v, word, 1.0);
        }
        for pair in words.windows(2) {
            self.add_feature(&mut v, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }
        normalize(&mut v);
        v
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self { dimensions: DEFAULT_HASHING_DIMENSIONS }
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> String {
        format!("hashing-fnv1a-v1/{}", self.dimensions)
    }
}

/// Split text into lower-cased runs of alphanumeric characters.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}
