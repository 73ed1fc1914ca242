//! Configuration for chunking, retrieval, and answer generation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for the question-answering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks handed to the answer policy per query.
    pub top_k: usize,
    /// Optional score cut applied after top-k; when set, results must score
    /// strictly above it. Unset by default, so retrieval is plain top-k.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,
    /// Joined context shorter than this (after trimming) counts as no context.
    pub min_context_chars: usize,
    /// Upper bound on a single generative model call.
    #[serde(with = "duration_secs")]
    pub generation_timeout: Duration,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 200,
            top_k: 4,
            similarity_threshold: None,
            min_context_chars: 20,
            generation_timeout: Duration::from_secs(30),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Only retrieve results scoring strictly above `threshold`.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set the minimum trimmed context length that is worth sending to the model.
    pub fn min_context_chars(mut self, chars: usize) -> Self {
        self.config.min_context_chars = chars;
        self
    }

    /// Set the timeout applied to each generative model call.
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.config.generation_timeout = timeout;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_corpus_settings() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 800);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 4);
        assert_eq!(config.min_context_chars, 20);
        assert_eq!(config.similarity_threshold, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
        assert!(err.to_string().contains("chunk_overlap (100)"));
    }

    #[test]
    fn rejects_zero_top_k_and_zero_size() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().chunk_size(0).chunk_overlap(0).build().is_err());
    }

    #[test]
    fn timeout_serializes_as_seconds() {
        let config =
            RagConfig::builder().generation_timeout(Duration::from_millis(1500)).build().unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["generation_timeout"], serde_json::json!(1.5));
        assert!(json.get("similarity_threshold").is_none());
        let back: RagConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn threshold_is_opt_in() {
        let config = RagConfig::builder().similarity_threshold(0.25).build().unwrap();
        assert_eq!(config.similarity_threshold, Some(0.25));
    }
}
