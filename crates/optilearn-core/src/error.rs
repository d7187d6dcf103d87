//! Typed errors for the recommendation pipeline.
//!
//! Lower-level components return [`EmbeddingError`] and [`CorpusError`];
//! the orchestrator boundary exposes [`RecommendationError`], which wraps
//! them 1:1 so callers can match a single type and inspect the cause.

use thiserror::Error;

/// Failures from an embedding provider.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Input was blank after trimming; no request was sent.
    #[error("embedding input is empty")]
    EmptyInput,

    /// Transient failures exhausted the retry budget.
    #[error("embedding provider unavailable after {attempts} attempt(s): {last_error}")]
    ProviderUnavailable { attempts: u32, last_error: String },

    /// The caller's deadline passed before a vector was returned.
    #[error("embedding deadline exceeded")]
    DeadlineExceeded,

    /// Non-retryable client error (4xx other than 429).
    #[error("embedding provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The provider answered with something that is not a usable vector.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding provider is disabled")]
    Disabled,
}

/// Failures while locating or decoding a corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus not found: {0}")]
    NotFound(String),

    /// Top-level shape is not a list, a known wrapper object, or JSON lines.
    #[error("corpus format error: {0}")]
    Format(String),

    #[error("failed to read corpus {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Umbrella error returned by `recommend()`.
#[derive(Debug, Error)]
pub enum RecommendationError {
    /// Empty requirements, tech ratio outside `[0, 100]`, or `top_k == 0`.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    /// Query vector and corpus vectors come from different models.
    #[error("query vector has {query} dimensions but the corpus uses {corpus}")]
    DimensionMismatch { query: usize, corpus: usize },
}

impl RecommendationError {
    /// Stable machine-readable reason, used in
    /// "no recommendations available, reason: <kind>" messages and HTTP
    /// error codes.
    pub fn kind(&self) -> &'static str {
        match self {
            RecommendationError::InvalidInput(_) => "invalid_input",
            RecommendationError::Embedding(e) => match e {
                EmbeddingError::EmptyInput => "empty_input",
                EmbeddingError::ProviderUnavailable { .. } => "provider_unavailable",
                EmbeddingError::DeadlineExceeded => "deadline_exceeded",
                EmbeddingError::Rejected { .. } => "provider_rejected",
                EmbeddingError::InvalidResponse(_) => "invalid_provider_response",
                EmbeddingError::Disabled => "embedding_disabled",
            },
            RecommendationError::Corpus(e) => match e {
                CorpusError::NotFound(_) => "corpus_not_found",
                CorpusError::Format(_) | CorpusError::Io { .. } => "corpus_format",
            },
            RecommendationError::DimensionMismatch { .. } => "dimension_mismatch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_maps_nested_causes() {
        let err: RecommendationError = EmbeddingError::DeadlineExceeded.into();
        assert_eq!(err.kind(), "deadline_exceeded");

        let err: RecommendationError = CorpusError::NotFound("x.json".into()).into();
        assert_eq!(err.kind(), "corpus_not_found");

        let err = RecommendationError::InvalidInput("top_k must be > 0".into());
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn test_transparent_display() {
        let err: RecommendationError = EmbeddingError::ProviderUnavailable {
            attempts: 3,
            last_error: "503 Service Unavailable".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "embedding provider unavailable after 3 attempt(s): 503 Service Unavailable"
        );
    }
}
