//! Embedding provider trait and request deadlines.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement. Concrete providers (OpenAI, Ollama) live in the `optilearn`
//! app crate, which also enforces [`Deadline`]s with the tokio timer.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Point in time after which an embedding call must give up.
///
/// `Deadline::none()` means no limit. Deadlines are passed through
/// [`EmbeddingProvider::embed`] so providers can stop retrying once the
/// caller no longer cares about the answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    pub fn instant(&self) -> Option<Instant> {
        self.0
    }

    /// Time left, or `None` when unbounded. Saturates at zero.
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }
}

/// Trait for embedding providers.
///
/// Implementations receive text that has already passed [`prepare_input`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a single text, retrying transient failures internally.
    async fn embed(&self, text: &str, deadline: Deadline) -> Result<Vec<f32>, EmbeddingError>;
}

/// Collapse whitespace runs and reject blank input.
///
/// Runs before any provider is contacted, so blank requirement text never
/// costs a network round trip.
pub fn prepare_input(text: &str) -> Result<String, EmbeddingError> {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }
    Ok(cleaned)
}
