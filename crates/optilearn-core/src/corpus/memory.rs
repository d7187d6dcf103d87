//! In-memory corpus source.
//!
//! Holds prebuilt [`LoadedCorpus`] snapshots keyed by kind. Used by tests and
//! by callers that assemble corpora programmatically.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{CorpusSource, LoadedCorpus};
use crate::error::CorpusError;
use crate::models::{CorpusKind, EmbeddingRecord};

#[derive(Debug, Default, Clone)]
pub struct InMemoryCorpus {
    corpora: HashMap<CorpusKind, Arc<LoadedCorpus>>,
}

impl InMemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of normalized records for `kind`.
    pub fn with_records(mut self, kind: CorpusKind, records: Vec<EmbeddingRecord>) -> Self {
        self.insert(LoadedCorpus::from_records(kind, records));
        self
    }

    pub fn insert(&mut self, corpus: LoadedCorpus) {
        self.corpora.insert(corpus.kind, Arc::new(corpus));
    }
}

#[async_trait]
impl CorpusSource for InMemoryCorpus {
    async fn load(&self, kind: CorpusKind) -> Result<Arc<LoadedCorpus>, CorpusError> {
        self.corpora
            .get(&kind)
            .cloned()
            .ok_or_else(|| CorpusError::NotFound(format!("in-memory {} corpus", kind)))
    }
}
