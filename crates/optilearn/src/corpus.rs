//! File-backed corpus source.
//!
//! Reads the JSON (or JSON-lines) exports named in `[corpus]` on every
//! `load`, so a refreshed export is picked up without a restart. When
//! `[embedding].dims` is set, records of any other length are skipped.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use optilearn_core::corpus::{parse_corpus_str, CorpusEncoding, CorpusSource, LoadedCorpus};
use optilearn_core::error::CorpusError;
use optilearn_core::models::CorpusKind;

use crate::config::CorpusConfig;

#[derive(Debug, Clone, Default)]
pub struct FileCorpusSource {
    paths: CorpusConfig,
    dims: Option<usize>,
}

impl FileCorpusSource {
    pub fn new(config: &CorpusConfig) -> Self {
        Self {
            paths: config.clone(),
            dims: None,
        }
    }

    /// Expect vectors of the embedding model's length.
    pub fn with_dims(mut self, dims: Option<usize>) -> Self {
        self.dims = dims;
        self
    }

    pub fn path_for(&self, kind: CorpusKind) -> Option<&Path> {
        self.paths.path_for(kind)
    }
}

/// Read and normalize one corpus file.
pub async fn load_corpus_file(
    kind: CorpusKind,
    path: &Path,
    expected_dims: Option<usize>,
) -> Result<LoadedCorpus, CorpusError> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            CorpusError::NotFound(path.display().to_string())
        } else {
            CorpusError::Io {
                path: path.display().to_string(),
                source: e,
            }
        }
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let encoding = CorpusEncoding::from_file_name(&file_name);

    let corpus = parse_corpus_str(kind, &contents, encoding, expected_dims)?;
    if corpus.skipped > 0 {
        tracing::warn!(
            corpus = %kind,
            path = %path.display(),
            skipped = corpus.skipped,
            "skipped corpus entries without a usable vector of the expected length"
        );
    }
    tracing::debug!(
        corpus = %kind,
        path = %path.display(),
        records = corpus.len(),
        dims = ?corpus.dims,
        "corpus loaded"
    );
    Ok(corpus)
}

#[async_trait]
impl CorpusSource for FileCorpusSource {
    async fn load(&self, kind: CorpusKind) -> Result<Arc<LoadedCorpus>, CorpusError> {
        let path = self
            .path_for(kind)
            .ok_or_else(|| CorpusError::NotFound(format!("no path configured for {}", kind)))?;
        Ok(Arc::new(load_corpus_file(kind, path, self.dims).await?))
    }
}
