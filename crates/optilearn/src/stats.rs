//! Corpus statistics.
//!
//! Quick health overview of the configured corpora: record counts, skipped
//! entries, dimensionality, distinct entities and the type distribution the
//! classifier assigns. Used by `optilearn stats` to confirm a fresh export
//! loads the way the engine will see it.

use std::collections::BTreeMap;

use anyhow::Result;

use optilearn_core::classify::{KeywordClassifier, TypeClassifier};
use optilearn_core::corpus::LoadedCorpus;
use optilearn_core::models::EntityType;

use crate::config::Config;
use crate::corpus::load_corpus_file;
use crate::recommend::CorpusSelection;

/// Summary numbers for one loaded corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusStats {
    pub records: usize,
    pub skipped: usize,
    pub dims: Option<usize>,
    pub entities: usize,
    /// Per-entity classification counts (one vote per distinct entity id).
    pub types: BTreeMap<EntityType, usize>,
}

pub fn corpus_stats(corpus: &LoadedCorpus, classifier: &dyn TypeClassifier) -> CorpusStats {
    let mut seen = std::collections::HashSet::new();
    let mut types = BTreeMap::new();
    for record in &corpus.records {
        if record.has_entity_id() && !seen.insert(record.entity_id.as_str()) {
            continue;
        }
        *types.entry(classifier.classify(record)).or_insert(0) += 1;
    }

    CorpusStats {
        records: corpus.len(),
        skipped: corpus.skipped,
        dims: corpus.dims,
        entities: corpus.distinct_entities(),
        types,
    }
}

/// Run the stats command: load each selected corpus and print a summary.
pub async fn run_stats(config: &Config, selection: CorpusSelection) -> Result<()> {
    let classifier = KeywordClassifier::default();

    println!("OptiLearn Corpus Stats");
    println!("======================");

    for &kind in selection.kinds() {
        println!();
        println!("  {}", kind);

        let Some(path) = config.corpus.path_for(kind) else {
            println!("    not configured");
            continue;
        };
        println!("    Path:        {}", path.display());

        let corpus = match load_corpus_file(kind, path, config.embedding.dims).await {
            Ok(c) => c,
            Err(e) => {
                println!("    unavailable: {}", e);
                continue;
            }
        };

        let stats = corpus_stats(&corpus, &classifier);
        println!("    Records:     {}", stats.records);
        println!("    Skipped:     {}", stats.skipped);
        println!(
            "    Dimensions:  {}",
            stats
                .dims
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        println!("    Entities:    {}", stats.entities);
        for (entity_type, count) in &stats.types {
            println!("      {:<10} {}", entity_type.as_str(), count);
        }
    }

    println!();
    Ok(())
}
