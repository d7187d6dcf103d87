//! Collapse per-module records into one candidate per course.
//!
//! A course corpus holds one embedding per week/module. A query should
//! surface each course once, represented by its best-matching unit.

use std::collections::HashMap;

use crate::models::EmbeddingRecord;

/// A corpus record paired with its raw similarity to the query.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityHit<'a> {
    pub record: &'a EmbeddingRecord,
    pub similarity_score: f64,
}

/// Keep the highest-scoring hit per `entity_id`.
///
/// Output preserves the order in which each entity was first seen. Ties
/// keep the earlier hit. Records with a blank `entity_id` are never merged:
/// each one survives as its own group and a warning is logged.
pub fn dedupe(hits: Vec<SimilarityHit<'_>>) -> Vec<SimilarityHit<'_>> {
    let mut best: Vec<SimilarityHit<'_>> = Vec::with_capacity(hits.len());
    let mut index_by_id: HashMap<&str, usize> = HashMap::new();

    for hit in hits {
        if !hit.record.has_entity_id() {
            tracing::warn!(
                display_name = %hit.record.display_name,
                unit = hit.record.unit_key.as_deref().unwrap_or("-"),
                "record has no entity id; keeping it as a separate candidate"
            );
            best.push(hit);
            continue;
        }

        match index_by_id.get(hit.record.entity_id.as_str()) {
            Some(&i) => {
                if hit.similarity_score > best[i].similarity_score {
                    best[i] = hit;
                }
            }
            None => {
                index_by_id.insert(hit.record.entity_id.as_str(), best.len());
                best.push(hit);
            }
        }
    }

    best
}
