//! Ranking pipeline.
//!
//! Turns a query vector and a loaded corpus into an ordered, truncated list
//! of [`RankedCandidate`]s:
//!
//! ```text
//! score every record (cosine)
//!   → drop scores below the similarity floor
//!   → dedupe by entity id (keep best unit)
//!   → classify + apply preference factor
//!   → sort by adjusted, raw, entity id
//!   → truncate to top_k, assign ranks
//! ```
//!
//! The floor is applied before deduplication so a course's weak modules can
//! never stand in for it. Everything here is synchronous and pure, so the
//! same inputs always produce the same ordered output.

use std::cmp::Ordering;

use crate::classify::TypeClassifier;
use crate::corpus::LoadedCorpus;
use crate::dedup::{dedupe, SimilarityHit};
use crate::error::RecommendationError;
use crate::models::{EntityType, RankedCandidate};
use crate::rerank::match_factor;
use crate::similarity::{cosine_similarity, match_percentage};

/// Minimum raw similarity for a record to be considered at all.
pub const DEFAULT_SIMILARITY_FLOOR: f64 = 0.2;

pub const MAX_TECH_RATIO: u8 = 100;

/// Per-call ranking knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankParams {
    pub similarity_floor: f64,
    /// Share of technical content the caller wants, `0..=100`.
    pub tech_ratio: u8,
    pub top_k: usize,
}

impl RankParams {
    pub fn new(tech_ratio: u8, top_k: usize) -> Self {
        Self {
            similarity_floor: DEFAULT_SIMILARITY_FLOOR,
            tech_ratio,
            top_k,
        }
    }

    pub fn with_floor(mut self, similarity_floor: f64) -> Self {
        self.similarity_floor = similarity_floor;
        self
    }

    pub fn validate(&self) -> Result<(), RecommendationError> {
        if self.tech_ratio > MAX_TECH_RATIO {
            return Err(RecommendationError::InvalidInput(format!(
                "tech_ratio must be between 0 and {}, got {}",
                MAX_TECH_RATIO, self.tech_ratio
            )));
        }
        if self.top_k == 0 {
            return Err(RecommendationError::InvalidInput(
                "top_k must be at least 1".into(),
            ));
        }
        if !self.similarity_floor.is_finite() {
            return Err(RecommendationError::InvalidInput(
                "similarity floor must be a finite number".into(),
            ));
        }
        Ok(())
    }
}

/// Reject blank requirement text before any provider is contacted.
pub fn validate_requirements(text: &str) -> Result<(), RecommendationError> {
    if text.trim().is_empty() {
        return Err(RecommendationError::InvalidInput(
            "requirements text is empty".into(),
        ));
    }
    Ok(())
}

/// Output of [`rank_corpus`] with the funnel counts used for logging.
#[derive(Debug, Clone)]
pub struct Ranking {
    pub candidates: Vec<RankedCandidate>,
    /// Records scored.
    pub considered: usize,
    /// Records at or above the floor.
    pub above_floor: usize,
    /// Distinct candidates after dedup.
    pub unique: usize,
}

struct Scored<'a> {
    hit: SimilarityHit<'a>,
    entity_type: EntityType,
    type_match_factor: f64,
    adjusted_similarity: f64,
}

/// Rank `corpus` against `query`.
///
/// Fails with [`RecommendationError::DimensionMismatch`] when the query and
/// corpus vectors have different lengths. An empty result is not an error.
pub fn rank_corpus(
    query: &[f32],
    corpus: &LoadedCorpus,
    params: &RankParams,
    classifier: &dyn TypeClassifier,
) -> Result<Ranking, RecommendationError> {
    params.validate()?;

    if let Some(dims) = corpus.dims {
        if dims != query.len() {
            return Err(RecommendationError::DimensionMismatch {
                query: query.len(),
                corpus: dims,
            });
        }
    }

    let hits: Vec<SimilarityHit<'_>> = corpus
        .records
        .iter()
        .map(|record| SimilarityHit {
            record,
            similarity_score: cosine_similarity(query, &record.vector),
        })
        .filter(|hit| hit.similarity_score >= params.similarity_floor)
        .collect();
    let above_floor = hits.len();

    let unique = dedupe(hits);
    let unique_count = unique.len();

    let mut scored: Vec<Scored<'_>> = unique
        .into_iter()
        .map(|hit| {
            let entity_type = classifier.classify(hit.record);
            let factor = match_factor(entity_type, params.tech_ratio);
            Scored {
                hit,
                entity_type,
                type_match_factor: factor,
                adjusted_similarity: hit.similarity_score * factor,
            }
        })
        .collect();

    scored.sort_by(compare_scored);
    scored.truncate(params.top_k);

    let candidates = scored
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let record = s.hit.record;
            RankedCandidate {
                rank: i + 1,
                entity_id: record.entity_id.clone(),
                display_name: record.display_name.clone(),
                unit_key: record.unit_key.clone(),
                similarity_score: s.hit.similarity_score,
                match_percentage: match_percentage(s.hit.similarity_score),
                adjusted_similarity: s.adjusted_similarity,
                entity_type: s.entity_type,
                type_match_factor: s.type_match_factor,
                text_fields: record.text_fields.clone(),
                raw_metadata: record.raw_metadata.clone(),
            }
        })
        .collect();

    Ok(Ranking {
        candidates,
        considered: corpus.records.len(),
        above_floor,
        unique: unique_count,
    })
}

/// Adjusted desc, then raw desc, then entity id asc.
fn compare_scored(a: &Scored<'_>, b: &Scored<'_>) -> Ordering {
    b.adjusted_similarity
        .total_cmp(&a.adjusted_similarity)
        .then_with(|| b.hit.similarity_score.total_cmp(&a.hit.similarity_score))
        .then_with(|| a.hit.record.entity_id.cmp(&b.hit.record.entity_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::KeywordClassifier;
    use crate::models::{CorpusKind, EmbeddingRecord};
    use proptest::prelude::*;
    use std::collections::{BTreeMap, HashMap, HashSet};

    /// Classifier with fixed answers per entity id, `mixed` otherwise.
    struct FixedTypes(HashMap<String, EntityType>);

    impl FixedTypes {
        fn all_mixed() -> Self {
            Self(HashMap::new())
        }

        fn with(pairs: &[(&str, EntityType)]) -> Self {
            Self(pairs.iter().map(|(id, t)| (id.to_string(), *t)).collect())
        }
    }

    impl TypeClassifier for FixedTypes {
        fn classify(&self, record: &EmbeddingRecord) -> EntityType {
            self.0
                .get(&record.entity_id)
                .copied()
                .unwrap_or(EntityType::Mixed)
        }
    }

    /// Unit vector whose cosine with `[1, 0]` is `sim` (up to f32 rounding).
    fn vector_with_similarity(sim: f64) -> Vec<f32> {
        vec![sim as f32, (1.0 - sim * sim).sqrt() as f32]
    }

    fn record(id: &str, unit: &str, sim: f64) -> EmbeddingRecord {
        EmbeddingRecord {
            entity_id: id.to_string(),
            display_name: format!("Course {}", id),
            unit_key: Some(unit.to_string()),
            text_fields: BTreeMap::new(),
            vector: vector_with_similarity(sim),
            raw_metadata: serde_json::Map::new(),
        }
    }

    fn scenario_corpus() -> LoadedCorpus {
        LoadedCorpus::from_records(
            CorpusKind::Courses,
            vec![
                record("CS-101", "Week 1", 0.25),
                record("CS-101", "Week 3", 0.55),
                record("CS-205", "Week 2", 0.30),
            ],
        )
    }

    const QUERY: [f32; 2] = [1.0, 0.0];

    #[test]
    fn test_balanced_scenario() {
        let ranking = rank_corpus(
            &QUERY,
            &scenario_corpus(),
            &RankParams::new(50, 10),
            &FixedTypes::all_mixed(),
        )
        .unwrap();

        assert_eq!(ranking.considered, 3);
        assert_eq!(ranking.above_floor, 3);
        assert_eq!(ranking.unique, 2);

        let c = &ranking.candidates;
        assert_eq!(c.len(), 2);
        assert_eq!((c[0].rank, c[0].entity_id.as_str()), (1, "CS-101"));
        assert_eq!(c[0].unit_key.as_deref(), Some("Week 3"));
        assert!((c[0].adjusted_similarity - 0.55).abs() < 1e-6);
        assert_eq!(c[0].match_percentage, 55);
        assert_eq!(c[0].type_match_factor, 1.0);
        assert_eq!((c[1].rank, c[1].entity_id.as_str()), (2, "CS-205"));
        assert!((c[1].adjusted_similarity - 0.30).abs() < 1e-6);
    }

    #[test]
    fn test_heavy_technical_flips_order() {
        let classifier = FixedTypes::with(&[
            ("CS-101", EntityType::Business),
            ("CS-205", EntityType::Technical),
        ]);
        let ranking = rank_corpus(
            &QUERY,
            &scenario_corpus(),
            &RankParams::new(80, 10),
            &classifier,
        )
        .unwrap();

        let c = &ranking.candidates;
        assert_eq!(c[0].entity_id, "CS-205");
        assert!((c[0].adjusted_similarity - 0.30).abs() < 1e-6);
        assert_eq!(c[0].entity_type, EntityType::Technical);
        assert_eq!(c[1].entity_id, "CS-101");
        assert!((c[1].adjusted_similarity - 0.165).abs() < 1e-6);
        assert!((c[1].similarity_score - 0.55).abs() < 1e-6);
        assert_eq!(c[1].type_match_factor, 0.3);
    }

    #[test]
    fn test_floor_applies_before_dedup() {
        let corpus = LoadedCorpus::from_records(
            CorpusKind::Courses,
            vec![
                record("CS-101", "Week 1", 0.15),
                record("CS-101", "Week 2", 0.19),
                record("CS-205", "Week 1", 0.21),
            ],
        );
        let ranking = rank_corpus(
            &QUERY,
            &corpus,
            &RankParams::new(50, 10),
            &FixedTypes::all_mixed(),
        )
        .unwrap();
        assert_eq!(ranking.above_floor, 1);
        assert_eq!(ranking.candidates.len(), 1);
        assert_eq!(ranking.candidates[0].entity_id, "CS-205");
    }

    #[test]
    fn test_top_k_truncation() {
        let records = (0..8)
            .map(|i| record(&format!("CS-{}", 100 + i), "Week 1", 0.3 + i as f64 * 0.05))
            .collect();
        let corpus = LoadedCorpus::from_records(CorpusKind::Courses, records);

        for top_k in [1, 3, 8, 20] {
            let ranking = rank_corpus(
                &QUERY,
                &corpus,
                &RankParams::new(50, top_k),
                &FixedTypes::all_mixed(),
            )
            .unwrap();
            assert_eq!(ranking.candidates.len(), top_k.min(8));
            assert_eq!(ranking.candidates[0].entity_id, "CS-107");
            let ranks: Vec<usize> = ranking.candidates.iter().map(|c| c.rank).collect();
            assert_eq!(ranks, (1..=top_k.min(8)).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_ties_break_on_entity_id() {
        let corpus = LoadedCorpus::from_records(
            CorpusKind::Courses,
            vec![record("MGT-700", "Week 1", 0.4), record("BIA-500", "Week 1", 0.4)],
        );
        let ranking = rank_corpus(
            &QUERY,
            &corpus,
            &RankParams::new(50, 10),
            &FixedTypes::all_mixed(),
        )
        .unwrap();
        assert_eq!(ranking.candidates[0].entity_id, "BIA-500");
        assert_eq!(ranking.candidates[1].entity_id, "MGT-700");
    }

    #[test]
    fn test_empty_corpus_is_not_an_error() {
        let corpus = LoadedCorpus::from_records(CorpusKind::Certificates, Vec::new());
        let ranking = rank_corpus(
            &QUERY,
            &corpus,
            &RankParams::new(50, 3),
            &KeywordClassifier::default(),
        )
        .unwrap();
        assert!(ranking.candidates.is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = rank_corpus(
            &[1.0, 0.0, 0.0],
            &scenario_corpus(),
            &RankParams::new(50, 10),
            &FixedTypes::all_mixed(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RecommendationError::DimensionMismatch { query: 3, corpus: 2 }
        ));
    }

    #[test]
    fn test_invalid_params() {
        let corpus = scenario_corpus();
        let classifier = FixedTypes::all_mixed();
        for params in [RankParams::new(101, 10), RankParams::new(50, 0)] {
            let err = rank_corpus(&QUERY, &corpus, &params, &classifier).unwrap_err();
            assert_eq!(err.kind(), "invalid_input");
        }
        assert!(validate_requirements("   ").is_err());
        assert!(validate_requirements("data engineer").is_ok());
    }

    #[test]
    fn test_deterministic_output() {
        let corpus = scenario_corpus();
        let params = RankParams::new(50, 10);
        let a = rank_corpus(&QUERY, &corpus, &params, &KeywordClassifier::default()).unwrap();
        let b = rank_corpus(&QUERY, &corpus, &params, &KeywordClassifier::default()).unwrap();
        assert_eq!(a.candidates, b.candidates);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_floor_dedup_and_truncation(
            entries in prop::collection::vec((0usize..6, -1.0f64..1.0), 0..40),
            top_k in 1usize..10,
        ) {
            let records: Vec<EmbeddingRecord> = entries
                .iter()
                .enumerate()
                .map(|(i, (id, sim))| record(&format!("C-{}", id), &format!("Week {}", i), *sim))
                .collect();
            let corpus = LoadedCorpus::from_records(CorpusKind::Courses, records);
            let ranking = rank_corpus(
                &QUERY,
                &corpus,
                &RankParams::new(50, top_k),
                &FixedTypes::all_mixed(),
            )
            .unwrap();

            let mut best: HashMap<String, f64> = HashMap::new();
            for r in &corpus.records {
                let s = cosine_similarity(&QUERY, &r.vector);
                if s >= DEFAULT_SIMILARITY_FLOOR {
                    let e = best.entry(r.entity_id.clone()).or_insert(f64::MIN);
                    if s > *e {
                        *e = s;
                    }
                }
            }

            prop_assert_eq!(ranking.candidates.len(), top_k.min(best.len()));
            let ids: HashSet<&str> = ranking.candidates.iter().map(|c| c.entity_id.as_str()).collect();
            prop_assert_eq!(ids.len(), ranking.candidates.len());
            for c in &ranking.candidates {
                prop_assert!(c.similarity_score >= DEFAULT_SIMILARITY_FLOOR);
                prop_assert_eq!(c.similarity_score, best[&c.entity_id]);
            }
        }
    }
}
