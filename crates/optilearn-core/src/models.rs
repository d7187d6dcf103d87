//! Core data models used throughout OptiLearn.
//!
//! These types represent the corpus records loaded from the upstream
//! embedding job and the ranked results handed back to callers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which precomputed corpus a recommendation runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusKind {
    Courses,
    Certificates,
}

impl CorpusKind {
    pub const ALL: [CorpusKind; 2] = [CorpusKind::Courses, CorpusKind::Certificates];

    pub fn as_str(&self) -> &'static str {
        match self {
            CorpusKind::Courses => "courses",
            CorpusKind::Certificates => "certificates",
        }
    }
}

impl fmt::Display for CorpusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorpusKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "courses" | "course" => Ok(CorpusKind::Courses),
            "certificates" | "certificate" | "certs" => Ok(CorpusKind::Certificates),
            other => Err(format!(
                "unknown corpus '{}'. Use courses or certificates.",
                other
            )),
        }
    }
}

/// Coarse content label assigned by a [`TypeClassifier`](crate::classify::TypeClassifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Technical,
    Business,
    Mixed,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Technical => "technical",
            EntityType::Business => "business",
            EntityType::Mixed => "mixed",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scored unit in a corpus: a course module/week, a whole course, or a
/// graduate certificate.
///
/// Records are produced by the upstream extraction/embedding job and are
/// treated as read-only by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingRecord {
    /// Course code, or a synthetic id for certificates. May be blank when
    /// the upstream data carried no code.
    pub entity_id: String,
    /// Human-readable title (`"N/A"` when missing upstream).
    pub display_name: String,
    /// Week/module label, absent for certificates and whole-course records.
    pub unit_key: Option<String>,
    /// Named text segments (description, topics, requirements, ...).
    pub text_fields: BTreeMap<String, String>,
    /// Embedding vector; every record in one corpus shares its length.
    #[serde(skip)]
    pub vector: Vec<f32>,
    /// Upstream fields not otherwise modeled, passed through untouched.
    pub raw_metadata: serde_json::Map<String, serde_json::Value>,
}

impl EmbeddingRecord {
    /// True when the record carries a usable dedup key.
    pub fn has_entity_id(&self) -> bool {
        !self.entity_id.trim().is_empty()
    }

    /// Lowercased name plus every text field, the input to keyword classification.
    pub fn classification_text(&self) -> String {
        let mut text = self.display_name.clone();
        for value in self.text_fields.values() {
            text.push(' ');
            text.push_str(value);
        }
        text.to_lowercase()
    }
}

/// A ranked recommendation returned to callers.
///
/// Serialized verbatim into the `recommendations` field of a stored
/// proposal document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    /// 1-based position after the final sort.
    pub rank: usize,
    pub entity_id: String,
    pub display_name: String,
    /// The best-matching week/module for courses that were deduplicated.
    pub unit_key: Option<String>,
    /// Raw cosine similarity against the query.
    pub similarity_score: f64,
    /// `round(max(0, similarity_score) * 100)`.
    pub match_percentage: u32,
    /// `similarity_score * type_match_factor`.
    pub adjusted_similarity: f64,
    pub entity_type: EntityType,
    pub type_match_factor: f64,
    pub text_fields: BTreeMap<String, String>,
    pub raw_metadata: serde_json::Map<String, serde_json::Value>,
}
