//! Technical / business / mixed classification of corpus entities.
//!
//! [`TypeClassifier`] is the seam for swapping in a learned model later;
//! [`KeywordClassifier`] is the hand-tuned heuristic used today.
//!
//! # Heuristic
//!
//! 1. Concatenate the record's name and text fields, lowercased.
//! 2. Count how many technical keywords and how many business keywords occur
//!    as substrings (each keyword counts at most once).
//! 3. `technical` if `tech > 1.5 × business`, `business` if
//!    `business > 1.5 × tech`, otherwise `mixed`.
//!
//! Substring matching is deliberately loose: short keywords such as `"ai"`
//! or `"hr"` also match inside longer words.

use crate::models::{EmbeddingRecord, EntityType};

/// Labels a corpus record as technical, business, or mixed.
pub trait TypeClassifier: Send + Sync {
    fn classify(&self, record: &EmbeddingRecord) -> EntityType;
}

pub const TECHNICAL_KEYWORDS: &[&str] = &[
    "programming",
    "algorithm",
    "data structure",
    "machine learning",
    "ai",
    "artificial intelligence",
    "database",
    "software",
    "computer",
    "coding",
    "python",
    "java",
    "javascript",
    "web development",
    "cybersecurity",
    "network",
    "cloud",
    "devops",
    "api",
    "backend",
    "frontend",
    "mobile app",
    "data science",
    "analytics",
    "statistics",
    "mathematical",
    "engineering",
    "technical",
    "system design",
    "architecture",
    "framework",
    "library",
    "debugging",
    "testing",
];

pub const BUSINESS_KEYWORDS: &[&str] = &[
    "management",
    "leadership",
    "strategy",
    "marketing",
    "finance",
    "accounting",
    "business",
    "entrepreneurship",
    "operations",
    "project management",
    "communication",
    "negotiation",
    "sales",
    "customer",
    "organization",
    "team building",
    "hr",
    "human resources",
    "economics",
    "consulting",
    "planning",
    "decision making",
    "process improvement",
    "change management",
    "innovation",
    "corporate",
    "executive",
    "administration",
];

/// Ratio by which one keyword family must outnumber the other.
pub const DEFAULT_DOMINANCE: f64 = 1.5;

/// Keyword-frequency classifier.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    technical: Vec<String>,
    business: Vec<String>,
    dominance: f64,
}

impl KeywordClassifier {
    pub fn new(technical: Vec<String>, business: Vec<String>, dominance: f64) -> Self {
        Self {
            technical: technical.into_iter().map(|k| k.to_lowercase()).collect(),
            business: business.into_iter().map(|k| k.to_lowercase()).collect(),
            dominance,
        }
    }

    /// `(technical, business)` keyword hits in already-lowercased text.
    pub fn counts(&self, lowercase_text: &str) -> (usize, usize) {
        let hits = |keywords: &[String]| {
            keywords
                .iter()
                .filter(|k| lowercase_text.contains(k.as_str()))
                .count()
        };
        (hits(&self.technical), hits(&self.business))
    }

    pub fn classify_text(&self, text: &str) -> EntityType {
        let (tech, biz) = self.counts(&text.to_lowercase());
        let (tech, biz) = (tech as f64, biz as f64);
        if tech > biz * self.dominance {
            EntityType::Technical
        } else if biz > tech * self.dominance {
            EntityType::Business
        } else {
            EntityType::Mixed
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(
            TECHNICAL_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            BUSINESS_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            DEFAULT_DOMINANCE,
        )
    }
}

impl TypeClassifier for KeywordClassifier {
    fn classify(&self, record: &EmbeddingRecord) -> EntityType {
        self.classify_text(&record.classification_text())
    }
}
