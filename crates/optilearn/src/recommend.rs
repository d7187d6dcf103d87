//! Recommendation orchestrator.
//!
//! [`Recommender`] wires an [`EmbeddingProvider`], a [`CorpusSource`] and a
//! [`TypeClassifier`] together:
//!
//! 1. Validate requirement text, tech ratio and top-K.
//! 2. Embed the text once, under a deadline.
//! 3. Load the requested corpus (or both, concurrently).
//! 4. Rank with [`rank_corpus`].
//!
//! Every failure surfaces as a [`RecommendationError`]; no step substitutes
//! placeholder data. An empty list is a valid answer.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use optilearn_core::classify::{KeywordClassifier, TypeClassifier};
use optilearn_core::corpus::CorpusSource;
use optilearn_core::embedding::{Deadline, EmbeddingProvider};
use optilearn_core::error::RecommendationError;
use optilearn_core::models::{CorpusKind, RankedCandidate};
use optilearn_core::rank::{rank_corpus, validate_requirements, RankParams};

use crate::config::{Config, CorpusConfig};
use crate::corpus::FileCorpusSource;
use crate::embedding::{create_provider, embed_query};
use crate::report::{write_report, RecommendationReport};

/// Which corpora a request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CorpusSelection {
    Courses,
    Certificates,
    #[default]
    All,
}

impl CorpusSelection {
    /// The corpora that have a path in `[corpus]`; used when a caller does
    /// not name one.
    pub fn configured(corpus: &CorpusConfig) -> Self {
        match (corpus.courses.is_some(), corpus.certificates.is_some()) {
            (true, false) => CorpusSelection::Courses,
            (false, true) => CorpusSelection::Certificates,
            _ => CorpusSelection::All,
        }
    }

    pub fn kinds(&self) -> &'static [CorpusKind] {
        match self {
            CorpusSelection::Courses => &[CorpusKind::Courses],
            CorpusSelection::Certificates => &[CorpusKind::Certificates],
            CorpusSelection::All => &CorpusKind::ALL,
        }
    }
}

/// Ranked lists for one request. A list is `None` when it was not requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Recommendations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courses: Option<Vec<RankedCandidate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<RankedCandidate>>,
}

impl Recommendations {
    pub fn get(&self, kind: CorpusKind) -> Option<&[RankedCandidate]> {
        match kind {
            CorpusKind::Courses => self.courses.as_deref(),
            CorpusKind::Certificates => self.certificates.as_deref(),
        }
    }
}

#[derive(Clone)]
pub struct Recommender {
    provider: Arc<dyn EmbeddingProvider>,
    corpora: Arc<dyn CorpusSource>,
    classifier: Arc<dyn TypeClassifier>,
    similarity_floor: f64,
}

impl Recommender {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        corpora: Arc<dyn CorpusSource>,
        classifier: Arc<dyn TypeClassifier>,
    ) -> Self {
        Self {
            provider,
            corpora,
            classifier,
            similarity_floor: optilearn_core::rank::DEFAULT_SIMILARITY_FLOOR,
        }
    }

    pub fn with_similarity_floor(mut self, floor: f64) -> Self {
        self.similarity_floor = floor;
        self
    }

    /// Build from configuration: configured provider, file corpora, keyword classifier.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = create_provider(&config.embedding)?;
        Ok(Self::new(
            provider,
            Arc::new(FileCorpusSource::new(&config.corpus).with_dims(config.embedding.dims)),
            Arc::new(KeywordClassifier::default()),
        )
        .with_similarity_floor(config.engine.similarity_floor))
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    fn params(&self, tech_ratio: u8, top_k: usize) -> Result<RankParams, RecommendationError> {
        let params = RankParams::new(tech_ratio, top_k).with_floor(self.similarity_floor);
        params.validate()?;
        Ok(params)
    }

    /// Rank one corpus against `requirements`.
    pub async fn recommend(
        &self,
        requirements: &str,
        tech_ratio: u8,
        top_k: usize,
        kind: CorpusKind,
        deadline: Deadline,
    ) -> Result<Vec<RankedCandidate>, RecommendationError> {
        validate_requirements(requirements)?;
        let params = self.params(tech_ratio, top_k)?;

        let query = embed_query(self.provider.as_ref(), requirements, deadline).await?;
        self.rank(&query, kind, &params).await
    }

    /// Embed once and rank courses and certificates concurrently.
    pub async fn recommend_all(
        &self,
        requirements: &str,
        tech_ratio: u8,
        top_k_courses: usize,
        top_k_certificates: usize,
        deadline: Deadline,
    ) -> Result<Recommendations, RecommendationError> {
        validate_requirements(requirements)?;
        let course_params = self.params(tech_ratio, top_k_courses)?;
        let cert_params = self.params(tech_ratio, top_k_certificates)?;

        let query = embed_query(self.provider.as_ref(), requirements, deadline).await?;

        let (courses, certificates) = tokio::join!(
            self.rank(&query, CorpusKind::Courses, &course_params),
            self.rank(&query, CorpusKind::Certificates, &cert_params),
        );

        Ok(Recommendations {
            courses: Some(courses?),
            certificates: Some(certificates?),
        })
    }

    /// Run a [`CorpusSelection`], picking per-kind top-K from `top_k_for`.
    pub async fn recommend_selection(
        &self,
        requirements: &str,
        tech_ratio: u8,
        selection: CorpusSelection,
        top_k_for: impl Fn(CorpusKind) -> usize,
        deadline: Deadline,
    ) -> Result<Recommendations, RecommendationError> {
        match selection {
            CorpusSelection::All => {
                self.recommend_all(
                    requirements,
                    tech_ratio,
                    top_k_for(CorpusKind::Courses),
                    top_k_for(CorpusKind::Certificates),
                    deadline,
                )
                .await
            }
            CorpusSelection::Courses => {
                let list = self
                    .recommend(
                        requirements,
                        tech_ratio,
                        top_k_for(CorpusKind::Courses),
                        CorpusKind::Courses,
                        deadline,
                    )
                    .await?;
                Ok(Recommendations {
                    courses: Some(list),
                    certificates: None,
                })
            }
            CorpusSelection::Certificates => {
                let list = self
                    .recommend(
                        requirements,
                        tech_ratio,
                        top_k_for(CorpusKind::Certificates),
                        CorpusKind::Certificates,
                        deadline,
                    )
                    .await?;
                Ok(Recommendations {
                    courses: None,
                    certificates: Some(list),
                })
            }
        }
    }

    async fn rank(
        &self,
        query: &[f32],
        kind: CorpusKind,
        params: &RankParams,
    ) -> Result<Vec<RankedCandidate>, RecommendationError> {
        let corpus = self.corpora.load(kind).await?;
        let ranking = rank_corpus(query, &corpus, params, self.classifier.as_ref())?;

        tracing::info!(
            corpus = %kind,
            considered = ranking.considered,
            above_floor = ranking.above_floor,
            unique = ranking.unique,
            returned = ranking.candidates.len(),
            tech_ratio = params.tech_ratio,
            "ranked corpus"
        );

        Ok(ranking.candidates)
    }
}

/// Options for `optilearn recommend`.
#[derive(Debug, Clone)]
pub struct RecommendOptions {
    pub requirements: String,
    pub tech_ratio: Option<u8>,
    /// `None` ranks every configured corpus.
    pub selection: Option<CorpusSelection>,
    pub top_k: Option<usize>,
    pub organization: Option<String>,
    pub output: Option<PathBuf>,
    pub json: bool,
}

/// Run the recommend command and print results.
pub async fn run_recommend(config: &Config, opts: RecommendOptions) -> Result<()> {
    let recommender = Recommender::from_config(config)?;
    let tech_ratio = opts.tech_ratio.unwrap_or(config.engine.default_tech_ratio);
    let deadline = Deadline::after(config.engine.deadline());
    let selection = opts
        .selection
        .unwrap_or_else(|| CorpusSelection::configured(&config.corpus));

    let result = recommender
        .recommend_selection(
            &opts.requirements,
            tech_ratio,
            selection,
            |kind| opts.top_k.unwrap_or_else(|| config.engine.top_k_for(kind)),
            deadline,
        )
        .await;

    let recommendations = match result {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "recommendation failed");
            anyhow::bail!("no recommendations available, reason: {}", e.kind());
        }
    };

    if let Some(path) = &opts.output {
        let report = RecommendationReport::new(
            opts.organization.clone(),
            &opts.requirements,
            tech_ratio,
            &recommendations,
        );
        write_report(&report, Some(path))?;
    }

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&recommendations)?);
        return Ok(());
    }

    for kind in CorpusKind::ALL {
        if let Some(list) = recommendations.get(kind) {
            print_candidates(kind, list);
        }
    }

    Ok(())
}

fn print_candidates(kind: CorpusKind, candidates: &[RankedCandidate]) {
    println!("{} ({} results)", kind, candidates.len());
    if candidates.is_empty() {
        println!("  no {} cleared the similarity floor", kind);
        println!();
        return;
    }

    println!(
        "  {:>4}  {:<12} {:<44} {:>6} {:>9}  {:<10} {}",
        "RANK", "ID", "NAME", "MATCH", "ADJUSTED", "TYPE", "UNIT"
    );
    println!("  {}", "-".repeat(100));
    for c in candidates {
        println!(
            "  {:>4}  {:<12} {:<44} {:>5}% {:>9.3}  {:<10} {}",
            c.rank,
            truncate(&c.entity_id, 12),
            truncate(&c.display_name, 44),
            c.match_percentage,
            c.adjusted_similarity,
            c.entity_type.as_str(),
            c.unit_key.as_deref().unwrap_or("-")
        );
    }
    println!();
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_kinds() {
        assert_eq!(CorpusSelection::Courses.kinds(), &[CorpusKind::Courses]);
        assert_eq!(CorpusSelection::All.kinds().len(), 2);
        assert_eq!(CorpusSelection::default(), CorpusSelection::All);
    }

    #[test]
    fn test_configured_selection_follows_paths() {
        let only_courses = CorpusConfig {
            courses: Some(PathBuf::from("courses.json")),
            certificates: None,
        };
        assert_eq!(
            CorpusSelection::configured(&only_courses),
            CorpusSelection::Courses
        );

        let only_certs = CorpusConfig {
            courses: None,
            certificates: Some(PathBuf::from("certs.json")),
        };
        assert_eq!(
            CorpusSelection::configured(&only_certs),
            CorpusSelection::Certificates
        );

        let both = CorpusConfig {
            courses: Some(PathBuf::from("courses.json")),
            certificates: Some(PathBuf::from("certs.json")),
        };
        assert_eq!(CorpusSelection::configured(&both), CorpusSelection::All);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("CS-101", 12), "CS-101");
        assert_eq!(truncate("Applied Machine Learning", 8), "Applied…");
    }

    #[test]
    fn test_recommendations_skip_missing_lists() {
        let r = Recommendations {
            courses: Some(Vec::new()),
            certificates: None,
        };
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("courses").is_some());
        assert!(json.get("certificates").is_none());
    }
}
