//! Recommendation report export.
//!
//! A report is the document stored per organization by the proposal
//! workflow: the requirement text, the ranked course and certificate lists
//! with their generation timestamps, and a `last_updated` stamp.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;

use optilearn_core::models::RankedCandidate;

use crate::recommend::Recommendations;

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    pub requirements_text: String,
    pub tech_ratio: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_recommendations: Option<CourseSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_recommendations: Option<CertificateSection>,
    pub last_updated: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseSection {
    pub generated_at: String,
    pub recommendations: Vec<RankedCandidate>,
    pub total_courses: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificateSection {
    pub generated_at: String,
    pub recommendations: Vec<RankedCandidate>,
    pub total_certificates: usize,
}

impl RecommendationReport {
    pub fn new(
        organization: Option<String>,
        requirements_text: &str,
        tech_ratio: u8,
        recommendations: &Recommendations,
    ) -> Self {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        Self {
            organization,
            requirements_text: requirements_text.to_string(),
            tech_ratio,
            course_recommendations: recommendations.courses.as_ref().map(|list| CourseSection {
                generated_at: now.clone(),
                recommendations: list.clone(),
                total_courses: list.len(),
            }),
            certificate_recommendations: recommendations.certificates.as_ref().map(|list| {
                CertificateSection {
                    generated_at: now.clone(),
                    recommendations: list.clone(),
                    total_certificates: list.len(),
                }
            }),
            last_updated: now,
        }
    }
}

/// Write `report` as pretty JSON.
///
/// If `output` is `Some`, writes to that file path and logs it. Otherwise
/// writes to stdout for piping.
pub fn write_report(report: &RecommendationReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            tracing::info!(path = %path.display(), "recommendation report written");
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}
