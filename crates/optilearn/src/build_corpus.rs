//! Bulk course-corpus build from extracted syllabus JSON.
//!
//! Walks a directory of syllabus documents (one per course, as written by
//! the syllabus extraction pipeline), embeds one record per week/module, and
//! writes an `{ "embeddings": [...] }` corpus the loader accepts.
//!
//! Syllabus shape (only the fields read here):
//!
//! ```json
//! {
//!   "course_schedule": { "week1": { "topics": ["..."] }, "week2": { ... } },
//!   "_metadata": {
//!     "course_info": { "title": "...", "code": "CS-559" },
//!     "course_description": "...",
//!     "learning_outcomes": ["..."]
//!   }
//! }
//! ```
//!
//! A course with no schedule gets a single `<code>_full` record.
//!
//! This is the one place where a failed embedding is replaced with a zero
//! vector: the batch continues, the failure is logged and counted, and the
//! placeholder scores 0.0 so it never clears the similarity floor.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use walkdir::WalkDir;

use optilearn_core::embedding::{Deadline, EmbeddingProvider};

use crate::config::Config;
use crate::embedding::{create_provider, embed_query};

/// Course fields pulled from one syllabus document.
#[derive(Debug, Clone, PartialEq)]
pub struct SyllabusCourse {
    pub code: String,
    pub title: String,
    pub description: String,
    pub learning_outcomes: Vec<String>,
    /// Schedule entries in natural order (`week2` before `week10`).
    pub modules: Vec<ScheduleModule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleModule {
    pub key: String,
    pub topics: Vec<String>,
}

/// One record of the output corpus.
#[derive(Debug, Clone, Serialize)]
pub struct CourseModuleRecord {
    pub id: String,
    pub course_code: String,
    pub course_name: String,
    pub course_description: String,
    pub learning_outcomes: Vec<String>,
    pub module_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_display_name: Option<String>,
    pub topics: Vec<String>,
    pub embedding_type: String,
    pub embedding_text: String,
    pub vector: Vec<f32>,
    pub created_at: String,
    pub model_used: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub embedding_failed: bool,
}

#[derive(Serialize)]
struct CorpusFile<'a> {
    embeddings: &'a [CourseModuleRecord],
}

#[derive(Debug, Default)]
pub struct BuildSummary {
    pub records: Vec<CourseModuleRecord>,
    pub files_read: usize,
    /// Syllabus files that could not be parsed, with the reason.
    pub files_failed: Vec<(PathBuf, String)>,
    pub embedded: usize,
    /// Record ids whose vector is a zero placeholder.
    pub placeholders: Vec<String>,
}

/// Read the course fields out of a syllabus document.
pub fn parse_syllabus(value: &Value) -> Result<SyllabusCourse> {
    let meta = value
        .get("_metadata")
        .and_then(|m| m.as_object())
        .ok_or_else(|| anyhow::anyhow!("missing _metadata object"))?;

    let info = meta.get("course_info");
    let text = |v: Option<&Value>| {
        v.and_then(|s| s.as_str())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let code = text(info.and_then(|i| i.get("code")));
    let title = text(info.and_then(|i| i.get("title")));
    if code.is_empty() && title.is_empty() {
        bail!("course_info has neither code nor title");
    }

    let mut modules: Vec<ScheduleModule> = value
        .get("course_schedule")
        .and_then(|s| s.as_object())
        .map(|schedule| {
            schedule
                .iter()
                .map(|(key, content)| ScheduleModule {
                    key: key.clone(),
                    topics: string_list(content.get("topics")),
                })
                .collect()
        })
        .unwrap_or_default();
    modules.sort_by(|a, b| natural_key(&a.key).cmp(&natural_key(&b.key)));

    Ok(SyllabusCourse {
        code,
        title,
        description: text(meta.get("course_description")),
        learning_outcomes: string_list(meta.get("learning_outcomes")),
        modules,
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// `("week", 10, "week10")` so that `week2` sorts before `week10`.
fn natural_key(key: &str) -> (String, u64, String) {
    let digits_at = key
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(key.len());
    let number = key[digits_at..].parse().unwrap_or(u64::MAX);
    (key[..digits_at].to_lowercase(), number, key.to_string())
}

/// `week1` → `Week 1`, `module3` → `Module 3`, `mid_term` → `Mid Term`.
pub fn module_display_name(key: &str) -> String {
    let lower = key.to_lowercase();
    for prefix in ["week", "module", "session"] {
        if let Some(rest) = lower.strip_prefix(prefix) {
            let rest = rest.replace('_', " ");
            let rest = rest.trim();
            let label = title_case(prefix);
            return if rest.is_empty() {
                label
            } else {
                format!("{} {}", label, title_case(rest))
            };
        }
    }
    title_case(&key.replace('_', " "))
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn base_context(course: &SyllabusCourse) -> String {
    format!(
        "Course Name: {}\nCourse Code: {}\nCourse Description: {}\nLearning Outcomes: {}",
        course.title,
        course.code,
        course.description,
        course.learning_outcomes.join("; ")
    )
}

/// Records to embed for one course, vectors still empty.
pub fn plan_records(course: &SyllabusCourse, model: &str) -> Vec<CourseModuleRecord> {
    let context = base_context(course);
    let created_at = Utc::now().to_rfc3339();
    let id_prefix = if course.code.is_empty() {
        "course"
    } else {
        course.code.as_str()
    };

    let record = |module_name: String,
                  display: Option<String>,
                  topics: Vec<String>,
                  embedding_type: &str,
                  embedding_text: String| CourseModuleRecord {
        id: format!("{}_{}", id_prefix, module_name_for_id(&module_name)),
        course_code: course.code.clone(),
        course_name: course.title.clone(),
        course_description: course.description.clone(),
        learning_outcomes: course.learning_outcomes.clone(),
        module_name,
        module_display_name: display,
        topics,
        embedding_type: embedding_type.to_string(),
        embedding_text,
        vector: Vec::new(),
        created_at: created_at.clone(),
        model_used: model.to_string(),
        embedding_failed: false,
    };

    if course.modules.is_empty() {
        let text = format!(
            "{}\n\nFull Course Content: This course covers the topics and outcomes described above.",
            context
        );
        return vec![record("full_course".into(), None, Vec::new(), "course", text)];
    }

    course
        .modules
        .iter()
        .filter(|m| !m.topics.is_empty())
        .map(|m| {
            let display = module_display_name(&m.key);
            let text = format!("{}\n\n{}\nTopics: {}", context, display, m.topics.join("; "));
            record(m.key.clone(), Some(display), m.topics.clone(), "module", text)
        })
        .collect()
}

fn module_name_for_id(module_name: &str) -> &str {
    if module_name == "full_course" {
        "full"
    } else {
        module_name
    }
}

/// Syllabus `.json` files under `dir`, sorted for deterministic output.
pub fn find_syllabus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Syllabus directory does not exist: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_json = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Embed every planned record from the syllabi under `dir`.
pub async fn build_corpus(
    provider: &dyn EmbeddingProvider,
    dir: &Path,
    per_call_timeout: std::time::Duration,
) -> Result<BuildSummary> {
    let mut summary = BuildSummary::default();

    for path in find_syllabus_files(dir)? {
        let course = match read_syllabus(&path) {
            Ok(course) => course,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping syllabus");
                summary.files_failed.push((path, e.to_string()));
                continue;
            }
        };
        summary.files_read += 1;

        for mut record in plan_records(&course, provider.model_name()) {
            let deadline = Deadline::after(per_call_timeout);
            match embed_query(provider, &record.embedding_text, deadline).await {
                Ok(vector) => {
                    record.vector = vector;
                    summary.embedded += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        id = %record.id,
                        error = %e,
                        "embedding failed; writing zero-vector placeholder"
                    );
                    record.vector = vec![0.0; provider.dims()];
                    record.embedding_failed = true;
                    summary.placeholders.push(record.id.clone());
                }
            }
            summary.records.push(record);
        }
    }

    Ok(summary)
}

fn read_syllabus(path: &Path) -> Result<SyllabusCourse> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content).context("invalid JSON")?;
    parse_syllabus(&value)
}

/// Write `records` as an `{ "embeddings": [...] }` corpus file.
pub fn write_corpus(records: &[CourseModuleRecord], output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(&CorpusFile {
        embeddings: records,
    })?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write corpus: {}", output.display()))?;
    Ok(())
}

/// Run the build-corpus command.
pub async fn run_build_corpus(config: &Config, dir: &Path, output: &Path) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = create_provider(&config.embedding)?;
    let summary = build_corpus(provider.as_ref(), dir, config.engine.deadline()).await?;
    write_corpus(&summary.records, output)?;

    println!("build-corpus");
    println!("  syllabi read: {}", summary.files_read);
    println!("  syllabi skipped: {}", summary.files_failed.len());
    println!("  records: {}", summary.records.len());
    println!("  embedded: {}", summary.embedded);
    println!("  placeholders: {}", summary.placeholders.len());
    for id in &summary.placeholders {
        println!("    {}", id);
    }
    for (path, reason) in &summary.files_failed {
        println!("  skipped {}: {}", path.display(), reason);
    }
    println!("  output: {}", output.display());

    Ok(())
}
