//! Corpus abstraction and record normalization.
//!
//! The [`CorpusSource`] trait hands the ranking pipeline a read-only
//! [`LoadedCorpus`] snapshot, enabling pluggable backends (JSON files in the
//! app crate, in-memory for tests).
//!
//! Upstream exports come in several shapes; [`parse_corpus`] accepts all of
//! them and produces uniform [`EmbeddingRecord`]s:
//!
//! | Shape | Example |
//! |-------|---------|
//! | Bare list | `[ {record}, ... ]` |
//! | `embeddings` wrapper | `{ "embeddings": [ {record}, ... ] }` |
//! | Certificate export | `{ "course_embeddings": [ {item with component embeddings}, ... ] }` |
//! | JSON lines | one `{record}` per line |
//!
//! Entries without a usable vector are dropped and counted in
//! [`LoadedCorpus::skipped`]; missing optional fields fall back to `"N/A"`
//! or empty values.

pub mod memory;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::CorpusError;
use crate::models::{CorpusKind, EmbeddingRecord};

/// Placeholder for missing display names.
pub const NOT_AVAILABLE: &str = "N/A";

/// Component vectors averaged into one certificate vector.
pub const CERTIFICATE_COMPONENTS: [&str; 3] = [
    "course_name_embedding",
    "course_description_embedding",
    "course_requirements_embedding",
];

/// A fully normalized corpus, shared read-only across requests.
#[derive(Debug, Clone)]
pub struct LoadedCorpus {
    pub kind: CorpusKind,
    pub records: Vec<EmbeddingRecord>,
    /// Entries dropped for lacking a usable vector (or a mismatched length).
    pub skipped: usize,
    /// Vector length shared by every record, `None` for an empty corpus.
    pub dims: Option<usize>,
}

impl LoadedCorpus {
    /// Build a corpus from already-normalized records. The corpus takes the
    /// most common vector length; see [`LoadedCorpus::with_dims`].
    pub fn from_records(kind: CorpusKind, records: Vec<EmbeddingRecord>) -> Self {
        Self::with_dims(kind, records, None)
    }

    /// Build a corpus whose vectors all have length `expected`.
    ///
    /// With no expected length, the most common non-empty length wins (ties go
    /// to the length seen first). Records with empty or other-length vectors
    /// are dropped and counted in `skipped`.
    pub fn with_dims(
        kind: CorpusKind,
        records: Vec<EmbeddingRecord>,
        expected: Option<usize>,
    ) -> Self {
        let target = expected.or_else(|| majority_len(&records));
        let mut corpus = Self {
            kind,
            records: Vec::with_capacity(records.len()),
            skipped: 0,
            dims: None,
        };

        for record in records {
            let len = record.vector.len();
            if len == 0 {
                corpus.skipped += 1;
                continue;
            }
            if Some(len) != target {
                tracing::warn!(
                    corpus = %kind,
                    entity_id = %record.entity_id,
                    expected = ?target,
                    actual = len,
                    "dropping record with mismatched vector length"
                );
                corpus.skipped += 1;
                continue;
            }
            corpus.records.push(record);
        }

        if !corpus.records.is_empty() {
            corpus.dims = target;
        }
        corpus
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct non-blank entity ids.
    pub fn distinct_entities(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.has_entity_id())
            .map(|r| r.entity_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Most common non-empty vector length, ties going to the earliest.
fn majority_len(records: &[EmbeddingRecord]) -> Option<usize> {
    let mut counts: HashMap<usize, (usize, usize)> = HashMap::new();
    for (position, record) in records.iter().enumerate() {
        let len = record.vector.len();
        if len == 0 {
            continue;
        }
        counts.entry(len).or_insert((0, position)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(len, _)| len)
}

/// Read-only access to persisted corpora.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    /// Load (or return a cached snapshot of) the corpus for `kind`.
    async fn load(&self, kind: CorpusKind) -> Result<Arc<LoadedCorpus>, CorpusError>;
}

/// How a corpus file is encoded on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusEncoding {
    Json,
    JsonLines,
}

impl CorpusEncoding {
    /// `.jsonl` / `.ndjson` files are JSON lines, everything else is JSON.
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".jsonl") || lower.ends_with(".ndjson") {
            CorpusEncoding::JsonLines
        } else {
            CorpusEncoding::Json
        }
    }
}

/// Where each normalized field is read from, in fallback order.
struct FieldMapping {
    id: &'static [&'static str],
    name: &'static [&'static str],
    unit: &'static [&'static str],
    text: &'static [(&'static str, &'static [&'static str])],
}

const TEXT_FIELDS: &[(&str, &[&str])] = &[
    ("description", &["course_description", "description"]),
    ("topics", &["topics"]),
    ("learning_outcomes", &["learning_outcomes"]),
    ("requirements", &["course_requirements", "requirements"]),
    ("embedding_text", &["embedding_text"]),
];

const COURSE_FIELDS: FieldMapping = FieldMapping {
    id: &["entity_id", "course_code", "code"],
    name: &["display_name", "course_name", "title"],
    unit: &["unit_key", "module_display_name", "module_name"],
    text: TEXT_FIELDS,
};

const CERTIFICATE_FIELDS: FieldMapping = FieldMapping {
    id: &["entity_id"],
    name: &["display_name", "course_name", "certificate_name", "title"],
    unit: &["unit_key"],
    text: TEXT_FIELDS,
};

/// Unit labels that mean "the whole course".
const WHOLE_COURSE_UNITS: &[&str] = &["full_course", "overview"];

fn mapping_for(kind: CorpusKind) -> &'static FieldMapping {
    match kind {
        CorpusKind::Courses => &COURSE_FIELDS,
        CorpusKind::Certificates => &CERTIFICATE_FIELDS,
    }
}

/// Parse corpus file contents in the given encoding.
///
/// `expected_dims` is the embedding model's vector length when known;
/// records of any other length are skipped.
pub fn parse_corpus_str(
    kind: CorpusKind,
    contents: &str,
    encoding: CorpusEncoding,
    expected_dims: Option<usize>,
) -> Result<LoadedCorpus, CorpusError> {
    match encoding {
        CorpusEncoding::Json => {
            let value: Value = serde_json::from_str(contents)
                .map_err(|e| CorpusError::Format(format!("invalid JSON: {}", e)))?;
            parse_corpus(kind, value, expected_dims)
        }
        CorpusEncoding::JsonLines => parse_json_lines(kind, contents, expected_dims),
    }
}

/// Normalize a decoded JSON document into a corpus.
pub fn parse_corpus(
    kind: CorpusKind,
    value: Value,
    expected_dims: Option<usize>,
) -> Result<LoadedCorpus, CorpusError> {
    let (entries, certificate_export) = match value {
        Value::Array(items) => (items, false),
        Value::Object(mut obj) => {
            if let Some(Value::Array(items)) = obj.remove("embeddings") {
                (items, false)
            } else if let Some(Value::Array(items)) = obj.remove("course_embeddings") {
                (items, true)
            } else {
                return Err(CorpusError::Format(
                    "expected a list of records or an object with an 'embeddings' list".into(),
                ));
            }
        }
        other => {
            return Err(CorpusError::Format(format!(
                "top-level value must be a list or object, found {}",
                json_type_name(&other)
            )))
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    let mut unusable = 0;
    for (position, entry) in entries.iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            unusable += 1;
            continue;
        };
        if certificate_export && kind == CorpusKind::Certificates && !is_certificate_item(obj) {
            continue;
        }
        match normalize_entry(kind, obj) {
            Some(record) => records.push(record),
            None => {
                tracing::debug!(corpus = %kind, position, "skipping entry without usable vector");
                unusable += 1;
            }
        }
    }

    let mut corpus = LoadedCorpus::with_dims(kind, records, expected_dims);
    corpus.skipped += unusable;
    Ok(corpus)
}

/// Parse newline-delimited JSON records.
pub fn parse_json_lines(
    kind: CorpusKind,
    contents: &str,
    expected_dims: Option<usize>,
) -> Result<LoadedCorpus, CorpusError> {
    let mut records = Vec::new();
    let mut unusable = 0;
    let mut parsed_any = false;
    let mut saw_line = false;

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        saw_line = true;
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(corpus = %kind, line = line_no + 1, error = %e, "skipping malformed line");
                unusable += 1;
                continue;
            }
        };
        parsed_any = true;
        match value.as_object().and_then(|obj| normalize_entry(kind, obj)) {
            Some(record) => records.push(record),
            None => unusable += 1,
        }
    }

    if saw_line && !parsed_any {
        return Err(CorpusError::Format(
            "no line of the JSON-lines corpus could be parsed".into(),
        ));
    }
    let mut corpus = LoadedCorpus::with_dims(kind, records, expected_dims);
    corpus.skipped += unusable;
    Ok(corpus)
}

fn is_certificate_item(obj: &Map<String, Value>) -> bool {
    first_text(obj, CERTIFICATE_FIELDS.name)
        .map(|name| name.to_lowercase().contains("certificate"))
        .unwrap_or(false)
}

/// Turn one upstream entry into a record, or `None` when it has no usable vector.
fn normalize_entry(kind: CorpusKind, obj: &Map<String, Value>) -> Option<EmbeddingRecord> {
    let mapping = mapping_for(kind);
    let vector = extract_vector(obj)?;

    let display_name =
        first_text(obj, mapping.name).unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let mut entity_id = first_text(obj, mapping.id).unwrap_or_default();
    if entity_id.is_empty() && kind == CorpusKind::Certificates {
        entity_id = synthetic_certificate_id(obj, &display_name);
    }

    let unit_key = first_text(obj, mapping.unit)
        .filter(|u| !WHOLE_COURSE_UNITS.contains(&u.to_lowercase().as_str()));

    let mut text_fields = BTreeMap::new();
    for (field, keys) in mapping.text {
        if let Some(text) = first_text(obj, keys) {
            text_fields.insert(field.to_string(), text);
        }
    }
    if let Some(Value::Object(extra)) = obj.get("text_fields") {
        for (k, v) in extra {
            if let Some(text) = value_to_text(v) {
                text_fields.insert(k.clone(), text);
            }
        }
    }

    let consumed: HashSet<&str> = mapping
        .id
        .iter()
        .chain(mapping.name)
        .chain(mapping.unit)
        .chain(mapping.text.iter().flat_map(|(_, keys)| keys.iter()))
        .copied()
        .chain(["vector", "embeddings", "text_fields"])
        .collect();
    let raw_metadata = obj
        .iter()
        .filter(|(k, _)| !consumed.contains(k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Some(EmbeddingRecord {
        entity_id,
        display_name,
        unit_key,
        text_fields,
        vector,
        raw_metadata,
    })
}

/// `cert-<index>` when the export carries an index, else a short hash of the name.
fn synthetic_certificate_id(obj: &Map<String, Value>, display_name: &str) -> String {
    match obj.get("index") {
        Some(Value::Number(n)) => return format!("cert-{}", n),
        Some(Value::String(s)) if !s.trim().is_empty() => return format!("cert-{}", s.trim()),
        _ => {}
    }
    if display_name == NOT_AVAILABLE {
        return String::new();
    }
    let digest = Sha256::digest(display_name.trim().to_lowercase().as_bytes());
    format!("cert-{}", &hex::encode(digest)[..12])
}

fn extract_vector(obj: &Map<String, Value>) -> Option<Vec<f32>> {
    if let Some(v) = obj.get("vector") {
        return parse_vector(v);
    }

    // Certificate export: average the three component embeddings.
    let components = obj.get("embeddings")?.as_object()?;
    let vectors: Vec<Vec<f32>> = CERTIFICATE_COMPONENTS
        .iter()
        .map(|key| components.get(*key).and_then(parse_vector))
        .collect::<Option<_>>()?;
    mean_vector(&vectors)
}

fn parse_vector(value: &Value) -> Option<Vec<f32>> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|v| v.as_f64().filter(|x| x.is_finite()).map(|x| x as f32))
        .collect()
}

/// Element-wise mean; `None` when lengths differ or the input is empty.
pub fn mean_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    if vectors.iter().any(|v| v.len() != first.len()) {
        return None;
    }
    let n = vectors.len() as f64;
    let mean = (0..first.len())
        .map(|i| (vectors.iter().map(|v| f64::from(v[i])).sum::<f64>() / n) as f32)
        .collect();
    Some(mean)
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(value_to_text))
}

/// Strings are trimmed, lists of strings are joined with `"; "`.
fn value_to_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
