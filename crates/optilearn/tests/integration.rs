use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use optilearn::config::{parse_config, EngineConfig};
use optilearn::corpus::FileCorpusSource;
use optilearn::recommend::{CorpusSelection, Recommender};
use optilearn::server::build_router;
use optilearn_core::classify::KeywordClassifier;
use optilearn_core::corpus::memory::InMemoryCorpus;
use optilearn_core::corpus::{parse_corpus_str, CorpusEncoding};
use optilearn_core::embedding::{Deadline, EmbeddingProvider};
use optilearn_core::error::EmbeddingError;
use optilearn_core::models::CorpusKind;

fn optilearn_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("optilearn");
    path
}

const COURSES: &str = r#"{
  "embeddings": [
    {
      "course_code": "CS-101",
      "course_name": "Introduction to Programming",
      "module_display_name": "Week 1",
      "description": "Python programming fundamentals",
      "vector": [0.25, 0.968]
    },
    {
      "course_code": "CS-101",
      "course_name": "Introduction to Programming",
      "module_display_name": "Week 3",
      "description": "Algorithms and data structures",
      "vector": [0.55, 0.835]
    },
    {
      "course_code": "MGT-610",
      "course_name": "Strategic Leadership",
      "module_name": "full_course",
      "description": "Leadership, strategy and stakeholder management",
      "vector": [0.30, 0.954]
    },
    {
      "course_code": "CS-999",
      "course_name": "Broken Record",
      "vector": []
    }
  ]
}"#;

const CERTIFICATES: &str = r#"{
  "course_embeddings": [
  {
    "certificate_name": "Graduate Certificate in Data Science",
    "requirements": "Machine learning, statistics, python",
    "vector": [0.45, 0.893]
  },
  {
    "certificate_name": "Project Management Certificate",
    "requirements": "Budget, leadership, stakeholder communication",
    "vector": [0.10, 0.995]
  },
  {
    "certificate_name": "Master of Science in Finance",
    "vector": [0.9, 0.436]
  }
  ]
}"#;

fn setup_test_env(embedding: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    let data_dir = root.join("data");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(data_dir.join("all_course_embeddings.json"), COURSES).unwrap();
    fs::write(data_dir.join("certificate_embeddings.json"), CERTIFICATES).unwrap();

    let config_content = format!(
        r#"[corpus]
courses = "{root}/data/all_course_embeddings.json"
certificates = "{root}/data/certificate_embeddings.json"

{embedding}

[engine]
similarity_floor = 0.2
top_k_courses = 10
top_k_certificates = 3
deadline_secs = 5

[server]
bind = "127.0.0.1:7341"
"#,
        root = root.display(),
        embedding = embedding,
    );

    let config_path = config_dir.join("optilearn.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

const DISABLED: &str = "[embedding]\nprovider = \"disabled\"";

fn run_optilearn(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = optilearn_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run optilearn binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

// ─── CLI ────────────────────────────────────────────────────────────

#[test]
fn test_stats_reports_both_corpora() {
    let (_tmp, config_path) = setup_test_env(DISABLED);

    let (stdout, stderr, success) = run_optilearn(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);

    assert!(stdout.contains("courses"));
    assert!(stdout.contains("Records:     3"), "stdout: {}", stdout);
    assert!(stdout.contains("Skipped:     1"), "stdout: {}", stdout);
    assert!(stdout.contains("Entities:    2"), "stdout: {}", stdout);
    assert!(stdout.contains("certificates"));
    assert!(stdout.contains("Records:     2"), "stdout: {}", stdout);
}

#[test]
fn test_stats_single_corpus() {
    let (_tmp, config_path) = setup_test_env(DISABLED);

    let (stdout, _, success) = run_optilearn(&config_path, &["stats", "--corpus", "certificates"]);
    assert!(success);
    assert!(stdout.contains("certificates"));
    assert!(!stdout.contains("Skipped:     1"));
}

#[test]
fn test_recommend_with_disabled_provider_fails_cleanly() {
    let (_tmp, config_path) = setup_test_env(DISABLED);

    let (stdout, stderr, success) =
        run_optilearn(&config_path, &["recommend", "data engineering for analysts"]);
    assert!(!success, "recommend should fail: stdout={}", stdout);
    assert!(
        stderr.contains("no recommendations available, reason: embedding_disabled"),
        "stderr: {}",
        stderr
    );
    assert!(!stdout.contains("RANK"));
}

#[test]
fn test_recommend_rejects_out_of_range_tech_ratio() {
    let (_tmp, config_path) = setup_test_env(DISABLED);

    let (_, stderr, success) = run_optilearn(
        &config_path,
        &["recommend", "cloud", "--tech-ratio", "150"],
    );
    assert!(!success);
    assert!(stderr.contains("tech-ratio"), "stderr: {}", stderr);
}

#[test]
fn test_build_corpus_requires_provider() {
    let (tmp, config_path) = setup_test_env(DISABLED);
    let syllabi = tmp.path().join("syllabi");
    fs::create_dir_all(&syllabi).unwrap();

    let output = tmp.path().join("out.json");
    let (_, stderr, success) = run_optilearn(
        &config_path,
        &[
            "build-corpus",
            syllabi.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ],
    );
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
    assert!(!output.exists());
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config_path) = setup_test_env("[embedding]\nprovider = \"cohere\"");

    let (_, stderr, success) = run_optilearn(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("cohere"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_file() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_optilearn(&tmp.path().join("nope.toml"), &["stats"]);
    assert!(!success);
    assert!(!stderr.is_empty());
}

// ─── Server (binary) ────────────────────────────────────────────────

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

struct ServerGuard(Child);

impl Drop for ServerGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn start_server(config_path: &Path) -> ServerGuard {
    let child = Command::new(optilearn_binary())
        .arg("--config")
        .arg(config_path)
        .arg("serve")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start optilearn serve");
    ServerGuard(child)
}

async fn wait_for_server(base: &str) {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if let Ok(resp) = client.get(format!("{}/health", base)).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("server at {} did not become ready", base);
}

#[tokio::test]
async fn test_serve_reports_provider_unavailable() {
    let (_tmp, config_path) = setup_test_env(DISABLED);
    let port = find_free_port();
    let content = fs::read_to_string(&config_path)
        .unwrap()
        .replace("127.0.0.1:7341", &format!("127.0.0.1:{}", port));
    fs::write(&config_path, content).unwrap();

    let _server = start_server(&config_path);
    let base = format!("http://127.0.0.1:{}", port);
    wait_for_server(&base).await;

    let client = reqwest::Client::new();
    let health: serde_json::Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["model"], "disabled");

    let resp = client
        .post(format!("{}/recommend", base))
        .json(&serde_json::json!({ "requirements": "cloud data pipelines" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 503);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "provider_unavailable");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("embedding_disabled"));
}

// ─── Server (in-process router) ─────────────────────────────────────

struct FixedProvider(Vec<f32>);

#[async_trait]
impl EmbeddingProvider for FixedProvider {
    fn model_name(&self) -> &str {
        "fixed-test-model"
    }
    fn dims(&self) -> usize {
        self.0.len()
    }
    async fn embed(&self, _text: &str, _deadline: Deadline) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.0.clone())
    }
}

async fn serve_router(provider: FixedProvider) -> String {
    let mut corpora = InMemoryCorpus::new();
    corpora.insert(
        parse_corpus_str(CorpusKind::Courses, COURSES, CorpusEncoding::Json, None).unwrap(),
    );
    corpora.insert(
        parse_corpus_str(
            CorpusKind::Certificates,
            CERTIFICATES,
            CorpusEncoding::Json,
            None,
        )
        .unwrap(),
    );

    let recommender = Recommender::new(
        Arc::new(provider),
        Arc::new(corpora),
        Arc::new(KeywordClassifier::default()),
    );
    let app = build_router(recommender, EngineConfig::default(), CorpusSelection::All);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_recommend_endpoint_ranks_both_corpora() {
    let base = serve_router(FixedProvider(vec![1.0, 0.0])).await;
    let client = reqwest::Client::new();

    let body: serde_json::Value = client
        .post(format!("{}/recommend", base))
        .json(&serde_json::json!({ "requirements": "analytics team", "tech_ratio": 50 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let courses = body["courses"].as_array().unwrap();
    assert_eq!(courses.len(), 2);
    assert_eq!(courses[0]["entity_id"], "CS-101");
    assert_eq!(courses[0]["unit_key"], "Week 3");
    assert_eq!(courses[0]["rank"], 1);
    assert_eq!(courses[0]["match_percentage"], 55);
    assert_eq!(courses[1]["entity_id"], "MGT-610");
    assert!(courses[1]["unit_key"].is_null());

    // The non-certificate program is filtered out; the 0.10 match misses the floor.
    let certificates = body["certificates"].as_array().unwrap();
    assert_eq!(certificates.len(), 1);
    assert_eq!(
        certificates[0]["display_name"],
        "Graduate Certificate in Data Science"
    );
}

#[tokio::test]
async fn test_recommend_endpoint_single_corpus_and_top_k() {
    let base = serve_router(FixedProvider(vec![1.0, 0.0])).await;
    let client = reqwest::Client::new();

    let body: serde_json::Value = client
        .post(format!("{}/recommend", base))
        .json(&serde_json::json!({
            "requirements": "analytics team",
            "corpus": "courses",
            "top_k": 1
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["courses"].as_array().unwrap().len(), 1);
    assert!(body.get("certificates").is_none());
}

#[tokio::test]
async fn test_recommend_endpoint_bad_requests() {
    let base = serve_router(FixedProvider(vec![1.0, 0.0])).await;
    let client = reqwest::Client::new();

    for body in [
        serde_json::json!({ "requirements": "   " }),
        serde_json::json!({ "requirements": "x", "tech_ratio": 101 }),
        serde_json::json!({ "requirements": "x", "tech_ratio": -1 }),
        serde_json::json!({ "requirements": "x", "top_k": 0 }),
        serde_json::json!({ "tech_ratio": 10 }),
    ] {
        let resp = client
            .post(format!("{}/recommend", base))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400, "body: {}", body);
        let err: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(err["error"]["code"], "bad_request");
    }
}

#[tokio::test]
async fn test_recommend_endpoint_dimension_mismatch() {
    let base = serve_router(FixedProvider(vec![1.0, 0.0, 0.0])).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/recommend", base))
        .json(&serde_json::json!({ "requirements": "analytics team" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);
    let err: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(err["error"]["code"], "corpus_unavailable");
}

#[tokio::test]
async fn test_health_reports_model() {
    let base = serve_router(FixedProvider(vec![1.0, 0.0])).await;
    let health: serde_json::Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["model"], "fixed-test-model");
}

// ─── Courses-only configuration ─────────────────────────────────────

fn courses_only_config(root: &Path, embedding: &str) -> String {
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join("all_course_embeddings.json"), COURSES).unwrap();
    format!(
        "[corpus]\ncourses = \"{}/data/all_course_embeddings.json\"\n\n{}\n",
        root.display(),
        embedding
    )
}

#[tokio::test]
async fn test_recommend_endpoint_defaults_to_configured_corpora() {
    let tmp = TempDir::new().unwrap();
    let config = parse_config(&courses_only_config(tmp.path(), DISABLED)).unwrap();

    let recommender = Recommender::new(
        Arc::new(FixedProvider(vec![1.0, 0.0])),
        Arc::new(FileCorpusSource::new(&config.corpus)),
        Arc::new(KeywordClassifier::default()),
    );
    let app = build_router(
        recommender,
        config.engine.clone(),
        CorpusSelection::configured(&config.corpus),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/recommend", base))
        .json(&serde_json::json!({ "requirements": "analytics team" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["courses"].as_array().unwrap().len(), 2);
    assert!(body.get("certificates").is_none());

    // Asking for the unconfigured corpus explicitly is still an error.
    let resp = client
        .post(format!("{}/recommend", base))
        .json(&serde_json::json!({ "requirements": "analytics team", "corpus": "certificates" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);
    let err: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(err["error"]["code"], "corpus_unavailable");
}

async fn mock_embeddings() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "data": [{ "index": 0, "embedding": [1.0, 0.0] }] }))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cli_recommend_defaults_to_configured_corpora() {
    let app = axum::Router::new().route("/v1/embeddings", axum::routing::post(mock_embeddings));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mock = format!("http://{}/v1", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let tmp = TempDir::new().unwrap();
    let embedding = format!(
        "[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 2\nurl = \"{}\"",
        mock
    );
    let config_path = tmp.path().join("optilearn.toml");
    fs::write(&config_path, courses_only_config(tmp.path(), &embedding)).unwrap();

    let output = tokio::task::spawn_blocking(move || {
        Command::new(optilearn_binary())
            .arg("--config")
            .arg(&config_path)
            .args(["recommend", "analytics team", "--json"])
            .env("OPENAI_API_KEY", "sk-test")
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stdout={}, stderr={}", stdout, stderr);

    let body: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let courses = body["courses"].as_array().unwrap();
    assert_eq!(courses[0]["entity_id"], "CS-101");
    assert!(body.get("certificates").is_none());
}
