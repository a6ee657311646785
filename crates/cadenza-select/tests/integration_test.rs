//! End-to-end tests for the search-and-select pipeline.
//!
//! The index is written to a temporary sidecar file and loaded back the way
//! the CLI does it. Models are either in-memory fakes or the Gemini client
//! pointed at a mock server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cadenza_core::{Corpus, IndexFile, IndexInfo, IndexedVector, SongId};
use cadenza_search::SongIndex;
use cadenza_select::{
    BackoffPolicy, CallFailure, EmbedError, Embedder, FinderOptions, GeminiClient,
    GenerationRequest, GenerativeModel, ModelInvoker, SelectionStatus, SongFinder,
};

/// Every query lands next to "Golden October".
#[derive(Debug)]
struct AutumnEmbedder;

#[async_trait]
impl Embedder for AutumnEmbedder {
    fn model(&self) -> &str {
        "text-embedding-004"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(vec![0.1, 0.0])
    }
}

/// Built for a different model than the index records.
#[derive(Debug)]
struct OtherModelEmbedder;

#[async_trait]
impl Embedder for OtherModelEmbedder {
    fn model(&self) -> &str {
        "gemini-embedding-001"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(vec![0.0, 0.2])
    }
}

#[derive(Debug)]
struct FixedModel(&'static str);

#[async_trait]
impl GenerativeModel for FixedModel {
    async fn generate(
        &self,
        _model: &str,
        _request: &GenerationRequest,
    ) -> Result<String, CallFailure> {
        Ok(self.0.to_string())
    }
}

/// A: literal match, semantically far. B and C: close, no literal match.
fn write_index(dir: &TempDir) -> std::path::PathBuf {
    let file = IndexFile {
        info: Some(IndexInfo {
            embed_model: "text-embedding-004".to_string(),
            dimension: 2,
        }),
        vectors: vec![
            IndexedVector {
                id: json!("a"),
                embedding: vec![1.0, 1.0],
                metadata: json!({
                    "title": "Листопад",
                    "lyrics": ["autumn leaves are falling", "down on the road"]
                }),
            },
            IndexedVector {
                id: json!("b"),
                embedding: vec![0.1, 0.0],
                metadata: json!({"title": "Golden October", "lyrics": "amber light on the fields"}),
            },
            IndexedVector {
                id: json!("c"),
                embedding: vec![0.0, 0.2],
                metadata: json!({"title": "Grey Skies", "lyrics": "cold wind", "mood": "wistful"}),
            },
        ],
    };
    let path = dir.path().join("songs_metadata.json");
    file.save(&path).unwrap();
    path
}

fn finder(
    dir: &TempDir,
    embedder: Arc<dyn Embedder>,
    invoker: ModelInvoker,
) -> SongFinder {
    let corpus = Corpus::load(write_index(dir)).unwrap();
    let options = FinderOptions {
        top_k: 3,
        embed_dimension: 2,
        ..FinderOptions::default()
    };
    SongFinder::new(SongIndex::build(corpus).unwrap(), embedder, invoker, options).unwrap()
}

fn fast_invoker(model: Arc<dyn GenerativeModel>, primary: &str, fallbacks: &[&str]) -> ModelInvoker {
    ModelInvoker::new(
        model,
        primary,
        fallbacks.iter().map(|m| (*m).to_string()).collect(),
    )
    .with_backoff(BackoffPolicy::new(1, Duration::from_millis(1), 2.0))
    .with_sweeps(0)
}

#[tokio::test]
async fn test_literal_match_wins_and_is_selected() {
    let dir = TempDir::new().unwrap();
    let model: Arc<dyn GenerativeModel> = Arc::new(FixedModel(
        r#"{"selected_index": 1, "reasoning": "the lyrics mention autumn leaves", "confidence": 0.9}"#,
    ));
    let finder = finder(&dir, Arc::new(AutumnEmbedder), fast_invoker(model, "m", &[]));

    let report = finder.select("autumn leaves").await.unwrap();

    assert_eq!(report.candidates.len(), 3);
    assert_eq!(report.candidates[0].song.id, SongId::new("a"));
    assert!((report.candidates[0].match_percent - 100.0).abs() < 1e-3);
    // B is the closest neighbour but ranks below A.
    assert_eq!(report.candidates[1].song.id, SongId::new("b"));
    assert!(
        report.candidates[0].similarity_distance.unwrap()
            > report.candidates[1].similarity_distance.unwrap()
    );

    assert_eq!(report.status, SelectionStatus::Selected);
    assert_eq!(report.selected.unwrap().song.id, SongId::new("a"));
    assert!((report.confidence - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn test_textual_answer_is_parsed() {
    let dir = TempDir::new().unwrap();
    let model: Arc<dyn GenerativeModel> = Arc::new(FixedModel(
        "ВЫБОР: 2\nОБЪЯСНЕНИЕ: Золотая осень.",
    ));
    let finder = finder(&dir, Arc::new(AutumnEmbedder), fast_invoker(model, "m", &[]));

    let report = finder.select("autumn leaves").await.unwrap();

    assert_eq!(report.selected_index, Some(2));
    assert_eq!(report.selected.unwrap().song.id, SongId::new("b"));
    assert_eq!(report.reasoning, "Золотая осень.");
}

#[tokio::test]
async fn test_batch_keeps_order_and_isolates_failures() {
    let dir = TempDir::new().unwrap();
    let model: Arc<dyn GenerativeModel> = Arc::new(FixedModel("ВЫБОР: 1"));
    let finder = Arc::new(finder(
        &dir,
        Arc::new(AutumnEmbedder),
        fast_invoker(model, "m", &[]),
    ));

    let queries = vec![
        "autumn leaves".to_string(),
        "   ".to_string(),
        "cold wind".to_string(),
    ];
    let results = SongFinder::select_batch(&finder, queries).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().query, "autumn leaves");
    assert!(results[1].as_ref().unwrap_err().is_input());
    assert_eq!(results[2].as_ref().unwrap().query, "cold wind");
}

#[tokio::test]
async fn test_gemini_overloaded_primary_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/text-embedding-004:embedContent"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embedding": {"values": [0.1, 0.0]}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/primary-model:generateContent"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/fallback-model:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [
                {"text": "{\"selected_index\": 2, \"reasoning\": \"grey skies\"}"}
            ]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(GeminiClient::new("test-key").unwrap().with_base_url(server.uri()));
    let embedder: Arc<dyn Embedder> = Arc::clone(&client) as Arc<dyn Embedder>;
    let model: Arc<dyn GenerativeModel> = client;
    let dir = TempDir::new().unwrap();
    let finder = finder(
        &dir,
        embedder,
        fast_invoker(model, "primary-model", &["fallback-model"]),
    );

    let report = finder.select("something sad").await.unwrap();

    assert_eq!(report.status, SelectionStatus::Selected);
    assert_eq!(report.model.as_deref(), Some("fallback-model"));
    assert_eq!(report.selected.unwrap().song.id, SongId::new("c"));
    assert_eq!(
        finder.invoker().last_successful_model().as_deref(),
        Some("fallback-model")
    );
}

#[tokio::test]
async fn test_stale_index_is_still_searchable() {
    let dir = TempDir::new().unwrap();
    let model: Arc<dyn GenerativeModel> = Arc::new(FixedModel("1"));

    let finder = finder(&dir, Arc::new(OtherModelEmbedder), fast_invoker(model, "m", &[]));

    assert!(finder.status().stale);
    let results = finder.semantic_search("anything", 1).await.unwrap();
    assert_eq!(results[0].song.id, SongId::new("c"));
}
