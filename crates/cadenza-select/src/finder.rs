//! The search-and-select pipeline.
//!
//! One query runs embed → hybrid search → decision prompt → model
//! invocation → selection parsing. Retrieval failures abort the query;
//! model failures do not discard the candidates already found.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::Semaphore;

use cadenza_core::{Compatibility, Error as CoreError, SearchResult};
use cadenza_search::{query_key, FifoCache, HybridWeights, SearchFilter, SongIndex};

use crate::config::Config;
use crate::error::{EmbedError, SelectError, SelectResult};
use crate::invoke::ModelInvoker;
use crate::parse::{Selection, SelectionParser};
use crate::prompt;
use crate::provider::Embedder;

/// Tunables of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FinderOptions {
    /// Candidates shown to the model.
    pub top_k: usize,
    pub weights: HybridWeights,
    pub temperature: f32,
    pub enhance_query: bool,
    pub cache_capacity: usize,
    pub batch_concurrency: usize,
    /// Dimension the configured embedding model produces.
    pub embed_dimension: usize,
}

impl Default for FinderOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl FinderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.top_k,
            weights: config.weights(),
            temperature: config.temperature,
            enhance_query: config.enhance_query,
            cache_capacity: config.cache_capacity,
            batch_concurrency: config.batch_concurrency,
            embed_dimension: config.embed_dimension,
        }
    }
}

/// How the selected song was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStatus {
    /// The model named a valid candidate.
    Selected,
    /// The model answered but named no valid candidate; the top-ranked
    /// candidate was taken instead.
    Defaulted,
    /// The model could not be reached; candidates are still returned.
    Unavailable,
    /// Nothing matched the query, so the model was not asked.
    NoCandidates,
}

/// Result of [`SongFinder::rank_and_select`].
#[derive(Debug, Clone, Serialize)]
pub struct SelectionReport {
    pub query: String,
    /// The query actually searched, after optional enhancement.
    pub search_query: String,
    pub candidates: Vec<SearchResult>,
    pub selected: Option<SearchResult>,
    /// 1-based position of `selected` within `candidates`.
    pub selected_index: Option<usize>,
    pub reasoning: String,
    pub confidence: f32,
    pub status: SelectionStatus,
    /// The model that made the choice.
    pub model: Option<String>,
    /// Why the model could not be used, for `Unavailable`.
    pub error: Option<String>,
}

/// Index summary for status displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStatus {
    pub songs: usize,
    pub dimension: usize,
    pub recorded_model: Option<String>,
    pub configured_model: String,
    pub configured_dimension: usize,
    pub stale: bool,
    pub enriched: usize,
}

/// Everything needed to answer queries against one loaded index.
///
/// Shared between concurrent queries behind an `Arc`; the only mutable
/// state is the embedding cache and the invoker's model preference.
#[derive(Debug)]
pub struct SongFinder {
    index: SongIndex,
    embedder: Arc<dyn Embedder>,
    invoker: ModelInvoker,
    parser: SelectionParser,
    cache: Mutex<FifoCache<String, Vec<f32>>>,
    options: FinderOptions,
}

impl SongFinder {
    pub fn new(
        index: SongIndex,
        embedder: Arc<dyn Embedder>,
        invoker: ModelInvoker,
        options: FinderOptions,
    ) -> SelectResult<Self> {
        // Logs a warning when the index predates the configured model.
        index
            .corpus()
            .compatibility(embedder.model(), options.embed_dimension);
        Ok(Self {
            index,
            embedder,
            invoker,
            parser: SelectionParser::new()?,
            cache: Mutex::new(FifoCache::new(options.cache_capacity)),
            options,
        })
    }

    pub fn index(&self) -> &SongIndex {
        &self.index
    }

    pub fn invoker(&self) -> &ModelInvoker {
        &self.invoker
    }

    pub fn options(&self) -> &FinderOptions {
        &self.options
    }

    pub fn status(&self) -> IndexStatus {
        let corpus = self.index.corpus();
        let compatibility = corpus.compatibility(self.embedder.model(), self.options.embed_dimension);
        IndexStatus {
            songs: corpus.len(),
            dimension: corpus.dimension(),
            recorded_model: corpus.info().map(|info| info.embed_model.clone()),
            configured_model: self.embedder.model().to_string(),
            configured_dimension: self.options.embed_dimension,
            stale: matches!(compatibility, Compatibility::Stale { .. }),
            enriched: corpus.songs().iter().filter(|s| s.is_enriched()).count(),
        }
    }

    fn cached_embedding(&self, key: &str) -> Option<Vec<f32>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key.to_string())
            .cloned()
    }

    fn cache_embedding(&self, key: String, embedding: Vec<f32>) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, embedding);
    }

    fn ensure_loaded(&self) -> SelectResult<()> {
        if self.index.corpus().is_empty() {
            return Err(CoreError::Input("the song index is empty".to_string()).into());
        }
        Ok(())
    }

    /// Embed a query, reusing the cached vector for equivalent queries.
    pub async fn embed_query(&self, query: &str) -> SelectResult<Vec<f32>> {
        let key = query_key(query);
        if key.is_empty() {
            return Err(CoreError::Input("the query is empty".to_string()).into());
        }
        self.ensure_loaded()?;
        if let Some(embedding) = self.cached_embedding(&key) {
            log::debug!("Embedding cache hit for {:?}", key);
            return Ok(embedding);
        }

        let embedding = self.embedder.embed(query.trim()).await?;
        let expected = self.index.dimension();
        if embedding.len() != expected {
            return Err(EmbedError::Dimension {
                expected,
                actual: embedding.len(),
            }
            .into());
        }
        self.cache_embedding(key, embedding.clone());
        Ok(embedding)
    }

    /// The query to search with: the model's rephrasing when enhancement is
    /// enabled and succeeds, the original query otherwise.
    pub async fn prepare_query(&self, query: &str) -> String {
        let query = query.trim();
        if !self.options.enhance_query {
            return query.to_string();
        }
        match self.invoker.invoke(&prompt::enhancement_request(query)).await {
            Ok(invocation) => {
                let enhanced = invocation.text.trim().trim_matches('"').trim();
                if enhanced.is_empty() {
                    query.to_string()
                } else {
                    log::debug!("Enhanced {:?} to {:?}", query, enhanced);
                    enhanced.to_string()
                }
            }
            Err(e) => {
                log::warn!("Query enhancement failed, using the original query: {}", e);
                query.to_string()
            }
        }
    }

    /// Hybrid search for the top `k` songs.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        weights: HybridWeights,
    ) -> SelectResult<Vec<SearchResult>> {
        let vector = self.embed_query(query).await?;
        Ok(self.index.hybrid_search(query, &vector, k, weights)?)
    }

    /// Nearest-neighbour search only.
    pub async fn semantic_search(&self, query: &str, k: usize) -> SelectResult<Vec<SearchResult>> {
        let vector = self.embed_query(query).await?;
        Ok(self.index.semantic_search(&vector, k)?)
    }

    /// Keyword search only; needs no embedding.
    pub fn keyword_search(&self, query: &str, k: usize) -> SelectResult<Vec<SearchResult>> {
        if query_key(query).is_empty() {
            return Err(CoreError::Input("the query is empty".to_string()).into());
        }
        Ok(self.index.keyword_search(query, k)?)
    }

    /// Semantic search restricted by metadata filters.
    pub async fn search_with_filters(
        &self,
        query: &str,
        k: usize,
        filter: &SearchFilter,
    ) -> SelectResult<Vec<SearchResult>> {
        let vector = self.embed_query(query).await?;
        Ok(self.index.filtered_search(&vector, k, filter)?)
    }

    /// [`Self::rank_and_select`] with the configured `k` and weights.
    pub async fn select(&self, query: &str) -> SelectResult<SelectionReport> {
        self.rank_and_select(query, self.options.top_k, self.options.weights)
            .await
    }

    /// Retrieve candidates and let the model pick one.
    ///
    /// # Errors
    /// Fails on an empty query, an empty index, embedding failures and
    /// retrieval failures. Model failures are reported in the returned
    /// [`SelectionReport`] instead.
    pub async fn rank_and_select(
        &self,
        query: &str,
        k: usize,
        weights: HybridWeights,
    ) -> SelectResult<SelectionReport> {
        if query_key(query).is_empty() {
            return Err(CoreError::Input("the query is empty".to_string()).into());
        }
        self.ensure_loaded()?;
        let search_query = self.prepare_query(query).await;
        let candidates = self.search(&search_query, k, weights).await?;

        let mut report = SelectionReport {
            query: query.trim().to_string(),
            search_query,
            candidates,
            selected: None,
            selected_index: None,
            reasoning: String::new(),
            confidence: 0.0,
            status: SelectionStatus::NoCandidates,
            model: None,
            error: None,
        };
        if report.candidates.is_empty() {
            report.reasoning = "No songs matched the query.".to_string();
            return Ok(report);
        }

        let request = prompt::selection_request(
            &report.query,
            &report.candidates,
            self.options.temperature,
        );
        match self.invoker.invoke(&request).await {
            Ok(invocation) => {
                report.model = Some(invocation.model);
                match self.parser.parse(&invocation.text, report.candidates.len()) {
                    Some(selection) => apply_selection(&mut report, selection),
                    None => {
                        log::warn!("Model response named no valid candidate; taking the first");
                        report.status = SelectionStatus::Defaulted;
                        report.selected_index = Some(1);
                        report.selected = report.candidates.first().cloned();
                        report.reasoning = "The model's answer did not name a valid candidate, \
                                            so the top-ranked song was selected."
                            .to_string();
                    }
                }
            }
            Err(e) => {
                log::warn!("Selection unavailable: {}", e);
                report.status = SelectionStatus::Unavailable;
                report.reasoning =
                    "Selection is unavailable right now; the candidates are still listed."
                        .to_string();
                report.error = Some(e.to_string());
            }
        }
        Ok(report)
    }

    /// Run [`Self::select`] for many queries concurrently.
    ///
    /// At most `batch_concurrency` queries run at once. Results line up
    /// with `queries`; one query failing (or panicking) does not affect the
    /// others.
    pub async fn select_batch(
        finder: &Arc<Self>,
        queries: Vec<String>,
    ) -> Vec<SelectResult<SelectionReport>> {
        let semaphore = Arc::new(Semaphore::new(finder.options.batch_concurrency.max(1)));

        let handles: Vec<_> = queries
            .into_iter()
            .map(|query| {
                let finder = Arc::clone(finder);
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| SelectError::Task(e.to_string()))?;
                    finder.select(&query).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(SelectError::Task(e.to_string())),
            });
        }
        results
    }
}

fn apply_selection(report: &mut SelectionReport, selection: Selection) {
    report.status = SelectionStatus::Selected;
    report.selected_index = Some(selection.index);
    report.selected = report.candidates.get(selection.index - 1).cloned();
    report.reasoning = selection.reasoning;
    report.confidence = selection.confidence;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use cadenza_core::{Corpus, Song, SongId};

    use super::*;
    use crate::error::CallFailure;
    use crate::invoke::BackoffPolicy;
    use crate::provider::{GenerationRequest, GenerativeModel};

    /// Embeds by looking the text up in a fixed table.
    #[derive(Debug, Default)]
    struct TableEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for TableEmbedder {
        fn model(&self) -> &str {
            "table"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(if text.contains("winter") {
                vec![0.0, 1.0]
            } else {
                vec![1.0, 0.0]
            })
        }
    }

    /// Answers every request with the same text, or fails.
    #[derive(Debug)]
    struct FixedModel(Result<String, CallFailure>);

    #[async_trait]
    impl GenerativeModel for FixedModel {
        async fn generate(
            &self,
            _model: &str,
            _request: &GenerationRequest,
        ) -> Result<String, CallFailure> {
            self.0.clone()
        }
    }

    fn finder(answer: Result<String, CallFailure>) -> (SongFinder, Arc<TableEmbedder>) {
        let songs = vec![
            Song::new(SongId::new("summer"), "Summer").with_lyrics("hot sun"),
            Song::new(SongId::new("winter"), "Winter").with_lyrics("cold snow"),
        ];
        let corpus = Corpus::from_parts(songs, vec![vec![1.0, 0.0], vec![0.0, 1.0]], None).unwrap();
        let embedder = Arc::new(TableEmbedder::default());
        let model: Arc<dyn GenerativeModel> = Arc::new(FixedModel(answer));
        let invoker = ModelInvoker::new(model, "m", Vec::new())
            .with_backoff(BackoffPolicy::new(1, Duration::from_millis(1), 2.0))
            .with_sweeps(0);
        let options = FinderOptions {
            top_k: 2,
            embed_dimension: 2,
            ..FinderOptions::default()
        };
        let dyn_embedder: Arc<dyn Embedder> = Arc::clone(&embedder) as Arc<dyn Embedder>;
        let finder = SongFinder::new(SongIndex::build(corpus).unwrap(), dyn_embedder, invoker, options)
            .unwrap();
        (finder, embedder)
    }

    #[tokio::test]
    async fn test_select_structured_answer() {
        let (finder, _) = finder(Ok(r#"{"selected_index": 1, "reasoning": "cold", "confidence": 0.8}"#.into()));
        let report = finder.select("winter snow").await.unwrap();

        assert_eq!(report.status, SelectionStatus::Selected);
        assert_eq!(report.selected.unwrap().song.id, SongId::new("winter"));
        assert_eq!(report.reasoning, "cold");
        assert_eq!(report.model.as_deref(), Some("m"));
    }

    #[tokio::test]
    async fn test_unparseable_answer_defaults_to_first() {
        let (finder, _) = finder(Ok("no idea".into()));
        let report = finder.select("winter").await.unwrap();

        assert_eq!(report.status, SelectionStatus::Defaulted);
        assert_eq!(report.selected_index, Some(1));
        assert_eq!(report.selected, report.candidates.first().cloned());
        assert!(!report.reasoning.is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_keeps_candidates() {
        let (finder, _) = finder(Err(CallFailure::Status {
            status: 401,
            message: "API key not valid".into(),
        }));
        let report = finder.select("winter").await.unwrap();

        assert_eq!(report.status, SelectionStatus::Unavailable);
        assert_eq!(report.candidates.len(), 2);
        assert!(report.selected.is_none());
        assert!(report.error.unwrap().contains("401"));
    }

    #[tokio::test]
    async fn test_empty_query_is_input_error() {
        let (finder, _) = finder(Ok("1".into()));
        let err = finder.select("   ").await.unwrap_err();
        assert!(err.is_input());
    }

    #[tokio::test]
    async fn test_empty_index_is_input_error_before_any_call() {
        let embedder = Arc::new(TableEmbedder::default());
        let model: Arc<dyn GenerativeModel> = Arc::new(FixedModel(Ok("1".into())));
        let options = FinderOptions {
            enhance_query: true,
            ..FinderOptions::default()
        };
        let corpus = Corpus::from_parts(Vec::new(), Vec::new(), None).unwrap();
        let dyn_embedder: Arc<dyn Embedder> = Arc::clone(&embedder) as Arc<dyn Embedder>;
        let finder = SongFinder::new(
            SongIndex::build(corpus).unwrap(),
            dyn_embedder,
            ModelInvoker::new(model, "m", Vec::new()),
            options,
        )
        .unwrap();

        let err = finder.select("autumn leaves").await.unwrap_err();
        assert!(err.is_input());
        assert!(finder.embed_query("autumn leaves").await.unwrap_err().is_input());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_equivalent_queries_share_cached_embedding() {
        let (finder, embedder) = finder(Ok("1".into()));
        finder.embed_query("Winter  Snow").await.unwrap();
        finder.embed_query("winter snow ").await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enhancement_failure_uses_original_query() {
        let (mut finder, _) = finder(Err(CallFailure::Status {
            status: 400,
            message: "bad request".into(),
        }));
        finder.options.enhance_query = true;
        assert_eq!(finder.prepare_query(" winter ").await, "winter");
    }

    #[tokio::test]
    async fn test_search_with_filters() {
        let (finder, _) = finder(Ok("1".into()));
        let filter = SearchFilter {
            artist: Some("nobody".into()),
            ..SearchFilter::default()
        };
        let results = finder.search_with_filters("winter", 2, &filter).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_status() {
        let (finder, _) = finder(Ok("1".into()));
        let status = finder.status();
        assert_eq!(status.songs, 2);
        assert_eq!(status.dimension, 2);
        assert!(!status.stale);
        assert_eq!(status.enriched, 0);
    }
}
