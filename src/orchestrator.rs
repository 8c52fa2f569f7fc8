//! Query routing and ingestion pipeline for Dugout.
//!
//! Ties the query stages to their collaborators: historical questions go
//! through filter building, rewriting, retrieval and answer synthesis;
//! realtime questions go to the video model; everything else goes to web
//! search.

use crate::answer::{AnswerSynthesizer, HistoricalAnswer, OpenAIAnswerSynthesizer};
use crate::config::{ClassifierMode, Prompts, Settings};
use crate::context::{ContextStore, SqliteKeyedStore};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{DugoutError, Result};
use crate::ingest::{GameSegmentRecord, SegmentIngestor, SkippedFile};
use crate::query::time_expr::parse_clock;
use crate::query::{
    LlmClassifier, QueryClassification, QueryClassifier, QueryRewriter, QueryType, RewrittenQuery,
    RuleClassifier, TemporalFilter, TemporalFilterBuilder,
};
use crate::retrieval::TemporalRetriever;
use crate::search::{SearchAnswer, SerperSearcher, WebSearcher};
use crate::vector_store::{
    EmbeddedChunk, IndexedGame, MemoryVectorStore, SegmentDocument, SqliteVectorStore,
    VectorStore,
};
use crate::video::{GeminiClient, GeminiVideoAnalyzer, RealtimeAnswer, VideoAnalyzer};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Collaborators injected into an [`Orchestrator`].
pub struct Components {
    pub classifier: Arc<dyn QueryClassifier>,
    pub embedder: Arc<dyn Embedder>,
    pub vector_store: Arc<dyn VectorStore>,
    pub synthesizer: Arc<dyn AnswerSynthesizer>,
    /// Realtime branch; realtime questions fail without it.
    pub video: Option<Arc<dyn VideoAnalyzer>>,
    /// Search branch; search questions fail without it.
    pub searcher: Option<Arc<dyn WebSearcher>>,
    pub context: ContextStore,
}

/// Everything decided about a query before retrieval.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPlan {
    pub query: String,
    pub current_time_seconds: i64,
    pub classification: QueryClassification,
    pub filter: TemporalFilter,
    pub rewritten: RewrittenQuery,
}

/// Chunks retrieved for a historical query, with the plan that found them.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub plan: QueryPlan,
    pub chunks: Vec<EmbeddedChunk>,
}

/// Result of ingesting one directory of segment files.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub game_id: String,
    pub segments_indexed: usize,
    pub skipped: Vec<SkippedFile>,
    /// Segment files whose embedding could not be generated.
    pub embedding_failures: Vec<String>,
}

/// The answer of whichever branch handled a query.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Realtime(RealtimeAnswer),
    Historical(HistoricalAnswer),
    Search(SearchAnswer),
}

/// Response envelope: `{result, type}` on success, `{error}` on failure.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalysisEnvelope {
    Success {
        result: AnalysisResult,
        #[serde(rename = "type")]
        kind: QueryType,
    },
    Failure {
        error: String,
    },
}

impl AnalysisEnvelope {
    pub fn failure(error: impl ToString) -> Self {
        AnalysisEnvelope::Failure {
            error: error.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AnalysisEnvelope::Failure { .. })
    }
}

/// The main orchestrator for the Dugout pipeline.
///
/// Cloning is cheap apart from the settings; every collaborator is shared.
#[derive(Clone)]
pub struct Orchestrator {
    settings: Settings,
    classifier: Arc<dyn QueryClassifier>,
    filter_builder: TemporalFilterBuilder,
    rewriter: QueryRewriter,
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    video: Option<Arc<dyn VideoAnalyzer>>,
    searcher: Option<Arc<dyn WebSearcher>>,
    context: ContextStore,
    game_id: Option<String>,
}

impl Orchestrator {
    /// Create an orchestrator with collaborators built from settings.
    ///
    /// The realtime and search branches are left out, with a warning, when
    /// their API keys are missing.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let classifier: Arc<dyn QueryClassifier> = match settings.classifier.mode {
            ClassifierMode::Rules => Arc::new(RuleClassifier::new()),
            ClassifierMode::Llm => {
                info!("Using model classifier ({})", settings.classifier.model);
                Arc::new(LlmClassifier::new(&settings.classifier.model, prompts.clone())?)
            }
        };

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        )?);

        let vector_store: Arc<dyn VectorStore> = match settings.vector_store.provider.as_str() {
            "sqlite" => Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?),
            "memory" => Arc::new(MemoryVectorStore::new()),
            other => {
                return Err(DugoutError::Config(format!(
                    "Unknown vector store provider: {}",
                    other
                )))
            }
        };

        let synthesizer: Arc<dyn AnswerSynthesizer> = Arc::new(
            OpenAIAnswerSynthesizer::new(&settings.answer.model, prompts.clone())?
                .with_temperature(settings.answer.temperature),
        );

        let context = ContextStore::new(Arc::new(SqliteKeyedStore::new(&settings.context_path())?));

        let video: Option<Arc<dyn VideoAnalyzer>> = match GeminiClient::from_settings(&settings.video) {
            Ok(client) => Some(Arc::new(
                GeminiVideoAnalyzer::new(client, prompts.clone()).with_context(context.clone()),
            )),
            Err(e) => {
                warn!("Realtime analysis unavailable: {}", e);
                None
            }
        };

        let searcher: Option<Arc<dyn WebSearcher>> =
            match SerperSearcher::from_settings(&settings.search, prompts) {
                Ok(searcher) => Some(Arc::new(searcher)),
                Err(e) => {
                    warn!("Web search unavailable: {}", e);
                    None
                }
            };

        Ok(Self::with_components(
            settings,
            Components {
                classifier,
                embedder,
                vector_store,
                synthesizer,
                video,
                searcher,
                context,
            },
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(settings: Settings, components: Components) -> Self {
        Self {
            settings,
            classifier: components.classifier,
            filter_builder: TemporalFilterBuilder::new(),
            rewriter: QueryRewriter::new(),
            embedder: components.embedder,
            vector_store: components.vector_store,
            synthesizer: components.synthesizer,
            video: components.video,
            searcher: components.searcher,
            context: components.context,
            game_id: None,
        }
    }

    /// Restrict retrieval to one game.
    pub fn with_game(mut self, game_id: Option<String>) -> Self {
        self.game_id = game_id;
        self
    }

    /// A copy of this orchestrator that only retrieves from `game_id`.
    pub fn for_game(&self, game_id: impl Into<String>) -> Self {
        self.clone().with_game(Some(game_id.into()))
    }

    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    pub fn video_analyzer(&self) -> Option<Arc<dyn VideoAnalyzer>> {
        self.video.clone()
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn list_games(&self) -> Result<Vec<IndexedGame>> {
        self.vector_store.list_games().await
    }

    /// Ingest, embed and index a directory of segment analysis files.
    ///
    /// Games are append-only: a game that is already indexed is refused.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn ingest_game(&self, dir: &Path, game_id: Option<&str>) -> Result<IngestResult> {
        let game_id = game_id
            .map(str::to_string)
            .unwrap_or_else(|| self.settings.ingest.default_game_id.clone());

        if self.vector_store.is_game_indexed(&game_id).await? {
            return Err(DugoutError::InvalidInput(format!(
                "Game '{}' is already indexed; use a different game id",
                game_id
            )));
        }

        let report = SegmentIngestor::new(self.settings.ingest.step_seconds).ingest(dir)?;
        let (documents, embedding_failures) = self.embed_records(&game_id, report.records).await;

        let segments_indexed = if documents.is_empty() {
            0
        } else {
            self.vector_store.upsert_batch(&documents).await?
        };

        info!(
            "Indexed {} segments for game '{}' ({} skipped, {} embedding failures)",
            segments_indexed,
            game_id,
            report.skipped.len(),
            embedding_failures.len()
        );

        Ok(IngestResult {
            game_id,
            segments_indexed,
            skipped: report.skipped,
            embedding_failures,
        })
    }

    /// Embed records in one batch, falling back to one call per record.
    async fn embed_records(
        &self,
        game_id: &str,
        records: Vec<GameSegmentRecord>,
    ) -> (Vec<SegmentDocument>, Vec<String>) {
        let texts: Vec<String> = records.iter().map(|r| r.description.clone()).collect();

        let embeddings: Vec<Option<Vec<f32>>> = match self.embedder.embed_batch(&texts).await {
            Ok(batch) => batch.into_iter().map(Some).collect(),
            Err(e) => {
                warn!("Batch embedding failed ({}), embedding segments one by one", e);
                let mut single = Vec::with_capacity(texts.len());
                for (record, text) in records.iter().zip(&texts) {
                    match self.embedder.embed(text).await {
                        Ok(embedding) => single.push(Some(embedding)),
                        Err(e) => {
                            warn!("Skipping {}: {}", record.source_reference, e);
                            single.push(None);
                        }
                    }
                }
                single
            }
        };

        let mut documents = Vec::with_capacity(records.len());
        let mut failures = Vec::new();
        for (record, embedding) in records.into_iter().zip(embeddings) {
            match embedding {
                Some(embedding) => documents.push(SegmentDocument::new(
                    game_id.to_string(),
                    record.segment_index,
                    record.description.clone(),
                    embedding,
                    record.metadata(),
                )),
                None => failures.push(record.source_reference),
            }
        }
        (documents, failures)
    }

    /// Classify a query and build its filter and search string.
    #[instrument(skip(self))]
    pub async fn plan(&self, query: &str, current_time_seconds: i64) -> Result<QueryPlan> {
        let classification = self.classifier.classify(query).await?;
        Ok(self.plan_with(query, current_time_seconds, classification))
    }

    fn plan_with(
        &self,
        query: &str,
        current_time_seconds: i64,
        classification: QueryClassification,
    ) -> QueryPlan {
        // Time phrasing is read from the user's words; the rewrite works on
        // the self-contained form.
        let filter = self.filter_builder.build(query, current_time_seconds);
        let rewritten = self.rewriter.rewrite(&classification.optimized_query);
        QueryPlan {
            query: query.to_string(),
            current_time_seconds,
            classification,
            filter,
            rewritten,
        }
    }

    fn retriever(&self) -> TemporalRetriever {
        let retrieval = &self.settings.retrieval;
        TemporalRetriever::new(self.vector_store.clone(), self.embedder.clone())
            .with_top_k(retrieval.top_k)
            .with_point_tolerance(retrieval.point_tolerance_seconds)
            .with_tie_epsilon(retrieval.score_tie_epsilon)
            .with_game(self.game_id.clone())
    }

    /// Historical retrieval for a query, whatever its classification.
    #[instrument(skip(self))]
    pub async fn retrieve(&self, query: &str, current_time_seconds: i64) -> Result<RetrievalResult> {
        let plan = self.plan(query, current_time_seconds).await?;
        self.retrieve_planned(plan).await
    }

    async fn retrieve_planned(&self, plan: QueryPlan) -> Result<RetrievalResult> {
        let chunks = self
            .retriever()
            .retrieve(&plan.rewritten, &plan.filter, &plan.query, plan.current_time_seconds)
            .await?;
        Ok(RetrievalResult { plan, chunks })
    }

    /// Route a query to its branch and answer it.
    ///
    /// Never fails: errors come back as the `{error}` envelope.
    #[instrument(skip(self))]
    pub async fn answer(&self, query: &str, video: Option<&str>, current_time: &str) -> AnalysisEnvelope {
        match self.try_answer(query, video, current_time).await {
            Ok((kind, result)) => AnalysisEnvelope::Success { result, kind },
            Err(e) => {
                warn!("Query failed: {}", e);
                AnalysisEnvelope::failure(e)
            }
        }
    }

    async fn try_answer(
        &self,
        query: &str,
        video: Option<&str>,
        current_time: &str,
    ) -> Result<(QueryType, AnalysisResult)> {
        if query.trim().is_empty() {
            return Err(DugoutError::InvalidInput("query is empty".to_string()));
        }
        let current_time_seconds = parse_clock(current_time)?;

        let classification = self.classifier.classify(query).await?;
        let kind = classification.kind;
        info!(%kind, "Routing query");

        let result = match kind {
            QueryType::Realtime => {
                let analyzer = self.video.as_ref().ok_or_else(|| {
                    DugoutError::VideoProcessing("video analysis is not configured".to_string())
                })?;
                let video = video.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
                    DugoutError::InvalidInput("a video segment is required for realtime questions".to_string())
                })?;
                let path = resolve_segment(&self.settings.segment_dir(), video)?;
                let answer = analyzer.analyze(query, &path).await?;
                AnalysisResult::Realtime(answer)
            }
            QueryType::Historical => {
                let plan = self.plan_with(query, current_time_seconds, classification);
                let retrieved = self.retrieve_planned(plan).await?;
                let answer = self
                    .synthesizer
                    .synthesize(query, &retrieved.chunks, current_time_seconds)
                    .await?;
                AnalysisResult::Historical(answer)
            }
            QueryType::Search => {
                let searcher = self.searcher.as_ref().ok_or_else(|| {
                    DugoutError::WebSearch("web search is not configured".to_string())
                })?;
                let answer = searcher.search(&classification.optimized_query).await?;
                AnalysisResult::Search(answer)
            }
        };

        Ok((kind, result))
    }
}

/// Path of a named video segment inside `segment_dir`.
///
/// Only bare file names are accepted; anything that could leave the
/// directory is rejected.
pub fn resolve_segment(segment_dir: &Path, name: &str) -> Result<PathBuf> {
    let name = name.trim();
    let is_bare = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some_and(|f| f == name);
    if !is_bare {
        return Err(DugoutError::InvalidInput(format!(
            "video must be a segment file name, got '{}'",
            name
        )));
    }
    Ok(segment_dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::citations;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds by keyword; fails on texts containing "poison".
    struct FakeEmbedder {
        batch_fails: bool,
        batch_calls: AtomicUsize,
    }

    impl FakeEmbedder {
        fn new(batch_fails: bool) -> Self {
            Self {
                batch_fails,
                batch_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("poison") {
                return Err(DugoutError::Embedding("rejected".to_string()));
            }
            let text = text.to_lowercase();
            Ok(vec![
                if text.contains("homerun") || text.contains("home run") { 1.0 } else { 0.0 },
                if text.contains("bunt") { 1.0 } else { 0.0 },
                0.1,
            ])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            if self.batch_fails {
                return Err(DugoutError::Embedding("batch too large".to_string()));
            }
            let mut out = Vec::new();
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    struct EchoSynthesizer;

    #[async_trait]
    impl AnswerSynthesizer for EchoSynthesizer {
        async fn synthesize(
            &self,
            query: &str,
            chunks: &[EmbeddedChunk],
            _current_time_seconds: i64,
        ) -> Result<HistoricalAnswer> {
            let times: Vec<String> = chunks.iter().map(|c| c.metadata.time.to_string()).collect();
            Ok(HistoricalAnswer {
                answer: format!("times: {}", times.join(",")),
                query: query.to_string(),
                citations: citations(chunks),
            })
        }
    }

    #[derive(Default)]
    struct FakeVideo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VideoAnalyzer for FakeVideo {
        async fn analyze(&self, query: &str, video: &Path) -> Result<RealtimeAnswer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RealtimeAnswer {
                query: query.to_string(),
                video: video.display().to_string(),
                response: "The count is 2-1.".to_string(),
            })
        }

        async fn describe_segment(&self, _video: &Path) -> Result<String> {
            Err(DugoutError::VideoProcessing("unused".to_string()))
        }
    }

    struct FakeSearcher;

    #[async_trait]
    impl WebSearcher for FakeSearcher {
        async fn search(&self, query: &str) -> Result<SearchAnswer> {
            Ok(SearchAnswer {
                answer: format!("searched: {}", query),
                citations: vec!["https://example.com".to_string()],
            })
        }
    }

    fn orchestrator(embedder: Arc<FakeEmbedder>, with_branches: bool) -> Orchestrator {
        orchestrator_with_video(embedder, with_branches.then(|| Arc::new(FakeVideo::default())))
    }

    fn orchestrator_with_video(
        embedder: Arc<FakeEmbedder>,
        video: Option<Arc<FakeVideo>>,
    ) -> Orchestrator {
        let with_branches = video.is_some();
        let mut settings = Settings::default();
        settings.video.segment_dir = "/srv/dugout/segments".to_string();
        Orchestrator::with_components(
            settings,
            Components {
                classifier: Arc::new(RuleClassifier::new()),
                embedder,
                vector_store: Arc::new(MemoryVectorStore::new()),
                synthesizer: Arc::new(EchoSynthesizer),
                video: video.map(|v| v as Arc<dyn VideoAnalyzer>),
                searcher: with_branches.then(|| Arc::new(FakeSearcher) as Arc<dyn WebSearcher>),
                context: ContextStore::in_memory(),
            },
        )
    }

    fn write_segments(dir: &Path, plays: &[(&str, bool)]) {
        for (i, (play, homerun)) in plays.iter().enumerate() {
            let flag = if *homerun { "1" } else { "0" };
            std::fs::write(
                dir.join(format!("segment_{}.txt", i + 1)),
                format!(
                    r#"{{"play_by_play": "{}", "major_events": "", "is_major": "{}", "homerun": "{}", "out": "0", "strategies": ""}}"#,
                    play, flag, flag
                ),
            )
            .unwrap();
        }
    }

    fn game_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_segments(
            dir.path(),
            &[
                ("Warm-up pitches.", false),
                ("Judge hits a home run to left!", true),
                ("Sacrifice bunt moves the runner.", false),
                ("Ohtani homerun to deep center!", true),
                ("Strikeout looking.", false),
                ("Walk-off homerun!", true),
            ],
        );
        dir
    }

    #[tokio::test]
    async fn test_ingest_then_latest_homerun() {
        let dir = game_dir();
        let orchestrator = orchestrator(Arc::new(FakeEmbedder::new(false)), true);

        let ingested = orchestrator.ingest_game(dir.path(), Some("g1")).await.unwrap();
        assert_eq!(ingested.segments_indexed, 6);

        // At 150s the walk-off at 180s has not happened yet.
        let envelope = orchestrator
            .answer("Show me the latest homerun", None, "150")
            .await;
        match envelope {
            AnalysisEnvelope::Success {
                result: AnalysisResult::Historical(answer),
                kind,
            } => {
                assert_eq!(kind, QueryType::Historical);
                assert_eq!(answer.answer, "times: 120");
                assert_eq!(answer.citations, vec!["segment_4.txt"]);
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reingest_is_refused() {
        let dir = game_dir();
        let orchestrator = orchestrator(Arc::new(FakeEmbedder::new(false)), false);
        orchestrator.ingest_game(dir.path(), None).await.unwrap();

        let err = orchestrator.ingest_game(dir.path(), None).await.unwrap_err();
        assert!(matches!(err, DugoutError::InvalidInput(_)));
        assert_eq!(orchestrator.vector_store().document_count().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_batch_failure_falls_back_per_record() {
        let dir = tempfile::tempdir().unwrap();
        write_segments(
            dir.path(),
            &[("Ball one.", false), ("poison pill", false), ("Homerun!", true)],
        );
        let embedder = Arc::new(FakeEmbedder::new(true));
        let orchestrator = orchestrator(embedder.clone(), false);

        let ingested = orchestrator.ingest_game(dir.path(), Some("g")).await.unwrap();
        assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ingested.segments_indexed, 2);
        assert_eq!(ingested.embedding_failures, vec!["segment_2.txt"]);
    }

    #[tokio::test]
    async fn test_retrieve_never_returns_future_segments() {
        let dir = game_dir();
        let orchestrator = orchestrator(Arc::new(FakeEmbedder::new(false)), false);
        orchestrator.ingest_game(dir.path(), None).await.unwrap();

        let result = orchestrator.retrieve("Show me all the homerun", 100).await.unwrap();
        assert_eq!(result.plan.classification.kind, QueryType::Historical);
        let times: Vec<i64> = result.chunks.iter().map(|c| c.metadata.time).collect();
        assert_eq!(times, vec![60]);
    }

    #[tokio::test]
    async fn test_realtime_and_search_routing() {
        let orchestrator = orchestrator(Arc::new(FakeEmbedder::new(false)), true);

        let envelope = orchestrator
            .answer("What's the score of the game right now?", Some("segment_7.mp4"), "200")
            .await;
        match envelope {
            AnalysisEnvelope::Success {
                result: AnalysisResult::Realtime(answer),
                kind: QueryType::Realtime,
            } => assert_eq!(answer.video, "/srv/dugout/segments/segment_7.mp4"),
            other => panic!("unexpected envelope: {:?}", other),
        }

        let envelope = orchestrator
            .answer("Who is the catcher for the Dodgers?", None, "200")
            .await;
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "search");
        assert_eq!(json["result"]["answer"], "searched: Who is the catcher for the Dodgers?");
    }

    #[tokio::test]
    async fn test_branch_failures_become_error_envelopes() {
        let orchestrator = orchestrator(Arc::new(FakeEmbedder::new(false)), false);

        let envelope = orchestrator.answer("Are they winning", None, "60").await;
        assert!(envelope.is_error());

        let envelope = orchestrator.answer("What happened?", None, "soon").await;
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json["error"].as_str().unwrap().contains("Invalid input"));
        assert!(json.get("type").is_none());
    }

    #[tokio::test]
    async fn test_realtime_video_must_be_a_segment_name() {
        let video = Arc::new(FakeVideo::default());
        let orchestrator = orchestrator_with_video(Arc::new(FakeEmbedder::new(false)), Some(video.clone()));

        for name in ["/etc/passwd", "../config.toml", "segments/../../x.mp4", "..", "a\\b.mp4"] {
            let envelope = orchestrator
                .answer("What's the score of the game right now?", Some(name), "200")
                .await;
            let json = serde_json::to_value(&envelope).unwrap();
            assert!(json["error"].as_str().unwrap().contains("segment file name"), "{}", name);
        }
        assert_eq!(video.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resolve_segment() {
        let dir = Path::new("/srv/segments");
        assert_eq!(
            resolve_segment(dir, "segment_3.mp4").unwrap(),
            PathBuf::from("/srv/segments/segment_3.mp4")
        );
        assert!(resolve_segment(dir, "").is_err());
        assert!(resolve_segment(dir, "/srv/segments/segment_3.mp4").is_err());
    }

    #[tokio::test]
    async fn test_game_scope_keeps_games_apart() {
        let orchestrator = orchestrator(Arc::new(FakeEmbedder::new(false)), false);
        let first = game_dir();
        orchestrator.ingest_game(first.path(), Some("nyy-bos")).await.unwrap();
        let second = tempfile::tempdir().unwrap();
        write_segments(
            second.path(),
            &[("Betts homerun to right!", true), ("Ground out to short.", false)],
        );
        orchestrator.ingest_game(second.path(), Some("lad-sd")).await.unwrap();

        let result = orchestrator
            .for_game("lad-sd")
            .retrieve("Show me all the homerun", 150)
            .await
            .unwrap();
        let times: Vec<i64> = result.chunks.iter().map(|c| c.metadata.time).collect();
        assert_eq!(times, vec![30]);

        let result = orchestrator
            .for_game("nyy-bos")
            .retrieve("Show me all the homerun", 150)
            .await
            .unwrap();
        let mut times: Vec<i64> = result.chunks.iter().map(|c| c.metadata.time).collect();
        times.sort();
        assert_eq!(times, vec![60, 120]);
    }

    #[test]
    fn test_plan_uses_raw_query_for_time() {
        let orchestrator = orchestrator(Arc::new(FakeEmbedder::new(false)), false);
        let plan = tokio_test::block_on(orchestrator.plan("what happened in the last 30 seconds", 50))
            .unwrap();
        assert_eq!(plan.filter.to_string(), "time GT 20");
        assert!(plan.rewritten.is_wildcard());
    }
}
