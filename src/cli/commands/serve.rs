//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for question routing, historical retrieval,
//! replay insights, segment analysis and ingestion of segment analyses.

use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::context::ContextStore;
use crate::error::DugoutError;
use crate::insight::{GameSnapshot, InsightGenerator, OpenAIInsightModel};
use crate::orchestrator::Orchestrator;
use crate::query::time_expr::parse_clock;
use crate::video::SegmentAnalyzer;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
    insights: InsightGenerator,
    settings: Settings,
}

impl AppState {
    /// The orchestrator scoped to the requested game, or the default game.
    fn orchestrator_for(&self, game_id: Option<&str>) -> Orchestrator {
        let game_id = game_id
            .filter(|g| !g.trim().is_empty())
            .unwrap_or(self.settings.ingest.default_game_id.as_str());
        self.orchestrator.for_game(game_id)
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(settings.clone())?;

    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;
    let insights = InsightGenerator::new(
        Arc::new(OpenAIInsightModel::new(&settings.insight, &prompts)?),
        prompts,
        orchestrator.context().clone(),
    );

    let state = Arc::new(AppState {
        orchestrator,
        insights,
        settings,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/retrieve", post(retrieve))
        .route("/insights", post(generate_insights))
        .route("/analyze-segments", post(analyze_segments))
        .route("/ingest-data", post(ingest_data))
        .route("/games", get(list_games))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Dugout API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Analyze", "POST /analyze");
    Output::kv("Retrieve", "POST /retrieve");
    Output::kv("Insights", "POST /insights");
    Output::kv("Analyze Segments", "POST /analyze-segments");
    Output::kv("Ingest", "POST /ingest-data");
    Output::kv("List Games", "GET  /games");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

/// Game clock as sent by clients: plain seconds or any clock string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CurrentTime {
    Seconds(i64),
    Text(String),
}

impl CurrentTime {
    fn as_clock(&self) -> String {
        match self {
            CurrentTime::Seconds(s) => s.to_string(),
            CurrentTime::Text(t) => t.clone(),
        }
    }
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    query: String,
    /// Segment file name inside the configured segment directory.
    #[serde(default)]
    video: Option<String>,
    current_time: CurrentTime,
    #[serde(default)]
    game_id: Option<String>,
}

#[derive(Deserialize)]
struct RetrieveRequest {
    query: String,
    current_time: CurrentTime,
    #[serde(default)]
    game_id: Option<String>,
}

/// The replay position comes from `index`, or from the index linked to `segment`.
#[derive(Deserialize)]
struct InsightRequest {
    #[serde(default)]
    index: Option<u64>,
    #[serde(default, alias = "segmentName")]
    segment: Option<String>,
    snapshot: GameSnapshot,
}

/// Directories relative to the segment directory and the data directory.
#[derive(Deserialize, Default)]
struct AnalyzeSegmentsRequest {
    #[serde(default)]
    video_dir: Option<String>,
    #[serde(default)]
    output_dir: Option<String>,
}

#[derive(Deserialize, Default)]
struct IngestRequest {
    #[serde(default)]
    directory: Option<String>,
    #[serde(default)]
    game_id: Option<String>,
}

#[derive(Serialize)]
struct GamesResponse {
    games: Vec<crate::vector_store::IndexedGame>,
    total: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_status(error: &DugoutError) -> StatusCode {
    match error {
        DugoutError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        DugoutError::NoSegments(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: DugoutError) -> axum::response::Response {
    (
        error_status(&error),
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    let envelope = state
        .orchestrator_for(req.game_id.as_deref())
        .answer(&req.query, req.video.as_deref(), &req.current_time.as_clock())
        .await;

    let status = if envelope.is_error() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(envelope)).into_response()
}

async fn retrieve(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RetrieveRequest>,
) -> impl IntoResponse {
    let current_time = match parse_clock(&req.current_time.as_clock()) {
        Ok(seconds) => seconds,
        Err(e) => return error_response(e),
    };

    match state
        .orchestrator_for(req.game_id.as_deref())
        .retrieve(&req.query, current_time)
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(e),
    }
}

async fn generate_insights(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InsightRequest>,
) -> impl IntoResponse {
    let index = match insight_index(&req, state.orchestrator.context()).await {
        Ok(index) => index,
        Err(e) => return error_response(e),
    };

    match state.insights.generate(index, &req.snapshot).await {
        Ok(insights) => Json(insights).into_response(),
        Err(e) => error_response(e),
    }
}

async fn analyze_segments(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> impl IntoResponse {
    let req: AnalyzeSegmentsRequest = match parse_optional_body(&body) {
        Ok(req) => req,
        Err(e) => return error_response(e),
    };
    let Some(analyzer) = state.orchestrator.video_analyzer() else {
        return error_response(DugoutError::VideoProcessing(
            "video analysis is not configured".to_string(),
        ));
    };
    let dirs = resolve_within(&state.settings.segment_dir(), req.video_dir.as_deref()).and_then(
        |video_dir| {
            resolve_within(&state.settings.data_dir(), req.output_dir.as_deref())
                .map(|out_dir| (video_dir, out_dir))
        },
    );
    let (video_dir, out_dir) = match dirs {
        Ok(dirs) => dirs,
        Err(e) => return error_response(e),
    };

    let video = &state.settings.video;
    let report = SegmentAnalyzer::new(analyzer)
        .with_concurrency(video.max_concurrent)
        .with_max_passes(video.max_passes)
        .process_segments(&video_dir, &out_dir)
        .await;
    match report {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e),
    }
}

async fn ingest_data(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> impl IntoResponse {
    let req: IngestRequest = match parse_optional_body(&body) {
        Ok(req) => req,
        Err(e) => return error_response(e),
    };
    let dir = match &req.directory {
        Some(dir) => Settings::expand_path(dir),
        None => default_event_dir(&state.settings),
    };

    match state
        .orchestrator
        .ingest_game(&dir, req.game_id.as_deref())
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_games(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.orchestrator.list_games().await {
        Ok(games) => Json(GamesResponse {
            total: games.len(),
            games,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// An empty body means "use every default".
fn parse_optional_body<T: serde::de::DeserializeOwned + Default>(body: &[u8]) -> Result<T, DugoutError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| DugoutError::InvalidInput(format!("Invalid request body: {}", e)))
}

async fn insight_index(req: &InsightRequest, context: &ContextStore) -> Result<u64, DugoutError> {
    if let Some(index) = req.index {
        return Ok(index);
    }
    let segment = req
        .segment
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| DugoutError::InvalidInput("index or segment is required".to_string()))?;
    context
        .index_for_segment(segment)
        .await?
        .ok_or_else(|| DugoutError::InvalidInput(format!("No replay index is linked to {}", segment)))
}

/// `base` joined with a client-supplied relative directory that stays inside it.
fn resolve_within(base: &Path, relative: Option<&str>) -> Result<PathBuf, DugoutError> {
    let Some(relative) = relative.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(base.to_path_buf());
    };
    let path = Path::new(relative);
    if !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(DugoutError::InvalidInput(format!(
            "directory must be relative to {}, got '{}'",
            base.display(),
            relative
        )));
    }
    Ok(base.join(path))
}

fn default_event_dir(settings: &Settings) -> PathBuf {
    settings.data_dir().join("event")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status() {
        assert_eq!(
            error_status(&DugoutError::InvalidInput("empty query".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(&DugoutError::NoSegments("/tmp/none".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_status(&DugoutError::Retrieval("store down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_current_time_accepts_number_or_string() {
        let req: AnalyzeRequest =
            serde_json::from_str(r#"{"query": "latest homerun", "current_time": 150}"#).unwrap();
        assert_eq!(req.current_time.as_clock(), "150");
        assert!(req.video.is_none());

        let req: AnalyzeRequest = serde_json::from_str(
            r#"{"query": "who is batting", "video": "segment_5.mp4", "current_time": "2:30"}"#,
        )
        .unwrap();
        assert_eq!(req.current_time.as_clock(), "2:30");
        assert_eq!(req.video.as_deref(), Some("segment_5.mp4"));
    }

    #[test]
    fn test_parse_ingest_request() {
        let req: IngestRequest = parse_optional_body(b"").unwrap();
        assert!(req.directory.is_none() && req.game_id.is_none());

        let req: IngestRequest = parse_optional_body(br#"{"game_id": "nyy-bos"}"#).unwrap();
        assert_eq!(req.game_id.as_deref(), Some("nyy-bos"));

        let err = parse_optional_body::<IngestRequest>(b"{not json").err().unwrap();
        assert_eq!(error_status(&err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_requests_carry_game_id() {
        let req: RetrieveRequest = serde_json::from_str(
            r#"{"query": "latest homerun", "current_time": 150, "game_id": "lad-sd"}"#,
        )
        .unwrap();
        assert_eq!(req.game_id.as_deref(), Some("lad-sd"));

        let req: AnalyzeRequest =
            serde_json::from_str(r#"{"query": "who is batting", "current_time": "2:30"}"#).unwrap();
        assert!(req.game_id.is_none());
    }

    #[tokio::test]
    async fn test_insight_index_from_segment_link() {
        let context = ContextStore::in_memory();
        context.link_segment("segment_4.mp4", 12).await.unwrap();

        let req: InsightRequest =
            serde_json::from_str(r#"{"segmentName": "segment_4.mp4", "snapshot": {"inning": 3}}"#)
                .unwrap();
        assert_eq!(insight_index(&req, &context).await.unwrap(), 12);

        let req: InsightRequest =
            serde_json::from_str(r#"{"index": 5, "segment": "segment_4.mp4", "snapshot": {}}"#).unwrap();
        assert_eq!(insight_index(&req, &context).await.unwrap(), 5);

        let req: InsightRequest =
            serde_json::from_str(r#"{"segment": "segment_9.mp4", "snapshot": {}}"#).unwrap();
        let err = insight_index(&req, &context).await.unwrap_err();
        assert_eq!(error_status(&err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_resolve_within_stays_inside_base() {
        let base = Path::new("/srv/dugout/segments");
        assert_eq!(
            resolve_within(base, None).unwrap(),
            PathBuf::from("/srv/dugout/segments")
        );
        assert_eq!(
            resolve_within(base, Some("game_1")).unwrap(),
            PathBuf::from("/srv/dugout/segments/game_1")
        );
        assert!(resolve_within(base, Some("/etc")).is_err());
        assert!(resolve_within(base, Some("game_1/../../..")).is_err());
    }

    #[test]
    fn test_ingest_defaults_to_event_dir() {
        let mut settings = Settings::default();
        settings.general.data_dir = "/var/lib/dugout".to_string();
        assert_eq!(
            default_event_dir(&settings),
            PathBuf::from("/var/lib/dugout/event")
        );
    }
}
