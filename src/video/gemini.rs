//! Gemini Files API and generateContent over reqwest.

use super::{video_mime_type, wait_until_active, FileState, RealtimeAnswer, VideoAnalyzer};
use crate::config::{Prompts, VideoSettings};
use crate::context::ContextStore;
use crate::error::{DugoutError, Result};
use crate::openai::http_client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// An uploaded file as reported by the Files API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiFile {
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default = "unspecified")]
    pub state: FileState,
}

fn unspecified() -> FileState {
    FileState::StateUnspecified
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: GeminiFile,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let text: String = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text).filter(|t| !t.trim().is_empty())
    }
}

/// Minimal client for the Gemini REST API.
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl GeminiClient {
    /// Build a client from settings and `GOOGLE_API_KEY`.
    pub fn from_settings(settings: &VideoSettings) -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| DugoutError::Config("GOOGLE_API_KEY is not set".to_string()))?;
        Self::new(settings, api_key)
    }

    pub fn new(settings: &VideoSettings, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: http_client(Duration::from_secs(settings.timeout_secs))?,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: api_key.into(),
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            max_polls: settings.max_polls,
        })
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DugoutError::VideoProcessing(format!(
            "{} failed with {}: {}",
            action, status, body
        )))
    }

    /// Upload a video in one request.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn upload_file(&self, path: &Path) -> Result<GeminiFile> {
        let bytes = tokio::fs::read(path).await?;
        let mime = video_mime_type(path);
        debug!(bytes = bytes.len(), mime, "Uploading video");

        let response = self
            .http
            .post(format!("{}/upload/v1beta/files", self.api_base))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "raw")
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(bytes)
            .send()
            .await?;

        let upload: UploadResponse = Self::check(response, "Upload").await?.json().await?;
        info!("Uploaded {} as {}", path.display(), upload.file.name);
        Ok(upload.file)
    }

    pub async fn get_file(&self, name: &str) -> Result<GeminiFile> {
        let response = self
            .http
            .get(format!("{}/v1beta/{}", self.api_base, name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        Ok(Self::check(response, "File lookup").await?.json().await?)
    }

    /// Remove an uploaded file.
    pub async fn delete_file(&self, name: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/v1beta/{}", self.api_base, name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        Self::check(response, "Delete").await?;
        debug!("Deleted uploaded file {}", name);
        Ok(())
    }

    /// Remove an uploaded file, logging instead of failing.
    pub async fn discard_file(&self, name: &str) {
        if let Err(e) = self.delete_file(name).await {
            warn!("Failed to delete uploaded file {}: {}", name, e);
        }
    }

    /// Upload a video and wait until it can be referenced in a prompt.
    ///
    /// The upload is deleted again when it never becomes usable.
    pub async fn upload_and_wait(&self, path: &Path) -> Result<GeminiFile> {
        let uploaded = self.upload_file(path).await?;
        if uploaded.state == FileState::Active {
            return Ok(uploaded);
        }
        let name = uploaded.name.clone();
        match wait_until_active(|| self.get_file(&name), self.poll_interval, self.max_polls).await {
            Ok(file) => Ok(file),
            Err(e) => {
                self.discard_file(&name).await;
                Err(e)
            }
        }
    }

    /// Ask the model about an uploaded file.
    #[instrument(skip(self, system, prompt), fields(file = %file.name))]
    pub async fn generate(&self, system: &str, file: &GeminiFile, prompt: &str) -> Result<String> {
        let body = json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [{
                "role": "user",
                "parts": [
                    { "fileData": { "mimeType": file.mime_type, "fileUri": file.uri } },
                    { "text": prompt }
                ]
            }]
        });

        let response = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.api_base, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let generated: GenerateResponse = Self::check(response, "Generation").await?.json().await?;
        generated
            .text()
            .ok_or_else(|| DugoutError::VideoProcessing("Model returned no text".to_string()))
    }
}

/// [`VideoAnalyzer`] backed by Gemini.
pub struct GeminiVideoAnalyzer {
    client: GeminiClient,
    prompts: Prompts,
    context: Option<ContextStore>,
}

impl GeminiVideoAnalyzer {
    pub fn new(client: GeminiClient, prompts: Prompts) -> Self {
        Self {
            client,
            prompts,
            context: None,
        }
    }

    /// Use past-game summaries from `context` when answering.
    pub fn with_context(mut self, context: ContextStore) -> Self {
        self.context = Some(context);
        self
    }

    async fn past_summary(&self, segment_name: &str) -> Option<String> {
        let context = self.context.as_ref()?;
        match context.summary_for_segment(segment_name).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Could not load game context for {}: {}", segment_name, e);
                None
            }
        }
    }

    fn realtime_system(&self, summary: Option<&str>) -> String {
        match summary {
            Some(summary) => {
                let mut vars = HashMap::new();
                vars.insert("summary".to_string(), summary.to_string());
                let context = self
                    .prompts
                    .render_with_custom(&self.prompts.video.previous_context, &vars);
                format!("{}\n\n{}", self.prompts.video.realtime_system, context)
            }
            None => self.prompts.video.realtime_system.clone(),
        }
    }
}

#[async_trait]
impl VideoAnalyzer for GeminiVideoAnalyzer {
    #[instrument(skip(self), fields(video = %video.display()))]
    async fn analyze(&self, query: &str, video: &Path) -> Result<RealtimeAnswer> {
        let segment_name = video
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| video.display().to_string());

        let summary = self.past_summary(&segment_name).await;
        let system = self.realtime_system(summary.as_deref());

        let file = self.client.upload_and_wait(video).await?;
        let result = self.client.generate(&system, &file, query).await;
        self.client.discard_file(&file.name).await;

        Ok(RealtimeAnswer {
            query: query.to_string(),
            video: segment_name,
            response: result?.trim().to_string(),
        })
    }

    #[instrument(skip(self), fields(video = %video.display()))]
    async fn describe_segment(&self, video: &Path) -> Result<String> {
        let file = self.client.upload_and_wait(video).await?;
        let result = self
            .client
            .generate(
                &self.prompts.video.segment_system,
                &file,
                &self.prompts.render_with_custom(
                    &self.prompts.video.segment_analysis,
                    &HashMap::new(),
                ),
            )
            .await;
        self.client.discard_file(&file.name).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::State,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Files API stand-in whose uploads always fail processing.
    #[derive(Clone)]
    struct FilesApi {
        deletes: Arc<AtomicUsize>,
        delete_status: StatusCode,
    }

    async fn start_files_api(delete_status: StatusCode) -> (GeminiClient, Arc<AtomicUsize>) {
        let deletes = Arc::new(AtomicUsize::new(0));
        let api = FilesApi {
            deletes: deletes.clone(),
            delete_status,
        };

        let app = Router::new()
            .route(
                "/upload/v1beta/files",
                post(|| async {
                    Json(json!({"file": {"name": "files/f1", "state": "PROCESSING"}}))
                }),
            )
            .route(
                "/v1beta/files/{id}",
                get(|| async { Json(json!({"name": "files/f1", "state": "FAILED"})) }).delete(
                    |State(api): State<FilesApi>| async move {
                        api.deletes.fetch_add(1, Ordering::SeqCst);
                        api.delete_status
                    },
                ),
            )
            .with_state(api);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let settings = VideoSettings {
            api_base: format!("http://{}", addr),
            poll_interval_secs: 0,
            max_polls: 2,
            timeout_secs: 5,
            ..VideoSettings::default()
        };
        (GeminiClient::new(&settings, "test-key").unwrap(), deletes)
    }

    #[tokio::test]
    async fn test_failed_upload_is_deleted() {
        let (client, deletes) = start_files_api(StatusCode::OK).await;
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("segment_1.mp4");
        std::fs::write(&video, b"not really a video").unwrap();

        let err = client.upload_and_wait(&video).await.unwrap_err();
        assert!(matches!(err, DugoutError::VideoProcessing(_)));
        assert_eq!(deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delete_checks_status() {
        let (client, deletes) = start_files_api(StatusCode::FORBIDDEN).await;
        let err = client.delete_file("files/f1").await.unwrap_err();
        assert!(err.to_string().contains("403"));
        assert_eq!(deletes.load(Ordering::SeqCst), 1);

        let (client, _) = start_files_api(StatusCode::NO_CONTENT).await;
        assert!(client.delete_file("files/f1").await.is_ok());
    }

    fn analyzer() -> GeminiVideoAnalyzer {
        let client = GeminiClient::new(&VideoSettings::default(), "test-key").unwrap();
        GeminiVideoAnalyzer::new(client, Prompts::default())
    }

    #[test]
    fn test_upload_response_shape() {
        let raw = r#"{"file": {"name": "files/x1", "uri": "https://g/files/x1", "mimeType": "video/mp4", "state": "PROCESSING", "sizeBytes": "123"}}"#;
        let upload: UploadResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(upload.file.name, "files/x1");
        assert_eq!(upload.file.state, FileState::Processing);
    }

    #[test]
    fn test_generate_response_joins_parts() {
        let raw = r#"{"candidates": [{"content": {"parts": [{"text": "Two runs "}, {"text": "scored."}], "role": "model"}}]}"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text().as_deref(), Some("Two runs scored."));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(empty.text(), None);
    }

    #[tokio::test]
    async fn test_realtime_system_includes_summary() {
        let context = ContextStore::in_memory();
        context.link_segment("segment_3.mp4", 9).await.unwrap();
        context.put_summary(9, "Dodgers lead 3-0.").await.unwrap();

        let analyzer = analyzer().with_context(context);
        let summary = analyzer.past_summary("segment_3.mp4").await;
        let system = analyzer.realtime_system(summary.as_deref());
        assert!(system.starts_with("When given a video and a query"));
        assert!(system.contains("Dodgers lead 3-0."));

        assert_eq!(analyzer.past_summary("segment_8.mp4").await, None);
        assert!(!analyzer.realtime_system(None).contains("Previous context"));
    }
}
