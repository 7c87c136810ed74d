use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;

const GENERATE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const UPLOAD_BASE_URL: &str = "https://generativelanguage.googleapis.com/upload/v1beta";
const FILES_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/files";

/// Downloaded media is always re-encoded mp4.
const MEDIA_MIME_TYPE: &str = "video/mp4";

/// One user-turn content part handed to the generator.
#[derive(Debug, Clone)]
pub enum ContentPart {
    Text(String),
    Media(RemoteMediaHandle),
}

/// Continuation of a started resumable upload, consumed exactly once by
/// `send_bytes`.
#[derive(Debug)]
pub struct UploadSession {
    pub continuation_url: String,
}

/// Opaque reference to media uploaded to the generation service and
/// processed asynchronously on its side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMediaHandle {
    pub uri: String,
}

/// Last observed processing state of an uploaded media asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    Processing,
    Active,
    Failed,
}

/// The generative service consumed by the pipeline: one-shot completions plus
/// the two-phase media upload and its state query.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Run a completion with a fixed system instruction and one or more user
    /// parts; returns the primary generated text.
    async fn complete(
        &self,
        system_instruction: &str,
        parts: Vec<ContentPart>,
    ) -> Result<String, GeneratorError>;

    /// Start a resumable upload for a local media file.
    async fn begin_upload(&self, path: &Path) -> Result<UploadSession, GeneratorError>;

    /// Send the file bytes over a started session and finalize the upload.
    async fn send_bytes(
        &self,
        session: UploadSession,
        path: &Path,
    ) -> Result<RemoteMediaHandle, GeneratorError>;

    /// Query the current processing state of uploaded media.
    async fn media_state(&self, handle: &RemoteMediaHandle) -> Result<RemoteState, GeneratorError>;
}

/// The fixed quiz-setter instruction sent with every generation call.
pub fn quiz_system_instruction(question_count: u32) -> String {
    format!(
        r#"You are an experienced exam writer helping people study IT topics.
Analyze the provided material in depth and write {question_count} high-quality multiple-choice questions that verify the learner truly understood it.

[1. Content and quality rules]
- Question text must be clear and concise; avoid ambiguous wording.
- Test universal knowledge: someone who knows the underlying concept should be able to answer without having seen the exact material. Do not write pure recall questions about the material itself.
- Mix question types: definitions, code analysis, situational judgment, trade-off comparisons.
- The correct answer must be one of the 4 provided options.

[2. Format and technical constraints]
- Return ONLY a pure JSON string. No Markdown code fences, no preamble, no closing remarks.
- Every question has exactly 4 options.

[3. Code snippet rules]
- Only include `codeSnippet` when the question needs code; otherwise use an empty string ("").
- Keep snippets to the minimum code needed to answer.
- If the answer is a specific part of the code (a method name, a keyword), never show that part in the snippet. Replace it with '_____' (five underscores) to make a fill-in-the-blank question.
- Example: if the answer is `filter`, write `._____(...)`, not `.filter(...)`.

[4. JSON structure example]
{{
  "title": "Topic title",
  "questions": [
    {{
      "id": 1,
      "question": "Which intermediate operation belongs in the blank in this stream pipeline?",
      "options": ["map", "filter", "sorted", "limit"],
      "answer": "filter",
      "explanation": "filter keeps only the elements matching the predicate.",
      "codeSnippet": "list.stream()._____(x -> x > 10).collect(Collectors.toList());"
    }}
  ]
}}"#
    )
}

// ── Wire types (Gemini REST shapes, camelCase) ──────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Instruction,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Instruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            file_data: None,
        }
    }
}

impl From<ContentPart> for Part {
    fn from(part: ContentPart) -> Self {
        match part {
            ContentPart::Text(text) => Part::text(text),
            ContentPart::Media(handle) => Part {
                text: None,
                file_data: Some(FileData {
                    mime_type: MEDIA_MIME_TYPE.to_string(),
                    file_uri: handle.uri,
                }),
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f64,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<TextPart>,
}

#[derive(Deserialize)]
struct TextPart {
    text: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Deserialize)]
struct UploadedFile {
    uri: String,
}

#[derive(Deserialize)]
struct FileStatusResponse {
    state: Option<String>,
}

fn state_from_wire(state: Option<&str>) -> RemoteState {
    // Anything the service reports besides the two terminal states counts
    // as still processing.
    match state {
        Some("ACTIVE") => RemoteState::Active,
        Some("FAILED") => RemoteState::Failed,
        _ => RemoteState::Processing,
    }
}

/// Client for the Gemini generateContent and Files APIs.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            model,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GeneratorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GeneratorError::Api { status, body })
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn complete(
        &self,
        system_instruction: &str,
        parts: Vec<ContentPart>,
    ) -> Result<String, GeneratorError> {
        let request = GenerateRequest {
            system_instruction: Instruction {
                parts: vec![Part::text(system_instruction)],
            },
            contents: vec![Content {
                role: "user",
                parts: parts.into_iter().map(Part::from).collect(),
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 0.85,
            },
        };

        let url = format!(
            "{}/{}:generateContent?key={}",
            GENERATE_BASE_URL,
            self.model.trim(),
            self.api_key.trim()
        );

        let response = self.http.post(&url).json(&request).send().await?;
        let response = Self::check_status(response).await?;
        let completion: GenerateResponse = response.json().await?;

        completion
            .candidates
            .into_iter()
            .flatten()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or(GeneratorError::NoCandidate)
    }

    async fn begin_upload(&self, path: &Path) -> Result<UploadSession, GeneratorError> {
        let num_bytes = tokio::fs::metadata(path).await?.len();
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media.mp4".to_string());
        let metadata = serde_json::json!({ "file": { "display_name": display_name } });

        let url = format!("{}/files?key={}", UPLOAD_BASE_URL, self.api_key.trim());
        let response = self
            .http
            .post(&url)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", num_bytes.to_string())
            .header("X-Goog-Upload-Header-Content-Type", MEDIA_MIME_TYPE)
            .json(&metadata)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        // The continuation URL rides on a response header, not the body.
        let continuation_url = response
            .headers()
            .get("X-Goog-Upload-URL")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(GeneratorError::NoUploadUrl)?;

        Ok(UploadSession { continuation_url })
    }

    async fn send_bytes(
        &self,
        session: UploadSession,
        path: &Path,
    ) -> Result<RemoteMediaHandle, GeneratorError> {
        let bytes = tokio::fs::read(path).await?;

        let response = self
            .http
            .post(&session.continuation_url)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("X-Goog-Upload-Offset", "0")
            .header(reqwest::header::CONTENT_TYPE, MEDIA_MIME_TYPE)
            .body(bytes)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let uploaded: UploadResponse = response.json().await?;
        Ok(RemoteMediaHandle {
            uri: uploaded.file.uri,
        })
    }

    async fn media_state(&self, handle: &RemoteMediaHandle) -> Result<RemoteState, GeneratorError> {
        let file_id = handle.uri.rsplit('/').next().unwrap_or(&handle.uri);
        let url = format!("{}/{}?key={}", FILES_BASE_URL, file_id, self.api_key.trim());

        let response = self.http.get(&url).send().await?;
        let response = Self::check_status(response).await?;
        let status: FileStatusResponse = response.json().await?;

        Ok(state_from_wire(status.state.as_deref()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("request to the generation service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generation service returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("completion contained no usable candidate")]
    NoCandidate,

    #[error("upload session carried no continuation URL")]
    NoUploadUrl,

    #[error("could not read media file: {0}")]
    Io(#[from] std::io::Error),
}
