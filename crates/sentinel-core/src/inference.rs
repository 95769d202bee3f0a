//! Remote drowsiness classification.
//!
//! [`InferenceClient`] is the seam between the session and the vision model.
//! [`GeminiClient`] implements it against the `generateContent` endpoint,
//! asking for a JSON reply constrained by a response schema.
//!
//! Every failure (transport, HTTP status, empty or malformed reply) is
//! reported as [`SentinelError::InferenceFailed`]. There is no retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::capture::CapturedImage;
use crate::classification::{ClassificationResult, DrowsinessStatus};
use crate::config::Config;
use crate::credential::ApiKey;
use crate::error::{InferenceErrorKind, Result, SentinelError};

/// Instruction sent with every captured frame.
pub const PROMPT: &str = "Analyze this driver's face for drowsiness monitoring. Focus strictly on the eyes. Classify the state as 'Alert', 'Drowsy', or 'Asleep'. Provide a confidence score (0-100) and an estimated eye openness score (0-100, where 100 is fully wide open, 0 is closed).";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Longest error body excerpt kept in failure messages.
const MAX_ERROR_EXCERPT: usize = 300;

// ============================================================================
// InferenceClient
// ============================================================================

/// Classifies a captured frame.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Submits the image with the fixed instruction and returns the result.
    ///
    /// # Errors
    ///
    /// Returns `SentinelError::InferenceFailed` for any failure.
    async fn classify(&self, image: &CapturedImage) -> Result<ClassificationResult>;

    /// Name used in logs.
    fn backend_name(&self) -> &str;
}

// ============================================================================
// Request Types
// ============================================================================

/// Body of a `generateContent` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation turns; always exactly one user turn.
    pub contents: Vec<Content>,
    /// Output constraints.
    pub generation_config: GenerationConfig,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    /// Parts in order: the image, then the instruction.
    pub parts: Vec<Part>,
}

/// A request part: inline image data or text.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    /// Base64 image payload.
    InlineData {
        /// The image.
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
}

/// Inline binary payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type of the payload.
    pub mime_type: String,
    /// Standard base64 of the payload.
    pub data: String,
}

/// Output constraints for the model.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Always `application/json`.
    pub response_mime_type: String,
    /// Schema the reply must satisfy.
    pub response_schema: serde_json::Value,
}

/// Schema of the classification reply.
fn classification_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "status": { "type": "STRING", "enum": DrowsinessStatus::SCHEMA_VALUES },
            "confidence": { "type": "NUMBER" },
            "eyeOpenness": { "type": "NUMBER" }
        },
        "required": ["status", "confidence", "eyeOpenness"]
    })
}

impl GenerateContentRequest {
    /// Builds the classification request for one frame.
    #[must_use]
    pub fn for_image(image: &CapturedImage) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.format.mime_type().to_string(),
                            data: image.to_base64(),
                        },
                    },
                    Part::Text {
                        text: PROMPT.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: classification_schema(),
            },
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Body of a successful `generateContent` reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    /// Generated candidates; only the first is used.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// One generated candidate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    /// Generated content, absent when generation was blocked.
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

/// Content of a candidate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    /// Reply parts.
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

/// One reply part; non-text parts are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidatePart {
    /// Text of the part.
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    #[must_use]
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

/// Parses a raw `generateContent` body into a classification.
///
/// # Errors
///
/// Returns `InferenceFailed` with kind `MalformedReply` if the body is not a
/// `generateContent` response, the reply text is empty, or the reply is not
/// a classification object.
pub fn parse_reply(body: &str) -> Result<ClassificationResult> {
    let response: GenerateContentResponse = serde_json::from_str(body).map_err(|e| {
        SentinelError::inference(
            InferenceErrorKind::MalformedReply,
            format!("unexpected response body: {e}"),
        )
    })?;

    let text = response.text();
    if text.trim().is_empty() {
        return Err(SentinelError::inference(
            InferenceErrorKind::MalformedReply,
            "model returned an empty reply",
        ));
    }

    ClassificationResult::from_reply(&text).map_err(|e| {
        SentinelError::inference(
            InferenceErrorKind::MalformedReply,
            format!("reply is not a classification: {e}"),
        )
    })
}

/// Builds the failure message for a non-2xx response.
fn describe_http_failure(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(MAX_ERROR_EXCERPT).collect());

    format!("API error ({status}): {detail}")
}

// ============================================================================
// GeminiClient
// ============================================================================

/// Inference client for the Gemini `generateContent` API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: ApiKey,
}

impl GeminiClient {
    /// Creates a client for the configured model and endpoint.
    ///
    /// # Errors
    ///
    /// Returns `InferenceFailed` if the HTTP client cannot be built.
    pub fn new(config: &Config, api_key: ApiKey) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("sentinel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                SentinelError::inference(
                    InferenceErrorKind::Other,
                    format!("failed to build HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            http_client,
            endpoint: config.generate_content_url(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Full URL requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn classify(&self, image: &CapturedImage) -> Result<ClassificationResult> {
        let request = GenerateContentRequest::for_image(image);

        debug!(
            model = %self.model,
            format = %image.format,
            size_bytes = image.size_bytes(),
            "Sending classification request"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                SentinelError::inference(InferenceErrorKind::Network, format!("request failed: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            SentinelError::inference(
                InferenceErrorKind::Network,
                format!("failed to read response body: {e}"),
            )
        })?;

        if !status.is_success() {
            let kind = InferenceErrorKind::from_status(status.as_u16());
            warn!(status = status.as_u16(), kind = %kind, "Inference API returned an error");
            return Err(SentinelError::inference(
                kind,
                describe_http_failure(status.as_u16(), &body),
            ));
        }

        let result = parse_reply(&body)?;

        info!(
            status = %result.status,
            confidence = result.confidence,
            eye_openness = result.eye_openness,
            "Frame classified"
        );

        Ok(result)
    }

    fn backend_name(&self) -> &str {
        "gemini"
    }
}
