//! Remote vision API client
//!
//! Speaks the `images:annotate` contract: base64 image content posted with
//! TEXT_DETECTION and DOCUMENT_TEXT_DETECTION features, a response carrying
//! either a full-text annotation or a list of per-region annotations. The
//! orchestrator treats every error here as a normal, retryable outcome.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default annotate endpoint. The API key is always injected configuration,
/// never a constant.
pub const DEFAULT_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Confidence assigned to full-text annotations. Placeholder constant, not a
/// calibrated statistic.
const CONFIDENCE_FULL_TEXT: f32 = 0.9;
/// Confidence assigned to annotation-list text when the API reports no
/// per-region confidences. Placeholder, see [`CONFIDENCE_FULL_TEXT`].
const CONFIDENCE_ANNOTATIONS: f32 = 0.8;

/// Failure modes of a remote OCR call.
///
/// All of these are expected, recoverable outcomes: the orchestrator
/// retries with the next preprocessing variant and eventually falls back to
/// the local pipeline. None of them is fatal to the OCR operation.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP transport error: {0}")]
    Http(reqwest::Error),
    #[error("remote API returned status {0}")]
    Status(u16),
    #[error("remote call timed out")]
    Timeout,
    #[error("remote API returned no text")]
    Empty,
    #[error("malformed remote response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

/// Text recovered by the remote API, with its confidence estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteText {
    pub text: String,
    pub confidence: f32,
}

/// Configuration for the vision client.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// Annotate endpoint URL.
    pub endpoint: String,
    /// API key, environment-provided (e.g. `VISION_API_KEY`).
    pub api_key: String,
    /// Transport-level timeout for one call.
    pub timeout: Duration,
    /// Language hints sent with every request.
    pub language_hints: Vec<String>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(20),
            language_hints: vec!["ko".to_string(), "en".to_string()],
        }
    }
}

impl VisionConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }
}

/// Seam between the orchestrator and the remote service, so tests can
/// inject scripted responses without a network.
#[async_trait]
pub trait RemoteOcr: Send + Sync {
    /// Recognize text in an encoded (JPEG/PNG) image.
    async fn recognize(
        &self,
        image: &[u8],
        language_hints: &[String],
    ) -> Result<RemoteText, RemoteError>;
}

/// HTTP client for the vision annotate API.
pub struct VisionClient {
    config: VisionConfig,
    client: reqwest::Client,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl RemoteOcr for VisionClient {
    async fn recognize(
        &self,
        image: &[u8],
        language_hints: &[String],
    ) -> Result<RemoteText, RemoteError> {
        let request = AnnotateRequest {
            requests: vec![AnnotateEntry {
                image: ImagePayload {
                    content: general_purpose::STANDARD.encode(image),
                },
                features: vec![
                    Feature {
                        kind: "TEXT_DETECTION",
                    },
                    Feature {
                        kind: "DOCUMENT_TEXT_DETECTION",
                    },
                ],
                image_context: ImageContext {
                    language_hints: language_hints.to_vec(),
                },
            }],
        };

        let url = format!("{}?key={}", self.config.endpoint, self.config.api_key);
        tracing::debug!(bytes = image.len(), "posting annotate request");
        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|err| RemoteError::Malformed(err.to_string()))?;
        let annotation = parsed
            .responses
            .into_iter()
            .next()
            .ok_or(RemoteError::Empty)?;
        extract_text(&annotation)
    }
}

/// Pull text out of one annotation set, preferring the full-text annotation
/// over the per-region list when both are present.
fn extract_text(set: &AnnotationSet) -> Result<RemoteText, RemoteError> {
    if let Some(status) = &set.error {
        return Err(RemoteError::Malformed(format!(
            "API error {}: {}",
            status.code, status.message
        )));
    }

    if let Some(full) = &set.full_text_annotation {
        if !full.text.trim().is_empty() {
            return Ok(RemoteText {
                text: full.text.clone(),
                confidence: CONFIDENCE_FULL_TEXT,
            });
        }
    }

    // The first annotation, when present, aggregates the whole region.
    if let Some(first) = set.text_annotations.first() {
        if !first.description.trim().is_empty() {
            let confidences: Vec<f32> = set
                .text_annotations
                .iter()
                .filter_map(|a| a.confidence)
                .collect();
            let confidence = if confidences.is_empty() {
                CONFIDENCE_ANNOTATIONS
            } else {
                confidences.iter().sum::<f32>() / confidences.len() as f32
            };
            return Ok(RemoteText {
                text: first.description.clone(),
                confidence,
            });
        }
    }

    Err(RemoteError::Empty)
}

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateEntry {
    image: ImagePayload,
    features: Vec<Feature>,
    image_context: ImageContext,
}

#[derive(Debug, Serialize)]
struct ImagePayload {
    content: String,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageContext {
    language_hints: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnnotateResponse {
    responses: Vec<AnnotationSet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AnnotationSet {
    full_text_annotation: Option<FullTextAnnotation>,
    text_annotations: Vec<TextAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct FullTextAnnotation {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TextAnnotation {
    description: String,
    confidence: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiStatus {
    code: i32,
    message: String,
}
