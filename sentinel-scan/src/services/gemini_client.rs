//! Google Gemini analysis client
//!
//! Sends one `generateContent` request per image with a declared response
//! schema, then validates the returned JSON into an [`OrdnanceAnalysis`].

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use sentinel_common::config::{ServiceSettings, DEFAULT_BASE_URL, DEFAULT_MODEL};
use sentinel_common::{OrdnanceAnalysis, ThreatLevel};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::analyzer::{AnalysisError, OrdnanceAnalyzer};
use crate::models::ImageData;

const USER_AGENT: &str = concat!("sentinel-scan/", env!("CARGO_PKG_VERSION"));

/// Task given to the model alongside the image
pub const ANALYSIS_INSTRUCTION: &str = "\
As an expert Explosive Ordnance Disposal (EOD) AI assistant, analyze this image.
Identify if there is an unexploded ordnance (UXO), IED, or military explosive device present.
If found, provide a detailed identification (type or model), threat level, safety protocols, \
and the visible components.

CRITICAL: If the image does NOT contain a bomb or explosive, set isExplosive to false and \
fill the other fields with \"None\".";

/// Gemini client settings
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// None leaves timing entirely to the service
    pub request_timeout: Option<Duration>,
}

impl GeminiConfig {
    /// Defaults for everything except the credential
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
        }
    }
}

impl From<&ServiceSettings> for GeminiConfig {
    fn from(settings: &ServiceSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: settings.base_url.clone(),
            request_timeout: settings.request_timeout,
        }
    }
}

/// Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    http_client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(default)]
    total_token_count: Option<u32>,
}

/// Google API error envelope: `{"error": {"code", "message", "status"}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Output schema the service is asked to honour
pub fn response_schema() -> Value {
    let threat_levels: Vec<&str> = ThreatLevel::ALL.iter().map(ThreatLevel::as_str).collect();

    json!({
        "type": "OBJECT",
        "properties": {
            "isExplosive": { "type": "BOOLEAN" },
            "type": {
                "type": "STRING",
                "description": "Specific model or category (e.g., M67 Grenade, Pipe Bomb, Mortar Shell)"
            },
            "confidence": { "type": "NUMBER", "description": "Probability from 0-1" },
            "threatLevel": { "type": "STRING", "enum": threat_levels },
            "description": { "type": "STRING" },
            "safetyProtocols": { "type": "ARRAY", "items": { "type": "STRING" } },
            "componentsIdentified": { "type": "ARRAY", "items": { "type": "STRING" } },
            "dimensionsEstimated": { "type": "STRING" }
        },
        "required": [
            "isExplosive",
            "type",
            "confidence",
            "threatLevel",
            "description",
            "safetyProtocols"
        ]
    })
}

impl GeminiClient {
    /// Create a new Gemini client
    ///
    /// The credential is injected here; nothing is read from the environment.
    pub fn new(config: GeminiConfig) -> Result<Self, AnalysisError> {
        if config.api_key.trim().is_empty() {
            return Err(AnalysisError::MissingCredential);
        }

        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| AnalysisError::Service(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request(&self, image: &ImageData) -> Result<GenerateContentRequest, AnalysisError> {
        if image.is_empty() {
            return Err(AnalysisError::Encoding("image payload is empty".to_string()));
        }

        Ok(GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: Blob {
                            mime_type: image.media_type().to_string(),
                            data: image.to_base64(),
                        },
                    },
                    Part::Text {
                        text: ANALYSIS_INSTRUCTION.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        })
    }

    /// POST the request once and return the candidate text
    async fn send_request(&self, request: &GenerateContentRequest) -> Result<String, AnalysisError> {
        let url = self.endpoint();
        debug!(url = %url, model = %self.config.model, "Sending analysis request");

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Inference service request failed");
                AnalysisError::Service(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::Service(e.to_string()))?;

        debug!(status = status.as_u16(), "Inference service responded");

        if !status.is_success() {
            error!(status = status.as_u16(), "Inference service returned an error");
            return Err(AnalysisError::Service(service_error_message(status, &body)));
        }

        let envelope: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Malformed inference service envelope");
            AnalysisError::Service(format!("Malformed response from inference service: {}", e))
        })?;

        if let Some(usage) = &envelope.usage_metadata {
            info!(
                prompt_tokens = ?usage.prompt_token_count,
                response_tokens = ?usage.candidates_token_count,
                total_tokens = ?usage.total_token_count,
                "Inference token usage"
            );
        }

        extract_text(envelope)
    }

    /// Validate the candidate text; raw content is never surfaced
    fn parse_analysis(text: &str) -> Result<OrdnanceAnalysis, AnalysisError> {
        OrdnanceAnalysis::from_json(text).map_err(|e| {
            warn!(reason = %e, "Analysis response rejected");
            debug!(body = %text, "Rejected analysis body");
            AnalysisError::Parse
        })
    }
}

fn service_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status))
}

fn extract_text(envelope: GenerateContentResponse) -> Result<String, AnalysisError> {
    if let Some(reason) = envelope.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AnalysisError::Service(format!(
            "Request blocked by inference service: {}",
            reason
        )));
    }

    let candidate = envelope.candidates.into_iter().next().ok_or_else(|| {
        AnalysisError::Service("Inference service returned no candidates".to_string())
    })?;

    if let Some(reason) = &candidate.finish_reason {
        debug!(finish_reason = %reason, "Candidate finished");
    }

    Ok(candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
        .unwrap_or_default())
}

#[async_trait]
impl OrdnanceAnalyzer for GeminiClient {
    async fn analyze(&self, image: &ImageData) -> Result<OrdnanceAnalysis, AnalysisError> {
        info!(
            media_type = image.media_type(),
            size_bytes = image.len(),
            model = %self.config.model,
            "Analyzing image"
        );

        let request = self.build_request(image)?;
        let text = self.send_request(&request).await?;
        let analysis = Self::parse_analysis(&text)?;

        info!(
            is_explosive = analysis.is_explosive,
            threat_level = %analysis.threat_level,
            confidence = analysis.confidence,
            "Analysis completed"
        );

        Ok(analysis)
    }

    fn provider(&self) -> &str {
        "gemini"
    }
}
