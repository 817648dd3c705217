//! Gemini `generateContent` REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Generator, ReasoningMode, SYSTEM_INSTRUCTION, ServiceError};
use crate::prompt::{Prompt, Segment};

/// Connection settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// `None` makes every call fail with [`ServiceError::Authentication`].
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Thinking budget used in [`ReasoningMode::Extended`].
    pub thinking_budget: u32,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub const DEFAULT_MODEL: &'static str = "gemini-2.5-flash";
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";
    pub const DEFAULT_THINKING_BUDGET: u32 = 8192;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            model: Self::DEFAULT_MODEL.to_string(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            thinking_budget: Self::DEFAULT_THINKING_BUDGET,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    fn budget(&self, mode: ReasoningMode) -> u32 {
        match mode {
            ReasoningMode::Fast => 0,
            ReasoningMode::Extended => self.thinking_budget,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
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
    /// Set on thought-summary parts, which are not part of the answer.
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl From<Segment> for WirePart {
    fn from(segment: Segment) -> Self {
        match segment {
            Segment::Text(text) => Self {
                text: Some(text),
                inline_data: None,
            },
            Segment::InlineData { mime_type, data } => Self {
                text: None,
                inline_data: Some(InlineData { mime_type, data }),
            },
        }
    }
}

fn request_body(prompt: &Prompt, budget: u32) -> GenerateContentRequest {
    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![WirePart::from(Segment::text(SYSTEM_INSTRUCTION))],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: prompt.segments().into_iter().map(WirePart::from).collect(),
        }],
        generation_config: GenerationConfig {
            thinking_config: ThinkingConfig {
                thinking_budget: budget,
            },
        },
    }
}

fn response_text(response: GenerateContentResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`Generator`] backed by the Gemini REST API.
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl Generator for GeminiClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, prompt: &Prompt, mode: ReasoningMode) -> Result<String, ServiceError> {
        let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            warn!("no API key configured");
            return Err(ServiceError::Authentication);
        };

        let budget = self.config.budget(mode);
        let body = request_body(prompt, budget);
        debug!(
            model = %self.config.model,
            %mode,
            budget,
            parts = body.contents[0].parts.len(),
            "sending generateContent request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "generateContent request failed");
                if e.is_connect() || e.is_timeout() {
                    ServiceError::Unavailable
                } else {
                    ServiceError::Other(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            warn!(status = status.as_u16(), %message, "generateContent returned an error");
            return Err(ServiceError::from_status(status.as_u16(), &message));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "failed to decode generateContent response");
            ServiceError::Other(e.to_string())
        })?;

        let text = response_text(parsed);
        let text = text.trim();
        if text.is_empty() {
            warn!(model = %self.config.model, "model returned no text");
            return Err(ServiceError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}
