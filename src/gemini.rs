//! Minimal Gemini client for structured question generation.
//!
//! We only call `models/{model}:generateContent` and always ask for a JSON payload
//! constrained by a response schema. Calls are instrumented and log model names,
//! latencies and response sizes (not contents).
//!
//! NOTE: the API key travels in a header and is never logged.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::generation::{GenerationError, GenerativeModel, ModelRequest};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
}

impl Gemini {
  /// Construct the client if we find GEMINI_API_KEY; otherwise return None.
  /// A client build failure is logged and also yields None.
  pub fn from_env(timeout: Duration) -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    match Self::new(api_key, base_url, timeout) {
      Ok(client) => Some(client),
      Err(e) => {
        error!(target: "nvr_backend", error = %e, "GEMINI_API_KEY is set but the HTTP client could not be built");
        None
      }
    }
  }

  pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let base_url = base_url.trim_end_matches('/').to_string();
    Ok(Self { client, api_key, base_url })
  }

  fn endpoint(&self, model: &str) -> String {
    format!("{}/models/{}:generateContent", self.base_url, model)
  }
}

#[async_trait]
impl GenerativeModel for Gemini {
  #[instrument(level = "info", skip(self, request), fields(model = %request.model, prompt_len = request.instruction.len()))]
  async fn generate(&self, request: &ModelRequest) -> Result<String, GenerationError> {
    let body = GenerateContentRequest {
      contents: vec![Content {
        role: "user".into(),
        parts: vec![Part { text: request.instruction.clone() }],
      }],
      generation_config: GenerationConfig {
        response_mime_type: "application/json".into(),
        response_schema: request.response_schema.clone(),
        temperature: request.temperature,
      },
    };

    let start = Instant::now();
    let res = self
      .client
      .post(self.endpoint(&request.model))
      .header(USER_AGENT, "nvr-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| {
        error!(elapsed = ?start.elapsed(), error = %e, "Gemini request failed before a response");
        GenerationError::Upstream { status: e.status().map(|s| s.as_u16()), message: e.to_string() }
      })?;

    let status = res.status();
    if !status.is_success() {
      let text = res.text().await.unwrap_or_default();
      let message = extract_gemini_error(&text).unwrap_or(text);
      error!(elapsed = ?start.elapsed(), status = status.as_u16(), "Gemini returned an error status");
      return Err(GenerationError::Upstream { status: Some(status.as_u16()), message });
    }

    let body: GenerateContentResponse = res.json().await.map_err(|e| GenerationError::Upstream {
      status: None,
      message: format!("unreadable response body: {e}"),
    })?;
    if let Some(usage) = &body.usage_metadata {
      info!(
        prompt_tokens = ?usage.prompt_token_count,
        completion_tokens = ?usage.candidates_token_count,
        total_tokens = ?usage.total_token_count,
        "Gemini usage"
      );
    }

    let text = body.text();
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Gemini response received");
    Ok(text)
  }
}

// --- Wire DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
  #[serde(default)]
  role: String,
  #[serde(default)]
  parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
  #[serde(default)]
  text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  response_mime_type: String,
  response_schema: serde_json::Value,
  temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  #[serde(default)]
  usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
  /// Text of the first candidate, parts concatenated.
  fn text(&self) -> String {
    self
      .candidates
      .first()
      .and_then(|c| c.content.as_ref())
      .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect::<String>())
      .unwrap_or_default()
      .trim()
      .to_string()
  }
}

#[derive(Deserialize)]
struct Candidate {
  #[serde(default)]
  content: Option<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)]
  prompt_token_count: Option<u32>,
  #[serde(default)]
  candidates_token_count: Option<u32>,
  #[serde(default)]
  total_token_count: Option<u32>,
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
