//! One validated upstream attempt: prompt -> model -> JSON -> schema gate.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::{GenerationSettings, Prompts};
use crate::domain::{Difficulty, QuestionData, Topic};
use crate::prompt::build_prompt_with;
use crate::schema::{response_schema, validate_question, SchemaError};
use crate::util::trunc_for_log;

/// Upstream statuses worth another attempt: rate-limited and overloaded.
pub const RETRYABLE_STATUSES: [u16; 2] = [429, 503];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
  #[error("{message}")]
  Upstream { status: Option<u16>, message: String },
  #[error("response is not valid JSON: {0}")]
  Parse(String),
  #[error("invalid question structure: {0}")]
  Schema(#[from] SchemaError),
}

impl GenerationError {
  pub fn status(&self) -> Option<u16> {
    match self {
      GenerationError::Upstream { status, .. } => *status,
      _ => None,
    }
  }

  /// Only an explicit allow-list of statuses is retried; everything else fails fast.
  pub fn is_retryable(&self) -> bool {
    self.status().is_some_and(|s| RETRYABLE_STATUSES.contains(&s))
  }
}

/// Everything the generation capability needs for one call.
#[derive(Debug, Clone)]
pub struct ModelRequest {
  pub model: String,
  pub instruction: String,
  pub response_schema: Value,
  pub temperature: f32,
}

/// The external generative model: instruction in, raw text out.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
  async fn generate(&self, request: &ModelRequest) -> Result<String, GenerationError>;
}

/// A single attempt at producing one validated question.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
  async fn request_one(&self, topic: Topic, difficulty: Difficulty) -> Result<QuestionData, GenerationError>;
}

#[derive(Clone)]
pub struct GenerationClient {
  model: Arc<dyn GenerativeModel>,
  prompts: Prompts,
  model_id: String,
  temperature: f32,
}

impl GenerationClient {
  pub fn new(model: Arc<dyn GenerativeModel>, prompts: Prompts, settings: &GenerationSettings) -> Self {
    Self {
      model,
      prompts,
      model_id: settings.model.clone(),
      temperature: settings.temperature,
    }
  }
}

#[async_trait]
impl QuestionGenerator for GenerationClient {
  #[instrument(level = "info", skip(self), fields(%topic, %difficulty, model = %self.model_id))]
  async fn request_one(&self, topic: Topic, difficulty: Difficulty) -> Result<QuestionData, GenerationError> {
    let request = ModelRequest {
      model: self.model_id.clone(),
      instruction: build_prompt_with(&self.prompts, topic, difficulty),
      response_schema: response_schema(),
      temperature: self.temperature,
    };

    let raw = self.model.generate(&request).await?;
    let parsed: Value = serde_json::from_str(raw.trim()).map_err(|e| {
      warn!(target: "generation", error = %e, preview = %trunc_for_log(&raw, 200), "Model output is not JSON");
      GenerationError::Parse(e.to_string())
    })?;

    let question = validate_question(&parsed).map_err(|e| {
      warn!(target: "generation", error = %e, "Model output failed schema validation");
      GenerationError::from(e)
    })?;

    info!(
      target: "generation",
      answer = %question.answer_label,
      prompt_preview = %question.prompt.chars().take(40).collect::<String>(),
      "Question accepted"
    );
    Ok(question)
  }
}
