//! HTTP endpoint handlers. These are thin wrappers that forward to the core modules.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{rejection::JsonRejection, Query, State},
  http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument, Instrument};

use super::error::ApiError;
use crate::domain::{is_valid_rating, Difficulty, GenerationRequest, QuestionData, Topic};
use crate::protocol::*;
use crate::state::AppState;

fn topic_param(q: &Option<String>) -> Result<Topic, ApiError> {
  let raw = required(q).ok_or_else(|| ApiError::BadRequest("Missing required query param: topic".into()))?;
  Ok(raw.parse()?)
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, generation_enabled: state.batch.is_some() })
}

#[instrument(level = "info")]
pub async fn http_get_topics() -> impl IntoResponse {
  Json(Topic::ALL.into_iter().map(TopicOut::from).collect::<Vec<_>>())
}

#[instrument(level = "info")]
pub async fn http_get_difficulties() -> impl IntoResponse {
  Json(Difficulty::ALL.into_iter().map(Difficulty::name).collect::<Vec<_>>())
}

#[instrument(level = "info", skip(state, payload))]
pub async fn http_post_generate(
  State(state): State<Arc<AppState>>,
  payload: Result<Json<GenerateIn>, JsonRejection>,
) -> Result<Json<QuestionsOut>, ApiError> {
  let Json(body) = payload?;
  let request = GenerationRequest {
    topic: body.topic.parse()?,
    difficulty: body.difficulty.parse()?,
    count: body.count,
  };
  let batch = state
    .batch
    .clone()
    .ok_or_else(|| ApiError::Unavailable("Question generation is disabled (GEMINI_API_KEY is not set).".into()))?;
  let busy = state
    .try_begin_generation()
    .ok_or_else(|| ApiError::Conflict("Questions are already being generated. Please wait.".into()))?;

  // Runs detached: a client disconnect neither cancels the batch nor skips the save.
  let task_state = Arc::clone(&state);
  let questions = tokio::spawn(
    async move {
      let _busy = busy;
      let questions = batch.run(request).await?;
      let saved = questions.clone();
      tokio::task::spawn_blocking(move || task_state.repository.save_topic(request.topic, &saved))
        .await
        .map_err(|e| ApiError::Internal(format!("saving generated questions failed: {e}")))?;
      Ok::<_, ApiError>(questions)
    }
    .in_current_span(),
  )
  .await
  .map_err(|e| ApiError::Internal(format!("generation task failed: {e}")))??;

  info!(target: "generation", topic = %request.topic, difficulty = %request.difficulty, count = questions.len(), "HTTP generate served");
  Ok(Json(QuestionsOut { topic: request.topic, questions }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_questions(
  State(state): State<Arc<AppState>>,
  Query(q): Query<TopicQuery>,
) -> Result<Json<QuestionsOut>, ApiError> {
  let topic = topic_param(&q.topic)?;
  let questions = state.repository.load_topic(topic);
  info!(target: "nvr_backend", %topic, count = questions.len(), "HTTP saved questions served");
  Ok(Json(QuestionsOut { topic, questions }))
}

#[instrument(level = "info", skip(state, payload))]
pub async fn http_post_question_review(
  State(state): State<Arc<AppState>>,
  payload: Result<Json<QuestionReviewIn>, JsonRejection>,
) -> Result<Json<QuestionData>, ApiError> {
  let Json(body) = payload?;
  let topic: Topic = body.topic.parse()?;
  if !is_valid_rating(body.rating) {
    return Err(ApiError::BadRequest("rating must be between 1 and 5".into()));
  }
  let comment = body.comment.unwrap_or_default();
  let updated = state
    .repository
    .update_review(topic, body.index, body.rating, &comment)
    .ok_or_else(|| ApiError::NotFound(format!("No saved question {} for {}", body.index, topic)))?;
  info!(target: "reviews", %topic, index = body.index, rating = ?body.rating, "Saved question reviewed");
  Ok(Json(updated))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_export(
  State(state): State<Arc<AppState>>,
  Query(q): Query<TopicQuery>,
) -> Result<impl IntoResponse, ApiError> {
  let topic = topic_param(&q.topic)?;
  let file = state.repository.export_topic(topic)?;
  info!(target: "nvr_backend", %topic, file = %file.file_name, bytes = file.contents.len(), "HTTP export served");
  let headers = [
    (CONTENT_TYPE, "application/json".to_string()),
    (CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file.file_name)),
  ];
  Ok((headers, file.contents))
}

#[instrument(level = "info", skip(state, body), fields(body_len = body.len()))]
pub async fn http_post_import(
  State(state): State<Arc<AppState>>,
  Query(q): Query<TopicQuery>,
  body: String,
) -> Result<Json<QuestionsOut>, ApiError> {
  let topic = topic_param(&q.topic)?;
  let questions = state.repository.import_topic(topic, &body)?;
  Ok(Json(QuestionsOut { topic, questions }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_bank(
  State(state): State<Arc<AppState>>,
  Query(q): Query<BankQuery>,
) -> Result<Json<QuestionsOut>, ApiError> {
  let topic = topic_param(&q.topic)?;
  let difficulty: Difficulty = match required(&q.difficulty) {
    Some(d) => d.parse()?,
    None => Difficulty::default(),
  };
  let questions = state.bank.load(topic, difficulty).await?;
  info!(target: "nvr_backend", %topic, %difficulty, count = questions.len(), "HTTP bank questions served");
  Ok(Json(QuestionsOut { topic, questions }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_bank_counts(
  State(state): State<Arc<AppState>>,
  Query(q): Query<TopicQuery>,
) -> Result<Json<BankCountsOut>, ApiError> {
  let topic = topic_param(&q.topic)?;
  let mut counts = std::collections::BTreeMap::new();
  for difficulty in Difficulty::ALL {
    counts.insert(difficulty.name(), state.bank.count(topic, difficulty).await);
  }
  Ok(Json(BankCountsOut { topic, counts }))
}
