//! `/api/reviews/*`: the reviewer rating store.
//!
//! Bodies are `{error}` on 400/405 and `{error, details}` on 500, matching what
//! the review UI already parses.

use std::sync::Arc;

use axum::{
  extract::{rejection::JsonRejection, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{error, info, instrument};

use crate::domain::is_valid_rating;
use crate::protocol::{
  required, ReviewErrorOut, ReviewItemOut, ReviewItemQuery, ReviewSaveIn, ReviewSaveOut, ReviewsOut, ReviewsQuery,
};
use crate::state::AppState;

fn fail(status: StatusCode, error: &str, details: Option<String>) -> Response {
  (status, Json(ReviewErrorOut { error: error.to_string(), details })).into_response()
}

pub async fn method_not_allowed() -> Response {
  fail(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", None)
}

#[instrument(level = "info", skip(state, payload))]
pub async fn http_post_review(
  State(state): State<Arc<AppState>>,
  payload: Result<Json<ReviewSaveIn>, JsonRejection>,
) -> Response {
  let body = match payload {
    Ok(Json(body)) => body,
    Err(e) => return fail(StatusCode::BAD_REQUEST, &e.body_text(), None),
  };
  let (Some(topic), Some(difficulty), Some(index)) =
    (required(&body.topic), required(&body.difficulty), body.question_index)
  else {
    return fail(StatusCode::BAD_REQUEST, "Missing required fields: topic, difficulty, questionIndex", None);
  };
  if !is_valid_rating(body.rating) {
    return fail(StatusCode::BAD_REQUEST, "rating must be between 1 and 5", None);
  }

  let comment = body.comment.as_deref().unwrap_or("");
  match state.reviews.save(topic, difficulty, index, body.rating, comment).await {
    Ok(key) => Json(ReviewSaveOut { success: true, message: "Review saved successfully".into(), key }).into_response(),
    Err(e) => {
      error!(target: "reviews", %topic, %difficulty, index, error = %e, "Failed to save review");
      fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save review", Some(e.to_string()))
    }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_reviews(State(state): State<Arc<AppState>>, Query(q): Query<ReviewsQuery>) -> Response {
  let (Some(topic), Some(difficulty)) = (required(&q.topic), required(&q.difficulty)) else {
    return fail(StatusCode::BAD_REQUEST, "Missing required query params: topic, difficulty", None);
  };
  match state.reviews.list(topic, difficulty).await {
    Ok(reviews) => {
      info!(target: "reviews", %topic, %difficulty, count = reviews.len(), "HTTP reviews served");
      Json(ReviewsOut { success: true, reviews }).into_response()
    }
    Err(e) => {
      error!(target: "reviews", %topic, %difficulty, error = %e, "Failed to fetch reviews");
      fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch reviews", Some(e.to_string()))
    }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_review(State(state): State<Arc<AppState>>, Query(q): Query<ReviewItemQuery>) -> Response {
  let parsed = (
    required(&q.topic),
    required(&q.difficulty),
    required(&q.question_index).and_then(|i| i.parse::<u32>().ok()),
  );
  let (Some(topic), Some(difficulty), Some(index)) = parsed else {
    return fail(StatusCode::BAD_REQUEST, "Missing required query params: topic, difficulty, questionIndex", None);
  };
  match state.reviews.get(topic, difficulty, index).await {
    Ok(review) => Json(ReviewItemOut { success: true, review }).into_response(),
    Err(e) => {
      error!(target: "reviews", %topic, %difficulty, index, error = %e, "Failed to fetch review");
      fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch review", Some(e.to_string()))
    }
  }
}
