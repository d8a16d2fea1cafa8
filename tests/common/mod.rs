#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tokio::sync::Notify;
use tower::ServiceExt;

use nvr_backend::bank::QuestionBank;
use nvr_backend::batch::BatchOrchestrator;
use nvr_backend::domain::{Difficulty, QuestionData, QuestionOption, Topic};
use nvr_backend::generation::{GenerationError, QuestionGenerator};
use nvr_backend::repository::QuestionRepository;
use nvr_backend::retry::{RetryPolicy, RetryingGenerator, Sleeper};
use nvr_backend::reviews::{LocalKv, ReviewStore};
use nvr_backend::routes::build_router;
use nvr_backend::state::AppState;

pub fn question(tag: &str) -> QuestionData {
    QuestionData {
        prompt: format!("Which shape comes next? ({tag})"),
        options: ["A", "B", "C", "D", "E"]
            .iter()
            .map(|l| QuestionOption { label: l.to_string(), diagram: format!("<svg data-q=\"{tag}{l}\"/>") })
            .collect(),
        answer_label: "C".into(),
        explanation: "The shape turns 90 degrees each step.".into(),
        rating: None,
        comment: String::new(),
    }
}

/// Hands out numbered questions, or a fixed upstream failure.
#[derive(Default)]
pub struct FakeGenerator {
    pub calls: AtomicUsize,
    pub fail_status: Option<u16>,
    pub gate: Option<Arc<Notify>>,
}

#[async_trait]
impl QuestionGenerator for FakeGenerator {
    async fn request_one(&self, _: Topic, _: Difficulty) -> Result<QuestionData, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.fail_status {
            Some(status) => Err(GenerationError::Upstream { status: Some(status), message: "Bad request".into() }),
            None => Ok(question(&n.to_string())),
        }
    }
}

pub struct NoSleep;

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _: Duration) {}
}

pub fn state_with(generator: Option<Arc<FakeGenerator>>, bank: QuestionBank) -> Arc<AppState> {
    let batch = generator.map(|g| {
        let retrying = RetryingGenerator::new(g, Arc::new(NoSleep), RetryPolicy::default());
        BatchOrchestrator::new(retrying, 10)
    });
    Arc::new(AppState::new(
        batch,
        QuestionRepository::in_memory(),
        bank,
        ReviewStore::new(Arc::new(LocalKv::in_memory())),
    ))
}

pub fn app(state: Arc<AppState>) -> Router {
    build_router(state)
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).expect("request")
}

pub async fn call(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.expect("router is infallible")
}

pub async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = call(app, req).await;
    let status = resp.status();
    (status, body_json(resp).await)
}
