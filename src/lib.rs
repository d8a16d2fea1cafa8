//! NVR question backend: Gemini-backed generation of non-verbal reasoning
//! questions with retry/backoff and batch fan-out, a local question repository,
//! the published question bank, and a reviewer rating store.

pub mod bank;
pub mod batch;
pub mod config;
pub mod domain;
pub mod gemini;
pub mod generation;
pub mod prompt;
pub mod protocol;
pub mod repository;
pub mod retry;
pub mod reviews;
pub mod routes;
pub mod schema;
pub mod state;
pub mod telemetry;
pub mod util;
