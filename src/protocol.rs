//! Public request/response structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{QuestionData, ReviewRecord, Topic};

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub generation_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct TopicOut {
    pub name: &'static str,
    pub description: &'static str,
}

impl From<Topic> for TopicOut {
    fn from(t: Topic) -> Self {
        Self { name: t.name(), description: t.description() }
    }
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

//
// Question generation and the local repository
//

#[derive(Debug, Deserialize)]
pub struct GenerateIn {
    pub topic: String,
    pub difficulty: String,
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    1
}

#[derive(Serialize)]
pub struct QuestionsOut {
    pub topic: Topic,
    pub questions: Vec<QuestionData>,
}

#[derive(Debug, Deserialize)]
pub struct TopicQuery {
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BankQuery {
    pub topic: Option<String>,
    pub difficulty: Option<String>,
}

#[derive(Serialize)]
pub struct BankCountsOut {
    pub topic: Topic,
    pub counts: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionReviewIn {
    pub topic: String,
    pub index: usize,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub comment: Option<String>,
}

//
// Review store endpoints (/api/reviews/*)
//

#[derive(Debug, Deserialize)]
pub struct ReviewSaveIn {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default, rename = "questionIndex")]
    pub question_index: Option<u32>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Serialize)]
pub struct ReviewSaveOut {
    pub success: bool,
    pub message: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewsQuery {
    pub topic: Option<String>,
    pub difficulty: Option<String>,
}

#[derive(Serialize)]
pub struct ReviewsOut {
    pub success: bool,
    pub reviews: BTreeMap<u32, ReviewRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewItemQuery {
    pub topic: Option<String>,
    pub difficulty: Option<String>,
    #[serde(rename = "questionIndex")]
    pub question_index: Option<String>,
}

#[derive(Serialize)]
pub struct ReviewItemOut {
    pub success: bool,
    pub review: Option<ReviewRecord>,
}

#[derive(Serialize)]
pub struct ReviewErrorOut {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Required text parameter: present and not blank.
pub fn required(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
