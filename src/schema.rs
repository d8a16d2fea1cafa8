//! Shape contract for generated questions.
//!
//! `response_schema` is sent upstream as the output constraint; `validate_question`
//! is the gate every raw response must pass before it is accepted.

use serde_json::{json, Value};

use crate::domain::{QuestionData, QuestionOption};

/// Every question carries exactly this many options.
pub const OPTION_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
  #[error("response is not a JSON object")]
  NotAnObject,
  #[error("missing or empty field `{0}`")]
  MissingField(&'static str),
  #[error("expected 5 options, got {0}")]
  OptionCount(usize),
  #[error("option {index} is missing `{field}`")]
  MalformedOption { index: usize, field: &'static str },
  #[error("answer `{0}` does not match any option label")]
  UnknownAnswer(String),
}

/// Validate a parsed candidate and convert it into a fresh, unreviewed question.
pub fn validate_question(candidate: &Value) -> Result<QuestionData, SchemaError> {
  let obj = candidate.as_object().ok_or(SchemaError::NotAnObject)?;

  let prompt = non_empty_str(obj.get("question")).ok_or(SchemaError::MissingField("question"))?;

  let raw_options = obj
    .get("options")
    .and_then(Value::as_array)
    .ok_or(SchemaError::MissingField("options"))?;
  if raw_options.len() != OPTION_COUNT {
    return Err(SchemaError::OptionCount(raw_options.len()));
  }

  let mut options = Vec::with_capacity(OPTION_COUNT);
  for (index, raw) in raw_options.iter().enumerate() {
    let label = non_empty_str(raw.get("label"))
      .ok_or(SchemaError::MalformedOption { index, field: "label" })?;
    let diagram = raw
      .get("svg")
      .and_then(Value::as_str)
      .ok_or(SchemaError::MalformedOption { index, field: "svg" })?;
    options.push(QuestionOption { label: label.to_string(), diagram: diagram.to_string() });
  }

  let answer = non_empty_str(obj.get("answer")).ok_or(SchemaError::MissingField("answer"))?;
  if !options.iter().any(|o| o.label == answer) {
    return Err(SchemaError::UnknownAnswer(answer.to_string()));
  }

  let explanation = obj.get("explanation").and_then(Value::as_str).unwrap_or_default();

  Ok(QuestionData {
    prompt: prompt.to_string(),
    options,
    answer_label: answer.to_string(),
    explanation: explanation.to_string(),
    rating: None,
    comment: String::new(),
  })
}

fn non_empty_str(v: Option<&Value>) -> Option<&str> {
  v.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

/// Output constraint in the generative-language `responseSchema` dialect.
pub fn response_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "question": {
        "type": "STRING",
        "description": "The question prompt. Wording matches the topic, e.g. 'Which comes next?' for sequences."
      },
      "options": {
        "type": "ARRAY",
        "description": "Exactly 5 candidate answers.",
        "items": {
          "type": "OBJECT",
          "properties": {
            "label": { "type": "STRING", "description": "Option label: A, B, C, D or E." },
            "svg": {
              "type": "STRING",
              "description": "Self-contained SVG with a 100x100 viewBox using basic shapes."
            }
          },
          "required": ["label", "svg"]
        }
      },
      "answer": { "type": "STRING", "description": "Label of the correct option." },
      "explanation": {
        "type": "STRING",
        "description": "Concise but complete explanation of the rule behind the answer."
      }
    },
    "required": ["question", "options", "answer", "explanation"]
  })
}
