//! Domain models: topics, difficulties, generated questions and review records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// The eight non-verbal reasoning question categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
  #[serde(rename = "Odd One Out")]
  OddOneOut,
  #[serde(rename = "Series and Sequences")]
  SeriesAndSequences,
  #[serde(rename = "Analogies")]
  Analogies,
  #[serde(rename = "Reflections (Mirror Images)")]
  Reflections,
  #[serde(rename = "Rotations")]
  Rotations,
  #[serde(rename = "Codes and Grids")]
  CodesAndGrids,
  #[serde(rename = "3D Shape Relationships")]
  ShapeRelationships3d,
  #[serde(rename = "Spatial Reasoning")]
  SpatialReasoning,
}

impl Topic {
  pub const ALL: [Topic; 8] = [
    Topic::OddOneOut,
    Topic::SeriesAndSequences,
    Topic::Analogies,
    Topic::Reflections,
    Topic::Rotations,
    Topic::CodesAndGrids,
    Topic::ShapeRelationships3d,
    Topic::SpatialReasoning,
  ];

  /// Display name, also used as the repository key and in prompts.
  pub fn name(self) -> &'static str {
    match self {
      Topic::OddOneOut => "Odd One Out",
      Topic::SeriesAndSequences => "Series and Sequences",
      Topic::Analogies => "Analogies",
      Topic::Reflections => "Reflections (Mirror Images)",
      Topic::Rotations => "Rotations",
      Topic::CodesAndGrids => "Codes and Grids",
      Topic::ShapeRelationships3d => "3D Shape Relationships",
      Topic::SpatialReasoning => "Spatial Reasoning",
    }
  }

  pub fn description(self) -> &'static str {
    match self {
      Topic::OddOneOut => "Find the figure that doesn't follow the rule of the others.",
      Topic::SeriesAndSequences => "Identify the next or missing shape in a sequence.",
      Topic::Analogies => "Apply the transformation from A to B, to shape C.",
      Topic::Reflections => "Find the correct mirror image of a given shape.",
      Topic::Rotations => "Identify the figure that has been rotated by a specific degree.",
      Topic::CodesAndGrids => "Decode shapes by matching them to given codes or grid positions.",
      Topic::ShapeRelationships3d => "Analyze nets, cubes, and folded shapes to find relationships.",
      Topic::SpatialReasoning => "Track the movement, flipping, or swapping of shapes.",
    }
  }
}

impl fmt::Display for Topic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for Topic {
  type Err = ParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    Topic::ALL
      .into_iter()
      .find(|t| t.name() == s)
      .ok_or_else(|| ParseError::UnsupportedTopic(s.to_string()))
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

  pub fn name(self) -> &'static str {
    match self {
      Difficulty::Easy => "Easy",
      Difficulty::Medium => "Medium",
      Difficulty::Hard => "Hard",
    }
  }
}

impl Default for Difficulty {
  fn default() -> Self { Difficulty::Medium }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for Difficulty {
  type Err = ParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    Difficulty::ALL
      .into_iter()
      .find(|d| d.name() == s)
      .ok_or_else(|| ParseError::UnsupportedDifficulty(s.to_string()))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
  #[error("unsupported topic: {0}")]
  UnsupportedTopic(String),
  #[error("unsupported difficulty: {0}")]
  UnsupportedDifficulty(String),
}

/// One labelled answer option with its diagram markup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
  #[serde(default, deserialize_with = "string_or_empty")]
  pub label: String,
  #[serde(rename = "svg", alias = "diagram", default, deserialize_with = "string_or_empty")]
  pub diagram: String,
}

/// A generated (or imported) question plus its review metadata.
///
/// Field names on the wire follow the published question files, so exports
/// from older versions import unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionData {
  #[serde(rename = "question", alias = "prompt")]
  pub prompt: String,
  pub options: Vec<QuestionOption>,
  #[serde(rename = "answer", alias = "answerLabel", default, deserialize_with = "string_or_empty")]
  pub answer_label: String,
  #[serde(default, deserialize_with = "string_or_empty")]
  pub explanation: String,
  #[serde(default, deserialize_with = "rating_or_none")]
  pub rating: Option<u8>,
  #[serde(default, deserialize_with = "string_or_empty")]
  pub comment: String,
}

// Saved and exported files predate some fields; absent or null text reads as "".
fn string_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

// Anything that is not a whole 1..=5 star count reads as unrated.
fn rating_or_none<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
  let raw = Option::<serde_json::Value>::deserialize(d)?;
  Ok(raw.and_then(|v| v.as_u64()).and_then(|r| u8::try_from(r).ok()).filter(|r| (1..=5).contains(r)))
}

impl QuestionData {
  /// The option the answer label points at, if any.
  pub fn answer_option(&self) -> Option<&QuestionOption> {
    self.options.iter().find(|o| o.label == self.answer_label)
  }
}

/// A single user action asking for `count` fresh questions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
  pub topic: Topic,
  pub difficulty: Difficulty,
  pub count: usize,
}

/// Reviewer feedback stored per (topic, difficulty, question index).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
  pub rating: Option<u8>,
  #[serde(default)]
  pub comment: String,
  pub timestamp: DateTime<Utc>,
}

/// Ratings are 1..=5 stars; `None` clears a rating.
pub fn is_valid_rating(rating: Option<u8>) -> bool {
  rating.map_or(true, |r| (1..=5).contains(&r))
}
