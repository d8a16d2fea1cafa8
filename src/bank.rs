//! Read-only access to the published question bank on disk.
//!
//! Layout: `{root}/{folder}/NVR_{Topic}_Questions_{difficulty}.json`.

use std::path::{Path, PathBuf};

use tracing::{debug, error, instrument};

use crate::domain::{Difficulty, QuestionData, Topic};
use crate::util::underscore_whitespace;

#[derive(Debug, thiserror::Error)]
pub enum BankError {
  #[error("no question file for {topic} ({difficulty}) at {path}")]
  Missing { topic: Topic, difficulty: Difficulty, path: PathBuf },
  #[error("failed to read {path}: {source}")]
  Io { path: PathBuf, source: std::io::Error },
  #[error("question file {path} is not valid: {source}")]
  Parse { path: PathBuf, source: serde_json::Error },
}

/// Folder names as they appear in the published bank (spelling included).
fn folder_for(topic: Topic) -> &'static str {
  match topic {
    Topic::OddOneOut => "odd_one_out",
    Topic::SeriesAndSequences => "series_and_sequences",
    Topic::Analogies => "anologies",
    Topic::Reflections => "reflections",
    Topic::Rotations => "rotations",
    Topic::CodesAndGrids => "codes_and_grids",
    Topic::ShapeRelationships3d => "3d_shape_relationship",
    Topic::SpatialReasoning => "spatial_reasoining",
  }
}

pub fn bank_file_name(topic: Topic, difficulty: Difficulty) -> String {
  let stem = underscore_whitespace(topic.name()).replace(['(', ')'], "");
  format!("NVR_{}_Questions_{}.json", stem, difficulty.name().to_lowercase())
}

#[derive(Clone, Debug)]
pub struct QuestionBank {
  root: PathBuf,
}

impl QuestionBank {
  pub fn new(root: impl AsRef<Path>) -> Self {
    Self { root: root.as_ref().to_path_buf() }
  }

  pub fn path_for(&self, topic: Topic, difficulty: Difficulty) -> PathBuf {
    self.root.join(folder_for(topic)).join(bank_file_name(topic, difficulty))
  }

  #[instrument(level = "info", skip(self), fields(%topic, %difficulty))]
  pub async fn load(&self, topic: Topic, difficulty: Difficulty) -> Result<Vec<QuestionData>, BankError> {
    let path = self.path_for(topic, difficulty);
    let raw = match tokio::fs::read_to_string(&path).await {
      Ok(raw) => raw,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Err(BankError::Missing { topic, difficulty, path });
      }
      Err(source) => return Err(BankError::Io { path, source }),
    };
    let questions: Vec<QuestionData> =
      serde_json::from_str(&raw).map_err(|source| BankError::Parse { path: path.clone(), source })?;
    debug!(target: "nvr_backend", path = %path.display(), count = questions.len(), "Loaded bank questions");
    Ok(questions)
  }

  /// Number of published questions; 0 when the file is missing or unreadable.
  pub async fn count(&self, topic: Topic, difficulty: Difficulty) -> usize {
    match self.load(topic, difficulty).await {
      Ok(q) => q.len(),
      Err(e) => {
        error!(target: "nvr_backend", error = %e, "Failed to count bank questions");
        0
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_names_drop_parentheses_and_lowercase_difficulty() {
    assert_eq!(
      bank_file_name(Topic::Reflections, Difficulty::Hard),
      "NVR_Reflections_Mirror_Images_Questions_hard.json"
    );
    assert_eq!(
      bank_file_name(Topic::ShapeRelationships3d, Difficulty::Easy),
      "NVR_3D_Shape_Relationships_Questions_easy.json"
    );
  }

  #[tokio::test]
  async fn loads_and_normalizes_bank_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bank = QuestionBank::new(dir.path());
    let path = bank.path_for(Topic::Analogies, Difficulty::Medium);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(
      &path,
      r#"[{"question":"A is to B as C is to ?","options":[{"label":"A","svg":"<svg/>"}],"answer":"A","explanation":"x"}]"#,
    )
    .expect("write");

    let questions = bank.load(Topic::Analogies, Difficulty::Medium).await.expect("load");
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].comment, "");
    assert_eq!(bank.count(Topic::Analogies, Difficulty::Medium).await, 1);
  }

  #[tokio::test]
  async fn missing_file_is_reported_and_counts_zero() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bank = QuestionBank::new(dir.path());
    assert!(matches!(
      bank.load(Topic::Rotations, Difficulty::Easy).await,
      Err(BankError::Missing { .. })
    ));
    assert_eq!(bank.count(Topic::Rotations, Difficulty::Easy).await, 0);
  }
}
