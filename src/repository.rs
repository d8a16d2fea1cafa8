//! Local question repository: topic -> latest question list.
//!
//! Everything lives under one key holding a JSON map from topic name to its
//! questions. Saves replace a topic's list wholesale. Storage failures are logged
//! and swallowed; the repository is a cache and never fails the caller.
//!
//! The store API is synchronous and `FileStore` uses blocking `std::fs`. Async
//! callers that write after long-running work (the generate handler) move the
//! save onto `spawn_blocking`; single small reads and review edits run inline.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::domain::{QuestionData, Topic};
use crate::util::underscore_whitespace;

pub const REPOSITORY_KEY: &str = "nvr-questions-repo";

pub type SavedQuestions = BTreeMap<String, Vec<QuestionData>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("storage I/O failed: {0}")]
  Io(#[from] std::io::Error),
  #[error("storage unavailable: {0}")]
  Unavailable(String),
}

/// Synchronous string key-value storage.
pub trait KeyValueStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
  fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let entries = self.entries.lock().map_err(|e| StoreError::Unavailable(e.to_string()))?;
    Ok(entries.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    let mut entries = self.entries.lock().map_err(|e| StoreError::Unavailable(e.to_string()))?;
    entries.insert(key.to_string(), value.to_string());
    Ok(())
  }
}

/// One `<key>.json` file per key inside a directory.
pub struct FileStore {
  dir: PathBuf,
}

impl FileStore {
  pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
    let dir = dir.as_ref().to_path_buf();
    std::fs::create_dir_all(&dir)?;
    Ok(Self { dir })
  }

  fn path_for(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{key}.json"))
  }
}

impl KeyValueStore for FileStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    match std::fs::read_to_string(self.path_for(key)) {
      Ok(s) => Ok(Some(s)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
    // Write-then-rename: readers never observe a partial file.
    let path = self.path_for(key);
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, value)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
  }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
  #[error("No questions saved for this topic to export.")]
  NothingToExport,
  #[error("file is not valid JSON: {0}")]
  InvalidJson(String),
  #[error("Invalid question file format: {0}")]
  InvalidFormat(String),
  #[error("failed to serialize questions: {0}")]
  Serialize(String),
}

/// A rendered export ready to be offered as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
  pub file_name: String,
  pub contents: String,
}

pub fn export_file_name(topic: Topic) -> String {
  format!("NVR_{}_Questions.json", underscore_whitespace(topic.name()))
}

pub struct QuestionRepository {
  store: Arc<dyn KeyValueStore>,
  // Serializes read-modify-write cycles on the single map key.
  write_lock: Mutex<()>,
}

impl QuestionRepository {
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self { store, write_lock: Mutex::new(()) }
  }

  pub fn in_memory() -> Self {
    Self::new(Arc::new(MemoryStore::default()))
  }

  fn load_all(&self) -> SavedQuestions {
    let raw = match self.store.get(REPOSITORY_KEY) {
      Ok(Some(raw)) => raw,
      Ok(None) => return SavedQuestions::new(),
      Err(e) => {
        error!(target: "nvr_backend", error = %e, "Failed to read saved questions");
        return SavedQuestions::new();
      }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
      error!(target: "nvr_backend", error = %e, "Failed to parse saved questions");
      SavedQuestions::new()
    })
  }

  /// Saved questions for a topic; empty when nothing (readable) is stored.
  pub fn load_topic(&self, topic: Topic) -> Vec<QuestionData> {
    self.load_all().remove(topic.name()).unwrap_or_default()
  }

  /// Replace the topic's list. Empty lists are ignored.
  #[instrument(level = "debug", skip(self, questions), fields(%topic, count = questions.len()))]
  pub fn save_topic(&self, topic: Topic, questions: &[QuestionData]) {
    if questions.is_empty() {
      return;
    }
    let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
    let mut all = self.load_all();
    all.insert(topic.name().to_string(), questions.to_vec());
    self.persist(topic, &all);
  }

  /// Attach review metadata to one saved question and persist the list.
  pub fn update_review(
    &self,
    topic: Topic,
    index: usize,
    rating: Option<u8>,
    comment: &str,
  ) -> Option<QuestionData> {
    let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
    let mut all = self.load_all();
    let question = all.get_mut(topic.name())?.get_mut(index)?;
    question.rating = rating;
    question.comment = comment.to_string();
    let updated = question.clone();
    self.persist(topic, &all);
    Some(updated)
  }

  // Caller holds `write_lock`.
  fn persist(&self, topic: Topic, all: &SavedQuestions) {
    let serialized = match serde_json::to_string(all) {
      Ok(s) => s,
      Err(e) => {
        error!(target: "nvr_backend", error = %e, "Failed to serialize saved questions");
        return;
      }
    };
    if let Err(e) = self.store.set(REPOSITORY_KEY, &serialized) {
      error!(target: "nvr_backend", %topic, error = %e, "Failed to save questions");
    }
  }

  #[instrument(level = "info", skip(self), fields(%topic))]
  pub fn export_topic(&self, topic: Topic) -> Result<ExportFile, RepositoryError> {
    let questions = self.load_topic(topic);
    if questions.is_empty() {
      return Err(RepositoryError::NothingToExport);
    }
    let contents =
      serde_json::to_string_pretty(&questions).map_err(|e| RepositoryError::Serialize(e.to_string()))?;
    Ok(ExportFile { file_name: export_file_name(topic), contents })
  }

  /// Parse an exported file and make it the topic's list. Nothing is written on error.
  #[instrument(level = "info", skip(self, json), fields(%topic, json_len = json.len()))]
  pub fn import_topic(&self, topic: Topic, json: &str) -> Result<Vec<QuestionData>, RepositoryError> {
    let value: Value = serde_json::from_str(json).map_err(|e| RepositoryError::InvalidJson(e.to_string()))?;
    let items = value
      .as_array()
      .ok_or_else(|| RepositoryError::InvalidFormat("expected an array of questions".into()))?;
    if let Some(index) = items
      .iter()
      .position(|q| !is_truthy(q.get("question").or_else(|| q.get("prompt"))) || !is_truthy(q.get("options")))
    {
      warn!(target: "nvr_backend", index, "Import rejected: entry lacks question/options");
      return Err(RepositoryError::InvalidFormat(format!("entry {index} is missing `question` or `options`")));
    }

    let questions: Vec<QuestionData> =
      serde_json::from_value(value).map_err(|e| RepositoryError::InvalidFormat(e.to_string()))?;
    self.save_topic(topic, &questions);
    info!(target: "nvr_backend", count = questions.len(), "Questions imported");
    Ok(questions)
  }
}

/// Presence check matching how exported files were validated historically:
/// null, false, 0 and "" count as missing.
fn is_truthy(v: Option<&Value>) -> bool {
  match v {
    None | Some(Value::Null) => false,
    Some(Value::Bool(b)) => *b,
    Some(Value::String(s)) => !s.is_empty(),
    Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
    Some(_) => true,
  }
}
