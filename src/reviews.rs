//! Reviewer ratings and comments, keyed `review:{topic}:{difficulty}:{index}`.
//!
//! Writes are last-write-wins per key; there is no versioning, so two reviewers
//! editing the same question overwrite each other.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::domain::ReviewRecord;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
  #[error("kv I/O failed: {0}")]
  Io(#[from] std::io::Error),
  #[error("kv payload could not be encoded: {0}")]
  Encode(#[from] serde_json::Error),
}

/// Async JSON key-value backend (managed KV service or local stand-in).
#[async_trait]
pub trait KvBackend: Send + Sync {
  async fn set(&self, key: &str, value: Value) -> Result<(), KvError>;
  async fn get(&self, key: &str) -> Result<Option<Value>, KvError>;
  async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, KvError>;
}

/// In-process KV map, optionally mirrored to a JSON file after every write.
#[derive(Default)]
pub struct LocalKv {
  entries: RwLock<BTreeMap<String, Value>>,
  persist_path: Option<PathBuf>,
}

impl LocalKv {
  pub fn in_memory() -> Self { Self::default() }

  /// Open (or start) a file-backed map. A missing file starts empty.
  pub async fn open(path: impl Into<PathBuf>) -> Result<Self, KvError> {
    let path = path.into();
    let entries = match tokio::fs::read_to_string(&path).await {
      Ok(raw) => serde_json::from_str(&raw)?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
      Err(e) => return Err(e.into()),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent).await?;
    }
    Ok(Self { entries: RwLock::new(entries), persist_path: Some(path) })
  }
}

#[async_trait]
impl KvBackend for LocalKv {
  async fn set(&self, key: &str, value: Value) -> Result<(), KvError> {
    let mut entries = self.entries.write().await;
    let previous = entries.insert(key.to_string(), value);
    if let Some(path) = &self.persist_path {
      let flushed = async {
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&*entries)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok::<_, KvError>(())
      }
      .await;
      if let Err(e) = flushed {
        // Keep memory and disk in agreement.
        match previous {
          Some(v) => entries.insert(key.to_string(), v),
          None => entries.remove(key),
        };
        return Err(e);
      }
    }
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
    Ok(self.entries.read().await.get(key).cloned())
  }

  async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, KvError> {
    let entries = self.entries.read().await;
    Ok(entries.range(prefix.to_string()..).take_while(|(k, _)| k.starts_with(prefix)).map(|(k, _)| k.clone()).collect())
  }
}

pub fn review_key(topic: &str, difficulty: &str, index: u32) -> String {
  format!("review:{topic}:{difficulty}:{index}")
}

#[derive(Clone)]
pub struct ReviewStore {
  backend: Arc<dyn KvBackend>,
}

impl ReviewStore {
  pub fn new(backend: Arc<dyn KvBackend>) -> Self { Self { backend } }

  /// Write (or overwrite) one review stamped with the current time. Returns its key.
  #[instrument(level = "info", skip(self, comment), fields(comment_len = comment.len()))]
  pub async fn save(
    &self,
    topic: &str,
    difficulty: &str,
    index: u32,
    rating: Option<u8>,
    comment: &str,
  ) -> Result<String, KvError> {
    let key = review_key(topic, difficulty, index);
    let record = ReviewRecord { rating, comment: comment.to_string(), timestamp: Utc::now() };
    self.backend.set(&key, serde_json::to_value(&record)?).await?;
    info!(target: "reviews", %key, ?rating, "Review saved");
    Ok(key)
  }

  /// Every review for a topic/difficulty, keyed by question index.
  #[instrument(level = "info", skip(self))]
  pub async fn list(&self, topic: &str, difficulty: &str) -> Result<BTreeMap<u32, ReviewRecord>, KvError> {
    let prefix = format!("review:{topic}:{difficulty}:");
    let mut reviews = BTreeMap::new();
    for key in self.backend.keys_with_prefix(&prefix).await? {
      let Some(index) = key.strip_prefix(&prefix).and_then(|s| s.parse::<u32>().ok()) else {
        continue;
      };
      let Some(value) = self.backend.get(&key).await? else { continue };
      match serde_json::from_value::<ReviewRecord>(value) {
        Ok(record) => {
          reviews.insert(index, record);
        }
        Err(e) => warn!(target: "reviews", %key, error = %e, "Skipping unreadable review"),
      }
    }
    Ok(reviews)
  }

  /// One review; `None` when absent or unreadable.
  #[instrument(level = "info", skip(self))]
  pub async fn get(&self, topic: &str, difficulty: &str, index: u32) -> Result<Option<ReviewRecord>, KvError> {
    let key = review_key(topic, difficulty, index);
    let Some(value) = self.backend.get(&key).await? else { return Ok(None) };
    match serde_json::from_value::<ReviewRecord>(value) {
      Ok(record) => Ok(Some(record)),
      Err(e) => {
        warn!(target: "reviews", %key, error = %e, "Skipping unreadable review");
        Ok(None)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store() -> ReviewStore {
    ReviewStore::new(Arc::new(LocalKv::in_memory()))
  }

  #[tokio::test]
  async fn saved_review_is_listed_by_index() {
    let reviews = store();
    let before = Utc::now();
    let key = reviews.save("Rotations", "Hard", 2, Some(4), "ok").await.expect("save");
    assert_eq!(key, "review:Rotations:Hard:2");

    let listed = reviews.list("Rotations", "Hard").await.expect("list");
    let record = listed.get(&2).expect("review 2");
    assert_eq!(record.rating, Some(4));
    assert_eq!(record.comment, "ok");
    assert!(record.timestamp >= before);
  }

  #[tokio::test]
  async fn list_is_scoped_to_topic_and_difficulty() {
    let reviews = store();
    reviews.save("Rotations", "Hard", 0, Some(1), "a").await.expect("save");
    reviews.save("Rotations", "Easy", 0, Some(2), "b").await.expect("save");
    reviews.save("Rotations (old)", "Hard", 0, Some(3), "c").await.expect("save");

    let listed = reviews.list("Rotations", "Hard").await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[&0].comment, "a");
  }

  #[tokio::test]
  async fn last_write_wins() {
    let reviews = store();
    reviews.save("Analogies", "Easy", 3, Some(2), "first").await.expect("save");
    reviews.save("Analogies", "Easy", 3, None, "second").await.expect("save");
    let record = reviews.get("Analogies", "Easy", 3).await.expect("get").expect("present");
    assert_eq!(record.rating, None);
    assert_eq!(record.comment, "second");
  }

  #[tokio::test]
  async fn non_numeric_suffixes_are_skipped() {
    let kv = Arc::new(LocalKv::in_memory());
    kv.set("review:Rotations:Hard:draft", serde_json::json!({})).await.expect("set");
    let reviews = ReviewStore::new(kv);
    assert!(reviews.list("Rotations", "Hard").await.expect("list").is_empty());
  }

  #[tokio::test]
  async fn unreadable_record_reads_as_absent() {
    let kv = Arc::new(LocalKv::in_memory());
    kv.set("review:Rotations:Hard:4", serde_json::json!({"rating": "five"})).await.expect("set");
    let reviews = ReviewStore::new(kv);
    assert_eq!(reviews.get("Rotations", "Hard", 4).await.expect("get"), None);
    assert!(reviews.list("Rotations", "Hard").await.expect("list").is_empty());
  }

  #[tokio::test]
  async fn file_backed_reviews_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("reviews.json");
    {
      let reviews = ReviewStore::new(Arc::new(LocalKv::open(&path).await.expect("open")));
      reviews.save("Codes and Grids", "Medium", 1, Some(5), "tidy").await.expect("save");
    }
    let reviews = ReviewStore::new(Arc::new(LocalKv::open(&path).await.expect("reopen")));
    let record = reviews.get("Codes and Grids", "Medium", 1).await.expect("get").expect("present");
    assert_eq!(record.comment, "tidy");
  }
}
