//! Service configuration: environment variables plus an optional TOML file.
//!
//! The TOML file (path in NVR_CONFIG_PATH) may contain `[prompts]`, `[generation]`
//! and `[storage]` tables; every key is optional and falls back to the defaults below.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub generation: GenerationSettings,
  #[serde(default)]
  pub storage: StorageSettings,
}

/// Instruction template for question generation.
///
/// Placeholders: `{topic}`, `{difficulty}`, `{topic_rules}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub question_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self { question_template: crate::prompt::DEFAULT_QUESTION_TEMPLATE.into() }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
  pub model: String,
  pub temperature: f32,
  pub max_attempts: u32,
  pub base_backoff_ms: u64,
  pub max_batch: usize,
  pub timeout_secs: u64,
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self {
      model: "gemini-2.5-pro".into(),
      temperature: 0.9,
      max_attempts: 3,
      base_backoff_ms: 1000,
      max_batch: 10,
      timeout_secs: 120,
    }
  }
}

impl GenerationSettings {
  pub fn base_backoff(&self) -> Duration { Duration::from_millis(self.base_backoff_ms) }
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
  /// Directory holding the local question repository (one file per key).
  pub repository_dir: PathBuf,
  /// JSON file backing the review store; `None` keeps reviews in memory only.
  pub reviews_path: Option<PathBuf>,
  /// Root of the published question bank.
  pub bank_dir: PathBuf,
}

impl Default for StorageSettings {
  fn default() -> Self {
    Self {
      repository_dir: PathBuf::from("./data/repository"),
      reviews_path: Some(PathBuf::from("./data/reviews.json")),
      bank_dir: PathBuf::from("./questions"),
    }
  }
}

impl AppConfig {
  /// TOML file (if any) with env overrides applied on top.
  pub fn from_env() -> Self {
    let mut cfg = load_config_from_env().unwrap_or_default();
    if let Ok(model) = std::env::var("GEMINI_MODEL") {
      if !model.trim().is_empty() {
        cfg.generation.model = model;
      }
    }
    cfg
  }
}

/// Attempt to load `AppConfig` from NVR_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("NVR_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "nvr_backend", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "nvr_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "nvr_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}
