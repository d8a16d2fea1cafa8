//! Application state: generation pipeline, question repository, bank and review store.
//!
//! This module owns:
//!   - the batch orchestrator (absent when no Gemini key is configured)
//!   - the local question repository (file-backed, in-memory fallback)
//!   - the published question bank
//!   - the review store
//!   - the single "generation in progress" flag

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::bank::QuestionBank;
use crate::batch::BatchOrchestrator;
use crate::config::AppConfig;
use crate::gemini::Gemini;
use crate::generation::GenerationClient;
use crate::repository::{FileStore, QuestionRepository};
use crate::retry::{RetryPolicy, RetryingGenerator, TokioSleeper};
use crate::reviews::{LocalKv, ReviewStore};

pub struct AppState {
    pub batch: Option<BatchOrchestrator>,
    pub repository: QuestionRepository,
    pub bank: QuestionBank,
    pub reviews: ReviewStore,
    generating: Arc<AtomicBool>,
}

/// Held while a batch is in flight; clears the busy flag on drop.
/// Owned, so it can travel with a detached generation task.
pub struct GenerationGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl AppState {
    pub fn new(
        batch: Option<BatchOrchestrator>,
        repository: QuestionRepository,
        bank: QuestionBank,
        reviews: ReviewStore,
    ) -> Self {
        Self { batch, repository, bank, reviews, generating: Arc::new(AtomicBool::new(false)) }
    }

    /// Build state from config + env: storage backends, Gemini client, retry policy.
    #[instrument(level = "info", skip_all)]
    pub async fn from_config(cfg: &AppConfig) -> Self {
        let repository = match FileStore::open(&cfg.storage.repository_dir) {
            Ok(store) => QuestionRepository::new(Arc::new(store)),
            Err(e) => {
                error!(target: "nvr_backend", dir = %cfg.storage.repository_dir.display(), error = %e, "Repository directory unusable; keeping questions in memory");
                QuestionRepository::in_memory()
            }
        };

        let kv = match &cfg.storage.reviews_path {
            Some(path) => match LocalKv::open(path).await {
                Ok(kv) => kv,
                Err(e) => {
                    error!(target: "reviews", path = %path.display(), error = %e, "Review file unusable; keeping reviews in memory");
                    LocalKv::in_memory()
                }
            },
            None => LocalKv::in_memory(),
        };

        let batch = match Gemini::from_env(cfg.generation.timeout()) {
            Some(gemini) => {
                info!(target: "nvr_backend", base_url = %gemini.base_url, model = %cfg.generation.model, "Gemini enabled.");
                let client = GenerationClient::new(Arc::new(gemini), cfg.prompts.clone(), &cfg.generation);
                let retrying = RetryingGenerator::new(
                    Arc::new(client),
                    Arc::new(TokioSleeper),
                    RetryPolicy::from_settings(&cfg.generation),
                );
                Some(BatchOrchestrator::new(retrying, cfg.generation.max_batch))
            }
            None => {
                warn!(target: "nvr_backend", "Gemini disabled (GEMINI_API_KEY missing or client unavailable). Only saved and bank questions are served.");
                None
            }
        };

        Self::new(batch, repository, QuestionBank::new(&cfg.storage.bank_dir), ReviewStore::new(Arc::new(kv)))
    }

    /// Claim the busy flag; `None` while another batch is outstanding.
    pub fn try_begin_generation(&self) -> Option<GenerationGuard> {
        self.generating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GenerationGuard { flag: Arc::clone(&self.generating) })
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }
}
