//! Bounded retries with exponential backoff around single generation attempts.
//!
//! Per call the generator walks a tiny state machine: attempt `n` either succeeds,
//! waits `2^n * base_delay` and moves to attempt `n + 1` (retryable failure with
//! attempts left), or stops with the last error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, instrument, warn};

use crate::config::GenerationSettings;
use crate::domain::{Difficulty, QuestionData, Topic};
use crate::generation::{GenerationError, QuestionGenerator};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub base_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_attempts: 3, base_delay: Duration::from_millis(1000) }
  }
}

impl RetryPolicy {
  pub fn from_settings(settings: &GenerationSettings) -> Self {
    Self { max_attempts: settings.max_attempts.max(1), base_delay: settings.base_backoff() }
  }

  /// Wait after failed attempt `attempt` (0-based).
  pub fn delay_for(&self, attempt: u32) -> Duration {
    self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
  }
}

/// Where backoff waits happen. Tests swap in a recorder.
#[async_trait]
pub trait Sleeper: Send + Sync {
  async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
  async fn sleep(&self, duration: Duration) {
    tokio::time::sleep(duration).await;
  }
}

/// Terminal outcome after the attempt budget is spent or a fatal error hit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Failed to communicate with the AI model. Details: {last_error}{}", status_suffix(.last_error))]
pub struct GenerationFailure {
  pub attempts: u32,
  pub last_error: GenerationError,
}

fn status_suffix(err: &GenerationError) -> String {
  err.status().map(|s| format!(" (Status: {s})")).unwrap_or_default()
}

#[derive(Clone)]
pub struct RetryingGenerator {
  client: Arc<dyn QuestionGenerator>,
  sleeper: Arc<dyn Sleeper>,
  policy: RetryPolicy,
}

impl RetryingGenerator {
  pub fn new(client: Arc<dyn QuestionGenerator>, sleeper: Arc<dyn Sleeper>, policy: RetryPolicy) -> Self {
    Self { client, sleeper, policy }
  }


  pub async fn generate(&self, topic: Topic, difficulty: Difficulty) -> Result<QuestionData, GenerationFailure> {
    self.generate_with_attempts(topic, difficulty, self.policy.max_attempts).await
  }

  #[instrument(level = "info", skip(self), fields(%topic, %difficulty))]
  pub async fn generate_with_attempts(
    &self,
    topic: Topic,
    difficulty: Difficulty,
    max_attempts: u32,
  ) -> Result<QuestionData, GenerationFailure> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
      let err = match self.client.request_one(topic, difficulty).await {
        Ok(question) => return Ok(question),
        Err(e) => e,
      };

      if err.is_retryable() && attempt + 1 < max_attempts {
        let wait = self.policy.delay_for(attempt);
        warn!(
          target: "generation",
          attempt = attempt + 1,
          status = ?err.status(),
          wait_ms = wait.as_millis() as u64,
          "Attempt failed with a retryable status; backing off"
        );
        self.sleeper.sleep(wait).await;
        attempt += 1;
        continue;
      }

      let failure = GenerationFailure { attempts: attempt + 1, last_error: err };
      error!(target: "generation", attempts = failure.attempts, error = %failure, "Question generation gave up");
      return Err(failure);
    }
  }
}


#[cfg(test)]
mod tests {
  use super::testing::*;
  use super::*;

  fn retrying(gen: Arc<ScriptedGenerator>, sleeper: Arc<RecordingSleeper>) -> RetryingGenerator {
    RetryingGenerator::new(gen, sleeper, RetryPolicy::default())
  }

  #[test]
  fn backoff_doubles_from_base() {
    let p = RetryPolicy::default();
    assert_eq!(p.delay_for(0), Duration::from_millis(1000));
    assert_eq!(p.delay_for(1), Duration::from_millis(2000));
    assert_eq!(p.delay_for(2), Duration::from_millis(4000));
  }

  #[tokio::test]
  async fn recovers_after_two_rate_limits() {
    let gen = ScriptedGenerator::new(
      vec![Err(status_error(429)), Err(status_error(429))],
      Ok(question("ok")),
    );
    let sleeper = Arc::new(RecordingSleeper::default());
    let q = retrying(gen.clone(), sleeper.clone())
      .generate(Topic::Rotations, Difficulty::Easy)
      .await
      .expect("third attempt succeeds");
    assert_eq!(q.prompt, "Question ok");
    assert_eq!(gen.calls(), 3);
    assert_eq!(sleeper.waits(), vec![Duration::from_millis(1000), Duration::from_millis(2000)]);
  }

  #[tokio::test]
  async fn fatal_error_stops_after_one_attempt() {
    let gen = ScriptedGenerator::new(vec![Err(GenerationError::Parse("eof".into()))], Ok(question("never")));
    let sleeper = Arc::new(RecordingSleeper::default());
    let failure = retrying(gen.clone(), sleeper.clone())
      .generate(Topic::Analogies, Difficulty::Hard)
      .await
      .unwrap_err();
    assert_eq!(failure.attempts, 1);
    assert_eq!(gen.calls(), 1);
    assert!(sleeper.waits().is_empty());
  }

  #[tokio::test]
  async fn unlisted_status_is_fatal() {
    let gen = ScriptedGenerator::new(vec![Err(status_error(500))], Ok(question("never")));
    let sleeper = Arc::new(RecordingSleeper::default());
    let failure = retrying(gen.clone(), sleeper.clone())
      .generate(Topic::Analogies, Difficulty::Hard)
      .await
      .unwrap_err();
    assert_eq!(failure.attempts, 1);
    assert!(sleeper.waits().is_empty());
  }

  #[tokio::test]
  async fn persistent_overload_exhausts_attempts() {
    let gen = ScriptedGenerator::new(vec![], Err(status_error(503)));
    let sleeper = Arc::new(RecordingSleeper::default());
    let failure = retrying(gen.clone(), sleeper.clone())
      .generate_with_attempts(Topic::SpatialReasoning, Difficulty::Medium, 3)
      .await
      .unwrap_err();
    assert_eq!(gen.calls(), 3);
    assert_eq!(failure.attempts, 3);
    // No wait after the final attempt.
    assert_eq!(sleeper.waits().len(), 2);
    assert_eq!(
      failure.to_string(),
      "Failed to communicate with the AI model. Details: HTTP 503 (Status: 503)"
    );
  }

  #[tokio::test]
  async fn zero_attempts_still_tries_once() {
    let gen = ScriptedGenerator::new(vec![], Err(status_error(429)));
    let sleeper = Arc::new(RecordingSleeper::default());
    let failure = retrying(gen.clone(), sleeper)
      .generate_with_attempts(Topic::OddOneOut, Difficulty::Easy, 0)
      .await
      .unwrap_err();
    assert_eq!(failure.attempts, 1);
  }

  #[test]
  fn failure_message_omits_missing_status() {
    let f = GenerationFailure { attempts: 1, last_error: GenerationError::Parse("bad".into()) };
    assert_eq!(
      f.to_string(),
      "Failed to communicate with the AI model. Details: response is not valid JSON: bad"
    );
  }
}
