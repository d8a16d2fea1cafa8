//! Concurrent fan-out of independent generators with all-or-nothing results.

use std::future::Future;

use tokio::task::JoinSet;
use tracing::{error, info, instrument, Instrument};
use uuid::Uuid;

use crate::domain::{GenerationRequest, QuestionData};
use crate::retry::{GenerationFailure, RetryingGenerator};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BatchError {
  #[error("batch size must be between 1 and {max}, got {requested}")]
  InvalidCount { requested: usize, max: usize },
  #[error("{failure}")]
  Generation { index: usize, failure: GenerationFailure },
  #[error("generation task aborted: {0}")]
  Aborted(String),
}

/// Failure of one member of an ordered join.
#[derive(Debug)]
pub enum FanOutError<E> {
  Failed { index: usize, error: E },
  Aborted(String),
}

/// Run every future on its own task and collect results in input order.
///
/// Returns on the first failure. Remaining tasks are detached, not cancelled:
/// they run to completion and their results are dropped.
pub async fn join_ordered<T, E, F>(futures: Vec<F>) -> Result<Vec<T>, FanOutError<E>>
where
  F: Future<Output = Result<T, E>> + Send + 'static,
  T: Send + 'static,
  E: Send + 'static,
{
  let count = futures.len();
  let mut set = JoinSet::new();
  for (index, fut) in futures.into_iter().enumerate() {
    set.spawn(async move { (index, fut.await) });
  }

  let mut slots: Vec<Option<T>> = (0..count).map(|_| None).collect();
  while let Some(joined) = set.join_next().await {
    match joined {
      Ok((index, Ok(value))) => slots[index] = Some(value),
      Ok((index, Err(error))) => {
        set.detach_all();
        return Err(FanOutError::Failed { index, error });
      }
      Err(e) => {
        set.detach_all();
        return Err(FanOutError::Aborted(e.to_string()));
      }
    }
  }
  Ok(slots.into_iter().flatten().collect())
}

#[derive(Clone)]
pub struct BatchOrchestrator {
  generator: RetryingGenerator,
  max_batch: usize,
}

impl BatchOrchestrator {
  pub fn new(generator: RetryingGenerator, max_batch: usize) -> Self {
    Self { generator, max_batch: max_batch.max(1) }
  }

  /// Generate `request.count` questions concurrently; any failure fails the batch.
  ///
  /// The fan-out runs on its own task, so dropping the returned future detaches
  /// the batch instead of cancelling in-flight upstream calls.
  #[instrument(level = "info", skip(self), fields(batch_id = %Uuid::new_v4()))]
  pub async fn run(&self, request: GenerationRequest) -> Result<Vec<QuestionData>, BatchError> {
    let GenerationRequest { topic, difficulty, count } = request;
    if count == 0 || count > self.max_batch {
      return Err(BatchError::InvalidCount { requested: count, max: self.max_batch });
    }

    let futures = (0..count)
      .map(|_| {
        let generator = self.generator.clone();
        async move { generator.generate(topic, difficulty).await }
      })
      .collect::<Vec<_>>();

    let joined = tokio::spawn(join_ordered(futures).in_current_span())
      .await
      .map_err(|e| BatchError::Aborted(e.to_string()))?;

    match joined {
      Ok(questions) => {
        info!(target: "generation", %topic, %difficulty, count = questions.len(), "Batch generated");
        Ok(questions)
      }
      Err(FanOutError::Failed { index, error }) => {
        error!(target: "generation", %topic, %difficulty, index, error = %error, "Batch failed");
        Err(BatchError::Generation { index, failure: error })
      }
      Err(FanOutError::Aborted(reason)) => {
        error!(target: "generation", %topic, %difficulty, %reason, "Batch task aborted");
        Err(BatchError::Aborted(reason))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::time::Duration;

  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use async_trait::async_trait;

  use crate::domain::{Difficulty, Topic};
  use crate::generation::{GenerationError, QuestionGenerator};
  use crate::retry::testing::*;
  use crate::retry::RetryPolicy;

  /// Call `n` of `total` sleeps `(total - n) * step`, so earlier requests finish later.
  struct StaggeredGenerator {
    step: Duration,
    total: usize,
    calls: AtomicUsize,
    completed: AtomicUsize,
  }

  impl StaggeredGenerator {
    fn new(step: Duration, total: usize) -> Arc<Self> {
      Arc::new(Self { step, total, calls: AtomicUsize::new(0), completed: AtomicUsize::new(0) })
    }
  }

  #[async_trait]
  impl QuestionGenerator for StaggeredGenerator {
    async fn request_one(&self, _: Topic, _: Difficulty) -> Result<QuestionData, GenerationError> {
      let n = self.calls.fetch_add(1, Ordering::SeqCst);
      tokio::time::sleep(self.step * (self.total - n) as u32).await;
      self.completed.fetch_add(1, Ordering::SeqCst);
      Ok(question(&n.to_string()))
    }
  }

  fn request(topic: Topic, difficulty: Difficulty, count: usize) -> GenerationRequest {
    GenerationRequest { topic, difficulty, count }
  }

  fn orchestrator(gen: Arc<dyn QuestionGenerator>) -> BatchOrchestrator {
    let retrying = RetryingGenerator::new(gen, Arc::new(RecordingSleeper::default()), RetryPolicy::default());
    BatchOrchestrator::new(retrying, 10)
  }

  #[tokio::test]
  async fn full_success_returns_every_question() {
    let gen = ScriptedGenerator::new(vec![], Ok(question("q")));
    let out = orchestrator(gen.clone())
      .run(request(Topic::Rotations, Difficulty::Medium, 4))
      .await
      .expect("batch");
    assert_eq!(out.len(), 4);
    assert_eq!(gen.calls(), 4);
  }

  #[tokio::test]
  async fn one_terminal_failure_fails_the_batch() {
    let gen = ScriptedGenerator::new(
      vec![Ok(question("1")), Err(GenerationError::Parse("truncated".into())), Ok(question("3"))],
      Ok(question("spare")),
    );
    let err = orchestrator(gen.clone())
      .run(request(Topic::OddOneOut, Difficulty::Hard, 3))
      .await
      .unwrap_err();
    match err {
      BatchError::Generation { failure, .. } => assert_eq!(failure.attempts, 1),
      other => panic!("unexpected error: {other:?}"),
    }
    // Siblings were still asked (and answered); their questions are discarded.
    assert_eq!(gen.calls(), 3);
  }

  #[tokio::test]
  async fn orchestrated_results_follow_request_order() {
    let gen = StaggeredGenerator::new(Duration::from_millis(15), 3);
    let out = orchestrator(gen.clone())
      .run(GenerationRequest { topic: Topic::SeriesAndSequences, difficulty: Difficulty::Easy, count: 3 })
      .await
      .expect("batch");
    let prompts: Vec<&str> = out.iter().map(|q| q.prompt.as_str()).collect();
    assert_eq!(prompts, vec!["Question 0", "Question 1", "Question 2"]);
    assert_eq!(gen.completed.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn dropping_the_caller_leaves_generation_running() {
    let gen = StaggeredGenerator::new(Duration::from_millis(30), 3);
    let orch = orchestrator(gen.clone());
    let cut_short =
      tokio::time::timeout(Duration::from_millis(10), orch.run(request(Topic::Rotations, Difficulty::Easy, 3))).await;
    assert!(cut_short.is_err());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(gen.completed.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn rejects_out_of_range_counts() {
    let gen = ScriptedGenerator::new(vec![], Ok(question("q")));
    let orch = orchestrator(gen.clone());
    assert_eq!(
      orch.run(request(Topic::Analogies, Difficulty::Easy, 0)).await,
      Err(BatchError::InvalidCount { requested: 0, max: 10 })
    );
    assert!(orch.run(request(Topic::Analogies, Difficulty::Easy, 11)).await.is_err());
    assert_eq!(gen.calls(), 0);
  }

  type Boxed<T, E> = std::pin::Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

  #[tokio::test]
  async fn results_follow_request_order_not_completion_order() {
    let futures: Vec<Boxed<&'static str, ()>> = vec![
      Box::pin(async {
        tokio::time::sleep(Duration::from_millis(40)).await;
        Ok("first")
      }),
      Box::pin(async { Ok("second") }),
      Box::pin(async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok("third")
      }),
    ];
    let out = join_ordered(futures).await.expect("all succeed");
    assert_eq!(out, vec!["first", "second", "third"]);
  }

  #[tokio::test]
  async fn fan_out_reports_failing_index() {
    let futures: Vec<Boxed<u32, &'static str>> = vec![Box::pin(async { Ok(1) }), Box::pin(async { Err("boom") })];
    match join_ordered(futures).await {
      Err(FanOutError::Failed { index, error }) => {
        assert_eq!(index, 1);
        assert_eq!(error, "boom");
      }
      other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
  }
}
