//! Bounded, order-preserving batch execution.
//!
//! The only place the pipeline runs work in parallel. Each unit is spawned on
//! the tokio runtime; at most `max_workers` are in flight, results come back
//! in submission order, and a failing or panicking unit turns into a
//! [`TaskFailure`] for its own slot without disturbing the others.

use std::future::Future;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EvalError, EvalResult};

/// Default pool width for model-bound stages.
pub const DEFAULT_MAX_WORKERS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum TaskFailure {
    /// The unit of work returned an error
    Failed(String),
    /// The unit of work panicked or was cancelled by the runtime
    Panicked(String),
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskFailure::Failed(msg) => write!(f, "task failed: {msg}"),
            TaskFailure::Panicked(msg) => write!(f, "task panicked: {msg}"),
        }
    }
}

pub type TaskOutcome<T> = Result<T, TaskFailure>;

#[derive(Debug, Clone, Copy)]
pub struct TaskRunner {
    max_workers: usize,
}

impl TaskRunner {
    pub fn new(max_workers: usize) -> EvalResult<Self> {
        if max_workers == 0 {
            return Err(EvalError::NoWorkers);
        }
        Ok(Self { max_workers })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run `work` once per argument bundle. Shared arguments are whatever the
    /// closure captures (typically `Arc`s); varying arguments are the items.
    pub async fn run<A, T, F, Fut>(&self, items: Vec<A>, work: F) -> Vec<TaskOutcome<T>>
    where
        A: Send + 'static,
        T: Send + 'static,
        F: Fn(A) -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let total = items.len();
        info!(total, max_workers = self.max_workers, "Dispatching batch");

        let outcomes: Vec<TaskOutcome<T>> = stream::iter(items.into_iter().enumerate().map(
            |(index, item)| {
                let unit = work(item);
                async move {
                    match tokio::spawn(unit).await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(e)) => {
                            warn!(index, error = %e, "Task failed");
                            Err(TaskFailure::Failed(format!("{e:#}")))
                        }
                        Err(join_err) => {
                            warn!(index, error = %join_err, "Task panicked");
                            Err(TaskFailure::Panicked(join_err.to_string()))
                        }
                    }
                }
            },
        ))
        .buffered(self.max_workers)
        .collect()
        .await;

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        info!(total, failed, "Batch complete");
        outcomes
    }
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// Zip two varying argument sequences into per-item bundles.
/// A length mismatch is a configuration error, raised before anything runs.
///
/// Current stages hand [`TaskRunner::run`] one record per item, so they never
/// need this; it is the entry point for stages with two varying inputs.
#[cfg_attr(not(test), allow(dead_code))]
pub(crate) fn bundle_args<A, B>(left: Vec<A>, right: Vec<B>) -> EvalResult<Vec<(A, B)>> {
    if left.len() != right.len() {
        return Err(EvalError::ArgumentLengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }
    Ok(left.into_iter().zip(right).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn preserves_submission_order() {
        let runner = TaskRunner::new(3).unwrap();
        // Earlier items sleep longer, so they finish last.
        let outcomes = runner
            .run((0..6u64).collect(), |i| async move {
                tokio::time::sleep(Duration::from_millis(30 - i * 5)).await;
                Ok(i * 10)
            })
            .await;
        let values: Vec<u64> = outcomes.into_iter().map(|o| o.unwrap()).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40, 50]);
    }

    #[tokio::test]
    async fn failures_stay_in_their_slot() {
        let runner = TaskRunner::default();
        let outcomes = runner
            .run(vec![1, 2, 3], |i| async move {
                if i == 2 {
                    anyhow::bail!("bad item {i}");
                }
                Ok(i)
            })
            .await;
        assert_eq!(outcomes[0], Ok(1));
        assert_eq!(outcomes[1], Err(TaskFailure::Failed("bad item 2".into())));
        assert_eq!(outcomes[2], Ok(3));
    }

    #[tokio::test]
    async fn panics_are_captured() {
        let runner = TaskRunner::default();
        let outcomes = runner
            .run(vec![true, false], |boom| async move {
                if boom {
                    panic!("boom");
                }
                Ok(())
            })
            .await;
        assert!(matches!(outcomes[0], Err(TaskFailure::Panicked(_))));
        assert_eq!(outcomes[1], Ok(()));
    }

    #[tokio::test]
    async fn never_exceeds_worker_bound() {
        let runner = TaskRunner::new(2).unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let outcomes = runner
            .run((0..8).collect::<Vec<u32>>(), |_| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert_eq!(outcomes.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(TaskRunner::new(0), Err(EvalError::NoWorkers)));
    }

    #[test]
    fn bundle_args_rejects_length_mismatch() {
        let err = bundle_args(vec![1, 2], vec!["a"]).unwrap_err();
        assert!(matches!(
            err,
            EvalError::ArgumentLengthMismatch { left: 2, right: 1 }
        ));
        assert_eq!(
            bundle_args(vec![1, 2], vec!["a", "b"]).unwrap(),
            vec![(1, "a"), (2, "b")]
        );
    }
}
