//! Run candidate probes in parallel but pick the winner by priority.
//!
//! # Overview
//!
//! Candidates are ordered most specific first. All probes start at once
//! (bounded by `max_in_flight`), yet the result is the same as trying them
//! one after another: operation *i* only wins once every operation before
//! it has failed. As soon as the winner is known the remaining futures are
//! dropped.

use std::fmt;

use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use thiserror::Error;
use tracing::{debug, trace};

/// Separator between failure messages in [`ProbeError::AllFailed`].
pub const FAILURE_SEPARATOR: &str = "; ";

/// Errors returned by [`PrioritizedProber::run`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The operation list was empty.
    #[error("no candidates to probe")]
    NoCandidates,

    /// Every operation failed; messages are in priority order.
    #[error("all candidates failed: {}", failures.join(FAILURE_SEPARATOR))]
    AllFailed {
        /// One message per operation.
        failures: Vec<String>,
    },
}

/// Priority-ordered parallel runner.
#[derive(Debug, Clone, Copy)]
pub struct PrioritizedProber {
    max_in_flight: usize,
}

impl Default for PrioritizedProber {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl PrioritizedProber {
    /// Creates a prober that runs at most `max_in_flight` operations concurrently.
    #[must_use]
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Runs `ops` and returns the result of the highest-priority success.
    ///
    /// # Errors
    ///
    /// [`ProbeError::NoCandidates`] for an empty list, otherwise
    /// [`ProbeError::AllFailed`] with every failure in list order.
    pub async fn run<'a, T, E>(&self, ops: Vec<BoxFuture<'a, Result<T, E>>>) -> Result<T, ProbeError>
    where
        T: Send + 'a,
        E: fmt::Display + Send + 'a,
    {
        let total = ops.len();
        if total == 0 {
            return Err(ProbeError::NoCandidates);
        }

        // One tagging closure so every pushed future has the same type.
        let tag = |(index, op): (usize, BoxFuture<'a, Result<T, E>>)| {
            op.map(move |result| (index, result))
        };
        let mut queued = ops.into_iter().enumerate();
        let mut running = FuturesUnordered::new();
        for item in queued.by_ref().take(self.max_in_flight) {
            running.push(tag(item));
        }

        let mut outcomes: Vec<Option<Result<T, String>>> = (0..total).map(|_| None).collect();
        let mut failures = Vec::with_capacity(total);
        let mut next = 0;

        while let Some((index, result)) = running.next().await {
            trace!(index, ok = result.is_ok(), "probe finished");
            outcomes[index] = Some(result.map_err(|e| e.to_string()));

            while next < total {
                match outcomes[next].take() {
                    Some(Ok(value)) => {
                        debug!(winner = next, abandoned = running.len(), "probe winner chosen");
                        return Ok(value);
                    }
                    Some(Err(message)) => {
                        failures.push(message);
                        next += 1;
                    }
                    None => break,
                }
            }

            if let Some(item) = queued.next() {
                running.push(tag(item));
            }
        }

        Err(ProbeError::AllFailed { failures })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    fn op(
        delay_ms: u64,
        outcome: Result<&'static str, &'static str>,
    ) -> BoxFuture<'static, Result<&'static str, &'static str>> {
        async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            outcome
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_empty_list_is_no_candidates() {
        let ops: Vec<BoxFuture<'static, Result<(), String>>> = Vec::new();
        let result = PrioritizedProber::default().run(ops).await;
        assert_eq!(result, Err(ProbeError::NoCandidates));
    }

    #[tokio::test]
    async fn test_higher_priority_wins_even_when_slower() {
        let ops = vec![op(60, Ok("first")), op(0, Ok("second"))];
        assert_eq!(PrioritizedProber::default().run(ops).await, Ok("first"));
    }

    #[tokio::test]
    async fn test_lower_priority_wins_after_higher_fail() {
        let ops = vec![op(40, Err("a down")), op(0, Err("b down")), op(10, Ok("third"))];
        assert_eq!(PrioritizedProber::default().run(ops).await, Ok("third"));
    }

    #[tokio::test]
    async fn test_all_failed_lists_failures_in_priority_order() {
        let ops = vec![op(30, Err("a")), op(0, Err("b")), op(10, Err("c"))];
        let error = PrioritizedProber::default().run(ops).await.unwrap_err();
        assert_eq!(
            error,
            ProbeError::AllFailed {
                failures: vec!["a".to_string(), "b".to_string(), "c".to_string()]
            }
        );
        assert_eq!(error.to_string(), "all candidates failed: a; b; c");
    }

    #[tokio::test]
    async fn test_max_in_flight_bounds_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let ops: Vec<BoxFuture<'static, Result<(), String>>> = (0..6)
            .map(|_| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Err("down".to_string())
                }
                .boxed()
            })
            .collect();

        let result = PrioritizedProber::new(2).run(ops).await;
        assert!(matches!(result, Err(ProbeError::AllFailed { ref failures }) if failures.len() == 6));
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_single_slot_refills_until_a_success() {
        let ops = vec![op(5, Err("a")), op(0, Err("b")), op(5, Ok("third")), op(0, Ok("fourth"))];
        assert_eq!(PrioritizedProber::new(1).run(ops).await, Ok("third"));
    }

    #[tokio::test]
    async fn test_winner_drops_pending_operations() {
        let finished = Arc::new(AtomicUsize::new(0));
        let slow = {
            let finished = Arc::clone(&finished);
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>("slow")
            }
            .boxed()
        };
        let fast = async { Ok::<_, String>("fast") }.boxed();

        assert_eq!(PrioritizedProber::default().run(vec![fast, slow]).await, Ok("fast"));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
