//! Fan-in join over independent asynchronous sub-operations.
//!
//! # Responsibility
//! - Drive N futures concurrently on the caller's task and join them once.
//!
//! # Invariants
//! - Resolves exactly once, after every operation has finished.
//! - Success yields results in input order, whatever the completion order.
//! - Failure yields the first error observed in completion order; siblings
//!   still run to completion and their results are discarded.

use futures::stream::{FuturesUnordered, StreamExt};
use log::debug;
use std::future::Future;

/// Joins `operations`, returning every result or the first observed failure.
pub async fn fan_in<T, E, F>(operations: impl IntoIterator<Item = F>) -> Result<Vec<T>, E>
where
    F: Future<Output = Result<T, E>>,
{
    let mut pending: FuturesUnordered<_> = operations
        .into_iter()
        .enumerate()
        .map(|(index, operation)| async move { (index, operation.await) })
        .collect();

    let total = pending.len();
    let mut results: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
    let mut first_failure: Option<E> = None;
    let mut failures = 0usize;

    while let Some((index, outcome)) = pending.next().await {
        match outcome {
            Ok(value) => results[index] = Some(value),
            Err(err) => {
                failures += 1;
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
        }
    }

    if let Some(err) = first_failure {
        debug!(
            "event=fan_in module=engine status=error operations={} failures={}",
            total, failures
        );
        return Err(err);
    }

    Ok(results.into_iter().flatten().collect())
}

/// Joins boolean checks into one conjunction.
///
/// An empty set of checks is vacuously `true`; callers that need a non-empty
/// collection check that themselves.
pub async fn fan_in_all<E, F>(checks: impl IntoIterator<Item = F>) -> Result<bool, E>
where
    F: Future<Output = Result<bool, E>>,
{
    let results = fan_in(checks).await?;
    Ok(results.into_iter().all(|value| value))
}

#[cfg(test)]
mod tests {
    use super::{fan_in, fan_in_all};
    use futures::channel::oneshot;
    use futures::future::{ready, BoxFuture, FutureExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn results_keep_input_order_when_completion_order_differs() {
        let (first_tx, first_rx) = oneshot::channel::<u32>();
        let (second_tx, second_rx) = oneshot::channel::<u32>();

        let operations: Vec<BoxFuture<'static, Result<u32, String>>> = vec![
            async move { first_rx.await.map_err(|err| err.to_string()) }.boxed(),
            async move {
                let value = second_rx.await.map_err(|err| err.to_string())?;
                // First operation can only finish after this one has run.
                first_tx.send(1).map_err(|_| "first receiver dropped".to_string())?;
                Ok(value)
            }
            .boxed(),
        ];
        second_tx.send(2).unwrap();

        assert_eq!(fan_in(operations).await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn failure_does_not_cancel_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let operations: Vec<BoxFuture<'static, Result<(), &'static str>>> = (0..4)
            .map(|index| {
                let finished = Arc::clone(&finished);
                async move {
                    tokio::task::yield_now().await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    if index == 1 {
                        Err("boom")
                    } else {
                        Ok(())
                    }
                }
                .boxed()
            })
            .collect();

        assert_eq!(fan_in(operations).await, Err("boom"));
        assert_eq!(finished.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn empty_fan_in_resolves_immediately() {
        let operations: Vec<futures::future::Ready<Result<u8, ()>>> = Vec::new();
        assert!(fan_in(operations).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fan_in_all_is_a_conjunction() {
        let checks = vec![ready(Ok::<_, ()>(true)), ready(Ok(false))];
        assert!(!fan_in_all(checks).await.unwrap());
        let checks = vec![ready(Ok::<_, ()>(true)), ready(Ok(true))];
        assert!(fan_in_all(checks).await.unwrap());
    }
}
