//! Bounded fan-out over a homogeneous batch.

use std::future::Future;

use futures::stream::{self, StreamExt};

/// Run `task` over every item with at most `limit` in flight.
///
/// Completion order is unspecified. Every item runs to completion: a task
/// that returns an error does not cancel its siblings, so callers fold the
/// returned outcomes into a report.
pub async fn run_batch<T, R, F, Fut>(items: impl IntoIterator<Item = T>, limit: usize, task: F) -> Vec<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items)
        .map(task)
        .buffer_unordered(limit.max(1))
        .collect()
        .await
}
