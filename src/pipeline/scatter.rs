//! Scatter/gather over a fixed batch of independent tasks.
//!
//! Each item gets a pre-allocated result slot at its submission index. Tasks
//! run at most `concurrency` at a time and may finish in any order; the
//! gathering loop writes each result into its own slot and returns only once
//! every task has finished. Per-item failure must be carried inside `R`, so
//! nothing short-circuits the barrier.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Run `task(index, item)` for every item and return results in item order.
///
/// `on_complete(index, &result)` is called from the gathering loop, once per
/// item, in completion order. Calls are never concurrent with each other.
pub async fn scatter_gather<T, R, F, Fut, C>(
    items: Vec<T>,
    concurrency: usize,
    task: F,
    mut on_complete: C,
) -> Vec<R>
where
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = R>,
    C: FnMut(usize, &R),
{
    let total = items.len();
    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();

    let mut completions = stream::iter(items.into_iter().enumerate().map(|(index, item)| {
        let fut = task(index, item);
        async move { (index, fut.await) }
    }))
    .buffer_unordered(concurrency.max(1));

    while let Some((index, result)) = completions.next().await {
        on_complete(index, &result);
        slots[index] = Some(result);
    }

    // buffer_unordered yields every submitted future exactly once, so every
    // slot is filled here.
    let results: Vec<R> = slots.into_iter().flatten().collect();
    debug_assert_eq!(results.len(), total);
    results
}
