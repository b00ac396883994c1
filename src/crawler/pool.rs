//! Bounded worker pool
//!
//! Every item becomes a task on a `JoinSet`; a semaphore sized from the
//! configured `Concurrency` keeps at most that many running at once. The
//! semaphore hands out permits in FIFO order, so a sequential pool runs the
//! items in submission order.

use crate::config::Concurrency;
use crate::SweepError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs `work` over every item and collects the results in completion order
///
/// Failures of individual units are part of `R`. Only a worker that panics
/// (or is cancelled) fails the whole pool.
pub async fn run_pool<T, R, F, Fut>(
    concurrency: Concurrency,
    items: Vec<T>,
    work: F,
) -> Result<Vec<R>, SweepError>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let workers = concurrency.workers();
    let semaphore = Arc::new(Semaphore::new(workers));
    let work = Arc::new(work);
    let mut tasks = JoinSet::new();

    tracing::debug!("Starting pool of {} workers for {} items", workers, items.len());

    let total = items.len();
    for item in items {
        let semaphore = Arc::clone(&semaphore);
        let work = Arc::clone(&work);
        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| SweepError::Worker(e.to_string()))?;
            Ok::<_, SweepError>(work(item).await)
        });
    }

    let mut results = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(result)) => results.push(result),
            Ok(Err(e)) => return Err(e),
            Err(e) => return Err(SweepError::Worker(e.to_string())),
        }
    }

    Ok(results)
}
