// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Bounded-concurrency work processing with per-item ordering policy.

use std::{
    any::Any,
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    pin::pin,
    sync::Arc,
};

use futures::{FutureExt as _, Stream, StreamExt as _};
use tokio::{sync::Semaphore, task::JoinHandle};

/// Cloneable handle to a bounded pool of workers.
///
/// Every running item holds one permit of the pool's [`Semaphore`], so at
/// most [`WorkerPool::size()`] items run at once across every
/// [`WorkScheduler`] sharing this pool.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Creates a new [`WorkerPool`] of the given `size` (at least `1`).
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self { permits: Arc::new(Semaphore::new(size)), size }
    }

    /// Maximum number of concurrently running items.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Number of currently idle workers.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }

    /// Spawns the given `task`, starting it once a worker is idle.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            // The semaphore is never closed, so this is always a permit.
            let _permit = permits.acquire_owned().await.ok();
            task.await
        })
    }
}

/// Processor of an ordered sequence of work items.
///
/// Without a [`WorkerPool`] every item runs inline, in publication order.
#[derive(Clone, Debug, Default)]
pub struct WorkScheduler {
    pool: Option<WorkerPool>,
}

impl WorkScheduler {
    /// Creates a new [`WorkScheduler`] submitting to the given `pool`.
    #[must_use]
    pub const fn new(pool: Option<WorkerPool>) -> Self {
        Self { pool }
    }

    /// Indicates whether items may run concurrently.
    #[must_use]
    pub const fn is_concurrent(&self) -> bool {
        self.pool.is_some()
    }

    /// Processes every item of the `items` [`Stream`] and returns the
    /// output of `on_complete`.
    ///
    /// An item for which `should_run_synchronously` holds is processed only
    /// after the immediately preceding item's `process` finished. Other
    /// items are spawned onto the pool as soon as they are published.
    ///
    /// Errors and panics of `process` are logged and never stop sibling
    /// items. `on_complete` is called exactly once, after every `process`
    /// finished.
    pub async fn execute<S, Q, P, Fut, E, C, R>(
        &self,
        items: S,
        mut should_run_synchronously: Q,
        mut process: P,
        on_complete: C,
    ) -> R
    where
        S: Stream,
        Q: FnMut(&S::Item) -> bool,
        P: FnMut(S::Item) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
        C: FnOnce() -> R,
    {
        let mut items = pin!(items);
        let mut in_flight = Vec::<(usize, JoinHandle<Result<(), E>>)>::new();
        let mut previous_in_flight = false;
        let mut index = 0;

        while let Some(item) = items.next().await {
            let pool = self
                .pool
                .as_ref()
                .filter(|_| !should_run_synchronously(&item));

            if let Some(pool) = pool {
                in_flight.push((index, pool.spawn(process(item))));
                previous_in_flight = true;
            } else {
                if previous_in_flight {
                    if let Some((prev, handle)) = in_flight.pop() {
                        report(prev, joined(handle.await));
                    }
                    previous_in_flight = false;
                }
                let outcome = AssertUnwindSafe(process(item))
                    .catch_unwind()
                    .await
                    .map_err(|e| panic_message(&*e));
                report(index, outcome);
            }
            index += 1;
        }

        for (i, handle) in in_flight {
            report(i, joined(handle.await));
        }
        tracing::trace!(items = index, "all work items completed");

        on_complete()
    }
}

fn joined<T>(res: Result<T, tokio::task::JoinError>) -> Result<T, String> {
    res.map_err(|e| {
        if e.is_panic() {
            panic_message(&*e.into_panic())
        } else {
            "cancelled".to_owned()
        }
    })
}

fn report<E: fmt::Display>(index: usize, outcome: Result<Result<(), E>, String>) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(item = index, "work item failed: {e}"),
        Err(panic) => {
            tracing::error!(item = index, "work item panicked: {panic}");
        }
    }
}

/// Extracts a human-readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| (*s).to_owned()))
        .unwrap_or_else(|| "unknown panic".to_owned())
}
