// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Memoization of nested calls (`callonce` and `callSingle`).
//!
//! Both caches share the same locking discipline, implemented by [`Memo`]:
//! an unlocked fast-path read, then a per-key async gate under which the
//! value is re-checked before being computed and stored. Failed
//! computations are stored too, so every caller of a key observes the same
//! outcome.

use std::{
    collections::HashMap,
    future::Future,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::{Duration, Instant, SystemTime},
};

use derive_more::with_trait::Debug;
use tokio::sync::Mutex as AsyncMutex;

use crate::{
    config::Config,
    error::CallError,
    value::{Variable, Vars},
};

/// At-most-once memo of values keyed by string.
#[derive(Debug)]
pub struct Memo<T> {
    #[debug("{} value(s)", values.read().map_or(0, |v| v.len()))]
    values: RwLock<HashMap<String, T>>,

    #[debug(skip)]
    gates: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

// Implemented manually to omit redundant `T: Default` trait bound, imposed by
// `#[derive(Default)]`.
impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self { values: RwLock::default(), gates: Mutex::default() }
    }
}

impl<T: Clone> Memo<T> {
    /// Creates a new empty [`Memo`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored value of `key`, without waiting for a computation
    /// in progress.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<T> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Indicates whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the value of `key`, awaiting the `compute` future only if no
    /// value is stored yet.
    ///
    /// Concurrent callers of the same `key` block until the first one stored
    /// its value, then observe it: `compute` runs at most once per `key`.
    /// Unused `compute` futures are dropped without being polled.
    pub async fn get_or_compute<F>(&self, key: &str, compute: F) -> T
    where
        F: Future<Output = T>,
    {
        if let Some(hit) = self.get(key) {
            tracing::trace!(key, "cache hit");
            return hit;
        }

        let gate = Arc::clone(
            self.gates
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key.to_owned())
                .or_default(),
        );
        let started = Instant::now();
        let _guard = gate.lock().await;

        if let Some(hit) = self.get(key) {
            tracing::warn!(
                key,
                "waited {}ms for a value computed by another caller",
                started.elapsed().as_millis(),
            );
            return hit;
        }

        tracing::debug!(key, "cache miss, computing");
        let value = compute.await;
        _ = self
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.clone());
        _ = self
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);

        value
    }
}

/// Snapshot stored by `callonce`.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    /// Returned value.
    pub value: Variable,

    /// Config right after the call.
    pub config: Config,

    /// Variables right after a shared-scope call.
    pub vars: Option<Vars>,
}

/// `callonce` cache, scoped to one root run (or the whole suite in shared
/// loop-test-run mode).
pub type CallOnceCache = Memo<Result<Arc<CacheEntry>, CallError>>;

/// Suite-wide `callSingle` cache, optionally backed by files.
#[derive(Debug, Default)]
pub struct CallSingleCache {
    memo: Memo<Result<Variable, CallError>>,
}

impl CallSingleCache {
    /// Creates a new empty [`CallSingleCache`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the in-memory value of `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Result<Variable, CallError>> {
        self.memo.get(key)
    }

    /// Returns the value of `key`, computing it at most once per suite.
    ///
    /// With a positive [`Config::call_single_cache_minutes`] a fresh file
    /// under [`Config::call_single_cache_dir`] is reused instead of
    /// computing, and a successful map or list result is written back.
    pub async fn get_or_compute<F>(
        &self,
        key: &str,
        config: &Config,
        compute: F,
    ) -> Result<Variable, CallError>
    where
        F: Future<Output = Result<Variable, CallError>>,
    {
        let minutes = config.call_single_cache_minutes;
        let file = (minutes > 0)
            .then(|| cache_file(&config.call_single_cache_dir, key));

        self.memo
            .get_or_compute(key, async move {
                if let Some(file) = &file {
                    if let Some(cached) = read_fresh(file, minutes).await {
                        tracing::info!(
                            key,
                            file = %file.display(),
                            "callSingle cache hit",
                        );
                        return Ok(cached);
                    }
                }
                let result = compute.await;
                if let (Some(file), Ok(value)) = (&file, &result) {
                    persist(key, file, value).await;
                }
                result
            })
            .await
    }
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
#[must_use]
pub fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File a `callSingle` result of `key` is persisted to.
#[must_use]
pub fn cache_file(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.txt", sanitize(key)))
}

/// Indicates whether a file last modified at `modified` is still within the
/// time-to-live of `minutes` at `now`.
#[must_use]
pub fn is_fresh(modified: SystemTime, minutes: u64, now: SystemTime) -> bool {
    let ttl = Duration::from_secs(minutes.saturating_mul(60));
    now.duration_since(modified).map_or(true, |age| age < ttl)
}

async fn read_fresh(file: &Path, minutes: u64) -> Option<Variable> {
    let modified = tokio::fs::metadata(file).await.ok()?.modified().ok()?;
    if !is_fresh(modified, minutes, SystemTime::now()) {
        tracing::info!(file = %file.display(), "callSingle cache stale");
        return None;
    }
    let text = tokio::fs::read_to_string(file).await.ok()?;
    match serde_json::from_str(&text) {
        Ok(json) => Some(Variable::Json(json)),
        Err(e) => {
            tracing::warn!(
                file = %file.display(),
                "ignoring unreadable callSingle cache: {e}",
            );
            None
        }
    }
}

async fn persist(key: &str, file: &Path, value: &Variable) {
    let Some(json) = value.as_json().filter(|_| value.is_json_like()) else {
        tracing::warn!(
            key,
            "callSingle result is not a map or list, not persisting: {value}",
        );
        return;
    };

    let written = async {
        if let Some(dir) = file.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(file, json.to_string()).await
    };
    match written.await {
        Ok(()) => tracing::info!(key, file = %file.display(), "callSingle cache written"),
        Err(e) => tracing::warn!(
            key,
            file = %file.display(),
            "failed to persist callSingle result: {e}",
        ),
    }
}
