// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Suite-level execution: the [`Suite`] owning every collaborator, the
//! [`FeatureRuntime`] orchestrating one feature and the [`ScenarioEngine`]
//! steps run against.

pub mod call;
mod engine;
pub mod feature;
pub mod hook;
pub(crate) mod scenario;

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use derive_more::with_trait::Debug;
use futures::{stream, StreamExt as _, TryStreamExt as _};
use gherkin::tagexpr::TagOperation;

pub(crate) use self::engine::RunScope;
pub use self::{
    call::CallContext,
    engine::ScenarioEngine,
    feature::{FeatureRuntime, Phase},
    hook::RuntimeHook,
};
use crate::{
    cache::{CallOnceCache, CallSingleCache, Memo},
    cli::Cli,
    config::Config,
    error::CallError,
    eval::Evaluator,
    feature::Feature,
    parser::{self, Parser as _},
    result::FeatureResult,
    scheduler::WorkerPool,
    step::StepDispatcher,
    transport::Transport,
    value::{CallSelector, FeatureRef, Vars},
};

/// Everything shared by the features of one test run: collaborators,
/// configuration, the worker pool, the abort flag and suite-wide caches.
///
/// Cloning is cheap and clones share the abort flag and the caches.
#[derive(Clone, Debug)]
pub struct Suite {
    #[debug(skip)]
    evaluator: Arc<dyn Evaluator>,

    #[debug(skip)]
    dispatcher: Arc<dyn StepDispatcher>,

    #[debug(skip)]
    transport: Option<Arc<dyn Transport>>,

    #[debug("{} hook(s)", hooks.len())]
    hooks: Vec<Arc<dyn RuntimeHook>>,

    config: Config,
    tags: Option<TagOperation>,
    pool: Option<WorkerPool>,
    abort_on_failure: bool,
    aborted: Arc<AtomicBool>,
    call_single: Arc<CallSingleCache>,
    call_once: Arc<CallOnceCache>,

    #[debug(skip)]
    features: Arc<Memo<Result<Arc<Feature>, CallError>>>,
}

impl Suite {
    /// Creates a new [`Suite`] evaluating expressions with the `evaluator`
    /// and running steps through the `dispatcher`.
    ///
    /// Runs sequentially until a pool is configured.
    #[must_use]
    pub fn new(
        evaluator: impl Evaluator + 'static,
        dispatcher: impl StepDispatcher + 'static,
    ) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
            dispatcher: Arc::new(dispatcher),
            transport: None,
            hooks: Vec::new(),
            config: Config::default(),
            tags: None,
            pool: None,
            abort_on_failure: false,
            aborted: Arc::default(),
            call_single: Arc::default(),
            call_once: Arc::default(),
            features: Arc::default(),
        }
    }

    /// Sets the [`Transport`] HTTP steps are sent through.
    #[must_use]
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Appends a [`RuntimeHook`]. Hooks are consulted in registration order.
    #[must_use]
    pub fn with_hook(mut self, hook: impl RuntimeHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Sets the [`Config`] every root run starts from.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the tag expression root runs filter scenarios by.
    #[must_use]
    pub fn with_tags(mut self, tags: impl Into<Option<TagOperation>>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Limits the number of concurrently running scenarios, or runs
    /// everything sequentially if [`None`].
    #[must_use]
    pub fn max_concurrent_scenarios(mut self, max: impl Into<Option<usize>>) -> Self {
        self.pool = max.into().map(WorkerPool::new);
        self
    }

    /// Stops starting new scenarios once any scenario failed.
    #[must_use]
    pub const fn abort_suite_on_failure(mut self, abort: bool) -> Self {
        self.abort_on_failure = abort;
        self
    }

    /// Applies the given [`Cli`] options.
    #[must_use]
    pub fn with_cli(mut self, cli: Cli) -> Self {
        let Cli {
            threads,
            tags,
            abort_suite_on_failure,
            call_single_cache_minutes,
            call_single_cache_dir,
            read_timeout,
        } = cli;

        if threads.is_some() {
            self = self.max_concurrent_scenarios(threads);
        }
        if tags.is_some() {
            self.tags = tags;
        }
        self.abort_on_failure |= abort_suite_on_failure;
        if let Some(minutes) = call_single_cache_minutes {
            self.config.call_single_cache_minutes = minutes;
        }
        if let Some(dir) = call_single_cache_dir {
            self.config.call_single_cache_dir = dir;
        }
        if let Some(timeout) = read_timeout {
            self.config.read_timeout = timeout;
        }
        self
    }

    /// [`Evaluator`] of this [`Suite`].
    #[must_use]
    pub fn evaluator(&self) -> &Arc<dyn Evaluator> {
        &self.evaluator
    }

    /// [`StepDispatcher`] of this [`Suite`].
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<dyn StepDispatcher> {
        &self.dispatcher
    }

    /// [`Transport`] of this [`Suite`], if any.
    #[must_use]
    pub fn transport(&self) -> Option<&Arc<dyn Transport>> {
        self.transport.as_ref()
    }

    /// Registered [`RuntimeHook`]s.
    #[must_use]
    pub fn hooks(&self) -> &[Arc<dyn RuntimeHook>] {
        &self.hooks
    }

    /// [`Config`] root runs start from.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Tag expression root runs filter by.
    #[must_use]
    pub const fn tags(&self) -> Option<&TagOperation> {
        self.tags.as_ref()
    }

    /// [`WorkerPool`] root runs schedule onto.
    #[must_use]
    pub const fn pool(&self) -> Option<&WorkerPool> {
        self.pool.as_ref()
    }

    /// Indicates whether a scenario failure aborts this [`Suite`].
    #[must_use]
    pub const fn aborts_on_failure(&self) -> bool {
        self.abort_on_failure
    }

    /// Indicates whether this [`Suite`] was aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Aborts this [`Suite`]: scenarios not started yet are skipped, running
    /// ones finish.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    /// Suite-wide `callSingle` cache.
    #[must_use]
    pub const fn call_single_cache(&self) -> &Arc<CallSingleCache> {
        &self.call_single
    }

    /// Suite-wide `callonce` cache, used when [`Config::shared_call_once`]
    /// is set.
    #[must_use]
    pub const fn call_once_cache(&self) -> &Arc<CallOnceCache> {
        &self.call_once
    }

    /// Runs the given `feature` as a root run with optional arguments.
    pub async fn run_feature(
        &self,
        feature: Arc<Feature>,
        args: Option<Vars>,
    ) -> FeatureResult {
        FeatureRuntime::root(self.clone(), feature, args).run().await
    }

    /// Runs the given `features`, at most as many at once as the pool has
    /// workers, and returns their results in the given order.
    pub async fn run<I>(&self, features: I) -> Vec<FeatureResult>
    where
        I: IntoIterator<Item = Arc<Feature>>,
    {
        let parallel = self.pool.as_ref().map_or(1, WorkerPool::size);
        stream::iter(features)
            .map(|f| self.run_feature(f, None))
            .buffered(parallel)
            .collect()
            .await
    }

    /// Parses every `.feature` file at the given `path` and runs them.
    ///
    /// # Errors
    ///
    /// If any feature can't be read or parsed. Nothing runs in that case.
    pub async fn run_path(
        &self,
        path: impl AsRef<Path>,
    ) -> parser::Result<Vec<FeatureResult>> {
        let features = parser::Basic::new()
            .parse(path.as_ref())
            .map_ok(Arc::new)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(self.run(features).await)
    }

    /// Loads the feature at `reference` (`path`, `path@tag`, `path:line`),
    /// resolved against `dir` unless prefixed with `classpath:`.
    ///
    /// Parsed features are cached by path for the whole [`Suite`].
    ///
    /// # Errors
    ///
    /// If the feature can't be read or parsed.
    pub async fn load_feature(
        &self,
        reference: &str,
        dir: Option<&Path>,
    ) -> Result<FeatureRef, CallError> {
        let (path, selector) = CallSelector::split(reference);
        let path = match path.strip_prefix("classpath:") {
            Some(rooted) => PathBuf::from(rooted),
            None => dir.map_or_else(|| PathBuf::from(path), |d| d.join(path)),
        };
        let key = path.display().to_string();

        let feature = self
            .features
            .get_or_compute(&key, async {
                tracing::debug!(path = %key, "loading feature");
                parser::Basic::new()
                    .parse_file(&path)
                    .await
                    .map(Arc::new)
                    .map_err(|e| CallError::load(&key, e.to_string()))
            })
            .await?;
        Ok(FeatureRef::new(feature).with_selector(selector))
    }

    /// Creates a standalone [`ScenarioEngine`] over the given `feature`, for
    /// running single steps with [`run_scenario_step()`].
    ///
    /// [`run_scenario_step()`]: crate::run_scenario_step
    #[must_use]
    pub fn engine(&self, feature: Arc<Feature>) -> ScenarioEngine {
        let scope = RunScope {
            suite: self.clone(),
            feature,
            call_once: Arc::default(),
            depth: 0,
        };
        ScenarioEngine::new(Arc::new(scope), Vars::new(), self.config.clone())
    }
}
