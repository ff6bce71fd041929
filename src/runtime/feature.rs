// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Orchestration of one [`Feature`] run.

use std::{
    convert::Infallible,
    mem,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use derive_more::with_trait::{Debug, Display};
use futures::{
    future,
    stream::{self, BoxStream, Stream, StreamExt as _},
};
use gherkin::tagexpr::TagOperation;
use once_cell::sync::OnceCell;

use super::{
    call::CallContext,
    scenario::{run_background, ScenarioRuntime, Seed},
    RunScope, Suite,
};
use crate::{
    cache::CallOnceCache,
    config::Config,
    eval,
    expander::{Expanded, ScenarioExpander},
    feature::{Feature, Scenario, Section},
    result::{FeatureResult, ScenarioResult},
    scheduler::{WorkScheduler, WorkerPool},
    value::{CallSelector, Vars},
};

/// Lifecycle phase of a [`FeatureRuntime`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Phase {
    /// Created, nothing ran yet.
    #[display("init")]
    Init,

    /// Scenarios are being scheduled.
    #[display("running")]
    Running,

    /// Every scenario finished and the result is assembled.
    #[display("complete")]
    Complete,
}

/// Scenarios of a [`Feature`] a run executes.
#[derive(Clone, Debug)]
enum Selection {
    /// Root run: tag expression, `@ignore` excluded.
    Tags(Option<TagOperation>),

    /// Called run: everything, or what the call selects.
    Called(Option<CallSelector>),
}

/// Scheduled work item.
#[derive(Debug)]
enum Unit {
    /// Scenario to run, optionally starting from a background state.
    Run { scenario: Scenario, seed: Option<Seed> },

    /// Already finished result, like a failed dynamic expansion.
    Done(ScenarioResult),
}

#[derive(Debug, Default)]
struct Progress {
    results: Vec<ScenarioResult>,
    last: Option<(Vars, Config)>,
}

#[derive(Debug)]
struct Inner {
    suite: Suite,
    scope: Arc<RunScope>,
    call: CallContext,
    selection: Selection,
    pool: Option<WorkerPool>,
    phase: Mutex<Phase>,
    progress: Mutex<Progress>,

    /// Result of the before-feature hooks, run on the first eligible unit.
    started: OnceCell<bool>,
}

/// Runs the scenarios of one [`Feature`] through a [`WorkScheduler`] and
/// assembles its [`FeatureResult`].
#[derive(Clone, Debug)]
pub struct FeatureRuntime {
    inner: Arc<Inner>,
}

impl FeatureRuntime {
    /// Creates a root [`FeatureRuntime`], filtering scenarios by the suite's
    /// tag expression and scheduling them onto the suite's pool.
    #[must_use]
    pub fn root(suite: Suite, feature: Arc<Feature>, args: Option<Vars>) -> Self {
        let config = suite.config().clone();
        let call_once = if config.shared_call_once {
            Arc::clone(suite.call_once_cache())
        } else {
            Arc::default()
        };
        let selection = Selection::Tags(suite.tags().cloned());
        let pool = suite.pool().cloned();
        Self::new(
            suite,
            feature,
            CallContext::root(args, config),
            call_once,
            selection,
            pool,
        )
    }

    /// Creates a [`FeatureRuntime`] of a nested call. Its scenarios always
    /// run sequentially.
    pub(crate) fn called(
        suite: Suite,
        feature: Arc<Feature>,
        call: CallContext,
        call_once: Arc<CallOnceCache>,
    ) -> Self {
        let selection = Selection::Called(call.selector.clone());
        Self::new(suite, feature, call, call_once, selection, None)
    }

    fn new(
        suite: Suite,
        feature: Arc<Feature>,
        call: CallContext,
        call_once: Arc<CallOnceCache>,
        selection: Selection,
        pool: Option<WorkerPool>,
    ) -> Self {
        let scope = Arc::new(RunScope {
            suite: suite.clone(),
            feature,
            call_once,
            depth: call.depth,
        });
        Self {
            inner: Arc::new(Inner {
                suite,
                scope,
                call,
                selection,
                pool,
                phase: Mutex::new(Phase::Init),
                progress: Mutex::default(),
                started: OnceCell::new(),
            }),
        }
    }

    /// [`Feature`] being run.
    #[must_use]
    pub fn feature(&self) -> &Arc<Feature> {
        &self.inner.scope.feature
    }

    /// Current [`Phase`].
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.inner.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs every selected scenario and returns the [`FeatureResult`] with
    /// scenario results in declaration order.
    pub async fn run(&self) -> FeatureResult {
        let started = Instant::now();
        self.inner.set_phase(Phase::Running);

        let inner = Arc::clone(&self.inner);
        let feature = Arc::clone(self.feature());
        let scheduler = WorkScheduler::new(self.inner.pool.clone());
        let mut result = scheduler
            .execute(
                self.units(),
                move |unit| match unit {
                    Unit::Run { scenario, .. } => {
                        scenario.effective_tags(&feature).is_parallel_disabled()
                    }
                    Unit::Done(_) => true,
                },
                move |unit| Arc::clone(&inner).process(unit),
                || self.inner.finish(),
            )
            .await;
        result.duration = started.elapsed();

        if !result.is_empty() {
            self.inner.after_feature(&result);
        }
        self.inner.set_phase(Phase::Complete);
        result
    }

    /// Lazily produced units: sections in declaration order, dynamic
    /// outlines expanded only once the scheduler reaches them.
    fn units(&self) -> impl Stream<Item = Unit> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        let scenarios = self
            .feature()
            .sections
            .iter()
            .flat_map(Section::scenarios)
            .collect::<Vec<_>>();

        let vetoed = Arc::clone(&inner);
        stream::iter(scenarios)
            .flat_map(move |scenario| -> BoxStream<'static, Unit> {
                if scenario.is_dynamic() {
                    Arc::clone(&inner).dynamic_units(scenario).boxed()
                } else {
                    stream::once(future::ready(Unit::Run { scenario, seed: None }))
                        .boxed()
                }
            })
            .take_while(move |_| future::ready(vetoed.started.get() != Some(&false)))
    }
}

impl Inner {
    fn set_phase(&self, phase: Phase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
        tracing::debug!(
            feature = %self.scope.feature.display_name(),
            depth = self.call.depth,
            "feature {phase}",
        );
    }

    /// Runs the before-feature hooks on first demand, returning whether the
    /// feature may proceed.
    fn ensure_started(&self) -> bool {
        *self.started.get_or_init(|| {
            let feature = &self.scope.feature;
            let proceed = self.suite.hooks().iter().all(|h| h.before_feature(feature));
            if !proceed {
                tracing::info!(
                    feature = %feature.display_name(),
                    "feature vetoed by hook",
                );
            }
            proceed
        })
    }

    fn selects(&self, scenario: &Scenario) -> bool {
        let feature = &self.scope.feature;
        match &self.selection {
            Selection::Tags(op) => scenario.effective_tags(feature).evaluate(op.as_ref()),
            Selection::Called(None) => true,
            Selection::Called(Some(CallSelector::Tag(tag))) => {
                scenario.effective_tags(feature).contains(tag)
            }
            Selection::Called(Some(CallSelector::Line(line))) => {
                scenario.line == *line
                    || feature
                        .sections
                        .get(scenario.section_index)
                        .is_some_and(|s| s.line() == *line)
            }
        }
    }

    /// Checks whether a unit of `scenario` may start at all.
    fn admits(&self, scenario: &Scenario) -> bool {
        if !self.selects(scenario) {
            tracing::trace!(scenario = %scenario.display_meta(), "not selected");
            return false;
        }
        if self.suite.is_aborted() {
            tracing::debug!(scenario = %scenario.display_meta(), "suite aborted, skipping");
            return false;
        }
        self.ensure_started()
    }

    fn seed(&self) -> Seed {
        Seed {
            vars: self.call.scenario_vars(),
            config: self.call.config.clone(),
            with_background: true,
        }
    }

    /// Runs the background of a dynamic outline, then expands it over the
    /// resulting bindings.
    fn dynamic_units(self: Arc<Self>, template: Scenario) -> impl Stream<Item = Unit> {
        stream::once(async move {
            if !self.admits(&template) {
                return stream::empty().boxed();
            }

            let Seed { vars, config, .. } = self.seed();
            match run_background(Arc::clone(&self.scope), &template, vars, config).await
            {
                Err(failed) => stream::once(future::ready(Unit::Done(failed))).boxed(),
                Ok((vars, config)) => {
                    let feature = Arc::clone(&self.scope.feature);
                    let evaluator = Arc::clone(self.suite.evaluator());
                    let expander =
                        ScenarioExpander::new(template, evaluator, vars.clone());
                    stream::iter(expander.map(move |expanded| match expanded {
                        Expanded::Scenario(scenario) => Unit::Run {
                            scenario,
                            seed: Some(Seed {
                                vars: vars.clone(),
                                config: config.clone(),
                                with_background: false,
                            }),
                        },
                        Expanded::Failed { scenario, error } => Unit::Done(
                            ScenarioResult::failed(&feature, scenario, error.into()),
                        ),
                    }))
                    .boxed()
                }
            }
        })
        .flatten()
    }

    async fn process(self: Arc<Self>, unit: Unit) -> Result<(), Infallible> {
        match unit {
            Unit::Done(result) => self.record(result, None),
            Unit::Run { scenario, seed } => {
                if !self.admits(&scenario) {
                    return Ok(());
                }
                let seed = seed.unwrap_or_else(|| self.seed());
                let runtime = ScenarioRuntime::new(Arc::clone(&self.scope), scenario, seed);
                if let Some((result, engine)) = runtime.run().await {
                    self.record(result, Some(engine.into_parts()));
                }
            }
        }
        Ok(())
    }

    fn record(&self, result: ScenarioResult, state: Option<(Vars, Config)>) {
        if result.is_failed() && self.suite.aborts_on_failure() {
            tracing::warn!(
                scenario = %result.scenario.display_meta(),
                "scenario failed, aborting suite",
            );
            self.suite.abort();
        }
        let mut progress = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
        progress.results.push(result);
        if state.is_some() {
            progress.last = state;
        }
    }

    fn finish(&self) -> FeatureResult {
        let progress =
            mem::take(&mut *self.progress.lock().unwrap_or_else(PoisonError::into_inner));
        let (variables, config) = progress
            .last
            .unwrap_or_else(|| (self.call.vars.clone(), self.call.config.clone()));
        let feature = &self.scope.feature;

        let mut result = FeatureResult {
            feature: feature.display_name(),
            path: feature.path.clone(),
            scenarios: progress.results,
            variables,
            config,
            call_arg: self.call.arg.clone(),
            loop_index: self.call.loop_index,
            call_depth: self.call.depth,
            ..FeatureResult::default()
        };
        result.sort();
        result
    }

    /// Invokes [`Config::after_feature`] and the after-feature hooks.
    fn after_feature(&self, result: &FeatureResult) {
        if let Some(func) = &result.config.after_feature {
            let evaluator = self.suite.evaluator();
            if let Err(e) = eval::invoke(&**evaluator, func, &[], &result.variables) {
                tracing::warn!(
                    feature = %result.feature,
                    "after-feature function failed: {e}",
                );
            }
        }
        for hook in self.suite.hooks() {
            hook.after_feature(result);
        }
    }
}
