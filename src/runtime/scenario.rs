// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution of a single [`Scenario`].

use std::{sync::Arc, time::Instant};

use serde_json::{Map, Value};

use super::{RunScope, ScenarioEngine};
use crate::{
    config::Config,
    error::StepError,
    feature::{Scenario, Step},
    result::{ScenarioResult, StepOutcome, StepResult},
    step::run_scenario_step,
    value::{bind_json_map, Vars},
};

/// State a scenario starts from.
#[derive(Clone, Debug)]
pub(crate) struct Seed {
    pub(crate) vars: Vars,
    pub(crate) config: Config,

    /// Whether the feature background still has to run first.
    pub(crate) with_background: bool,
}

/// Reason of the remaining steps not being executed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Stop {
    Aborted,
    Failed,
}

/// Runs the steps of one [`Scenario`] against its own [`ScenarioEngine`].
#[derive(Debug)]
pub(crate) struct ScenarioRuntime {
    engine: ScenarioEngine,
    scenario: Scenario,
    with_background: bool,
    hooks: bool,
}

impl ScenarioRuntime {
    pub(crate) fn new(scope: Arc<RunScope>, scenario: Scenario, seed: Seed) -> Self {
        let Seed { mut vars, config, with_background } = seed;
        if let Some(row) = &scenario.example_data {
            bind_row(&mut vars, row, scenario.example_index.unwrap_or_default());
        }
        Self {
            engine: ScenarioEngine::new(scope, vars, config),
            scenario,
            with_background,
            hooks: true,
        }
    }

    /// Disables every [`RuntimeHook`] and configured after-scenario
    /// function for this run.
    ///
    /// [`RuntimeHook`]: super::RuntimeHook
    pub(crate) const fn without_hooks(mut self) -> Self {
        self.hooks = false;
        self
    }

    /// Runs the scenario, returning its result along with the final state of
    /// its engine, or [`None`] if a hook vetoed it.
    pub(crate) async fn run(self) -> Option<(ScenarioResult, ScenarioEngine)> {
        let hooks = self.engine.suite().hooks();
        if self.hooks && !hooks.iter().all(|h| h.before_scenario(&self.scenario)) {
            tracing::debug!(scenario = %self.scenario.display_meta(), "vetoed by hook");
            return None;
        }
        Some(self.execute().await)
    }

    /// Runs the scenario without consulting before-scenario hooks.
    async fn execute(mut self) -> (ScenarioResult, ScenarioEngine) {
        let suite = self.engine.suite().clone();
        let started = Instant::now();
        let feature = Arc::clone(self.engine.feature());
        let steps = self
            .with_background
            .then(|| feature.background_steps())
            .unwrap_or_default()
            .iter()
            .chain(&self.scenario.steps)
            .cloned()
            .collect::<Vec<_>>();

        let mut result = ScenarioResult::new(&feature, self.scenario.clone());
        self.run_steps(&steps, &mut result).await;
        if result.steps.is_empty() {
            let step = Step {
                prefix: "*".into(),
                text: "no steps executed".into(),
                line: self.scenario.line,
                ..Step::default()
            };
            result.add(StepResult::with_outcome(&step, StepOutcome::Passed));
        }
        result.duration = started.elapsed();

        if self.hooks {
            self.after_scenario_function();
            for hook in suite.hooks() {
                hook.after_scenario(&result);
            }
        }
        if let Some(e) = result.error_message() {
            tracing::error!("{e}");
        }

        (result, self.engine)
    }

    async fn run_steps(&mut self, steps: &[Step], result: &mut ScenarioResult) {
        let suite = self.engine.suite().clone();
        let mut stopped = None;
        let mut ignoring = false;

        for step in steps {
            let outcome = match stopped {
                Some(Stop::Aborted) if self.engine.config.aborted_steps_should_pass => {
                    StepResult::with_outcome(step, StepOutcome::Passed)
                }
                Some(_) => StepResult::skipped(step),
                None if self.hooks
                    && !suite.hooks().iter().all(|h| h.before_step(step)) =>
                {
                    tracing::debug!(line = step.line, "step skipped by hook");
                    StepResult::skipped(step)
                }
                None => {
                    let mut res =
                        run_scenario_step(step, &**suite.dispatcher(), &mut self.engine)
                            .await;
                    match &res.outcome {
                        StepOutcome::Aborted => {
                            tracing::debug!(line = step.line, "abort at step");
                            stopped = Some(Stop::Aborted);
                        }
                        StepOutcome::Failed(_)
                            if self
                                .engine
                                .config
                                .continues_on_failure_of(Some(step.keyword())) =>
                        {
                            res.error_ignored = true;
                            ignoring = true;
                        }
                        StepOutcome::Failed(_) => stopped = Some(Stop::Failed),
                        StepOutcome::Passed | StepOutcome::Skipped => {}
                    }
                    if ignoring && self.engine.config.continue_on_step_failure.is_empty() {
                        if self.engine.config.continue_after_continue_on_step_failure {
                            ignoring = false;
                        } else {
                            stopped = Some(Stop::Failed);
                        }
                    }
                    if self.hooks {
                        for hook in suite.hooks() {
                            hook.after_step(&res);
                        }
                    }
                    res
                }
            };
            result.add(outcome);
        }
    }

    /// Invokes [`Config::after_scenario`], logging its failure.
    fn after_scenario_function(&mut self) {
        let Some(func) = self.engine.config.after_scenario.clone() else {
            return;
        };
        if let Err(e) = self.engine.invoke(&func, &[]) {
            tracing::warn!(
                scenario = %self.scenario.display_meta(),
                "after-scenario function failed: {e}",
            );
        }
    }
}

/// Runs only the feature background, for dynamic outlines and mock
/// initialization.
///
/// Returns the resulting state, or the failed background result.
pub(crate) async fn run_background(
    scope: Arc<RunScope>,
    template: &Scenario,
    vars: Vars,
    config: Config,
) -> Result<(Vars, Config), ScenarioResult> {
    let feature = Arc::clone(&scope.feature);
    let mut runtime = ScenarioRuntime::new(
        scope,
        template.clone(),
        Seed { vars, config, with_background: true },
    )
    .without_hooks();
    let mut result = ScenarioResult::new(&feature, template.clone());
    runtime
        .run_steps(feature.background_steps(), &mut result)
        .await;

    if result.is_failed() {
        return Err(result);
    }
    Ok(runtime.engine.into_parts())
}

/// Binds the entries of an example `row` as variables, plus `__row` and
/// `__num`.
fn bind_row(vars: &mut Vars, row: &Map<String, Value>, index: usize) {
    bind_json_map(vars, row);
    _ = vars.insert("__row".into(), Value::Object(row.clone()).into());
    _ = vars.insert("__num".into(), index.into());
}

/// Runs a mock `scenario` without hooks over the given `vars`.
pub(crate) async fn run_mock_scenario(
    scope: Arc<RunScope>,
    scenario: Scenario,
    vars: Vars,
    config: Config,
) -> Result<ScenarioEngine, (StepError, ScenarioEngine)> {
    let runtime = ScenarioRuntime::new(
        scope,
        scenario,
        Seed { vars, config, with_background: false },
    )
    .without_hooks();
    let (result, engine) = runtime.execute().await;
    match result.error().cloned() {
        Some(e) => Err((e, engine)),
        None => Ok(engine),
    }
}
