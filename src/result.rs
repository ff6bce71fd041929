// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Outcomes of executed steps, scenarios and features.

use std::{path::PathBuf, time::Duration};

use itertools::Itertools as _;
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::StepError,
    feature::{Feature, Scenario, Step},
    value::{Variable, Vars},
};

/// Outcome of a single [`Step`].
#[derive(Clone, Debug)]
pub enum StepOutcome {
    /// The step succeeded.
    Passed,

    /// The step failed.
    Failed(StepError),

    /// The step requested an early stop of its scenario.
    Aborted,

    /// The step was not executed.
    Skipped,
}

impl StepOutcome {
    /// Indicates whether this is a [`StepOutcome::Failed`].
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns the failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&StepError> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Passed | Self::Aborted | Self::Skipped => None,
        }
    }
}

/// Result of a single executed (or skipped) [`Step`].
#[derive(Clone, Debug)]
pub struct StepResult {
    /// Executed [`Step`].
    pub step: Step,

    /// Outcome of the [`Step`].
    pub outcome: StepOutcome,

    /// Time the [`Step`] took.
    pub duration: Duration,

    /// Whether a failure was ignored because the step keyword continues on
    /// failure.
    pub error_ignored: bool,
}

impl StepResult {
    /// Creates a [`StepResult`] of a [`Step`] that didn't run.
    #[must_use]
    pub fn skipped(step: &Step) -> Self {
        Self::with_outcome(step, StepOutcome::Skipped)
    }

    /// Creates a zero-duration [`StepResult`] with the given `outcome`.
    #[must_use]
    pub fn with_outcome(step: &Step, outcome: StepOutcome) -> Self {
        Self {
            step: step.clone(),
            outcome,
            duration: Duration::ZERO,
            error_ignored: false,
        }
    }
}

/// Result of one executed [`Scenario`].
///
/// Mutated by the single worker running the [`Scenario`], immutable once
/// handed to its [`FeatureResult`].
#[derive(Clone, Debug)]
pub struct ScenarioResult {
    /// Display name of the owning [`Feature`].
    pub feature: String,

    /// Executed [`Scenario`].
    pub scenario: Scenario,

    /// Results of background and scenario steps, in execution order.
    pub steps: Vec<StepResult>,

    /// Total execution time.
    pub duration: Duration,
}

impl ScenarioResult {
    /// Creates an empty [`ScenarioResult`].
    #[must_use]
    pub fn new(feature: &Feature, scenario: Scenario) -> Self {
        Self {
            feature: feature.display_name(),
            scenario,
            steps: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Creates a synthetic failed [`ScenarioResult`] for a [`Scenario`] that
    /// could not even start, e.g. a dynamic outline whose expression failed.
    #[must_use]
    pub fn failed(feature: &Feature, scenario: Scenario, error: StepError) -> Self {
        let step = Step {
            prefix: "*".into(),
            text: scenario
                .dynamic_expression
                .clone()
                .unwrap_or_else(|| scenario.name.clone()),
            line: scenario.line,
            ..Step::default()
        };
        let mut result = Self::new(feature, scenario);
        result.add(StepResult::with_outcome(&step, StepOutcome::Failed(error)));
        result
    }

    /// Appends the given [`StepResult`].
    pub fn add(&mut self, step: StepResult) {
        self.duration += step.duration;
        self.steps.push(step);
    }

    /// Indicates whether any step failed, ignored failures included.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.steps.iter().any(|s| s.outcome.is_failed())
    }

    /// First failure of this scenario.
    #[must_use]
    pub fn error(&self) -> Option<&StepError> {
        self.steps.iter().find_map(|s| s.outcome.error())
    }

    /// Failure rendered with the feature and line it happened at.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        let failed = self.steps.iter().find(|s| s.outcome.is_failed())?;
        let err = failed.outcome.error()?;
        Some(format!("{}:{} {err}", self.feature, failed.step.line))
    }

    /// Declaration-order key.
    #[must_use]
    pub const fn order_key(&self) -> (usize, Option<usize>) {
        self.scenario.order_key()
    }
}

/// Result of one feature run, root or called.
#[derive(Clone, Debug, Default)]
pub struct FeatureResult {
    /// Display name of the [`Feature`].
    pub feature: String,

    /// Path of the [`Feature`], if any.
    pub path: Option<PathBuf>,

    /// Results of the executed scenarios, in declaration order once
    /// [`FeatureResult::sort()`]ed.
    pub scenarios: Vec<ScenarioResult>,

    /// Variables of the last scenario that finished executing.
    pub variables: Vars,

    /// Config of the last scenario that finished executing.
    pub config: Config,

    /// Argument the feature was called with.
    pub call_arg: Option<Variable>,

    /// Index of a looped call.
    pub loop_index: Option<usize>,

    /// Call nesting depth, `0` for root runs.
    pub call_depth: usize,

    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl FeatureResult {
    /// Sorts scenario results into declaration order.
    pub fn sort(&mut self) {
        self.scenarios.sort_by_key(ScenarioResult::order_key);
    }

    /// Indicates whether any scenario failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.scenarios.iter().any(ScenarioResult::is_failed)
    }

    /// Indicates whether no scenario ran.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Number of passed scenarios.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.scenarios.iter().filter(|s| !s.is_failed()).count()
    }

    /// Number of failed scenarios.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.scenarios.len() - self.passed_count()
    }

    /// Error messages of failed scenarios, with feature and line context.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.scenarios
            .iter()
            .filter_map(ScenarioResult::error_message)
            .collect()
    }

    /// All error messages joined by newlines.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.errors().join("\n")
    }

    /// Failures of outline rows rendered as `row N: <message>`, other
    /// failures as `line N: <message>`, joined by newlines.
    #[must_use]
    pub fn failure_summary(&self) -> String {
        self.scenarios
            .iter()
            .filter_map(|s| {
                let err = s.error()?;
                Some(match s.scenario.example_index {
                    Some(row) => format!("row {row}: {err}"),
                    None => format!("line {}: {err}", s.scenario.line),
                })
            })
            .join("\n")
    }

    /// Serializable [`Summary`] of this run.
    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary {
            feature: self.feature.clone(),
            scenarios: self.scenarios.len(),
            passed: self.passed_count(),
            failed: self.failed_count(),
            duration_millis: u64::try_from(self.duration.as_millis())
                .unwrap_or(u64::MAX),
            errors: self.errors(),
        }
    }
}

/// Reporter-facing totals of a [`FeatureResult`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Display name of the feature.
    pub feature: String,

    /// Number of executed scenarios.
    pub scenarios: usize,

    /// Number of passed scenarios.
    pub passed: usize,

    /// Number of failed scenarios.
    pub failed: usize,

    /// Wall-clock duration in milliseconds.
    pub duration_millis: u64,

    /// Error messages of failed scenarios.
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn feature() -> Feature {
        Feature {
            name: "cats".into(),
            path: Some("features/cats.feature".into()),
            ..Feature::default()
        }
    }

    fn scenario(line: usize, example_index: Option<usize>) -> Scenario {
        Scenario { line, example_index, ..Scenario::default() }
    }

    fn failing(line: usize, example_index: Option<usize>) -> ScenarioResult {
        ScenarioResult::failed(
            &feature(),
            scenario(line, example_index),
            StepError::failed("boom"),
        )
    }

    #[test]
    fn sorts_into_declaration_order() {
        let f = feature();
        let mut result = FeatureResult {
            scenarios: vec![
                ScenarioResult::new(&f, scenario(9, Some(1))),
                ScenarioResult::new(&f, scenario(3, None)),
                ScenarioResult::new(&f, scenario(9, Some(0))),
            ],
            ..FeatureResult::default()
        };

        result.sort();

        let keys = result
            .scenarios
            .iter()
            .map(ScenarioResult::order_key)
            .collect::<Vec<_>>();
        assert_eq!(keys, [(3, None), (9, Some(0)), (9, Some(1))]);
    }

    #[test]
    fn renders_errors_with_context() {
        let result = FeatureResult {
            scenarios: vec![failing(4, None), failing(12, Some(2))],
            ..FeatureResult::default()
        };

        assert!(result.is_failed());
        assert_eq!(result.errors(), ["cats.feature:4 boom", "cats.feature:12 boom"]);
        assert_eq!(result.failure_summary(), "line 4: boom\nrow 2: boom");
    }

    #[test]
    fn ignored_failures_still_fail_the_scenario() {
        let mut result = ScenarioResult::new(&feature(), scenario(1, None));
        result.add(StepResult {
            error_ignored: true,
            ..StepResult::with_outcome(
                &Step::default(),
                StepOutcome::Failed(StepError::failed("nope")),
            )
        });

        assert!(result.is_failed());
    }

    #[test]
    fn summary_serializes() {
        let result = FeatureResult {
            feature: "cats.feature".into(),
            scenarios: vec![failing(4, None)],
            ..FeatureResult::default()
        };

        let json = serde_json::to_value(result.summary()).unwrap();

        assert_eq!(
            json,
            json!({
                "feature": "cats.feature",
                "scenarios": 1,
                "passed": 0,
                "failed": 1,
                "durationMillis": 0,
                "errors": ["cats.feature:4 boom"],
            }),
        );
    }
}
