// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Lazy expansion of dynamic scenario outlines.
//!
//! A dynamic outline carries an expression (the single header cell of its
//! `Examples:` table) evaluating either to a list of rows or to a generator
//! function invoked with `0, 1, 2, ...`. Rows are turned into concrete
//! [`Scenario`]s one at a time, as they are pulled by the scheduler.
//!
//! List rows that are not maps are skipped, while a generator stops at its
//! first non-map result. This asymmetry is intentional: a generator has no
//! other way to signal its end.

use std::{iter::FusedIterator, sync::Arc, vec};

use derive_more::with_trait::Debug;
use serde_json::Value;

use crate::{
    error::EvalError,
    eval::{self, Evaluator},
    feature::Scenario,
    value::{Variable, Vars},
};

/// Item produced by a [`ScenarioExpander`].
#[derive(Clone, Debug)]
pub enum Expanded {
    /// Concrete [`Scenario`] ready to run.
    Scenario(Scenario),

    /// Expansion failed. Carries the template and the failure, and ends the
    /// sequence.
    Failed {
        /// Template that failed to expand.
        scenario: Scenario,

        /// Evaluation failure.
        error: EvalError,
    },
}

/// Already evaluated row source of a dynamic outline.
#[derive(Clone, Debug)]
pub enum Rows {
    /// Materialized rows. Non-map rows are skipped.
    List(Vec<Value>),

    /// Function invoked with an increasing index. The first non-map result
    /// ends the sequence.
    Generator(Variable),
}

#[derive(Debug)]
enum State {
    Single(Scenario),
    Pending(String),
    List(vec::IntoIter<Value>, usize),
    Generator(Variable, usize),
    Done,
}

/// Lazy, forward-only sequence of the [`Scenario`]s of a template.
///
/// Nothing is evaluated before the first [`Iterator::next()`] call, and the
/// dynamic expression is evaluated at most once.
#[derive(Debug)]
pub struct ScenarioExpander {
    template: Scenario,
    #[debug(skip)]
    evaluator: Arc<dyn Evaluator>,
    vars: Vars,
    state: State,
}

impl ScenarioExpander {
    /// Creates a [`ScenarioExpander`] of the given `template`.
    ///
    /// A template without a dynamic expression yields itself once. A dynamic
    /// one evaluates its expression against `vars` (the bindings left by
    /// the feature background) on first demand.
    #[must_use]
    pub fn new(
        template: Scenario,
        evaluator: Arc<dyn Evaluator>,
        vars: Vars,
    ) -> Self {
        let state = match &template.dynamic_expression {
            Some(expr) => State::Pending(expr.clone()),
            None => State::Single(template.clone()),
        };
        Self { template, evaluator, vars, state }
    }

    /// Creates a [`ScenarioExpander`] of the given `template` over already
    /// evaluated `rows`.
    #[must_use]
    pub fn with_rows(
        template: Scenario,
        rows: Rows,
        evaluator: Arc<dyn Evaluator>,
        vars: Vars,
    ) -> Self {
        let state = match rows {
            Rows::List(list) => State::List(list.into_iter(), 0),
            Rows::Generator(f) => State::Generator(f, 0),
        };
        Self { template, evaluator, vars, state }
    }

    fn fail(&mut self, error: EvalError, row: Option<usize>) -> Expanded {
        tracing::warn!(
            scenario = %self.template.display_meta(),
            "dynamic expansion failed: {error}",
        );
        self.state = State::Done;
        let mut scenario = self.template.clone();
        scenario.example_index = row;
        Expanded::Failed { scenario, error }
    }
}

impl Iterator for ScenarioExpander {
    type Item = Expanded;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Done => return None,
                State::Single(scenario) => {
                    return Some(Expanded::Scenario(scenario));
                }
                State::Pending(expr) => {
                    match self.evaluator.eval(&expr, &self.vars) {
                        Ok(Variable::Json(Value::Array(list))) => {
                            self.state = State::List(list.into_iter(), 0);
                        }
                        Ok(f) if f.is_function() => {
                            self.state = State::Generator(f, 0);
                        }
                        Ok(other) => {
                            let error = EvalError::failed(
                                expr,
                                format!(
                                    "dynamic expression did not evaluate \
                                     to a list or function: {other}",
                                ),
                            );
                            return Some(self.fail(error, None));
                        }
                        Err(e) => return Some(self.fail(e, None)),
                    }
                }
                State::List(mut rows, index) => {
                    let Some(row) = rows.next() else {
                        tracing::debug!(
                            scenario = %self.template.display_meta(),
                            rows = index,
                            "dynamic list expansion complete",
                        );
                        return None;
                    };
                    self.state = State::List(rows, index + 1);
                    match row {
                        Value::Object(map) => {
                            return Some(Expanded::Scenario(
                                self.template.with_row(index, map),
                            ));
                        }
                        other => tracing::debug!(
                            row = index,
                            "skipping non-map dynamic row: {other}",
                        ),
                    }
                }
                State::Generator(f, index) => {
                    let arg = Variable::from(index);
                    return match eval::invoke(
                        &*self.evaluator,
                        &f,
                        &[arg],
                        &self.vars,
                    ) {
                        Ok(Variable::Json(Value::Object(map))) => {
                            self.state = State::Generator(f, index + 1);
                            Some(Expanded::Scenario(
                                self.template.with_row(index, map),
                            ))
                        }
                        Ok(end) => {
                            tracing::debug!(
                                scenario = %self.template.display_meta(),
                                rows = index,
                                "dynamic generator complete, returned: {end}",
                            );
                            None
                        }
                        Err(e) => Some(self.fail(e, Some(index))),
                    };
                }
            }
        }
    }
}

impl FusedIterator for ScenarioExpander {}
