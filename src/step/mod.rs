// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Step dispatching: resolving step text to an action and running it.
//!
//! - [`registry`]: ordered `(pattern, handler)` [`Registry`]
//! - [`context`]: captures handed to a matched handler
//!
//! [`Registry`] is the default [`StepDispatcher`]. Any other dispatcher can
//! be plugged into a [`Suite`] instead.
//!
//! [`Suite`]: crate::Suite

pub mod context;
pub mod registry;

use std::time::Instant;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::{
    error::StepError,
    feature::Step,
    result::{StepOutcome, StepResult},
    runtime::ScenarioEngine,
};

pub use self::{
    context::{CaptureName, Context},
    registry::Registry,
};

/// Alias for a step handler returning a [`BoxFuture`].
pub type Handler = for<'a> fn(
    &'a mut ScenarioEngine,
    Context,
) -> BoxFuture<'a, Result<(), StepError>>;

/// Resolver and executor of step text.
#[async_trait]
pub trait StepDispatcher: Send + Sync {
    /// Resolves the given `step` to exactly one action and runs it against
    /// the `engine`.
    ///
    /// # Errors
    ///
    /// [`StepError::NoMatch`] or [`StepError::Ambiguous`] if the `step`
    /// doesn't resolve to exactly one action, otherwise whatever the action
    /// fails with.
    async fn dispatch(
        &self,
        step: &Step,
        engine: &mut ScenarioEngine,
    ) -> Result<(), StepError>;
}

/// Runs a single `step` outside of any scenario loop, as interactive and
/// debugging tooling does.
///
/// A step that sets the abort flag of a not yet aborted `engine` is
/// reported as [`StepOutcome::Aborted`].
pub async fn run_scenario_step(
    step: &Step,
    dispatcher: &dyn StepDispatcher,
    engine: &mut ScenarioEngine,
) -> StepResult {
    let started = Instant::now();
    let was_aborted = engine.is_aborted();

    let outcome = match dispatcher.dispatch(step, engine).await {
        Ok(()) if !was_aborted && engine.is_aborted() => StepOutcome::Aborted,
        Ok(()) => StepOutcome::Passed,
        Err(e) => {
            tracing::debug!(line = step.line, step = %step.text, "step failed: {e}");
            StepOutcome::Failed(e)
        }
    };

    StepResult {
        step: step.clone(),
        outcome,
        duration: started.elapsed(),
        error_ignored: false,
    }
}
