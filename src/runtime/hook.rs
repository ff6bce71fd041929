// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Lifecycle hooks.

use crate::{
    feature::{Feature, Scenario, Step},
    result::{FeatureResult, ScenarioResult, StepResult},
};

/// Observer of a run's lifecycle, able to veto features, scenarios and
/// steps.
///
/// Hooks run on the worker executing the unit, so implementations must be
/// cheap and thread-safe. Every method has a no-op default.
pub trait RuntimeHook: Send + Sync {
    /// Called once before the first scenario of a feature runs. Returning
    /// `false` skips the whole feature.
    fn before_feature(&self, feature: &Feature) -> bool {
        _ = feature;
        true
    }

    /// Called once after a feature in which at least one scenario ran.
    fn after_feature(&self, result: &FeatureResult) {
        _ = result;
    }

    /// Called before a scenario runs. Returning `false` skips it.
    fn before_scenario(&self, scenario: &Scenario) -> bool {
        _ = scenario;
        true
    }

    /// Called after a scenario ran.
    fn after_scenario(&self, result: &ScenarioResult) {
        _ = result;
    }

    /// Called before a step runs. Returning `false` skips it.
    fn before_step(&self, step: &Step) -> bool {
        _ = step;
        true
    }

    /// Called after a step ran.
    fn after_step(&self, result: &StepResult) {
        _ = result;
    }
}
