// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Copy-on-branch runtime configuration.

use std::{path::PathBuf, time::Duration};

use smart_default::SmartDefault;

use crate::value::Variable;

/// Settings inherited by every scenario and nested call.
///
/// A nested call works on a clone, unless the call shares its scope with
/// the caller, in which case the caller's instance is handed over and
/// handed back once the call finishes.
#[derive(Clone, Debug, SmartDefault)]
pub struct Config {
    /// Connect timeout of the HTTP transport.
    #[default(Duration::from_secs(30))]
    pub connect_timeout: Duration,

    /// Read timeout of the HTTP transport.
    #[default(Duration::from_secs(30))]
    pub read_timeout: Duration,

    /// Retry policy of `retry until` style steps.
    pub retry: RetryPolicy,

    /// Time-to-live of persisted `callSingle` results, in minutes. `0`
    /// keeps results in memory only.
    pub call_single_cache_minutes: u64,

    /// Directory holding persisted `callSingle` results.
    #[default(PathBuf::from("target"))]
    pub call_single_cache_dir: PathBuf,

    /// Use one suite-wide `callonce` cache instead of one per root feature
    /// run (shared loop-test-run mode).
    pub shared_call_once: bool,

    /// Step keywords whose failure does not stop the scenario.
    pub continue_on_step_failure: Vec<String>,

    /// Keep executing after an ignored failure instead of stopping right
    /// after it.
    pub continue_after_continue_on_step_failure: bool,

    /// Report steps skipped after an abort as passed.
    pub aborted_steps_should_pass: bool,

    /// Answer CORS preflights and add `Access-Control-Allow-Origin` in mock
    /// mode.
    pub cors: bool,

    /// Feature-level headers of mock responses: map or function.
    pub response_headers: Option<Variable>,

    /// Headers added to every outgoing request: map or function.
    pub headers: Option<Variable>,

    /// Function invoked after every scenario.
    pub after_scenario: Option<Variable>,

    /// Function invoked after every feature.
    pub after_feature: Option<Variable>,
}

/// Retry policy of polling steps.
#[derive(Clone, Copy, Debug, Eq, PartialEq, SmartDefault)]
pub struct RetryPolicy {
    /// Maximum number of attempts.
    #[default(3)]
    pub count: usize,

    /// Pause between attempts.
    #[default(Duration::from_millis(3000))]
    pub interval: Duration,
}

impl Config {
    /// Indicates whether a failure of a step with the given `keyword` is
    /// ignored.
    #[must_use]
    pub fn continues_on_failure_of(&self, keyword: Option<&str>) -> bool {
        keyword.is_some_and(|k| {
            self.continue_on_step_failure.iter().any(|c| c == k)
        })
    }
}
