// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution runtime for behavior-driven API tests.
//!
//! Features made of ordered steps, data-driven outlines and reusable called
//! flows are turned into scheduled work, executed against a pluggable
//! [`StepDispatcher`], [`Evaluator`] and [`Transport`], and collected into
//! ordered [`FeatureResult`]s. The same features can serve requests as a
//! mock server through the [`MockHandler`].
//!
//! ```rust,ignore
//! let suite = Suite::new(MyEvaluator, registry)
//!     .with_transport(MyHttpClient::default())
//!     .max_concurrent_scenarios(4);
//!
//! let results = suite.run_path("tests/features").await?;
//! assert!(results.iter().all(|r| !r.is_failed()));
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(nonstandard_style, rustdoc::all, trivial_casts, trivial_numeric_casts)]
#![forbid(non_ascii_idents, unsafe_code)]
#![warn(
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::expect_used,
    clippy::pedantic,
    clippy::print_stderr,
    clippy::print_stdout,
    clippy::str_to_string,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::use_self,
    future_incompatible,
    let_underscore_drop,
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, unused_crate_dependencies)
)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod eval;
pub mod expander;
pub mod feature;
pub mod mock;
pub mod parser;
pub mod result;
pub mod runtime;
pub mod scheduler;
pub mod step;
pub mod tag;
pub mod transport;
pub mod value;

#[doc(no_inline)]
pub use gherkin;

#[doc(inline)]
pub use self::{
    cache::{CacheEntry, CallOnceCache, CallSingleCache, Memo},
    cli::Cli,
    config::{Config, RetryPolicy},
    error::{Error, Result},
    eval::Evaluator,
    expander::{Expanded, Rows, ScenarioExpander},
    feature::{Feature, Scenario, Section, Step},
    mock::{MatchScore, MockHandler},
    parser::Parser,
    result::{FeatureResult, ScenarioResult, StepOutcome, StepResult, Summary},
    runtime::{
        CallContext, FeatureRuntime, Phase, RuntimeHook, ScenarioEngine, Suite,
    },
    scheduler::{WorkScheduler, WorkerPool},
    step::{run_scenario_step, Context, Registry, StepDispatcher},
    transport::{Request, Response, Transport},
    value::{FeatureRef, FunctionSource, NativeFn, Variable, Vars},
};
