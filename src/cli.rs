// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI options of a [`Suite`].
//!
//! [`Suite`]: crate::Suite

use std::{path::PathBuf, time::Duration};

use gherkin::tagexpr::TagOperation;

/// CLI options of a [`Suite`], meant to be flattened into an application's
/// own [`clap::Parser`].
///
/// [`Suite`]: crate::Suite
#[derive(Clone, Debug, Default, clap::Args)]
#[group(skip)]
pub struct Cli {
    /// Number of scenarios to run in parallel. Runs everything sequentially
    /// if not specified.
    #[arg(long, short = 'T', value_name = "int", global = true)]
    pub threads: Option<usize>,

    /// Tag expression to filter scenarios by.
    ///
    /// Note: Scenarios tagged `@ignore` are never run.
    #[arg(long, short, value_name = "tagexpr", global = true)]
    pub tags: Option<TagOperation>,

    /// Stop starting new scenarios after the first failure.
    #[arg(long, global = true)]
    pub abort_suite_on_failure: bool,

    /// Minutes `callSingle` results stay valid on disk. `0` disables
    /// persistence.
    #[arg(long, value_name = "minutes", global = true)]
    pub call_single_cache_minutes: Option<u64>,

    /// Directory persisted `callSingle` results are written to.
    #[arg(long, value_name = "dir", global = true)]
    pub call_single_cache_dir: Option<PathBuf>,

    /// Read timeout of HTTP calls.
    ///
    /// Duration is represented in a human-readable format like `12min5s`.
    #[arg(
        long,
        value_name = "duration",
        value_parser = humantime::parse_duration,
        global = true,
    )]
    pub read_timeout: Option<Duration>,
}
