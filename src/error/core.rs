// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Top-level [`Error`] of the runtime.

use std::io;

use derive_more::{Display, Error, From};

use super::{CallError, EvalError, StepError, TransportError};
use crate::parser;

/// Top-level error consolidating every failure the runtime can surface
/// outside of a [`ScenarioResult`].
///
/// [`ScenarioResult`]: crate::result::ScenarioResult
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Feature text could not be parsed.
    #[display("Failed to parse feature: {_0}")]
    Parse(parser::Error),

    /// I/O failure (reading features, callSingle cache files).
    #[display("I/O operation failed: {_0}")]
    Io(io::Error),

    /// JSON (de)serialization failure.
    #[display("JSON conversion failed: {_0}")]
    Json(serde_json::Error),

    /// A step failed outside of a scenario run.
    #[display("Step execution failed: {_0}")]
    Step(StepError),

    /// An expression failed to evaluate.
    #[display("{_0}")]
    Eval(EvalError),

    /// A nested call failed.
    #[display("{_0}")]
    Call(CallError),

    /// The HTTP transport failed.
    #[display("{_0}")]
    Transport(TransportError),

    /// Mock server initialization failed.
    #[display("mock-server background failed - {feature}:{line}: {message}")]
    #[from(ignore)]
    MockInit {
        /// Name of the mock feature.
        #[error(not(source))]
        feature: String,

        /// Line of the failed background step.
        line: usize,

        /// Failure message of the step.
        message: String,
    },
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates an [`Error::MockInit`].
    #[must_use]
    pub fn mock_init(
        feature: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::MockInit {
            feature: feature.into(),
            line,
            message: message.into(),
        }
    }
}
