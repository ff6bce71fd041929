// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Step execution errors.

use derive_more::with_trait::{Display, Error, From};

use super::{CallError, EvalError, TransportError};

/// Failure of a single step (a "StepFailure").
///
/// Stops the owning scenario unless the step's keyword is configured to
/// continue on failure.
#[derive(Clone, Debug, Display, Error, From)]
pub enum StepError {
    /// No registered pattern matches the step text.
    #[display("no step-definition method match found for: {step_text}")]
    #[from(ignore)]
    NoMatch {
        /// Text of the unmatched step.
        #[error(not(source))]
        step_text: String,
    },

    /// More than one registered pattern matches the step text.
    #[display("more than one step-definition method matched ({count}): {step_text}")]
    #[from(ignore)]
    Ambiguous {
        /// Text of the ambiguous step.
        #[error(not(source))]
        step_text: String,

        /// Number of matching patterns.
        count: usize,
    },

    /// The step action reported a failure.
    #[display("{message}")]
    #[from(ignore)]
    Failed {
        /// Failure message.
        #[error(not(source))]
        message: String,
    },

    /// An expression used by the step failed.
    #[display("{_0}")]
    Eval(EvalError),

    /// A call made by the step failed.
    #[display("{_0}")]
    Call(CallError),

    /// An HTTP exchange made by the step failed.
    #[display("{_0}")]
    Transport(TransportError),
}

impl StepError {
    /// Creates a [`StepError::NoMatch`].
    #[must_use]
    pub fn no_match(step_text: impl Into<String>) -> Self {
        Self::NoMatch { step_text: step_text.into() }
    }

    /// Creates a [`StepError::Ambiguous`].
    #[must_use]
    pub fn ambiguous(step_text: impl Into<String>, count: usize) -> Self {
        Self::Ambiguous { step_text: step_text.into(), count }
    }

    /// Creates a [`StepError::Failed`].
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed { message: message.into() }
    }

    /// Indicates whether the step could not be resolved to exactly one
    /// action.
    #[must_use]
    pub const fn is_dispatch_error(&self) -> bool {
        matches!(self, Self::NoMatch { .. } | Self::Ambiguous { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_errors_are_recognized() {
        assert!(StepError::no_match("foo").is_dispatch_error());
        assert!(StepError::ambiguous("foo", 2).is_dispatch_error());
        assert!(!StepError::failed("foo").is_dispatch_error());
    }

    #[test]
    fn ambiguous_mentions_count() {
        let err = StepError::ambiguous("def a = 1", 3);

        assert!(err.to_string().contains("(3)"));
        assert!(err.to_string().ends_with("def a = 1"));
    }
}
