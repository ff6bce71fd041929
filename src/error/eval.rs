// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Expression evaluation errors.

use derive_more::with_trait::{Display, Error};

/// Failure reported by an [`Evaluator`] (an
/// "ExpressionEvaluationFailure").
///
/// Never crashes a scheduler: dynamic outlines turn it into a failed
/// scenario, mock routing treats it as "no match".
///
/// [`Evaluator`]: crate::Evaluator
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
pub enum EvalError {
    /// The expression could not be evaluated.
    #[display("evaluation of `{expression}` failed: {reason}")]
    Failed {
        /// Evaluated expression source.
        #[error(not(source))]
        expression: String,

        /// Evaluator-specific failure description.
        reason: String,
    },

    /// A value was invoked but is not callable.
    #[display("not a callable value: {value}")]
    NotCallable {
        /// Rendering of the value.
        #[error(not(source))]
        value: String,
    },
}

impl EvalError {
    /// Creates an [`EvalError::Failed`].
    #[must_use]
    pub fn failed(
        expression: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Failed { expression: expression.into(), reason: reason.into() }
    }

    /// Creates an [`EvalError::NotCallable`].
    #[must_use]
    pub fn not_callable(value: impl Into<String>) -> Self {
        Self::NotCallable { value: value.into() }
    }
}
