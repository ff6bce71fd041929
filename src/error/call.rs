// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Nested call errors.

use derive_more::with_trait::{Display, Error, From};
use itertools::Itertools as _;

use super::EvalError;

/// Failure of a `call`, `callonce` or `callSingle` (a "CallFailure").
///
/// [`Clone`] so that a memoized failure is replayed identically to every
/// caller observing the same cache key.
#[derive(Clone, Debug, Display, Error, From, PartialEq)]
pub enum CallError {
    /// The called feature failed.
    #[display("{message}")]
    #[from(ignore)]
    Feature {
        /// Name of the called feature.
        #[error(not(source))]
        feature: String,

        /// Combined error messages of the failed scenarios.
        message: String,
    },

    /// One or more iterations of a looped call failed.
    #[display("{}", errors.iter().join("\n"))]
    #[from(ignore)]
    Loop {
        /// Per-iteration messages, in iteration order.
        #[error(not(source))]
        errors: Vec<String>,
    },

    /// The call argument is neither a map, a list nor a function.
    #[display("feature call argument is not a json object or array: {value}")]
    #[from(ignore)]
    InvalidArgument {
        /// Rendering of the argument.
        #[error(not(source))]
        value: String,
    },

    /// The call target is neither a feature nor a function.
    #[display("not a callable feature or function: {value}")]
    #[from(ignore)]
    NotCallable {
        /// Rendering of the target.
        #[error(not(source))]
        value: String,
    },

    /// A called feature could not be loaded.
    #[display("failed to load called feature {path}: {reason}")]
    #[from(ignore)]
    Load {
        /// Requested path.
        #[error(not(source))]
        path: String,

        /// Loading failure description.
        reason: String,
    },

    /// The called function failed.
    #[display("{_0}")]
    Eval(EvalError),
}

impl CallError {
    /// Creates a [`CallError::Feature`].
    #[must_use]
    pub fn feature(
        feature: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Feature { feature: feature.into(), message: message.into() }
    }

    /// Creates a [`CallError::InvalidArgument`].
    #[must_use]
    pub fn invalid_argument(value: impl Into<String>) -> Self {
        Self::InvalidArgument { value: value.into() }
    }

    /// Creates a [`CallError::NotCallable`].
    #[must_use]
    pub fn not_callable(value: impl Into<String>) -> Self {
        Self::NotCallable { value: value.into() }
    }

    /// Creates a [`CallError::Load`].
    #[must_use]
    pub fn load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load { path: path.into(), reason: reason.into() }
    }
}
