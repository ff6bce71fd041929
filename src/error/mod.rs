// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error types of the runtime, organized by the domain they originate in.
//!
//! - [`core`] - top-level [`Error`] consolidating everything below
//! - [`step`] - failures of a single step
//! - [`eval`] - expression evaluation failures
//! - [`call`] - nested feature/function call failures (cacheable)
//! - [`transport`] - HTTP transport failures
//!
//! # Example
//!
//! ```rust
//! use cucumber_api::error::{Error, Result, StepError};
//!
//! fn dispatch() -> Result<()> {
//!     Err(StepError::no_match("def x = 1"))?
//! }
//!
//! assert!(matches!(dispatch(), Err(Error::Step(_))));
//! ```

pub mod call;
pub mod core;
pub mod eval;
pub mod step;
pub mod transport;

pub use self::{
    call::CallError,
    core::{Error, Result},
    eval::EvalError,
    step::StepError,
    transport::TransportError,
};

#[cfg(test)]
mod integration_tests {
    use std::{error::Error as _, io};

    use super::*;

    #[test]
    fn converts_domain_errors_into_top_level() {
        let err: Error = StepError::no_match("print x").into();
        assert!(matches!(err, Error::Step(_)));

        let err: Error = EvalError::failed("a.b", "boom").into();
        assert!(matches!(err, Error::Eval(_)));

        let err: Error = CallError::not_callable("42").into();
        assert!(matches!(err, Error::Call(_)));

        let err: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn step_error_keeps_eval_source() {
        let err = StepError::from(EvalError::failed("foo()", "undefined"));
        let source = err.source().map(ToString::to_string);

        assert_eq!(
            source.as_deref(),
            Some("evaluation of `foo()` failed: undefined"),
        );
    }
}
