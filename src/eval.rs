// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Embedded expression language seam.

use crate::{
    error::EvalError,
    value::{FunctionSource, Variable, Vars},
};

/// Evaluator of the embedded expression language.
///
/// The runtime never interprets expressions itself: dynamic outline
/// expressions, mock match expressions, hook functions and called
/// functions all go through this trait, with the active variable scope
/// passed explicitly.
pub trait Evaluator: Send + Sync {
    /// Evaluates the given `expression` against the given `vars`.
    ///
    /// # Errors
    ///
    /// If the `expression` is malformed or fails at runtime.
    fn eval(&self, expression: &str, vars: &Vars) -> Result<Variable, EvalError>;

    /// Invokes the given `function` with zero, one or two `args`.
    ///
    /// The `function` is rebuilt from its source, its closure bindings are
    /// visible underneath the given `vars`.
    ///
    /// # Errors
    ///
    /// If the function body fails.
    fn invoke(
        &self,
        function: &FunctionSource,
        args: &[Variable],
        vars: &Vars,
    ) -> Result<Variable, EvalError>;
}

/// Invokes the callable `target` with the given `args`, dispatching
/// [`Variable::Native`] functions directly and [`Variable::Function`]s
/// through the `evaluator`.
///
/// # Errors
///
/// If the `target` is not callable, or the invocation fails.
pub fn invoke(
    evaluator: &dyn Evaluator,
    target: &Variable,
    args: &[Variable],
    vars: &Vars,
) -> Result<Variable, EvalError> {
    match target {
        Variable::Function(f) => evaluator.invoke(f, args, vars),
        Variable::Native(f) => f.call(args),
        other => Err(EvalError::not_callable(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::value::NativeFn;

    struct Echo;

    impl Evaluator for Echo {
        fn eval(&self, expr: &str, _: &Vars) -> Result<Variable, EvalError> {
            Ok(Variable::from(expr))
        }

        fn invoke(
            &self,
            function: &FunctionSource,
            args: &[Variable],
            _: &Vars,
        ) -> Result<Variable, EvalError> {
            Ok(Variable::from(format!("{}({})", function.source, args.len())))
        }
    }

    #[test]
    fn dispatches_natives_directly() {
        let native = Variable::Native(NativeFn::new("one", |_| {
            Ok(Variable::from(json!(1)))
        }));

        let res = invoke(&Echo, &native, &[], &Vars::new()).unwrap();

        assert_eq!(res, Variable::from(json!(1)));
    }

    #[test]
    fn dispatches_functions_to_evaluator() {
        let func = Variable::Function(FunctionSource::new("fn"));

        let res = invoke(&Echo, &func, &[Variable::NULL], &Vars::new());

        assert_eq!(res.unwrap(), Variable::from("fn(1)"));
    }

    #[test]
    fn rejects_data() {
        let err = invoke(&Echo, &Variable::from(json!(3)), &[], &Vars::new())
            .unwrap_err();

        assert!(matches!(err, EvalError::NotCallable { .. }));
    }
}
