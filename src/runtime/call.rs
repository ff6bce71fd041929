// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Nested calls of features and functions.

use std::{mem, sync::Arc};

use futures::future::BoxFuture;
use serde_json::Value;

use super::{FeatureRuntime, ScenarioEngine};
use crate::{
    cache::CacheEntry,
    config::Config,
    error::CallError,
    value::{bind_json_map, vars_to_json, CallSelector, FeatureRef, Variable, Vars},
};

/// Description of one nested invocation, owned by the callee.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    /// Nesting depth of the callee, `0` for root runs.
    pub depth: usize,

    /// Argument of the call.
    pub arg: Option<Variable>,

    /// Index of a looped call.
    pub loop_index: Option<usize>,

    /// Whether the caller's variables and config are handed to the callee
    /// instead of being cloned.
    pub shared_scope: bool,

    /// Variables the callee starts from.
    pub vars: Vars,

    /// Config the callee starts from.
    pub config: Config,

    /// Scenarios of the callee to run, all if [`None`].
    pub selector: Option<CallSelector>,
}

impl CallContext {
    /// [`CallContext`] of a root run with optional `args`.
    #[must_use]
    pub fn root(args: Option<Vars>, config: Config) -> Self {
        Self { vars: args.unwrap_or_default(), config, ..Self::default() }
    }

    /// Variables a scenario of the callee starts from: the inherited ones,
    /// entries of a map argument, plus `__arg` and `__loop`.
    #[must_use]
    pub fn scenario_vars(&self) -> Vars {
        let mut vars = self.vars.clone();
        if let Some(map) = self.arg.as_ref().and_then(Variable::as_map) {
            bind_json_map(&mut vars, map);
        }
        let arg = self.arg.clone().unwrap_or_default();
        _ = vars.insert("__arg".into(), arg);
        let index = self.loop_index.map_or(-1, |i| i64::try_from(i).unwrap_or(i64::MAX));
        _ = vars.insert("__loop".into(), Value::from(index).into());
        vars
    }
}

impl ScenarioEngine {
    /// Calls the given `target` (a feature or a function) with an optional
    /// `arg`.
    ///
    /// A feature called with a list argument runs once per element, with a
    /// function argument once per map the function returns for `0, 1, 2,
    /// ...`. A shared-scope call hands [`ScenarioEngine::vars`] and
    /// [`ScenarioEngine::config`] to the callee and takes them back
    /// afterwards.
    ///
    /// # Errors
    ///
    /// If the target isn't callable, the argument doesn't fit, or the callee
    /// fails.
    pub fn call<'s>(
        &'s mut self,
        target: Variable,
        arg: Option<Variable>,
        shared: bool,
    ) -> BoxFuture<'s, Result<Variable, CallError>> {
        Box::pin(async move {
            match target {
                Variable::Feature(feature) => match arg {
                    None | Some(Variable::Json(Value::Null)) => {
                        self.call_feature(feature, None, None, shared).await
                    }
                    Some(Variable::Json(Value::Array(list))) => {
                        self.call_feature_loop(feature, list, shared).await
                    }
                    Some(map) if map.is_map() => {
                        self.call_feature(feature, Some(map), None, shared).await
                    }
                    Some(generator) if generator.is_function() => {
                        self.call_feature_generator(feature, generator, shared)
                            .await
                    }
                    Some(other) => {
                        Err(CallError::invalid_argument(other.to_string()))
                    }
                },
                f @ (Variable::Function(_) | Variable::Native(_)) => {
                    let args = arg.into_iter().collect::<Vec<_>>();
                    let value = self.invoke(&f, &args)?;
                    if shared {
                        if let Some(map) = value.as_map() {
                            bind_json_map(&mut self.vars, map);
                        }
                    }
                    Ok(value)
                }
                other => Err(CallError::not_callable(other.to_string())),
            }
        })
    }

    /// Like [`ScenarioEngine::call()`], but executed at most once per `key`
    /// within the root run (or the whole suite if
    /// [`Config::shared_call_once`] is set).
    ///
    /// A shared-scope reuse replaces the variables and config with the
    /// snapshot taken after the first call.
    ///
    /// # Errors
    ///
    /// The (cached) error of the first call.
    pub async fn call_once(
        &mut self,
        key: &str,
        target: Variable,
        arg: Option<Variable>,
        shared: bool,
    ) -> Result<Variable, CallError> {
        let cache = Arc::clone(&self.scope.call_once);
        let entry = cache
            .get_or_compute(key, async {
                let value = self.call(target, arg, shared).await?;
                Ok(Arc::new(CacheEntry {
                    value,
                    config: self.config.clone(),
                    vars: shared.then(|| self.vars.clone()),
                }))
            })
            .await?;

        if let Some(vars) = &entry.vars {
            self.vars.clone_from(vars);
        }
        if shared {
            self.config.clone_from(&entry.config);
        }
        Ok(entry.value.clone())
    }

    /// Like [`ScenarioEngine::call()`] in an isolated scope, but executed at
    /// most once per `key` for the whole suite, optionally persisted to disk
    /// (see [`Config::call_single_cache_minutes`]).
    ///
    /// # Errors
    ///
    /// The (cached) error of the first call.
    pub async fn call_single(
        &mut self,
        key: &str,
        target: Variable,
        arg: Option<Variable>,
    ) -> Result<Variable, CallError> {
        let cache = Arc::clone(self.suite().call_single_cache());
        let config = self.config.clone();
        cache
            .get_or_compute(key, &config, self.call(target, arg, false))
            .await
    }

    async fn call_feature(
        &mut self,
        feature: FeatureRef,
        arg: Option<Variable>,
        loop_index: Option<usize>,
        shared: bool,
    ) -> Result<Variable, CallError> {
        let (vars, config) = if shared {
            (mem::take(&mut self.vars), mem::take(&mut self.config))
        } else {
            (self.vars.clone(), self.config.clone())
        };
        let call = CallContext {
            depth: self.call_depth() + 1,
            arg,
            loop_index,
            shared_scope: shared,
            vars,
            config,
            selector: feature.selector,
        };
        tracing::debug!(
            feature = %feature.feature.display_name(),
            depth = call.depth,
            shared,
            "calling feature",
        );

        let runtime = FeatureRuntime::called(
            self.suite().clone(),
            feature.feature,
            call,
            Arc::clone(&self.scope.call_once),
        );
        let result = runtime.run().await;

        if shared {
            self.vars.clone_from(&result.variables);
            self.config.clone_from(&result.config);
        }
        if result.is_failed() {
            return Err(CallError::feature(&result.feature, result.error_message()));
        }
        Ok(Variable::Json(vars_to_json(&result.variables)))
    }

    async fn call_feature_loop(
        &mut self,
        feature: FeatureRef,
        list: Vec<Value>,
        shared: bool,
    ) -> Result<Variable, CallError> {
        let mut results = Vec::with_capacity(list.len());
        let mut errors = Vec::new();

        for (i, item) in list.into_iter().enumerate() {
            if !item.is_object() {
                return Err(CallError::invalid_argument(format!(
                    "not a map at loop index {i}: {item}",
                )));
            }
            match self
                .call_feature(feature.clone(), Some(item.into()), Some(i), shared)
                .await
            {
                Ok(v) => results.push(v.as_json().cloned().unwrap_or_default()),
                Err(e) => {
                    let message = format!("feature call (loop) failed at index {i}: {e}");
                    tracing::error!("{message}");
                    errors.push(message);
                }
            }
        }

        if errors.is_empty() {
            Ok(Variable::Json(Value::Array(results)))
        } else {
            Err(CallError::Loop { errors })
        }
    }

    async fn call_feature_generator(
        &mut self,
        feature: FeatureRef,
        generator: Variable,
        shared: bool,
    ) -> Result<Variable, CallError> {
        let mut results = Vec::new();

        for i in 0.. {
            let arg = self.invoke(&generator, &[Variable::from(i)])?;
            if !arg.is_map() {
                tracing::debug!(calls = i, "generator loop complete, returned: {arg}");
                break;
            }
            match self.call_feature(feature.clone(), Some(arg), Some(i), shared).await {
                Ok(v) => results.push(v.as_json().cloned().unwrap_or_default()),
                Err(e) => {
                    return Err(CallError::Loop {
                        errors: vec![format!(
                            "feature call (loop) failed at index {i}: {e}",
                        )],
                    });
                }
            }
        }

        Ok(Variable::Json(Value::Array(results)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scenario_vars_bind_map_argument() {
        let mut inherited = Vars::new();
        _ = inherited.insert("base".into(), json!("http://cats").into());
        let call = CallContext {
            arg: Some(json!({"name": "Billie"}).into()),
            loop_index: Some(2),
            vars: inherited,
            ..CallContext::default()
        };

        let vars = call.scenario_vars();

        assert_eq!(vars.get("base"), Some(&json!("http://cats").into()));
        assert_eq!(vars.get("name"), Some(&json!("Billie").into()));
        assert_eq!(vars.get("__arg"), Some(&json!({"name": "Billie"}).into()));
        assert_eq!(vars.get("__loop"), Some(&json!(2).into()));
    }

    #[test]
    fn root_context_has_no_loop() {
        let vars = CallContext::root(None, Config::default()).scenario_vars();

        assert_eq!(vars.get("__loop"), Some(&json!(-1).into()));
        assert_eq!(vars.get("__arg"), Some(&Variable::NULL));
    }
}
