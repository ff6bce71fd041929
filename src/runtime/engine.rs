// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`ScenarioEngine`]: the state a step handler works on.

use std::{path::Path, sync::Arc};

use derive_more::with_trait::Debug;
use serde_json::Value;

use super::Suite;
use crate::{
    cache::CallOnceCache,
    config::Config,
    error::{CallError, EvalError, TransportError},
    eval,
    feature::Feature,
    transport::{multimap_to_json, Request, Response},
    value::{Variable, Vars},
};

/// Shared, read-only surroundings of every scenario of one feature run.
#[derive(Debug)]
pub(crate) struct RunScope {
    pub(crate) suite: Suite,
    pub(crate) feature: Arc<Feature>,
    pub(crate) call_once: Arc<CallOnceCache>,
    pub(crate) depth: usize,
}

/// Execution state of one running scenario.
///
/// Owned exclusively by the worker running the scenario and passed
/// explicitly to every step handler. Nested calls either clone the
/// [`ScenarioEngine::vars`] and [`ScenarioEngine::config`], or borrow them
/// for the duration of a shared-scope call.
#[derive(Debug)]
pub struct ScenarioEngine {
    /// Variable bindings.
    pub vars: Vars,

    /// Effective configuration.
    pub config: Config,

    #[debug(skip)]
    pub(crate) scope: Arc<RunScope>,

    aborted: bool,
}

impl ScenarioEngine {
    pub(crate) const fn new(
        scope: Arc<RunScope>,
        vars: Vars,
        config: Config,
    ) -> Self {
        Self { vars, config, scope, aborted: false }
    }

    /// [`Feature`] the running scenario belongs to.
    #[must_use]
    pub fn feature(&self) -> &Arc<Feature> {
        &self.scope.feature
    }

    /// [`Suite`] this scenario runs in.
    #[must_use]
    pub fn suite(&self) -> &Suite {
        &self.scope.suite
    }

    /// Call nesting depth, `0` for root runs.
    #[must_use]
    pub fn call_depth(&self) -> usize {
        self.scope.depth
    }

    /// Returns the variable bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.vars.get(name)
    }

    /// Binds `name` to the given `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Variable>) {
        _ = self.vars.insert(name.into(), value.into());
    }

    /// Unbinds `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        self.vars.remove(name)
    }

    /// Evaluates the given `expression` against the current variables.
    ///
    /// # Errors
    ///
    /// If the [`Evaluator`] fails.
    ///
    /// [`Evaluator`]: crate::Evaluator
    pub fn eval(&self, expression: &str) -> Result<Variable, EvalError> {
        self.suite().evaluator().eval(expression, &self.vars)
    }

    /// Invokes the callable `function` with the given `args`.
    ///
    /// # Errors
    ///
    /// If `function` isn't callable or fails.
    pub fn invoke(
        &self,
        function: &Variable,
        args: &[Variable],
    ) -> Result<Variable, EvalError> {
        eval::invoke(&**self.suite().evaluator(), function, args, &self.vars)
    }

    /// Stops the scenario after the current step, without failing it.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Indicates whether [`ScenarioEngine::abort()`] was called.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Loads the feature at the given `reference` (`path`, `path@tag` or
    /// `path:line`), relative to the running feature's directory.
    ///
    /// # Errors
    ///
    /// If the feature can't be read or parsed.
    pub async fn read_feature(&self, reference: &str) -> Result<Variable, CallError> {
        let dir = self.feature().path.as_deref().and_then(Path::parent);
        self.suite()
            .load_feature(reference, dir)
            .await
            .map(Variable::Feature)
    }

    /// Sends the given `request` through the suite's [`Transport`] and binds
    /// `response`, `responseStatus` and `responseHeaders`.
    ///
    /// Headers configured via [`Config::headers`] are added unless the
    /// request already carries them.
    ///
    /// # Errors
    ///
    /// If no [`Transport`] is configured, the configured headers function
    /// fails, or the exchange fails or times out.
    ///
    /// [`Transport`]: crate::Transport
    pub async fn http(&mut self, mut request: Request) -> Result<Response, TransportError> {
        let failed = |req: &Request, reason: String| {
            TransportError::failed(&req.method, req.url(), reason)
        };

        let transport = self
            .suite()
            .transport()
            .cloned()
            .ok_or_else(|| failed(&request, "no transport configured".into()))?;

        if let Some(headers) = &self.config.headers {
            let headers = if headers.is_function() {
                self.invoke(headers, &[])
                    .map_err(|e| failed(&request, format!("headers function: {e}")))?
            } else {
                headers.clone()
            };
            for (name, value) in headers.as_map().into_iter().flatten() {
                if request.header(name).is_none() && !value.is_null() {
                    request = request
                        .with_header(name, Variable::Json(value.clone()).as_string());
                }
            }
        }

        let url = request.url();
        tracing::debug!(method = %request.method, %url, "sending request");
        let response =
            tokio::time::timeout(self.config.read_timeout, transport.send(request))
                .await
                .map_err(|_| TransportError::Timeout {
                    url,
                    millis: self.config.read_timeout.as_millis(),
                })??;

        self.set("response", Variable::Json(response.body_value()));
        self.set("responseStatus", Value::from(response.status));
        self.set("responseHeaders", multimap_to_json(&response.headers));
        Ok(response)
    }

    pub(crate) fn into_parts(self) -> (Vars, Config) {
        (self.vars, self.config)
    }
}
