//! Shared fixture: a tiny expression evaluator, a step registry and a
//! recording transport.

#![allow(dead_code, unreachable_pub)]

use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use cucumber_api::{
    error::{EvalError, StepError, TransportError},
    feature::Feature,
    parser::Basic,
    Context, Evaluator, FunctionSource, Registry, Request, Response,
    RuntimeHook, ScenarioEngine, ScenarioResult, StepResult, Transport,
    Variable, Vars,
};
use futures::future::BoxFuture;
use regex::Regex;
use serde_json::Value;

/// Evaluates a minimal expression language:
///
/// - `a && b`, `a == b`, `a != b`;
/// - `f(x)` calls of bound functions with zero or one argument;
/// - `'text'`, numbers, `true`/`false`/`null` and JSON literals;
/// - variable names with `.field` access.
///
/// Functions are written as `x => <expression>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TestEvaluator;

impl Evaluator for TestEvaluator {
    fn eval(&self, expression: &str, vars: &Vars) -> Result<Variable, EvalError> {
        eval(expression.trim(), vars)
    }

    fn invoke(
        &self,
        function: &FunctionSource,
        args: &[Variable],
        vars: &Vars,
    ) -> Result<Variable, EvalError> {
        let (param, body) = function
            .source
            .split_once("=>")
            .ok_or_else(|| EvalError::failed(&function.source, "not a function"))?;
        let mut scope = vars.clone();
        scope.extend(function.closure.iter().map(|(k, v)| (k.clone(), v.clone())));
        let param = param.trim().trim_matches(|c| c == '(' || c == ')');
        if !param.is_empty() {
            _ = scope.insert(param.into(), args.first().cloned().unwrap_or_default());
        }
        eval(body.trim(), &scope)
    }
}

fn eval(expr: &str, vars: &Vars) -> Result<Variable, EvalError> {
    if expr.contains("=>") {
        return Ok(Variable::Function(FunctionSource::new(expr)));
    }
    if let Some((l, r)) = split_top(expr, "&&") {
        let ok = eval(l, vars)?.is_truthy() && eval(r, vars)?.is_truthy();
        return Ok(ok.into());
    }
    if let Some((l, r)) = split_top(expr, "!=") {
        return Ok((eval(l, vars)? != eval(r, vars)?).into());
    }
    if let Some((l, r)) = split_top(expr, "==") {
        return Ok((eval(l, vars)? == eval(r, vars)?).into());
    }
    if let Some(text) = expr.strip_prefix('\'').and_then(|e| e.strip_suffix('\'')) {
        return Ok(text.into());
    }
    if let Ok(json) = serde_json::from_str::<Value>(expr) {
        return Ok(json.into());
    }
    if let Some((name, rest)) = expr.split_once('(') {
        let arg = rest
            .strip_suffix(')')
            .ok_or_else(|| EvalError::failed(expr, "unbalanced call"))?
            .trim();
        let target = lookup(name.trim(), vars)?;
        let args = if arg.is_empty() { Vec::new() } else { vec![eval(arg, vars)?] };
        return cucumber_api::eval::invoke(&TestEvaluator, &target, &args, vars);
    }
    lookup(expr, vars)
}

fn lookup(path: &str, vars: &Vars) -> Result<Variable, EvalError> {
    let mut parts = path.split('.');
    let name = parts.next().unwrap_or_default();
    let root = vars
        .get(name)
        .cloned()
        .ok_or_else(|| EvalError::failed(path, format!("{name} is not defined")))?;
    parts.try_fold(root, |value, key| match value {
        Variable::Json(json) => Ok(json
            .get(key)
            .or_else(|| key.parse::<usize>().ok().and_then(|i| json.get(i)))
            .cloned()
            .unwrap_or_default()
            .into()),
        other => Err(EvalError::failed(path, format!("{other} has no fields"))),
    })
}

/// Splits `expr` at the first `op` outside of quotes, brackets and braces.
fn split_top<'e>(expr: &'e str, op: &str) -> Option<(&'e str, &'e str)> {
    let mut depth = 0_i32;
    let mut quoted = false;
    for (i, c) in expr.char_indices() {
        match c {
            '\'' | '"' => quoted = !quoted,
            '(' | '[' | '{' if !quoted => depth += 1,
            ')' | ']' | '}' if !quoted => depth -= 1,
            _ if !quoted && depth == 0 && expr[i..].starts_with(op) => {
                return Some((expr[..i].trim(), expr[i + op.len()..].trim()));
            }
            _ => {}
        }
    }
    None
}

fn cap(ctx: &Context, i: usize) -> &str {
    ctx.get_capture(i).unwrap_or_default()
}

fn opt_cap(ctx: &Context, i: usize) -> Option<&str> {
    ctx.get_capture(i).filter(|s| !s.is_empty())
}

fn eval_arg(engine: &ScenarioEngine, expr: Option<&str>) -> Result<Option<Variable>, StepError> {
    expr.map(|e| engine.eval(e)).transpose().map_err(Into::into)
}

fn def(engine: &mut ScenarioEngine, ctx: Context) -> BoxFuture<'_, Result<(), StepError>> {
    Box::pin(async move {
        let value = engine.eval(cap(&ctx, 2))?;
        engine.set(cap(&ctx, 1), value);
        Ok(())
    })
}

fn print(engine: &mut ScenarioEngine, ctx: Context) -> BoxFuture<'_, Result<(), StepError>> {
    Box::pin(async move {
        _ = engine.eval(cap(&ctx, 1))?;
        Ok(())
    })
}

fn check(engine: &mut ScenarioEngine, ctx: Context) -> BoxFuture<'_, Result<(), StepError>> {
    Box::pin(async move {
        let actual = engine.eval(cap(&ctx, 1))?;
        let expected = engine.eval(cap(&ctx, 2))?;
        if actual == expected {
            Ok(())
        } else {
            Err(StepError::failed(format!("{actual} != {expected}")))
        }
    })
}

fn delay(_: &mut ScenarioEngine, ctx: Context) -> BoxFuture<'_, Result<(), StepError>> {
    Box::pin(async move {
        let millis = cap(&ctx, 1).parse().unwrap_or_default();
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(())
    })
}

fn fail(_: &mut ScenarioEngine, ctx: Context) -> BoxFuture<'_, Result<(), StepError>> {
    Box::pin(async move { Err(StepError::failed(cap(&ctx, 1))) })
}

fn abort(engine: &mut ScenarioEngine, _: Context) -> BoxFuture<'_, Result<(), StepError>> {
    Box::pin(async move {
        engine.abort();
        Ok(())
    })
}

fn configure(engine: &mut ScenarioEngine, ctx: Context) -> BoxFuture<'_, Result<(), StepError>> {
    Box::pin(async move {
        let value = engine.eval(cap(&ctx, 2))?;
        let config = &mut engine.config;
        match cap(&ctx, 1) {
            "continueOnStepFailure" => {
                config.continue_on_step_failure = match value.as_json() {
                    Some(Value::Bool(true)) => vec!["match".into()],
                    Some(Value::Array(keywords)) => keywords
                        .iter()
                        .filter_map(Value::as_str)
                        .map(ToOwned::to_owned)
                        .collect(),
                    _ => Vec::new(),
                };
            }
            "continueAfter" => config.continue_after_continue_on_step_failure = value.is_truthy(),
            "abortedStepsShouldPass" => config.aborted_steps_should_pass = value.is_truthy(),
            "cors" => config.cors = value.is_truthy(),
            "responseHeaders" => config.response_headers = Some(value),
            "headers" => config.headers = Some(value),
            "afterScenario" => config.after_scenario = Some(value),
            "afterFeature" => config.after_feature = Some(value),
            other => return Err(StepError::failed(format!("unknown config: {other}"))),
        }
        Ok(())
    })
}

fn call(engine: &mut ScenarioEngine, ctx: Context) -> BoxFuture<'_, Result<(), StepError>> {
    Box::pin(async move {
        let target = engine.read_feature(cap(&ctx, 1)).await?;
        let arg = eval_arg(engine, opt_cap(&ctx, 3))?;
        let result = engine.call(target, arg, false).await?;
        engine.set(cap(&ctx, 2), result);
        Ok(())
    })
}

fn shared_call(engine: &mut ScenarioEngine, ctx: Context) -> BoxFuture<'_, Result<(), StepError>> {
    Box::pin(async move {
        let target = engine.read_feature(cap(&ctx, 1)).await?;
        let arg = eval_arg(engine, opt_cap(&ctx, 2))?;
        _ = engine.call(target, arg, true).await?;
        Ok(())
    })
}

fn call_once(engine: &mut ScenarioEngine, ctx: Context) -> BoxFuture<'_, Result<(), StepError>> {
    Box::pin(async move {
        let target = engine.read_feature(cap(&ctx, 1)).await?;
        let result = engine.call_once(&ctx.step.text, target, None, false).await?;
        engine.set(cap(&ctx, 2), result);
        Ok(())
    })
}

fn shared_call_once(
    engine: &mut ScenarioEngine,
    ctx: Context,
) -> BoxFuture<'_, Result<(), StepError>> {
    Box::pin(async move {
        let target = engine.read_feature(cap(&ctx, 1)).await?;
        _ = engine.call_once(&ctx.step.text, target, None, true).await?;
        Ok(())
    })
}

fn call_single(engine: &mut ScenarioEngine, ctx: Context) -> BoxFuture<'_, Result<(), StepError>> {
    Box::pin(async move {
        let key = cap(&ctx, 1).to_owned();
        let target = engine.eval(&key)?;
        let result = engine.call_single(&key, target, None).await?;
        engine.set(cap(&ctx, 2), result);
        Ok(())
    })
}

fn get(engine: &mut ScenarioEngine, ctx: Context) -> BoxFuture<'_, Result<(), StepError>> {
    Box::pin(async move {
        _ = engine.http(Request::new("GET", cap(&ctx, 1))).await?;
        Ok(())
    })
}

fn re(pattern: &str) -> Regex {
    Regex::new(&format!("^{pattern}$")).unwrap()
}

/// [`Registry`] with the fixture steps.
pub fn registry() -> Registry {
    Registry::new()
        .step(re(r"def (\w+) = (.+)"), def)
        .step(re(r"print (.+)"), print)
        .step(re(r"match (.+) == (.+)"), check)
        .step(re(r"delay (\d+)"), delay)
        .step(re(r"fail (.*)"), fail)
        .step(re(r"abort"), abort)
        .step(re(r"configure (\w+) = (.+)"), configure)
        .step(re(r"calling '(.+?)' as (\w+)(?: with (.+))?"), call)
        .step(re(r"shared call '(.+?)'(?: with (.+))?"), shared_call)
        .step(re(r"callonce '(.+?)' as (\w+)"), call_once)
        .step(re(r"shared callonce '(.+?)'"), shared_call_once)
        .step(re(r"callsingle (\w+) as (\w+)"), call_single)
        .step(re(r"get (\S+)"), get)
}

/// Parses a feature fixture under `tests/features/`.
pub async fn feature(name: &str) -> Arc<Feature> {
    let path = Path::new("tests/features").join(name);
    Arc::new(Basic::new().parse_file(&path).await.unwrap())
}

/// [`Transport`] recording every request and answering with its path.
#[derive(Clone, Debug, Default)]
pub struct RecordingTransport {
    pub requests: Arc<Mutex<Vec<Request>>>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let body = serde_json::json!({ "path": request.path });
        self.requests.lock().unwrap().push(request);
        Ok(Response::new(200)
            .with_header("Content-Type", "application/json")
            .with_body(body.to_string()))
    }
}

/// [`RuntimeHook`] recording events, optionally vetoing by name.
#[derive(Clone, Debug, Default)]
pub struct RecordingHook {
    pub events: Arc<Mutex<Vec<String>>>,
    pub veto_feature: bool,
    pub veto_scenario: Option<String>,
}

impl RecordingHook {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl RuntimeHook for RecordingHook {
    fn before_feature(&self, feature: &Feature) -> bool {
        self.push(format!("before feature {}", feature.name));
        !self.veto_feature
    }

    fn after_feature(&self, result: &cucumber_api::FeatureResult) {
        self.push(format!("after feature {}", result.feature));
    }

    fn before_scenario(&self, scenario: &cucumber_api::Scenario) -> bool {
        self.push(format!("before scenario {}", scenario.name));
        self.veto_scenario.as_deref() != Some(scenario.name.as_str())
    }

    fn after_scenario(&self, result: &ScenarioResult) {
        self.push(format!("after scenario {}", result.scenario.name));
    }

    fn after_step(&self, result: &StepResult) {
        self.push(format!("after step {}", result.step.text));
    }
}
