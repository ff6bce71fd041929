// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Mock server routing: inbound requests are served by the best matching
//! scenario of a set of mock features.

pub mod score;

use std::{
    mem,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use derive_more::with_trait::Debug;
use serde_json::{Map, Value};
use tokio::sync::Mutex as AsyncMutex;

pub use self::score::{parse_uri_pattern, path_scores, MatchScore};
use crate::{
    config::Config,
    error::{EvalError, Error},
    feature::{Feature, Scenario, Section},
    runtime::{
        scenario::{run_background, run_mock_scenario},
        RunScope, Suite,
    },
    transport::{multimap_to_json, Request, Response},
    value::{NativeFn, Variable, Vars},
};

/// Methods answered to CORS preflights.
const ALLOWED_METHODS: &str = "GET, HEAD, POST, PUT, DELETE, PATCH";

/// Variables bound for a single request only, never kept as globals.
const REQUEST_SCOPED: &[&str] = &[
    "requestUrlBase",
    "requestUri",
    "requestMethod",
    "requestHeaders",
    "requestParams",
    "request",
    "pathParams",
    "pathMatches",
    "methodIs",
    "paramExists",
    "paramValue",
    "headerContains",
    "typeContains",
    "acceptContains",
    "bodyPath",
    "response",
    "responseStatus",
    "responseHeaders",
    "responseDelay",
];

/// Mock feature after its background ran.
#[derive(Debug)]
struct MockFeature {
    scope: Arc<RunScope>,
}

/// State shared by all requests, guarded by a single lock.
#[derive(Debug, Default)]
struct State {
    globals: Vars,
    configs: Vec<Config>,
}

/// Serves [`Request`]s from the scenarios of mock features.
///
/// Every scenario's name (plus description) is a match expression over the
/// request. The scenario with the greatest [`MatchScore`] wins, ties going
/// to the first registered one. A scenario with an empty expression is a
/// default, used only if nothing else matches.
///
/// Requests are handled one at a time.
#[derive(Debug)]
pub struct MockHandler {
    suite: Suite,
    features: Vec<MockFeature>,
    cors: bool,
    path_prefix: String,
    state: AsyncMutex<State>,
}

impl MockHandler {
    /// Initializes a [`MockHandler`], running the background of every
    /// feature once with the given `args`.
    ///
    /// # Errors
    ///
    /// If any background fails.
    pub async fn new<I>(suite: Suite, features: I, args: Option<Vars>) -> Result<Self, Error>
    where
        I: IntoIterator<Item = Arc<Feature>>,
    {
        let mut state = State::default();
        let mut mocks = Vec::new();
        let mut cors = false;

        for feature in features {
            let scope = Arc::new(RunScope {
                suite: suite.clone(),
                feature: Arc::clone(&feature),
                call_once: Arc::default(),
                depth: 0,
            });
            let template = Scenario { line: feature.line, ..Scenario::default() };
            let vars = args.clone().unwrap_or_default();
            let (vars, config) =
                run_background(Arc::clone(&scope), &template, vars, suite.config().clone())
                    .await
                    .map_err(|failed| {
                        let (line, message) = failed
                            .steps
                            .iter()
                            .find_map(|s| Some((s.step.line, s.outcome.error()?.to_string())))
                            .unwrap_or_default();
                        tracing::error!(
                            "mock-server background failed - {}:{line}",
                            feature.display_name(),
                        );
                        Error::mock_init(feature.display_name(), line, message)
                    })?;

            cors |= config.cors;
            state.globals.extend(vars);
            state.configs.push(config);
            tracing::info!(feature = %feature.display_name(), "mock server initialized");
            mocks.push(MockFeature { scope });
        }

        Ok(Self {
            suite,
            features: mocks,
            cors,
            path_prefix: String::new(),
            state: AsyncMutex::new(state),
        })
    }

    /// Strips the given `prefix` from request paths before matching.
    #[must_use]
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    /// Indicates whether CORS is enabled by any mock feature.
    #[must_use]
    pub const fn is_cors_enabled(&self) -> bool {
        self.cors
    }

    /// Current global variables.
    pub async fn globals(&self) -> Vars {
        self.state.lock().await.globals.clone()
    }

    /// Serves the given `request`.
    pub async fn handle(&self, mut request: Request) -> Response {
        if self.cors && request.is_preflight() {
            return preflight(&request);
        }

        let mut state = self.state.lock().await;

        if let Some(path) = request.path.strip_prefix(self.path_prefix.as_str()) {
            request.path = path.to_owned();
        }
        let request = Arc::new(request);
        let mut vars = state.globals.clone();
        bind_request(&mut vars, &request);

        let Some((index, scenario, path_params)) = self.select(&request, &vars) else {
            tracing::warn!(
                method = %request.method,
                path = %request.path,
                "no scenarios matched, returning 404",
            );
            return Response::text(404, "no matching scenarios in backend feature files");
        };

        bind_helpers(&mut vars, &request, &Arc::default());
        _ = vars.insert("pathParams".into(), Value::Object(path_params).into());

        let scope = Arc::clone(&self.features[index].scope);
        let config = state.configs[index].clone();
        let line = scenario.line;
        let (engine, failure) = match run_mock_scenario(scope, scenario, vars, config).await {
            Ok(engine) => (engine, None),
            Err((e, engine)) => (engine, Some(e)),
        };

        let mut engine = engine;
        let extra_headers = match engine.config.response_headers.clone() {
            Some(f) if f.is_function() => match engine.invoke(&f, &[]) {
                Ok(headers) => Some(headers),
                Err(e) => {
                    tracing::warn!("response headers function failed: {e}");
                    None
                }
            },
            other => other,
        };
        let mut take = |name: &str| engine.remove(name);
        let body = take("response");
        let status = take("responseStatus");
        let headers = take("responseHeaders");
        let delay = take("responseDelay");

        let (mut vars, config) = engine.into_parts();
        for name in REQUEST_SCOPED {
            _ = vars.remove(*name);
        }
        state.globals.extend(vars);
        state.configs[index] = config;
        drop(state);

        if let Some(e) = failure {
            let feature = self.features[index].scope.feature.display_name();
            tracing::error!("server-side scenario failed, {feature}:{line}\n{e}");
            return Response::text(500, e.to_string());
        }

        let status = status
            .and_then(|s| s.as_i64())
            .and_then(|s| u16::try_from(s).ok())
            .unwrap_or(200);
        let mut response = Response::new(status);
        for headers in [headers, extra_headers].into_iter().flatten() {
            for (name, value) in headers.as_map().into_iter().flatten() {
                if !response.has_header(name) {
                    set_header(&mut response, name, value);
                }
            }
        }
        if self.cors && !response.has_header("Access-Control-Allow-Origin") {
            response = response.with_header("Access-Control-Allow-Origin", "*");
        }
        response.delay = delay
            .and_then(|d| d.as_i64())
            .and_then(|d| u64::try_from(d).ok())
            .map(Duration::from_millis);
        set_body(response, body)
    }

    /// Evaluates the match expression of every scenario, returning the
    /// winner's feature index, the scenario and its path params.
    fn select(
        &self,
        request: &Arc<Request>,
        vars: &Vars,
    ) -> Option<(usize, Scenario, Map<String, Value>)> {
        let evaluator = self.suite.evaluator();
        let mut best: Option<(MatchScore, usize, &Scenario, Map<String, Value>)> = None;
        let mut default = None;

        for (index, mock) in self.features.iter().enumerate() {
            let feature = &mock.scope.feature;
            for section in &feature.sections {
                let scenario = match section {
                    Section::Scenario(s) => s,
                    Section::Outline(o) => {
                        tracing::warn!(
                            "skipping scenario outline - {}:{}",
                            feature.display_name(),
                            o.line,
                        );
                        continue;
                    }
                };

                let expression = format!(
                    "{}{}",
                    scenario.name,
                    scenario.description.as_deref().unwrap_or_default(),
                );
                let expression = expression.trim();
                if expression.is_empty() {
                    if default.is_none() {
                        default = Some((index, scenario));
                    }
                    continue;
                }

                let recorded = Arc::new(Mutex::new(Recorded::default()));
                let mut vars = vars.clone();
                bind_helpers(&mut vars, request, &recorded);
                match evaluator.eval(expression, &vars) {
                    Ok(Variable::Json(Value::Bool(true))) => {
                        let Recorded { score, path_params } = mem::take(
                            &mut *recorded.lock().unwrap_or_else(PoisonError::into_inner),
                        );
                        tracing::debug!(
                            line = scenario.line,
                            score = ?score.to_vec(),
                            "scenario matched: {expression}",
                        );
                        if best.as_ref().map_or(true, |(b, ..)| score > *b) {
                            best = Some((score, index, scenario, path_params));
                        }
                    }
                    Ok(_) => {
                        tracing::trace!(line = scenario.line, "scenario skipped: {expression}");
                    }
                    Err(e) => tracing::warn!(
                        line = scenario.line,
                        "scenario match evaluation failed: {expression} - {e}",
                    ),
                }
            }
        }

        if let Some((_, index, scenario, params)) = best {
            return Some((index, scenario.clone(), params));
        }
        default.map(|(index, scenario)| {
            tracing::debug!(line = scenario.line, "default scenario matched");
            (index, scenario.clone(), Map::new())
        })
    }
}

/// What the match helpers observed during one evaluation.
#[derive(Debug, Default)]
struct Recorded {
    score: MatchScore,
    path_params: Map<String, Value>,
}

fn preflight(request: &Request) -> Response {
    let mut response = Response::new(200)
        .with_header("Allow", ALLOWED_METHODS)
        .with_header("Access-Control-Allow-Origin", "*")
        .with_header("Access-Control-Allow-Methods", ALLOWED_METHODS);
    for value in request.header_values("Access-Control-Request-Headers") {
        response = response.with_header("Access-Control-Allow-Headers", value);
    }
    response
}

fn bind_request(vars: &mut Vars, request: &Request) {
    let mut set = |name: &str, value: Value| {
        _ = vars.insert(name.into(), value.into());
    };
    set("requestUrlBase", request.url_base.clone().into());
    set("requestUri", request.path.clone().into());
    set("requestMethod", request.method.clone().into());
    set("requestHeaders", multimap_to_json(&request.headers));
    set("requestParams", multimap_to_json(&request.params));
    set("request", request.body_value());
}

/// Binds the match helper functions, recording into `recorded`.
fn bind_helpers(vars: &mut Vars, request: &Arc<Request>, recorded: &Arc<Mutex<Recorded>>) {
    let helpers: [(&'static str, HelperFn); 8] = [
        ("pathMatches", |req, rec, args| {
            let pattern = arg(args, 0);
            let Some(params) = parse_uri_pattern(&pattern, &req.path) else {
                return Ok(false.into());
            };
            rec.score.path = path_scores(&pattern);
            rec.path_params = params;
            Ok(true.into())
        }),
        ("methodIs", |req, rec, args| {
            let matched = req.method.eq_ignore_ascii_case(&arg(args, 0));
            if matched {
                rec.score.method = 1;
            }
            Ok(matched.into())
        }),
        ("paramExists", |req, rec, args| {
            let exists = req.params.contains_key(&arg(args, 0));
            if exists {
                rec.score.query += 1;
            }
            Ok(exists.into())
        }),
        ("paramValue", |req, rec, args| {
            Ok(match req.param(&arg(args, 0)) {
                Some(value) => {
                    rec.score.query += 1;
                    value.into()
                }
                None => Variable::NULL,
            })
        }),
        ("headerContains", |req, rec, args| {
            let needle = arg(args, 1);
            let found = req
                .header_values(&arg(args, 0))
                .iter()
                .any(|v| v.contains(needle.as_str()));
            if found {
                rec.score.header += 1;
            }
            Ok(found.into())
        }),
        ("typeContains", |req, rec, args| {
            Ok(header_contains(req, rec, "Content-Type", &arg(args, 0)).into())
        }),
        ("acceptContains", |req, rec, args| {
            Ok(header_contains(req, rec, "Accept", &arg(args, 0)).into())
        }),
        ("bodyPath", |req, _, args| {
            Ok(body_path(&req.body_value(), &arg(args, 0)).into())
        }),
    ];
    for (name, func) in helpers {
        let native = helper(name, func, request, recorded);
        _ = vars.insert(name.into(), Variable::Native(native));
    }
}

/// Signature of a match helper.
type HelperFn = fn(&Request, &mut Recorded, &[Variable]) -> Result<Variable, EvalError>;

fn helper(
    name: &'static str,
    func: HelperFn,
    request: &Arc<Request>,
    recorded: &Arc<Mutex<Recorded>>,
) -> NativeFn {
    let request = Arc::clone(request);
    let recorded = Arc::clone(recorded);
    NativeFn::new(name, move |args: &[Variable]| {
        let mut recorded = recorded.lock().unwrap_or_else(PoisonError::into_inner);
        func(&request, &mut recorded, args)
    })
}

fn header_contains(req: &Request, rec: &mut Recorded, name: &str, text: &str) -> bool {
    let found = req.header(name).is_some_and(|v| v.contains(text));
    if found {
        rec.score.header += 1;
    }
    found
}

/// Renders the argument at `index` as a string, empty if missing.
fn arg(args: &[Variable], index: usize) -> String {
    args.get(index).map(Variable::as_string).unwrap_or_default()
}

/// Resolves a simple `a.b.0.c` path (optionally prefixed with `$.`) in the
/// `body`, or `null`.
fn body_path(body: &Value, path: &str) -> Value {
    let path = path.strip_prefix("$.").or_else(|| path.strip_prefix('$')).unwrap_or(path);
    path.split('.')
        .filter(|s| !s.is_empty())
        .try_fold(body, |value, key| match value {
            Value::Object(map) => map.get(key),
            Value::Array(list) => key.parse::<usize>().ok().and_then(|i| list.get(i)),
            _ => None,
        })
        .cloned()
        .unwrap_or(Value::Null)
}

fn set_header(response: &mut Response, name: &str, value: &Value) {
    let values = match value {
        Value::Null => return,
        Value::Array(list) => list
            .iter()
            .map(|v| Variable::Json(v.clone()).as_string())
            .collect(),
        other => vec![Variable::Json(other.clone()).as_string()],
    };
    _ = response.headers.insert(name.to_owned(), values);
}

fn set_body(response: Response, body: Option<Variable>) -> Response {
    let (bytes, content_type) = match body {
        None | Some(Variable::Json(Value::Null)) => return response,
        Some(Variable::Json(Value::String(text))) => (text.into_bytes(), "text/plain"),
        Some(Variable::Json(json)) => (json.to_string().into_bytes(), "application/json"),
        Some(other) => (other.as_string().into_bytes(), "text/plain"),
    };
    let response = if response.has_header("Content-Type") {
        response
    } else {
        response.with_header("Content-Type", content_type)
    };
    response.with_body(bytes)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn resolves_body_paths() {
        let body = json!({"cat": {"name": "Billie", "kittens": [{"id": 7}]}});

        assert_eq!(body_path(&body, "cat.name"), json!("Billie"));
        assert_eq!(body_path(&body, "$.cat.kittens.0.id"), json!(7));
        assert_eq!(body_path(&body, "cat.missing"), Value::Null);
        assert_eq!(body_path(&json!("text"), "a"), Value::Null);
    }

    #[test]
    fn preflight_copies_requested_headers() {
        let request = Request::new("options", "/cats")
            .with_header("Access-Control-Request-Headers", "X-Token");

        let response = preflight(&request);

        assert_eq!(response.status, 200);
        assert_eq!(response.header("Allow"), Some(ALLOWED_METHODS));
        assert_eq!(response.header("Access-Control-Allow-Methods"), Some(ALLOWED_METHODS));
        assert_eq!(response.header("access-control-allow-origin"), Some("*"));
        assert_eq!(response.header("Access-Control-Allow-Headers"), Some("X-Token"));
    }

    #[test]
    fn json_bodies_get_content_type() {
        let response = set_body(Response::new(200), Some(json!({"id": 1}).into()));
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.body_value(), json!({"id": 1}));

        let response = set_body(
            Response::new(200).with_header("content-type", "text/xml"),
            Some(json!("<cat/>").into()),
        );
        assert_eq!(response.header("Content-Type"), Some("text/xml"));
        assert_eq!(response.body_text(), "<cat/>");

        let response = set_body(Response::new(204), None);
        assert!(response.body.is_empty());
        assert!(!response.has_header("Content-Type"));
    }

    #[test]
    fn helpers_record_scores() {
        let request = Arc::new(
            Request::new("GET", "/cats/1")
                .with_param("name", "Billie")
                .with_header("Accept", "application/json"),
        );
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut vars = Vars::new();
        bind_helpers(&mut vars, &request, &recorded);
        let call = |name: &str, args: &[Variable]| match vars.get(name) {
            Some(Variable::Native(f)) => f.call(args).unwrap(),
            _ => panic!("`{name}` is not bound"),
        };

        assert_eq!(call("pathMatches", &["/cats/{id}".into()]), true.into());
        assert_eq!(call("methodIs", &["get".into()]), true.into());
        assert_eq!(call("paramValue", &["name".into()]), "Billie".into());
        assert_eq!(call("paramExists", &["age".into()]), false.into());
        assert_eq!(call("acceptContains", &["json".into()]), true.into());
        assert_eq!(call("typeContains", &["json".into()]), false.into());

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.score.to_vec(), [1, 0, 1, 1, 1]);
        assert_eq!(Value::Object(recorded.path_params.clone()), json!({"id": "1"}));
    }
}
