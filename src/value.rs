// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Runtime values bound to variable names.

use std::{fmt, sync::Arc};

use derive_more::with_trait::Debug;
use linked_hash_map::LinkedHashMap;
use serde_json::{Map, Value};

use crate::{error::EvalError, feature::Feature};

/// Ordered variable bindings of a running scenario.
pub type Vars = LinkedHashMap<String, Variable>;

/// Host function exposed to an [`Evaluator`] as a callable value.
///
/// [`Evaluator`]: crate::Evaluator
pub type NativeFnPtr =
    dyn Fn(&[Variable]) -> Result<Variable, EvalError> + Send + Sync;

/// Value a variable is bound to.
#[derive(Clone, Debug)]
pub enum Variable {
    /// Plain JSON-like data.
    Json(Value),

    /// Function defined in the embedded expression language.
    Function(FunctionSource),

    /// Function implemented by the host (e.g. mock match helpers).
    Native(NativeFn),

    /// Feature that can be called.
    #[debug("Feature({})", _0.feature.name)]
    Feature(FeatureRef),
}

/// Callable reference to a [`Feature`], optionally narrowed to some of its
/// scenarios.
#[derive(Clone, Debug)]
pub struct FeatureRef {
    /// Referenced [`Feature`].
    pub feature: Arc<Feature>,

    /// Scenarios to run when called, all of them if [`None`].
    pub selector: Option<CallSelector>,
}

/// Narrows a called [`Feature`] to some of its scenarios.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CallSelector {
    /// Scenarios carrying the tag (`file.feature@name`).
    Tag(String),

    /// Scenario or outline declared at the line (`file.feature:12`).
    Line(usize),
}

impl FeatureRef {
    /// References the whole `feature`.
    #[must_use]
    pub const fn new(feature: Arc<Feature>) -> Self {
        Self { feature, selector: None }
    }

    /// Narrows this reference with the given `selector`.
    #[must_use]
    pub fn with_selector(mut self, selector: Option<CallSelector>) -> Self {
        self.selector = selector;
        self
    }
}

impl CallSelector {
    /// Splits a `path@tag` or `path:line` reference into the path and its
    /// selector.
    #[must_use]
    pub fn split(reference: &str) -> (&str, Option<Self>) {
        if let Some((path, tag)) = reference.rsplit_once('@') {
            if !tag.is_empty() && !tag.contains(['/', '\\']) {
                return (path, Some(Self::Tag(tag.to_owned())));
            }
        }
        if let Some((path, line)) = reference.rsplit_once(':') {
            if let Ok(line) = line.parse() {
                return (path, Some(Self::Line(line)));
            }
        }
        (reference, None)
    }
}

/// Function kept as its source text plus the bindings it closes over.
///
/// Cached values (`callonce`, `callSingle`) may outlive the evaluator
/// context that created them, so functions never carry evaluator handles:
/// an [`Evaluator`] rebuilds a callable from the source on every
/// invocation.
///
/// [`Evaluator`]: crate::Evaluator
#[derive(Clone, Debug, Default)]
pub struct FunctionSource {
    /// Source text of the function.
    pub source: String,

    /// Bindings visible to the function body.
    #[debug("{} binding(s)", closure.len())]
    pub closure: Arc<Vars>,
}

impl FunctionSource {
    /// Creates a [`FunctionSource`] closing over nothing.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), closure: Arc::default() }
    }

    /// Creates a [`FunctionSource`] closing over the given `closure`.
    #[must_use]
    pub fn with_closure(source: impl Into<String>, closure: Vars) -> Self {
        Self { source: source.into(), closure: Arc::new(closure) }
    }
}

/// Named host function.
#[derive(Clone, Debug)]
pub struct NativeFn {
    /// Name used for logging.
    pub name: String,

    #[debug(skip)]
    func: Arc<NativeFnPtr>,
}

impl NativeFn {
    /// Wraps the given closure.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Variable]) -> Result<Variable, EvalError>
            + Send
            + Sync
            + 'static,
    {
        Self { name: name.into(), func: Arc::new(func) }
    }

    /// Calls this function.
    ///
    /// # Errors
    ///
    /// Whatever the wrapped closure returns.
    pub fn call(&self, args: &[Variable]) -> Result<Variable, EvalError> {
        (self.func)(args)
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Json(l), Self::Json(r)) => l == r,
            (Self::Function(l), Self::Function(r)) => l.source == r.source,
            (Self::Native(l), Self::Native(r)) => Arc::ptr_eq(&l.func, &r.func),
            (Self::Feature(l), Self::Feature(r)) => {
                Arc::ptr_eq(&l.feature, &r.feature) && l.selector == r.selector
            }
            _ => false,
        }
    }
}

impl Default for Variable {
    fn default() -> Self {
        Self::NULL
    }
}

impl From<Value> for Variable {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<&str> for Variable {
    fn from(value: &str) -> Self {
        Self::Json(Value::String(value.to_owned()))
    }
}

impl From<String> for Variable {
    fn from(value: String) -> Self {
        Self::Json(Value::String(value))
    }
}

impl From<usize> for Variable {
    fn from(value: usize) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<bool> for Variable {
    fn from(value: bool) -> Self {
        Self::Json(Value::Bool(value))
    }
}

impl Variable {
    /// JSON `null`.
    pub const NULL: Self = Self::Json(Value::Null);

    /// Indicates whether this is JSON `null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Json(Value::Null))
    }

    /// Indicates whether this is a JSON object.
    #[must_use]
    pub const fn is_map(&self) -> bool {
        matches!(self, Self::Json(Value::Object(_)))
    }

    /// Indicates whether this is a JSON array.
    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::Json(Value::Array(_)))
    }

    /// Indicates whether this can be invoked through an [`Evaluator`].
    ///
    /// [`Evaluator`]: crate::Evaluator
    #[must_use]
    pub const fn is_function(&self) -> bool {
        matches!(self, Self::Function(_) | Self::Native(_))
    }

    /// Indicates whether this is JSON-like data that can be persisted.
    #[must_use]
    pub const fn is_json_like(&self) -> bool {
        self.is_map() || self.is_list()
    }

    /// Returns the JSON object, if this is one.
    #[must_use]
    pub const fn as_map(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Json(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Returns the JSON data, if this is data.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Interprets this as a boolean the way match expressions do: `false`,
    /// `null`, `0` and `""` are falsy, everything else is truthy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Json(Value::Null | Value::Bool(false)) => false,
            Self::Json(Value::Number(n)) => n.as_f64() != Some(0.0),
            Self::Json(Value::String(s)) => !s.is_empty(),
            _ => true,
        }
    }

    /// Interprets this as an integer, parsing strings if needed.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Json(Value::Number(n)) => {
                n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))
            }
            Self::Json(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Renders this as a string: strings are unquoted, other JSON is
    /// compact JSON, functions render as their source.
    #[must_use]
    pub fn as_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(Value::String(s)) => f.write_str(s),
            Self::Json(v) => write!(f, "{v}"),
            Self::Function(func) => f.write_str(&func.source),
            Self::Native(func) => write!(f, "[native {}]", func.name),
            Self::Feature(r) => write!(f, "[feature {}]", r.feature.name),
        }
    }
}

/// Converts the JSON-like `vars` into a JSON object, dropping functions
/// and features.
#[must_use]
pub fn vars_to_json(vars: &Vars) -> Value {
    Value::Object(
        vars.iter()
            .filter_map(|(k, v)| v.as_json().map(|j| (k.clone(), j.clone())))
            .collect(),
    )
}

/// Binds every entry of the JSON object `map` into `vars`.
pub fn bind_json_map(vars: &mut Vars, map: &Map<String, Value>) {
    for (k, v) in map {
        _ = vars.insert(k.clone(), Variable::Json(v.clone()));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn renders_strings_unquoted_and_json_compact() {
        assert_eq!(Variable::from("abc").as_string(), "abc");
        assert_eq!(Variable::from(json!(5)).as_string(), "5");
        assert_eq!(
            Variable::from(json!({"a": [1, 2]})).as_string(),
            r#"{"a":[1,2]}"#,
        );
    }

    #[test]
    fn truthiness() {
        assert!(!Variable::NULL.is_truthy());
        assert!(!Variable::from(false).is_truthy());
        assert!(!Variable::from(json!(0)).is_truthy());
        assert!(!Variable::from("").is_truthy());
        assert!(Variable::from(json!({})).is_truthy());
        assert!(Variable::Function(FunctionSource::new("x => x")).is_truthy());
    }

    #[test]
    fn native_functions_compare_by_identity() {
        let f = NativeFn::new("f", |_| Ok(Variable::NULL));
        let g = NativeFn::new("f", |_| Ok(Variable::NULL));

        assert_eq!(Variable::Native(f.clone()), Variable::Native(f));
        assert_ne!(
            Variable::Native(g),
            Variable::Native(NativeFn::new("f", |_| Ok(Variable::NULL))),
        );
    }

    #[test]
    fn splits_call_selectors() {
        assert_eq!(
            CallSelector::split("cats.feature@create"),
            ("cats.feature", Some(CallSelector::Tag("create".into()))),
        );
        assert_eq!(
            CallSelector::split("cats.feature:12"),
            ("cats.feature", Some(CallSelector::Line(12))),
        );
        assert_eq!(CallSelector::split("classpath:cats.feature").1, None);
        assert_eq!(CallSelector::split("cats.feature"), ("cats.feature", None));
    }

    #[test]
    fn vars_to_json_drops_functions() {
        let mut vars = Vars::new();
        _ = vars.insert("a".into(), json!(1).into());
        _ = vars.insert(
            "f".into(),
            Variable::Function(FunctionSource::new("() => 1")),
        );

        assert_eq!(vars_to_json(&vars), json!({"a": 1}));
    }
}
