// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! HTTP exchange model and the [`Transport`] seam.
//!
//! The same [`Request`]/[`Response`] pair is used by scenario steps sending
//! requests through a [`Transport`] and by the [`MockHandler`] answering
//! them.
//!
//! [`MockHandler`]: crate::mock::MockHandler

use std::time::Duration;

use async_trait::async_trait;
use linked_hash_map::LinkedHashMap;
use serde_json::{Map, Value};

use crate::error::TransportError;

/// Multi-valued, insertion-ordered header or parameter map.
pub type MultiMap = LinkedHashMap<String, Vec<String>>;

/// HTTP client used by scenario steps.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the given `request` and awaits its [`Response`].
    ///
    /// # Errors
    ///
    /// If the exchange fails or times out.
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

/// Outgoing or inbound HTTP request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Request {
    /// Upper-case method.
    pub method: String,

    /// Scheme, host and port (`http://localhost:8080`).
    pub url_base: String,

    /// Path, starting with `/`.
    pub path: String,

    /// Query parameters.
    pub params: MultiMap,

    /// Headers, names as sent.
    pub headers: MultiMap,

    /// Raw body.
    pub body: Vec<u8>,
}

/// HTTP response.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    /// Status code.
    pub status: u16,

    /// Headers, names as sent.
    pub headers: MultiMap,

    /// Raw body.
    pub body: Vec<u8>,

    /// Delay the server should wait before answering.
    pub delay: Option<Duration>,
}

impl Request {
    /// Creates a new [`Request`] for the given `method` and `path`.
    #[must_use]
    pub fn new(method: impl AsRef<str>, path: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().to_uppercase(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Sets the URL base (scheme, host, port).
    #[must_use]
    pub fn with_url_base(mut self, base: impl Into<String>) -> Self {
        self.url_base = base.into();
        self
    }

    /// Appends a header value.
    #[must_use]
    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        append(&mut self.headers, name.into(), value.into());
        self
    }

    /// Appends a query parameter value.
    #[must_use]
    pub fn with_param(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        append(&mut self.params, name.into(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Full URL without the query string.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}{}", self.url_base, self.path)
    }

    /// First value of the header `name`, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        first_ci(&self.headers, name)
    }

    /// All values of the header `name`, case-insensitively.
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .flat_map(|(_, v)| v.iter().map(String::as_str))
            .collect()
    }

    /// First value of the query parameter `name`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// Indicates whether this is a CORS preflight.
    #[must_use]
    pub fn is_preflight(&self) -> bool {
        self.method == "OPTIONS"
    }

    /// Body decoded as JSON, falling back to a string, or `null` if empty.
    #[must_use]
    pub fn body_value(&self) -> Value {
        if self.body.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&self.body).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&self.body).into_owned())
        })
    }
}

impl Response {
    /// Creates an empty [`Response`] with the given `status`.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self { status, headers: MultiMap::new(), body: Vec::new(), delay: None }
    }

    /// Creates a plain-text [`Response`].
    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("Content-Type", "text/plain")
            .with_body(body.into())
    }

    /// Appends a header value.
    #[must_use]
    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        append(&mut self.headers, name.into(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of the header `name`, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        first_ci(&self.headers, name)
    }

    /// Indicates whether the header `name` is present, case-insensitively.
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
    }

    /// Body as lossy UTF-8 text.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body decoded as JSON, falling back to a string.
    #[must_use]
    pub fn body_value(&self) -> Value {
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| Value::String(self.body_text()))
    }
}

/// Renders a [`MultiMap`] as a JSON object of string arrays.
#[must_use]
pub fn multimap_to_json(map: &MultiMap) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    Value::Array(v.iter().cloned().map(Value::String).collect()),
                )
            })
            .collect::<Map<_, _>>(),
    )
}

fn append(map: &mut MultiMap, name: String, value: String) {
    map.entry(name).or_insert_with(Vec::new).push(value);
}

fn first_ci<'m>(map: &'m MultiMap, name: &str) -> Option<&'m str> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .and_then(|(_, v)| v.first())
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn looks_up_headers_case_insensitively() {
        let req = Request::new("get", "/cats")
            .with_header("Content-Type", "application/json")
            .with_header("X-Trace", "a")
            .with_header("x-trace", "b");

        assert_eq!(req.method, "GET");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header_values("X-TRACE"), vec!["a", "b"]);
        assert_eq!(req.header("accept"), None);
    }

    #[test]
    fn decodes_body() {
        let json_body = Request::new("POST", "/").with_body(r#"{"a":1}"#);
        let text_body = Request::new("POST", "/").with_body("hello");

        assert_eq!(json_body.body_value(), json!({"a": 1}));
        assert_eq!(text_body.body_value(), json!("hello"));
        assert_eq!(Request::new("GET", "/").body_value(), Value::Null);
    }

    #[test]
    fn renders_multimap() {
        let req = Request::new("GET", "/").with_param("q", "1").with_param("q", "2");

        assert_eq!(multimap_to_json(&req.params), json!({"q": ["1", "2"]}));
        assert_eq!(req.param("q"), Some("1"));
    }
}
