// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Ranking of mock scenarios against a request.

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// How specifically a mock scenario matched a request.
///
/// Compared by the path segment scores first, then method, query and header
/// scores. A literal path segment scores `1` and a `{param}` segment `0`, so
/// `/cats/{id}` loses to `/cats/1`. A scenario that never matched a path
/// ranks lowest on the path.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MatchScore {
    /// Per-segment scores of the last matched path pattern.
    pub path: Vec<usize>,

    /// `1` if `methodIs()` matched.
    pub method: usize,

    /// Number of matched `paramExists()`/`paramValue()` checks.
    pub query: usize,

    /// Number of matched header checks.
    pub header: usize,
}

impl MatchScore {
    /// Flat `[path segment scores..., method, query, header]` rendering, for
    /// logs.
    #[must_use]
    pub fn to_vec(&self) -> Vec<usize> {
        self.path
            .iter()
            .copied()
            .chain([self.method, self.query, self.header])
            .collect()
    }
}

impl Ord for MatchScore {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.path, self.method, self.query, self.header).cmp(&(
            &other.path,
            other.method,
            other.query,
            other.header,
        ))
    }
}

impl PartialOrd for MatchScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Matches the request `path` (its query string ignored) against the
/// `pattern`, returning the captured `{param}` segments.
///
/// Segment counts must be equal, empty segments are ignored.
#[must_use]
pub fn parse_uri_pattern(pattern: &str, path: &str) -> Option<Map<String, Value>> {
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    let left = segments(pattern);
    let right = segments(path);
    if left.len() != right.len() {
        return None;
    }

    let mut params = Map::new();
    for (l, r) in left.into_iter().zip(right) {
        if l == r {
            continue;
        }
        let name = l.strip_prefix('{')?.strip_suffix('}')?;
        _ = params.insert(name.to_owned(), Value::String(r.to_owned()));
    }
    Some(params)
}

/// Per-segment scores of the `pattern`: `1` for literals, `0` for
/// `{param}`s.
#[must_use]
pub fn path_scores(pattern: &str) -> Vec<usize> {
    segments(pattern)
        .into_iter()
        .map(|s| usize::from(!(s.starts_with('{') && s.ends_with('}'))))
        .collect()
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn captures_params() {
        let params = parse_uri_pattern("/cats/{id}", "/cats/1").unwrap();
        assert_eq!(Value::Object(params), json!({"id": "1"}));

        let params = parse_uri_pattern("/cats/{id}/", "/cats/1?x=y").unwrap();
        assert_eq!(Value::Object(params), json!({"id": "1"}));

        assert_eq!(parse_uri_pattern("/cats", "/cats").map(|p| p.len()), Some(0));
    }

    #[test]
    fn rejects_mismatches() {
        assert!(parse_uri_pattern("/cats/{id}", "/cats").is_none());
        assert!(parse_uri_pattern("/cats/{id}", "/dogs/1").is_none());
        assert!(parse_uri_pattern("/cats/{id}", "/cats/1/toys").is_none());
    }

    #[test]
    fn scores_literal_segments() {
        assert_eq!(path_scores("/v1/cats/{id}"), [1, 1, 0]);
        assert_eq!(path_scores("/"), Vec::<usize>::new());
    }

    #[test]
    fn query_matches_outrank_method_only() {
        let plain = MatchScore { path: vec![1, 0, 0], method: 1, ..MatchScore::default() };
        let with_query = MatchScore { query: 2, ..plain.clone() };

        assert_eq!(plain.to_vec(), [1, 0, 0, 1, 0, 0]);
        assert_eq!(with_query.to_vec(), [1, 0, 0, 1, 2, 0]);
        assert!(plain < with_query);
    }

    #[test]
    fn literal_path_outranks_param() {
        let literal = MatchScore { path: path_scores("/cats/1"), ..MatchScore::default() };
        let param = MatchScore {
            path: path_scores("/cats/{id}"),
            method: 1,
            query: 3,
            header: 3,
        };

        assert!(literal > param);
    }

    #[test]
    fn unchecked_path_ranks_lowest() {
        let by_path = MatchScore { path: path_scores("/cats/{id}"), ..MatchScore::default() };
        let by_method = MatchScore { method: 1, query: 1, ..MatchScore::default() };

        assert!(by_path > by_method);
    }
}
