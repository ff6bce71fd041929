// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scenario tags and tag expressions.

use gherkin::tagexpr::TagOperation;
use sealed::sealed;

/// Tag excluding a scenario from root runs.
pub const IGNORE: &str = "ignore";

/// Effective tags of a scenario (feature tags plus its own), normalized
/// without the leading `@`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Tags {
    tags: Vec<String>,
}

impl Tags {
    /// Normalizes the given raw `tags`.
    #[must_use]
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tags: tags
                .into_iter()
                .map(|t| t.as_ref().trim_start_matches('@').to_owned())
                .collect(),
        }
    }

    /// Indicates whether the plain tag `name` (or `name=...`) is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let name = name.trim_start_matches('@');
        self.tags.iter().any(|t| {
            t == name || t.split_once('=').is_some_and(|(k, _)| k == name)
        })
    }

    /// Values of all `@name=a,b` tags, in declaration order.
    #[must_use]
    pub fn values_for(&self, name: &str) -> TagValues<'_> {
        TagValues(
            self.tags
                .iter()
                .filter_map(|t| t.split_once('='))
                .filter(|(k, _)| *k == name)
                .flat_map(|(_, v)| v.split(','))
                .map(str::trim)
                .collect(),
        )
    }

    /// Indicates whether these tags opt out of parallel execution via
    /// `@parallel=false`.
    #[must_use]
    pub fn is_parallel_disabled(&self) -> bool {
        self.values_for("parallel").is_any_of("false")
    }

    /// Evaluates the optional `selector` against these tags. Scenarios
    /// tagged `@ignore` are never selected.
    #[must_use]
    pub fn evaluate(&self, selector: Option<&TagOperation>) -> bool {
        if self.contains(IGNORE) {
            return false;
        }
        selector.map_or(true, |op| {
            // Tag expressions may spell tags with or without the `@`.
            op.eval(
                self.tags
                    .iter()
                    .flat_map(|t| [t.clone(), format!("@{t}")]),
            )
        })
    }

    /// Iterates over the normalized tags.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }
}

/// Values of a `name=value` tag, see [`Tags::values_for()`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TagValues<'t>(Vec<&'t str>);

impl TagValues<'_> {
    /// Indicates whether any value equals one of the given `candidates`.
    #[must_use]
    pub fn is_any_of(&self, candidates: &str) -> bool {
        candidates.split(',').any(|c| self.0.contains(&c.trim()))
    }

    /// Indicates whether no value is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Extension of a [`TagOperation`] allowing to evaluate it.
#[sealed]
pub trait Ext {
    /// Evaluates this [`TagOperation`] for the given `tags`.
    #[must_use]
    fn eval<I, S>(&self, tags: I) -> bool
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S> + Clone;
}

#[sealed]
impl Ext for TagOperation {
    fn eval<I, S>(&self, tags: I) -> bool
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S> + Clone,
    {
        match self {
            Self::And(l, r) => l.eval(tags.clone()) & r.eval(tags),
            Self::Or(l, r) => l.eval(tags.clone()) | r.eval(tags),
            Self::Not(t) => !t.eval(tags),
            Self::Tag(t) => tags.into_iter().any(|tag| tag.as_ref() == t),
        }
    }
}
