// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Ordered [`Registry`] of step handlers.

use async_trait::async_trait;
use derive_more::with_trait::Debug;
use regex::Regex;

use super::{Context, Handler, StepDispatcher};
use crate::{error::StepError, feature::Step, runtime::ScenarioEngine};

/// Ordered list of `(pattern, handler)` pairs, the default
/// [`StepDispatcher`].
///
/// A pattern matches when it matches a prefix of the step text (anchored at
/// the start, not necessarily at the end). Every step has to match exactly
/// one pattern.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    #[debug("{:?}", entries.iter().map(|(re, _)| re.as_str()).collect::<Vec<_>>())]
    entries: Vec<(Regex, Handler)>,
}

impl Registry {
    /// Creates a new empty [`Registry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the `handler` for steps matching the `regex`.
    #[must_use]
    pub fn step(mut self, regex: Regex, handler: Handler) -> Self {
        self.entries.push((regex, handler));
        self
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Indicates whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the [`Handler`] matching the given `step`, with its
    /// [`Context`].
    ///
    /// # Errors
    ///
    /// If no pattern or more than one pattern matches.
    pub fn find(&self, step: &Step) -> Result<(Handler, Context), StepError> {
        let mut found = self
            .entries
            .iter()
            .filter_map(|(re, handler)| {
                re.captures(&step.text)
                    .filter(|c| c.get(0).is_some_and(|m| m.start() == 0))
                    .map(|c| (re, c, *handler))
            })
            .collect::<Vec<_>>();

        let (re, captures, handler) = match found.len() {
            0 => return Err(StepError::no_match(&step.text)),
            1 => match found.pop() {
                Some(only) => only,
                None => return Err(StepError::no_match(&step.text)),
            },
            n => return Err(StepError::ambiguous(&step.text, n)),
        };

        let matches = re
            .capture_names()
            .zip(captures.iter())
            .map(|(name, m)| {
                (
                    name.map(str::to_owned),
                    m.map_or_else(String::new, |m| m.as_str().to_owned()),
                )
            })
            .collect();

        Ok((handler, Context::new(step.clone(), matches)))
    }
}

#[async_trait]
impl StepDispatcher for Registry {
    async fn dispatch(
        &self,
        step: &Step,
        engine: &mut ScenarioEngine,
    ) -> Result<(), StepError> {
        let (handler, ctx) = self.find(step)?;
        handler(engine, ctx).await
    }
}
