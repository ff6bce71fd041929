// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Context`] handed to a matched step handler.

use crate::feature::{Step, Table};

/// Name of a capture group, if it has one.
pub type CaptureName = Option<String>;

/// Context of a step handler execution.
#[derive(Clone, Debug)]
pub struct Context {
    /// [`Step`] matched to the handler.
    pub step: Step,

    /// Capture groups of the matched pattern, the whole match first.
    pub matches: Vec<(CaptureName, String)>,
}

impl Context {
    /// Creates a new [`Context`] with the given step and matches.
    #[must_use]
    pub const fn new(step: Step, matches: Vec<(CaptureName, String)>) -> Self {
        Self { step, matches }
    }

    /// Returns the value of a named capture group, if it exists.
    #[must_use]
    pub fn get_named_capture(&self, name: &str) -> Option<&str> {
        self.matches
            .iter()
            .find(|(capture, _)| capture.as_deref() == Some(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the value of a capture group by index (0 is the whole match).
    #[must_use]
    pub fn get_capture(&self, index: usize) -> Option<&str> {
        self.matches.get(index).map(|(_, value)| value.as_str())
    }

    /// Returns the doc-string argument of the step.
    #[must_use]
    pub fn docstring(&self) -> Option<&str> {
        self.step.docstring.as_deref()
    }

    /// Returns the table argument of the step.
    #[must_use]
    pub fn table(&self) -> Option<&Table> {
        self.step.table.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Context {
        Context::new(
            Step {
                text: "def count = 5".into(),
                docstring: Some("{}".into()),
                ..Step::default()
            },
            vec![
                (None, "def count = 5".into()),
                (Some("name".into()), "count".into()),
                (None, "5".into()),
            ],
        )
    }

    #[test]
    fn named_and_positional_captures() {
        let ctx = context();

        assert_eq!(ctx.get_named_capture("name"), Some("count"));
        assert_eq!(ctx.get_named_capture("value"), None);
        assert_eq!(ctx.get_capture(0), Some("def count = 5"));
        assert_eq!(ctx.get_capture(2), Some("5"));
        assert_eq!(ctx.get_capture(3), None);
    }

    #[test]
    fn step_arguments() {
        let ctx = context();

        assert_eq!(ctx.docstring(), Some("{}"));
        assert!(ctx.table().is_none());
    }
}
