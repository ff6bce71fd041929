// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Parsed feature model: [`Feature`]s made of [`Section`]s.

use std::{
    iter,
    path::{Path, PathBuf},
    sync::Arc,
};

use lazy_regex::regex;
use serde_json::{Map, Value};

use crate::{
    tag::Tags,
    value::{FeatureRef, Variable},
};

/// Parsed test specification.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Feature {
    /// Name of this [`Feature`].
    pub name: String,

    /// Free-form description.
    pub description: Option<String>,

    /// Path of the `.feature` file, if any.
    pub path: Option<PathBuf>,

    /// Line of the `Feature:` keyword.
    pub line: usize,

    /// Tags of this [`Feature`], inherited by every scenario.
    pub tags: Vec<String>,

    /// Steps executed before every scenario.
    pub background: Option<Background>,

    /// Ordered sections.
    pub sections: Vec<Section>,
}

/// `Background:` of a [`Feature`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Background {
    /// Line of the `Background:` keyword.
    pub line: usize,

    /// Background steps.
    pub steps: Vec<Step>,
}

/// One entry of a [`Feature`]: exactly one scenario or one outline.
#[derive(Clone, Debug, PartialEq)]
pub enum Section {
    /// Plain scenario.
    Scenario(Scenario),

    /// Template expanded into many scenarios.
    Outline(ScenarioOutline),
}

/// `Scenario Outline:` template.
///
/// Never executed directly, see [`ScenarioOutline::scenarios()`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScenarioOutline {
    /// Name, possibly containing `<placeholders>`.
    pub name: String,

    /// Free-form description.
    pub description: Option<String>,

    /// Line of the `Scenario Outline:` keyword.
    pub line: usize,

    /// Index of the owning [`Section`].
    pub section_index: usize,

    /// Own tags.
    pub tags: Vec<String>,

    /// Step template.
    pub steps: Vec<Step>,

    /// Example rows.
    pub examples: Vec<ExamplesTable>,
}

/// `Examples:` table of a [`ScenarioOutline`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExamplesTable {
    /// Line of the `Examples:` keyword.
    pub line: usize,

    /// Tags applied to every row scenario.
    pub tags: Vec<String>,

    /// Column names.
    pub header: Vec<String>,

    /// Data rows with their lines.
    pub rows: Vec<(usize, Vec<String>)>,
}

/// Concrete executable scenario.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scenario {
    /// Name, with placeholders substituted for expanded rows.
    pub name: String,

    /// Free-form description.
    pub description: Option<String>,

    /// Line used for reporting and ordering.
    pub line: usize,

    /// Index of the owning [`Section`].
    pub section_index: usize,

    /// Own tags plus outline and examples tags.
    pub tags: Vec<String>,

    /// Ordered steps.
    pub steps: Vec<Step>,

    /// Row index when produced from an outline.
    pub example_index: Option<usize>,

    /// Row data when produced from an outline.
    pub example_data: Option<Map<String, Value>>,

    /// Unexpanded dynamic expression of a dynamic outline template.
    pub dynamic_expression: Option<String>,
}

/// Single instruction of a scenario.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Step {
    /// Prefix keyword (`*`, `Given`, `And`, ...).
    pub prefix: String,

    /// Step text the dispatcher matches against.
    pub text: String,

    /// Optional doc-string argument.
    pub docstring: Option<String>,

    /// Optional table argument.
    pub table: Option<Table>,

    /// Line of this [`Step`].
    pub line: usize,
}

/// Table argument of a [`Step`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    /// Rows, header first.
    pub rows: Vec<Vec<String>>,
}

impl Feature {
    /// Name used in logs and error messages: file name if known.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .map_or_else(|| self.name.clone(), ToOwned::to_owned)
    }

    /// Indicates whether a non-empty background is present.
    #[must_use]
    pub fn has_background(&self) -> bool {
        self.background.as_ref().is_some_and(|b| !b.steps.is_empty())
    }

    /// Background steps, empty if there is no background.
    #[must_use]
    pub fn background_steps(&self) -> &[Step] {
        self.background.as_ref().map_or(&[], |b| b.steps.as_slice())
    }

    /// Counts all the scenarios and outlines of this [`Feature`].
    #[must_use]
    pub fn count_sections(&self) -> usize {
        self.sections.len()
    }

    /// Counts all steps, background excluded.
    #[must_use]
    pub fn count_steps(&self) -> usize {
        self.sections
            .iter()
            .map(|s| match s {
                Section::Scenario(sc) => sc.steps.len(),
                Section::Outline(o) => o.steps.len(),
            })
            .sum()
    }

    /// Wraps this [`Feature`] into a callable [`Variable`].
    #[must_use]
    pub fn into_variable(self) -> Variable {
        Variable::Feature(FeatureRef::new(Arc::new(self)))
    }
}

impl Step {
    /// First word of the step text (`def`, `match`, `call`, ...).
    #[must_use]
    pub fn keyword(&self) -> &str {
        self.text.split_whitespace().next().unwrap_or_default()
    }
}

impl Section {
    /// Line of the section keyword.
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::Scenario(s) => s.line,
            Self::Outline(o) => o.line,
        }
    }

    /// Scenarios this section produces without evaluating anything.
    ///
    /// A dynamic outline produces its single unexpanded template.
    #[must_use]
    pub fn scenarios(&self) -> Vec<Scenario> {
        match self {
            Self::Scenario(s) => vec![s.clone()],
            Self::Outline(o) => o.scenarios(),
        }
    }
}

impl ScenarioOutline {
    /// Returns the dynamic expression when the only `Examples:` table
    /// consists of a single header cell and no rows.
    #[must_use]
    pub fn dynamic_expression(&self) -> Option<&str> {
        match self.examples.as_slice() {
            [only] if only.rows.is_empty() && only.header.len() == 1 => {
                Some(only.header[0].trim())
            }
            _ => None,
        }
    }

    /// Template [`Scenario`] with no row applied yet.
    #[must_use]
    pub fn template(&self) -> Scenario {
        Scenario {
            name: self.name.clone(),
            description: self.description.clone(),
            line: self.line,
            section_index: self.section_index,
            tags: self.tags.clone(),
            steps: self.steps.clone(),
            example_index: None,
            example_data: None,
            dynamic_expression: None,
        }
    }

    /// Expands static `Examples:` rows, one [`Scenario`] per row.
    ///
    /// Indices restart at `0` for every table and each scenario takes the
    /// line of its row. A dynamic outline yields its unexpanded template
    /// carrying the expression instead.
    #[must_use]
    pub fn scenarios(&self) -> Vec<Scenario> {
        if let Some(expr) = self.dynamic_expression() {
            let mut template = self.template();
            template.dynamic_expression = Some(expr.to_owned());
            return vec![template];
        }

        self.examples
            .iter()
            .flat_map(|table| {
                table.rows.iter().enumerate().map(move |(i, (line, row))| {
                    let data = table
                        .header
                        .iter()
                        .zip(row.iter().chain(iter::repeat(&String::new())))
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect::<Map<_, _>>();

                    let mut scenario = self.template();
                    scenario.line = *line;
                    scenario.tags.extend(table.tags.iter().cloned());
                    scenario.apply_row(i, data);
                    scenario
                })
            })
            .collect()
    }
}

impl Scenario {
    /// Indicates whether this is an unexpanded dynamic outline template.
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        self.dynamic_expression.is_some()
    }

    /// Indicates whether this scenario was produced from an outline row.
    #[must_use]
    pub const fn is_outline_example(&self) -> bool {
        self.example_index.is_some()
    }

    /// Declaration-order key: line, then example index (`None` first).
    #[must_use]
    pub const fn order_key(&self) -> (usize, Option<usize>) {
        (self.line, self.example_index)
    }

    /// Effective [`Tags`] of this scenario inside the given `feature`.
    #[must_use]
    pub fn effective_tags(&self, feature: &Feature) -> Tags {
        Tags::new(feature.tags.iter().chain(&self.tags))
    }

    /// Name with the example index appended, used in logs.
    #[must_use]
    pub fn display_meta(&self) -> String {
        match self.example_index {
            Some(i) => format!("[{}:{}] {}", self.line, i, self.name),
            None => format!("[{}] {}", self.line, self.name),
        }
    }

    /// Clone of this template with a row applied: fresh step copies, the
    /// `index` as example index, `row` as example data and every `<key>`
    /// token replaced by the rendered row value.
    #[must_use]
    pub fn with_row(&self, index: usize, row: Map<String, Value>) -> Self {
        let mut copy = self.clone();
        copy.dynamic_expression = None;
        copy.apply_row(index, row);
        copy
    }

    fn apply_row(&mut self, index: usize, row: Map<String, Value>) {
        self.example_index = Some(index);
        self.name = replace_templates(&self.name, &row);
        for step in &mut self.steps {
            for value in iter::once(&mut step.text)
                .chain(step.docstring.iter_mut())
                .chain(step.table.iter_mut().flat_map(|t| {
                    t.rows.iter_mut().flat_map(|r| r.iter_mut())
                }))
            {
                *value = replace_templates(value, &row);
            }
        }
        self.example_data = Some(row);
    }
}

/// Replaces every `<key>` token of `text` present in `row` with the row
/// value rendered as a string. Unknown tokens are kept as is.
fn replace_templates(text: &str, row: &Map<String, Value>) -> String {
    let template = regex!(r"<([^<>\s]+)>");

    template
        .replace_all(text, |cap: &regex::Captures<'_>| {
            let name = &cap[1];
            row.get(name).map_or_else(
                || {
                    tracing::trace!(placeholder = name, "no example column");
                    cap[0].to_owned()
                },
                |v| Variable::Json(v.clone()).as_string(),
            )
        })
        .into_owned()
}
