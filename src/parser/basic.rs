// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Default [`Parser`] implementation.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::{
    stream::{self, BoxStream},
    StreamExt as _,
};

use super::{Error, Parser, Result};
use crate::feature::{
    Background, ExamplesTable, Feature, Scenario, ScenarioOutline, Section,
    Step, Table,
};

/// Default [`Parser`].
///
/// As there is no async runtime-agnostic way to interact with IO, directory
/// walking is done synchronously, while files are read with [`tokio::fs`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Basic;

impl<I: AsRef<Path>> Parser<I> for Basic {
    type Output = BoxStream<'static, Result<Feature>>;

    fn parse(self, input: I) -> Self::Output {
        let path = input.as_ref().to_owned();
        if path.is_file() {
            return stream::once(async move { self.parse_file(&path).await })
                .boxed();
        }

        let walker = match globwalk::GlobWalkerBuilder::new(&path, "*.feature")
            .case_insensitive(true)
            .build()
        {
            Ok(walker) => walker,
            Err(e) => {
                let err = Error::Parsing { path, reason: e.to_string() };
                return stream::once(async { Err(err) }).boxed();
            }
        };
        let mut files = walker
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.into_path())
            .collect::<Vec<_>>();
        files.sort();

        stream::iter(files)
            .then(move |file| async move { self.parse_file(&file).await })
            .boxed()
    }
}

impl Basic {
    /// Creates a new [`Basic`] [`Parser`].
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Reads and parses the `.feature` file at the given `path`.
    ///
    /// # Errors
    ///
    /// If the file can't be read or isn't a valid feature.
    pub async fn parse_file(self, path: &Path) -> Result<Feature> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Reading { path: path.to_owned(), source: Arc::new(e) }
        })?;
        self.parse_str(&text, Some(path.to_owned()))
    }

    /// Parses the given feature `text`.
    ///
    /// # Errors
    ///
    /// If the `text` isn't a valid feature.
    pub fn parse_str(self, text: &str, path: Option<PathBuf>) -> Result<Feature> {
        let parsed = gherkin::Feature::parse(text, gherkin::GherkinEnv::default())
            .map_err(|e| Error::Parsing {
                path: path.clone().unwrap_or_default(),
                reason: e.to_string(),
            })?;
        Ok(convert(parsed, path))
    }
}

/// Converts a [`gherkin::Feature`] into a [`Feature`], merging the scenarios
/// of its rules in declaration order.
fn convert(feature: gherkin::Feature, path: Option<PathBuf>) -> Feature {
    let mut scenarios = feature
        .scenarios
        .into_iter()
        .chain(feature.rules.into_iter().flat_map(|r| r.scenarios))
        .collect::<Vec<_>>();
    scenarios.sort_by_key(|s| s.position.line);

    let sections = scenarios
        .into_iter()
        .enumerate()
        .map(|(index, scenario)| convert_section(index, scenario))
        .collect();

    Feature {
        name: feature.name,
        description: feature.description,
        path,
        line: feature.position.line,
        tags: feature.tags,
        background: feature.background.map(|b| Background {
            line: b.position.line,
            steps: b.steps.into_iter().map(convert_step).collect(),
        }),
        sections,
    }
}

fn convert_section(index: usize, scenario: gherkin::Scenario) -> Section {
    let steps = scenario.steps.into_iter().map(convert_step).collect();
    if scenario.examples.is_empty() {
        return Section::Scenario(Scenario {
            name: scenario.name,
            description: scenario.description,
            line: scenario.position.line,
            section_index: index,
            tags: scenario.tags,
            steps,
            ..Scenario::default()
        });
    }

    let examples = scenario
        .examples
        .into_iter()
        .map(|ex| {
            let mut rows = ex.table.map(|t| t.rows).unwrap_or_default();
            let header = if rows.is_empty() { Vec::new() } else { rows.remove(0) };
            ExamplesTable {
                line: ex.position.line,
                tags: ex.tags,
                header,
                // Rows directly follow the header, which follows `Examples:`.
                rows: rows
                    .into_iter()
                    .enumerate()
                    .map(|(i, row)| (ex.position.line + 2 + i, row))
                    .collect(),
            }
        })
        .collect();

    Section::Outline(ScenarioOutline {
        name: scenario.name,
        description: scenario.description,
        line: scenario.position.line,
        section_index: index,
        tags: scenario.tags,
        steps,
        examples,
    })
}

fn convert_step(step: gherkin::Step) -> Step {
    Step {
        prefix: step.keyword.trim().to_owned(),
        text: step.value,
        docstring: step.docstring,
        table: step.table.map(|t| Table { rows: t.rows }),
        line: step.position.line,
    }
}
