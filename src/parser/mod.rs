// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tools for parsing feature texts into [`Feature`]s.

pub mod basic;

use std::{io, path::PathBuf, sync::Arc};

use derive_more::{Display, Error};
use futures::Stream;

use crate::feature::Feature;

#[doc(inline)]
pub use self::basic::Basic;

/// Source of parsed [`Feature`]s.
pub trait Parser<I> {
    /// Output [`Stream`] of parsed [`Feature`]s.
    type Output: Stream<Item = Result<Feature>> + Send + 'static;

    /// Parses the given `input` into a [`Stream`] of [`Feature`]s.
    fn parse(self, input: I) -> Self::Output;
}

/// Result of parsing a [`Feature`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of parsing a [`Feature`].
#[derive(Clone, Debug, Display, Error)]
pub enum Error {
    /// The feature file could not be read.
    #[display("Failed to read {}: {source}", path.display())]
    Reading {
        /// Path of the file.
        path: PathBuf,

        /// Underlying I/O error.
        source: Arc<io::Error>,
    },

    /// The feature text is not valid.
    #[display("Failed to parse {}: {reason}", path.display())]
    Parsing {
        /// Path of the file, empty for in-memory texts.
        #[error(not(source))]
        path: PathBuf,

        /// Description of the failure.
        reason: String,
    },
}
