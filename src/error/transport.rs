// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! HTTP transport errors.

use derive_more::with_trait::{Display, Error};

/// Failure reported by a [`Transport`].
///
/// [`Transport`]: crate::Transport
#[derive(Clone, Debug, Display, Eq, Error, PartialEq)]
pub enum TransportError {
    /// The request could not be sent or no response arrived.
    #[display("http call failed for {method} {url}: {reason}")]
    Failed {
        /// Request method.
        #[error(not(source))]
        method: String,

        /// Request URL.
        url: String,

        /// Transport-specific description.
        reason: String,
    },

    /// The exchange exceeded the configured timeout.
    #[display("http call timed out after {millis}ms: {url}")]
    Timeout {
        /// Request URL.
        #[error(not(source))]
        url: String,

        /// Elapsed timeout in milliseconds.
        millis: u128,
    },
}

impl TransportError {
    /// Creates a [`TransportError::Failed`].
    #[must_use]
    pub fn failed(
        method: impl Into<String>,
        url: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Failed {
            method: method.into(),
            url: url.into(),
            reason: reason.into(),
        }
    }
}
