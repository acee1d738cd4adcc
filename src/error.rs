// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::extractor::ExtractError;
use crate::imap::ImapError;
use crate::mime::MimeError;

/// Conditions that abort a run.
///
/// Extracted files stay on disk whatever the failure; deletion is never
/// attempted once one of these has occurred.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("IMAP connection failed: {0}")]
    Connect(#[source] ImapError),

    #[error("failed to select mailbox '{mailbox}': {source}")]
    Select {
        mailbox: String,
        #[source]
        source: ImapError,
    },

    #[error("fetch failed: {0}")]
    Fetch(#[source] ImapError),

    #[error("fetch task lost: {0}")]
    StreamLost(#[source] ImapError),

    #[error("failed to parse message {seq}: {source}")]
    Mime {
        seq: u32,
        #[source]
        source: MimeError,
    },

    #[error("failed to extract attachment from message {seq}: {source}")]
    Extract {
        seq: u32,
        #[source]
        source: ExtractError,
    },

    #[error("output directory unusable: {0}")]
    OutputDir(#[source] ExtractError),
}
