// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Library core for dmarc-fetch.
//!
//! Pulls DMARC aggregate/forensic report mail out of an IMAP mailbox,
//! writes the compressed report attachments to a local directory for the
//! report converter, and optionally removes the processed messages.

// --- Modules ---
pub mod config;
pub mod deletion;
pub mod error;
pub mod extractor;
pub mod imap;
pub mod mime;
pub mod runner;
pub mod stream;

pub mod prelude {
    // Config
    pub use crate::config::{ImapSettings, Settings};

    // IMAP
    pub use crate::imap::{ImapError, MailboxSession, RawMessage, SequenceSet};

    // Pipeline
    pub use crate::error::FetchError;
    pub use crate::extractor::{AttachmentExtractor, ExtractError};
    pub use crate::runner::{run, run_with_session, DeletionStatus, FetchOptions, ProcessingCounters, RunOutcome, RunReport};

    // Common Libs
    pub use log::{debug, error, info, trace, warn};
}
