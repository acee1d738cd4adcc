// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::{debug, info};
use thiserror::Error;

use crate::imap::{ImapError, MailboxSession, SequenceSet, StoreOperation, DELETED_FLAG};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeletionError {
    #[error("failed to flag messages as deleted: {0}")]
    Flag(#[source] ImapError),
    #[error("failed to expunge flagged messages: {0}")]
    Expunge(#[source] ImapError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionSummary {
    pub flagged: usize,
    pub expunged: usize,
}

/// Collects messages whose reports were extracted and removes them from
/// the server with STORE `+FLAGS (\Deleted)` followed by EXPUNGE.
#[derive(Debug, Clone)]
pub struct DeletionCoordinator {
    enabled: bool,
    pending: SequenceSet,
}

impl DeletionCoordinator {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            pending: SequenceSet::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records a message that yielded at least one extracted attachment.
    /// Ignored while deletion is disabled.
    pub fn record_processed(&mut self, seq: u32) {
        if self.enabled {
            debug!("imap: add SeqNum {} to delete set", seq);
            self.pending.insert(seq);
        }
    }

    pub fn pending(&self) -> &SequenceSet {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        self.enabled && !self.pending.is_empty()
    }

    /// Flags every pending message `\Deleted`, then expunges.
    ///
    /// EXPUNGE is only sent after the STORE succeeded.
    pub async fn mark_and_expunge<S>(&self, session: &mut S) -> Result<DeletionSummary, DeletionError>
    where
        S: MailboxSession + ?Sized,
    {
        info!("imap: delete emails after fetch");

        session
            .store_flags(&self.pending, StoreOperation::Add, vec![DELETED_FLAG.to_string()])
            .await
            .map_err(DeletionError::Flag)?;

        let expunged = session.expunge().await.map_err(DeletionError::Expunge)?;
        info!("imap: flagged {} and expunged {} messages", self.pending.len(), expunged);

        Ok(DeletionSummary {
            flagged: self.pending.len(),
            expunged,
        })
    }
}
