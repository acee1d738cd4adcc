// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Bulk retrieval as a background producer feeding a bounded channel.
//!
//! The producer task owns the session for the duration of the FETCH and
//! hands it back through the completion signal, so the consumer can run
//! STORE/EXPUNGE/LOGOUT afterwards. Drain [`MessageStream::next`] until it
//! returns `None` before calling [`MessageStream::finish`].

use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};

use crate::imap::{ImapError, MailboxSession, RawMessage, SequenceSet};

/// Messages buffered between producer and consumer.
pub const MESSAGE_CHANNEL_CAPACITY: usize = 10;

/// Terminal signal of a fetch: the session handed back plus the FETCH result.
#[derive(Debug)]
pub struct Completion<S> {
    pub session: S,
    pub result: Result<(), ImapError>,
}

pub struct MessageStream<S> {
    messages: mpsc::Receiver<RawMessage>,
    done: oneshot::Receiver<Completion<S>>,
}

impl<S> MessageStream<S>
where
    S: MailboxSession + 'static,
{
    /// Spawns the producer, which fetches `set` and is the sole writer of
    /// the message channel. The channel closes when the server completes
    /// the command or the fetch fails.
    pub fn start(mut session: S, set: SequenceSet) -> Self {
        let (tx, rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(async move {
            debug!("Fetching messages {}", set);
            let result = session.fetch_messages(&set, &tx).await;
            drop(tx);

            if done_tx.send(Completion { session, result }).is_err() {
                warn!("Message stream dropped before fetch completion was read");
            }
        });

        Self {
            messages: rx,
            done: done_rx,
        }
    }

    /// Next message in arrival order; `None` once the producer is finished.
    pub async fn next(&mut self) -> Option<RawMessage> {
        self.messages.recv().await
    }

    /// Waits for the producer's completion signal.
    ///
    /// Closes the message channel first: anything still buffered is
    /// discarded and a producer blocked on a full channel is released, so
    /// this cannot deadlock when called after an early abort.
    pub async fn finish(self) -> Result<Completion<S>, ImapError> {
        let Self { mut messages, done } = self;
        messages.close();
        drop(messages);

        done.await.map_err(|_| {
            ImapError::Internal("fetch task ended without reporting completion".to_string())
        })
    }
}
