// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use log::{debug, warn};
use tokio::net::TcpStream as TokioTcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_util::compat::Compat;

#[cfg(test)]
use mockall::automock;

use crate::imap::error::ImapError;
use crate::imap::types::{MailboxInfo, RawMessage, SequenceSet, StoreOperation};

// Type aliases
pub type TlsCompatibleStream = Compat<TlsStream<TokioTcpStream>>;
pub type TlsImapSession = async_imap::Session<TlsCompatibleStream>;

/// FETCH data items requested for every message: the full source.
pub const FETCH_ITEMS: &str = "RFC822";

/// The authenticated protocol operations the fetch pipeline relies on.
///
/// Implementations are owned by exactly one task at a time; nothing here
/// is meant to be multiplexed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MailboxSession: Send {
    /// Selects a mailbox read-write and reports its message count.
    async fn select_mailbox(&mut self, name: &str) -> Result<MailboxInfo, ImapError>;

    /// Fetches every message in `set`, pushing each into `sink` as it arrives.
    ///
    /// Returns once the server has completed the command. If the receiving
    /// side of `sink` is closed the fetch is abandoned early.
    async fn fetch_messages(
        &mut self,
        set: &SequenceSet,
        sink: &mpsc::Sender<RawMessage>,
    ) -> Result<(), ImapError>;

    /// Applies a flag change to every message in `set`.
    async fn store_flags(
        &mut self,
        set: &SequenceSet,
        operation: StoreOperation,
        flags: Vec<String>,
    ) -> Result<(), ImapError>;

    /// Permanently removes messages flagged `\Deleted`; returns how many went.
    async fn expunge(&mut self) -> Result<usize, ImapError>;

    async fn logout(&mut self) -> Result<(), ImapError>;
}

/// Runs `fut`, failing with [`ImapError::Timeout`] if `limit` elapses first.
/// A `None` limit waits indefinitely.
pub(crate) async fn bounded<T, F>(limit: Option<Duration>, what: &str, fut: F) -> Result<T, ImapError>
where
    F: Future<Output = Result<T, ImapError>>,
{
    match limit {
        Some(duration) => match timeout(duration, fut).await {
            Ok(result) => result,
            Err(_) => Err(ImapError::Timeout(format!("{} after {:?}", what, duration))),
        },
        None => fut.await,
    }
}

/// Filters the items of one FETCH down to one delivery per requested message.
///
/// Servers may interleave unsolicited `* N FETCH (FLAGS ...)` updates with
/// the requested data. Items outside the requested set are dropped, a message
/// is delivered at most once, and a bodiless item is held back until the
/// command completes in case the message's body item is still coming.
#[derive(Debug)]
pub(crate) struct FetchTracker {
    requested: SequenceSet,
    delivered: SequenceSet,
    bodiless: SequenceSet,
}

impl FetchTracker {
    pub(crate) fn new(requested: &SequenceSet) -> Self {
        Self {
            requested: requested.clone(),
            delivered: SequenceSet::new(),
            bodiless: SequenceSet::new(),
        }
    }

    /// Returns the message to hand to the consumer now, if any.
    pub(crate) fn accept(&mut self, seq: u32, body: Option<&[u8]>) -> Option<RawMessage> {
        if !self.requested.contains(seq) || self.delivered.contains(seq) {
            debug!("Ignoring unsolicited FETCH item for {}", seq);
            return None;
        }
        match body {
            Some(body) => {
                self.delivered.insert(seq);
                Some(RawMessage {
                    seq,
                    body: Some(body.to_vec()),
                })
            }
            None => {
                self.bodiless.insert(seq);
                None
            }
        }
    }

    /// Messages the server answered without ever sending a body.
    pub(crate) fn finish(self) -> Vec<RawMessage> {
        self.bodiless
            .iter()
            .filter(|seq| !self.delivered.contains(*seq))
            .map(|seq| RawMessage { seq, body: None })
            .collect()
    }
}

/// [`MailboxSession`] backed by a logged-in async-imap session over TLS.
pub struct AsyncImapSessionWrapper {
    session: TlsImapSession,
    timeout: Option<Duration>,
}

impl AsyncImapSessionWrapper {
    pub fn new(session: TlsImapSession, timeout: Option<Duration>) -> Self {
        Self { session, timeout }
    }
}

#[async_trait]
impl MailboxSession for AsyncImapSessionWrapper {
    async fn select_mailbox(&mut self, name: &str) -> Result<MailboxInfo, ImapError> {
        let limit = self.timeout;
        let session = &mut self.session;
        let mailbox = bounded(limit, "SELECT", async move {
            session.select(name).await.map_err(ImapError::from)
        })
        .await?;

        debug!("Selected '{}': {} messages", name, mailbox.exists);
        Ok(MailboxInfo {
            name: name.to_string(),
            exists: mailbox.exists,
        })
    }

    async fn fetch_messages(
        &mut self,
        set: &SequenceSet,
        sink: &mpsc::Sender<RawMessage>,
    ) -> Result<(), ImapError> {
        let limit = self.timeout;
        let session = &mut self.session;
        let sequence = set.to_string();
        let stream = bounded(limit, "FETCH", async move {
            session.fetch(sequence, FETCH_ITEMS).await.map_err(ImapError::from)
        })
        .await?;
        futures_util::pin_mut!(stream);
        let mut tracker = FetchTracker::new(set);

        loop {
            let next = bounded(limit, "FETCH response", async {
                stream.try_next().await.map_err(ImapError::from)
            })
            .await?;
            let message = match next {
                Some(fetch) => match tracker.accept(fetch.message, fetch.body()) {
                    Some(message) => message,
                    None => continue,
                },
                None => break,
            };
            if sink.send(message).await.is_err() {
                warn!("Message consumer closed, abandoning FETCH");
                return Ok(());
            }
        }

        for message in tracker.finish() {
            if sink.send(message).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn store_flags(
        &mut self,
        set: &SequenceSet,
        operation: StoreOperation,
        flags: Vec<String>,
    ) -> Result<(), ImapError> {
        let limit = self.timeout;
        let session = &mut self.session;
        let sequence = set.to_string();
        let query = format!("{} ({})", operation.as_imap_str(), flags.join(" "));
        debug!("STORE {} {}", sequence, query);

        bounded(limit, "STORE", async move {
            session
                .store(sequence, query)
                .await?
                .try_collect::<Vec<_>>()
                .await?;
            Ok::<(), ImapError>(())
        })
        .await
    }

    async fn expunge(&mut self) -> Result<usize, ImapError> {
        let limit = self.timeout;
        let session = &mut self.session;
        bounded(limit, "EXPUNGE", async move {
            let removed = session.expunge().await?.try_collect::<Vec<_>>().await?;
            Ok::<usize, ImapError>(removed.len())
        })
        .await
    }

    async fn logout(&mut self) -> Result<(), ImapError> {
        let limit = self.timeout;
        let session = &mut self.session;
        bounded(limit, "LOGOUT", async move {
            session.logout().await.map_err(ImapError::from)
        })
        .await
    }
}
