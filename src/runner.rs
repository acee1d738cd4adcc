// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! One fetch run: connect, select, stream, extract, optionally delete,
//! and always log out once a session exists.

use std::path::PathBuf;

use log::{debug, error, info, warn};

use crate::config::Settings;
use crate::deletion::{DeletionCoordinator, DeletionError, DeletionSummary};
use crate::error::FetchError;
use crate::extractor::AttachmentExtractor;
use crate::imap::{self, MailboxSession, RawMessage, SequenceSet};
use crate::mime::{self, Entity};
use crate::stream::MessageStream;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingCounters {
    pub total_messages: u32,
    /// Messages that yielded at least one extracted attachment.
    pub processed_messages: u32,
    pub extracted_attachments: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionStatus {
    Disabled,
    NothingToDelete,
    Deleted(DeletionSummary),
    /// Extraction finished; the caller decides what a cleanup failure means.
    Failed(DeletionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Empty mailbox, or nothing in it carried a report.
    NothingToDo,
    Processed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub counters: ProcessingCounters,
    pub deletion: DeletionStatus,
}

/// Process exit status after a completed run.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status when a run fails outright.
pub const EXIT_FAILURE: u8 = 1;
/// Exit status when reports were extracted but removing the messages failed.
pub const EXIT_CLEANUP_FAILED: u8 = 3;

impl RunReport {
    pub fn outcome(&self) -> RunOutcome {
        if self.counters.processed_messages == 0 {
            RunOutcome::NothingToDo
        } else {
            RunOutcome::Processed
        }
    }

    /// Nothing to do is a successful run; only a failed cleanup is not.
    pub fn exit_code(&self) -> u8 {
        match self.deletion {
            DeletionStatus::Failed(_) => EXIT_CLEANUP_FAILED,
            _ => EXIT_SUCCESS,
        }
    }
}

/// What a run needs beyond the session itself.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub mailbox: String,
    pub delete: bool,
    pub output_dir: PathBuf,
}

impl From<&Settings> for FetchOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            mailbox: settings.imap.mailbox.clone(),
            delete: settings.imap.delete,
            output_dir: settings.output_dir.clone(),
        }
    }
}

/// Connects with the configured credentials and performs a full run.
pub async fn run(settings: &Settings) -> Result<RunReport, FetchError> {
    let options = FetchOptions::from(settings);
    AttachmentExtractor::new(&options.output_dir)
        .prepare()
        .map_err(FetchError::OutputDir)?;

    info!("Connecting to server...");
    let session = imap::connect(&settings.imap).await.map_err(FetchError::Connect)?;

    run_with_session(session, &options).await
}

/// Runs the select → stream → delete phases on an authenticated session,
/// then logs out regardless of how those phases ended.
pub async fn run_with_session<S>(session: S, options: &FetchOptions) -> Result<RunReport, FetchError>
where
    S: MailboxSession + 'static,
{
    let (session, result) = process_mailbox(session, options).await;

    match session {
        Some(mut session) => match session.logout().await {
            Ok(()) => debug!("Logged out"),
            Err(e) => warn!("Logout failed: {}", e),
        },
        None => warn!("Session was lost during fetch; skipping logout"),
    }
    result
}

async fn process_mailbox<S>(mut session: S, options: &FetchOptions) -> (Option<S>, Result<RunReport, FetchError>)
where
    S: MailboxSession + 'static,
{
    let mailbox = match session.select_mailbox(&options.mailbox).await {
        Ok(mailbox) => mailbox,
        Err(source) => {
            let err = FetchError::Select {
                mailbox: options.mailbox.clone(),
                source,
            };
            return (Some(session), Err(err));
        }
    };

    if mailbox.exists == 0 {
        info!("No new messages on server");
        let deletion = if options.delete {
            DeletionStatus::NothingToDelete
        } else {
            DeletionStatus::Disabled
        };
        let report = RunReport {
            counters: ProcessingCounters::default(),
            deletion,
        };
        return (Some(session), Ok(report));
    }

    let extractor = AttachmentExtractor::new(&options.output_dir);
    let mut deletion = DeletionCoordinator::new(options.delete);
    let mut counters = ProcessingCounters::default();

    let mut stream = MessageStream::start(session, SequenceSet::range(1, mailbox.exists));
    let consumed = consume(&mut stream, &extractor, &mut counters, &mut deletion).await;

    let completion = match stream.finish().await {
        Ok(completion) => completion,
        Err(e) => return (None, Err(FetchError::StreamLost(e))),
    };
    let mut session = completion.session;

    if let Err(e) = consumed {
        if let Err(fetch_err) = completion.result {
            warn!("Fetch also failed: {}", fetch_err);
        }
        return (Some(session), Err(e));
    }
    if let Err(e) = completion.result {
        return (Some(session), Err(FetchError::Fetch(e)));
    }

    let deletion_status = if !deletion.is_enabled() {
        DeletionStatus::Disabled
    } else if !deletion.has_pending() {
        DeletionStatus::NothingToDelete
    } else {
        match deletion.mark_and_expunge(&mut session).await {
            Ok(summary) => DeletionStatus::Deleted(summary),
            Err(e) => {
                error!("{}", e);
                DeletionStatus::Failed(e)
            }
        }
    };

    info!(
        "Total messages: {}, Processed messages: {}",
        counters.total_messages, counters.processed_messages
    );

    let report = RunReport {
        counters,
        deletion: deletion_status,
    };
    (Some(session), Ok(report))
}

/// Drains the stream, extracting every message as it arrives.
async fn consume<S>(
    stream: &mut MessageStream<S>,
    extractor: &AttachmentExtractor,
    counters: &mut ProcessingCounters,
    deletion: &mut DeletionCoordinator,
) -> Result<(), FetchError>
where
    S: MailboxSession + 'static,
{
    while let Some(message) = stream.next().await {
        counters.total_messages += 1;

        let extracted = process_message(&message, extractor)?;
        if extracted > 0 {
            counters.processed_messages += 1;
            counters.extracted_attachments += extracted;
            deletion.record_processed(message.seq);
        }
    }
    Ok(())
}

/// Extracts the report attachments of one message; returns how many were written.
pub fn process_message(message: &RawMessage, extractor: &AttachmentExtractor) -> Result<u32, FetchError> {
    let Some(body) = message.body.as_deref() else {
        warn!("Message {} arrived without a body, skipping", message.seq);
        return Ok(0);
    };

    let entity = Entity::parse(body).map_err(|source| FetchError::Mime {
        seq: message.seq,
        source,
    })?;

    let mut extracted = 0;
    for candidate in mime::walk(&entity) {
        match extractor.extract(&candidate) {
            Ok(_) => extracted += 1,
            Err(e) if e.is_fatal() => {
                return Err(FetchError::Extract {
                    seq: message.seq,
                    source: e,
                })
            }
            Err(e) => warn!("Skipping attachment in message {}: {}", message.seq, e),
        }
    }
    Ok(extracted)
}
