// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::common::{
        gzip_bytes, nested_report_message, plain_text_message, raw, report_message, Attachment, Call,
        MockImapSession,
    };
    use dmarc_fetch::deletion::{DeletionError, DeletionSummary};
    use dmarc_fetch::error::FetchError;
    use dmarc_fetch::imap::{ImapError, RawMessage};
    use dmarc_fetch::runner::{
        run_with_session, DeletionStatus, FetchOptions, RunOutcome, EXIT_CLEANUP_FAILED, EXIT_SUCCESS,
    };
    use std::path::Path;
    use tempfile::TempDir;

    const DELETE_QUERY: &str = "+FLAGS (\\Deleted)";

    fn options(dir: &Path, delete: bool) -> FetchOptions {
        FetchOptions {
            mailbox: "INBOX".to_string(),
            delete,
            output_dir: dir.to_path_buf(),
        }
    }

    /// Three messages: a gzip report, a plain mail, and a mail with two reports.
    fn mixed_mailbox() -> (Vec<RawMessage>, Vec<u8>, Vec<u8>, Vec<u8>) {
        let a = gzip_bytes(0xa1);
        let c_zip = b"PK\x03\x04\x14\x00\x00\x00".to_vec();
        let c_gz = gzip_bytes(0xc2);
        let messages = vec![
            raw(1, report_message("Report A", &[Attachment::gzip("report1.gz", &a)])),
            raw(2, plain_text_message("Lunch?")),
            raw(
                3,
                report_message(
                    "Report C",
                    &[Attachment::zip("report2.zip", &c_zip), Attachment::gzip("report3.xml.gz", &c_gz)],
                ),
            ),
        ];
        (messages, a, c_zip, c_gz)
    }

    #[tokio::test]
    async fn test_full_run_extracts_and_deletes_processed_messages() {
        let dir = TempDir::new().unwrap();
        let (messages, a, c_zip, c_gz) = mixed_mailbox();
        let session = MockImapSession::new(messages);
        let log = session.call_log();

        let report = run_with_session(session, &options(dir.path(), true)).await.unwrap();

        assert_eq!(report.counters.total_messages, 3);
        assert_eq!(report.counters.processed_messages, 2);
        assert_eq!(report.counters.extracted_attachments, 3);
        assert_eq!(report.outcome(), RunOutcome::Processed);
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
        assert_eq!(
            report.deletion,
            DeletionStatus::Deleted(DeletionSummary { flagged: 2, expunged: 2 })
        );

        assert_eq!(std::fs::read(dir.path().join("report1.gz")).unwrap(), a);
        assert_eq!(std::fs::read(dir.path().join("report2.zip")).unwrap(), c_zip);
        assert_eq!(std::fs::read(dir.path().join("report3.xml.gz")).unwrap(), c_gz);

        assert_eq!(
            log.calls(),
            vec![
                Call::Select("INBOX".to_string()),
                Call::Fetch("1:3".to_string()),
                Call::Store("1,3".to_string(), DELETE_QUERY.to_string()),
                Call::Expunge,
                Call::Logout,
            ]
        );
    }

    #[tokio::test]
    async fn test_deletion_disabled_leaves_mailbox_untouched() {
        let dir = TempDir::new().unwrap();
        let (messages, ..) = mixed_mailbox();
        let session = MockImapSession::new(messages);
        let log = session.call_log();

        let report = run_with_session(session, &options(dir.path(), false)).await.unwrap();

        assert_eq!(report.counters.processed_messages, 2);
        assert_eq!(report.deletion, DeletionStatus::Disabled);
        assert!(!log.stored());
        assert!(!log.expunged());
        assert!(log.logged_out());
    }

    #[tokio::test]
    async fn test_empty_mailbox_skips_fetch() {
        let dir = TempDir::new().unwrap();
        let session = MockImapSession::new(Vec::new());
        let log = session.call_log();

        let report = run_with_session(session, &options(dir.path(), true)).await.unwrap();

        assert_eq!(report.counters.total_messages, 0);
        assert_eq!(report.outcome(), RunOutcome::NothingToDo);
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
        assert_eq!(report.deletion, DeletionStatus::NothingToDelete);
        assert_eq!(log.calls(), vec![Call::Select("INBOX".to_string()), Call::Logout]);
    }

    #[tokio::test]
    async fn test_mailbox_without_reports_is_nothing_to_do() {
        let dir = TempDir::new().unwrap();
        let session = MockImapSession::new(vec![
            raw(1, plain_text_message("one")),
            raw(2, plain_text_message("two")),
        ]);
        let log = session.call_log();

        let report = run_with_session(session, &options(dir.path(), true)).await.unwrap();

        assert_eq!(report.counters.total_messages, 2);
        assert_eq!(report.counters.processed_messages, 0);
        assert_eq!(report.outcome(), RunOutcome::NothingToDo);
        assert_eq!(report.exit_code(), EXIT_SUCCESS);
        assert_eq!(report.deletion, DeletionStatus::NothingToDelete);
        assert!(!log.stored());
        assert!(log.logged_out());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_written_files_and_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        let (mut messages, a, ..) = mixed_mailbox();
        messages.truncate(1);
        let mut session = MockImapSession::new(messages);
        session.exists = 3;
        session.fetch_result = Err(ImapError::Connection("connection reset".to_string()));
        let log = session.call_log();

        let result = run_with_session(session, &options(dir.path(), true)).await;

        assert!(matches!(result, Err(FetchError::Fetch(ImapError::Connection(_)))));
        assert_eq!(std::fs::read(dir.path().join("report1.gz")).unwrap(), a);
        assert!(!log.stored());
        assert!(!log.expunged());
        assert!(log.logged_out());
    }

    #[tokio::test]
    async fn test_select_failure_still_logs_out() {
        let dir = TempDir::new().unwrap();
        let mut session = MockImapSession::new(Vec::new());
        session.select_result = Err(ImapError::Operation("NO Mailbox doesn't exist".to_string()));
        let log = session.call_log();

        let result = run_with_session(session, &options(dir.path(), true)).await;

        match result {
            Err(FetchError::Select { mailbox, .. }) => assert_eq!(mailbox, "INBOX"),
            other => panic!("expected select failure, got {:?}", other),
        }
        assert_eq!(log.calls(), vec![Call::Select("INBOX".to_string()), Call::Logout]);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_without_expunge() {
        let dir = TempDir::new().unwrap();
        let (messages, ..) = mixed_mailbox();
        let mut session = MockImapSession::new(messages);
        session.store_result = Err(ImapError::Command("NO STORE rejected".to_string()));
        let log = session.call_log();

        let report = run_with_session(session, &options(dir.path(), true)).await.unwrap();

        assert_eq!(report.counters.processed_messages, 2);
        assert!(matches!(report.deletion, DeletionStatus::Failed(DeletionError::Flag(_))));
        assert_eq!(report.exit_code(), EXIT_CLEANUP_FAILED);
        assert!(log.stored());
        assert!(!log.expunged());
        assert!(log.logged_out());
        assert!(dir.path().join("report1.gz").exists());
    }

    #[tokio::test]
    async fn test_expunge_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let (messages, ..) = mixed_mailbox();
        let mut session = MockImapSession::new(messages);
        session.expunge_result = Err(ImapError::Command("NO EXPUNGE failed".to_string()));

        let report = run_with_session(session, &options(dir.path(), true)).await.unwrap();

        assert!(matches!(report.deletion, DeletionStatus::Failed(DeletionError::Expunge(_))));
    }

    #[tokio::test]
    async fn test_logout_failure_does_not_fail_the_run() {
        let dir = TempDir::new().unwrap();
        let (messages, ..) = mixed_mailbox();
        let mut session = MockImapSession::new(messages);
        session.logout_result = Err(ImapError::Connection("broken pipe".to_string()));

        let report = run_with_session(session, &options(dir.path(), false)).await.unwrap();

        assert_eq!(report.outcome(), RunOutcome::Processed);
    }

    #[tokio::test]
    async fn test_unsafe_filename_is_not_deleted() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let payload = gzip_bytes(7);
        let session = MockImapSession::new(vec![raw(
            1,
            report_message("sneaky", &[Attachment::gzip("../../etc/cron.d/evil.gz", &payload)]),
        )]);
        let log = session.call_log();

        let report = run_with_session(session, &options(&out, true)).await.unwrap();

        assert_eq!(report.counters.processed_messages, 0);
        assert_eq!(report.deletion, DeletionStatus::NothingToDelete);
        assert!(!log.stored());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_message_mixing_rejected_and_safe_names_is_deleted() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let evil = gzip_bytes(0xe1);
        let good = gzip_bytes(0x60);
        let session = MockImapSession::new(vec![raw(
            1,
            report_message(
                "mixed",
                &[Attachment::gzip("../evil.gz", &evil), Attachment::gzip("good.gz", &good)],
            ),
        )]);
        let log = session.call_log();

        let report = run_with_session(session, &options(&out, true)).await.unwrap();

        assert_eq!(report.counters.processed_messages, 1);
        assert_eq!(report.counters.extracted_attachments, 1);
        assert_eq!(std::fs::read(out.join("good.gz")).unwrap(), good);
        assert!(!dir.path().join("evil.gz").exists());
        assert!(log
            .calls()
            .contains(&Call::Store("1".to_string(), DELETE_QUERY.to_string())));
    }

    #[tokio::test]
    async fn test_deeply_nested_report_is_extracted_and_deleted() {
        let dir = TempDir::new().unwrap();
        let payload = gzip_bytes(0x42);
        let session = MockImapSession::new(vec![raw(
            1,
            nested_report_message(40, &Attachment::gzip("forwarded.xml.gz", &payload)),
        )]);
        let log = session.call_log();

        let report = run_with_session(session, &options(dir.path(), true)).await.unwrap();

        assert_eq!(report.counters.processed_messages, 1);
        assert_eq!(std::fs::read(dir.path().join("forwarded.xml.gz")).unwrap(), payload);
        assert!(log.expunged());
    }

    #[tokio::test]
    async fn test_bodiless_message_is_counted_and_skipped() {
        let dir = TempDir::new().unwrap();
        let payload = gzip_bytes(1);
        let session = MockImapSession::new(vec![
            RawMessage { seq: 1, body: None },
            raw(2, report_message("r", &[Attachment::gzip("r.xml.gz", &payload)])),
        ]);
        let log = session.call_log();

        let report = run_with_session(session, &options(dir.path(), true)).await.unwrap();

        assert_eq!(report.counters.total_messages, 2);
        assert_eq!(report.counters.processed_messages, 1);
        assert!(log
            .calls()
            .contains(&Call::Store("2".to_string(), DELETE_QUERY.to_string())));
    }

    #[tokio::test]
    async fn test_unparseable_message_aborts_without_deletion() {
        let dir = TempDir::new().unwrap();
        let payload = gzip_bytes(1);
        let session = MockImapSession::new(vec![
            raw(1, report_message("r", &[Attachment::gzip("first.xml.gz", &payload)])),
            raw(2, b"Subject: x\r\nContent-Type: gzip\r\n\r\nbody\r\n".to_vec()),
            raw(3, report_message("r", &[Attachment::gzip("third.xml.gz", &payload)])),
        ]);
        let log = session.call_log();

        let result = run_with_session(session, &options(dir.path(), true)).await;

        assert!(matches!(result, Err(FetchError::Mime { seq: 2, .. })));
        assert!(dir.path().join("first.xml.gz").exists());
        assert!(!dir.path().join("third.xml.gz").exists());
        assert!(!log.stored());
        assert!(log.logged_out());
    }

    #[tokio::test]
    async fn test_write_failure_aborts_and_releases_producer() {
        let dir = TempDir::new().unwrap();
        let payload = gzip_bytes(1);
        // More messages than the channel holds, so the producer is blocked
        // when the consumer gives up.
        let messages = (1..=30)
            .map(|seq| raw(seq, report_message("r", &[Attachment::gzip(&format!("r{}.gz", seq), &payload)])))
            .collect();
        let session = MockImapSession::new(messages);
        let log = session.call_log();

        let result = run_with_session(session, &options(&dir.path().join("missing"), true)).await;

        assert!(matches!(result, Err(FetchError::Extract { seq: 1, .. })));
        assert!(!log.stored());
        assert!(log.logged_out());
    }

    #[tokio::test]
    async fn test_large_mailbox_streams_through_bounded_channel() {
        let dir = TempDir::new().unwrap();
        let payload = gzip_bytes(2);
        let messages = (1..=25)
            .map(|seq| raw(seq, report_message("r", &[Attachment::gzip(&format!("{}.xml.gz", seq), &payload)])))
            .collect();
        let session = MockImapSession::new(messages);
        let log = session.call_log();

        let report = run_with_session(session, &options(dir.path(), true)).await.unwrap();

        assert_eq!(report.counters.total_messages, 25);
        assert_eq!(report.counters.processed_messages, 25);
        assert!(log
            .calls()
            .contains(&Call::Store("1:25".to_string(), DELETE_QUERY.to_string())));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 25);
    }
}
