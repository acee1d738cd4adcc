// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::common::{gzip_bytes, plain_text_message, report_message, Attachment};
    use dmarc_fetch::mime::{self, Entity, MimeError};

    #[test]
    fn test_report_mail_yields_single_gzip_candidate() {
        let payload = gzip_bytes(1);
        let raw = report_message(
            "Report domain: example.com",
            &[Attachment::gzip("google.com!example.com!1700000000!1700086399.xml.gz", &payload)],
        );

        let entity = Entity::parse(&raw).unwrap();
        let candidates: Vec<_> = mime::walk(&entity).collect();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].content_type, "application/gzip");
        assert_eq!(
            candidates[0].filename,
            Some("google.com!example.com!1700000000!1700086399.xml.gz")
        );
        assert_eq!(candidates[0].bytes, payload.as_slice());
    }

    #[test]
    fn test_candidates_follow_document_order() {
        let zip = b"PK\x03\x04zipped".to_vec();
        let gz = gzip_bytes(2);
        let raw = report_message(
            "Two reports",
            &[Attachment::zip("first.zip", &zip), Attachment::gzip("second.xml.gz", &gz)],
        );

        let entity = Entity::parse(&raw).unwrap();
        let names: Vec<_> = mime::walk(&entity).filter_map(|c| c.filename).collect();

        assert_eq!(names, vec!["first.zip", "second.xml.gz"]);
    }

    #[test]
    fn test_plain_mail_has_no_candidates() {
        let raw = plain_text_message("Hello");
        let entity = Entity::parse(&raw).unwrap();

        assert!(!entity.is_multipart());
        assert_eq!(entity.content_type, "text/plain");
        assert_eq!(mime::walk(&entity).count(), 0);
    }

    #[test]
    fn test_mixed_case_content_types_are_recognised() {
        let payload = gzip_bytes(3);
        let raw = report_message(
            "Shouting",
            &[Attachment {
                content_type: "Application/X-Zip-Compressed",
                filename: Some("report.zip"),
                bytes: &payload,
            }],
        );

        let entity = Entity::parse(&raw).unwrap();
        let candidate = mime::walk(&entity).next().expect("candidate");

        assert_eq!(candidate.content_type, "application/x-zip-compressed");
    }

    #[test]
    fn test_octet_stream_without_filename_is_still_a_candidate() {
        let payload = gzip_bytes(4);
        let raw = report_message(
            "Anonymous",
            &[Attachment {
                content_type: "application/octet-stream",
                filename: None,
                bytes: &payload,
            }],
        );

        let entity = Entity::parse(&raw).unwrap();
        let candidate = mime::walk(&entity).next().expect("candidate");

        assert_eq!(candidate.filename, None);
        assert_eq!(candidate.bytes, payload.as_slice());
    }

    #[test]
    fn test_forwarded_report_inside_nested_multipart() {
        let payload = gzip_bytes(5);
        let inner = String::from_utf8(report_message("inner", &[Attachment::gzip("inner.xml.gz", &payload)])).unwrap();
        // Re-wrap the inner multipart body under an outer boundary
        let inner_body = inner.split_once("\r\n\r\n").map(|(_, body)| body).unwrap();
        let raw = format!(
            "Subject: Fwd: report\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
--outer\r\n\
Content-Type: text/plain\r\n\
\r\n\
See below.\r\n\
--outer\r\n\
Content-Type: multipart/mixed; boundary=\"----=_Part_4711_report\"\r\n\
\r\n\
{}\r\n\
--outer--\r\n",
            inner_body
        );

        let entity = Entity::parse(raw.as_bytes()).unwrap();
        let candidates: Vec<_> = mime::walk(&entity).collect();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].filename, Some("inner.xml.gz"));
        assert_eq!(candidates[0].bytes, payload.as_slice());
    }

    #[test]
    fn test_content_type_without_subtype_is_malformed() {
        let raw = b"Subject: broken\r\nContent-Type: gzip\r\n\r\nbody\r\n";

        assert!(matches!(Entity::parse(raw), Err(MimeError::MalformedContentType(_))));
    }
}
