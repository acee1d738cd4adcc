// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::debug;

use crate::mime::entity::Entity;

/// Container formats aggregate and forensic reports are delivered in.
pub const REPORT_CONTENT_TYPES: [&str; 4] = [
    "application/gzip",
    "application/zip",
    "application/octet-stream",
    "application/x-zip-compressed",
];

/// A leaf part selected for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentCandidate<'a> {
    pub content_type: &'a str,
    /// Passed through unvalidated; the extractor decides what is acceptable.
    pub filename: Option<&'a str>,
    pub bytes: &'a [u8],
}

pub fn is_report_content_type(content_type: &str) -> bool {
    REPORT_CONTENT_TYPES
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(content_type))
}

/// Returns the part as an attachment candidate when its content type is
/// one of [`REPORT_CONTENT_TYPES`]. Containers and any other type yield `None`.
pub fn classify(entity: &Entity) -> Option<AttachmentCandidate<'_>> {
    debug!("Part content type: {}", entity.content_type);

    let bytes = entity.bytes()?;
    if !is_report_content_type(&entity.content_type) {
        return None;
    }

    Some(AttachmentCandidate {
        content_type: &entity.content_type,
        filename: entity.filename.as_deref(),
        bytes,
    })
}
