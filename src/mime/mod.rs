// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

pub mod classifier;
pub mod entity;
pub mod walker;

pub use classifier::{classify, AttachmentCandidate, REPORT_CONTENT_TYPES};
pub use entity::{Entity, EntityBody, MimeError};
pub use walker::walk;
