// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::mime::classifier::{classify, AttachmentCandidate};
use crate::mime::entity::Entity;

/// Depth-first, document-order iterator over the leaf parts of an entity.
///
/// A leaf root yields itself; a container yields the leaves of each child
/// in encoded order, descending through nested multiparts.
pub struct Leaves<'a> {
    stack: Vec<&'a Entity>,
}

impl<'a> Leaves<'a> {
    pub fn new(root: &'a Entity) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a Entity;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(entity) = self.stack.pop() {
            if entity.is_multipart() {
                self.stack.extend(entity.children().iter().rev());
            } else {
                return Some(entity);
            }
        }
        None
    }
}

/// Lazily yields every extractable attachment in `root`, in document order.
pub fn walk(root: &Entity) -> impl Iterator<Item = AttachmentCandidate<'_>> {
    Leaves::new(root).filter_map(classify)
}
