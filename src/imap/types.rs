// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::BTreeSet;
use std::fmt;

/// IMAP system flag marking a message for removal on the next EXPUNGE.
pub const DELETED_FLAG: &str = "\\Deleted";

/// Ordered set of message sequence numbers.
///
/// Rendered in IMAP sequence-set syntax with contiguous runs collapsed,
/// e.g. `1:3,7,9:10`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceSet {
    numbers: BTreeSet<u32>,
}

impl SequenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive range `start..=end`. Empty when `start` is 0 or past `end`.
    pub fn range(start: u32, end: u32) -> Self {
        let start = start.max(1);
        Self {
            numbers: (start..=end).collect(),
        }
    }

    pub fn insert(&mut self, seq: u32) {
        if seq > 0 {
            self.numbers.insert(seq);
        }
    }

    pub fn contains(&self, seq: u32) -> bool {
        self.numbers.contains(&seq)
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.numbers.iter().copied()
    }
}

impl FromIterator<u32> for SequenceSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = SequenceSet::new();
        for seq in iter {
            set.insert(seq);
        }
        set
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut runs: Vec<(u32, u32)> = Vec::new();
        for seq in self.iter() {
            match runs.last_mut() {
                Some((_, end)) if *end + 1 == seq => *end = seq,
                _ => runs.push((seq, seq)),
            }
        }

        let rendered = runs
            .iter()
            .map(|(start, end)| {
                if start == end {
                    start.to_string()
                } else {
                    format!("{}:{}", start, end)
                }
            })
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&rendered)
    }
}

/// State of a mailbox right after SELECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxInfo {
    pub name: String,
    pub exists: u32,
}

/// One message as delivered by FETCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub seq: u32,
    /// Full RFC 5322 source; `None` when the server sent no body item.
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Add,
}

impl StoreOperation {
    pub fn as_imap_str(&self) -> &'static str {
        match self {
            StoreOperation::Add => "+FLAGS",
        }
    }
}
