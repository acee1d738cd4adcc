// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Owned MIME entity tree built from a raw RFC 5322 message.

use mail_parser::{Message, MessagePart, MimeHeaders, PartType};
use thiserror::Error;

/// Content type assumed for parts that carry no Content-Type header.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MimeError {
    #[error("message could not be parsed as MIME")]
    Unparseable,
    #[error("malformed Content-Type header: {0}")]
    MalformedContentType(String),
}

/// A parsed MIME node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// Lowercased `type/subtype`.
    pub content_type: String,
    /// Filename advertised by the part, if any.
    pub filename: Option<String>,
    pub body: EntityBody,
}

/// A node is either a leaf holding decoded bytes or a container of parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityBody {
    Leaf(Vec<u8>),
    Multipart(Vec<Entity>),
}

impl Entity {
    pub fn leaf(content_type: &str, filename: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            content_type: content_type.to_ascii_lowercase(),
            filename: filename.map(str::to_string),
            body: EntityBody::Leaf(bytes),
        }
    }

    pub fn multipart(content_type: &str, children: Vec<Entity>) -> Self {
        Self {
            content_type: content_type.to_ascii_lowercase(),
            filename: None,
            body: EntityBody::Multipart(children),
        }
    }

    /// Parses a full message source into an entity tree.
    pub fn parse(raw: &[u8]) -> Result<Self, MimeError> {
        let message = Message::parse(raw).ok_or(MimeError::Unparseable)?;
        let root = message.parts.first().ok_or(MimeError::Unparseable)?;
        build_tree(&message, root)
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.body, EntityBody::Multipart(_))
    }

    /// Children of a container, in encoded order; empty for leaves.
    pub fn children(&self) -> &[Entity] {
        match &self.body {
            EntityBody::Multipart(children) => children,
            EntityBody::Leaf(_) => &[],
        }
    }

    /// Decoded payload of a leaf; `None` for containers.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.body {
            EntityBody::Leaf(bytes) => Some(bytes),
            EntityBody::Multipart(_) => None,
        }
    }
}

/// A container whose children are still being built.
struct OpenContainer<'m> {
    content_type: String,
    pending: std::slice::Iter<'m, usize>,
    children: Vec<Entity>,
}

// Depth-first with an explicit stack, so nesting depth is bounded only by memory.
fn build_tree<'m, 'x>(message: &'m Message<'x>, root: &'m MessagePart<'x>) -> Result<Entity, MimeError> {
    let mut open: Vec<OpenContainer<'m>> = Vec::new();
    let mut current = root;

    loop {
        let content_type = content_type_of(current)?;
        let mut finished = match &current.body {
            PartType::Multipart(ids) => {
                open.push(OpenContainer {
                    content_type,
                    pending: ids.iter(),
                    children: Vec::with_capacity(ids.len()),
                });
                None
            }
            _ => Some(Entity {
                content_type,
                filename: filename_of(current),
                body: EntityBody::Leaf(current.contents().to_vec()),
            }),
        };

        loop {
            let Some(container) = open.last_mut() else {
                return finished.ok_or(MimeError::Unparseable);
            };
            if let Some(entity) = finished.take() {
                container.children.push(entity);
            }
            if let Some(child) = container.pending.by_ref().find_map(|id| message.parts.get(*id)) {
                current = child;
                break;
            }
            if let Some(done) = open.pop() {
                finished = Some(Entity {
                    content_type: done.content_type,
                    filename: None,
                    body: EntityBody::Multipart(done.children),
                });
            }
        }
    }
}

fn content_type_of(part: &MessagePart<'_>) -> Result<String, MimeError> {
    let Some(ct) = part.content_type() else {
        return Ok(DEFAULT_CONTENT_TYPE.to_string());
    };

    let main = ct.ctype().trim();
    match ct.subtype().map(str::trim) {
        Some(sub) if !main.is_empty() && !sub.is_empty() => {
            Ok(format!("{}/{}", main, sub).to_ascii_lowercase())
        }
        _ => Err(MimeError::MalformedContentType(main.to_string())),
    }
}

// Content-Disposition filename first, then the legacy Content-Type name.
fn filename_of(part: &MessagePart<'_>) -> Option<String> {
    part.content_disposition()
        .and_then(|cd| cd.attribute("filename"))
        .or_else(|| part.content_type().and_then(|ct| ct.attribute("name")))
        .map(str::to_string)
}
