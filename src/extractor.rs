// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Persists classified report attachments into the output directory.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::mime::AttachmentCandidate;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("attachment has no filename")]
    MissingFilename,
    #[error("refusing unsafe attachment filename {0:?}")]
    UnsafeFilename(String),
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    /// Only I/O failures abort a run; filename rejections skip the part.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExtractError::Io { .. })
    }
}

/// Checks that a sender-supplied filename names a single plain entry.
pub fn validate_filename(filename: &str) -> Result<&str, ExtractError> {
    if filename.trim().is_empty() {
        return Err(ExtractError::MissingFilename);
    }
    if filename.contains(['/', '\\', '\0']) {
        return Err(ExtractError::UnsafeFilename(filename.to_string()));
    }

    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(filename),
        _ => Err(ExtractError::UnsafeFilename(filename.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct AttachmentExtractor {
    output_dir: PathBuf,
}

impl AttachmentExtractor {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Creates the output directory if it does not exist yet.
    pub fn prepare(&self) -> Result<(), ExtractError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| ExtractError::Io {
            path: self.output_dir.clone(),
            source,
        })
    }

    pub fn target_path(&self, filename: Option<&str>) -> Result<PathBuf, ExtractError> {
        let filename = validate_filename(filename.ok_or(ExtractError::MissingFilename)?)?;
        Ok(self.output_dir.join(filename))
    }

    /// Writes the attachment bytes unmodified, creating or truncating the file.
    pub fn extract(&self, candidate: &AttachmentCandidate<'_>) -> Result<PathBuf, ExtractError> {
        let path = self.target_path(candidate.filename)?;
        info!("Extracting file {}", path.display());

        write_report_file(&path, candidate.bytes).map_err(|source| ExtractError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("Wrote {} bytes to {}", candidate.bytes.len(), path.display());
        Ok(path)
    }
}

fn write_report_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.flush()
}
