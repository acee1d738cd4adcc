// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use config::{Environment, File};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ImapSettings {
    #[validate(length(min = 1, message = "IMAP host must not be empty"))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(length(min = 1, message = "IMAP username must not be empty"))]
    pub username: String,
    pub password: String,
    #[validate(length(min = 1, message = "mailbox must not be empty"))]
    pub mailbox: String,
    /// Remove messages from the server once their reports are extracted.
    pub delete: bool,
    /// Bound on every network call; unset means wait indefinitely.
    #[validate(range(min = 1))]
    pub timeout_secs: Option<u64>,
}

impl ImapSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub imap: ImapSettings,
    /// Where report attachments are written for the downstream converter.
    pub output_dir: PathBuf,
    pub log: LogConfig,
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load or parse configuration: {0}")]
    LoadError(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ValidationErrors),
}

// Direct environment overrides, e.g. `IMAP_HOST=...` overrides `imap.host`.
const ENV_OVERRIDES: [(&str, &str); 7] = [
    ("IMAP_HOST", "imap.host"),
    ("IMAP_PORT", "imap.port"),
    ("IMAP_USER", "imap.username"),
    ("IMAP_PASS", "imap.password"),
    ("IMAP_MAILBOX", "imap.mailbox"),
    ("IMAP_DELETE", "imap.delete"),
    ("OUTPUT_DIR", "output_dir"),
];

impl Settings {
    /// Loads defaults, then `config_path` if given, then `DMARC_FETCH_*`
    /// variables (`__` separates nested keys, e.g. `DMARC_FETCH_IMAP__HOST`),
    /// then the plain `IMAP_*` / `OUTPUT_DIR` overrides, and validates the result.
    pub fn new(config_path: Option<&str>) -> Result<Self, SettingsError> {
        let mut config_builder = config::Config::builder()
            .set_default("imap.host", "localhost")?
            .set_default("imap.port", 993)?
            .set_default("imap.username", "")?
            .set_default("imap.password", "")?
            .set_default("imap.mailbox", "INBOX")?
            .set_default("imap.delete", false)?
            .set_default("output_dir", "reports")?
            .set_default("log.level", "info")?;

        if let Some(path) = config_path {
            config_builder = config_builder.add_source(File::with_name(path));
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("DMARC_FETCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .ignore_empty(true),
        );

        for (env_var, config_path) in &ENV_OVERRIDES {
            let Ok(value) = env::var(env_var) else {
                continue;
            };
            match *env_var {
                "IMAP_PORT" => match value.parse::<u16>() {
                    Ok(port) => config_builder = config_builder.set_override(config_path, i64::from(port))?,
                    Err(_) => warn!("Invalid port value in {}: {}", env_var, value),
                },
                "IMAP_DELETE" => match value.parse::<bool>() {
                    Ok(delete) => config_builder = config_builder.set_override(config_path, delete)?,
                    Err(_) => warn!("Invalid boolean value in {}: {}", env_var, value),
                },
                _ => config_builder = config_builder.set_override(config_path, value)?,
            }
        }

        let settings: Settings = config_builder.build()?.try_deserialize()?;
        settings.check()?;
        Ok(settings)
    }

    /// Field validation plus the checks the derive cannot express.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        if self.output_dir.as_os_str().is_empty() {
            errors.add("output_dir", ValidationError::new("output_dir must not be empty"));
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig { level: "info".to_string() }
    }
}

impl Default for ImapSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 993,
            username: String::new(),
            password: String::new(),
            mailbox: "INBOX".to_string(),
            delete: false,
            timeout_secs: None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            imap: ImapSettings::default(),
            output_dir: PathBuf::from("reports"),
            log: LogConfig::default(),
        }
    }
}
