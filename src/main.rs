// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fetches DMARC report attachments from IMAP into the report directory.
//!
//! Exit codes:
//!   0 - Success, including an empty mailbox or one without report attachments
//!   1 - Error
//!   3 - Reports extracted but removing the messages from the server failed

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dmarc_fetch::config::Settings;
use dmarc_fetch::runner::{self, DeletionStatus, RunOutcome, EXIT_FAILURE};
use env_logger::Env;
use log::{error, info};

#[derive(Parser)]
#[command(name = "dmarc-fetch", about = "Fetch DMARC report attachments from an IMAP mailbox")]
struct Cli {
    /// Configuration file (toml)
    #[arg(short, long, env = "DMARC_FETCH_CONFIG")]
    config: Option<String>,

    /// Directory the report attachments are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Mailbox to fetch from
    #[arg(long)]
    mailbox: Option<String>,

    /// Delete messages from the server after their reports were extracted
    #[arg(long)]
    delete: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = Settings::new(cli.config.as_deref());
    let level = settings
        .as_ref()
        .map(|s| s.log.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let mut settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    if let Some(dir) = cli.output_dir {
        settings.output_dir = dir;
    }
    if let Some(mailbox) = cli.mailbox {
        settings.imap.mailbox = mailbox;
    }
    if cli.delete {
        settings.imap.delete = true;
    }

    let report = match runner::run(&settings).await {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    if let DeletionStatus::Failed(e) = &report.deletion {
        error!("Reports were extracted but cleanup failed: {}", e);
    }
    if report.outcome() == RunOutcome::NothingToDo && report.counters.total_messages > 0 {
        info!("No new parsable messages on server");
    }

    ExitCode::from(report.exit_code())
}
