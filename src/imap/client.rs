// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;
use std::time::Duration;

use async_imap::Client as AsyncImapClient;
use rustls_pki_types::ServerName as PkiServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream as TokioTcpStream;
use tokio_rustls::{client::TlsStream as TokioTlsStreamClient, TlsConnector};
use tokio_util::compat::TokioAsyncReadCompatExt;

use crate::config::ImapSettings;
use crate::imap::error::ImapError;
use crate::imap::session::{bounded, AsyncImapSessionWrapper, TlsCompatibleStream, TlsImapSession};

// --- Type Aliases ---

type BaseTcpStream = TokioTcpStream;
type BaseTlsStream = TokioTlsStreamClient<BaseTcpStream>;

// --- Internal Connection Logic ---

/// Builds a TLS connector trusting the platform's native root certificates.
fn build_tls_connector() -> Result<TlsConnector, ImapError> {
    let mut root_cert_store = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs()
        .map_err(|e| ImapError::Tls(format!("Failed to load native certificates: {}", e)))?;
    let (added, ignored) = root_cert_store.add_parsable_certificates(certs);
    log::debug!("Loaded {} native certs, ignored {}.", added, ignored);
    if root_cert_store.is_empty() {
        log::warn!("Root certificate store is empty after loading native certs.");
    }

    let config = ClientConfig::builder()
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Establishes TCP connection and performs the TLS handshake.
async fn setup_tls_stream(
    host: &str,
    port: u16,
    tls_connector: TlsConnector,
    server_name_for_tls: PkiServerName<'static>,
) -> Result<BaseTlsStream, ImapError> {
    log::debug!("Attempting TCP connection to {}:{}...", host, port);
    let tcp_stream = BaseTcpStream::connect((host, port))
        .await
        .map_err(|e| ImapError::Connection(format!("{}:{}: {}", host, port, e)))?;
    log::debug!("TCP connected. Performing TLS handshake...");

    let tls_stream = tls_connector
        .connect(server_name_for_tls, tcp_stream)
        .await
        .map_err(|e| ImapError::Tls(e.to_string()))?;
    log::debug!("TLS handshake successful.");
    Ok(tls_stream)
}

/// Performs IMAP login using the compatible stream.
async fn perform_imap_login(
    compat_stream: TlsCompatibleStream,
    username: &str,
    password: &str,
) -> Result<TlsImapSession, ImapError> {
    let client = AsyncImapClient::new(compat_stream);
    log::debug!("IMAP client created. Attempting login for user '{}'...", username);

    match client.login(username, password).await {
        Ok(session) => Ok(session),
        Err((e, _client)) => {
            log::error!("IMAP login failed for user {}: {:?}", username, e);
            Err(ImapError::Auth(e.to_string()))
        }
    }
}

// --- Public Connection Entry Point ---

/// Connects over TLS to the configured server and logs in.
///
/// Connection and TLS problems surface as [`ImapError::Connection`] /
/// [`ImapError::Tls`], rejected credentials as [`ImapError::Auth`]. When a
/// timeout is configured it bounds each phase separately and is carried
/// into the returned session for every later command.
pub async fn connect(settings: &ImapSettings) -> Result<AsyncImapSessionWrapper, ImapError> {
    let host = settings.host.as_str();
    let port = settings.port;
    let limit: Option<Duration> = settings.timeout();

    let server_name: PkiServerName<'static> = PkiServerName::try_from(host.to_string())
        .map_err(|_| ImapError::Connection(format!("Invalid server name format: {}", host)))?;
    let tls_connector = build_tls_connector()?;

    let tls_stream = bounded(
        limit,
        "connect",
        setup_tls_stream(host, port, tls_connector, server_name),
    )
    .await?;
    log::info!("Connected to: {}:{}", host, port);

    let session = bounded(
        limit,
        "LOGIN",
        perform_imap_login(tls_stream.compat(), &settings.username, &settings.password),
    )
    .await?;
    log::info!("Logged in as: {}", settings.username);

    Ok(AsyncImapSessionWrapper::new(session, limit))
}
