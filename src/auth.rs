//! OAuth2 authentication management for Gmail API

use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use std::path::{Path, PathBuf};

use crate::batch::BatchTransport;
use crate::client::ProductionGmailClient;
use crate::error::{GmailError, Result};

/// Read-only access is all the stats collector needs
pub const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

pub const READONLY_SCOPES: &[&str] = &[READONLY_SCOPE];

/// Client secret file name used when none is given on the command line
pub const DEFAULT_CLIENT_SECRET_FILE: &str = "client_secret.json";

type HttpsConnector = hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<HttpsConnector>;

/// Installed-flow authenticator with on-disk token persistence
pub type GmailAuthenticator = yup_oauth2::authenticator::Authenticator<HttpsConnector>;

/// Token cache location: `~/.credentials/gmail-rust-stats.json`.
///
/// Falls back to the current directory when no home directory is known.
pub fn default_token_cache_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".credentials")
        .join("gmail-rust-stats.json")
}

fn https_connector() -> Result<HttpsConnector> {
    Ok(hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(|e| GmailError::AuthError(format!("Failed to load TLS roots: {}", e)))?
        .https_or_http()
        .enable_http1()
        .build())
}

/// Run the installed-app OAuth2 flow (or reuse cached tokens) and build a
/// ready-to-use client.
///
/// # Arguments
/// * `credentials_path` - Path to the OAuth2 client secret JSON file
/// * `token_cache_path` - Path where access tokens will be cached
pub async fn initialize_gmail_client(
    credentials_path: &Path,
    token_cache_path: &Path,
) -> Result<ProductionGmailClient> {
    let secret = yup_oauth2::read_application_secret(credentials_path)
        .await
        .map_err(|e| {
            GmailError::AuthError(format!(
                "Failed to read client secret {:?}: {}",
                credentials_path, e
            ))
        })?;

    if let Some(parent) = token_cache_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    // HTTPRedirect opens a browser for user authorization
    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        secret,
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| GmailError::AuthError(format!("Failed to build authenticator: {}", e)))?;

    // Obtain the token up front so the browser flow happens before any API call
    auth.token(READONLY_SCOPES)
        .await
        .map_err(|e| GmailError::AuthError(format!("Failed to obtain token: {}", e)))?;

    if token_cache_path.exists() {
        secure_token_file(token_cache_path).await?;
    }
    tracing::debug!("Token cache at {:?}", token_cache_path);

    // HTTP/1 works better with google-gmail1 and the batch endpoint
    let hub_client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(https_connector()?);
    let batch_client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(https_connector()?);

    let hub = Gmail::new(hub_client, auth.clone());
    Ok(ProductionGmailClient::new(hub, auth, BatchTransport::new(batch_client)))
}

/// Secure token file permissions on Unix systems
///
/// Sets file permissions to 0600 (read/write for owner only)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows uses ACLs rather than mode bits; nothing to do
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
