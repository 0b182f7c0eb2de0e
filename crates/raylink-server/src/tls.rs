//! Optional secure transport.
//!
//! The secrets file is a small JSON document naming the PEM files:
//!
//! ```json
//! { "key": "web/key.pem", "cert": "web/cert.pem" }
//! ```
//!
//! Paths are taken as written, relative to the working directory. Missing or broken material is
//! never fatal: the caller logs the [`TlsError`] and keeps serving plain HTTP.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read secrets file {}: {source}", path.display())]
    ReadSecrets {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed secrets file {}: {source}", path.display())]
    ParseSecrets {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read {what} {}: {source}", path.display())]
    ReadPem {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid certificate or key: {0}")]
    InvalidMaterial(#[source] io::Error),

    #[error("no port left for the secure listener above {0}")]
    NoSecurePort(u16),

    #[error("secure listener on {addr} failed: {reason}")]
    Listen { addr: SocketAddr, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Secrets {
    pub key: PathBuf,
    pub cert: PathBuf,
}

impl Secrets {
    pub async fn load(path: &Path) -> Result<Self, TlsError> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|source| TlsError::ReadSecrets {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_slice(&raw).map_err(|source| TlsError::ParseSecrets {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// PEM-encoded certificate chain and private key.
pub struct TlsMaterial {
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

impl TlsMaterial {
    pub async fn load(secrets_path: &Path) -> Result<Self, TlsError> {
        let secrets = Secrets::load(secrets_path).await?;
        let key = read_pem("key", &secrets.key).await?;
        let cert = read_pem("cert", &secrets.cert).await?;
        Ok(Self { cert, key })
    }

    pub async fn into_rustls_config(self) -> Result<RustlsConfig, TlsError> {
        RustlsConfig::from_pem(self.cert, self.key)
            .await
            .map_err(TlsError::InvalidMaterial)
    }
}

async fn read_pem(what: &'static str, path: &Path) -> Result<Vec<u8>, TlsError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| TlsError::ReadPem {
            what,
            path: path.to_path_buf(),
            source,
        })
}

/// The secure listener sits one port above the plain one.
pub fn secure_addr(plain: SocketAddr) -> Result<SocketAddr, TlsError> {
    let port = plain
        .port()
        .checked_add(1)
        .ok_or(TlsError::NoSecurePort(plain.port()))?;
    Ok(SocketAddr::new(plain.ip(), port))
}
