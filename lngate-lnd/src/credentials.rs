//! Macaroon and TLS certificate loading.
//!
//! The macaroon is read on first use, hex encoded and kept for the rest of
//! the process. It is assumed not to rotate while the process is running.

use std::path::{Path, PathBuf};

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::LndError;

/// Header LND's REST proxy reads the macaroon from.
pub const MACAROON_HEADER: &str = "Grpc-Metadata-macaroon";

#[derive(Debug)]
pub struct Credentials {
    macaroon_path: Option<PathBuf>,
    macaroon: OnceCell<String>,
}

impl Credentials {
    pub fn new(macaroon_path: Option<PathBuf>) -> Self {
        Self {
            macaroon_path,
            macaroon: OnceCell::new(),
        }
    }

    /// Uses an already hex encoded macaroon instead of reading it from disk.
    pub fn from_hex(macaroon_hex: impl Into<String>) -> Self {
        Self {
            macaroon_path: None,
            macaroon: OnceCell::from(macaroon_hex.into()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.macaroon.initialized()
    }

    /// Returns the hex encoded macaroon, reading it from disk on first call.
    pub async fn macaroon(&self) -> Result<&str, LndError> {
        self.macaroon
            .get_or_try_init(|| async {
                let path = self.macaroon_path.as_deref().ok_or_else(|| {
                    LndError::Configuration("LND_MACAROON_PATH is not set".to_owned())
                })?;
                let raw = tokio::fs::read(path).await.map_err(|err| {
                    LndError::Configuration(format!(
                        "can not read macaroon {}: {err}",
                        path.display()
                    ))
                })?;
                info!("loaded macaroon from {}", path.display());
                Ok::<_, LndError>(hex::encode(raw))
            })
            .await
            .map(String::as_str)
    }
}

/// Reads a PEM encoded certificate that the node's REST endpoint presents.
pub fn load_certificate(path: &Path) -> Result<reqwest::Certificate, LndError> {
    let pem = std::fs::read(path).map_err(|err| {
        LndError::Configuration(format!(
            "can not read tls certificate {}: {err}",
            path.display()
        ))
    })?;
    debug!("loaded tls certificate from {}", path.display());
    reqwest::Certificate::from_pem(&pem).map_err(|err| {
        LndError::Configuration(format!(
            "invalid tls certificate {}: {err}",
            path.display()
        ))
    })
}
