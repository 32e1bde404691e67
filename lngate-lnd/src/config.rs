use std::{
    fmt::{self, Formatter},
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::LndError;

pub const DEFAULT_REST_URL: &str = "https://localhost:8080";
pub const DEFAULT_INVOICE_EXPIRY: u64 = 3600;
pub const DEFAULT_STREAM_BUFFER: usize = 64;

const fn default_invoice_expiry() -> u64 {
    DEFAULT_INVOICE_EXPIRY
}

const fn default_stream_buffer() -> usize {
    DEFAULT_STREAM_BUFFER
}

#[derive(Deserialize, Serialize, Debug, Clone, Parser)]
pub struct LndSettings {
    /// Base url of the LND REST endpoint
    #[clap(long, env = "LND_REST_URL", default_value = DEFAULT_REST_URL)]
    pub rest_url: Url,

    #[clap(long, env = "LND_MACAROON_PATH")]
    pub macaroon_path: Option<PathBuf>,

    #[clap(long, env = "LND_CERT_PATH")]
    pub tls_cert_path: Option<PathBuf>,

    /// Expiry in seconds for newly created invoices
    #[clap(long, env = "LND_INVOICE_EXPIRY", default_value_t = DEFAULT_INVOICE_EXPIRY)]
    #[serde(default = "default_invoice_expiry")]
    pub invoice_expiry: u64,

    /// Close a subscription after this many milliseconds without data
    #[clap(long, env = "LND_STREAM_IDLE_TIMEOUT_MS")]
    #[serde(default)]
    pub stream_idle_timeout_ms: Option<u64>,

    /// Number of undelivered events buffered per subscription
    #[clap(long, env = "LND_STREAM_BUFFER", default_value_t = DEFAULT_STREAM_BUFFER)]
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

impl LndSettings {
    pub fn new(rest_url: Url) -> Self {
        Self {
            rest_url,
            macaroon_path: None,
            tls_cert_path: None,
            invoice_expiry: DEFAULT_INVOICE_EXPIRY,
            stream_idle_timeout_ms: None,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Reads the settings from `LND_*` environment variables only.
    pub fn from_env() -> Result<Self, LndError> {
        Self::try_parse_from([env!("CARGO_PKG_NAME")])
            .map_err(|err| LndError::Configuration(err.to_string()))
    }

    pub fn with_macaroon_path(self, macaroon_path: impl Into<PathBuf>) -> Self {
        Self {
            macaroon_path: Some(macaroon_path.into()),
            ..self
        }
    }

    pub fn with_tls_cert_path(self, tls_cert_path: impl Into<PathBuf>) -> Self {
        Self {
            tls_cert_path: Some(tls_cert_path.into()),
            ..self
        }
    }

    pub fn with_invoice_expiry(self, invoice_expiry: u64) -> Self {
        Self {
            invoice_expiry,
            ..self
        }
    }

    pub fn with_stream_idle_timeout(self, timeout: Duration) -> Self {
        Self {
            stream_idle_timeout_ms: Some(timeout.as_millis() as u64),
            ..self
        }
    }

    pub fn with_stream_buffer(self, stream_buffer: usize) -> Self {
        Self {
            stream_buffer,
            ..self
        }
    }

    /// An empty path counts as unset.
    pub fn macaroon_path(&self) -> Option<&Path> {
        non_empty(self.macaroon_path.as_deref())
    }

    pub fn tls_cert_path(&self) -> Option<&Path> {
        non_empty(self.tls_cert_path.as_deref())
    }

    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        self.stream_idle_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

fn non_empty(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty())
}

impl fmt::Display for LndSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let display_path = |path: Option<&Path>| {
            path.map_or_else(|| "-".to_owned(), |p| p.display().to_string())
        };
        write!(
            f,
            "rest_url: {}, macaroon_path: {}, tls_cert_path: {}, invoice_expiry: {}s, stream_idle_timeout: {}",
            self.rest_url,
            display_path(self.macaroon_path()),
            display_path(self.tls_cert_path()),
            self.invoice_expiry,
            self.stream_idle_timeout()
                .map_or_else(|| "none".to_owned(), |t| format!("{t:?}")),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::{path::Path, time::Duration};

    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::LndSettings;

    #[test]
    fn test_parse_args() -> anyhow::Result<()> {
        let settings = LndSettings::try_parse_from([
            "lngate",
            "--rest-url",
            "https://127.0.0.1:8081",
            "--macaroon-path",
            "/tmp/admin.macaroon",
            "--invoice-expiry",
            "600",
            "--stream-idle-timeout-ms",
            "1500",
        ])?;

        assert_eq!("https://127.0.0.1:8081/", settings.rest_url.as_str());
        assert_eq!(
            Some(Path::new("/tmp/admin.macaroon")),
            settings.macaroon_path()
        );
        assert_eq!(600, settings.invoice_expiry);
        assert_eq!(
            Some(Duration::from_millis(1500)),
            settings.stream_idle_timeout()
        );
        Ok(())
    }

    #[test]
    fn test_empty_paths_are_unset() -> anyhow::Result<()> {
        let settings = LndSettings::new("https://localhost:8080".parse()?)
            .with_macaroon_path("")
            .with_tls_cert_path("");
        assert_eq!(None, settings.macaroon_path());
        assert_eq!(None, settings.tls_cert_path());
        Ok(())
    }

    #[test]
    fn test_zero_idle_timeout_disables_timeout() -> anyhow::Result<()> {
        let settings = LndSettings::new("https://localhost:8080".parse()?)
            .with_stream_idle_timeout(Duration::ZERO);
        assert_eq!(None, settings.stream_idle_timeout());
        Ok(())
    }

    #[test]
    fn test_deserialize_defaults() -> anyhow::Result<()> {
        let settings: LndSettings =
            serde_json::from_str(r#"{"rest_url": "https://localhost:8080"}"#)?;
        assert_eq!(3600, settings.invoice_expiry);
        assert_eq!(64, settings.stream_buffer);
        assert_eq!(None, settings.macaroon_path());
        Ok(())
    }

    #[test]
    fn test_display() -> anyhow::Result<()> {
        let settings = LndSettings::new("https://localhost:8080".parse()?)
            .with_macaroon_path("/tmp/admin.macaroon");
        assert_eq!(
            "rest_url: https://localhost:8080/, macaroon_path: /tmp/admin.macaroon, tls_cert_path: -, invoice_expiry: 3600s, stream_idle_timeout: none",
            settings.to_string()
        );
        Ok(())
    }
}
