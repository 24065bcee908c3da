//! Connection settings persisted by `backstagectl login`.
//!
//! Stored as JSON at `~/.config/backstagectl/config.json` unless `--config`
//! points elsewhere.

use crate::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default config file location.
pub fn default_config_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".config").join("backstagectl").join("config.json"))
        .ok_or_else(|| CatalogError::Config("could not determine home directory".to_string()))
}

/// How requests prove who they are. The two modes are mutually exclusive.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    /// Mutual TLS; no `Authorization` header is sent.
    ClientCertificate { cert: PathBuf, key: PathBuf },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            Credentials::ClientCertificate { cert, key } => f
                .debug_struct("ClientCertificate")
                .field("cert", cert)
                .field("key", key)
                .finish(),
        }
    }
}

/// Persisted connection settings.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "baseUrl", default)]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_cert_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_key_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("base_url", &self.base_url)
            .field("token", &if self.token.is_empty() { "" } else { "[REDACTED]" })
            .field("tls_cert_path", &self.tls_cert_path)
            .field("tls_key_path", &self.tls_key_path)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AuthConfig {
    /// Read and validate the config at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CatalogError::Config(format!(
                "no configuration found at {} (run `backstagectl login` first)",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        let config: AuthConfig = serde_json::from_str(&content).map_err(|e| {
            CatalogError::Config(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate, then write to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CatalogError::Config(format!("cannot serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(CatalogError::Config(
                "no baseUrl for the backstage instance provided".to_string(),
            ));
        }
        if self.token.is_empty() && self.client_certificate().is_none() {
            return Err(CatalogError::Config(
                "either a token or both a TLS certificate and key must be provided".to_string(),
            ));
        }
        Ok(())
    }

    fn client_certificate(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key))
                if !cert.as_os_str().is_empty() && !key.as_os_str().is_empty() =>
            {
                Some((cert.as_path(), key.as_path()))
            }
            _ => None,
        }
    }

    /// Certificate auth wins when both modes are configured.
    pub fn credentials(&self) -> Result<Credentials> {
        if let Some((cert, key)) = self.client_certificate() {
            return Ok(Credentials::ClientCertificate {
                cert: cert.to_path_buf(),
                key: key.to_path_buf(),
            });
        }
        if !self.token.is_empty() {
            return Ok(Credentials::Bearer(self.token.clone()));
        }
        Err(CatalogError::Config(
            "either a token or both a TLS certificate and key must be provided".to_string(),
        ))
    }

    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}
