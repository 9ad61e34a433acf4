//! Loading sender configuration from disk.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::model::SenderConfig;
use crate::error::{Error, Result};

/// Environment variable that overrides the configured SMTP credential.
pub const CREDENTIAL_ENV: &str = "MIMEPOST_SMTP_CREDENTIAL";

/// Returns `<config_dir>/mimepost/sender.json`.
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mimepost")
        .join("sender.json")
}

/// Loads a sender configuration from a JSON file.
///
/// A non-empty [`CREDENTIAL_ENV`] replaces the credential from the file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: impl AsRef<Path>) -> Result<SenderConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;

    let mut config: SenderConfig = serde_json::from_str(&contents)?;
    apply_credential_override(&mut config, std::env::var(CREDENTIAL_ENV).ok());

    info!("Loaded sender configuration from {:?}", path);
    Ok(config)
}

/// Loads the configuration from [`default_config_path`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_default_config() -> Result<SenderConfig> {
    load_config(default_config_path())
}

fn apply_credential_override(config: &mut SenderConfig, credential: Option<String>) {
    if let Some(credential) = credential.filter(|c| !c.is_empty()) {
        debug!("Using SMTP credential from {CREDENTIAL_ENV}");
        config.credential = credential;
    }
}
