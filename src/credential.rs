use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::constants::CREDENTIAL_KEY;
use crate::error::ChatError;
use crate::provider::ProviderClient;

/// A bearer token the provider has accepted.
///
/// Only the gate and a resumed session can create one, so holding a
/// `Credential` means the key went through validation at some point.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, key: &str) -> bool {
        self.0 == key.trim()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        write!(f, "Credential(…{})", tail)
    }
}

/// Checks candidate keys against the provider's model-listing endpoint.
#[derive(Debug, Clone)]
pub struct CredentialGate {
    provider: ProviderClient,
}

impl CredentialGate {
    pub fn new(provider: ProviderClient) -> Self {
        Self { provider }
    }

    /// `true` if the provider accepts `key`. Never fails; a network error is
    /// just an invalid key.
    pub async fn validate(&self, key: &str) -> bool {
        self.authorize(key).await.is_ok()
    }

    #[instrument(skip_all)]
    pub async fn authorize(&self, key: &str) -> Result<Credential, ChatError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ChatError::CredentialInvalid);
        }
        match self.provider.list_models(key).await {
            Ok(()) => {
                info!("API key accepted by provider");
                Ok(Credential::new(key))
            }
            Err(e) => {
                warn!(error = %e, "API key validation failed");
                Err(ChatError::CredentialInvalid)
            }
        }
    }
}

/// File-backed home for the single stored API key.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let entries: HashMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(entries
            .get(CREDENTIAL_KEY)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty()))
    }

    pub fn save(&self, key: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let entries = HashMap::from([(CREDENTIAL_KEY.to_string(), key.to_string())]);
        let body = serde_json::to_string_pretty(&entries)?;
        fs::write(&self.path, body)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}
