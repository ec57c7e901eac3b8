//! Persistent secret storage
//!
//! Secrets are keyed by (service, account) in a JSON file. The file is
//! re-read on every lookup so writes made by other processes are visible
//! to subsequent reads.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// The credential store contract: synchronous get/set, writes immediately
/// visible to subsequent reads.
pub trait SecretStore {
    /// Look up the secret stored for (service, account), if any.
    fn get(&self, service: &str, account: &str) -> Result<Option<String>>;

    /// Store a secret under (service, account), replacing any previous one.
    fn set(&mut self, service: &str, account: &str, secret: &str) -> Result<()>;
}

/// On-disk shape: service -> account -> secret
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SecretsFile {
    #[serde(flatten)]
    services: HashMap<String, HashMap<String, String>>,
}

/// File-backed secret store (~/.hush/secrets.json by default)
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    /// Store at the default location
    pub fn new() -> Self {
        Self {
            path: paths::secrets_path(),
        }
    }

    /// Store at a specific path
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<SecretsFile> {
        load_from_path(&self.path)
    }

    fn save(&self, file: &SecretsFile) -> Result<()> {
        save_to_path(&self.path, file)
    }
}

impl Default for FileSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, service: &str, account: &str) -> Result<Option<String>> {
        let file = self.load()?;
        Ok(file
            .services
            .get(service)
            .and_then(|accounts| accounts.get(account))
            .cloned())
    }

    fn set(&mut self, service: &str, account: &str, secret: &str) -> Result<()> {
        let mut file = self.load()?;
        file.services
            .entry(service.to_string())
            .or_default()
            .insert(account.to_string(), secret.to_string());
        self.save(&file)
    }
}

fn load_from_path(path: &Path) -> Result<SecretsFile> {
    if !path.exists() {
        return Ok(SecretsFile::default());
    }
    let contents = fs::read_to_string(path)?;
    let file: SecretsFile = serde_json::from_str(&contents)?;
    Ok(file)
}

fn save_to_path(path: &Path, file: &SecretsFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(file)?;
    fs::write(path, contents)?;

    // Set restrictive permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(path) {
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o600);
            let _ = fs::set_permissions(path, permissions);
        }
    }
    Ok(())
}
