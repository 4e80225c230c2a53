// Durable credential storage

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::types::Credentials;

/// Persistent home of the current credential.
///
/// The coordinator is the only writer; it keeps an in-memory copy and writes through.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credentials>>;

    fn save(&self, credentials: &Credentials) -> Result<()>;

    /// Remove stored credentials. Clearing an empty store is not an error.
    fn clear(&self) -> Result<()>;
}

/// JSON file store that survives process restarts
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/coop-client/credentials.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("coop-client").join("credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credentials file: {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let creds: Credentials = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse credentials file: {}", self.path.display()))?;
        Ok(Some(creds))
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        // Write to a sibling temp file and rename so a crash never leaves a torn file
        let tmp = self.path.with_extension("json.tmp");
        let payload = serde_json::to_vec_pretty(credentials).context("Failed to encode credentials")?;
        {
            let mut file = std::fs::File::create(&tmp)
                .with_context(|| format!("Failed to create {}", tmp.display()))?;
            file.write_all(&payload)
                .with_context(|| format!("Failed to write {}", tmp.display()))?;
            file.sync_all().ok();
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict permissions on {}", tmp.display()))?;
        }

        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        tracing::debug!("Credentials saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Credentials removed from {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove credentials file: {}", self.path.display())),
        }
    }
}

/// In-process store for tests and sessions that should not touch disk
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            slot: Mutex::new(Some(credentials)),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<Credentials>>> {
        self.slot
            .lock()
            .map_err(|_| anyhow::anyhow!("Credential store lock poisoned"))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credentials>> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        *self.slot()? = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}
