//! Credential persistence.

use magpie_error::{MagpieResult, SessionError, SessionErrorKind};
use magpie_interface::Credential;
use std::path::PathBuf;
use tracing::{debug, instrument, warn};

/// Atomic storage of the credential document at a configured path.
///
/// The document is opaque JSON holding the service's session fields. Writes
/// go through a temp file and rename; on Unix the file is restricted to
/// user-only permissions before the rename.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a store for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the persisted credential, if any.
    ///
    /// A missing file yields `None`. An unreadable or corrupt file is
    /// logged and also yields `None` - the caller falls back to fresh
    /// acquisition rather than aborting.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Option<Credential> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read credential file");
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(credential) => {
                debug!("Loaded persisted credential");
                Some(credential)
            }
            Err(e) => {
                warn!(error = %e, "Credential file is corrupt, ignoring");
                None
            }
        }
    }

    /// Persist a credential atomically.
    #[instrument(skip(self, credential), fields(path = %self.path.display()))]
    pub async fn save(&self, credential: &Credential) -> MagpieResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SessionError::new(SessionErrorKind::CredentialIo(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let body = serde_json::to_vec_pretty(credential).map_err(|e| {
            SessionError::new(SessionErrorKind::CredentialIo(format!("serialize: {}", e)))
        })?;

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &body).await.map_err(|e| {
            SessionError::new(SessionErrorKind::CredentialIo(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&temp_path, perms)
                .await
                .map_err(|e| {
                    SessionError::new(SessionErrorKind::CredentialIo(format!(
                        "chmod {}: {}",
                        temp_path.display(),
                        e
                    )))
                })?;
        }

        tokio::fs::rename(&temp_path, &self.path).await.map_err(|e| {
            SessionError::new(SessionErrorKind::CredentialIo(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            )))
        })?;
        debug!("Persisted credential");
        Ok(())
    }

    /// Remove the persisted credential, if present.
    pub async fn discard(&self) -> MagpieResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::new(SessionErrorKind::CredentialIo(format!(
                "remove {}: {}",
                self.path.display(),
                e
            )))
            .into()),
        }
    }
}
