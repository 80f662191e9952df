//! The session manager.

use crate::CredentialStore;
use magpie_error::{FailureKind, MagpieResult, SessionError, SessionErrorKind};
use magpie_interface::{Credential, CredentialSource, RemoteIdentity, RemoteService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Obtains and maintains an authenticated session.
///
/// `login(false)` prefers the persisted credential and only falls back to
/// the out-of-band source when verification fails; `login(true)` skips the
/// persisted credential entirely. Acquisition retries with exponential
/// spacing up to the configured limit.
pub struct SessionManager {
    remote: Arc<dyn RemoteService>,
    source: Arc<dyn CredentialSource>,
    store: CredentialStore,
    max_retries: u32,
    base_interval: f64,
}

impl SessionManager {
    /// Wire a manager from its collaborators.
    pub fn new(
        remote: Arc<dyn RemoteService>,
        source: Arc<dyn CredentialSource>,
        store: CredentialStore,
        max_retries: u32,
        base_interval: f64,
    ) -> Self {
        Self {
            remote,
            source,
            store,
            max_retries,
            base_interval,
        }
    }

    /// Produce a verified credential.
    ///
    /// # Errors
    ///
    /// `LoginFailed` when every acquisition attempt is exhausted; transport
    /// errors (notably `NetworkUnavailable`) propagate unchanged.
    #[instrument(skip(self))]
    pub async fn login(&self, force: bool) -> MagpieResult<Credential> {
        if !force {
            if let Some(credential) = self.store.load().await {
                match self.probe(&credential).await? {
                    Some(identity) => {
                        info!(uid = %identity.uid, name = %identity.name, "Session restored");
                        return Ok(credential);
                    }
                    None => {
                        warn!("Stored credential rejected, discarding");
                        self.store.discard().await?;
                    }
                }
            }
        }

        let mut delay = Duration::from_secs_f64(self.base_interval.max(0.001));
        let attempts = self.max_retries.max(1);
        for attempt in 1..=attempts {
            match self.source.acquire().await {
                Ok(credential) if !credential.is_empty() => {
                    match self.probe(&credential).await? {
                        Some(identity) => {
                            self.store.save(&credential).await?;
                            info!(uid = %identity.uid, name = %identity.name, "Signed in");
                            return Ok(credential);
                        }
                        None => {
                            warn!(attempt, "Fresh credential failed verification");
                        }
                    }
                }
                Ok(_) => warn!(attempt, "Credential source yielded an empty token set"),
                Err(e) => warn!(attempt, error = %e, "Credential acquisition failed"),
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
        Err(SessionError::new(SessionErrorKind::LoginFailed(format!(
            "no verifiable credential after {} attempts",
            attempts
        )))
        .into())
    }

    /// Whether a credential passes the verification probe.
    pub async fn verify(&self, credential: &Credential) -> MagpieResult<bool> {
        Ok(self.probe(credential).await?.is_some())
    }

    /// Persist a credential.
    pub async fn save(&self, credential: &Credential) -> MagpieResult<()> {
        self.store.save(credential).await
    }

    /// Load the persisted credential without verifying it.
    pub async fn load(&self) -> Option<Credential> {
        self.store.load().await
    }

    /// Run the verification probe, folding a session rejection into `None`.
    async fn probe(&self, credential: &Credential) -> MagpieResult<Option<RemoteIdentity>> {
        match self.remote.verify_session(credential).await {
            Ok(identity) => Ok(identity),
            Err(e) if e.failure_kind() == FailureKind::AuthExpired => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("max_retries", &self.max_retries)
            .field("base_interval", &self.base_interval)
            .finish_non_exhaustive()
    }
}
