//! Tests for the session manager.

use async_trait::async_trait;
use magpie_core::{ItemId, MetadataRecord};
use magpie_error::{MagpieResult, TransportError, TransportErrorKind};
use magpie_interface::{
    ByteStream, Credential, CredentialSource, RemoteIdentity, RemoteService, SearchPage,
    StreamSources,
};
use magpie_session::{CredentialStore, SessionManager, StaticCredentialSource};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

/// Remote that accepts exactly one SESSDATA value.
struct FakeRemote {
    accepted: String,
    probes: AtomicU32,
}

impl FakeRemote {
    fn new(accepted: &str) -> Arc<Self> {
        Arc::new(Self {
            accepted: accepted.to_string(),
            probes: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl RemoteService for FakeRemote {
    async fn verify_session(
        &self,
        credential: &Credential,
    ) -> MagpieResult<Option<RemoteIdentity>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if credential.cookies.get("SESSDATA").map(String::as_str) == Some(self.accepted.as_str()) {
            Ok(Some(RemoteIdentity {
                uid: "7".to_string(),
                name: "tester".to_string(),
            }))
        } else {
            Ok(None)
        }
    }

    async fn search_page(&self, _: &str, _: u32, _: u32) -> MagpieResult<SearchPage> {
        Err(TransportError::new(TransportErrorKind::NotFound).into())
    }

    async fn video_detail(&self, _: &ItemId) -> MagpieResult<MetadataRecord> {
        Err(TransportError::new(TransportErrorKind::NotFound).into())
    }

    async fn stream_sources(&self, _: &ItemId, _: u32) -> MagpieResult<StreamSources> {
        Err(TransportError::new(TransportErrorKind::NotFound).into())
    }

    async fn fetch_range(&self, _: &str, _: u64) -> MagpieResult<ByteStream> {
        Err(TransportError::new(TransportErrorKind::NotFound).into())
    }
}

fn credential(sessdata: &str) -> Credential {
    let mut cookies = BTreeMap::new();
    cookies.insert("SESSDATA".to_string(), sessdata.to_string());
    Credential::from_cookies(cookies)
}

fn manager(
    remote: Arc<FakeRemote>,
    source: Credential,
    store: CredentialStore,
    max_retries: u32,
) -> SessionManager {
    SessionManager::new(
        remote,
        Arc::new(StaticCredentialSource::new(source)),
        store,
        max_retries,
        0.001,
    )
}

#[tokio::test]
async fn test_login_acquires_and_persists() {
    let dir = TempDir::new().unwrap();
    let store = CredentialStore::new(dir.path().join("credential.json"));
    let remote = FakeRemote::new("good");
    let session = manager(remote.clone(), credential("good"), store.clone(), 3);

    let cred = session.login(false).await.unwrap();
    assert_eq!(cred.cookies.get("SESSDATA").unwrap(), "good");

    // The credential must now be on disk and reusable without acquisition.
    let restored = store.load().await.unwrap();
    assert_eq!(restored.cookies, cred.cookies);
}

#[tokio::test]
async fn test_login_prefers_persisted_credential() {
    let dir = TempDir::new().unwrap();
    let store = CredentialStore::new(dir.path().join("credential.json"));
    store.save(&credential("good")).await.unwrap();

    let remote = FakeRemote::new("good");
    // The source would yield a different cookie; it must not be consulted.
    let session = manager(remote.clone(), credential("other"), store, 3);

    let cred = session.login(false).await.unwrap();
    assert_eq!(cred.cookies.get("SESSDATA").unwrap(), "good");
    assert_eq!(remote.probes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_force_login_skips_persisted_credential() {
    let dir = TempDir::new().unwrap();
    let store = CredentialStore::new(dir.path().join("credential.json"));
    store.save(&credential("stale")).await.unwrap();

    let remote = FakeRemote::new("fresh");
    let session = manager(remote, credential("fresh"), store, 3);

    let cred = session.login(true).await.unwrap();
    assert_eq!(cred.cookies.get("SESSDATA").unwrap(), "fresh");
}

#[tokio::test]
async fn test_rejected_stored_credential_is_discarded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credential.json");
    let store = CredentialStore::new(path.clone());
    store.save(&credential("stale")).await.unwrap();

    let remote = FakeRemote::new("fresh");
    let session = manager(remote, credential("fresh"), store, 3);

    session.login(false).await.unwrap();
    // The stale document was replaced by the fresh one.
    let stored: Credential =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(stored.cookies.get("SESSDATA").unwrap(), "fresh");
}

#[tokio::test]
async fn test_login_fails_after_exhausting_retries() {
    let dir = TempDir::new().unwrap();
    let store = CredentialStore::new(dir.path().join("credential.json"));
    let remote = FakeRemote::new("good");
    let session = manager(remote.clone(), credential("bad"), store, 2);

    assert!(session.login(false).await.is_err());
    // One probe per acquisition attempt.
    assert_eq!(remote.probes.load(Ordering::SeqCst), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn test_credential_file_is_user_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credential.json");
    let store = CredentialStore::new(path.clone());
    store.save(&credential("good")).await.unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
