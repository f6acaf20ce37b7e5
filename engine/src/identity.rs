//! Replica identity: mint once, remember forever.
//!
//! A device's replica id breaks last-writer ties, so it must be stable for the
//! lifetime of the install and never shared with another device. The lifecycle
//! is explicit: read the id if present, otherwise mint a fresh one from a
//! [`IdentityMinter`], persist it through an [`IdentityStore`], and only then
//! hand it out. If minting or persisting fails the caller gets
//! [`Error::IdentityUnavailable`]; no local fallback id is ever invented.

use crate::{error::Result, Error, ReplicaId, ValidationError};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key the identity is stored under unless configured otherwise.
pub const DEFAULT_IDENTITY_KEY: &str = "replicaId";

/// Maximum length of a replica id, in bytes.
pub const MAX_REPLICA_ID_LEN: usize = 128;

/// Check that a replica id has a usable shape.
///
/// Ids are opaque, but must be non-empty, at most [`MAX_REPLICA_ID_LEN`]
/// bytes, free of control characters, and without surrounding whitespace.
pub fn validate_replica_id(id: &str) -> std::result::Result<(), ValidationError> {
    let reason = if id.is_empty() {
        Some("must not be empty")
    } else if id.len() > MAX_REPLICA_ID_LEN {
        Some("too long")
    } else if id.chars().any(char::is_control) {
        Some("contains control characters")
    } else if id.trim() != id {
        Some("has surrounding whitespace")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ValidationError::InvalidReplica(reason.to_string())),
        None => Ok(()),
    }
}

/// Scoped key-value persistence for the device identity.
pub trait IdentityStore {
    fn load(&self, key: &str) -> io::Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> io::Result<()>;
}

/// Source of fresh replica ids.
pub trait IdentityMinter {
    fn mint(&self) -> std::result::Result<ReplicaId, String>;
}

/// Mints random UUID v4 ids locally.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidMinter;

impl IdentityMinter for UuidMinter {
    fn mint(&self) -> std::result::Result<ReplicaId, String> {
        Ok(uuid::Uuid::new_v4().to_string())
    }
}

/// Adapts a closure into a minter, e.g. one that asks a server for an id.
pub struct FnMinter<F>(F);

impl<F> FnMinter<F>
where
    F: Fn() -> std::result::Result<ReplicaId, String>,
{
    pub fn new(mint: F) -> Self {
        Self(mint)
    }
}

impl<F> IdentityMinter for FnMinter<F>
where
    F: Fn() -> std::result::Result<ReplicaId, String>,
{
    fn mint(&self) -> std::result::Result<ReplicaId, String> {
        (self.0)()
    }
}

/// In-memory store, mostly for tests and ephemeral replicas.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self, key: &str) -> io::Result<Option<String>> {
        let values = self.values.lock().map_err(|_| poisoned())?;
        Ok(values.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> io::Result<()> {
        let mut values = self.values.lock().map_err(|_| poisoned())?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON file holding a flat `{key: value}` object.
///
/// Writes go to a sibling temp file that is renamed into place, so a crash
/// never leaves a half-written identity behind.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> io::Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn save(&self, key: &str, value: &str) -> io::Result<()> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        let json = serde_json::to_string_pretty(&values)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)
    }
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "identity store lock poisoned")
}

/// The device identity, minted at most once.
pub struct ReplicaIdentity<S, M> {
    store: S,
    minter: M,
    key: String,
    // Serializes ensure() so concurrent callers never mint twice.
    cached: Mutex<Option<ReplicaId>>,
}

impl<S: IdentityStore, M: IdentityMinter> ReplicaIdentity<S, M> {
    /// Create an identity stored under [`DEFAULT_IDENTITY_KEY`].
    pub fn new(store: S, minter: M) -> Self {
        Self::with_key(store, minter, DEFAULT_IDENTITY_KEY)
    }

    /// Create an identity stored under a custom key.
    pub fn with_key(store: S, minter: M, key: impl Into<String>) -> Self {
        Self {
            store,
            minter,
            key: key.into(),
            cached: Mutex::new(None),
        }
    }

    /// Return the persisted id, minting and persisting one first if absent.
    pub fn ensure(&self) -> Result<ReplicaId> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| Error::IdentityUnavailable("identity lock poisoned".into()))?;

        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let stored = self
            .store
            .load(&self.key)
            .map_err(|e| Error::IdentityUnavailable(format!("failed to read identity: {e}")))?;

        if let Some(id) = stored {
            validate_replica_id(&id).map_err(|e| {
                Error::IdentityUnavailable(format!("stored identity is unusable: {e}"))
            })?;
            *cached = Some(id.clone());
            return Ok(id);
        }

        let id = self
            .minter
            .mint()
            .map_err(|e| Error::IdentityUnavailable(format!("minting failed: {e}")))?;
        validate_replica_id(&id)
            .map_err(|e| Error::IdentityUnavailable(format!("minted identity rejected: {e}")))?;

        self.store
            .save(&self.key, &id)
            .map_err(|e| Error::IdentityUnavailable(format!("failed to persist identity: {e}")))?;

        tracing::info!(replica = %id, "minted replica identity");
        *cached = Some(id.clone());
        Ok(id)
    }

    /// The persisted id, if one exists, without minting.
    pub fn current(&self) -> Result<Option<ReplicaId>> {
        if let Ok(cached) = self.cached.lock() {
            if let Some(id) = cached.as_ref() {
                return Ok(Some(id.clone()));
            }
        }
        self.store
            .load(&self.key)
            .map_err(|e| Error::IdentityUnavailable(format!("failed to read identity: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingMinter(Arc<AtomicUsize>);

    impl IdentityMinter for CountingMinter {
        fn mint(&self) -> std::result::Result<ReplicaId, String> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("replica-{n}"))
        }
    }

    #[test]
    fn validate_shapes() {
        assert!(validate_replica_id("3f2b8c1e-1111-4a4a-9999-000000000000").is_ok());
        assert!(validate_replica_id("").is_err());
        assert!(validate_replica_id(" padded").is_err());
        assert!(validate_replica_id("tab\there").is_err());
        assert!(validate_replica_id(&"x".repeat(MAX_REPLICA_ID_LEN + 1)).is_err());
        assert!(validate_replica_id(&"x".repeat(MAX_REPLICA_ID_LEN)).is_ok());
    }

    #[test]
    fn ensure_mints_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let identity =
            ReplicaIdentity::new(MemoryIdentityStore::new(), CountingMinter(count.clone()));

        let first = identity.ensure().unwrap();
        let second = identity.ensure().unwrap();
        assert_eq!(first, second);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ensure_reads_existing_identity() {
        let store = MemoryIdentityStore::new();
        store.save(DEFAULT_IDENTITY_KEY, "existing").unwrap();

        let identity = ReplicaIdentity::new(
            store,
            FnMinter::new(|| panic!("must not mint when an id is stored")),
        );
        assert_eq!(identity.ensure().unwrap(), "existing");
    }

    #[test]
    fn minting_failure_is_unavailable() {
        let identity = ReplicaIdentity::new(
            MemoryIdentityStore::new(),
            FnMinter::new(|| Err("server unreachable".to_string())),
        );

        let err = identity.ensure().unwrap_err();
        assert!(matches!(err, Error::IdentityUnavailable(_)));
        // Nothing was persisted in its place
        assert_eq!(identity.current().unwrap(), None);
    }

    #[test]
    fn malformed_minted_id_is_rejected() {
        let identity = ReplicaIdentity::new(
            MemoryIdentityStore::new(),
            FnMinter::new(|| Ok(String::new())),
        );
        assert!(matches!(
            identity.ensure(),
            Err(Error::IdentityUnavailable(_))
        ));
    }

    #[test]
    fn file_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");

        let first = ReplicaIdentity::new(FileIdentityStore::new(&path), UuidMinter)
            .ensure()
            .unwrap();
        let second = ReplicaIdentity::new(
            FileIdentityStore::new(&path),
            FnMinter::new(|| Err("must not mint again".to_string())),
        )
        .ensure()
        .unwrap();

        assert_eq!(first, second);
        assert!(uuid::Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn file_store_keys_are_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path().join("kv.json"));
        store.save("work", "a").unwrap();
        store.save("home", "b").unwrap();
        assert_eq!(store.load("work").unwrap().as_deref(), Some("a"));
        assert_eq!(store.load("home").unwrap().as_deref(), Some("b"));
        assert_eq!(store.load("other").unwrap(), None);
    }

    #[test]
    fn concurrent_ensure_mints_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let identity = Arc::new(ReplicaIdentity::new(
            MemoryIdentityStore::new(),
            CountingMinter(count.clone()),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let identity = identity.clone();
                std::thread::spawn(move || identity.ensure().unwrap())
            })
            .collect();
        let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
