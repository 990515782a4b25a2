use std::{
    env, fs,
    io::{self, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use cubby_core::{error::StoreError, record::Record};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, instrument};

use crate::{encryption::EncryptionService, lock_registry::LockRegistry};

/// Environment variable selecting the storage root directory.
pub const ROOT_ENV: &str = "CUBBY_ROOT";
const DEFAULT_ROOT: &str = "./cubby";

/// Content of a freshly created datafile, before any save. Read back as a
/// fully defaulted record and never passed through decryption.
const EMPTY_SENTINEL: &[u8] = b"{}";

const PLAIN_EXT: &str = "json";
const ENCRYPTED_EXT: &str = "enc";

/// A fetched record bound to its file path and the held per-key lock.
///
/// The lock releases when the datafile is dropped, so no caller can leak it;
/// [`unlock`](Self::unlock) exists for call sites that want the release to
/// be visible.
#[derive(Debug)]
pub struct Datafile<T> {
    path: PathBuf,
    pub record: Record<T>,
    _guard: OwnedMutexGuard<()>,
}

impl<T> Datafile<T> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the key's lock. Equivalent to dropping the datafile.
    pub fn unlock(self) {}
}

/// Datastore keeping one file per key under `root/namespace/`.
///
/// `fetch` hands back a [`Datafile`] that holds the key's lock until dropped,
/// which is what makes a read-modify-write cycle on a single key atomic
/// within the process. `delete`, `exists`, and `wipe` bypass the lock by
/// design; coordinating them with in-flight datafiles is the caller's job.
pub struct DatafileStore<T> {
    root: PathBuf,
    namespace: String,
    registry: LockRegistry,
    encryption: Option<Arc<dyn EncryptionService>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DatafileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Store rooted at the `CUBBY_ROOT` environment variable, falling back
    /// to `./cubby` when unset or empty.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self::with_root(resolve_root(), namespace)
    }

    pub fn with_root(root: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            namespace: namespace.into(),
            registry: LockRegistry::new(),
            encryption: None,
            _marker: PhantomData,
        }
    }

    /// Encrypt record bytes at rest. Switches the file extension from
    /// `json` to `enc`, so a store must keep the same setting for the
    /// lifetime of its namespace.
    pub fn with_encryption(mut self, service: impl EncryptionService + 'static) -> Self {
        self.encryption = Some(Arc::new(service));
        self
    }

    fn file_dir(&self) -> Result<PathBuf, StoreError> {
        let dir = self.root.join(&self.namespace);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn extension(&self) -> &'static str {
        if self.encryption.is_some() {
            ENCRYPTED_EXT
        } else {
            PLAIN_EXT
        }
    }

    fn file_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        Ok(self.file_dir()?.join(format!("{key}.{}", self.extension())))
    }

    /// Acquire the key's lock and load its record, creating the file on
    /// first access. A record whose ttl has elapsed is deleted and the load
    /// retried, yielding a fresh default record.
    ///
    /// The returned datafile holds the lock until dropped; a second fetch of
    /// the same key blocks until then.
    #[instrument(skip_all, fields(key))]
    pub async fn fetch(&self, key: &str) -> Result<Datafile<T>, StoreError> {
        loop {
            let path = self.file_path(key)?;
            let guard = self.registry.acquire(key).await;

            if !path.exists() {
                fs::write(&path, EMPTY_SENTINEL)?;
            }

            let mut data = fs::read(&path)?;
            if let Some(service) = &self.encryption {
                if data != EMPTY_SENTINEL {
                    data = service.decrypt(&data)?;
                }
            }

            let mut record: Record<T> =
                serde_json::from_slice(&data).map_err(|err| StoreError::Deserialize {
                    reason: err.to_string(),
                })?;
            record.key = key.to_string();

            if record.is_expired(Utc::now().timestamp()) {
                debug!(key, "ttl elapsed, removing datafile");
                let removed = fs::remove_file(&path);
                drop(guard);
                removed?;
                continue;
            }

            return Ok(Datafile {
                path,
                record,
                _guard: guard,
            });
        }
    }

    /// Load every record in the namespace, one locked datafile per entry.
    ///
    /// The caller owns every returned lock. Enumeration order is whatever
    /// the directory listing yields. If a fetch fails partway, the datafiles
    /// gathered so far are dropped and their locks released.
    #[instrument(skip_all)]
    pub async fn fetch_all(&self) -> Result<Vec<Datafile<T>>, StoreError> {
        let dir = self.file_dir()?;

        let mut datafiles = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }

            let name = entry.file_name();
            let name = name.to_string_lossy();
            let key = match name.rsplit_once('.') {
                Some((stem, _)) => stem.to_owned(),
                None => name.into_owned(),
            };

            datafiles.push(self.fetch(&key).await?);
        }

        Ok(datafiles)
    }

    /// Persist the datafile's record, stamping `modified_at_seconds` with
    /// the current time. May be called repeatedly while the datafile lives;
    /// each call writes a fresh stamp. Does not touch the lock.
    #[instrument(skip_all, fields(key))]
    pub async fn save(&self, datafile: &mut Datafile<T>) -> Result<(), StoreError> {
        datafile.record.modified_at_seconds = Utc::now().timestamp();

        let mut data =
            serde_json::to_vec(&datafile.record).map_err(|err| StoreError::Serialize {
                reason: err.to_string(),
            })?;
        if let Some(service) = &self.encryption {
            data = service.encrypt(&data)?;
        }

        // Written next to the target so the persist is a same-directory
        // rename. The namespace directory is not re-created here: saving
        // through a datafile that survived a wipe is an io error.
        let parent = datafile.path.parent().ok_or_else(|| {
            StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "datafile path has no parent directory",
            ))
        })?;
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&data)?;
        tmp.flush()?;
        tmp.persist(&datafile.path)
            .map_err(|err| StoreError::Io(err.error))?;
        Ok(())
    }

    /// Remove the key's file and forget its lock entry. Does not acquire the
    /// lock; the caller must ensure no conflicting datafile is in flight.
    /// Deleting an absent key is an io error.
    #[instrument(skip_all, fields(key))]
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.file_path(key)?;
        fs::remove_file(&path)?;
        self.registry.forget(key).await;
        Ok(())
    }

    /// Whether a file exists for `key`. Stat only: no lock, no file
    /// creation, no expiry check.
    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.file_path(key)?;
        match fs::metadata(&path) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Recursively delete the namespace directory; absent is success.
    ///
    /// Locks held by in-flight datafiles are untouched, and their later
    /// saves will fail with an io error since the directory is gone. Quiesce
    /// outstanding datafiles before wiping.
    #[instrument(skip_all)]
    pub async fn wipe(&self) -> Result<(), StoreError> {
        let dir = self.root.join(&self.namespace);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn resolve_root() -> PathBuf {
    match env::var(ROOT_ENV) {
        Ok(root) if !root.is_empty() => PathBuf::from(root),
        _ => PathBuf::from(DEFAULT_ROOT),
    }
}
