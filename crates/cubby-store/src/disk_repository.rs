use async_trait::async_trait;
use cubby_core::{error::StoreError, repository::KvRepository};
use serde::{de::DeserializeOwned, Serialize};

use crate::datafile_store::DatafileStore;

/// Key-value repository backed by a [`DatafileStore`], one file per key.
///
/// Each method is a complete fetch-mutate-save cycle; the key's lock is
/// released by datafile drop on every path, including errors.
pub struct DiskKvRepository<T> {
    store: DatafileStore<T>,
}

impl<T> DiskKvRepository<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Repository over a store rooted at the `CUBBY_ROOT` environment
    /// variable (falling back to `./cubby`).
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            store: DatafileStore::new(namespace),
        }
    }

    /// Repository over an explicitly configured store, encrypted or not.
    pub fn with_store(store: DatafileStore<T>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<T> KvRepository<T> for DiskKvRepository<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn set(&self, key: &str, value: Option<T>, ttl_seconds: i64) -> Result<(), StoreError> {
        let mut datafile = self.store.fetch(key).await?;
        datafile.record.value = value;
        datafile.record.ttl_seconds = ttl_seconds;
        self.store.save(&mut datafile).await
    }

    async fn update<F>(&self, key: &str, ttl_seconds: i64, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Option<T>) -> Result<(), StoreError> + Send + 'static,
    {
        let mut datafile = self.store.fetch(key).await?;
        apply(&mut datafile.record.value)?;
        datafile.record.ttl_seconds = ttl_seconds;
        self.store.save(&mut datafile).await
    }

    async fn touch(&self, key: &str, ttl_seconds: i64) -> Result<(), StoreError> {
        let mut datafile = self.store.fetch(key).await?;
        datafile.record.ttl_seconds = ttl_seconds;
        self.store.save(&mut datafile).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.store.delete(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<T>, StoreError> {
        let mut datafile = self.store.fetch(key).await?;
        Ok(datafile.record.value.take())
    }

    async fn get_all(&self) -> Result<Vec<Option<T>>, StoreError> {
        let datafiles = self.store.fetch_all().await?;
        Ok(datafiles
            .into_iter()
            .map(|mut datafile| datafile.record.value.take())
            .collect())
    }

    async fn get_all_keys(&self) -> Result<Vec<String>, StoreError> {
        let datafiles = self.store.fetch_all().await?;
        Ok(datafiles
            .into_iter()
            .map(|datafile| datafile.record.key.clone())
            .collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.store.exists(key).await
    }

    async fn last_modified_seconds(&self, key: &str) -> Result<i64, StoreError> {
        let datafile = self.store.fetch(key).await?;
        Ok(datafile.record.modified_at_seconds)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde::Deserialize;

    use super::*;
    use crate::encryption::AesCfbEncryption;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    struct Session {
        user: String,
        visits: u32,
    }

    fn repo(root: &Path) -> DiskKvRepository<Session> {
        DiskKvRepository::with_store(DatafileStore::with_root(root, "sessions"))
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo(dir.path());

        let session = Session {
            user: "ada".into(),
            visits: 1,
        };
        repo.set("s1", Some(session.clone()), 0).await.expect("set");

        assert_eq!(repo.get("s1").await.expect("get"), Some(session));
    }

    #[tokio::test]
    async fn get_of_an_unset_key_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo(dir.path());

        assert_eq!(repo.get("never-set").await.expect("get"), None);
    }

    #[tokio::test]
    async fn update_mutates_under_the_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo(dir.path());

        repo.set(
            "s1",
            Some(Session {
                user: "ada".into(),
                visits: 1,
            }),
            0,
        )
        .await
        .expect("set");

        repo.update("s1", 0, |value| {
            let session = value.as_mut().expect("value present");
            session.visits += 1;
            Ok(())
        })
        .await
        .expect("update");

        let session = repo.get("s1").await.expect("get").expect("value");
        assert_eq!(session.visits, 2);
    }

    #[tokio::test]
    async fn update_error_aborts_the_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo(dir.path());

        repo.set(
            "s1",
            Some(Session {
                user: "ada".into(),
                visits: 1,
            }),
            0,
        )
        .await
        .expect("set");

        let err = repo
            .update("s1", 0, |value| {
                *value = None;
                Err(StoreError::Serialize {
                    reason: "caller declined".into(),
                })
            })
            .await
            .expect_err("closure error must propagate");
        assert!(matches!(err, StoreError::Serialize { .. }));

        // The aborted mutation was never persisted.
        let session = repo.get("s1").await.expect("get").expect("value");
        assert_eq!(session.visits, 1);
    }

    #[tokio::test]
    async fn touch_refreshes_ttl_and_stamp_without_the_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo(dir.path());

        repo.set(
            "s1",
            Some(Session {
                user: "ada".into(),
                visits: 1,
            }),
            5,
        )
        .await
        .expect("set");
        let stamped = repo.last_modified_seconds("s1").await.expect("stamp");
        assert!(stamped > 0);

        repo.touch("s1", 60).await.expect("touch");
        assert!(repo.get("s1").await.expect("get").is_some());
        assert!(repo.last_modified_seconds("s1").await.expect("stamp") >= stamped);
    }

    #[tokio::test]
    async fn get_all_and_get_all_keys_cover_the_namespace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo(dir.path());

        for (key, user) in [("s1", "ada"), ("s2", "brian"), ("s3", "grace")] {
            repo.set(
                key,
                Some(Session {
                    user: user.into(),
                    visits: 0,
                }),
                0,
            )
            .await
            .expect("set");
        }

        let mut keys = repo.get_all_keys().await.expect("keys");
        keys.sort();
        assert_eq!(keys, vec!["s1", "s2", "s3"]);

        let mut users: Vec<String> = repo
            .get_all()
            .await
            .expect("values")
            .into_iter()
            .map(|value| value.expect("value").user)
            .collect();
        users.sort();
        assert_eq!(users, vec!["ada", "brian", "grace"]);
    }

    #[tokio::test]
    async fn delete_then_exists_is_false() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = repo(dir.path());

        repo.set(
            "s1",
            Some(Session {
                user: "ada".into(),
                visits: 1,
            }),
            0,
        )
        .await
        .expect("set");
        assert!(repo.exists("s1").await.expect("exists"));

        repo.delete("s1").await.expect("delete");
        assert!(!repo.exists("s1").await.expect("exists after delete"));
    }

    #[tokio::test]
    async fn works_identically_over_an_encrypted_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DatafileStore::with_root(dir.path(), "sessions")
            .with_encryption(AesCfbEncryption::new("password"));
        let repo = DiskKvRepository::with_store(store);

        let session = Session {
            user: "ada".into(),
            visits: 3,
        };
        repo.set("s1", Some(session.clone()), 0).await.expect("set");
        assert_eq!(repo.get("s1").await.expect("get"), Some(session));
    }
}
