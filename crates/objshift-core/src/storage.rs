//! Object store capability trait and in-memory implementation.
//!
//! The migration engine only needs a narrow slice of an object store:
//! version-pinned copy, delete (with delete-marker visibility), and object
//! tagging. This module defines that contract and an in-memory backend used
//! by tests.
//!
//! ## Version tokens
//!
//! Version identifiers are opaque strings. Real backends hand out their own
//! tokens (S3 version IDs, GCS generations); [`MemoryObjectStore`] generates
//! ULIDs. The engine never interprets them beyond equality comparison.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use ulid::Ulid;

use crate::error::{Error, Result};

/// A flat set of object tags. Keys are unique.
pub type TagSet = BTreeMap<String, String>;

/// Result of copying one object version.
#[derive(Debug, Clone)]
pub struct CopyOutcome {
    /// Version token of the newly written destination object, if the
    /// destination bucket is versioned.
    pub version_id: Option<String>,
}

/// Result of deleting an object from a possibly-versioned bucket.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    /// True when the backend recorded a delete marker instead of hard-removing
    /// the object (soft-delete semantics on versioned buckets).
    pub delete_marker_created: bool,
    /// Version token of the delete marker, when one was created.
    pub version_id: Option<String>,
}

/// Object store capability consumed by the migration engine.
///
/// Implementations are external collaborators (cloud SDK clients in
/// production, [`MemoryObjectStore`] in tests). All methods are
/// `Send + Sync` so events in one batch can run concurrently.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Copies the exact source object version to the destination key.
    ///
    /// Returns `Error::NotFound` if the source bucket, key, or version does
    /// not exist. Overwrite-safe: repeating the copy yields the same
    /// destination content.
    async fn copy_object_version(
        &self,
        src_bucket: &str,
        src_key: &str,
        src_version_id: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<CopyOutcome>;

    /// Deletes an object, reporting whether a delete marker was created.
    ///
    /// On versioned buckets this records a soft delete and returns the
    /// marker's version token; on unversioned buckets the object is removed
    /// outright.
    async fn delete_object_version(&self, bucket: &str, key: &str) -> Result<DeleteOutcome>;

    /// Removes an object without caring about delete-marker semantics.
    ///
    /// Succeeds even if the object does not exist (idempotent).
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Reads the tag set of an object.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    async fn get_tags(&self, bucket: &str, key: &str) -> Result<Option<TagSet>>;

    /// Replaces the tag set of an object.
    ///
    /// Returns `Error::NotFound` if the object does not exist.
    async fn put_tags(&self, bucket: &str, key: &str, tags: TagSet) -> Result<()>;
}

/// One stored version of an object. `body` is `None` for delete markers.
#[derive(Debug, Clone)]
struct ObjectVersion {
    version_id: String,
    body: Option<Bytes>,
}

impl ObjectVersion {
    fn is_delete_marker(&self) -> bool {
        self.body.is_none()
    }
}

/// All versions of one key, newest last, plus the current tag set.
#[derive(Debug, Clone, Default)]
struct ObjectEntry {
    versions: Vec<ObjectVersion>,
    tags: TagSet,
}

impl ObjectEntry {
    fn current(&self) -> Option<&ObjectVersion> {
        self.versions.last()
    }

    fn find_version(&self, version_id: &str) -> Option<&ObjectVersion> {
        self.versions.iter().find(|v| v.version_id == version_id)
    }
}

#[derive(Debug, Default)]
struct BucketState {
    versioned: bool,
    objects: HashMap<String, ObjectEntry>,
}

#[derive(Debug, Default)]
struct StoreState {
    buckets: HashMap<String, BucketState>,
    fail_tag_reads: HashSet<(String, String)>,
    fail_tag_writes: HashSet<(String, String)>,
}

/// In-memory object store for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production. Simulates
/// versioned-bucket semantics: deletes on a versioned bucket append a delete
/// marker and older versions stay copyable by version token.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    state: RwLock<StoreState>,
}

/// Converts a lock poison error to an internal error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Internal {
        message: "object store lock poisoned".into(),
    }
}

impl MemoryObjectStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bucket if it does not already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    /// Enables versioning (delete markers) on a bucket, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn enable_versioning(&self, bucket: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.buckets.entry(bucket.to_string()).or_default().versioned = true;
        Ok(())
    }

    /// Writes an object, creating the bucket on demand.
    ///
    /// Returns the version token assigned to the new version.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<String> {
        let mut state = self.state.write().map_err(poison_err)?;
        Ok(Self::write_version(&mut state, bucket, key, body))
    }

    /// Makes subsequent tag reads for `bucket/key` fail with a storage error.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn fail_tag_reads(&self, bucket: &str, key: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state
            .fail_tag_reads
            .insert((bucket.to_string(), key.to_string()));
        Ok(())
    }

    /// Makes subsequent tag writes for `bucket/key` fail with a storage error.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn fail_tag_writes(&self, bucket: &str, key: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state
            .fail_tag_writes
            .insert((bucket.to_string(), key.to_string()));
        Ok(())
    }

    /// Returns the current body of an object, or `None` if the key is absent
    /// or its newest version is a delete marker.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn object_body(&self, bucket: &str, key: &str) -> Result<Option<Bytes>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .and_then(ObjectEntry::current)
            .and_then(|v| v.body.clone()))
    }

    /// Returns true if the newest version of an object is a delete marker.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn has_delete_marker(&self, bucket: &str, key: &str) -> Result<bool> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .and_then(ObjectEntry::current)
            .is_some_and(ObjectVersion::is_delete_marker))
    }

    /// Returns the stored tag set of an object, bypassing failure injection.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn tags_of(&self, bucket: &str, key: &str) -> Result<Option<TagSet>> {
        let state = self.state.read().map_err(poison_err)?;
        Ok(state
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|entry| entry.tags.clone()))
    }

    fn write_version(state: &mut StoreState, bucket: &str, key: &str, body: Bytes) -> String {
        let bucket_state = state.buckets.entry(bucket.to_string()).or_default();
        let version_id = Ulid::new().to_string();
        let entry = bucket_state.objects.entry(key.to_string()).or_default();
        if !bucket_state.versioned {
            entry.versions.clear();
        }
        entry.versions.push(ObjectVersion {
            version_id: version_id.clone(),
            body: Some(body),
        });
        version_id
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn copy_object_version(
        &self,
        src_bucket: &str,
        src_key: &str,
        src_version_id: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<CopyOutcome> {
        let mut state = self.state.write().map_err(poison_err)?;

        let body = {
            let entry = state
                .buckets
                .get(src_bucket)
                .and_then(|b| b.objects.get(src_key))
                .ok_or_else(|| Error::NotFound(format!("object not found: {src_bucket}/{src_key}")))?;
            let version = entry.find_version(src_version_id).ok_or_else(|| {
                Error::NotFound(format!(
                    "version not found: {src_bucket}/{src_key}?versionId={src_version_id}"
                ))
            })?;
            version.body.clone().ok_or_else(|| {
                Error::InvalidInput(format!(
                    "cannot copy delete marker: {src_bucket}/{src_key}?versionId={src_version_id}"
                ))
            })?
        };

        let version_id = Self::write_version(&mut state, dst_bucket, dst_key, body);
        let versioned = state
            .buckets
            .get(dst_bucket)
            .is_some_and(|b| b.versioned);
        drop(state);

        Ok(CopyOutcome {
            version_id: versioned.then_some(version_id),
        })
    }

    async fn delete_object_version(&self, bucket: &str, key: &str) -> Result<DeleteOutcome> {
        let mut state = self.state.write().map_err(poison_err)?;
        let bucket_state = state.buckets.entry(bucket.to_string()).or_default();

        if bucket_state.versioned {
            let version_id = Ulid::new().to_string();
            let entry = bucket_state.objects.entry(key.to_string()).or_default();
            entry.versions.push(ObjectVersion {
                version_id: version_id.clone(),
                body: None,
            });
            drop(state);
            return Ok(DeleteOutcome {
                delete_marker_created: true,
                version_id: Some(version_id),
            });
        }

        bucket_state.objects.remove(key);
        drop(state);
        Ok(DeleteOutcome {
            delete_marker_created: false,
            version_id: None,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        if let Some(bucket_state) = state.buckets.get_mut(bucket) {
            bucket_state.objects.remove(key);
        }
        drop(state);
        Ok(())
    }

    async fn get_tags(&self, bucket: &str, key: &str) -> Result<Option<TagSet>> {
        let state = self.state.read().map_err(poison_err)?;
        if state
            .fail_tag_reads
            .contains(&(bucket.to_string(), key.to_string()))
        {
            return Err(Error::storage(format!(
                "tag read rejected: {bucket}/{key}"
            )));
        }

        Ok(state
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .filter(|entry| entry.current().is_some_and(|v| !v.is_delete_marker()))
            .map(|entry| entry.tags.clone()))
    }

    async fn put_tags(&self, bucket: &str, key: &str, tags: TagSet) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        if state
            .fail_tag_writes
            .contains(&(bucket.to_string(), key.to_string()))
        {
            return Err(Error::storage(format!(
                "tag write rejected: {bucket}/{key}"
            )));
        }

        let entry = state
            .buckets
            .get_mut(bucket)
            .and_then(|b| b.objects.get_mut(key))
            .ok_or_else(|| Error::NotFound(format!("object not found: {bucket}/{key}")))?;
        entry.tags = tags;
        drop(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copy_pins_exact_version() {
        let store = MemoryObjectStore::new();
        store.enable_versioning("src").unwrap();
        let first = store.put_object("src", "a.json", Bytes::from("v1")).unwrap();
        store.put_object("src", "a.json", Bytes::from("v2")).unwrap();

        store
            .copy_object_version("src", "a.json", &first, "dst", "out/a.json")
            .await
            .expect("copy");

        let body = store.object_body("dst", "out/a.json").unwrap();
        assert_eq!(body, Some(Bytes::from("v1")));
    }

    #[tokio::test]
    async fn copy_missing_version_is_not_found() {
        let store = MemoryObjectStore::new();
        store.put_object("src", "a.json", Bytes::from("v1")).unwrap();

        let err = store
            .copy_object_version("src", "a.json", "nope", "dst", "a.json")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn copy_to_versioned_destination_returns_version() {
        let store = MemoryObjectStore::new();
        store.enable_versioning("dst").unwrap();
        let version = store.put_object("src", "a.json", Bytes::from("v1")).unwrap();

        let outcome = store
            .copy_object_version("src", "a.json", &version, "dst", "a.json")
            .await
            .expect("copy");
        assert!(outcome.version_id.is_some());
    }

    #[tokio::test]
    async fn versioned_delete_creates_marker_and_keeps_versions() {
        let store = MemoryObjectStore::new();
        store.enable_versioning("src").unwrap();
        let version = store.put_object("src", "a.json", Bytes::from("v1")).unwrap();

        let outcome = store.delete_object_version("src", "a.json").await.unwrap();
        assert!(outcome.delete_marker_created);
        assert!(outcome.version_id.is_some());

        // Current view is gone but the old version stays copyable.
        assert_eq!(store.object_body("src", "a.json").unwrap(), None);
        store
            .copy_object_version("src", "a.json", &version, "dst", "a.json")
            .await
            .expect("copy after marker");
    }

    #[tokio::test]
    async fn unversioned_delete_removes_outright() {
        let store = MemoryObjectStore::new();
        store.put_object("src", "a.json", Bytes::from("v1")).unwrap();

        let outcome = store.delete_object_version("src", "a.json").await.unwrap();
        assert!(!outcome.delete_marker_created);
        assert!(outcome.version_id.is_none());
        assert_eq!(store.object_body("src", "a.json").unwrap(), None);
    }

    #[tokio::test]
    async fn delete_object_is_idempotent() {
        let store = MemoryObjectStore::new();
        store.create_bucket("dst").unwrap();
        store.delete_object("dst", "missing").await.expect("first");
        store.delete_object("dst", "missing").await.expect("second");
    }

    #[tokio::test]
    async fn tags_roundtrip() {
        let store = MemoryObjectStore::new();
        store.put_object("dst", "a.json", Bytes::from("v1")).unwrap();

        let mut tags = TagSet::new();
        tags.insert("mv-delete-versionId".into(), "V1".into());
        store.put_tags("dst", "a.json", tags.clone()).await.unwrap();

        let read = store.get_tags("dst", "a.json").await.unwrap();
        assert_eq!(read, Some(tags));
    }

    #[tokio::test]
    async fn tags_of_missing_object_are_none() {
        let store = MemoryObjectStore::new();
        store.create_bucket("dst").unwrap();
        assert_eq!(store.get_tags("dst", "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn injected_tag_read_failure() {
        let store = MemoryObjectStore::new();
        store.put_object("dst", "a.json", Bytes::from("v1")).unwrap();
        store.fail_tag_reads("dst", "a.json").unwrap();

        let err = store.get_tags("dst", "a.json").await.unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
    }

    #[tokio::test]
    async fn put_tags_on_missing_object_is_not_found() {
        let store = MemoryObjectStore::new();
        store.create_bucket("dst").unwrap();
        let err = store
            .put_tags("dst", "missing", TagSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
