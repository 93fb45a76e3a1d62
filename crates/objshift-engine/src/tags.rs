//! Provenance tag codec.
//!
//! After a successful move the destination object is tagged with the source
//! deletion that produced it. The `mv-delete-versionId` tag is the durable,
//! co-located signal a later removal event uses to detect that it has been
//! superseded by an intervening creation; the remaining tags exist for
//! operators tracing where a destination object came from.
//!
//! Decoding fails open: a tag set that is missing, or could not be retrieved
//! at all, decodes as "absent" and the caller re-evaluates from scratch.

use chrono::Utc;

use objshift_core::TagSet;

/// Tag key: epoch milliseconds at tagging time.
pub const TAG_TIMESTAMP: &str = "mv-timestamp";
/// Tag key: version token of the source delete marker that produced this
/// destination state.
pub const TAG_DELETE_VERSION_ID: &str = "mv-delete-versionId";
/// Tag key: the object's key in the source location.
pub const TAG_ORIGINAL_KEY: &str = "mv-original-key";
/// Tag key: the object's bucket in the source location.
pub const TAG_ORIGINAL_BUCKET: &str = "mv-original-bucket";

/// Encodes the provenance tag set for a destination object.
#[must_use]
pub fn encode(
    deleted_source_version_id: &str,
    source_bucket: &str,
    source_key: &str,
) -> TagSet {
    let mut tags = TagSet::new();
    tags.insert(
        TAG_TIMESTAMP.to_string(),
        Utc::now().timestamp_millis().to_string(),
    );
    tags.insert(
        TAG_DELETE_VERSION_ID.to_string(),
        deleted_source_version_id.to_string(),
    );
    tags.insert(TAG_ORIGINAL_KEY.to_string(), source_key.to_string());
    tags.insert(TAG_ORIGINAL_BUCKET.to_string(), source_bucket.to_string());
    tags
}

/// Decodes the recorded delete-marker version id from a tag set.
///
/// Returns `None` when the tag is absent; callers treat an unretrievable tag
/// set the same way.
#[must_use]
pub fn decode(tags: &TagSet) -> Option<&str> {
    tags.get(TAG_DELETE_VERSION_ID).map(String::as_str)
}
