//! Port over the external shared key-value store (§4.I, §6 KV schema).
//! Deliberately out of scope per the specification; this trait is the only
//! contract the core consumes.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::CoreError;
use crate::value_objects::HashId;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Writes the flat `key -> value` mapping under the file's `hashId`
    /// entry, merging with (not replacing) any existing entry.
    async fn put_fields(&self, hash_id: &HashId, fields: HashMap<String, String>) -> Result<(), CoreError>;

    /// Reads the current flat mapping for a `hashId`, or an empty map if
    /// none exists yet. Used to build the `kvSnapshot` passed to `/run`.
    async fn get_fields(&self, hash_id: &HashId) -> Result<HashMap<String, String>, CoreError>;

    /// Removes a file's entry entirely, e.g. on a `delete` event.
    async fn remove(&self, hash_id: &HashId) -> Result<(), CoreError>;

    /// Lists every known `hashId`, e.g. for recompute-all.
    async fn list_hash_ids(&self) -> Result<Vec<HashId>, CoreError>;
}
