//! Chunked writes over a bounded primitive store.
//!
//! Values that exceed the primitive's capacity are split across derived
//! keys: `{key}_chunks` holds the chunk count and `{key}_chunk_{i}` the
//! pieces. Presence of the count key decides the read path, so direct and
//! chunked values can never shadow each other.

use crate::error::StoreError;
use crate::kv::PrimitiveStore;
use crate::StoreResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Store wrapper that splits oversized values transparently.
#[derive(Clone)]
pub struct ChunkedStore {
    store: Arc<dyn PrimitiveStore>,
}

impl ChunkedStore {
    pub fn new(store: Arc<dyn PrimitiveStore>) -> Self {
        Self { store }
    }

    /// Write a value, chunking it when the primitive's capacity requires.
    pub fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        match self.store.capacity() {
            Some(cap) if value.len() > cap => self.put_chunked(key, value, cap),
            _ => {
                self.remove_chunks(key, self.stored_chunk_count(key));
                self.store.set(key, value)
            }
        }
    }

    fn put_chunked(&self, key: &str, value: &str, cap: usize) -> StoreResult<()> {
        let previous_count = self.stored_chunk_count(key);
        let chunks = split_chunks(value, cap);

        for (i, chunk) in chunks.iter().enumerate() {
            self.store.set(&chunk_key(key, i), chunk)?;
        }
        self.store.set(&count_key(key), &chunks.len().to_string())?;

        // A direct value under the same key is now stale
        if let Err(e) = self.store.delete(key) {
            warn!(target: "shariaa::chunks", "Failed to remove direct value for '{}': {}", key, e);
        }
        if let Some(previous) = previous_count {
            if previous > chunks.len() {
                self.remove_chunk_range(key, chunks.len(), previous);
            }
        }

        debug!(target: "shariaa::chunks", "Wrote '{}' as {} chunks of <= {} bytes", key, chunks.len(), cap);
        Ok(())
    }

    /// Read a value, reassembling chunks when a count key is present.
    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let count = match self.store.get(&count_key(key))? {
            Some(raw) => parse_count(key, &raw)?,
            None => return self.store.get(key),
        };

        let mut value = String::new();
        for i in 0..count {
            match self.store.get(&chunk_key(key, i))? {
                Some(chunk) => value.push_str(&chunk),
                None => {
                    return Err(StoreError::CorruptChunks {
                        key: key.to_string(),
                        reason: format!("chunk {i} of {count} is missing"),
                    });
                }
            }
        }
        Ok(Some(value))
    }

    /// Remove a value along with any chunk set stored for it.
    pub fn delete(&self, key: &str) -> StoreResult<()> {
        self.store.delete(key)?;
        self.remove_chunks(key, self.stored_chunk_count(key));
        Ok(())
    }

    /// Serialize to JSON and write.
    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        self.put(key, &serde_json::to_string(value)?)
    }

    /// Read and deserialize from JSON.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Chunk count currently stored for `key`, when readable.
    fn stored_chunk_count(&self, key: &str) -> Option<usize> {
        match self.store.get(&count_key(key)) {
            Ok(Some(raw)) => parse_count(key, &raw).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(target: "shariaa::chunks", "Failed to read chunk count for '{}': {}", key, e);
                None
            }
        }
    }

    /// Best-effort removal of a stored chunk set, count key included.
    fn remove_chunks(&self, key: &str, count: Option<usize>) {
        let Some(count) = count else { return };
        self.remove_chunk_range(key, 0, count);
        if let Err(e) = self.store.delete(&count_key(key)) {
            warn!(target: "shariaa::chunks", "Failed to remove chunk count for '{}': {}", key, e);
        }
    }

    /// Best-effort removal of chunks `from..to`.
    fn remove_chunk_range(&self, key: &str, from: usize, to: usize) {
        for i in from..to {
            if let Err(e) = self.store.delete(&chunk_key(key, i)) {
                warn!(target: "shariaa::chunks", "Failed to remove chunk {} for '{}': {}", i, key, e);
            }
        }
    }
}

fn count_key(key: &str) -> String {
    format!("{key}_chunks")
}

fn chunk_key(key: &str, index: usize) -> String {
    format!("{key}_chunk_{index}")
}

fn parse_count(key: &str, raw: &str) -> StoreResult<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| StoreError::CorruptChunks {
            key: key.to_string(),
            reason: format!("unparsable chunk count '{raw}'"),
        })
}

/// Split into contiguous pieces of at most `capacity` bytes, never cutting
/// through a UTF-8 character.
fn split_chunks(value: &str, capacity: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = value;
    while rest.len() > capacity {
        let mut cut = capacity;
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            // Capacity narrower than one character: take it whole and let
            // the store reject the write
            cut = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
        }
        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }
    chunks.push(rest);
    chunks
}
