//! Bounded local cache of analyzed sessions.
//!
//! Keeps the most recent analyses in a fixed-size list persisted under a
//! single key through the chunked store. Every operation is best-effort:
//! storage failures are logged and swallowed so a flaky store can never
//! break the review flow.

use crate::chunks::ChunkedStore;
use shariaa_types::{SessionRecord, StorageTier};
use tracing::{debug, warn};

/// Key the session list is persisted under.
pub const SESSIONS_KEY: &str = "shariaa_sessions";

/// Tuning for the local session list.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Most recent sessions kept in the list.
    pub max_entries: usize,
    /// Serialized-size threshold (bytes) at which records degrade to the
    /// minimal projection.
    pub full_tier_threshold: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 20,
            full_tier_threshold: 32 * 1024,
        }
    }
}

/// Local store of recently analyzed sessions, most recent first.
pub struct SessionRepository {
    store: ChunkedStore,
    config: RepositoryConfig,
}

impl SessionRepository {
    pub fn new(store: ChunkedStore) -> Self {
        Self::with_config(store, RepositoryConfig::default())
    }

    pub fn with_config(store: ChunkedStore, config: RepositoryConfig) -> Self {
        Self { store, config }
    }

    /// All cached records, most recent first. Absent or unreadable state
    /// yields an empty list.
    pub fn list(&self) -> Vec<SessionRecord> {
        match self.store.get_json::<Vec<SessionRecord>>(SESSIONS_KEY) {
            Ok(Some(records)) => records,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(target: "shariaa::sessions", "Failed to read session list: {}", e);
                Vec::new()
            }
        }
    }

    /// Insert or update a record.
    ///
    /// A record with a known id is overwritten in place, keeping its
    /// bookmark flag; a new record is prepended as most recent. The list
    /// is then truncated to the configured maximum, dropping the oldest
    /// entries.
    pub fn upsert(&self, mut record: SessionRecord) -> StorageTier {
        let mut records = self.list();
        match records.iter().position(|r| r.id == record.id) {
            Some(index) => {
                record.bookmarked = records[index].bookmarked;
                records[index] = record;
            }
            None => records.insert(0, record),
        }
        records.truncate(self.config.max_entries);
        self.save(&records)
    }

    /// Remove the record with the given id. Unknown ids are a no-op.
    pub fn remove(&self, id: &str) -> StorageTier {
        let mut records = self.list();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            debug!(target: "shariaa::sessions", "No session '{}' to remove", id);
        }
        self.save(&records)
    }

    /// Flip the bookmark flag on the matching record. Unknown ids are a
    /// no-op.
    pub fn toggle_bookmark(&self, id: &str) -> StorageTier {
        let mut records = self.list();
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) => record.bookmarked = !record.bookmarked,
            None => {
                debug!(target: "shariaa::sessions", "No session '{}' to bookmark", id);
            }
        }
        self.save(&records)
    }

    /// Persist the list, degrading to minimal records when the full form
    /// crosses the size threshold. Returns the tier that was chosen.
    fn save(&self, records: &[SessionRecord]) -> StorageTier {
        let full = match serde_json::to_string(records) {
            Ok(json) => json,
            Err(e) => {
                warn!(target: "shariaa::sessions", "Failed to serialize session list: {}", e);
                return StorageTier::Omitted;
            }
        };

        let (tier, payload) = if full.len() >= self.config.full_tier_threshold {
            let minimal: Vec<SessionRecord> = records.iter().map(|r| r.minimal()).collect();
            match serde_json::to_string(&minimal) {
                Ok(json) => (StorageTier::Minimal, json),
                Err(e) => {
                    warn!(target: "shariaa::sessions", "Failed to serialize session list: {}", e);
                    return StorageTier::Omitted;
                }
            }
        } else {
            (StorageTier::Full, full)
        };

        if let Err(e) = self.store.put(SESSIONS_KEY, &payload) {
            warn!(target: "shariaa::sessions", "Failed to persist session list: {}", e);
        } else {
            debug!(
                target: "shariaa::sessions",
                "Persisted {} sessions at tier {:?}", records.len(), tier
            );
        }
        tier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemoryStore, PrimitiveStore};
    use chrono::Utc;
    use shariaa_types::TermSummary;
    use std::sync::Arc;

    fn repository() -> SessionRepository {
        let store = ChunkedStore::new(Arc::new(MemoryStore::with_capacity(2000)));
        SessionRepository::new(store)
    }

    fn record(id: &str) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            file_name: format!("{id}.pdf"),
            analyzed_at: Utc::now(),
            compliance_percentage: 80.0,
            detected_language: Some("ar".to_string()),
            original_format: Some("pdf".to_string()),
            interaction_count: 0,
            bookmarked: false,
            terms: vec![TermSummary {
                id: "t1".to_string(),
                is_valid: true,
                is_user_confirmed: false,
                expert_override: None,
            }],
        }
    }

    #[test]
    fn test_upsert_prepends_new_records() {
        let repo = repository();
        repo.upsert(record("s1"));
        repo.upsert(record("s2"));
        repo.upsert(record("s3"));

        let ids: Vec<String> = repo.list().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["s3", "s2", "s1"]);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let repo = repository();
        repo.upsert(record("s1"));
        repo.upsert(record("s2"));

        repo.toggle_bookmark("s1");
        let mut updated = record("s1");
        updated.compliance_percentage = 95.0;
        repo.upsert(updated);

        let records = repo.list();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "s2");
        assert_eq!(records[1].id, "s1");
        assert_eq!(records[1].compliance_percentage, 95.0);
        // A refresh never clears the user's bookmark
        assert!(records[1].bookmarked);
    }

    #[test]
    fn test_list_is_bounded_to_max_entries() {
        let repo = repository();
        for i in 0..21 {
            repo.upsert(record(&format!("s{i}")));
        }

        let records = repo.list();
        assert_eq!(records.len(), 20);
        assert_eq!(records[0].id, "s20");
        // The oldest record fell off the tail
        assert!(!records.iter().any(|r| r.id == "s0"));
    }

    #[test]
    fn test_remove_and_toggle_bookmark() {
        let repo = repository();
        repo.upsert(record("s1"));
        repo.upsert(record("s2"));

        repo.toggle_bookmark("s1");
        assert!(repo.list().iter().find(|r| r.id == "s1").unwrap().bookmarked);
        repo.toggle_bookmark("s1");
        assert!(!repo.list().iter().find(|r| r.id == "s1").unwrap().bookmarked);

        // Unknown ids leave the list untouched
        repo.toggle_bookmark("nope");
        repo.remove("nope");
        assert_eq!(repo.list().len(), 2);

        repo.remove("s2");
        let records = repo.list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "s1");
    }

    #[test]
    fn test_corrupt_state_reads_as_empty() {
        let primitive = Arc::new(MemoryStore::with_capacity(2000));
        primitive.set(SESSIONS_KEY, "not json").unwrap();

        let repo = SessionRepository::new(ChunkedStore::new(primitive));
        assert!(repo.list().is_empty());
    }

    #[test]
    fn test_save_degrades_to_minimal_over_threshold() {
        let store = ChunkedStore::new(Arc::new(MemoryStore::with_capacity(2000)));
        let repo = SessionRepository::with_config(
            store.clone(),
            RepositoryConfig {
                max_entries: 20,
                full_tier_threshold: 400,
            },
        );

        assert_eq!(repo.upsert(record("s1")), StorageTier::Full);

        let mut fat = record("s2");
        fat.detected_language = Some("x".repeat(400));
        assert_eq!(repo.upsert(fat), StorageTier::Minimal);

        // Minimal records dropped the bulk fields but kept identity
        let records = repo.list();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.terms.is_empty()));
        assert!(records.iter().all(|r| r.detected_language.is_none()));
        assert_eq!(records[0].id, "s2");
    }

    #[test]
    fn test_list_survives_repository_restart() {
        let primitive = Arc::new(MemoryStore::with_capacity(2000));
        {
            let repo = SessionRepository::new(ChunkedStore::new(primitive.clone()));
            repo.upsert(record("s1"));
        }

        let repo = SessionRepository::new(ChunkedStore::new(primitive));
        assert_eq!(repo.list().len(), 1);
        assert_eq!(repo.list()[0].id, "s1");
    }
}
