//! Append-only interaction log.
//!
//! Records every user-visible action against a session, most recent first,
//! and persists the whole sequence under a single key through the chunked
//! store. Persistence is best-effort: a failed write keeps the entry in
//! memory and logs the failure.

use crate::chunks::ChunkedStore;
use chrono::{DateTime, Utc};
use shariaa_types::{Interaction, InteractionKind, InteractionPayload};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Key the interaction sequence is persisted under.
pub const INTERACTIONS_KEY: &str = "shariaa_session_interactions";

/// Append-only log of session interactions.
pub struct InteractionLog {
    store: ChunkedStore,
    entries: RwLock<Vec<Interaction>>,
}

impl InteractionLog {
    /// Open the log, loading any persisted sequence. Absent or unreadable
    /// state starts the log empty.
    pub fn open(store: ChunkedStore) -> Self {
        let entries = match store.get_json::<Vec<Interaction>>(INTERACTIONS_KEY) {
            Ok(Some(entries)) => entries,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(target: "shariaa::interactions", "Failed to read interaction log: {}", e);
                Vec::new()
            }
        };
        debug!(target: "shariaa::interactions", "Loaded {} interactions", entries.len());

        Self {
            store,
            entries: RwLock::new(entries),
        }
    }

    /// Record a payload against a session, stamped with a fresh id and the
    /// current UTC time. Returns the stored record.
    pub fn append(&self, session_id: &str, payload: InteractionPayload) -> Interaction {
        let interaction = Interaction::new(session_id, payload);
        {
            let mut entries = self.entries.write().unwrap();
            entries.insert(0, interaction.clone());
        }
        self.persist();
        interaction
    }

    /// Interactions for one session, most recent first.
    pub fn for_session(&self, session_id: &str) -> Vec<Interaction> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .filter(|i| i.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Interactions for one term of one session, most recent first.
    pub fn for_session_and_term(&self, session_id: &str, term_id: &str) -> Vec<Interaction> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .filter(|i| i.session_id == session_id && i.term_id() == Some(term_id))
            .cloned()
            .collect()
    }

    /// Timestamp of the most recent `term_modified` interaction for a term.
    pub fn last_modified_at(&self, session_id: &str, term_id: &str) -> Option<DateTime<Utc>> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .filter(|i| {
                i.session_id == session_id
                    && i.term_id() == Some(term_id)
                    && i.kind() == InteractionKind::TermModified
            })
            .map(|i| i.timestamp)
            .max()
    }

    /// Drop all interactions belonging to a session.
    pub fn purge(&self, session_id: &str) {
        {
            let mut entries = self.entries.write().unwrap();
            entries.retain(|i| i.session_id != session_id);
        }
        self.persist();
    }

    /// Total number of logged interactions.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the log holds no interactions.
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    fn persist(&self) {
        let entries = self.entries.read().unwrap();
        if let Err(e) = self.store.put_json(INTERACTIONS_KEY, &*entries) {
            warn!(target: "shariaa::interactions", "Failed to persist interaction log: {}", e);
        }
    }
}
