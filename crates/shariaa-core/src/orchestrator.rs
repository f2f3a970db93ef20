//! Active-session orchestration.
//!
//! `SessionOrchestrator` owns the active review session end to end:
//! upload and analysis, the term review loop (questions, modifications,
//! confirmations, expert feedback), document generation, and snapshot
//! persistence for restart recovery. State is observable through getters
//! and a broadcast event stream; mutations never hold a lock across an
//! await.

use crate::api::AnalysisClient;
use crate::chunks::ChunkedStore;
use crate::error::{ApiError, SessionError};
use crate::interactions::InteractionLog;
use crate::repository::SessionRepository;
use crate::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;
use shariaa_types::{
    AnalysisTerm, ComplianceStats, ContractFile, DocumentVariant, ExpertFeedbackEntry,
    ExpertFeedbackRequest, InteractionPayload, ModificationAction, ServiceStats, SessionDetail,
    SessionPhase, SessionRecord, StorageTier, TermSnapshot,
};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Key the active session id is persisted under.
pub const SESSION_ID_KEY: &str = "current_session_id";
/// Key the active term snapshot is persisted under.
pub const TERMS_KEY: &str = "current_analysis_terms";
/// Key the active session details are persisted under.
pub const DETAILS_KEY: &str = "current_session_details";

/// Configuration for the session orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Interval between synthetic upload-progress ticks.
    pub progress_tick: Duration,
    /// Smallest progress increment per tick.
    pub progress_step_min: u8,
    /// Largest progress increment per tick.
    pub progress_step_max: u8,
    /// Progress never passes this value until the upload resolves.
    pub progress_ceiling: u8,
    /// Serialized-size limit (bytes) for one snapshot projection.
    pub snapshot_size_limit: usize,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            progress_tick: Duration::from_millis(200),
            progress_step_min: 3,
            progress_step_max: 9,
            progress_ceiling: 90,
            snapshot_size_limit: 16 * 1024,
            event_capacity: 64,
        }
    }
}

/// State-change notifications for UI layers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    PhaseChanged(SessionPhase),
    UploadProgress(u8),
    TermsUpdated,
    StatsUpdated(ComplianceStats),
    SessionCleared,
}

#[derive(Default)]
struct ActiveState {
    phase: SessionPhase,
    session_id: Option<String>,
    terms: Vec<AnalysisTerm>,
    details: Option<SessionDetail>,
    upload_error: Option<SessionError>,
    analysis_error: Option<SessionError>,
    interaction_error: Option<SessionError>,
    last_snapshot_tier: Option<StorageTier>,
}

/// Removes a per-term busy flag when the operation ends, on every path.
///
/// Entries are stamped with the epoch they were acquired under, so a
/// stale guard outliving a session clear cannot release a flag that a
/// newer operation holds.
struct TermGuard<'a> {
    flags: &'a DashMap<String, u64>,
    term_id: String,
    epoch: u64,
}

impl<'a> TermGuard<'a> {
    fn acquire(flags: &'a DashMap<String, u64>, term_id: &str, epoch: u64) -> Option<Self> {
        match flags.entry(term_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                entry.insert(epoch);
                Some(Self {
                    flags,
                    term_id: term_id.to_string(),
                    epoch,
                })
            }
        }
    }
}

impl Drop for TermGuard<'_> {
    fn drop(&mut self) {
        self.flags
            .remove_if(&self.term_id, |_, stamp| *stamp == self.epoch);
    }
}

/// Owns and synchronizes the active contract-review session.
pub struct SessionOrchestrator {
    client: Arc<dyn AnalysisClient>,
    store: ChunkedStore,
    repository: SessionRepository,
    log: InteractionLog,
    config: OrchestratorConfig,
    state: RwLock<ActiveState>,
    progress: Arc<AtomicU8>,
    epoch: Arc<AtomicU64>,
    term_processing: DashMap<String, u64>,
    reviewing: DashMap<String, u64>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionOrchestrator {
    /// Create an orchestrator with default configuration, building its
    /// repository and interaction log over the given store.
    pub fn new(client: Arc<dyn AnalysisClient>, store: ChunkedStore) -> Self {
        Self::with_config(client, store, OrchestratorConfig::default())
    }

    /// Create an orchestrator with custom configuration.
    pub fn with_config(
        client: Arc<dyn AnalysisClient>,
        store: ChunkedStore,
        config: OrchestratorConfig,
    ) -> Self {
        let repository = SessionRepository::new(store.clone());
        let log = InteractionLog::open(store.clone());
        Self::from_parts(client, store, repository, log, config)
    }

    /// Create an orchestrator from pre-built collaborators.
    pub fn from_parts(
        client: Arc<dyn AnalysisClient>,
        store: ChunkedStore,
        repository: SessionRepository,
        log: InteractionLog,
        config: OrchestratorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            client,
            store,
            repository,
            log,
            config,
            state: RwLock::new(ActiveState::default()),
            progress: Arc::new(AtomicU8::new(0)),
            epoch: Arc::new(AtomicU64::new(0)),
            term_processing: DashMap::new(),
            reviewing: DashMap::new(),
            events,
        }
    }

    // ====== Observable state ======

    /// Subscribe to state-change events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> SessionPhase {
        self.state.read().await.phase
    }

    /// Identifier of the active session, when one is loaded.
    pub async fn session_id(&self) -> Option<String> {
        self.state.read().await.session_id.clone()
    }

    /// Terms of the active session.
    pub async fn terms(&self) -> Vec<AnalysisTerm> {
        self.state.read().await.terms.clone()
    }

    /// Details of the active session.
    pub async fn details(&self) -> Option<SessionDetail> {
        self.state.read().await.details.clone()
    }

    /// Compliance statistics, recomputed from the live term list.
    pub async fn stats(&self) -> ComplianceStats {
        ComplianceStats::from_terms(&self.state.read().await.terms)
    }

    /// Error from the most recent upload attempt.
    pub async fn upload_error(&self) -> Option<SessionError> {
        self.state.read().await.upload_error.clone()
    }

    /// Error from the most recent analysis or load.
    pub async fn analysis_error(&self) -> Option<SessionError> {
        self.state.read().await.analysis_error.clone()
    }

    /// Error from the most recent term interaction.
    pub async fn interaction_error(&self) -> Option<SessionError> {
        self.state.read().await.interaction_error.clone()
    }

    /// Tier chosen by the most recent snapshot write.
    pub async fn last_snapshot_tier(&self) -> Option<StorageTier> {
        self.state.read().await.last_snapshot_tier
    }

    /// Synthetic upload progress, 0-100.
    pub fn upload_progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    /// Whether a question is in flight for the term.
    pub fn is_term_processing(&self, term_id: &str) -> bool {
        self.term_processing.contains_key(term_id)
    }

    /// Whether a modification review or confirmation is in flight for the
    /// term.
    pub fn is_reviewing_modification(&self, term_id: &str) -> bool {
        self.reviewing.contains_key(term_id)
    }

    /// Local session history.
    pub fn repository(&self) -> &SessionRepository {
        &self.repository
    }

    /// Interaction audit log.
    pub fn interactions(&self) -> &InteractionLog {
        &self.log
    }

    // ====== Upload and load ======

    /// Upload a contract and load its analysis, returning the session id.
    ///
    /// Any previous session is cleared first. Validation failures reject
    /// the file before the service is contacted.
    pub async fn upload_and_analyze(&self, file: ContractFile) -> Result<String> {
        if file.name.trim().is_empty() {
            return Err(self
                .reject_upload(SessionError::InvalidFile("file name is empty".to_string()))
                .await);
        }
        let Some(mime_type) = file.resolved_mime_type() else {
            return Err(self
                .reject_upload(SessionError::InvalidFile(format!(
                    "cannot resolve a type for '{}'",
                    file.name
                )))
                .await);
        };

        self.clear_session().await;
        let epoch = self.current_epoch();

        info!(
            target: "shariaa::orchestrator",
            "Uploading '{}' ({}, {} bytes)", file.name, mime_type, file.bytes.len()
        );
        self.set_phase(SessionPhase::Uploading).await;
        let (stop_progress, ticker) = self.spawn_progress_ticker(epoch);

        let uploaded = self.client.upload_contract(&file).await;
        let _ = stop_progress.send(());
        let _ = ticker.await;

        if self.current_epoch() != epoch {
            debug!(target: "shariaa::orchestrator", "Discarding stale upload of '{}'", file.name);
            return Err(SessionError::Superseded);
        }

        let ack = match uploaded {
            Ok(ack) => ack,
            Err(e) => {
                let err = SessionError::from_upload_failure(e);
                warn!(target: "shariaa::orchestrator", "Upload of '{}' failed: {}", file.name, err);
                self.set_progress(0);
                self.fail_upload(err.clone()).await;
                return Err(err);
            }
        };

        self.set_progress(100);
        self.load_session_inner(&ack.session_id, epoch).await?;

        self.log.append(
            &ack.session_id,
            InteractionPayload::QuestionAsked {
                term_id: None,
                question: format!("Uploaded contract '{}'", file.name),
                answer: None,
            },
        );
        self.save_session_record(&ack.session_id).await;

        self.set_progress(0);
        Ok(ack.session_id)
    }

    /// Load a session's details and terms into the active state and
    /// refresh its cached record in the local history.
    pub async fn load_session(&self, session_id: &str) -> Result<()> {
        let epoch = self.current_epoch();
        self.load_session_inner(session_id, epoch).await
    }

    async fn load_session_inner(&self, session_id: &str, epoch: u64) -> Result<()> {
        self.set_phase(SessionPhase::Analyzing).await;

        let fetched = tokio::try_join!(
            self.client.session_details(session_id),
            self.fetch_terms(session_id),
        );

        if self.current_epoch() != epoch {
            debug!(target: "shariaa::orchestrator", "Discarding stale load of '{}'", session_id);
            return Err(SessionError::Superseded);
        }

        let (details, mut terms) = match fetched {
            Ok(parts) => parts,
            Err(e) => {
                warn!(target: "shariaa::orchestrator", "Failed to load session '{}': {}", session_id, e);
                self.clear_session().await;
                let err = SessionError::LoadFailed {
                    session_id: session_id.to_string(),
                    message: e.to_string(),
                };
                self.state.write().await.analysis_error = Some(err.clone());
                return Err(err);
            }
        };

        for term in &mut terms {
            term.interaction_count =
                self.log.for_session_and_term(session_id, &term.id).len() as u32;
            term.last_modified_at = self.log.last_modified_at(session_id, &term.id);
        }

        let term_count = terms.len();
        {
            let mut state = self.state.write().await;
            state.session_id = Some(session_id.to_string());
            state.terms = terms;
            state.details = Some(details);
            state.analysis_error = None;
        }
        self.set_phase(SessionPhase::Ready).await;
        self.persist_snapshot().await;
        self.save_session_record(session_id).await;

        self.notify_terms_changed().await;
        info!(target: "shariaa::orchestrator", "Session '{}' ready with {} terms", session_id, term_count);
        Ok(())
    }

    /// Fetch terms, tolerating a malformed payload by substituting none.
    async fn fetch_terms(&self, session_id: &str) -> std::result::Result<Vec<AnalysisTerm>, ApiError> {
        match self.client.session_terms(session_id).await {
            Ok(terms) => Ok(terms),
            Err(ApiError::MalformedResponse(msg)) => {
                warn!(
                    target: "shariaa::orchestrator",
                    "Term payload for '{}' is malformed, continuing without terms: {}",
                    session_id, msg
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    // ====== Term review loop ======

    /// Ask a question about one term.
    ///
    /// Returns `Ok(None)` without contacting the service when no session
    /// is active or the term is unknown; a question already in flight for
    /// the same term is a caller error.
    pub async fn ask_term_question(
        &self,
        term_id: &str,
        question: &str,
    ) -> Result<Option<String>> {
        let (session_id, term_text) = {
            let state = self.state.read().await;
            let Some(session_id) = state.session_id.clone() else {
                debug!(target: "shariaa::orchestrator", "No active session for a term question");
                return Ok(None);
            };
            let Some(term) = state.terms.iter().find(|t| t.id == term_id) else {
                debug!(target: "shariaa::orchestrator", "Term '{}' is not in the active session", term_id);
                return Ok(None);
            };
            (session_id, term.text.clone())
        };

        let epoch = self.current_epoch();
        let Some(_guard) = TermGuard::acquire(&self.term_processing, term_id, epoch) else {
            return Err(SessionError::TermBusy(term_id.to_string()));
        };

        let answered = self
            .client
            .ask_question(&session_id, question, Some(term_id), Some(&term_text))
            .await;

        if self.current_epoch() != epoch {
            return Err(SessionError::Superseded);
        }
        let answer = match answered {
            Ok(answer) => answer,
            Err(e) => {
                let err: SessionError = e.into();
                self.record_interaction_error(err.clone()).await;
                return Err(err);
            }
        };

        self.log.append(
            &session_id,
            InteractionPayload::QuestionAsked {
                term_id: Some(term_id.to_string()),
                question: question.to_string(),
                answer: Some(answer.clone()),
            },
        );
        {
            let mut state = self.state.write().await;
            if let Some(term) = state.terms.iter_mut().find(|t| t.id == term_id) {
                term.last_answer = Some(answer.clone());
                term.interaction_count += 1;
            }
            state.interaction_error = None;
        }
        self.persist_snapshot().await;
        self.notify_terms_changed().await;
        Ok(Some(answer))
    }

    /// Ask a question about the whole contract.
    ///
    /// Returns `Ok(None)` without contacting the service when no session
    /// is active.
    pub async fn ask_general_question(&self, question: &str) -> Result<Option<String>> {
        let Some(session_id) = self.session_id().await else {
            debug!(target: "shariaa::orchestrator", "No active session for a general question");
            return Ok(None);
        };
        let epoch = self.current_epoch();

        let answered = self
            .client
            .ask_question(&session_id, question, None, None)
            .await;

        if self.current_epoch() != epoch {
            return Err(SessionError::Superseded);
        }
        let answer = match answered {
            Ok(answer) => answer,
            Err(e) => {
                let err: SessionError = e.into();
                self.record_interaction_error(err.clone()).await;
                return Err(err);
            }
        };

        self.log.append(
            &session_id,
            InteractionPayload::QuestionAsked {
                term_id: None,
                question: question.to_string(),
                answer: Some(answer.clone()),
            },
        );
        self.state.write().await.interaction_error = None;
        Ok(Some(answer))
    }

    /// Send a user-proposed modification for review.
    ///
    /// On success the term stores the reviewed text and verdict and its
    /// confirmation flag resets, since the reviewed text has not been
    /// confirmed yet.
    pub async fn review_modification(
        &self,
        term_id: &str,
        proposed: &str,
        original: &str,
    ) -> bool {
        let Some(session_id) = self.active_session_with_term(term_id).await else {
            return false;
        };

        let epoch = self.current_epoch();
        let Some(_guard) = TermGuard::acquire(&self.reviewing, term_id, epoch) else {
            warn!(target: "shariaa::orchestrator", "A review is already in flight for term '{}'", term_id);
            return false;
        };

        let reviewed = self
            .client
            .review_modification(&session_id, term_id, proposed, original)
            .await;

        if self.current_epoch() != epoch {
            return false;
        }
        let outcome = match reviewed {
            Ok(outcome) => outcome,
            Err(e) => {
                self.record_interaction_error(e.into()).await;
                return false;
            }
        };

        let interaction = self.log.append(
            &session_id,
            InteractionPayload::TermModified {
                term_id: term_id.to_string(),
                action: ModificationAction::Reviewed,
                text: Some(outcome.reviewed_text.clone()),
            },
        );
        {
            let mut state = self.state.write().await;
            if let Some(term) = state.terms.iter_mut().find(|t| t.id == term_id) {
                term.user_modified_text = Some(outcome.reviewed_text.clone());
                term.reviewed_valid = Some(outcome.still_valid);
                term.review_issue = outcome.new_issue.clone();
                term.is_user_confirmed = false;
                term.interaction_count += 1;
                term.last_modified_at = Some(interaction.timestamp);
            }
            state.interaction_error = None;
        }
        self.persist_snapshot().await;
        self.notify_terms_changed().await;
        true
    }

    /// Confirm a term modification.
    pub async fn confirm_modification(&self, term_id: &str, text: &str) -> bool {
        let Some(session_id) = self.active_session_with_term(term_id).await else {
            return false;
        };

        let epoch = self.current_epoch();
        let Some(_guard) = TermGuard::acquire(&self.reviewing, term_id, epoch) else {
            warn!(target: "shariaa::orchestrator", "A review is already in flight for term '{}'", term_id);
            return false;
        };

        let confirmed = self
            .client
            .confirm_modification(&session_id, term_id, text)
            .await;

        if self.current_epoch() != epoch {
            return false;
        }
        if let Err(e) = confirmed {
            self.record_interaction_error(e.into()).await;
            return false;
        }

        let interaction = self.log.append(
            &session_id,
            InteractionPayload::TermModified {
                term_id: term_id.to_string(),
                action: ModificationAction::Confirmed,
                text: Some(text.to_string()),
            },
        );
        {
            let mut state = self.state.write().await;
            if let Some(term) = state.terms.iter_mut().find(|t| t.id == term_id) {
                term.is_user_confirmed = true;
                term.user_modified_text = Some(text.to_string());
                term.interaction_count += 1;
                term.last_modified_at = Some(interaction.timestamp);
            }
            state.interaction_error = None;
        }
        self.persist_snapshot().await;
        self.notify_terms_changed().await;
        true
    }

    /// Generate a contract document and return its URL.
    pub async fn generate_document(&self, variant: DocumentVariant) -> Result<String> {
        let Some(session_id) = self.session_id().await else {
            return Err(SessionError::NoActiveSession);
        };
        let epoch = self.current_epoch();

        let generated = match variant {
            DocumentVariant::Modified => {
                self.client.generate_modified_contract(&session_id).await
            }
            DocumentVariant::Marked => self.client.generate_marked_contract(&session_id).await,
        };

        if self.current_epoch() != epoch {
            return Err(SessionError::Superseded);
        }
        let document = match generated {
            Ok(document) => document,
            Err(e) => {
                let err: SessionError = e.into();
                self.record_interaction_error(err.clone()).await;
                return Err(err);
            }
        };

        self.log.append(
            &session_id,
            InteractionPayload::ContractGenerated {
                variant,
                url: document.url.clone(),
            },
        );
        {
            let mut state = self.state.write().await;
            if let Some(details) = state.details.as_mut() {
                match variant {
                    DocumentVariant::Modified => {
                        details.modified_contract_url = Some(document.url.clone())
                    }
                    DocumentVariant::Marked => {
                        details.marked_contract_url = Some(document.url.clone())
                    }
                }
            }
            state.interaction_error = None;
        }
        self.persist_snapshot().await;
        info!(target: "shariaa::orchestrator", "Generated {:?} document for '{}'", variant, session_id);
        Ok(document.url)
    }

    /// Submit expert feedback for a term.
    ///
    /// On success the term's verdict is overridden and the feedback is
    /// appended to its history.
    pub async fn submit_expert_feedback(
        &self,
        term_id: &str,
        verdict: bool,
        notes: Option<String>,
        expert_name: Option<String>,
    ) -> bool {
        let Some(session_id) = self.active_session_with_term(term_id).await else {
            return false;
        };
        let epoch = self.current_epoch();

        let request = ExpertFeedbackRequest {
            session_id: session_id.clone(),
            term_id: term_id.to_string(),
            verdict,
            notes: notes.clone(),
            expert_name: expert_name.clone(),
        };
        let submitted = self.client.submit_expert_feedback(&request).await;

        if self.current_epoch() != epoch {
            return false;
        }
        if let Err(e) = submitted {
            self.record_interaction_error(e.into()).await;
            return false;
        }

        self.log.append(
            &session_id,
            InteractionPayload::ExpertFeedback {
                term_id: term_id.to_string(),
                verdict,
                notes: notes.clone(),
            },
        );
        {
            let mut state = self.state.write().await;
            if let Some(term) = state.terms.iter_mut().find(|t| t.id == term_id) {
                term.expert_override = Some(verdict);
                term.expert_feedback
                    .push(ExpertFeedbackEntry::new(expert_name, verdict, notes));
                term.interaction_count += 1;
            }
            state.interaction_error = None;
        }
        self.persist_snapshot().await;
        self.notify_terms_changed().await;
        true
    }

    /// Fetch service-wide aggregate counters.
    ///
    /// A pure passthrough: needs no active session and touches no state.
    pub async fn service_stats(&self) -> Result<ServiceStats> {
        self.client.service_stats().await.map_err(Into::into)
    }

    // ====== Lifecycle ======

    /// Reset to `Idle`, clearing all in-memory state, busy flags, and the
    /// persisted active-session keys. Safe to call at any time.
    pub async fn clear_session(&self) {
        self.bump_epoch();
        {
            let mut state = self.state.write().await;
            *state = ActiveState::default();
        }
        self.progress.store(0, Ordering::Relaxed);
        self.term_processing.clear();
        self.reviewing.clear();

        for key in [SESSION_ID_KEY, TERMS_KEY, DETAILS_KEY] {
            if let Err(e) = self.store.delete(key) {
                warn!(target: "shariaa::orchestrator", "Failed to delete '{}': {}", key, e);
            }
        }

        let _ = self.events.send(SessionEvent::SessionCleared);
        debug!(target: "shariaa::orchestrator", "Session state cleared");
    }

    /// Restore a persisted session after a restart.
    ///
    /// Requires both the session id and the term snapshot; details are
    /// restored only when also present. Returns whether a session was
    /// restored.
    pub async fn restore(&self) -> bool {
        let session_id = match self.store.get(SESSION_ID_KEY) {
            Ok(Some(id)) => id,
            Ok(None) => return false,
            Err(e) => {
                warn!(target: "shariaa::orchestrator", "Failed to read persisted session id: {}", e);
                return false;
            }
        };
        let snapshots = match self.store.get_json::<Vec<TermSnapshot>>(TERMS_KEY) {
            Ok(Some(snapshots)) => snapshots,
            Ok(None) => {
                debug!(
                    target: "shariaa::orchestrator",
                    "Persisted session '{}' has no term snapshot, not restoring", session_id
                );
                return false;
            }
            Err(e) => {
                warn!(target: "shariaa::orchestrator", "Failed to read persisted terms: {}", e);
                return false;
            }
        };
        let details = match self.store.get_json::<SessionDetail>(DETAILS_KEY) {
            Ok(details) => details,
            Err(e) => {
                warn!(target: "shariaa::orchestrator", "Failed to read persisted details: {}", e);
                None
            }
        };

        let mut terms: Vec<AnalysisTerm> =
            snapshots.into_iter().map(TermSnapshot::restore).collect();
        for term in &mut terms {
            term.interaction_count =
                self.log.for_session_and_term(&session_id, &term.id).len() as u32;
            term.last_modified_at = self.log.last_modified_at(&session_id, &term.id);
        }

        let term_count = terms.len();
        {
            let mut state = self.state.write().await;
            state.session_id = Some(session_id.clone());
            state.terms = terms;
            state.details = details;
        }
        self.set_phase(SessionPhase::Ready).await;

        info!(
            target: "shariaa::orchestrator",
            "Restored session '{}' with {} terms", session_id, term_count
        );
        self.notify_terms_changed().await;
        true
    }

    /// Drop a session from the local history along with its logged
    /// interactions. The active session is untouched.
    pub fn remove_local_session(&self, session_id: &str) {
        self.repository.remove(session_id);
        self.log.purge(session_id);
        debug!(
            target: "shariaa::orchestrator",
            "Removed session '{}' from local history", session_id
        );
    }

    // ====== Internals ======

    /// Active session id, provided the given term is part of it.
    async fn active_session_with_term(&self, term_id: &str) -> Option<String> {
        let state = self.state.read().await;
        let session_id = match &state.session_id {
            Some(id) => id.clone(),
            None => {
                debug!(target: "shariaa::orchestrator", "No active session");
                return None;
            }
        };
        if !state.terms.iter().any(|t| t.id == term_id) {
            debug!(target: "shariaa::orchestrator", "Term '{}' is not in the active session", term_id);
            return None;
        }
        Some(session_id)
    }

    /// Cache the active session into the local repository.
    async fn save_session_record(&self, session_id: &str) {
        let record = {
            let state = self.state.read().await;
            let Some(details) = &state.details else { return };
            let count = self.log.for_session(session_id).len() as u32;
            SessionRecord::from_detail(details, &state.terms, count)
        };
        self.repository.upsert(record);
    }

    /// Record a local validation failure without starting an upload.
    async fn reject_upload(&self, err: SessionError) -> SessionError {
        debug!(target: "shariaa::orchestrator", "Rejected upload: {}", err);
        self.state.write().await.upload_error = Some(err.clone());
        err
    }

    async fn fail_upload(&self, err: SessionError) {
        {
            let mut state = self.state.write().await;
            state.phase = SessionPhase::Error;
            state.upload_error = Some(err.clone());
            state.analysis_error = Some(err);
        }
        let _ = self.events.send(SessionEvent::PhaseChanged(SessionPhase::Error));
    }

    async fn record_interaction_error(&self, err: SessionError) {
        warn!(target: "shariaa::orchestrator", "Interaction failed: {}", err);
        self.state.write().await.interaction_error = Some(err);
    }

    async fn set_phase(&self, phase: SessionPhase) {
        {
            let mut state = self.state.write().await;
            if state.phase == phase {
                return;
            }
            state.phase = phase;
        }
        let _ = self.events.send(SessionEvent::PhaseChanged(phase));
    }

    fn set_progress(&self, value: u8) {
        self.progress.store(value, Ordering::Relaxed);
        let _ = self.events.send(SessionEvent::UploadProgress(value));
    }

    async fn notify_terms_changed(&self) {
        let stats = self.stats().await;
        let _ = self.events.send(SessionEvent::TermsUpdated);
        let _ = self.events.send(SessionEvent::StatsUpdated(stats));
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Drive synthetic upload progress until the returned sender fires.
    ///
    /// The transport gives no usable progress signal, so progress climbs
    /// by bounded random steps and parks at the ceiling until the upload
    /// resolves. Ticks stop as soon as the owning epoch is superseded, so
    /// a cleared session never sees a stale tick. Await the handle after
    /// stopping to ensure no tick lands after the final progress value.
    fn spawn_progress_ticker(&self, epoch: u64) -> (oneshot::Sender<()>, JoinHandle<()>) {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let progress = Arc::clone(&self.progress);
        let epoch_counter = Arc::clone(&self.epoch);
        let events = self.events.clone();
        let tick = self.config.progress_tick;
        let (step_min, step_max) = (self.config.progress_step_min, self.config.progress_step_max);
        let ceiling = self.config.progress_ceiling;

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = tokio::time::sleep(tick) => {
                        if epoch_counter.load(Ordering::SeqCst) != epoch {
                            break;
                        }
                        let step = rand::thread_rng().gen_range(step_min..=step_max);
                        let current = progress.load(Ordering::Relaxed);
                        let next = current.saturating_add(step).min(ceiling);
                        if next != current {
                            progress.store(next, Ordering::Relaxed);
                            let _ = events.send(SessionEvent::UploadProgress(next));
                        }
                    }
                }
            }
        });

        (stop_tx, handle)
    }

    /// Persist the active session under its three keys.
    ///
    /// Each projection degrades independently through full, minimal, and
    /// omitted tiers as it crosses the size limit; the worst tier chosen
    /// becomes observable. Failures are logged, never surfaced.
    async fn persist_snapshot(&self) {
        let (session_id, terms, details) = {
            let state = self.state.read().await;
            match &state.session_id {
                Some(id) => (id.clone(), state.terms.clone(), state.details.clone()),
                None => return,
            }
        };

        if let Err(e) = self.store.put(SESSION_ID_KEY, &session_id) {
            warn!(target: "shariaa::orchestrator", "Failed to persist session id: {}", e);
        }

        let essential: Vec<TermSnapshot> = terms.iter().map(|t| t.essential()).collect();
        let minimal: Vec<TermSnapshot> = terms.iter().map(|t| t.minimal()).collect();
        let mut tier = self.write_tiered(TERMS_KEY, &essential, &minimal);

        if let Some(details) = details {
            tier = tier.max(self.write_tiered(DETAILS_KEY, &details, &details.minimal()));
        }

        self.state.write().await.last_snapshot_tier = Some(tier);
    }

    /// Write one snapshot projection at the largest tier that fits.
    fn write_tiered<T: Serialize>(&self, key: &str, full: &T, minimal: &T) -> StorageTier {
        let limit = self.config.snapshot_size_limit;

        let chosen = match serde_json::to_string(full) {
            Ok(json) if json.len() < limit => Some((StorageTier::Full, json)),
            Ok(_) => match serde_json::to_string(minimal) {
                Ok(json) if json.len() < limit => Some((StorageTier::Minimal, json)),
                Ok(json) => {
                    warn!(
                        target: "shariaa::orchestrator",
                        "Skipping snapshot of '{}': minimal projection is {} bytes, limit is {}",
                        key, json.len(), limit
                    );
                    None
                }
                Err(e) => {
                    warn!(target: "shariaa::orchestrator", "Failed to serialize '{}': {}", key, e);
                    None
                }
            },
            Err(e) => {
                warn!(target: "shariaa::orchestrator", "Failed to serialize '{}': {}", key, e);
                None
            }
        };

        match chosen {
            Some((tier, json)) => {
                if let Err(e) = self.store.put(key, &json) {
                    warn!(target: "shariaa::orchestrator", "Failed to persist '{}': {}", key, e);
                }
                tier
            }
            None => StorageTier::Omitted,
        }
    }
}
