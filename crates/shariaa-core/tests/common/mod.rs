//! Common test utilities for the session core integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use shariaa_core::{
    AnalysisClient, ApiError, ApiResult, ChunkedStore, MemoryStore, OrchestratorConfig,
    SessionOrchestrator,
};
use shariaa_types::{
    AnalysisTerm, ContractFile, ExpertFeedbackRequest, GeneratedDocument, ReviewOutcome,
    ServiceStats, SessionDetail, UploadAck,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Session id the mock service issues on upload.
pub const SESSION_ID: &str = "sess-1";

/// Arguments captured from the most recent question call.
#[derive(Debug, Clone)]
pub struct QuestionArgs {
    pub question: String,
    pub term_id: Option<String>,
    pub term_text: Option<String>,
}

/// Scripted stand-in for the remote analysis service.
///
/// Every operation returns canned data; individual operations can be
/// failed or delayed per test through the setters. Call counters let
/// tests assert that local rejections never reach the service.
pub struct MockClient {
    terms: Mutex<Vec<AnalysisTerm>>,
    review_outcome: Mutex<ReviewOutcome>,
    fail_upload: Mutex<Option<ApiError>>,
    fail_details: Mutex<Option<ApiError>>,
    fail_terms: Mutex<Option<ApiError>>,
    fail_question: Mutex<Option<ApiError>>,
    fail_review: Mutex<Option<ApiError>>,
    fail_feedback: Mutex<Option<ApiError>>,
    upload_delay: Mutex<Option<Duration>>,
    question_delay: Mutex<Option<Duration>>,
    review_delay: Mutex<Option<Duration>>,
    pub upload_calls: AtomicUsize,
    pub question_calls: AtomicUsize,
    pub review_calls: AtomicUsize,
    pub confirm_calls: AtomicUsize,
    pub feedback_calls: AtomicUsize,
    pub last_question: Mutex<Option<QuestionArgs>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            terms: Mutex::new(vec![term("t1", true), term("t2", false)]),
            review_outcome: Mutex::new(ReviewOutcome {
                reviewed_text: "Reviewed clause text.".to_string(),
                still_valid: true,
                new_issue: None,
            }),
            fail_upload: Mutex::new(None),
            fail_details: Mutex::new(None),
            fail_terms: Mutex::new(None),
            fail_question: Mutex::new(None),
            fail_review: Mutex::new(None),
            fail_feedback: Mutex::new(None),
            upload_delay: Mutex::new(None),
            question_delay: Mutex::new(None),
            review_delay: Mutex::new(None),
            upload_calls: AtomicUsize::new(0),
            question_calls: AtomicUsize::new(0),
            review_calls: AtomicUsize::new(0),
            confirm_calls: AtomicUsize::new(0),
            feedback_calls: AtomicUsize::new(0),
            last_question: Mutex::new(None),
        }
    }

    pub fn with_terms(terms: Vec<AnalysisTerm>) -> Self {
        let client = Self::new();
        *client.terms.lock().unwrap() = terms;
        client
    }

    pub fn set_review_outcome(&self, outcome: ReviewOutcome) {
        *self.review_outcome.lock().unwrap() = outcome;
    }

    pub fn fail_upload_with(&self, e: ApiError) {
        *self.fail_upload.lock().unwrap() = Some(e);
    }

    pub fn fail_details_with(&self, e: ApiError) {
        *self.fail_details.lock().unwrap() = Some(e);
    }

    pub fn fail_terms_with(&self, e: ApiError) {
        *self.fail_terms.lock().unwrap() = Some(e);
    }

    pub fn fail_question_with(&self, e: ApiError) {
        *self.fail_question.lock().unwrap() = Some(e);
    }

    pub fn fail_review_with(&self, e: ApiError) {
        *self.fail_review.lock().unwrap() = Some(e);
    }

    pub fn fail_feedback_with(&self, e: ApiError) {
        *self.fail_feedback.lock().unwrap() = Some(e);
    }

    /// Reset every scripted failure back to success.
    pub fn clear_failures(&self) {
        for slot in [
            &self.fail_upload,
            &self.fail_details,
            &self.fail_terms,
            &self.fail_question,
            &self.fail_review,
            &self.fail_feedback,
        ] {
            *slot.lock().unwrap() = None;
        }
    }

    pub fn delay_uploads(&self, delay: Duration) {
        *self.upload_delay.lock().unwrap() = Some(delay);
    }

    pub fn delay_questions(&self, delay: Duration) {
        *self.question_delay.lock().unwrap() = Some(delay);
    }

    pub fn delay_reviews(&self, delay: Duration) {
        *self.review_delay.lock().unwrap() = Some(delay);
    }

    fn scripted_failure(&self, slot: &Mutex<Option<ApiError>>) -> Option<ApiError> {
        slot.lock().unwrap().clone()
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisClient for MockClient {
    async fn upload_contract(&self, _file: &ContractFile) -> ApiResult<UploadAck> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.upload_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.scripted_failure(&self.fail_upload) {
            return Err(e);
        }
        Ok(UploadAck {
            session_id: SESSION_ID.to_string(),
        })
    }

    async fn session_details(&self, session_id: &str) -> ApiResult<SessionDetail> {
        if let Some(e) = self.scripted_failure(&self.fail_details) {
            return Err(e);
        }
        Ok(detail(session_id))
    }

    async fn session_terms(&self, _session_id: &str) -> ApiResult<Vec<AnalysisTerm>> {
        if let Some(e) = self.scripted_failure(&self.fail_terms) {
            return Err(e);
        }
        Ok(self.terms.lock().unwrap().clone())
    }

    async fn ask_question(
        &self,
        _session_id: &str,
        question: &str,
        term_id: Option<&str>,
        term_text: Option<&str>,
    ) -> ApiResult<String> {
        self.question_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_question.lock().unwrap() = Some(QuestionArgs {
            question: question.to_string(),
            term_id: term_id.map(str::to_string),
            term_text: term_text.map(str::to_string),
        });
        let delay = *self.question_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.scripted_failure(&self.fail_question) {
            return Err(e);
        }
        Ok("The clause is compliant.".to_string())
    }

    async fn review_modification(
        &self,
        _session_id: &str,
        _term_id: &str,
        _proposed: &str,
        _original: &str,
    ) -> ApiResult<ReviewOutcome> {
        self.review_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.review_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.scripted_failure(&self.fail_review) {
            return Err(e);
        }
        Ok(self.review_outcome.lock().unwrap().clone())
    }

    async fn confirm_modification(
        &self,
        _session_id: &str,
        _term_id: &str,
        _text: &str,
    ) -> ApiResult<()> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn generate_modified_contract(&self, session_id: &str) -> ApiResult<GeneratedDocument> {
        Ok(GeneratedDocument {
            url: format!("https://files.example/{session_id}/modified.pdf"),
        })
    }

    async fn generate_marked_contract(&self, session_id: &str) -> ApiResult<GeneratedDocument> {
        Ok(GeneratedDocument {
            url: format!("https://files.example/{session_id}/marked.pdf"),
        })
    }

    async fn submit_expert_feedback(&self, _request: &ExpertFeedbackRequest) -> ApiResult<()> {
        self.feedback_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.scripted_failure(&self.fail_feedback) {
            return Err(e);
        }
        Ok(())
    }

    async fn service_stats(&self) -> ApiResult<ServiceStats> {
        Ok(ServiceStats {
            total_sessions: 5,
            total_terms: 100,
            compliant_terms: 80,
            non_compliant_terms: 20,
        })
    }
}

/// Analysis term with canned clause text.
pub fn term(id: &str, is_valid: bool) -> AnalysisTerm {
    AnalysisTerm::new(id, format!("Clause {id} body."), is_valid)
}

/// Remote session details for the canned session.
pub fn detail(session_id: &str) -> SessionDetail {
    SessionDetail {
        id: session_id.to_string(),
        file_name: "contract.pdf".to_string(),
        analyzed_at: Utc::now(),
        compliance_percentage: 50.0,
        detected_language: Some("ar".to_string()),
        original_format: Some("pdf".to_string()),
        summary: Some("Two clauses, one non-compliant.".to_string()),
        modified_contract_url: None,
        marked_contract_url: None,
    }
}

/// Contract file that passes upload validation.
pub fn pdf_file(name: &str) -> ContractFile {
    ContractFile::new(name, b"%PDF-1.4 sample".to_vec())
}

/// Chunked store over a capacity-bounded in-memory primitive.
pub fn bounded_store() -> ChunkedStore {
    ChunkedStore::new(Arc::new(MemoryStore::with_capacity(2000)))
}

/// Orchestrator config with short progress ticks for fast tests.
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        progress_tick: Duration::from_millis(5),
        ..OrchestratorConfig::default()
    }
}

/// Orchestrator over a caller-provided store.
pub fn orchestrator_over(client: Arc<MockClient>, store: ChunkedStore) -> SessionOrchestrator {
    SessionOrchestrator::with_config(client, store, fast_config())
}

/// Orchestrator over a fresh bounded store.
pub fn orchestrator(client: Arc<MockClient>) -> SessionOrchestrator {
    orchestrator_over(client, bounded_store())
}
