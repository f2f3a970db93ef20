//! Async interface to the remote analysis service.
//!
//! The core never speaks a wire protocol itself; hosts supply an
//! [`AnalysisClient`] implementation and the orchestrator drives it.

use crate::error::ApiError;
use async_trait::async_trait;
use shariaa_types::{
    AnalysisTerm, ContractFile, ExpertFeedbackRequest, GeneratedDocument, ReviewOutcome,
    ServiceStats, SessionDetail, UploadAck,
};

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Operations the analysis service exposes to the client core.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Upload a contract for analysis, returning the created session.
    async fn upload_contract(&self, file: &ContractFile) -> ApiResult<UploadAck>;

    /// Fetch metadata for an analyzed session.
    async fn session_details(&self, session_id: &str) -> ApiResult<SessionDetail>;

    /// Fetch the analyzed terms of a session.
    async fn session_terms(&self, session_id: &str) -> ApiResult<Vec<AnalysisTerm>>;

    /// Ask a question, optionally scoped to a term and its clause text.
    async fn ask_question(
        &self,
        session_id: &str,
        question: &str,
        term_id: Option<&str>,
        term_text: Option<&str>,
    ) -> ApiResult<String>;

    /// Have the service review a user-proposed term modification.
    async fn review_modification(
        &self,
        session_id: &str,
        term_id: &str,
        proposed: &str,
        original: &str,
    ) -> ApiResult<ReviewOutcome>;

    /// Confirm a term modification.
    async fn confirm_modification(
        &self,
        session_id: &str,
        term_id: &str,
        text: &str,
    ) -> ApiResult<()>;

    /// Generate the contract with non-compliant clauses rewritten.
    async fn generate_modified_contract(&self, session_id: &str) -> ApiResult<GeneratedDocument>;

    /// Generate the contract with non-compliant clauses marked.
    async fn generate_marked_contract(&self, session_id: &str) -> ApiResult<GeneratedDocument>;

    /// Submit expert feedback for a term.
    async fn submit_expert_feedback(&self, request: &ExpertFeedbackRequest) -> ApiResult<()>;

    /// Fetch service-wide aggregate counters.
    async fn service_stats(&self) -> ApiResult<ServiceStats>;
}
