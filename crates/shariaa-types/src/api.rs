//! Request and response payloads exchanged with the analysis service.

use serde::{Deserialize, Serialize};

/// Acknowledgement returned by a contract upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadAck {
    /// Identifier of the session created for the uploaded contract.
    pub session_id: String,
}

/// Outcome of reviewing a user-proposed term modification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutcome {
    /// The modification text after the service's review pass.
    pub reviewed_text: String,
    /// Whether the modification keeps the term compliant.
    pub still_valid: bool,
    /// Issue the review raised against the modification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_issue: Option<String>,
}

/// A generated contract document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedDocument {
    /// Where the generated document can be fetched.
    pub url: String,
}

/// Expert feedback submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertFeedbackRequest {
    /// Session the reviewed term belongs to.
    pub session_id: String,
    /// Term the feedback applies to.
    pub term_id: String,
    /// The expert's verdict for the term.
    pub verdict: bool,
    /// Free-form notes accompanying the verdict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Name of the reviewing expert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_name: Option<String>,
}

/// Service-wide aggregate counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    #[serde(default)]
    pub total_sessions: u64,
    #[serde(default)]
    pub total_terms: u64,
    #[serde(default)]
    pub compliant_terms: u64,
    #[serde(default)]
    pub non_compliant_terms: u64,
}
