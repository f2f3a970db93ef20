//! Analyzed contract terms and verdict precedence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single analyzed clause from an uploaded contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTerm {
    /// Server-issued term identifier.
    pub id: String,
    /// Clause text as extracted from the contract.
    pub text: String,
    /// Original compliance verdict from the analysis service.
    pub is_valid: bool,
    /// Issue description for a non-compliant clause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    /// Suggested compliant rewording from the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Whether the user confirmed a modification of this clause.
    #[serde(default)]
    pub is_user_confirmed: bool,
    /// Modified clause text supplied by the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_modified_text: Option<String>,
    /// Validity of the user's modification, as judged by the review endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_valid: Option<bool>,
    /// Issue raised against the user's modification during review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_issue: Option<String>,
    /// Cached answer to the most recent question about this clause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_answer: Option<String>,
    /// Overriding verdict from an expert reviewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_override: Option<bool>,
    /// Expert feedback history, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expert_feedback: Vec<ExpertFeedbackEntry>,
    /// Number of logged interactions that touched this term.
    #[serde(default)]
    pub interaction_count: u32,
    /// Timestamp of the most recent modification of this term.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl AnalysisTerm {
    /// Create a term with the fields the analysis service always returns.
    pub fn new(id: impl Into<String>, text: impl Into<String>, is_valid: bool) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            is_valid,
            issue: None,
            suggestion: None,
            is_user_confirmed: false,
            user_modified_text: None,
            reviewed_valid: None,
            review_issue: None,
            last_answer: None,
            expert_override: None,
            expert_feedback: Vec::new(),
            interaction_count: 0,
            last_modified_at: None,
        }
    }

    /// Compliance verdict after overrides are applied.
    ///
    /// Precedence: an expert override wins outright; otherwise a confirmed
    /// user modification counts with its reviewed validity (optimistically
    /// compliant when the review never ran); otherwise the original verdict.
    pub fn effective_verdict(&self) -> bool {
        if let Some(verdict) = self.expert_override {
            return verdict;
        }
        if self.is_user_confirmed {
            return self.reviewed_valid.unwrap_or(true);
        }
        self.is_valid
    }

    /// Whether an expert has reviewed this term.
    pub fn is_expert_reviewed(&self) -> bool {
        self.expert_override.is_some()
    }

    /// Projection persisted for restart recovery.
    pub fn essential(&self) -> TermSnapshot {
        TermSnapshot {
            id: self.id.clone(),
            text: Some(self.text.clone()),
            is_valid: self.is_valid,
            issue: self.issue.clone(),
            is_user_confirmed: self.is_user_confirmed,
            user_modified_text: self.user_modified_text.clone(),
            reviewed_valid: self.reviewed_valid,
            expert_override: self.expert_override,
        }
    }

    /// Reduced projection used when the essential form is too large to store.
    pub fn minimal(&self) -> TermSnapshot {
        TermSnapshot {
            id: self.id.clone(),
            text: None,
            is_valid: self.is_valid,
            issue: None,
            is_user_confirmed: self.is_user_confirmed,
            user_modified_text: None,
            reviewed_valid: self.reviewed_valid,
            expert_override: self.expert_override,
        }
    }
}

/// One round of expert feedback on a term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertFeedbackEntry {
    /// Name of the reviewing expert, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_name: Option<String>,
    /// The expert's verdict for the term.
    pub verdict: bool,
    /// Free-form notes accompanying the verdict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// When the feedback was submitted.
    pub submitted_at: DateTime<Utc>,
}

impl ExpertFeedbackEntry {
    /// Create an entry stamped with the current time.
    pub fn new(expert_name: Option<String>, verdict: bool, notes: Option<String>) -> Self {
        Self {
            expert_name,
            verdict,
            notes,
            submitted_at: Utc::now(),
        }
    }
}

/// Verdict-relevant subset of a term, cached inside a session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermSummary {
    pub id: String,
    pub is_valid: bool,
    #[serde(default)]
    pub is_user_confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_override: Option<bool>,
}

impl From<&AnalysisTerm> for TermSummary {
    fn from(term: &AnalysisTerm) -> Self {
        Self {
            id: term.id.clone(),
            is_valid: term.is_valid,
            is_user_confirmed: term.is_user_confirmed,
            expert_override: term.expert_override,
        }
    }
}

/// Term fields persisted in the active-session snapshot.
///
/// The essential form keeps enough text to rebuild the review screen after
/// a restart; the minimal form keeps only what the verdict math needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermSnapshot {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(default)]
    pub is_user_confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_modified_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_override: Option<bool>,
}

impl TermSnapshot {
    /// Rebuild an in-memory term from a persisted snapshot.
    pub fn restore(self) -> AnalysisTerm {
        AnalysisTerm {
            id: self.id,
            text: self.text.unwrap_or_default(),
            is_valid: self.is_valid,
            issue: self.issue,
            suggestion: None,
            is_user_confirmed: self.is_user_confirmed,
            user_modified_text: self.user_modified_text,
            reviewed_valid: self.reviewed_valid,
            review_issue: None,
            last_answer: None,
            expert_override: self.expert_override,
            expert_feedback: Vec::new(),
            interaction_count: 0,
            last_modified_at: None,
        }
    }
}
