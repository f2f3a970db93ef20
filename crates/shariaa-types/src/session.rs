//! Session records, remote session details, and lifecycle state.

use crate::stats::ComplianceStats;
use crate::term::{AnalysisTerm, TermSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of the active review session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session loaded.
    Idle,
    /// A contract upload is in flight.
    Uploading,
    /// Upload accepted, analysis results are being fetched.
    Analyzing,
    /// Terms are loaded and the review loop is open.
    Ready,
    /// Upload or analysis failed.
    Error,
}

impl Default for SessionPhase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Projection tier chosen when persisting session state.
///
/// Ordered by degradation, so the worst tier across several writes is
/// their maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    /// Every allow-listed field was written.
    Full,
    /// Oversized payload, reduced field subset written.
    Minimal,
    /// Payload too large even reduced, nothing written.
    Omitted,
}

/// Locally cached summary of an analyzed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Server-issued session identifier.
    pub id: String,
    /// Name of the uploaded contract file.
    pub file_name: String,
    /// When the analysis completed.
    pub analyzed_at: DateTime<Utc>,
    /// Effective compliance percentage at the time of caching (0-100).
    pub compliance_percentage: f64,
    /// Language detected in the contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    /// Format of the uploaded file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_format: Option<String>,
    /// Total interactions logged against the session.
    #[serde(default)]
    pub interaction_count: u32,
    /// User bookmark flag.
    #[serde(default)]
    pub bookmarked: bool,
    /// Verdict-relevant subset of the analyzed terms.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub terms: Vec<TermSummary>,
}

impl SessionRecord {
    /// Build a record from remote details plus the current term state.
    ///
    /// The cached percentage reflects local overrides: it is recomputed
    /// from the terms when any are present, falling back to the service
    /// figure for term-less sessions.
    pub fn from_detail(
        detail: &SessionDetail,
        terms: &[AnalysisTerm],
        interaction_count: u32,
    ) -> Self {
        let compliance_percentage = if terms.is_empty() {
            detail.compliance_percentage
        } else {
            ComplianceStats::from_terms(terms).compliance_percentage
        };

        Self {
            id: detail.id.clone(),
            file_name: detail.file_name.clone(),
            analyzed_at: detail.analyzed_at,
            compliance_percentage,
            detected_language: detail.detected_language.clone(),
            original_format: detail.original_format.clone(),
            interaction_count,
            bookmarked: false,
            terms: terms.iter().map(TermSummary::from).collect(),
        }
    }

    /// Reduced projection kept when the full session list grows too large.
    pub fn minimal(&self) -> SessionRecord {
        SessionRecord {
            id: self.id.clone(),
            file_name: self.file_name.clone(),
            analyzed_at: self.analyzed_at,
            compliance_percentage: self.compliance_percentage,
            detected_language: None,
            original_format: None,
            interaction_count: self.interaction_count,
            bookmarked: self.bookmarked,
            terms: Vec::new(),
        }
    }
}

/// Remote metadata for the active session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetail {
    /// Server-issued session identifier.
    pub id: String,
    /// Name of the uploaded contract file.
    #[serde(default)]
    pub file_name: String,
    /// When the analysis completed.
    pub analyzed_at: DateTime<Utc>,
    /// Compliance percentage reported by the service (0-100).
    #[serde(default)]
    pub compliance_percentage: f64,
    /// Language detected in the contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    /// Format of the uploaded file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_format: Option<String>,
    /// Analysis summary text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// URL of the generated modified contract, once produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_contract_url: Option<String>,
    /// URL of the generated marked contract, once produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marked_contract_url: Option<String>,
}

impl SessionDetail {
    /// Reduced projection used when the full form is too large to store.
    /// Drops the summary text, which carries almost all of the bulk.
    pub fn minimal(&self) -> SessionDetail {
        SessionDetail {
            summary: None,
            ..self.clone()
        }
    }
}
