//! Compliance statistics derived from a term list.

use crate::term::AnalysisTerm;
use serde::{Deserialize, Serialize};

/// Aggregate compliance figures for the active session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceStats {
    /// Number of analyzed terms.
    pub total_terms: u32,
    /// Terms whose effective verdict is compliant.
    pub compliant_terms: u32,
    /// Terms whose effective verdict is non-compliant.
    pub non_compliant_terms: u32,
    /// Compliant share of all terms (0-100).
    pub compliance_percentage: f64,
    /// Terms carrying an expert override.
    pub expert_reviewed_terms: u32,
    /// Terms with a user-confirmed modification.
    pub user_modified_terms: u32,
}

impl ComplianceStats {
    /// Fold a term list into aggregate figures.
    ///
    /// Verdicts are taken through [`AnalysisTerm::effective_verdict`], so
    /// expert overrides and confirmed modifications are already applied.
    /// An empty list yields all zeros.
    pub fn from_terms(terms: &[AnalysisTerm]) -> Self {
        if terms.is_empty() {
            return Self::default();
        }

        let total_terms = terms.len() as u32;
        let compliant_terms = terms.iter().filter(|t| t.effective_verdict()).count() as u32;
        let expert_reviewed_terms = terms.iter().filter(|t| t.is_expert_reviewed()).count() as u32;
        let user_modified_terms = terms.iter().filter(|t| t.is_user_confirmed).count() as u32;

        Self {
            total_terms,
            compliant_terms,
            non_compliant_terms: total_terms - compliant_terms,
            compliance_percentage: f64::from(compliant_terms) * 100.0 / f64::from(total_terms),
            expert_reviewed_terms,
            user_modified_terms,
        }
    }
}
