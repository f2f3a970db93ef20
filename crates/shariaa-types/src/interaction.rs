//! Interaction log records.
//!
//! Every user-visible action against a session is recorded as an immutable
//! `Interaction` whose payload is a union tagged by interaction kind.

use crate::file::DocumentVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a logged interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// A question answered by the service (also marks uploads).
    QuestionAsked,
    /// A term was modified, reviewed, or confirmed.
    TermModified,
    /// A contract document was generated.
    ContractGenerated,
    /// An expert submitted feedback on a term.
    ExpertFeedback,
}

/// What happened to a term in a `term_modified` interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationAction {
    /// The service reviewed a proposed modification.
    Reviewed,
    /// The user confirmed a modification.
    Confirmed,
}

/// Payload of an interaction, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionPayload {
    QuestionAsked {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        term_id: Option<String>,
        question: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<String>,
    },
    TermModified {
        term_id: String,
        action: ModificationAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    ContractGenerated {
        variant: DocumentVariant,
        url: String,
    },
    ExpertFeedback {
        term_id: String,
        verdict: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
}

impl InteractionPayload {
    /// Kind tag of this payload.
    pub fn kind(&self) -> InteractionKind {
        match self {
            Self::QuestionAsked { .. } => InteractionKind::QuestionAsked,
            Self::TermModified { .. } => InteractionKind::TermModified,
            Self::ContractGenerated { .. } => InteractionKind::ContractGenerated,
            Self::ExpertFeedback { .. } => InteractionKind::ExpertFeedback,
        }
    }

    /// Term this payload is scoped to, when any.
    pub fn term_id(&self) -> Option<&str> {
        match self {
            Self::QuestionAsked { term_id, .. } => term_id.as_deref(),
            Self::TermModified { term_id, .. } => Some(term_id),
            Self::ContractGenerated { .. } => None,
            Self::ExpertFeedback { term_id, .. } => Some(term_id),
        }
    }
}

/// A single entry in the interaction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// Locally generated identifier.
    pub id: Uuid,
    /// Session the interaction belongs to.
    pub session_id: String,
    /// When the interaction was recorded (UTC).
    pub timestamp: DateTime<Utc>,
    /// Kind-tagged payload.
    pub payload: InteractionPayload,
}

impl Interaction {
    /// Stamp a payload with a fresh id, the owning session, and the current time.
    pub fn new(session_id: impl Into<String>, payload: InteractionPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Kind tag of the payload.
    pub fn kind(&self) -> InteractionKind {
        self.payload.kind()
    }

    /// Term this interaction is scoped to, when any.
    pub fn term_id(&self) -> Option<&str> {
        self.payload.term_id()
    }
}
