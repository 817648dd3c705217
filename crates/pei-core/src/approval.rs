//! Human approval of AI drafts.
//!
//! Drafted field text never lands in the form directly. It is staged here
//! and only written once the user approves it, possibly after editing.
//!
//! ```text
//!   Idle ──stage──► Pending ──approve──► Idle   (form updated)
//!                     │  ▲
//!                     │  └── edit
//!                     └──reject──► Idle          (form untouched)
//! ```
//!
//! Staging while a draft is pending replaces the older draft.

use tracing::{debug, info};

use crate::form::FormState;

/// Header placed between existing text and appended approved suggestions.
pub const APPROVED_SUGGESTIONS_HEADER: &str = "--- Sugestões Aprovadas ---";

/// A drafted value waiting for approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionDraft {
    pub field_id: String,
    pub label: String,
    pub content: String,
    /// Append below the current value instead of replacing it.
    pub is_appending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    #[error("não há sugestão pendente de aprovação")]
    NoPendingDraft,
}

/// The approval state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ApprovalGate {
    #[default]
    Idle,
    Pending(SuggestionDraft),
}

impl ApprovalGate {
    pub fn pending(&self) -> Option<&SuggestionDraft> {
        match self {
            Self::Idle => None,
            Self::Pending(draft) => Some(draft),
        }
    }

    /// Stage a draft. Returns the draft it replaced, if any.
    pub fn stage(&mut self, draft: SuggestionDraft) -> Option<SuggestionDraft> {
        debug!(field_id = %draft.field_id, appending = draft.is_appending, "staging draft");
        match std::mem::replace(self, Self::Pending(draft)) {
            Self::Idle => None,
            Self::Pending(old) => {
                info!(field_id = %old.field_id, "pending draft replaced by a newer one");
                Some(old)
            }
        }
    }

    /// Replace the pending draft's content with user-edited text.
    pub fn edit(&mut self, content: impl Into<String>) -> Result<(), ApprovalError> {
        match self {
            Self::Idle => Err(ApprovalError::NoPendingDraft),
            Self::Pending(draft) => {
                draft.content = content.into();
                Ok(())
            }
        }
    }

    /// Write the pending draft into `form`, flag the field as AI-generated
    /// and return to idle. Returns the field that was updated.
    pub fn approve(&mut self, form: &mut FormState) -> Result<String, ApprovalError> {
        let Self::Pending(draft) = std::mem::take(self) else {
            return Err(ApprovalError::NoPendingDraft);
        };

        let value = if draft.is_appending {
            let existing = form.get(&draft.field_id);
            format!(
                "{existing}\n\n{APPROVED_SUGGESTIONS_HEADER}\n{}",
                draft.content
            )
            .trim()
            .to_string()
        } else {
            draft.content
        };

        form.commit_ai(&draft.field_id, value);
        info!(field_id = %draft.field_id, "draft approved");
        Ok(draft.field_id)
    }

    /// Discard the pending draft, leaving the form untouched.
    pub fn reject(&mut self) -> Option<SuggestionDraft> {
        match std::mem::take(self) {
            Self::Idle => None,
            Self::Pending(draft) => {
                info!(field_id = %draft.field_id, "draft rejected");
                Some(draft)
            }
        }
    }
}
