use std::fmt;
use std::str::FromStr;

use pei_db::models::{NewActivity, SmartCritique};
use uuid::Uuid;

use crate::ai::ServiceError;
use crate::approval::{ApprovalError, SuggestionDraft};
use crate::catalog::{self, ACTIVITIES_FIELD, ADAPTATIONS_FIELD, DUA_FIELD, NEEDS_FIELD};
use crate::form::ValidationError;
use crate::response::MalformedResponseError;

/// AI actions offered on individual form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Draft the whole field.
    Fill,
    /// Append a list of specific needs.
    SuggestNeeds,
    /// Append curricular adaptations.
    SuggestAdaptations,
    /// SMART critique of a goal.
    Smart,
    /// Suggest activities for the activity bank.
    SuggestActivities,
    /// Rewrite the field text following an instruction.
    Refine,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::Fill,
        ActionKind::SuggestNeeds,
        ActionKind::SuggestAdaptations,
        ActionKind::Smart,
        ActionKind::SuggestActivities,
        ActionKind::Refine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fill => "fill",
            Self::SuggestNeeds => "suggest-needs",
            Self::SuggestAdaptations => "suggest-adaptations",
            Self::Smart => "smart",
            Self::SuggestActivities => "suggest-activities",
            Self::Refine => "refine",
        }
    }

    /// Whether the action is offered on `field_id`.
    pub fn allowed_for(&self, field_id: &str) -> bool {
        let textarea = catalog::catalog()
            .field(field_id)
            .is_some_and(|f| f.is_textarea());
        if !textarea {
            return false;
        }
        match self {
            Self::Fill | Self::Refine => true,
            Self::SuggestNeeds => field_id == NEEDS_FIELD,
            Self::SuggestAdaptations => field_id == ADAPTATIONS_FIELD,
            Self::Smart => catalog::is_goal_field(field_id),
            Self::SuggestActivities => {
                catalog::is_goal_field(field_id)
                    || field_id == ACTIVITIES_FIELD
                    || field_id == DUA_FIELD
            }
        }
    }

    /// Actions offered on `field_id`, in menu order.
    pub fn available_for(field_id: &str) -> Vec<ActionKind> {
        Self::ALL
            .into_iter()
            .filter(|a| a.allowed_for(field_id))
            .collect()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown action: {s:?}"))
    }
}

/// What a field action produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// A draft is waiting in the approval gate.
    Staged(SuggestionDraft),
    /// The critique was stored on the goal field.
    Critique(SmartCritique),
    /// Suggested activities, already tagged. Not yet in the bank.
    Activities(Vec<NewActivity>),
}

/// Why an assistant operation did not complete.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Malformed(#[from] MalformedResponseError),

    #[error(transparent)]
    Approval(#[from] ApprovalError),

    #[error("Por favor, preencha o campo da meta antes de solicitar a ação \"{action}\".")]
    EmptyGoal { field_id: String, action: ActionKind },

    #[error("a ação \"{action}\" não está disponível para o campo {field_id}")]
    Unsupported { field_id: String, action: ActionKind },

    #[error("\"{0}\" já está em andamento")]
    InFlight(String),

    #[error("o formulário foi substituído enquanto a IA respondia; a resposta foi descartada")]
    Superseded,

    #[error("PEI {0} não encontrado")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_per_field() {
        assert_eq!(
            ActionKind::available_for("metas-curto"),
            vec![
                ActionKind::Fill,
                ActionKind::Smart,
                ActionKind::SuggestActivities,
                ActionKind::Refine
            ]
        );
        assert_eq!(
            ActionKind::available_for(NEEDS_FIELD),
            vec![ActionKind::Fill, ActionKind::SuggestNeeds, ActionKind::Refine]
        );
        assert!(ActionKind::SuggestAdaptations.allowed_for(ADAPTATIONS_FIELD));
        assert!(ActionKind::SuggestActivities.allowed_for(DUA_FIELD));
        assert!(!ActionKind::Smart.allowed_for(DUA_FIELD));
        assert!(ActionKind::available_for("aluno-nome").is_empty());
        assert!(ActionKind::available_for("inexistente").is_empty());
    }

    #[test]
    fn action_names_roundtrip() {
        for action in ActionKind::ALL {
            assert_eq!(action.to_string().parse::<ActionKind>().unwrap(), action);
        }
        assert!("ai".parse::<ActionKind>().is_err());
    }
}
