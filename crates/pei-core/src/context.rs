//! Application-level navigation and mode state.

use std::fmt;
use std::str::FromStr;

use tracing::debug;
use uuid::Uuid;

use crate::ai::ReasoningMode;

/// Top-level screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    PeiForm,
    ActivityBank,
    PeiList,
    Files,
    PrivacyPolicy,
    ActivityDetail,
}

impl View {
    pub const ALL: [View; 6] = [
        View::PeiForm,
        View::ActivityBank,
        View::PeiList,
        View::Files,
        View::PrivacyPolicy,
        View::ActivityDetail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PeiForm => "pei-form-view",
            Self::ActivityBank => "activity-bank-view",
            Self::PeiList => "pei-list-view",
            Self::Files => "files-view",
            Self::PrivacyPolicy => "privacy-policy-view",
            Self::ActivityDetail => "activity-detail-view",
        }
    }

    /// Resolve an optional startup parameter, falling back to the form.
    pub fn from_param(param: Option<&str>) -> Self {
        param.and_then(|p| p.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = ViewParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ViewParseError(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown view: {0:?}")]
pub struct ViewParseError(pub String);

/// Current view, what it is focused on, and the reasoning mode toggle.
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    current_view: View,
    editing_pei_id: Option<Uuid>,
    selected_activity_id: Option<Uuid>,
    thinking_mode: bool,
}

impl AppContext {
    pub fn new(initial_view: Option<&str>) -> Self {
        Self {
            current_view: View::from_param(initial_view),
            ..Self::default()
        }
    }

    pub fn current_view(&self) -> View {
        self.current_view
    }

    pub fn editing_pei_id(&self) -> Option<Uuid> {
        self.editing_pei_id
    }

    pub fn selected_activity_id(&self) -> Option<Uuid> {
        self.selected_activity_id
    }

    pub fn thinking_mode(&self) -> bool {
        self.thinking_mode
    }

    pub fn set_thinking_mode(&mut self, enabled: bool) {
        self.thinking_mode = enabled;
    }

    pub fn toggle_thinking_mode(&mut self) -> bool {
        self.thinking_mode = !self.thinking_mode;
        self.thinking_mode
    }

    pub fn reasoning_mode(&self) -> ReasoningMode {
        if self.thinking_mode {
            ReasoningMode::Extended
        } else {
            ReasoningMode::Fast
        }
    }

    /// Switch views. The PEI being edited and the focused activity are dropped.
    pub fn navigate_to_view(&mut self, view: View) {
        debug!(%view, "navigate");
        self.current_view = view;
        self.editing_pei_id = None;
        self.selected_activity_id = None;
    }

    /// Open the form on an existing record.
    pub fn navigate_to_edit_pei(&mut self, id: Uuid) {
        debug!(%id, "edit PEI");
        self.current_view = View::PeiForm;
        self.editing_pei_id = Some(id);
    }

    /// Open the form on a blank record.
    pub fn navigate_to_new_pei(&mut self) {
        self.current_view = View::PeiForm;
        self.editing_pei_id = None;
    }

    pub fn navigate_to_activity_detail(&mut self, id: Uuid) {
        self.current_view = View::ActivityDetail;
        self.selected_activity_id = Some(id);
    }
}
