//! Orchestration of assistant actions over a shared edit session.
//!
//! The session lock is only held for short synchronous sections: reading
//! the form before a request and applying the reply after it. Model calls
//! and store I/O run unlocked, so independent actions proceed concurrently
//! and autosave keeps firing while a request is outstanding.

mod action;

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pei_db::models::{Activity, FieldMap, NewActivity, PeiRecord, RagFile};

use crate::ai::{Generator, ReasoningMode};
use crate::approval::{ApprovalGate, SuggestionDraft};
use crate::autosave::{AutosaveOutcome, AutosaveTracker};
use crate::catalog::{self, DUA_FIELD};
use crate::form::FormState;
use crate::prompt::{self, Prompt};
use crate::response::{self, ActivityTags, PeiAnalysis};
use crate::store::{RecordStore, UNNAMED_RECORD};

pub use action::{ActionError, ActionKind, ActionOutcome};

/// Everything the user is currently editing.
#[derive(Debug, Default)]
pub struct EditSession {
    pub form: FormState,
    pub gate: ApprovalGate,
    in_flight: HashSet<String>,
}

fn job_key(target: &str, job: &str) -> String {
    format!("{target}-{job}")
}

const PLAN_TARGET: &str = "pei";

impl EditSession {
    /// Whether `action` is currently running for `field_id`.
    pub fn is_loading(&self, field_id: &str, action: ActionKind) -> bool {
        self.in_flight.contains(&job_key(field_id, action.as_str()))
    }

    pub fn busy(&self) -> bool {
        !self.in_flight.is_empty()
    }
}

pub type SharedSession = Arc<Mutex<EditSession>>;

/// Drives assistant actions against one edit session.
pub struct Assistant {
    session: SharedSession,
    generator: Arc<dyn Generator>,
    store: Arc<dyn RecordStore>,
    /// Serialises saves so a first save's id is adopted before the next one.
    save_lock: Mutex<()>,
}

impl Assistant {
    pub fn new(generator: Arc<dyn Generator>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            session: Arc::new(Mutex::new(EditSession::default())),
            generator,
            store,
            save_lock: Mutex::new(()),
        }
    }

    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Run `f` with the session locked.
    pub async fn with_session<R>(&self, f: impl FnOnce(&mut EditSession) -> R) -> R {
        let mut session = self.session.lock().await;
        f(&mut session)
    }

    /// Record a user edit on a field.
    pub async fn set_field(&self, field_id: &str, value: impl Into<String>) {
        self.session.lock().await.form.set(field_id, value);
    }

    /// Start a blank PEI. Any pending draft is dropped.
    pub async fn new_pei(&self) {
        let mut session = self.session.lock().await;
        session.form.clear();
        session.gate = ApprovalGate::Idle;
    }

    /// Load a stored PEI into the session.
    pub async fn open_pei(&self, id: Uuid) -> Result<PeiRecord, ActionError> {
        let record = self
            .store
            .get_pei(id)
            .await?
            .ok_or(ActionError::NotFound(id))?;
        let mut session = self.session.lock().await;
        session.form.load(&record);
        session.gate = ApprovalGate::Idle;
        info!(record_id = %id, "PEI opened");
        Ok(record)
    }

    // -----------------------------------------------------------------------
    // Field actions
    // -----------------------------------------------------------------------

    /// Run an AI action on a field.
    ///
    /// Drafting actions stage their result for approval; SMART critiques and
    /// activity suggestions are applied directly.
    pub async fn run_action(
        &self,
        field_id: &str,
        action: ActionKind,
        mode: ReasoningMode,
    ) -> Result<ActionOutcome, ActionError> {
        if action == ActionKind::Refine || !action.allowed_for(field_id) {
            return Err(ActionError::Unsupported {
                field_id: field_id.to_string(),
                action,
            });
        }

        let key = job_key(field_id, action.as_str());
        let (values, epoch) = {
            let mut session = self.session.lock().await;
            check_preconditions(&mut session.form, field_id, action)?;
            if !session.in_flight.insert(key.clone()) {
                return Err(ActionError::InFlight(key));
            }
            (session.form.values().clone(), session.form.epoch())
        };

        debug!(field_id, %action, %mode, "running field action");
        let reply = self.request(field_id, action, &values, mode).await;

        let mut session = self.session.lock().await;
        session.in_flight.remove(&key);
        let raw = reply?;
        if session.form.epoch() != epoch {
            warn!(field_id, %action, "form replaced while waiting, reply dropped");
            return Err(ActionError::Superseded);
        }
        apply_reply(&mut session, field_id, action, &raw).inspect_err(|e| {
            if let ActionError::Malformed(m) = e {
                warn!(field_id, %action, raw = %m.raw, "malformed model reply");
            }
        })
    }

    async fn request(
        &self,
        field_id: &str,
        action: ActionKind,
        values: &FieldMap,
        mode: ReasoningMode,
    ) -> Result<String, ActionError> {
        if action == ActionKind::Smart {
            let goal = values.get(field_id).map(String::as_str).unwrap_or("");
            return self.generate(&prompt::smart_critique(goal), mode).await;
        }
        self.generate_with_files(mode, |files| match action {
            ActionKind::Fill => prompt::fill_field(values, field_id, files),
            ActionKind::SuggestNeeds => prompt::suggest_needs(values, field_id, files),
            ActionKind::SuggestAdaptations => prompt::suggest_adaptations(values, field_id, files),
            _ => prompt::suggest_activities(values, field_id, files),
        })
        .await
    }

    /// Build a prompt over the current support files and send it.
    async fn generate_with_files(
        &self,
        mode: ReasoningMode,
        build: impl FnOnce(&[RagFile]) -> Prompt + Send,
    ) -> Result<String, ActionError> {
        let files = self.store.list_rag_files().await?;
        let prompt = build(&files);
        self.generate(&prompt, mode).await
    }

    async fn generate(&self, prompt: &Prompt, mode: ReasoningMode) -> Result<String, ActionError> {
        self.generator.generate(prompt, mode).await.map_err(|e| {
            warn!(generator = self.generator.name(), error = %e, "model call failed");
            ActionError::from(e)
        })
    }

    /// Rewrite a field's text following `instruction` and stage the result.
    ///
    /// `current` defaults to the field's value in the form.
    pub async fn refine(
        &self,
        field_id: &str,
        current: Option<&str>,
        instruction: Option<&str>,
        mode: ReasoningMode,
    ) -> Result<SuggestionDraft, ActionError> {
        let action = ActionKind::Refine;
        if !action.allowed_for(field_id) {
            return Err(ActionError::Unsupported {
                field_id: field_id.to_string(),
                action,
            });
        }

        let key = job_key(field_id, action.as_str());
        let (values, text, epoch) = {
            let mut session = self.session.lock().await;
            if !session.in_flight.insert(key.clone()) {
                return Err(ActionError::InFlight(key));
            }
            let text = current
                .map(str::to_string)
                .unwrap_or_else(|| session.form.get(field_id).to_string());
            (session.form.values().clone(), text, session.form.epoch())
        };

        let reply = self
            .generate_with_files(mode, |files| {
                prompt::refine(&values, field_id, &text, instruction, files)
            })
            .await;

        let mut session = self.session.lock().await;
        session.in_flight.remove(&key);
        let refined = response::parse_text(&reply?).map_err(|e| {
            warn!(field_id, raw = %e.raw, "malformed refine reply");
            ActionError::from(e)
        })?;
        if session.form.epoch() != epoch {
            warn!(field_id, "form replaced while waiting, refinement dropped");
            return Err(ActionError::Superseded);
        }
        let draft = SuggestionDraft {
            field_id: field_id.to_string(),
            label: catalog::catalog().label(field_id).to_string(),
            content: refined,
            is_appending: false,
        };
        session.gate.stage(draft.clone());
        Ok(draft)
    }

    // -----------------------------------------------------------------------
    // Approval
    // -----------------------------------------------------------------------

    pub async fn pending_draft(&self) -> Option<SuggestionDraft> {
        self.session.lock().await.gate.pending().cloned()
    }

    /// Commit the pending draft. Returns the updated field id.
    pub async fn approve(&self) -> Result<String, ActionError> {
        let mut session = self.session.lock().await;
        let EditSession { form, gate, .. } = &mut *session;
        Ok(gate.approve(form)?)
    }

    pub async fn reject(&self) -> Option<SuggestionDraft> {
        self.session.lock().await.gate.reject()
    }

    pub async fn edit_draft(&self, content: impl Into<String>) -> Result<(), ActionError> {
        Ok(self.session.lock().await.gate.edit(content)?)
    }

    // -----------------------------------------------------------------------
    // Whole-plan actions
    // -----------------------------------------------------------------------

    /// Validate the form and collect what a whole-plan prompt needs.
    async fn begin_plan_job(
        &self,
        job: &str,
    ) -> Result<(String, FieldMap), ActionError> {
        let key = job_key(PLAN_TARGET, job);
        let mut session = self.session.lock().await;
        session.form.require_mandatory()?;
        if !session.in_flight.insert(key.clone()) {
            return Err(ActionError::InFlight(key));
        }
        Ok((key, session.form.values().clone()))
    }

    async fn finish_plan_job(&self, key: &str) {
        self.session.lock().await.in_flight.remove(key);
    }

    /// Compose a complete PEI document. Nothing in the form changes.
    pub async fn generate_full_pei(&self, mode: ReasoningMode) -> Result<String, ActionError> {
        let (key, values) = self.begin_plan_job("full").await?;
        let reply = self
            .generate_with_files(mode, |files| prompt::full_pei(&values, files))
            .await;
        self.finish_plan_job(&key).await;
        Ok(response::parse_text(&reply?)?)
    }

    /// Multidisciplinary review of the plan. Nothing in the form changes.
    pub async fn analyze_pei(&self, mode: ReasoningMode) -> Result<PeiAnalysis, ActionError> {
        let (key, values) = self.begin_plan_job("analysis").await?;
        let reply = self
            .generate_with_files(mode, |files| prompt::intelligent_analysis(&values, files))
            .await;
        self.finish_plan_job(&key).await;
        let raw = reply?;
        response::parse_analysis(&raw).map_err(|e| {
            warn!(raw = %e.raw, "malformed analysis reply");
            ActionError::from(e)
        })
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Validated save. Unnamed plans are stored as "PEI sem nome".
    pub async fn save(&self) -> Result<PeiRecord, ActionError> {
        let _guard = self.save_lock.lock().await;
        let (id, record, name, epoch) = {
            let mut session = self.session.lock().await;
            session.form.require_mandatory()?;
            let form = &session.form;
            (
                form.record_id(),
                form.snapshot(),
                form.owner_name().unwrap_or(UNNAMED_RECORD).to_string(),
                form.epoch(),
            )
        };

        let saved = self.store.save_pei(id, &record, &name).await?;
        self.session.lock().await.form.adopt_id(saved.id, epoch);
        info!(record_id = %saved.id, student = %name, "PEI saved");
        Ok(saved)
    }

    /// One autosave tick: save when the student name is filled in.
    pub async fn autosave(
        &self,
        tracker: &mut AutosaveTracker,
    ) -> Result<AutosaveOutcome, ActionError> {
        let _guard = self.save_lock.lock().await;
        let (id, record, name, epoch) = {
            let session = self.session.lock().await;
            let form = &session.form;
            let Some(name) = form.owner_name() else {
                return Ok(AutosaveOutcome::NoOwner);
            };
            (form.record_id(), form.snapshot(), name.to_string(), form.epoch())
        };

        if !tracker.should_save(id, &record, &name) {
            return Ok(AutosaveOutcome::Unchanged);
        }

        let saved = self.store.save_pei(id, &record, &name).await?;
        tracker.saved(Some(saved.id), &record, &name);
        self.session.lock().await.form.adopt_id(saved.id, epoch);
        debug!(record_id = %saved.id, "autosaved");
        Ok(AutosaveOutcome::Saved(saved.id))
    }

    /// Add activities to the bank, linked to the current PEI when it has
    /// been saved.
    pub async fn save_activities(
        &self,
        activities: &[NewActivity],
    ) -> Result<Vec<Activity>, ActionError> {
        let origin = self.session.lock().await.form.record_id();
        self.store_activities(activities, origin).await
    }

    /// Add activities suggested while the form was at `epoch`.
    ///
    /// Once another PEI has been started or opened the suggestions no longer
    /// belong to the form, so this fails with [`ActionError::Superseded`]
    /// instead of linking them to the wrong record.
    pub async fn save_activities_from(
        &self,
        activities: &[NewActivity],
        epoch: u64,
    ) -> Result<Vec<Activity>, ActionError> {
        let origin = {
            let session = self.session.lock().await;
            if session.form.epoch() != epoch {
                warn!(count = activities.len(), "activities belong to a replaced form, not saved");
                return Err(ActionError::Superseded);
            }
            session.form.record_id()
        };
        self.store_activities(activities, origin).await
    }

    async fn store_activities(
        &self,
        activities: &[NewActivity],
        origin: Option<Uuid>,
    ) -> Result<Vec<Activity>, ActionError> {
        let stored = self.store.add_activities(activities, origin).await?;
        info!(count = stored.len(), origin = ?origin, "activities added to bank");
        Ok(stored)
    }

    /// Generation counter of the form; bumped by `new_pei` and `open_pei`.
    pub async fn epoch(&self) -> u64 {
        self.session.lock().await.form.epoch()
    }
}

fn goal_is_blank(form: &FormState, field_id: &str) -> bool {
    form.get(field_id).trim().is_empty()
}

fn check_preconditions(
    form: &mut FormState,
    field_id: &str,
    action: ActionKind,
) -> Result<(), ActionError> {
    let needs_goal = action == ActionKind::Smart
        || (action == ActionKind::SuggestActivities && catalog::is_goal_field(field_id));
    if needs_goal {
        if goal_is_blank(form, field_id) {
            return Err(ActionError::EmptyGoal {
                field_id: field_id.to_string(),
                action,
            });
        }
        return Ok(());
    }
    if action != ActionKind::Refine {
        form.require_mandatory()?;
    }
    Ok(())
}

fn apply_reply(
    session: &mut EditSession,
    field_id: &str,
    action: ActionKind,
    raw: &str,
) -> Result<ActionOutcome, ActionError> {
    match action {
        ActionKind::Fill | ActionKind::SuggestNeeds | ActionKind::SuggestAdaptations => {
            let draft = SuggestionDraft {
                field_id: field_id.to_string(),
                label: catalog::catalog().label(field_id).to_string(),
                content: response::parse_text(raw)?,
                is_appending: action != ActionKind::Fill,
            };
            session.gate.stage(draft.clone());
            Ok(ActionOutcome::Staged(draft))
        }
        ActionKind::Smart => {
            let critique = response::parse_smart_critique(raw)?;
            session.form.set_critique(field_id, critique.clone());
            Ok(ActionOutcome::Critique(critique))
        }
        ActionKind::SuggestActivities => {
            let is_dua = field_id == DUA_FIELD;
            let activities = response::normalize_activities(
                response::parse_activities(raw)?,
                ActivityTags {
                    phase: catalog::phase_tag(field_id),
                    dua: is_dua,
                },
            );
            if is_dua || catalog::is_goal_field(field_id) {
                session
                    .form
                    .set_goal_activities(field_id, activities.clone());
            }
            Ok(ActionOutcome::Activities(activities))
        }
        ActionKind::Refine => Err(ActionError::Unsupported {
            field_id: field_id.to_string(),
            action,
        }),
    }
}
