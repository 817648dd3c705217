//! In-memory state of the PEI being edited.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use pei_db::models::{FieldMap, NewActivity, NewPeiRecord, PeiRecord, SmartCritique};

use crate::catalog::{self, OWNER_FIELD};

/// Message recorded against a blank mandatory field.
pub const REQUIRED_MESSAGE: &str = "Este campo é obrigatório.";

/// Raised when mandatory fields are blank.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Por favor, preencha todos os campos obrigatórios destacados: {}", .fields.join(", "))]
pub struct ValidationError {
    /// Blank fields in display order.
    pub fields: Vec<String>,
}

/// Progress of one catalog section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionProgress {
    pub title: String,
    pub filled: usize,
    pub total: usize,
}

impl SectionProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.filled as f64 / self.total as f64 * 100.0
        }
    }
}

/// Field values plus everything the session attaches to them.
///
/// The form is keyed by catalog field id; unknown keys loaded from a stored
/// record are kept so nothing is lost on the next save.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    values: FieldMap,
    ai_generated: BTreeSet<String>,
    errors: BTreeMap<String, String>,
    smart_analysis: BTreeMap<String, SmartCritique>,
    goal_activities: BTreeMap<String, Vec<NewActivity>>,
    record_id: Option<Uuid>,
    /// Bumped whenever the form is replaced wholesale (clear or load).
    epoch: u64,
}

fn is_blank(value: Option<&String>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `id`; blank fields read as the empty string.
    pub fn get(&self, id: &str) -> &str {
        self.values.get(id).map(String::as_str).unwrap_or("")
    }

    pub fn values(&self) -> &FieldMap {
        &self.values
    }

    /// Record a user edit. Clears the field's validation error and its
    /// AI-generated flag.
    pub fn set(&mut self, id: &str, value: impl Into<String>) {
        self.values.insert(id.to_string(), value.into());
        self.errors.remove(id);
        self.ai_generated.remove(id);
    }

    /// Record an approved AI draft and flag the field as AI-generated.
    pub(crate) fn commit_ai(&mut self, id: &str, value: impl Into<String>) {
        self.set(id, value);
        self.ai_generated.insert(id.to_string());
    }

    pub fn is_ai_generated(&self, id: &str) -> bool {
        self.ai_generated.contains(id)
    }

    pub fn ai_generated(&self) -> impl Iterator<Item = &str> {
        self.ai_generated.iter().map(String::as_str)
    }

    /// Check `required` for blank values, recording an error per blank field.
    ///
    /// Returns the blank subset in the order given.
    pub fn validate(&mut self, required: &[&str]) -> Vec<String> {
        let mut blank = Vec::new();
        for id in required {
            if is_blank(self.values.get(*id)) {
                self.errors.insert(id.to_string(), REQUIRED_MESSAGE.to_string());
                blank.push(id.to_string());
            } else {
                self.errors.remove(*id);
            }
        }
        blank
    }

    /// Validate the catalog's mandatory fields.
    pub fn require_mandatory(&mut self) -> Result<(), ValidationError> {
        let blank = self.validate(&catalog::catalog().required_fields());
        if blank.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { fields: blank })
        }
    }

    /// Whether every mandatory field has a value. Records nothing.
    pub fn required_filled(&self) -> bool {
        catalog::catalog()
            .required_fields()
            .iter()
            .all(|id| !is_blank(self.values.get(*id)))
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// Fraction of `fields` with a non-blank value, in `[0, 1]`.
    pub fn completion_ratio(&self, fields: &[&str]) -> f64 {
        if fields.is_empty() {
            return 0.0;
        }
        let filled = fields
            .iter()
            .filter(|id| !is_blank(self.values.get(**id)))
            .count();
        filled as f64 / fields.len() as f64
    }

    /// Per-section fill counts in catalog order.
    pub fn section_progress(&self) -> Vec<SectionProgress> {
        catalog::catalog()
            .sections
            .iter()
            .map(|section| SectionProgress {
                title: section.title.clone(),
                filled: section
                    .fields
                    .iter()
                    .filter(|f| !is_blank(self.values.get(&f.id)))
                    .count(),
                total: section.fields.len(),
            })
            .collect()
    }

    /// Trimmed student name, if one has been entered.
    pub fn owner_name(&self) -> Option<&str> {
        let name = self.get(OWNER_FIELD).trim();
        (!name.is_empty()).then_some(name)
    }

    pub fn record_id(&self) -> Option<Uuid> {
        self.record_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Take the identifier assigned by the store after a first save.
    ///
    /// Ignored when the form was cleared or replaced since `epoch`.
    pub fn adopt_id(&mut self, id: Uuid, epoch: u64) -> bool {
        if self.epoch != epoch {
            return false;
        }
        self.record_id = Some(id);
        true
    }

    pub fn set_critique(&mut self, field_id: &str, critique: SmartCritique) {
        self.smart_analysis.insert(field_id.to_string(), critique);
    }

    pub fn critique(&self, field_id: &str) -> Option<&SmartCritique> {
        self.smart_analysis.get(field_id)
    }

    pub fn set_goal_activities(&mut self, field_id: &str, activities: Vec<NewActivity>) {
        self.goal_activities.insert(field_id.to_string(), activities);
    }

    pub fn goal_activities(&self, field_id: &str) -> &[NewActivity] {
        self.goal_activities
            .get(field_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Reset to an empty, unsaved form.
    pub fn clear(&mut self) {
        let epoch = self.epoch + 1;
        *self = Self {
            epoch,
            ..Self::default()
        };
    }

    /// Replace the form with a stored record.
    pub fn load(&mut self, record: &PeiRecord) {
        let epoch = self.epoch + 1;
        *self = Self {
            values: record.data.0.clone(),
            ai_generated: record.ai_generated_fields.iter().cloned().collect(),
            errors: BTreeMap::new(),
            smart_analysis: record.smart_analysis.0.clone(),
            goal_activities: record.goal_activities.0.clone(),
            record_id: Some(record.id),
            epoch,
        };
    }

    /// Everything a save needs, detached from the live form.
    pub fn snapshot(&self) -> NewPeiRecord {
        NewPeiRecord {
            data: self.values.clone(),
            ai_generated_fields: self.ai_generated.iter().cloned().collect(),
            smart_analysis: self.smart_analysis.clone(),
            goal_activities: self.goal_activities.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sqlx::types::Json;

    use super::*;

    fn fill_required(form: &mut FormState) {
        for id in catalog::catalog().required_fields() {
            form.set(id, format!("valor de {id}"));
        }
    }

    #[test]
    fn validate_reports_blank_subset_in_order() {
        let mut form = FormState::new();
        form.set("aluno-nome", "Ana");
        form.set("aluno-ano", "   ");
        let blank = form.validate(&["aluno-nome", "aluno-ano", "aluno-escola"]);
        assert_eq!(blank, vec!["aluno-ano", "aluno-escola"]);
        assert_eq!(form.errors().get("aluno-ano").unwrap(), REQUIRED_MESSAGE);
        assert!(!form.errors().contains_key("aluno-nome"));
    }

    #[test]
    fn editing_clears_field_error() {
        let mut form = FormState::new();
        form.validate(&["aluno-escola"]);
        assert!(form.errors().contains_key("aluno-escola"));
        form.set("aluno-escola", "EMEF");
        assert!(form.errors().is_empty());
    }

    #[test]
    fn require_mandatory_lists_missing_fields() {
        let mut form = FormState::new();
        fill_required(&mut form);
        assert!(form.required_filled());
        assert!(form.require_mandatory().is_ok());

        form.set("aval-social", "");
        let err = form.require_mandatory().unwrap_err();
        assert_eq!(err.fields, vec!["aval-social"]);
        assert!(!form.required_filled());
    }

    #[test]
    fn user_edit_drops_ai_flag() {
        let mut form = FormState::new();
        form.commit_ai("revisao", "Bimestral");
        assert!(form.is_ai_generated("revisao"));
        form.set("revisao", "Mensal");
        assert!(!form.is_ai_generated("revisao"));
    }

    #[test]
    fn completion_ratio_counts_non_blank() {
        let mut form = FormState::new();
        assert_eq!(form.completion_ratio(&[]), 0.0);
        form.set("a", "x");
        form.set("b", " ");
        let ratio = form.completion_ratio(&["a", "b", "c", "d"]);
        assert!((ratio - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn section_progress_follows_catalog() {
        let mut form = FormState::new();
        form.set("metas-curto", "Ler frases");
        let progress = form.section_progress();
        assert_eq!(progress.len(), catalog::catalog().sections.len());
        let goals = &progress[2];
        assert_eq!((goals.filled, goals.total), (1, 3));
        assert!((goals.percent() - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(progress[0].filled, 0);
    }

    #[test]
    fn owner_name_is_trimmed() {
        let mut form = FormState::new();
        assert!(form.owner_name().is_none());
        form.set(OWNER_FIELD, "  Ana ");
        assert_eq!(form.owner_name(), Some("Ana"));
    }

    #[test]
    fn clear_bumps_epoch_and_blocks_stale_adoption() {
        let mut form = FormState::new();
        form.commit_ai("metas-curto", "texto");
        let epoch = form.epoch();
        form.clear();
        assert!(form.values().is_empty());
        assert_eq!(form.ai_generated().count(), 0);
        assert!(!form.adopt_id(Uuid::new_v4(), epoch));
        assert!(form.record_id().is_none());

        let id = Uuid::new_v4();
        assert!(form.adopt_id(id, form.epoch()));
        assert_eq!(form.record_id(), Some(id));
    }

    #[test]
    fn load_and_snapshot_roundtrip() {
        let mut data = FieldMap::new();
        data.insert("aluno-nome".into(), "Ana".into());
        let record = PeiRecord {
            id: Uuid::new_v4(),
            student_name: "Ana".into(),
            data: Json(data.clone()),
            ai_generated_fields: vec!["aluno-nome".into()],
            smart_analysis: Json(BTreeMap::new()),
            goal_activities: Json(BTreeMap::new()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let mut form = FormState::new();
        form.set("lixo", "x");
        form.load(&record);
        assert_eq!(form.record_id(), Some(record.id));
        assert!(form.is_ai_generated("aluno-nome"));
        assert_eq!(form.get("lixo"), "");
        assert_eq!(form.snapshot(), record.to_new());
    }
}
