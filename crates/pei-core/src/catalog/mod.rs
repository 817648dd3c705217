//! Static PEI form catalog.
//!
//! Sections, field labels and help texts are defined in `fields.toml` and
//! embedded in the binary at compile time. Everything that needs to know
//! "which fields exist" (form validation, prompt context, progress) reads
//! from here so the order is identical everywhere.

use std::sync::OnceLock;

use serde::Deserialize;

/// Field holding the student's name; doubles as the record display name.
pub const OWNER_FIELD: &str = "aluno-nome";
/// Diagnosis field quoted by the needs suggestion prompt.
pub const DIAGNOSIS_FIELD: &str = "id-diagnostico";
/// Academic skills field quoted by the needs suggestion prompt.
pub const SKILLS_FIELD: &str = "aval-habilidades";
/// Field offering the needs suggestion action.
pub const NEEDS_FIELD: &str = "id-diagnostico";
/// Field offering the adaptations suggestion action.
pub const ADAPTATIONS_FIELD: &str = "est-adaptacoes";
/// Field offering activity suggestions over the whole plan.
pub const ACTIVITIES_FIELD: &str = "atividades-content";
/// Field whose activity suggestions follow Universal Design for Learning.
pub const DUA_FIELD: &str = "dua-content";
/// Goal fields, shortest horizon first.
pub const GOAL_FIELDS: [&str; 3] = ["metas-curto", "metas-medio", "metas-longo"];

/// How a field is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Date,
    Select,
    Textarea,
}

/// One form field.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSpec {
    pub id: String,
    pub label: String,
    pub kind: FieldKind,
    /// Guidance shown next to the field.
    #[serde(default)]
    pub help: Option<String>,
}

impl FieldSpec {
    /// Whether this field accepts AI-drafted prose.
    pub fn is_textarea(&self) -> bool {
        self.kind == FieldKind::Textarea
    }
}

/// A titled group of fields.
#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    pub title: String,
    /// Whether every field of the section is mandatory.
    #[serde(default)]
    pub required: bool,
    pub fields: Vec<FieldSpec>,
}

/// The whole form definition.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub sections: Vec<Section>,
    /// Choices offered by the `disciplina` select.
    pub discipline_options: Vec<String>,
}

static FIELDS_TOML: &str = include_str!("fields.toml");
static CATALOG: OnceLock<Catalog> = OnceLock::new();

/// The embedded catalog, parsed once.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed. The file ships inside the
/// binary, so a successful build with passing tests means it parses.
pub fn catalog() -> &'static Catalog {
    CATALOG.get_or_init(|| toml::from_str(FIELDS_TOML).expect("embedded fields.toml is invalid"))
}

impl Catalog {
    /// All fields in display order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields().find(|f| f.id == id)
    }

    /// Label for `id`, falling back to the identifier itself.
    pub fn label<'a>(&'a self, id: &'a str) -> &'a str {
        self.field(id).map(|f| f.label.as_str()).unwrap_or(id)
    }

    /// Identifiers of every mandatory field, in display order.
    pub fn required_fields(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| s.required)
            .flat_map(|s| s.fields.iter().map(|f| f.id.as_str()))
            .collect()
    }
}

/// Whether `id` is one of the three goal fields.
pub fn is_goal_field(id: &str) -> bool {
    GOAL_FIELDS.contains(&id)
}

/// Phase tag attached to activities suggested for a goal field.
pub fn phase_tag(id: &str) -> Option<&'static str> {
    match id {
        "metas-curto" => Some("Curto Prazo"),
        "metas-medio" => Some("Médio Prazo"),
        "metas-longo" => Some("Longo Prazo"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_parses() {
        let cat = catalog();
        assert_eq!(cat.sections.len(), 8);
        assert!(!cat.discipline_options.is_empty());
    }

    #[test]
    fn field_ids_are_unique() {
        let mut ids: Vec<&str> = catalog().fields().map(|f| f.id.as_str()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn required_fields_cover_first_two_sections() {
        let required = catalog().required_fields();
        assert_eq!(required.first(), Some(&OWNER_FIELD));
        assert!(required.contains(&DIAGNOSIS_FIELD));
        assert!(required.contains(&"aval-coord"));
        assert!(!required.contains(&"metas-curto"));
        assert_eq!(required.len(), 12);
    }

    #[test]
    fn well_known_fields_exist() {
        let cat = catalog();
        for id in [
            OWNER_FIELD,
            DIAGNOSIS_FIELD,
            SKILLS_FIELD,
            ADAPTATIONS_FIELD,
            ACTIVITIES_FIELD,
            DUA_FIELD,
        ]
        .into_iter()
        .chain(GOAL_FIELDS)
        {
            assert!(cat.field(id).is_some(), "missing field {id}");
        }
        assert!(cat.field(DUA_FIELD).unwrap().is_textarea());
        assert!(!cat.field(OWNER_FIELD).unwrap().is_textarea());
    }

    #[test]
    fn label_falls_back_to_id() {
        assert_eq!(catalog().label("aluno-nome"), "Nome do Aluno");
        assert_eq!(catalog().label("desconhecido"), "desconhecido");
    }

    #[test]
    fn phase_tags() {
        assert_eq!(phase_tag("metas-curto"), Some("Curto Prazo"));
        assert_eq!(phase_tag("metas-longo"), Some("Longo Prazo"));
        assert_eq!(phase_tag(DUA_FIELD), None);
        assert!(is_goal_field("metas-medio"));
        assert!(!is_goal_field(ACTIVITIES_FIELD));
    }
}
