use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// Form values keyed by field identifier.
pub type FieldMap = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of support file attached as model context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RagFileKind {
    Text,
    Image,
}

impl fmt::Display for RagFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Image => "image",
        };
        f.write_str(s)
    }
}

impl FromStr for RagFileKind {
    type Err = RagFileKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            other => Err(RagFileKindParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`RagFileKind`] string.
#[derive(Debug, Clone)]
pub struct RagFileKindParseError(pub String);

impl fmt::Display for RagFileKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid support file kind: {:?}", self.0)
    }
}

impl std::error::Error for RagFileKindParseError {}

// ---------------------------------------------------------------------------
// SMART critique
// ---------------------------------------------------------------------------

/// Critique and suggested improvement for one SMART criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionFeedback {
    pub critique: String,
    pub suggestion: String,
}

/// SMART analysis of a single goal field.
///
/// Serialized with the camelCase keys the model is asked to produce
/// (`isSpecific`, `isMeasurable`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartCritique {
    pub is_specific: CriterionFeedback,
    pub is_measurable: CriterionFeedback,
    pub is_achievable: CriterionFeedback,
    pub is_relevant: CriterionFeedback,
    pub is_time_bound: CriterionFeedback,
}

impl SmartCritique {
    /// Criteria paired with their display labels, in rubric order.
    pub fn criteria(&self) -> [(&'static str, &CriterionFeedback); 5] {
        [
            ("Específica (Specific)", &self.is_specific),
            ("Mensurável (Measurable)", &self.is_measurable),
            ("Atingível (Achievable)", &self.is_achievable),
            ("Relevante (Relevant)", &self.is_relevant),
            ("Temporal (Time-Bound)", &self.is_time_bound),
        ]
    }
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

/// An activity that has not been stored in the bank yet.
///
/// This is the shape produced by the model for activity suggestions. The
/// decoder is lenient about list fields: `skills` and `needs` may arrive as
/// a JSON list or a comma-separated string, and a non-list `goalTags` is
/// treated as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub discipline: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub needs: Vec<String>,
    #[serde(default, deserialize_with = "list_or_empty")]
    pub goal_tags: Vec<String>,
    #[serde(default, rename = "isDUA", deserialize_with = "bool_or_false")]
    pub is_dua: bool,
    #[serde(default)]
    pub is_favorited: bool,
}

/// A stored activity from the bank.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub discipline: String,
    pub skills: Vec<String>,
    pub needs: Vec<String>,
    pub goal_tags: Vec<String>,
    pub is_favorited: bool,
    pub is_dua: bool,
    pub source_pei_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

fn push_unique(out: &mut Vec<String>, item: &str) {
    let item = item.trim();
    if !item.is_empty() && !out.iter().any(|existing| existing == item) {
        out.push(item.to_string());
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let mut out = Vec::new();
    match value {
        Some(serde_json::Value::String(s)) => {
            for part in s.split(',') {
                push_unique(&mut out, part);
            }
        }
        Some(serde_json::Value::Array(items)) => {
            for item in &items {
                if let Some(s) = item.as_str() {
                    push_unique(&mut out, s);
                }
            }
        }
        _ => {}
    }
    Ok(out)
}

fn list_or_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let mut out = Vec::new();
    if let Some(serde_json::Value::Array(items)) = value {
        for item in &items {
            if let Some(s) = item.as_str() {
                push_unique(&mut out, s);
            }
        }
    }
    Ok(out)
}

fn bool_or_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(matches!(value, Some(serde_json::Value::Bool(true))))
}

// ---------------------------------------------------------------------------
// PEI records
// ---------------------------------------------------------------------------

/// Full snapshot of an edit session, ready to be persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPeiRecord {
    pub data: FieldMap,
    pub ai_generated_fields: Vec<String>,
    pub smart_analysis: BTreeMap<String, SmartCritique>,
    pub goal_activities: BTreeMap<String, Vec<NewActivity>>,
}

/// A persisted PEI draft.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PeiRecord {
    pub id: Uuid,
    pub student_name: String,
    pub data: Json<FieldMap>,
    pub ai_generated_fields: Vec<String>,
    pub smart_analysis: Json<BTreeMap<String, SmartCritique>>,
    pub goal_activities: Json<BTreeMap<String, Vec<NewActivity>>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PeiRecord {
    /// Copy the record contents back into an unsaved snapshot.
    pub fn to_new(&self) -> NewPeiRecord {
        NewPeiRecord {
            data: self.data.0.clone(),
            ai_generated_fields: self.ai_generated_fields.clone(),
            smart_analysis: self.smart_analysis.0.clone(),
            goal_activities: self.goal_activities.0.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Support files
// ---------------------------------------------------------------------------

/// A support file offered to the model as extra context.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RagFile {
    pub id: Uuid,
    pub name: String,
    pub kind: RagFileKind,
    pub mime_type: String,
    /// Plain text for `text` files, base64 payload for `image` files.
    pub content: String,
    pub selected: bool,
    pub created_at: DateTime<Utc>,
}

/// Parameters for inserting a support file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRagFile {
    pub name: String,
    pub kind: RagFileKind,
    pub mime_type: String,
    pub content: String,
    pub selected: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
