//! Turning raw model replies into typed results.
//!
//! Models wrap JSON in prose or code fences, so structured replies are cut
//! from the first opening delimiter to the last closing one before parsing.
//! Anything that still fails to parse is rejected; nothing is half-applied.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pei_db::models::{NewActivity, SmartCritique};

/// What a reply is expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    FreeText,
    JsonObject,
    JsonArray,
}

impl fmt::Display for ResponseShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FreeText => "text",
            Self::JsonObject => "JSON object",
            Self::JsonArray => "JSON array",
        })
    }
}

/// A reply that does not have the expected shape.
#[derive(Debug, Clone, thiserror::Error)]
#[error("A API retornou uma resposta em um formato inesperado. Por favor, tente novamente. ({expected}: {reason})")]
pub struct MalformedResponseError {
    pub expected: ResponseShape,
    pub reason: String,
    /// The unparsed reply, kept for logging.
    pub raw: String,
}

impl MalformedResponseError {
    fn new(expected: ResponseShape, reason: impl Into<String>, raw: &str) -> Self {
        Self {
            expected,
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}

/// Structured review of a whole plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeiAnalysis {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub goal_analysis: String,
    pub pedagogical_analysis: String,
    pub psychopedagogical_analysis: String,
    pub suggestions: Vec<String>,
}

/// Cut the span between the first `open` and the last `close`.
fn delimited(raw: &str, open: char, close: char) -> Option<&str> {
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    (end > start).then(|| &raw[start..=end])
}

/// Extract and parse the JSON value of the requested shape.
pub fn extract_json(raw: &str, shape: ResponseShape) -> Result<Value, MalformedResponseError> {
    let (open, close) = match shape {
        ResponseShape::JsonObject => ('{', '}'),
        ResponseShape::JsonArray => ('[', ']'),
        ResponseShape::FreeText => {
            return Err(MalformedResponseError::new(
                shape,
                "free text has no JSON payload",
                raw,
            ));
        }
    };
    let span = delimited(raw, open, close)
        .ok_or_else(|| MalformedResponseError::new(shape, "no JSON payload found", raw))?;
    let value: Value = serde_json::from_str(span)
        .map_err(|e| MalformedResponseError::new(shape, e.to_string(), raw))?;

    let matches = match shape {
        ResponseShape::JsonObject => value.is_object(),
        ResponseShape::JsonArray => value.is_array(),
        ResponseShape::FreeText => false,
    };
    if matches {
        Ok(value)
    } else {
        Err(MalformedResponseError::new(shape, "wrong JSON type", raw))
    }
}

/// Free-text reply, trimmed.
pub fn parse_text(raw: &str) -> Result<String, MalformedResponseError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(MalformedResponseError::new(
            ResponseShape::FreeText,
            "empty reply",
            raw,
        ));
    }
    Ok(text.to_string())
}

fn decode<T: serde::de::DeserializeOwned>(
    raw: &str,
    shape: ResponseShape,
) -> Result<T, MalformedResponseError> {
    let value = extract_json(raw, shape)?;
    serde_json::from_value(value).map_err(|e| MalformedResponseError::new(shape, e.to_string(), raw))
}

pub fn parse_smart_critique(raw: &str) -> Result<SmartCritique, MalformedResponseError> {
    decode(raw, ResponseShape::JsonObject)
}

pub fn parse_activities(raw: &str) -> Result<Vec<NewActivity>, MalformedResponseError> {
    decode(raw, ResponseShape::JsonArray)
}

pub fn parse_analysis(raw: &str) -> Result<PeiAnalysis, MalformedResponseError> {
    decode(raw, ResponseShape::JsonObject)
}

/// Tagging rules for a batch of suggested activities.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityTags<'a> {
    /// Phase tag of the goal the activities were suggested for.
    pub phase: Option<&'a str>,
    /// Suggested for the UDL field.
    pub dua: bool,
}

/// Apply field-derived tags to suggested activities.
///
/// Tags keep their first-seen order with duplicates dropped. UDL requests
/// add the `DUA` tag and force `is_dua`; goal requests add the phase tag.
pub fn normalize_activities(activities: Vec<NewActivity>, tags: ActivityTags<'_>) -> Vec<NewActivity> {
    activities
        .into_iter()
        .map(|mut activity| {
            let mut seen = BTreeSet::new();
            let mut goal_tags: Vec<String> = activity
                .goal_tags
                .drain(..)
                .filter(|t| seen.insert(t.clone()))
                .collect();
            let mut add = |tag: &str| {
                if seen.insert(tag.to_string()) {
                    goal_tags.push(tag.to_string());
                }
            };
            if tags.dua {
                add("DUA");
                activity.is_dua = true;
            }
            if let Some(phase) = tags.phase {
                add(phase);
            }
            activity.goal_tags = goal_tags;
            activity
        })
        .collect()
}
