//! Identifier resolution for PEI records and bank activities.
//!
//! Commands accept a full UUID, an unambiguous id prefix (at least four hex
//! characters), or, for PEIs, the student name as shown by `pei list`.

use anyhow::{Result, bail};
use uuid::Uuid;

use pei_core::store::RecordStore;
use pei_db::models::PeiRecord;

const MIN_PREFIX: usize = 4;

/// Resolve `input` against the stored PEIs.
pub async fn resolve_pei_id(store: &dyn RecordStore, input: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(input) {
        return Ok(id);
    }
    let records = store.list_peis().await?;
    match_pei(&records, input)
}

/// Resolve `input` against the activity bank.
pub async fn resolve_activity_id(store: &dyn RecordStore, input: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(input) {
        return Ok(id);
    }
    let ids: Vec<Uuid> = store.list_activities().await?.iter().map(|a| a.id).collect();
    match_prefix(&ids, input, "atividade")
}

/// Pick the single PEI whose id starts with `input` or whose student name
/// equals it, ignoring case.
pub fn match_pei(records: &[PeiRecord], input: &str) -> Result<Uuid> {
    let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
    if let Ok(id) = match_prefix(&ids, input, "PEI") {
        return Ok(id);
    }

    let wanted = input.trim().to_lowercase();
    let named: Vec<&PeiRecord> = records
        .iter()
        .filter(|r| r.student_name.to_lowercase() == wanted)
        .collect();
    match named.as_slice() {
        [one] => Ok(one.id),
        [] => bail!("nenhum PEI corresponde a {input:?}"),
        many => bail!(
            "{} PEIs têm o nome {input:?}; use o ID:\n{}",
            many.len(),
            many.iter()
                .map(|r| format!("  {}", r.id))
                .collect::<Vec<_>>()
                .join("\n")
        ),
    }
}

fn match_prefix(ids: &[Uuid], input: &str, what: &str) -> Result<Uuid> {
    let prefix = input.trim().to_lowercase();
    if prefix.len() < MIN_PREFIX || !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        bail!("ID de {what} inválido: {input:?}");
    }
    let hits: Vec<Uuid> = ids
        .iter()
        .copied()
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();
    match hits.as_slice() {
        [one] => Ok(*one),
        [] => bail!("nenhum ID de {what} começa com {input:?}"),
        _ => bail!("o prefixo {input:?} corresponde a {} registros; use mais caracteres", hits.len()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sqlx::types::Json;

    use super::*;

    fn record(id: &str, name: &str) -> PeiRecord {
        PeiRecord {
            id: Uuid::parse_str(id).unwrap(),
            student_name: name.to_string(),
            data: Json(Default::default()),
            ai_generated_fields: Vec::new(),
            smart_analysis: Json(Default::default()),
            goal_activities: Json(Default::default()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn records() -> Vec<PeiRecord> {
        vec![
            record("1a2b3c4d-0000-4000-8000-000000000001", "Ana Souza"),
            record("1a2b9999-0000-4000-8000-000000000002", "Bruno Lima"),
            record("77777777-0000-4000-8000-000000000003", "PEI sem nome"),
        ]
    }

    #[test]
    fn unique_prefix_resolves() {
        let id = match_pei(&records(), "1a2b3c").unwrap();
        assert_eq!(id.to_string(), "1a2b3c4d-0000-4000-8000-000000000001");
    }

    #[test]
    fn ambiguous_prefix_is_rejected() {
        let err = match_prefix(
            &records().iter().map(|r| r.id).collect::<Vec<_>>(),
            "1a2b",
            "PEI",
        )
        .unwrap_err();
        assert!(err.to_string().contains("corresponde a 2 registros"));
    }

    #[test]
    fn student_name_resolves_case_insensitively() {
        let id = match_pei(&records(), "bruno lima").unwrap();
        assert_eq!(id.to_string(), "1a2b9999-0000-4000-8000-000000000002");
    }

    #[test]
    fn duplicate_names_need_an_id() {
        let mut recs = records();
        recs.push(record("88888888-0000-4000-8000-000000000004", "Ana Souza"));
        let err = match_pei(&recs, "Ana Souza").unwrap_err();
        assert!(err.to_string().contains("2 PEIs têm o nome"));
    }

    #[test]
    fn unknown_input_is_an_error() {
        assert!(match_pei(&records(), "Carla").is_err());
        assert!(match_pei(&records(), "abc").is_err());
    }
}
