//! Database query functions for the `peis` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{NewPeiRecord, PeiRecord};

/// Insert a new PEI row. Returns the inserted row with server-generated
/// defaults (id, timestamps).
pub async fn insert_pei(pool: &PgPool, new: &NewPeiRecord, student_name: &str) -> Result<PeiRecord> {
    let pei = sqlx::query_as::<_, PeiRecord>(
        "INSERT INTO peis (student_name, data, ai_generated_fields, smart_analysis, goal_activities) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(student_name)
    .bind(Json(&new.data))
    .bind(&new.ai_generated_fields)
    .bind(Json(&new.smart_analysis))
    .bind(Json(&new.goal_activities))
    .fetch_one(pool)
    .await
    .context("failed to insert PEI")?;

    Ok(pei)
}

/// Insert a PEI row under a caller-chosen id.
///
/// Used when a session holds an id whose row has since been deleted, so the
/// next save recreates the record instead of minting a new identity.
pub async fn insert_pei_with_id(
    pool: &PgPool,
    id: Uuid,
    new: &NewPeiRecord,
    student_name: &str,
) -> Result<PeiRecord> {
    let pei = sqlx::query_as::<_, PeiRecord>(
        "INSERT INTO peis (id, student_name, data, ai_generated_fields, smart_analysis, goal_activities) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(id)
    .bind(student_name)
    .bind(Json(&new.data))
    .bind(&new.ai_generated_fields)
    .bind(Json(&new.smart_analysis))
    .bind(Json(&new.goal_activities))
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert PEI {id}"))?;

    Ok(pei)
}

/// Overwrite the contents of an existing PEI and bump `updated_at`.
///
/// Returns `None` when no row has the given id.
pub async fn update_pei(
    pool: &PgPool,
    id: Uuid,
    new: &NewPeiRecord,
    student_name: &str,
) -> Result<Option<PeiRecord>> {
    let pei = sqlx::query_as::<_, PeiRecord>(
        "UPDATE peis \
         SET student_name = $2, data = $3, ai_generated_fields = $4, \
             smart_analysis = $5, goal_activities = $6, updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(student_name)
    .bind(Json(&new.data))
    .bind(&new.ai_generated_fields)
    .bind(Json(&new.smart_analysis))
    .bind(Json(&new.goal_activities))
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to update PEI {id}"))?;

    Ok(pei)
}

/// Fetch a PEI by its ID.
pub async fn get_pei(pool: &PgPool, id: Uuid) -> Result<Option<PeiRecord>> {
    let pei = sqlx::query_as::<_, PeiRecord>("SELECT * FROM peis WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch PEI")?;

    Ok(pei)
}

/// List all PEIs, most recently updated first.
pub async fn list_peis(pool: &PgPool) -> Result<Vec<PeiRecord>> {
    let peis = sqlx::query_as::<_, PeiRecord>("SELECT * FROM peis ORDER BY updated_at DESC")
        .fetch_all(pool)
        .await
        .context("failed to list PEIs")?;

    Ok(peis)
}

/// Delete a PEI. Returns `true` if a row was removed.
pub async fn delete_pei(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM peis WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete PEI {id}"))?;

    Ok(result.rows_affected() > 0)
}
