//! Database query functions for the `rag_files` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewRagFile, RagFile};

/// Insert a support file.
pub async fn insert_rag_file(pool: &PgPool, new: &NewRagFile) -> Result<RagFile> {
    let file = sqlx::query_as::<_, RagFile>(
        "INSERT INTO rag_files (name, kind, mime_type, content, selected) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(&new.name)
    .bind(new.kind)
    .bind(&new.mime_type)
    .bind(&new.content)
    .bind(new.selected)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert support file {:?}", new.name))?;

    Ok(file)
}

/// List all support files in upload order.
pub async fn list_rag_files(pool: &PgPool) -> Result<Vec<RagFile>> {
    let files = sqlx::query_as::<_, RagFile>("SELECT * FROM rag_files ORDER BY created_at ASC, name")
        .fetch_all(pool)
        .await
        .context("failed to list support files")?;

    Ok(files)
}

/// Set the `selected` flag. Returns the updated row, or `None` if missing.
pub async fn set_selected(pool: &PgPool, id: Uuid, selected: bool) -> Result<Option<RagFile>> {
    let file = sqlx::query_as::<_, RagFile>(
        "UPDATE rag_files SET selected = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(selected)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to update support file {id}"))?;

    Ok(file)
}

/// Delete a support file. Returns `true` if a row was removed.
pub async fn delete_rag_file(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM rag_files WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete support file {id}"))?;

    Ok(result.rows_affected() > 0)
}
