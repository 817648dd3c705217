//! Database query functions for the `activities` table (the activity bank).

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Activity, NewActivity};

/// Insert a batch of activities in one transaction.
///
/// `source_pei_id` records which PEI the suggestions came from, if any.
/// Returns the stored rows in input order.
pub async fn insert_activities(
    pool: &PgPool,
    activities: &[NewActivity],
    source_pei_id: Option<Uuid>,
) -> Result<Vec<Activity>> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let mut stored = Vec::with_capacity(activities.len());

    for new in activities {
        let activity = sqlx::query_as::<_, Activity>(
            "INSERT INTO activities \
             (title, description, discipline, skills, needs, goal_tags, is_favorited, is_dua, source_pei_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING *",
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.discipline)
        .bind(&new.skills)
        .bind(&new.needs)
        .bind(&new.goal_tags)
        .bind(new.is_favorited)
        .bind(new.is_dua)
        .bind(source_pei_id)
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("failed to insert activity {:?}", new.title))?;
        stored.push(activity);
    }

    tx.commit().await.context("failed to commit activities")?;
    Ok(stored)
}

/// List every activity in the bank, newest first.
pub async fn list_activities(pool: &PgPool) -> Result<Vec<Activity>> {
    let activities =
        sqlx::query_as::<_, Activity>("SELECT * FROM activities ORDER BY created_at DESC, title")
            .fetch_all(pool)
            .await
            .context("failed to list activities")?;

    Ok(activities)
}

/// Fetch one activity by id.
pub async fn get_activity(pool: &PgPool, id: Uuid) -> Result<Option<Activity>> {
    let activity = sqlx::query_as::<_, Activity>("SELECT * FROM activities WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch activity")?;

    Ok(activity)
}

/// Flip the favorite flag. Returns the updated row, or `None` if missing.
pub async fn toggle_favorite(pool: &PgPool, id: Uuid) -> Result<Option<Activity>> {
    let activity = sqlx::query_as::<_, Activity>(
        "UPDATE activities SET is_favorited = NOT is_favorited WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to toggle favorite on activity {id}"))?;

    Ok(activity)
}

/// Delete an activity. Returns `true` if a row was removed.
pub async fn delete_activity(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM activities WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete activity {id}"))?;

    Ok(result.rows_affected() > 0)
}
