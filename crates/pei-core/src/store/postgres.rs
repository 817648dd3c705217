use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use pei_db::models::{Activity, NewActivity, NewPeiRecord, NewRagFile, PeiRecord, RagFile};
use pei_db::queries::{activities, peis, rag_files};

use super::RecordStore;

/// [`RecordStore`] over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn save_pei(
        &self,
        id: Option<Uuid>,
        record: &NewPeiRecord,
        display_name: &str,
    ) -> Result<PeiRecord> {
        let Some(id) = id else {
            return peis::insert_pei(&self.pool, record, display_name).await;
        };
        match peis::update_pei(&self.pool, id, record, display_name).await? {
            Some(updated) => Ok(updated),
            None => {
                debug!(%id, "record missing, recreating under the same id");
                peis::insert_pei_with_id(&self.pool, id, record, display_name).await
            }
        }
    }

    async fn get_pei(&self, id: Uuid) -> Result<Option<PeiRecord>> {
        peis::get_pei(&self.pool, id).await
    }

    async fn list_peis(&self) -> Result<Vec<PeiRecord>> {
        peis::list_peis(&self.pool).await
    }

    async fn delete_pei(&self, id: Uuid) -> Result<bool> {
        peis::delete_pei(&self.pool, id).await
    }

    async fn add_activities(
        &self,
        new: &[NewActivity],
        source_pei_id: Option<Uuid>,
    ) -> Result<Vec<Activity>> {
        activities::insert_activities(&self.pool, new, source_pei_id).await
    }

    async fn list_activities(&self) -> Result<Vec<Activity>> {
        activities::list_activities(&self.pool).await
    }

    async fn get_activity(&self, id: Uuid) -> Result<Option<Activity>> {
        activities::get_activity(&self.pool, id).await
    }

    async fn toggle_favorite(&self, id: Uuid) -> Result<Option<Activity>> {
        activities::toggle_favorite(&self.pool, id).await
    }

    async fn delete_activity(&self, id: Uuid) -> Result<bool> {
        activities::delete_activity(&self.pool, id).await
    }

    async fn list_rag_files(&self) -> Result<Vec<RagFile>> {
        rag_files::list_rag_files(&self.pool).await
    }

    async fn add_rag_file(&self, file: &NewRagFile) -> Result<RagFile> {
        rag_files::insert_rag_file(&self.pool, file).await
    }

    async fn set_rag_file_selected(&self, id: Uuid, selected: bool) -> Result<Option<RagFile>> {
        rag_files::set_selected(&self.pool, id, selected).await
    }

    async fn delete_rag_file(&self, id: Uuid) -> Result<bool> {
        rag_files::delete_rag_file(&self.pool, id).await
    }
}
