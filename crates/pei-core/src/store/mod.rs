//! Record persistence behind an object-safe trait.
//!
//! [`PgStore`] keeps records in PostgreSQL through `pei-db`;
//! [`MemoryStore`] keeps them in process and backs tests and dry runs.

mod memory;
mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use pei_db::models::{Activity, NewActivity, NewPeiRecord, NewRagFile, PeiRecord, RagFile};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Display name used when a record is saved without a student name.
pub const UNNAMED_RECORD: &str = "PEI sem nome";

/// Storage for PEI records, the activity bank and support files.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create or overwrite a PEI record.
    ///
    /// With `id` set the record keeps that identifier, whether or not it
    /// existed before. Without it a new identifier is assigned.
    async fn save_pei(
        &self,
        id: Option<Uuid>,
        record: &NewPeiRecord,
        display_name: &str,
    ) -> Result<PeiRecord>;

    async fn get_pei(&self, id: Uuid) -> Result<Option<PeiRecord>>;

    /// All records, most recently updated first.
    async fn list_peis(&self) -> Result<Vec<PeiRecord>>;

    async fn delete_pei(&self, id: Uuid) -> Result<bool>;

    /// Add activities to the bank, optionally linked to the PEI they came from.
    async fn add_activities(
        &self,
        activities: &[NewActivity],
        source_pei_id: Option<Uuid>,
    ) -> Result<Vec<Activity>>;

    /// All bank activities, newest first.
    async fn list_activities(&self) -> Result<Vec<Activity>>;

    async fn get_activity(&self, id: Uuid) -> Result<Option<Activity>>;

    /// Flip the favorite flag. `None` if the activity does not exist.
    async fn toggle_favorite(&self, id: Uuid) -> Result<Option<Activity>>;

    async fn delete_activity(&self, id: Uuid) -> Result<bool>;

    /// All support files in upload order.
    async fn list_rag_files(&self) -> Result<Vec<RagFile>>;

    async fn add_rag_file(&self, file: &NewRagFile) -> Result<RagFile>;

    async fn set_rag_file_selected(&self, id: Uuid, selected: bool) -> Result<Option<RagFile>>;

    async fn delete_rag_file(&self, id: Uuid) -> Result<bool>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn RecordStore) {}
};
