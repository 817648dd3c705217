use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::Mutex;
use uuid::Uuid;

use pei_db::models::{Activity, NewActivity, NewPeiRecord, NewRagFile, PeiRecord, RagFile};

use super::RecordStore;

#[derive(Debug, Default)]
struct Tables {
    peis: Vec<PeiRecord>,
    activities: Vec<Activity>,
    rag_files: Vec<RagFile>,
}

/// In-process [`RecordStore`]. Contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn save_pei(
        &self,
        id: Option<Uuid>,
        record: &NewPeiRecord,
        display_name: &str,
    ) -> Result<PeiRecord> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let id = id.unwrap_or_else(Uuid::new_v4);
        let created_at = tables
            .peis
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.created_at)
            .unwrap_or(now);
        tables.peis.retain(|p| p.id != id);

        let saved = PeiRecord {
            id,
            student_name: display_name.to_string(),
            data: Json(record.data.clone()),
            ai_generated_fields: record.ai_generated_fields.clone(),
            smart_analysis: Json(record.smart_analysis.clone()),
            goal_activities: Json(record.goal_activities.clone()),
            created_at,
            updated_at: now,
        };
        // Most recently updated first.
        tables.peis.insert(0, saved.clone());
        Ok(saved)
    }

    async fn get_pei(&self, id: Uuid) -> Result<Option<PeiRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.peis.iter().find(|p| p.id == id).cloned())
    }

    async fn list_peis(&self) -> Result<Vec<PeiRecord>> {
        Ok(self.tables.lock().await.peis.clone())
    }

    async fn delete_pei(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.peis.len();
        tables.peis.retain(|p| p.id != id);
        let removed = tables.peis.len() != before;
        if removed {
            for activity in tables.activities.iter_mut() {
                if activity.source_pei_id == Some(id) {
                    activity.source_pei_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn add_activities(
        &self,
        new: &[NewActivity],
        source_pei_id: Option<Uuid>,
    ) -> Result<Vec<Activity>> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let stored: Vec<Activity> = new
            .iter()
            .map(|a| Activity {
                id: Uuid::new_v4(),
                title: a.title.clone(),
                description: a.description.clone(),
                discipline: a.discipline.clone(),
                skills: a.skills.clone(),
                needs: a.needs.clone(),
                goal_tags: a.goal_tags.clone(),
                is_favorited: a.is_favorited,
                is_dua: a.is_dua,
                source_pei_id,
                created_at: now,
            })
            .collect();
        tables.activities.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn list_activities(&self) -> Result<Vec<Activity>> {
        let tables = self.tables.lock().await;
        Ok(tables.activities.iter().rev().cloned().collect())
    }

    async fn get_activity(&self, id: Uuid) -> Result<Option<Activity>> {
        let tables = self.tables.lock().await;
        Ok(tables.activities.iter().find(|a| a.id == id).cloned())
    }

    async fn toggle_favorite(&self, id: Uuid) -> Result<Option<Activity>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.activities.iter_mut().find(|a| a.id == id).map(|a| {
            a.is_favorited = !a.is_favorited;
            a.clone()
        }))
    }

    async fn delete_activity(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.activities.len();
        tables.activities.retain(|a| a.id != id);
        Ok(tables.activities.len() != before)
    }

    async fn list_rag_files(&self) -> Result<Vec<RagFile>> {
        Ok(self.tables.lock().await.rag_files.clone())
    }

    async fn add_rag_file(&self, file: &NewRagFile) -> Result<RagFile> {
        let stored = RagFile {
            id: Uuid::new_v4(),
            name: file.name.clone(),
            kind: file.kind,
            mime_type: file.mime_type.clone(),
            content: file.content.clone(),
            selected: file.selected,
            created_at: Utc::now(),
        };
        self.tables.lock().await.rag_files.push(stored.clone());
        Ok(stored)
    }

    async fn set_rag_file_selected(&self, id: Uuid, selected: bool) -> Result<Option<RagFile>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.rag_files.iter_mut().find(|f| f.id == id).map(|f| {
            f.selected = selected;
            f.clone()
        }))
    }

    async fn delete_rag_file(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.rag_files.len();
        tables.rag_files.retain(|f| f.id != id);
        Ok(tables.rag_files.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use pei_db::models::RagFileKind;

    use super::*;

    fn record(name: &str) -> NewPeiRecord {
        let mut record = NewPeiRecord::default();
        record.data.insert("aluno-nome".into(), name.into());
        record
    }

    #[tokio::test]
    async fn save_assigns_id_then_overwrites() {
        let store = MemoryStore::new();
        let first = store.save_pei(None, &record("Ana"), "Ana").await.unwrap();
        let second = store
            .save_pei(Some(first.id), &record("Ana Souza"), "Ana Souza")
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        let all = store.list_peis().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].student_name, "Ana Souza");
    }

    #[tokio::test]
    async fn save_with_unknown_id_recreates_record() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        let saved = store.save_pei(Some(id), &record("Ana"), "Ana").await.unwrap();
        assert_eq!(saved.id, id);
        assert!(store.get_pei(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_puts_latest_update_first() {
        let store = MemoryStore::new();
        let a = store.save_pei(None, &record("A"), "A").await.unwrap();
        store.save_pei(None, &record("B"), "B").await.unwrap();
        store.save_pei(Some(a.id), &record("A"), "A").await.unwrap();
        let names: Vec<_> = store
            .list_peis()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.student_name)
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn deleting_pei_unlinks_activities() {
        let store = MemoryStore::new();
        let pei = store.save_pei(None, &record("Ana"), "Ana").await.unwrap();
        let acts = store
            .add_activities(
                &[NewActivity {
                    title: "Bingo".into(),
                    ..Default::default()
                }],
                Some(pei.id),
            )
            .await
            .unwrap();
        assert_eq!(acts[0].source_pei_id, Some(pei.id));

        assert!(store.delete_pei(pei.id).await.unwrap());
        let act = store.get_activity(acts[0].id).await.unwrap().unwrap();
        assert!(act.source_pei_id.is_none());
        assert!(!store.delete_pei(pei.id).await.unwrap());
    }

    #[tokio::test]
    async fn favorites_and_files() {
        let store = MemoryStore::new();
        let acts = store
            .add_activities(
                &[NewActivity {
                    title: "Bingo".into(),
                    ..Default::default()
                }],
                None,
            )
            .await
            .unwrap();
        let toggled = store.toggle_favorite(acts[0].id).await.unwrap().unwrap();
        assert!(toggled.is_favorited);
        assert!(store.toggle_favorite(Uuid::new_v4()).await.unwrap().is_none());

        let file = store
            .add_rag_file(&NewRagFile {
                name: "a.txt".into(),
                kind: RagFileKind::Text,
                mime_type: "text/plain".into(),
                content: "x".into(),
                selected: false,
            })
            .await
            .unwrap();
        let selected = store
            .set_rag_file_selected(file.id, true)
            .await
            .unwrap()
            .unwrap();
        assert!(selected.selected);
        assert!(store.delete_rag_file(file.id).await.unwrap());
        assert!(store.list_rag_files().await.unwrap().is_empty());
    }
}
