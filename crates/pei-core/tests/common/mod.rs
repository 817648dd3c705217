//! Shared fakes for pei-core integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Semaphore;
use uuid::Uuid;

use pei_core::ai::{Generator, ReasoningMode, ServiceError};
use pei_core::assistant::Assistant;
use pei_core::catalog;
use pei_core::prompt::Prompt;
use pei_core::store::{MemoryStore, RecordStore};
use pei_db::models::{Activity, NewActivity, NewPeiRecord, NewRagFile, PeiRecord, RagFile};

/// Generator that replays queued replies and records every prompt.
///
/// With a gate, each call waits for a permit before answering.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: StdMutex<VecDeque<Result<String, ServiceError>>>,
    prompts: StdMutex<Vec<(Prompt, ReasoningMode)>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls block until the returned semaphore gets permits.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let generator = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (generator, gate)
    }

    pub fn push(&self, reply: impl Into<String>) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(reply.into()));
        self
    }

    pub fn push_err(&self, err: ServiceError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<(Prompt, ReasoningMode)> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &Prompt, mode: ReasoningMode) -> Result<String, ServiceError> {
        self.prompts.lock().unwrap().push((prompt.clone(), mode));
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ServiceError::EmptyResponse))
    }
}

/// MemoryStore that counts PEI saves.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    saves: AtomicUsize,
}

impl CountingStore {
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn save_pei(
        &self,
        id: Option<Uuid>,
        record: &NewPeiRecord,
        display_name: &str,
    ) -> Result<PeiRecord> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_pei(id, record, display_name).await
    }

    async fn get_pei(&self, id: Uuid) -> Result<Option<PeiRecord>> {
        self.inner.get_pei(id).await
    }

    async fn list_peis(&self) -> Result<Vec<PeiRecord>> {
        self.inner.list_peis().await
    }

    async fn delete_pei(&self, id: Uuid) -> Result<bool> {
        self.inner.delete_pei(id).await
    }

    async fn add_activities(
        &self,
        activities: &[NewActivity],
        source_pei_id: Option<Uuid>,
    ) -> Result<Vec<Activity>> {
        self.inner.add_activities(activities, source_pei_id).await
    }

    async fn list_activities(&self) -> Result<Vec<Activity>> {
        self.inner.list_activities().await
    }

    async fn get_activity(&self, id: Uuid) -> Result<Option<Activity>> {
        self.inner.get_activity(id).await
    }

    async fn toggle_favorite(&self, id: Uuid) -> Result<Option<Activity>> {
        self.inner.toggle_favorite(id).await
    }

    async fn delete_activity(&self, id: Uuid) -> Result<bool> {
        self.inner.delete_activity(id).await
    }

    async fn list_rag_files(&self) -> Result<Vec<RagFile>> {
        self.inner.list_rag_files().await
    }

    async fn add_rag_file(&self, file: &NewRagFile) -> Result<RagFile> {
        self.inner.add_rag_file(file).await
    }

    async fn set_rag_file_selected(&self, id: Uuid, selected: bool) -> Result<Option<RagFile>> {
        self.inner.set_rag_file_selected(id, selected).await
    }

    async fn delete_rag_file(&self, id: Uuid) -> Result<bool> {
        self.inner.delete_rag_file(id).await
    }
}

/// Assistant wired to the given fakes.
pub fn assistant(
    generator: &Arc<ScriptedGenerator>,
    store: &Arc<CountingStore>,
) -> Arc<Assistant> {
    let generator: Arc<dyn Generator> = generator.clone();
    let store: Arc<dyn RecordStore> = store.clone();
    Arc::new(Assistant::new(generator, store))
}

/// Fill every mandatory field, naming the student `name`.
pub async fn fill_required(assistant: &Assistant, name: &str) {
    for id in catalog::catalog().required_fields() {
        let value = if id == catalog::OWNER_FIELD {
            name.to_string()
        } else {
            format!("valor de {id}")
        };
        assistant.set_field(id, value).await;
    }
}

pub const CRITIQUE_JSON: &str = r#"{
    "isSpecific": {"critique": "vaga", "suggestion": "detalhar"},
    "isMeasurable": {"critique": "sem métrica", "suggestion": "usar %"},
    "isAchievable": {"critique": "ok", "suggestion": "manter"},
    "isRelevant": {"critique": "ok", "suggestion": "manter"},
    "isTimeBound": {"critique": "sem prazo", "suggestion": "3 meses"}
}"#;
