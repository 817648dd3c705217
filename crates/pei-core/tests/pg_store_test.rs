//! Assistant flows against PostgreSQL through `PgStore`.
//!
//! Each test creates a unique temporary database through `pei-test-utils`
//! and drops it on completion.

mod common;

use std::sync::Arc;

use pei_core::ai::{Generator, ReasoningMode};
use pei_core::assistant::{ActionKind, ActionOutcome, Assistant};
use pei_core::autosave::{AutosaveOutcome, AutosaveTracker};
use pei_core::store::{PgStore, RecordStore};
use pei_test_utils::{create_test_db, drop_test_db};
use uuid::Uuid;

use common::{CRITIQUE_JSON, ScriptedGenerator, fill_required};

fn assistant_over(store: &Arc<PgStore>, generator: &Arc<ScriptedGenerator>) -> Assistant {
    let generator: Arc<dyn Generator> = generator.clone();
    let store: Arc<dyn RecordStore> = store.clone();
    Assistant::new(generator, store)
}

#[tokio::test]
async fn autosave_then_explicit_save_update_one_row() {
    let (pool, db_name) = create_test_db().await;
    let store = Arc::new(PgStore::new(pool.clone()));
    let generator = Arc::new(ScriptedGenerator::new());
    let assistant = assistant_over(&store, &generator);

    assistant.set_field("aluno-nome", "Ana").await;
    let AutosaveOutcome::Saved(id) = assistant
        .autosave(&mut AutosaveTracker::new(false))
        .await
        .unwrap()
    else {
        panic!("expected an autosave");
    };

    fill_required(&assistant, "Ana Souza").await;
    let saved = assistant.save().await.unwrap();
    assert_eq!(saved.id, id);

    let peis = store.list_peis().await.unwrap();
    assert_eq!(peis.len(), 1);
    assert_eq!(peis[0].student_name, "Ana Souza");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn critique_and_approval_survive_reload() {
    let (pool, db_name) = create_test_db().await;
    let store = Arc::new(PgStore::new(pool.clone()));
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push(CRITIQUE_JSON).push("Rotina visual na sala");
    let assistant = assistant_over(&store, &generator);

    fill_required(&assistant, "Bruno").await;
    assistant.set_field("metas-curto", "Ler palavras").await;
    assert!(matches!(
        assistant
            .run_action("metas-curto", ActionKind::Smart, ReasoningMode::Fast)
            .await
            .unwrap(),
        ActionOutcome::Critique(_)
    ));
    assistant
        .run_action("est-metodologias", ActionKind::Fill, ReasoningMode::Fast)
        .await
        .unwrap();
    assistant.approve().await.unwrap();
    let saved = assistant.save().await.unwrap();

    let reopened = assistant_over(&store, &generator);
    reopened.open_pei(saved.id).await.unwrap();
    let (critique, value, flagged) = reopened
        .with_session(|s| {
            (
                s.form.critique("metas-curto").cloned(),
                s.form.get("est-metodologias").to_string(),
                s.form.is_ai_generated("est-metodologias"),
            )
        })
        .await;
    assert_eq!(critique.unwrap().is_measurable.critique, "sem métrica");
    assert_eq!(value, "Rotina visual na sala");
    assert!(flagged);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn saving_under_a_deleted_id_recreates_the_row() {
    let (pool, db_name) = create_test_db().await;
    let store = Arc::new(PgStore::new(pool.clone()));
    let generator = Arc::new(ScriptedGenerator::new());
    let assistant = assistant_over(&store, &generator);

    fill_required(&assistant, "Carla").await;
    let first = assistant.save().await.unwrap();
    assert!(store.delete_pei(first.id).await.unwrap());

    let again = assistant.save().await.unwrap();
    assert_eq!(again.id, first.id);
    assert!(store.get_pei(first.id).await.unwrap().is_some());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn bank_activities_keep_their_origin_until_it_is_deleted() {
    let (pool, db_name) = create_test_db().await;
    let store = Arc::new(PgStore::new(pool.clone()));
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push(r#"[{"title": "Quebra-cabeça de sílabas", "skills": "leitura"}]"#);
    let assistant = assistant_over(&store, &generator);

    fill_required(&assistant, "Davi").await;
    assistant.set_field("metas-medio", "Formar palavras").await;
    let saved = assistant.save().await.unwrap();

    let ActionOutcome::Activities(activities) = assistant
        .run_action("metas-medio", ActionKind::SuggestActivities, ReasoningMode::Fast)
        .await
        .unwrap()
    else {
        panic!("expected activities");
    };
    let stored = assistant.save_activities(&activities).await.unwrap();
    assert_eq!(stored[0].source_pei_id, Some(saved.id));
    assert_eq!(stored[0].goal_tags, vec!["Médio Prazo"]);

    store.delete_pei(saved.id).await.unwrap();
    let orphan = store.get_activity(stored[0].id).await.unwrap().unwrap();
    assert_eq!(orphan.source_pei_id, None);
    assert!(store.get_activity(Uuid::new_v4()).await.unwrap().is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}
