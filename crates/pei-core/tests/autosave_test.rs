//! Autosave loop timing, driven by a paused clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use pei_core::autosave::{AutosaveConfig, spawn_autosave};
use pei_core::store::RecordStore;

use common::{CountingStore, ScriptedGenerator, assistant};

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

#[tokio::test(start_paused = true)]
async fn nothing_saved_without_student_name() {
    let generator = Arc::new(ScriptedGenerator::new());
    let store = Arc::new(CountingStore::default());
    let assistant = assistant(&generator, &store);
    assistant.set_field("aluno-nome", "   ").await;
    assistant.set_field("aval-social", "Interage bem").await;

    let cancel = CancellationToken::new();
    let handle = spawn_autosave(Arc::clone(&assistant), AutosaveConfig::default(), cancel.clone());

    sleep(secs(16.0)).await;
    assert_eq!(store.saves(), 0);
    assert!(assistant.with_session(|s| s.form.record_id().is_none()).await);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn first_tick_waits_a_full_interval() {
    let generator = Arc::new(ScriptedGenerator::new());
    let store = Arc::new(CountingStore::default());
    let assistant = assistant(&generator, &store);
    assistant.set_field("aluno-nome", "Ana").await;

    let cancel = CancellationToken::new();
    let handle = spawn_autosave(Arc::clone(&assistant), AutosaveConfig::default(), cancel.clone());

    sleep(secs(4.9)).await;
    assert_eq!(store.saves(), 0);
    sleep(secs(0.2)).await;
    assert_eq!(store.saves(), 1);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn ticks_adopt_then_reuse_identifier() {
    let generator = Arc::new(ScriptedGenerator::new());
    let store = Arc::new(CountingStore::default());
    let assistant = assistant(&generator, &store);
    assistant.set_field("aluno-nome", " Ana ").await;

    let cancel = CancellationToken::new();
    let handle = spawn_autosave(Arc::clone(&assistant), AutosaveConfig::default(), cancel.clone());

    sleep(secs(5.1)).await;
    let id = assistant
        .with_session(|s| s.form.record_id())
        .await
        .expect("first tick adopts an id");

    // Required fields stay blank: autosave does not validate.
    assistant.set_field("revisao", "Mensal").await;
    sleep(secs(10.0)).await;
    assert_eq!(store.saves(), 3);

    let peis = store.list_peis().await.unwrap();
    assert_eq!(peis.len(), 1);
    assert_eq!(peis[0].id, id);
    assert_eq!(peis[0].student_name, "Ana");
    assert_eq!(peis[0].data.0["revisao"], "Mensal");

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unchanged_snapshots_are_skipped_when_enabled() {
    let generator = Arc::new(ScriptedGenerator::new());
    let store = Arc::new(CountingStore::default());
    let assistant = assistant(&generator, &store);
    assistant.set_field("aluno-nome", "Ana").await;

    let config = AutosaveConfig {
        skip_unchanged: true,
        ..AutosaveConfig::default()
    };
    let cancel = CancellationToken::new();
    let handle = spawn_autosave(Arc::clone(&assistant), config, cancel.clone());

    sleep(secs(15.1)).await;
    assert_eq!(store.saves(), 1);

    assistant.set_field("revisao", "Bimestral").await;
    sleep(secs(5.0)).await;
    assert_eq!(store.saves(), 2);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_the_loop() {
    let generator = Arc::new(ScriptedGenerator::new());
    let store = Arc::new(CountingStore::default());
    let assistant = assistant(&generator, &store);
    assistant.set_field("aluno-nome", "Ana").await;

    let cancel = CancellationToken::new();
    let handle = spawn_autosave(Arc::clone(&assistant), AutosaveConfig::default(), cancel.clone());

    sleep(secs(5.1)).await;
    assert_eq!(store.saves(), 1);

    cancel.cancel();
    handle.await.unwrap();

    sleep(secs(30.0)).await;
    assert_eq!(store.saves(), 1);
}
