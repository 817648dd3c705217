//! Overlapping actions, saves and form replacement.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pei_core::ai::ReasoningMode;
use pei_core::assistant::{ActionError, ActionKind, ActionOutcome};
use pei_core::autosave::{AutosaveOutcome, AutosaveTracker};
use pei_core::store::RecordStore;

use common::{CountingStore, ScriptedGenerator, assistant, fill_required};

const FAST: ReasoningMode = ReasoningMode::Fast;

/// Yield until the generator has received `n` prompts.
async fn wait_for_calls(generator: &ScriptedGenerator, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while generator.calls() < n {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("generator was never called");
}

#[tokio::test]
async fn duplicate_action_on_same_field_is_refused() {
    let (generator, gate) = ScriptedGenerator::gated();
    let generator = Arc::new(generator);
    generator.push("Revisão bimestral");
    let store = Arc::new(CountingStore::default());
    let assistant = assistant(&generator, &store);
    fill_required(&assistant, "Ana").await;

    let first = {
        let assistant = Arc::clone(&assistant);
        tokio::spawn(async move { assistant.run_action("revisao", ActionKind::Fill, FAST).await })
    };
    wait_for_calls(&generator, 1).await;
    assert!(
        assistant
            .with_session(|s| s.is_loading("revisao", ActionKind::Fill))
            .await
    );

    let err = assistant
        .run_action("revisao", ActionKind::Fill, FAST)
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::InFlight(ref key) if key == "revisao-fill"));
    assert_eq!(generator.calls(), 1);

    gate.add_permits(1);
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, ActionOutcome::Staged(_)));
    assert!(!assistant.with_session(|s| s.busy()).await);
}

#[tokio::test]
async fn actions_on_different_fields_run_together() {
    let (generator, gate) = ScriptedGenerator::gated();
    let generator = Arc::new(generator);
    generator.push("um").push("dois");
    let store = Arc::new(CountingStore::default());
    let assistant = assistant(&generator, &store);
    fill_required(&assistant, "Ana").await;

    let spawn = |field: &'static str| {
        let assistant = Arc::clone(&assistant);
        tokio::spawn(async move { assistant.run_action(field, ActionKind::Fill, FAST).await })
    };
    let a = spawn("revisao");
    wait_for_calls(&generator, 1).await;
    let b = spawn("est-parcerias");
    wait_for_calls(&generator, 2).await;

    let (loading_a, loading_b) = assistant
        .with_session(|s| {
            (
                s.is_loading("revisao", ActionKind::Fill),
                s.is_loading("est-parcerias", ActionKind::Fill),
            )
        })
        .await;
    assert!(loading_a && loading_b);

    gate.add_permits(2);
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    // Single-slot gate: the later draft replaced the earlier one.
    assert!(assistant.pending_draft().await.is_some());
    assert!(!assistant.with_session(|s| s.busy()).await);
}

#[tokio::test]
async fn autosave_proceeds_while_request_is_outstanding() {
    let (generator, gate) = ScriptedGenerator::gated();
    let generator = Arc::new(generator);
    generator.push("texto");
    let store = Arc::new(CountingStore::default());
    let assistant = assistant(&generator, &store);
    fill_required(&assistant, "Ana").await;

    let pending = {
        let assistant = Arc::clone(&assistant);
        tokio::spawn(async move { assistant.run_action("revisao", ActionKind::Fill, FAST).await })
    };
    wait_for_calls(&generator, 1).await;

    let mut tracker = AutosaveTracker::new(false);
    let outcome = assistant.autosave(&mut tracker).await.unwrap();
    let AutosaveOutcome::Saved(id) = outcome else {
        panic!("expected a save");
    };
    assert_eq!(store.saves(), 1);
    assert_eq!(
        assistant.with_session(|s| s.form.record_id()).await,
        Some(id)
    );

    gate.add_permits(1);
    pending.await.unwrap().unwrap();
}

#[tokio::test]
async fn reply_for_replaced_form_is_dropped() {
    let (generator, gate) = ScriptedGenerator::gated();
    let generator = Arc::new(generator);
    generator.push("antigo");
    let store = Arc::new(CountingStore::default());
    let assistant = assistant(&generator, &store);
    fill_required(&assistant, "Ana").await;

    let pending = {
        let assistant = Arc::clone(&assistant);
        tokio::spawn(async move { assistant.run_action("revisao", ActionKind::Fill, FAST).await })
    };
    wait_for_calls(&generator, 1).await;

    assistant.new_pei().await;
    gate.add_permits(1);

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, ActionError::Superseded));
    assert!(assistant.pending_draft().await.is_none());
    assert!(!assistant.with_session(|s| s.busy()).await);
}

#[tokio::test]
async fn concurrent_saves_share_one_record() {
    let generator = Arc::new(ScriptedGenerator::new());
    let store = Arc::new(CountingStore::default());
    let assistant = assistant(&generator, &store);
    fill_required(&assistant, "Ana").await;

    let mut tracker = AutosaveTracker::new(false);
    let (saved, auto) = tokio::join!(assistant.save(), assistant.autosave(&mut tracker));
    let saved = saved.unwrap();
    assert_eq!(auto.unwrap(), AutosaveOutcome::Saved(saved.id));
    assert_eq!(store.saves(), 2);
    assert_eq!(store.list_peis().await.unwrap().len(), 1);
}
