//! Periodic background saving of the edit session.
//!
//! The task ticks on a fixed period, the first tick one full period after
//! start. A tick saves only when the student name is filled in, and it saves
//! whatever the form holds at that moment, even while model requests are
//! outstanding.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pei_db::models::NewPeiRecord;

use crate::assistant::Assistant;

/// Autosave timing and dirty-check settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub interval: Duration,
    /// Skip ticks whose snapshot matches the last one saved.
    pub skip_unchanged: bool,
}

impl AutosaveConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            skip_unchanged: false,
        }
    }
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveOutcome {
    Saved(Uuid),
    /// No student name yet.
    NoOwner,
    /// Identical to the previous save and `skip_unchanged` is on.
    Unchanged,
}

/// SHA-256 over the record id, display name and snapshot.
pub fn fingerprint(id: Option<Uuid>, record: &NewPeiRecord, display_name: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(id) = id {
        hasher.update(id.as_bytes());
    }
    hasher.update(display_name.as_bytes());
    hasher.update([0u8]);
    // Serializing maps of strings cannot fail.
    if let Ok(bytes) = serde_json::to_vec(record) {
        hasher.update(&bytes);
    }
    hex::encode(hasher.finalize())
}

/// Remembers the last saved snapshot for the dirty-check.
#[derive(Debug, Clone, Default)]
pub struct AutosaveTracker {
    skip_unchanged: bool,
    last: Option<String>,
}

impl AutosaveTracker {
    pub fn new(skip_unchanged: bool) -> Self {
        Self {
            skip_unchanged,
            last: None,
        }
    }

    pub fn should_save(&self, id: Option<Uuid>, record: &NewPeiRecord, display_name: &str) -> bool {
        if !self.skip_unchanged {
            return true;
        }
        self.last.as_deref() != Some(fingerprint(id, record, display_name).as_str())
    }

    pub fn saved(&mut self, id: Option<Uuid>, record: &NewPeiRecord, display_name: &str) {
        if self.skip_unchanged {
            self.last = Some(fingerprint(id, record, display_name));
        }
    }
}

/// Spawn the autosave loop. It runs until `cancel` fires.
pub fn spawn_autosave(
    assistant: Arc<Assistant>,
    config: AutosaveConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tracker = AutosaveTracker::new(config.skip_unchanged);
        info!(interval_ms = config.interval.as_millis() as u64, "autosave started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match assistant.autosave(&mut tracker).await {
                        Ok(AutosaveOutcome::Saved(id)) => debug!(record_id = %id, "autosave tick saved"),
                        Ok(outcome) => debug!(?outcome, "autosave tick skipped"),
                        Err(e) => warn!(error = %e, "autosave failed"),
                    }
                }
            }
        }

        info!("autosave stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> NewPeiRecord {
        let mut record = NewPeiRecord::default();
        record.data.insert("aluno-nome".into(), name.into());
        record
    }

    #[test]
    fn fingerprint_tracks_content() {
        let id = Some(Uuid::new_v4());
        let a = fingerprint(id, &record("Ana"), "Ana");
        assert_eq!(a, fingerprint(id, &record("Ana"), "Ana"));
        assert_ne!(a, fingerprint(id, &record("Bia"), "Ana"));
        assert_ne!(a, fingerprint(None, &record("Ana"), "Ana"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn tracker_without_dirty_check_always_saves() {
        let mut tracker = AutosaveTracker::new(false);
        tracker.saved(None, &record("Ana"), "Ana");
        assert!(tracker.should_save(None, &record("Ana"), "Ana"));
    }

    #[test]
    fn tracker_with_dirty_check_skips_repeats() {
        let mut tracker = AutosaveTracker::new(true);
        let id = Some(Uuid::new_v4());
        assert!(tracker.should_save(id, &record("Ana"), "Ana"));
        tracker.saved(id, &record("Ana"), "Ana");
        assert!(!tracker.should_save(id, &record("Ana"), "Ana"));
        assert!(tracker.should_save(id, &record("Ana Souza"), "Ana Souza"));
    }
}
