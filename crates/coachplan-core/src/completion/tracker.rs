//! Offline-first completion toggles.
//!
//! A toggle is written to the local log first and pushed to the store
//! afterwards. Remote failures never reach the caller as errors: the entry
//! stays unreconciled, overrides what reads return, and is pushed again by
//! the next [`CompletionTracker::retry_pending`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use super::log::{CompletionEntry, CompletionTarget, LocalCompletionLog, LocalLogError, SyncState};
use crate::engine::{EngineConfig, ScheduleEngine};
use crate::error::{ScheduleError, ScheduleResult};
use crate::store::{DayView, ScheduleStore};
use crate::week::WeekKey;

/// Configuration for completion reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Pause after the app regains focus before re-reading, so in-flight
    /// pushes can land first.
    pub resume_grace: Duration,
    /// Upper bound for each remote call.
    pub remote_timeout: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            resume_grace: Duration::from_millis(1500),
            remote_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Log(#[from] LocalLogError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Result of a toggle as seen by the caller. The local state is already
/// correct in every case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ToggleOutcome {
    Synced,
    /// Remote update failed; kept for retry.
    Deferred { error: String },
    /// The target no longer exists remotely; the entry was dropped.
    Missing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetrySummary {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    pub missing: usize,
}

pub struct CompletionTracker {
    engine: ScheduleEngine,
    log: Mutex<LocalCompletionLog>,
    config: ReconcileConfig,
}

impl CompletionTracker {
    pub fn new(store: Arc<dyn ScheduleStore>, log: LocalCompletionLog, config: ReconcileConfig) -> Self {
        let engine = ScheduleEngine::new(
            store,
            EngineConfig {
                call_timeout: config.remote_timeout,
            },
        );
        Self {
            engine,
            log: Mutex::new(log),
            config,
        }
    }

    /// Record the new state locally, then push it.
    pub async fn toggle(
        &self,
        target: CompletionTarget,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<ToggleOutcome, LocalLogError> {
        let entry = {
            let mut log = self.log.lock().await;
            let entry = log.record(target, completed, now)?;
            log.set_state(target, entry.seq, SyncState::Syncing, None)?;
            entry
        };

        let result = self.push(target, completed).await;
        self.settle(&entry, result).await
    }

    /// Push every unreconciled entry again.
    pub async fn retry_pending(&self) -> Result<RetrySummary, LocalLogError> {
        let pending = self.log.lock().await.pending();
        let mut summary = RetrySummary::default();

        for entry in pending {
            {
                let mut log = self.log.lock().await;
                if !log.set_state(entry.target, entry.seq, SyncState::Syncing, None)? {
                    // Superseded by a newer toggle.
                    continue;
                }
            }
            summary.attempted += 1;
            let result = self.push(entry.target, entry.completed).await;
            match self.settle(&entry, result).await? {
                ToggleOutcome::Synced => summary.synced += 1,
                ToggleOutcome::Deferred { .. } => summary.failed += 1,
                ToggleOutcome::Missing => summary.missing += 1,
            }
        }

        if summary.attempted > 0 {
            tracing::info!(
                attempted = summary.attempted,
                synced = summary.synced,
                failed = summary.failed,
                "retried pending completions"
            );
        }
        Ok(summary)
    }

    /// Read a week from the store with unreconciled local toggles applied.
    ///
    /// The log is snapshotted before the fetch. An entry that was not yet
    /// reconciled then, or that changed while the fetch was in flight,
    /// overrides the fetched value. A reconciled entry is dropped once the
    /// fetched value agrees with it; from there on the store is
    /// authoritative.
    pub async fn read_week(&self, student_id: &str, coach_id: &str, week: WeekKey) -> Result<Vec<DayView>, ReconcileError> {
        let before: HashMap<CompletionTarget, (u64, SyncState)> = self
            .log
            .lock()
            .await
            .entries()
            .map(|e| (e.target, (e.seq, e.state)))
            .collect();

        let mut days = self.engine.load_week(student_id, coach_id, week).await?;

        let mut log = self.log.lock().await;
        let mut confirmed = HashMap::new();
        let mut merge = |target: CompletionTarget, fetched: &mut bool| match read_merge(
            log.get(target),
            before.get(&target),
            *fetched,
        ) {
            ReadMerge::Override(completed) => *fetched = completed,
            ReadMerge::Confirmed(seq) => {
                confirmed.insert(target, seq);
            }
            ReadMerge::Remote => {}
        };
        for view in &mut days {
            merge(CompletionTarget::Day(view.day.id), &mut view.day.completed);
            for ex in view.exercises_mut() {
                merge(CompletionTarget::Exercise(ex.id), &mut ex.completed);
            }
        }

        let pruned = log.prune_reconciled(&confirmed)?;
        if pruned > 0 {
            tracing::debug!(week = %week, pruned, "dropped reconciled completion entries");
        }
        Ok(days)
    }

    /// Called when the app comes back to the foreground.
    pub async fn on_resume(&self, student_id: &str, coach_id: &str, week: WeekKey) -> Result<Vec<DayView>, ReconcileError> {
        tokio::time::sleep(self.config.resume_grace).await;
        self.read_week(student_id, coach_id, week).await
    }

    pub async fn pending(&self) -> Vec<CompletionEntry> {
        self.log.lock().await.pending()
    }

    pub async fn entry(&self, target: CompletionTarget) -> Option<CompletionEntry> {
        self.log.lock().await.get(target).cloned()
    }

    async fn push(&self, target: CompletionTarget, completed: bool) -> ScheduleResult<bool> {
        match target {
            CompletionTarget::Exercise(id) => self.engine.set_exercise_completed(id, completed).await,
            CompletionTarget::Day(id) => self.engine.set_day_completed(id, completed).await,
        }
    }

    async fn settle(
        &self,
        entry: &CompletionEntry,
        result: ScheduleResult<bool>,
    ) -> Result<ToggleOutcome, LocalLogError> {
        let mut log = self.log.lock().await;
        match result {
            Ok(true) => {
                log.set_state(entry.target, entry.seq, SyncState::Synced, None)?;
                tracing::debug!(completion = %entry.target, completed = entry.completed, "completion synced");
                Ok(ToggleOutcome::Synced)
            }
            Ok(false) => {
                log.remove(entry.target, entry.seq)?;
                tracing::warn!(completion = %entry.target, "completion target no longer exists, dropping entry");
                Ok(ToggleOutcome::Missing)
            }
            Err(e) => {
                let error = e.report();
                log.set_state(
                    entry.target,
                    entry.seq,
                    SyncState::UnsyncedAfterFailure,
                    Some(error.clone()),
                )?;
                tracing::warn!(completion = %entry.target, error = %error, "completion sync failed, will retry");
                Ok(ToggleOutcome::Deferred { error })
            }
        }
    }
}

enum ReadMerge {
    /// The local value wins over the fetched one.
    Override(bool),
    /// The fetched value confirms the reconciled toggle with this seq.
    Confirmed(u64),
    /// Keep the fetched value.
    Remote,
}

fn read_merge(entry: Option<&CompletionEntry>, before: Option<&(u64, SyncState)>, fetched: bool) -> ReadMerge {
    let Some(entry) = entry else {
        return ReadMerge::Remote;
    };
    let settled_before_fetch = entry.state.is_reconciled() && before == Some(&(entry.seq, SyncState::Synced));
    if !settled_before_fetch {
        ReadMerge::Override(entry.completed)
    } else if fetched == entry.completed {
        ReadMerge::Confirmed(entry.seq)
    } else {
        // Changed remotely after the sync; kept until a read agrees.
        ReadMerge::Remote
    }
}
