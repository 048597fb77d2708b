//! Offline-first completion tracking with merge-on-read reconciliation.

pub mod log;
pub mod tracker;

pub use log::{CompletionEntry, CompletionTarget, LocalCompletionLog, LocalLogError, SyncState};
pub use tracker::{
    CompletionTracker, ReconcileConfig, ReconcileError, RetrySummary, ToggleOutcome,
};
