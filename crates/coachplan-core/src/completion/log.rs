//! Local completion log.
//!
//! One entry per target, persisted as JSON in the state directory. Every
//! change is written to disk (temp file, fsync, rename) before the caller
//! goes on to talk to the remote store.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const LOG_VERSION: u32 = 1;

/// What a completion toggle applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CompletionTarget {
    Exercise(Uuid),
    Day(Uuid),
}

impl std::fmt::Display for CompletionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exercise(id) => write!(f, "exercise {id}"),
            Self::Day(id) => write!(f, "day {id}"),
        }
    }
}

/// Reconciliation state of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Unsynced,
    Syncing,
    Synced,
    /// A remote attempt failed. Read-merge treats it like `Unsynced`.
    UnsyncedAfterFailure,
}

impl SyncState {
    pub fn is_reconciled(self) -> bool {
        self == SyncState::Synced
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub target: CompletionTarget,
    pub completed: bool,
    pub state: SyncState,
    pub recorded_at: DateTime<Utc>,
    /// Increases with every toggle; stale remote results are matched
    /// against it and ignored.
    pub seq: u64,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Error)]
pub enum LocalLogError {
    #[error("failed to access completion log {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("completion log {path} is not valid JSON")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("completion log {path} has unsupported version {version}")]
    Version { path: PathBuf, version: u32 },
}

#[derive(Debug, Serialize, Deserialize)]
struct LogFile {
    version: u32,
    next_seq: u64,
    entries: Vec<CompletionEntry>,
}

#[derive(Debug)]
pub struct LocalCompletionLog {
    path: PathBuf,
    next_seq: u64,
    entries: BTreeMap<CompletionTarget, CompletionEntry>,
}

impl LocalCompletionLog {
    pub const FILE_NAME: &'static str = "completion-log.json";

    /// Open the log in `state_dir`, creating the directory when needed.
    ///
    /// An entry persisted mid-sync never learned its result, so it comes
    /// back as [`SyncState::UnsyncedAfterFailure`].
    pub fn open(state_dir: &Path) -> Result<Self, LocalLogError> {
        fs::create_dir_all(state_dir).map_err(|source| LocalLogError::Io {
            path: state_dir.to_path_buf(),
            source,
        })?;
        let path = state_dir.join(Self::FILE_NAME);

        let file = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<LogFile>(&bytes).map_err(|source| LocalLogError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LogFile {
                version: LOG_VERSION,
                next_seq: 1,
                entries: Vec::new(),
            },
            Err(source) => return Err(LocalLogError::Io { path, source }),
        };
        if file.version != LOG_VERSION {
            return Err(LocalLogError::Version {
                path,
                version: file.version,
            });
        }

        let mut downgraded = 0usize;
        let entries = file
            .entries
            .into_iter()
            .map(|mut entry| {
                if entry.state == SyncState::Syncing {
                    entry.state = SyncState::UnsyncedAfterFailure;
                    downgraded += 1;
                }
                (entry.target, entry)
            })
            .collect();
        if downgraded > 0 {
            tracing::warn!(path = %path.display(), entries = downgraded, "found interrupted syncs in completion log");
        }

        Ok(Self {
            path,
            next_seq: file.next_seq.max(1),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, target: CompletionTarget) -> Option<&CompletionEntry> {
        self.entries.get(&target)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CompletionEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries not yet confirmed remotely.
    pub fn pending(&self) -> Vec<CompletionEntry> {
        self.entries
            .values()
            .filter(|e| !e.state.is_reconciled())
            .cloned()
            .collect()
    }

    /// Record a toggle, replacing any earlier entry for the target, and
    /// persist it.
    pub fn record(
        &mut self,
        target: CompletionTarget,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<CompletionEntry, LocalLogError> {
        let entry = CompletionEntry {
            target,
            completed,
            state: SyncState::Unsynced,
            recorded_at: now,
            seq: self.next_seq,
            attempts: 0,
            last_error: None,
        };
        self.next_seq += 1;
        self.entries.insert(target, entry.clone());
        self.persist()?;
        Ok(entry)
    }

    /// Move the entry for `target` to `state` if it is still the toggle
    /// numbered `seq`. Returns whether it was updated.
    pub fn set_state(
        &mut self,
        target: CompletionTarget,
        seq: u64,
        state: SyncState,
        error: Option<String>,
    ) -> Result<bool, LocalLogError> {
        let Some(entry) = self.entries.get_mut(&target).filter(|e| e.seq == seq) else {
            return Ok(false);
        };
        if state == SyncState::Syncing {
            entry.attempts += 1;
        }
        entry.state = state;
        entry.last_error = error;
        self.persist()?;
        Ok(true)
    }

    /// Drop the entry for `target` if it is still the toggle numbered `seq`.
    pub fn remove(&mut self, target: CompletionTarget, seq: u64) -> Result<bool, LocalLogError> {
        if self.entries.get(&target).is_none_or(|e| e.seq != seq) {
            return Ok(false);
        }
        self.entries.remove(&target);
        self.persist()?;
        Ok(true)
    }

    /// Drop reconciled entries that a read has confirmed. `confirmed` maps
    /// each target to the toggle a remote read agreed with; an entry
    /// replaced by a newer toggle since is kept.
    pub fn prune_reconciled(&mut self, confirmed: &HashMap<CompletionTarget, u64>) -> Result<usize, LocalLogError> {
        let before = self.entries.len();
        self.entries.retain(|target, entry| {
            !(entry.state.is_reconciled() && confirmed.get(target) == Some(&entry.seq))
        });
        let pruned = before - self.entries.len();
        if pruned > 0 {
            self.persist()?;
        }
        Ok(pruned)
    }

    fn persist(&self) -> Result<(), LocalLogError> {
        let file = LogFile {
            version: LOG_VERSION,
            next_seq: self.next_seq,
            entries: self.entries.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|source| LocalLogError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source| LocalLogError::Io {
            path: tmp.clone(),
            source,
        };
        let mut out = fs::File::create(&tmp).map_err(io_err)?;
        out.write_all(&bytes).map_err(io_err)?;
        out.sync_all().map_err(io_err)?;
        drop(out);
        fs::rename(&tmp, &self.path).map_err(|source| LocalLogError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn record_persists_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let target = CompletionTarget::Exercise(Uuid::new_v4());

        let mut log = LocalCompletionLog::open(dir.path()).unwrap();
        let entry = log.record(target, true, now()).unwrap();
        assert_eq!(entry.state, SyncState::Unsynced);

        let reopened = LocalCompletionLog::open(dir.path()).unwrap();
        let stored = reopened.get(target).expect("entry on disk");
        assert!(stored.completed);
        assert_eq!(stored.seq, entry.seq);
        assert!(!dir.path().join("completion-log.json.tmp").exists());
    }

    #[test]
    fn interrupted_sync_is_downgraded_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let target = CompletionTarget::Day(Uuid::new_v4());

        let mut log = LocalCompletionLog::open(dir.path()).unwrap();
        let entry = log.record(target, true, now()).unwrap();
        assert!(log.set_state(target, entry.seq, SyncState::Syncing, None).unwrap());
        drop(log);

        let reopened = LocalCompletionLog::open(dir.path()).unwrap();
        let stored = reopened.get(target).unwrap();
        assert_eq!(stored.state, SyncState::UnsyncedAfterFailure);
        assert_eq!(stored.attempts, 1);
        assert_eq!(reopened.pending().len(), 1);
    }

    #[test]
    fn stale_results_do_not_touch_newer_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let target = CompletionTarget::Exercise(Uuid::new_v4());
        let mut log = LocalCompletionLog::open(dir.path()).unwrap();

        let first = log.record(target, true, now()).unwrap();
        let second = log.record(target, false, now()).unwrap();
        assert!(second.seq > first.seq);

        assert!(!log.set_state(target, first.seq, SyncState::Synced, None).unwrap());
        assert!(!log.remove(target, first.seq).unwrap());
        let current = log.get(target).unwrap();
        assert_eq!(current.state, SyncState::Unsynced);
        assert!(!current.completed);
    }

    #[test]
    fn sequence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let target = CompletionTarget::Exercise(Uuid::new_v4());
        let first = {
            let mut log = LocalCompletionLog::open(dir.path()).unwrap();
            log.record(target, true, now()).unwrap()
        };
        let mut log = LocalCompletionLog::open(dir.path()).unwrap();
        let second = log.record(target, false, now()).unwrap();
        assert!(second.seq > first.seq);
    }

    #[test]
    fn prune_only_removes_confirmed_reconciled_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = LocalCompletionLog::open(dir.path()).unwrap();
        let synced_seen = CompletionTarget::Exercise(Uuid::new_v4());
        let synced_unseen = CompletionTarget::Exercise(Uuid::new_v4());
        let pending_seen = CompletionTarget::Exercise(Uuid::new_v4());

        let mut confirmed = HashMap::new();
        for target in [synced_seen, synced_unseen] {
            let e = log.record(target, true, now()).unwrap();
            log.set_state(target, e.seq, SyncState::Synced, None).unwrap();
            if target == synced_seen {
                confirmed.insert(target, e.seq);
            }
        }
        let pending = log.record(pending_seen, true, now()).unwrap();
        confirmed.insert(pending_seen, pending.seq);

        assert_eq!(log.prune_reconciled(&confirmed).unwrap(), 1);
        assert!(log.get(synced_seen).is_none());
        assert!(log.get(synced_unseen).is_some());
        assert!(log.get(pending_seen).is_some());
    }

    #[test]
    fn prune_keeps_entries_replaced_after_the_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = LocalCompletionLog::open(dir.path()).unwrap();
        let target = CompletionTarget::Exercise(Uuid::new_v4());

        let first = log.record(target, true, now()).unwrap();
        log.set_state(target, first.seq, SyncState::Synced, None).unwrap();
        let confirmed: HashMap<_, _> = [(target, first.seq)].into_iter().collect();

        let second = log.record(target, false, now()).unwrap();
        log.set_state(target, second.seq, SyncState::Synced, None).unwrap();

        assert_eq!(log.prune_reconciled(&confirmed).unwrap(), 0);
        assert!(!log.get(target).unwrap().completed);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LocalCompletionLog::FILE_NAME), b"not json").unwrap();
        let err = LocalCompletionLog::open(dir.path()).unwrap_err();
        assert!(matches!(err, LocalLogError::Json { .. }), "got: {err}");
    }

    #[test]
    fn target_serializes_with_kind() {
        let id = Uuid::nil();
        let json = serde_json::to_value(CompletionTarget::Day(id)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "day", "id": id.to_string()}));
    }
}
