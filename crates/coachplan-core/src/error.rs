//! Domain error taxonomy for schedule, instantiation and plan operations.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use coachplan_db::models::{GroupType, PlanStatus};

/// Input rejected before anything was written. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid weekday {0}: expected a value between 1 and 7")]
    Weekday(i32),

    #[error("invalid order in day {0}: expected a value of at least 1")]
    OrderInDay(i32),

    #[error("invalid duration of {0} weeks: expected at least 1")]
    DurationWeeks(i32),

    #[error("exercise {exercise:?} has group {group_id:?} but no group type")]
    MissingGroupType { exercise: String, group_id: String },

    #[error("group {group_id:?} mixes group types {first} and {second}")]
    MixedGroupTypes {
        group_id: String,
        first: GroupType,
        second: GroupType,
    },

    #[error("group {group_id:?} is a {group_type} with {actual} members (at most {max} allowed)")]
    GroupTooLarge {
        group_id: String,
        group_type: GroupType,
        max: usize,
        actual: usize,
    },

    #[error("plan {id} is {status}, expected active")]
    PlanNotActive { id: Uuid, status: PlanStatus },
}

/// Which insert of a clear-then-insert unit failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStage {
    Exercises,
    Blocks,
}

impl fmt::Display for CopyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exercises => f.write_str("exercises"),
            Self::Blocks => f.write_str("blocks"),
        }
    }
}

/// Errors surfaced by the schedule engine and the plan lifecycle.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// One insert of a content replacement succeeded and a later one did
    /// not. `compensated` reports whether the rows already written were
    /// removed again.
    #[error("copying {stage} into day {day_id} failed (compensated: {compensated})")]
    PartialCopy {
        day_id: Uuid,
        stage: CopyStage,
        compensated: bool,
        #[source]
        source: anyhow::Error,
    },

    /// Transient store failure, including timeouts.
    #[error("remote {operation} failed")]
    RemoteSync {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("conflicting write: {0}")]
    Conflict(String),
}

impl ScheduleError {
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn remote(operation: &'static str, source: anyhow::Error) -> Self {
        Self::RemoteSync { operation, source }
    }

    /// This error followed by its sources, separated by `: `.
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str(": ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PartialCopy { .. } | Self::RemoteSync { .. } | Self::Conflict(_)
        )
    }
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_not_retryable() {
        let err = ScheduleError::from(ValidationError::Weekday(8));
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "invalid weekday 8: expected a value between 1 and 7");
        assert!(!ScheduleError::not_found("template", Uuid::nil()).is_retryable());
    }

    #[test]
    fn partial_copy_and_remote_are_retryable() {
        let partial = ScheduleError::PartialCopy {
            day_id: Uuid::nil(),
            stage: CopyStage::Blocks,
            compensated: true,
            source: anyhow::anyhow!("insert failed"),
        };
        assert!(partial.is_retryable());
        assert!(partial.to_string().contains("blocks"));
        assert!(partial.report().ends_with(": insert failed"), "{}", partial.report());
        assert!(ScheduleError::remote("load week", anyhow::anyhow!("timeout")).is_retryable());
        assert!(ScheduleError::Conflict("day vanished".into()).is_retryable());
    }

    #[test]
    fn group_too_large_message() {
        let err = ValidationError::GroupTooLarge {
            group_id: "G1".into(),
            group_type: GroupType::BiSet,
            max: 2,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "group \"G1\" is a bi-set with 3 members (at most 2 allowed)"
        );
    }
}
