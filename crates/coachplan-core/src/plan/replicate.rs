//! Propagating a base week across the weeks of a plan.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::engine::{InstantiationSource, InstantiationTarget, ScheduleEngine, SourceContent};
use crate::error::{ScheduleError, ScheduleResult, ValidationError};
use crate::week::WeekKey;

/// Parameters of one replication run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationRequest {
    pub student_id: String,
    pub coach_id: String,
    pub base_week: WeekKey,
    pub duration_weeks: i32,
    /// First week offset to write. Offsets below 1 are raised to 1; the
    /// base week itself is never a target.
    pub resume_from: i32,
}

/// How a replication run ended.
#[derive(Debug)]
pub enum ReplicationOutcome {
    Completed,
    /// Stopped between weeks; resume from `next_offset`.
    Cancelled { next_offset: i32 },
    /// A week failed part way; weeks before `next_offset` are done.
    Failed { next_offset: i32, error: ScheduleError },
}

impl ReplicationOutcome {
    pub fn next_offset(&self) -> Option<i32> {
        match self {
            Self::Completed => None,
            Self::Cancelled { next_offset } | Self::Failed { next_offset, .. } => Some(*next_offset),
        }
    }
}

#[derive(Debug)]
pub struct ReplicationReport {
    pub base_week: WeekKey,
    /// Weeks fully written by this run, in order.
    pub replicated_weeks: Vec<WeekKey>,
    pub days_per_week: usize,
    pub outcome: ReplicationOutcome,
}

impl ReplicationReport {
    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, ReplicationOutcome::Completed)
    }
}

/// Summary suitable for printing.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicationSummary {
    pub base_week: WeekKey,
    pub replicated_weeks: Vec<WeekKey>,
    pub days_per_week: usize,
    pub next_offset: Option<i32>,
    pub error: Option<String>,
}

impl From<&ReplicationReport> for ReplicationSummary {
    fn from(report: &ReplicationReport) -> Self {
        Self {
            base_week: report.base_week,
            replicated_weeks: report.replicated_weeks.clone(),
            days_per_week: report.days_per_week,
            next_offset: report.outcome.next_offset(),
            error: match &report.outcome {
                ReplicationOutcome::Failed { error, .. } => Some(error.report()),
                _ => None,
            },
        }
    }
}

/// Copy every day of the base week into weeks `resume_from..duration_weeks`.
///
/// Weeks are written in order, each day by a replacing instantiation, so a
/// failed or cancelled run can be resumed from the reported offset. Only
/// invalid input is returned as `Err`; store failures end the run with
/// [`ReplicationOutcome::Failed`].
pub async fn replicate(
    engine: &ScheduleEngine,
    request: &ReplicationRequest,
    cancel: &CancellationToken,
) -> ScheduleResult<ReplicationReport> {
    if request.duration_weeks < 1 {
        return Err(ValidationError::DurationWeeks(request.duration_weeks).into());
    }
    let start = request.resume_from.max(1);
    let mut report = ReplicationReport {
        base_week: request.base_week,
        replicated_weeks: Vec::new(),
        days_per_week: 0,
        outcome: ReplicationOutcome::Completed,
    };

    let base_days = match engine
        .load_week(&request.student_id, &request.coach_id, request.base_week)
        .await
    {
        Ok(days) => days,
        Err(error @ ScheduleError::Validation(_)) => return Err(error),
        Err(error) => {
            tracing::warn!(base_week = %request.base_week, error = %error, "failed to load base week");
            report.outcome = ReplicationOutcome::Failed {
                next_offset: start,
                error,
            };
            return Ok(report);
        }
    };

    let sources: Vec<(i32, i32, SourceContent)> = base_days
        .iter()
        .map(|view| {
            let (exercises, blocks) = view.to_drafts();
            (
                view.day.weekday,
                view.day.order_in_day,
                SourceContent {
                    source: InstantiationSource::Day(view.day.id),
                    name: view.day.name.clone(),
                    description: view.day.description.clone(),
                    template_id: view.day.source_template_id,
                    exercises,
                    blocks,
                },
            )
        })
        .collect();
    report.days_per_week = sources.len();

    if sources.is_empty() {
        tracing::info!(base_week = %request.base_week, "base week has no days, nothing to replicate");
        return Ok(report);
    }

    for offset in start..request.duration_weeks {
        if cancel.is_cancelled() {
            tracing::warn!(base_week = %request.base_week, next_offset = offset, "replication cancelled");
            report.outcome = ReplicationOutcome::Cancelled { next_offset: offset };
            return Ok(report);
        }

        let week = request.base_week.offset(i64::from(offset));
        for (weekday, order_in_day, content) in &sources {
            let target = InstantiationTarget {
                student_id: request.student_id.clone(),
                coach_id: request.coach_id.clone(),
                week,
                weekday: *weekday,
                order_in_day: *order_in_day,
            };
            if let Err(error) = engine.instantiate_content(content, &target).await {
                if matches!(error, ScheduleError::Validation(_)) {
                    return Err(error);
                }
                tracing::warn!(
                    week = %week,
                    weekday = *weekday,
                    next_offset = offset,
                    error = %error,
                    "replication stopped"
                );
                report.outcome = ReplicationOutcome::Failed {
                    next_offset: offset,
                    error,
                };
                return Ok(report);
            }
        }

        tracing::debug!(week = %week, days = sources.len(), "replicated week");
        report.replicated_weeks.push(week);
    }

    tracing::info!(
        base_week = %request.base_week,
        weeks = report.replicated_weeks.len(),
        days_per_week = report.days_per_week,
        "replication finished"
    );
    Ok(report)
}
