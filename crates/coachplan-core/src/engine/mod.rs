//! Schedule engine: the week read model, find-or-create of days, and the
//! content replacement unit used by instantiation and authoring.

mod instantiate;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use coachplan_db::models::{DayKey, DaySchedule, Exercise, WorkoutBlock};

use crate::error::{ScheduleError, ScheduleResult};
use crate::grouping::hydrate_groups;
use crate::store::{DayView, PositionedBlocks, ScheduleStore};
use crate::week::{WeekKey, validate_order_in_day, validate_weekday};

pub use instantiate::{
    AuthoredDay, InstantiationOutcome, InstantiationSource, InstantiationTarget, SourceContent,
};

/// Configuration for the schedule engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound for any single store call.
    pub call_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
        }
    }
}

/// Entry point for reading and writing schedules through a [`ScheduleStore`].
#[derive(Clone)]
pub struct ScheduleEngine {
    store: Arc<dyn ScheduleStore>,
    config: EngineConfig,
}

impl ScheduleEngine {
    pub fn new(store: Arc<dyn ScheduleStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn ScheduleStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one store call under the configured timeout.
    pub(crate) async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> ScheduleResult<T> {
        match tokio::time::timeout(self.config.call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ScheduleError::remote(operation, e)),
            Err(_) => Err(ScheduleError::remote(
                operation,
                anyhow::anyhow!("timed out after {:?}", self.config.call_timeout),
            )),
        }
    }

    /// Every day of one student's week with exercises grouped and blocks
    /// partitioned by position.
    pub async fn load_week(&self, student_id: &str, coach_id: &str, week: WeekKey) -> ScheduleResult<Vec<DayView>> {
        let days = self
            .call("list days", self.store.list_days(student_id, coach_id, week))
            .await?;
        if days.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = days.iter().map(|d| d.id).collect();
        let (exercises, blocks) = futures::try_join!(
            self.call("list exercises", self.store.list_exercises(&ids)),
            self.call("list blocks", self.store.list_blocks(&ids)),
        )?;

        Ok(assemble(days, exercises, blocks))
    }

    /// One day with its content.
    pub async fn load_day(&self, day_id: Uuid) -> ScheduleResult<DayView> {
        let day = self
            .call("get day", self.store.get_day(day_id))
            .await?
            .ok_or_else(|| ScheduleError::not_found("day schedule", day_id))?;

        let ids = [day.id];
        let (exercises, blocks) = futures::try_join!(
            self.call("list exercises", self.store.list_exercises(&ids)),
            self.call("list blocks", self.store.list_blocks(&ids)),
        )?;

        let mut views = assemble(vec![day], exercises, blocks);
        views
            .pop()
            .ok_or_else(|| ScheduleError::not_found("day schedule", day_id))
    }

    /// Return the day for this slot, creating an empty one when missing.
    ///
    /// A concurrent insert of the same slot is treated as found.
    pub async fn find_or_create_day(
        &self,
        student_id: &str,
        coach_id: &str,
        week: WeekKey,
        weekday: i32,
        order_in_day: i32,
    ) -> ScheduleResult<DaySchedule> {
        validate_weekday(weekday)?;
        validate_order_in_day(order_in_day)?;

        let key = DayKey {
            student_id: student_id.to_owned(),
            coach_id: coach_id.to_owned(),
            week_start: week.start_date(),
            weekday,
            order_in_day,
        };

        if let Some(day) = self.call("find day", self.store.get_day_by_key(&key)).await? {
            return Ok(day);
        }

        if let Some(day) = self
            .call("create day", self.store.insert_day_if_absent(&key))
            .await?
        {
            tracing::debug!(day_id = %day.id, week = %week, weekday, order_in_day, "created day schedule");
            return Ok(day);
        }

        tracing::debug!(week = %week, weekday, order_in_day, "day created concurrently, reusing it");
        self.call("find day", self.store.get_day_by_key(&key))
            .await?
            .ok_or_else(|| {
                ScheduleError::Conflict(format!(
                    "day {weekday}/{order_in_day} of week {week} was created and removed concurrently"
                ))
            })
    }

    /// Delete every exercise and block of a day, keeping the day itself.
    pub async fn clear_day_content(&self, day_id: Uuid) -> ScheduleResult<(u64, u64)> {
        let cleared = self
            .call("clear day content", self.store.clear_day_content(day_id))
            .await?;
        tracing::debug!(day_id = %day_id, exercises = cleared.0, blocks = cleared.1, "cleared day content");
        Ok(cleared)
    }

    pub async fn set_exercise_completed(&self, id: Uuid, completed: bool) -> ScheduleResult<bool> {
        self.call("set exercise completion", self.store.set_exercise_completed(id, completed))
            .await
    }

    pub async fn set_day_completed(&self, id: Uuid, completed: bool) -> ScheduleResult<bool> {
        self.call("set day completion", self.store.set_day_completed(id, completed))
            .await
    }
}

fn assemble(days: Vec<DaySchedule>, exercises: Vec<Exercise>, blocks: Vec<WorkoutBlock>) -> Vec<DayView> {
    let mut exercises_by_day: HashMap<Uuid, Vec<Exercise>> = HashMap::new();
    for ex in exercises {
        exercises_by_day.entry(ex.day_schedule_id).or_default().push(ex);
    }
    let mut blocks_by_day: HashMap<Uuid, Vec<WorkoutBlock>> = HashMap::new();
    for block in blocks {
        blocks_by_day.entry(block.day_schedule_id).or_default().push(block);
    }

    days.into_iter()
        .map(|day| {
            let mut day_exercises = exercises_by_day.remove(&day.id).unwrap_or_default();
            day_exercises.sort_by_key(|e| (e.order, e.order_in_group.unwrap_or(0)));
            DayView {
                entries: hydrate_groups(day_exercises),
                blocks: PositionedBlocks::from_blocks(blocks_by_day.remove(&day.id).unwrap_or_default()),
                day,
            }
        })
        .collect()
}
