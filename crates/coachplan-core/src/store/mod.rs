//! The remote schedule store seam and the week read model.

pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use coachplan_db::models::{
    BlockDraft, BlockPosition, DayKey, DaySchedule, Exercise, ExerciseDraft, WorkoutBlock,
    WorkoutTemplate,
};

use crate::grouping::ExerciseEntry;
use crate::week::WeekKey;

pub use postgres::PgScheduleStore;

/// A template with its children as insertable drafts.
#[derive(Debug, Clone)]
pub struct TemplateContent {
    pub template: WorkoutTemplate,
    pub exercises: Vec<ExerciseDraft>,
    pub blocks: Vec<BlockDraft>,
}

/// Persistence operations the engine relies on.
///
/// Every call may fail transiently; callers wrap them with a timeout and map
/// failures to [`crate::error::ScheduleError::RemoteSync`]. The insert calls
/// are all-or-nothing per call.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn list_days(&self, student_id: &str, coach_id: &str, week: WeekKey) -> Result<Vec<DaySchedule>>;

    async fn get_day(&self, id: Uuid) -> Result<Option<DaySchedule>>;

    async fn get_day_by_key(&self, key: &DayKey) -> Result<Option<DaySchedule>>;

    /// Insert an empty day. `None` when a row with the same key exists.
    async fn insert_day_if_absent(&self, key: &DayKey) -> Result<Option<DaySchedule>>;

    async fn update_day_details(
        &self,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        source_template_id: Option<Uuid>,
    ) -> Result<DaySchedule>;

    /// Exercises of the given days in display order.
    async fn list_exercises(&self, day_ids: &[Uuid]) -> Result<Vec<Exercise>>;

    /// Blocks of the given days, by position then order.
    async fn list_blocks(&self, day_ids: &[Uuid]) -> Result<Vec<WorkoutBlock>>;

    /// Remove all exercises and blocks of a day in one unit.
    async fn clear_day_content(&self, day_id: Uuid) -> Result<(u64, u64)>;

    async fn insert_exercises(&self, day_id: Uuid, drafts: &[ExerciseDraft]) -> Result<Vec<Exercise>>;

    async fn insert_blocks(&self, day_id: Uuid, drafts: &[BlockDraft]) -> Result<Vec<WorkoutBlock>>;

    async fn delete_exercises(&self, ids: &[Uuid]) -> Result<u64>;

    async fn delete_blocks(&self, ids: &[Uuid]) -> Result<u64>;

    async fn load_template(&self, id: Uuid) -> Result<Option<TemplateContent>>;

    /// `false` when no such exercise exists.
    async fn set_exercise_completed(&self, id: Uuid, completed: bool) -> Result<bool>;

    async fn set_day_completed(&self, id: Uuid, completed: bool) -> Result<bool>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn ScheduleStore) {}
};

/// Blocks of one day split by where they sit in the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PositionedBlocks {
    pub start: Vec<WorkoutBlock>,
    pub middle: Vec<WorkoutBlock>,
    pub end: Vec<WorkoutBlock>,
}

impl PositionedBlocks {
    /// Partition `blocks`, keeping their relative order and sorting each
    /// section by block order.
    pub fn from_blocks(blocks: Vec<WorkoutBlock>) -> Self {
        let mut out = Self::default();
        for block in blocks {
            match block.position {
                BlockPosition::Start => out.start.push(block),
                BlockPosition::Middle => out.middle.push(block),
                BlockPosition::End => out.end.push(block),
            }
        }
        for section in [&mut out.start, &mut out.middle, &mut out.end] {
            section.sort_by_key(|b| b.order);
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkoutBlock> {
        self.start.iter().chain(&self.middle).chain(&self.end)
    }

    pub fn len(&self) -> usize {
        self.start.len() + self.middle.len() + self.end.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A day with its hydrated exercises and positioned blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayView {
    pub day: DaySchedule,
    pub entries: Vec<ExerciseEntry>,
    pub blocks: PositionedBlocks,
}

impl DayView {
    pub fn exercises(&self) -> impl Iterator<Item = &Exercise> {
        self.entries.iter().flat_map(ExerciseEntry::exercises)
    }

    pub fn exercises_mut(&mut self) -> impl Iterator<Item = &mut Exercise> {
        self.entries.iter_mut().flat_map(|entry| {
            let slice = match entry {
                ExerciseEntry::Single(ex) => std::slice::from_mut(ex),
                ExerciseEntry::Group(group) => group.members.as_mut_slice(),
            };
            slice.iter_mut()
        })
    }

    /// The day's content as drafts, in display order.
    pub fn to_drafts(&self) -> (Vec<ExerciseDraft>, Vec<BlockDraft>) {
        let mut exercises: Vec<&Exercise> = self.exercises().collect();
        exercises.sort_by_key(|e| (e.order, e.order_in_group.unwrap_or(0)));
        (
            exercises.into_iter().map(Exercise::to_draft).collect(),
            self.blocks.iter().map(WorkoutBlock::to_draft).collect(),
        )
    }
}
