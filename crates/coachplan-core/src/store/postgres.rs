//! [`ScheduleStore`] backed by the PostgreSQL query layer.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use coachplan_db::models::{BlockDraft, DayKey, DaySchedule, Exercise, ExerciseDraft, WorkoutBlock};
use coachplan_db::queries::{blocks, days, exercises, templates};

use super::{ScheduleStore, TemplateContent};
use crate::week::WeekKey;

#[derive(Debug, Clone)]
pub struct PgScheduleStore {
    pool: PgPool,
}

impl PgScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ScheduleStore for PgScheduleStore {
    async fn list_days(&self, student_id: &str, coach_id: &str, week: WeekKey) -> Result<Vec<DaySchedule>> {
        days::list_days_for_week(&self.pool, student_id, coach_id, week.start_date()).await
    }

    async fn get_day(&self, id: Uuid) -> Result<Option<DaySchedule>> {
        days::get_day(&self.pool, id).await
    }

    async fn get_day_by_key(&self, key: &DayKey) -> Result<Option<DaySchedule>> {
        days::get_day_by_key(&self.pool, key).await
    }

    async fn insert_day_if_absent(&self, key: &DayKey) -> Result<Option<DaySchedule>> {
        days::insert_day_if_absent(&self.pool, key).await
    }

    async fn update_day_details(
        &self,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        source_template_id: Option<Uuid>,
    ) -> Result<DaySchedule> {
        days::update_day_details(&self.pool, id, name, description, source_template_id).await
    }

    async fn list_exercises(&self, day_ids: &[Uuid]) -> Result<Vec<Exercise>> {
        exercises::list_exercises_for_days(&self.pool, day_ids).await
    }

    async fn list_blocks(&self, day_ids: &[Uuid]) -> Result<Vec<WorkoutBlock>> {
        blocks::list_blocks_for_days(&self.pool, day_ids).await
    }

    async fn clear_day_content(&self, day_id: Uuid) -> Result<(u64, u64)> {
        days::clear_day_content(&self.pool, day_id).await
    }

    async fn insert_exercises(&self, day_id: Uuid, drafts: &[ExerciseDraft]) -> Result<Vec<Exercise>> {
        exercises::insert_exercises(&self.pool, day_id, drafts).await
    }

    async fn insert_blocks(&self, day_id: Uuid, drafts: &[BlockDraft]) -> Result<Vec<WorkoutBlock>> {
        blocks::insert_blocks(&self.pool, day_id, drafts).await
    }

    async fn delete_exercises(&self, ids: &[Uuid]) -> Result<u64> {
        exercises::delete_exercises(&self.pool, ids).await
    }

    async fn delete_blocks(&self, ids: &[Uuid]) -> Result<u64> {
        blocks::delete_blocks(&self.pool, ids).await
    }

    async fn load_template(&self, id: Uuid) -> Result<Option<TemplateContent>> {
        let Some(template) = templates::get_template(&self.pool, id).await? else {
            return Ok(None);
        };
        let (exercise_rows, block_rows) = futures::try_join!(
            templates::list_template_exercises(&self.pool, id),
            templates::list_template_blocks(&self.pool, id),
        )?;

        Ok(Some(TemplateContent {
            template,
            exercises: exercise_rows.iter().map(|e| e.to_draft()).collect(),
            blocks: block_rows.iter().map(|b| b.to_draft()).collect(),
        }))
    }

    async fn set_exercise_completed(&self, id: Uuid, completed: bool) -> Result<bool> {
        Ok(exercises::set_exercise_completed(&self.pool, id, completed).await? > 0)
    }

    async fn set_day_completed(&self, id: Uuid, completed: bool) -> Result<bool> {
        Ok(days::set_day_completed(&self.pool, id, completed).await? > 0)
    }
}
