//! Copying a template or a live day onto a target slot.
//!
//! Instantiation always replaces: the target day is cleared and refilled,
//! so repeating the same call leaves the same content behind.

use std::collections::HashMap;

use uuid::Uuid;

use coachplan_db::models::{BlockDraft, DaySchedule, Exercise, ExerciseDraft, WorkoutBlock};

use super::ScheduleEngine;
use crate::error::{CopyStage, ScheduleError, ScheduleResult};
use crate::grouping::{remap_groups, resolve_block_orders, validate_groups};
use crate::week::{WeekKey, validate_order_in_day, validate_weekday};

/// What to copy from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstantiationSource {
    Template(Uuid),
    Day(Uuid),
}

/// Slot to copy into. The day is created when it does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantiationTarget {
    pub student_id: String,
    pub coach_id: String,
    pub week: WeekKey,
    pub weekday: i32,
    pub order_in_day: i32,
}

/// Source content loaded once and reusable across many targets.
#[derive(Debug, Clone)]
pub struct SourceContent {
    pub source: InstantiationSource,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Provenance recorded on the target day.
    pub template_id: Option<Uuid>,
    pub exercises: Vec<ExerciseDraft>,
    pub blocks: Vec<BlockDraft>,
}

#[derive(Debug, Clone)]
pub struct InstantiationOutcome {
    pub day: DaySchedule,
    pub exercises: Vec<Exercise>,
    pub blocks: Vec<WorkoutBlock>,
    /// Source group id to the id used in the target day.
    pub group_mapping: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct AuthoredDay {
    pub day: DaySchedule,
    pub exercises: Vec<Exercise>,
    pub blocks: Vec<WorkoutBlock>,
}

impl ScheduleEngine {
    /// Load the content of `source`.
    pub async fn load_source(&self, source: InstantiationSource) -> ScheduleResult<SourceContent> {
        match source {
            InstantiationSource::Template(id) => {
                let content = self
                    .call("load template", self.store.load_template(id))
                    .await?
                    .ok_or_else(|| ScheduleError::not_found("template", id))?;
                Ok(SourceContent {
                    source,
                    name: Some(content.template.name),
                    description: content.template.description,
                    template_id: Some(id),
                    exercises: content.exercises,
                    blocks: content.blocks,
                })
            }
            InstantiationSource::Day(id) => {
                let view = self.load_day(id).await?;
                let (exercises, blocks) = view.to_drafts();
                Ok(SourceContent {
                    source,
                    name: view.day.name,
                    description: view.day.description,
                    template_id: view.day.source_template_id,
                    exercises,
                    blocks,
                })
            }
        }
    }

    /// Copy `source` onto `target`, replacing whatever the target held.
    pub async fn instantiate(
        &self,
        source: InstantiationSource,
        target: &InstantiationTarget,
    ) -> ScheduleResult<InstantiationOutcome> {
        validate_weekday(target.weekday)?;
        validate_order_in_day(target.order_in_day)?;
        let content = self.load_source(source).await?;
        self.instantiate_content(&content, target).await
    }

    /// Copy already loaded content onto `target`.
    ///
    /// Group ids are remapped to fresh values, completion is reset, and
    /// blocks without a usable order take their list position.
    pub async fn instantiate_content(
        &self,
        content: &SourceContent,
        target: &InstantiationTarget,
    ) -> ScheduleResult<InstantiationOutcome> {
        let day = self
            .find_or_create_day(
                &target.student_id,
                &target.coach_id,
                target.week,
                target.weekday,
                target.order_in_day,
            )
            .await?;

        let (name, description) = match content.source {
            // Authored day details win over the template's.
            InstantiationSource::Template(_) => (
                day.name.clone().or_else(|| content.name.clone()),
                day.description.clone().or_else(|| content.description.clone()),
            ),
            InstantiationSource::Day(_) => (content.name.clone(), content.description.clone()),
        };
        // Before the content copy: a failed details write must not leave
        // copied exercises behind.
        let day = if name != day.name
            || description != day.description
            || content.template_id != day.source_template_id
        {
            self.call(
                "update day details",
                self.store.update_day_details(
                    day.id,
                    name.as_deref(),
                    description.as_deref(),
                    content.template_id,
                ),
            )
            .await?
        } else {
            day
        };

        let (drafts, group_mapping) = remap_groups(&content.exercises);
        let blocks = resolve_block_orders(&content.blocks);
        let (exercises, blocks) = self.replace_content(day.id, &drafts, &blocks).await?;

        tracing::debug!(
            day_id = %day.id,
            week = %target.week,
            weekday = target.weekday,
            exercises = exercises.len(),
            blocks = blocks.len(),
            groups = group_mapping.len(),
            "instantiated day"
        );

        Ok(InstantiationOutcome {
            day,
            exercises,
            blocks,
            group_mapping,
        })
    }

    /// Replace a day's content with coach-authored exercises and blocks.
    ///
    /// Groups are validated against the grouping rules first; group ids are
    /// kept as given.
    pub async fn author_day(
        &self,
        day_id: Uuid,
        exercises: &[ExerciseDraft],
        blocks: &[BlockDraft],
    ) -> ScheduleResult<AuthoredDay> {
        validate_groups(exercises)?;
        let day = self
            .call("get day", self.store.get_day(day_id))
            .await?
            .ok_or_else(|| ScheduleError::not_found("day schedule", day_id))?;

        let blocks = resolve_block_orders(blocks);
        let (exercises, blocks) = self.replace_content(day.id, exercises, &blocks).await?;
        Ok(AuthoredDay {
            day,
            exercises,
            blocks,
        })
    }

    /// Clear then refill one day.
    ///
    /// When a later insert fails, rows written by this call are deleted again
    /// and the failure surfaces as a retryable [`ScheduleError::PartialCopy`].
    async fn replace_content(
        &self,
        day_id: Uuid,
        exercises: &[ExerciseDraft],
        blocks: &[BlockDraft],
    ) -> ScheduleResult<(Vec<Exercise>, Vec<WorkoutBlock>)> {
        self.clear_day_content(day_id).await?;

        let inserted = match self
            .call("insert exercises", self.store.insert_exercises(day_id, exercises))
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(day_id = %day_id, error = %e, "exercise insert failed after clearing day");
                return Err(ScheduleError::PartialCopy {
                    day_id,
                    stage: CopyStage::Exercises,
                    compensated: true,
                    source: e.into(),
                });
            }
        };

        match self
            .call("insert blocks", self.store.insert_blocks(day_id, blocks))
            .await
        {
            Ok(inserted_blocks) => Ok((inserted, inserted_blocks)),
            Err(e) => {
                let ids: Vec<Uuid> = inserted.iter().map(|ex| ex.id).collect();
                let compensated = match self
                    .call("delete exercises", self.store.delete_exercises(&ids))
                    .await
                {
                    Ok(_) => true,
                    Err(cleanup) => {
                        tracing::warn!(day_id = %day_id, error = %cleanup, "compensating delete failed");
                        false
                    }
                };
                tracing::warn!(day_id = %day_id, error = %e, compensated, "block insert failed");
                Err(ScheduleError::PartialCopy {
                    day_id,
                    stage: CopyStage::Blocks,
                    compensated,
                    source: e.into(),
                })
            }
        }
    }
}
