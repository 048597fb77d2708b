//! Plan lifecycle: create, renew and end plans.
//!
//! A student has at most one active plan. Closing the previous plan and
//! inserting the new one happen in a single transaction; replication of the
//! base week runs afterwards and reports how far it got.

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use coachplan_db::models::{NewPlan, PlanStatus, WorkoutPlan};
use coachplan_db::queries::plans as plan_db;

use super::replicate::{ReplicationReport, ReplicationRequest, replicate};
use crate::engine::ScheduleEngine;
use crate::error::{ScheduleError, ScheduleResult, ValidationError};
use crate::week::WeekKey;

pub const DEFAULT_DURATION_WEEKS: i32 = 4;

/// Input of [`PlanManager::create`]. Missing fields take their defaults.
#[derive(Debug, Clone, Default)]
pub struct NewPlanRequest {
    pub student_id: String,
    pub coach_id: String,
    pub name: Option<String>,
    /// Defaults to four weeks.
    pub duration_weeks: Option<i32>,
    /// Defaults to today.
    pub start_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Input of [`PlanManager::renew`]. Missing fields are taken from the
/// plan being renewed.
#[derive(Debug, Clone, Default)]
pub struct RenewRequest {
    pub name: Option<String>,
    pub duration_weeks: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug)]
pub struct PlanCreated {
    pub plan: WorkoutPlan,
    /// Plans that were active before and are now ended.
    pub closed: Vec<Uuid>,
    pub replication: ReplicationReport,
}

#[derive(Debug)]
pub struct PlanRenewed {
    pub previous: Uuid,
    pub plan: WorkoutPlan,
    pub replication: ReplicationReport,
}

#[derive(Clone)]
pub struct PlanManager {
    pool: PgPool,
    engine: ScheduleEngine,
}

fn validate_duration(weeks: i32) -> Result<i32, ValidationError> {
    if weeks >= 1 {
        Ok(weeks)
    } else {
        Err(ValidationError::DurationWeeks(weeks))
    }
}

fn db_error(operation: &'static str) -> impl FnOnce(anyhow::Error) -> ScheduleError {
    move |e| ScheduleError::remote(operation, e)
}

impl PlanManager {
    pub fn new(pool: PgPool, engine: ScheduleEngine) -> Self {
        Self { pool, engine }
    }

    pub fn engine(&self) -> &ScheduleEngine {
        &self.engine
    }

    pub async fn get(&self, plan_id: Uuid) -> ScheduleResult<WorkoutPlan> {
        plan_db::get_plan(&self.pool, plan_id)
            .await
            .map_err(db_error("get plan"))?
            .ok_or_else(|| ScheduleError::not_found("plan", plan_id))
    }

    /// Load a plan that may still move to `to`.
    async fn get_for_transition(&self, plan_id: Uuid, to: PlanStatus) -> ScheduleResult<WorkoutPlan> {
        let plan = self.get(plan_id).await?;
        if !plan.status.can_transition_to(to) {
            return Err(ValidationError::PlanNotActive {
                id: plan.id,
                status: plan.status,
            }
            .into());
        }
        Ok(plan)
    }

    /// End any active plan of the student, start a new one, and replicate
    /// the week containing its start date.
    pub async fn create(
        &self,
        request: NewPlanRequest,
        today: NaiveDate,
        cancel: &CancellationToken,
    ) -> ScheduleResult<PlanCreated> {
        let duration_weeks = validate_duration(request.duration_weeks.unwrap_or(DEFAULT_DURATION_WEEKS))?;
        let start_date = request.start_date.unwrap_or(today);
        let name = request
            .name
            .unwrap_or_else(|| format!("Plan starting {start_date}"));

        let (plan, closed) = async {
            let mut tx = self.pool.begin().await.context("failed to begin transaction")?;
            let closed = plan_db::close_active_plans(&mut *tx, &request.student_id, PlanStatus::Ended).await?;
            let plan = plan_db::insert_plan(
                &mut *tx,
                &NewPlan {
                    student_id: &request.student_id,
                    coach_id: &request.coach_id,
                    name: &name,
                    start_date,
                    duration_weeks,
                    notes: request.notes.as_deref(),
                },
            )
            .await?;
            tx.commit().await.context("failed to commit transaction")?;
            anyhow::Ok((plan, closed))
        }
        .await
        .map_err(db_error("create plan"))?;

        for id in &closed {
            tracing::info!(plan_id = %id, "ended previous plan");
        }
        tracing::info!(
            plan_id = %plan.id,
            student_id = %plan.student_id,
            start_date = %plan.start_date,
            duration_weeks,
            "plan created"
        );

        let replication = self.replicate_plan(&plan, 1, cancel).await?;
        Ok(PlanCreated {
            plan,
            closed,
            replication,
        })
    }

    /// Mark an active plan renewed, start its successor today, and replicate
    /// the current week.
    pub async fn renew(
        &self,
        plan_id: Uuid,
        request: RenewRequest,
        today: NaiveDate,
        cancel: &CancellationToken,
    ) -> ScheduleResult<PlanRenewed> {
        let previous = self.get_for_transition(plan_id, PlanStatus::Renewed).await?;
        let duration_weeks = validate_duration(request.duration_weeks.unwrap_or(previous.duration_weeks))?;
        let name = request.name.unwrap_or_else(|| previous.name.clone());
        let notes = request.notes.or_else(|| previous.notes.clone());

        let plan = async {
            let mut tx = self.pool.begin().await.context("failed to begin transaction")?;
            let rows =
                plan_db::transition_plan_status(&mut *tx, plan_id, PlanStatus::Active, PlanStatus::Renewed)
                    .await?;
            if rows == 0 {
                return Ok(None);
            }
            let plan = plan_db::insert_plan(
                &mut *tx,
                &NewPlan {
                    student_id: &previous.student_id,
                    coach_id: &previous.coach_id,
                    name: &name,
                    start_date: today,
                    duration_weeks,
                    notes: notes.as_deref(),
                },
            )
            .await?;
            tx.commit().await.context("failed to commit transaction")?;
            anyhow::Ok(Some(plan))
        }
        .await
        .map_err(db_error("renew plan"))?
        .ok_or_else(|| ScheduleError::Conflict(format!("plan {plan_id} changed status during renewal")))?;

        tracing::info!(previous = %plan_id, plan_id = %plan.id, duration_weeks, "plan renewed");

        let replication = self.replicate_plan(&plan, 1, cancel).await?;
        Ok(PlanRenewed {
            previous: plan_id,
            plan,
            replication,
        })
    }

    /// Mark an active plan ended. Schedules are left as they are.
    pub async fn end(&self, plan_id: Uuid) -> ScheduleResult<WorkoutPlan> {
        self.get_for_transition(plan_id, PlanStatus::Ended).await?;
        let rows = plan_db::transition_plan_status(&self.pool, plan_id, PlanStatus::Active, PlanStatus::Ended)
            .await
            .map_err(db_error("end plan"))?;
        if rows == 0 {
            return Err(ScheduleError::Conflict(format!("plan {plan_id} changed status before it could end")));
        }
        tracing::info!(plan_id = %plan_id, "plan ended");
        self.get(plan_id).await
    }

    /// Replicate a plan's base week from week offset `resume_from`.
    pub async fn replicate_plan(
        &self,
        plan: &WorkoutPlan,
        resume_from: i32,
        cancel: &CancellationToken,
    ) -> ScheduleResult<ReplicationReport> {
        let request = ReplicationRequest {
            student_id: plan.student_id.clone(),
            coach_id: plan.coach_id.clone(),
            base_week: WeekKey::containing(plan.start_date),
            duration_weeks: plan.duration_weeks,
            resume_from,
        };
        replicate(&self.engine, &request, cancel).await
    }
}
