//! Helpers shared by the core integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tokio::sync::Notify;
use uuid::Uuid;

use coachplan_core::engine::{EngineConfig, ScheduleEngine};
use coachplan_core::store::{PgScheduleStore, ScheduleStore, TemplateContent};
use coachplan_core::week::WeekKey;
use coachplan_db::models::{
    BlockConfig, BlockDraft, BlockPosition, DayKey, DaySchedule, Exercise, ExerciseDraft,
    WorkoutBlock,
};

pub const STUDENT: &str = "student-1";
pub const COACH: &str = "coach-1";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn week(y: i32, m: u32, d: u32) -> WeekKey {
    WeekKey::containing(date(y, m, d))
}

pub fn engine_for(store: Arc<dyn ScheduleStore>) -> ScheduleEngine {
    ScheduleEngine::new(
        store,
        EngineConfig {
            call_timeout: Duration::from_secs(5),
        },
    )
}

pub fn pg_engine(pool: &PgPool) -> ScheduleEngine {
    engine_for(Arc::new(PgScheduleStore::new(pool.clone())))
}

pub fn block(name: &str, position: BlockPosition, order: Option<i32>, config: BlockConfig) -> BlockDraft {
    BlockDraft {
        name: name.to_owned(),
        position,
        order,
        estimated_minutes: Some(10),
        config,
    }
}

pub fn warmup() -> BlockConfig {
    BlockConfig::Warmup {
        activities: vec!["jump rope".to_owned()],
    }
}

pub fn stretch() -> BlockConfig {
    BlockConfig::Stretch {
        stretches: vec!["hamstring".to_owned()],
        hold_seconds: Some(30),
    }
}

/// Wraps the Postgres store and fails selected calls on demand.
pub struct FlakyStore {
    pub inner: PgScheduleStore,
    pub fail_block_inserts: AtomicBool,
    pub fail_completion: AtomicBool,
    pub fail_day_details: AtomicBool,
    /// Delay applied before each completion write, in milliseconds.
    pub completion_delay_ms: AtomicU64,
    /// When set, the next exercise read fetches its rows, signals
    /// `read_started`, and returns them only after `release_reads`.
    pub hold_exercise_reads: AtomicBool,
    pub read_started: Notify,
    pub reads_released: Notify,
    /// Fail exercise inserts into days of this week start, if set.
    pub fail_week: std::sync::Mutex<Option<NaiveDate>>,
    pub block_insert_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(pool: &PgPool) -> Arc<Self> {
        Arc::new(Self {
            inner: PgScheduleStore::new(pool.clone()),
            fail_block_inserts: AtomicBool::new(false),
            fail_completion: AtomicBool::new(false),
            fail_day_details: AtomicBool::new(false),
            completion_delay_ms: AtomicU64::new(0),
            hold_exercise_reads: AtomicBool::new(false),
            read_started: Notify::new(),
            reads_released: Notify::new(),
            fail_week: std::sync::Mutex::new(None),
            block_insert_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_fail_week(&self, week: Option<WeekKey>) {
        *self.fail_week.lock().unwrap() = week.map(WeekKey::start_date);
    }

    pub fn release_reads(&self) {
        self.reads_released.notify_one();
    }

    async fn before_completion_write(&self) -> Result<()> {
        let delay = self.completion_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_completion.load(Ordering::SeqCst) {
            bail!("injected network failure");
        }
        Ok(())
    }
}

#[async_trait]
impl ScheduleStore for FlakyStore {
    async fn list_days(&self, student_id: &str, coach_id: &str, week: WeekKey) -> Result<Vec<DaySchedule>> {
        self.inner.list_days(student_id, coach_id, week).await
    }

    async fn get_day(&self, id: Uuid) -> Result<Option<DaySchedule>> {
        self.inner.get_day(id).await
    }

    async fn get_day_by_key(&self, key: &DayKey) -> Result<Option<DaySchedule>> {
        self.inner.get_day_by_key(key).await
    }

    async fn insert_day_if_absent(&self, key: &DayKey) -> Result<Option<DaySchedule>> {
        self.inner.insert_day_if_absent(key).await
    }

    async fn update_day_details(
        &self,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        source_template_id: Option<Uuid>,
    ) -> Result<DaySchedule> {
        if self.fail_day_details.load(Ordering::SeqCst) {
            bail!("injected day details failure");
        }
        self.inner
            .update_day_details(id, name, description, source_template_id)
            .await
    }

    async fn list_exercises(&self, day_ids: &[Uuid]) -> Result<Vec<Exercise>> {
        let rows = self.inner.list_exercises(day_ids).await?;
        if self.hold_exercise_reads.swap(false, Ordering::SeqCst) {
            self.read_started.notify_one();
            self.reads_released.notified().await;
        }
        Ok(rows)
    }

    async fn list_blocks(&self, day_ids: &[Uuid]) -> Result<Vec<WorkoutBlock>> {
        self.inner.list_blocks(day_ids).await
    }

    async fn clear_day_content(&self, day_id: Uuid) -> Result<(u64, u64)> {
        self.inner.clear_day_content(day_id).await
    }

    async fn insert_exercises(&self, day_id: Uuid, drafts: &[ExerciseDraft]) -> Result<Vec<Exercise>> {
        let fail_week = *self.fail_week.lock().unwrap();
        if let Some(week_start) = fail_week {
            if let Some(day) = self.inner.get_day(day_id).await? {
                if day.week_start == week_start {
                    bail!("injected exercise insert failure for week {week_start}");
                }
            }
        }
        self.inner.insert_exercises(day_id, drafts).await
    }

    async fn insert_blocks(&self, day_id: Uuid, drafts: &[BlockDraft]) -> Result<Vec<WorkoutBlock>> {
        self.block_insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_block_inserts.load(Ordering::SeqCst) {
            bail!("injected block insert failure");
        }
        self.inner.insert_blocks(day_id, drafts).await
    }

    async fn delete_exercises(&self, ids: &[Uuid]) -> Result<u64> {
        self.inner.delete_exercises(ids).await
    }

    async fn delete_blocks(&self, ids: &[Uuid]) -> Result<u64> {
        self.inner.delete_blocks(ids).await
    }

    async fn load_template(&self, id: Uuid) -> Result<Option<TemplateContent>> {
        self.inner.load_template(id).await
    }

    async fn set_exercise_completed(&self, id: Uuid, completed: bool) -> Result<bool> {
        self.before_completion_write().await?;
        self.inner.set_exercise_completed(id, completed).await
    }

    async fn set_day_completed(&self, id: Uuid, completed: bool) -> Result<bool> {
        self.before_completion_write().await?;
        self.inner.set_day_completed(id, completed).await
    }
}
