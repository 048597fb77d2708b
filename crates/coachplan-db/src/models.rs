use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a workout plan.
///
/// Transitions only move forward: `active -> ended` or `active -> renewed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Ended,
    Renewed,
}

impl PlanStatus {
    /// Whether `self -> to` is an allowed lifecycle edge.
    pub fn can_transition_to(self, to: PlanStatus) -> bool {
        matches!(
            (self, to),
            (PlanStatus::Active, PlanStatus::Ended) | (PlanStatus::Active, PlanStatus::Renewed)
        )
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Ended => "ended",
            Self::Renewed => "renewed",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "ended" => Ok(Self::Ended),
            "renewed" => Ok(Self::Renewed),
            other => Err(ParseEnumError::new("plan status", other)),
        }
    }
}

/// Error returned when a text column or CLI value does not name a known
/// variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------

/// How the exercises sharing a `group_id` are performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum GroupType {
    Normal,
    BiSet,
    TriSet,
    DropSet,
    Superset,
}

impl GroupType {
    pub const ALL: [GroupType; 5] = [
        GroupType::Normal,
        GroupType::BiSet,
        GroupType::TriSet,
        GroupType::DropSet,
        GroupType::Superset,
    ];
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Normal => "normal",
            Self::BiSet => "bi-set",
            Self::TriSet => "tri-set",
            Self::DropSet => "drop-set",
            Self::Superset => "superset",
        };
        f.write_str(s)
    }
}

impl FromStr for GroupType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "bi-set" => Ok(Self::BiSet),
            "tri-set" => Ok(Self::TriSet),
            "drop-set" => Ok(Self::DropSet),
            "superset" => Ok(Self::Superset),
            other => Err(ParseEnumError::new("group type", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Kind of non-strength segment in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Cardio,
    Warmup,
    Stretch,
    Mobility,
    Core,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cardio => "cardio",
            Self::Warmup => "warmup",
            Self::Stretch => "stretch",
            Self::Mobility => "mobility",
            Self::Core => "core",
        };
        f.write_str(s)
    }
}

impl FromStr for BlockType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cardio" => Ok(Self::Cardio),
            "warmup" => Ok(Self::Warmup),
            "stretch" => Ok(Self::Stretch),
            "mobility" => Ok(Self::Mobility),
            "core" => Ok(Self::Core),
            other => Err(ParseEnumError::new("block type", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Where a block sits relative to the strength work of the session.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BlockPosition {
    #[default]
    Start,
    Middle,
    End,
}

impl fmt::Display for BlockPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::Middle => "middle",
            Self::End => "end",
        };
        f.write_str(s)
    }
}

impl FromStr for BlockPosition {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "middle" => Ok(Self::Middle),
            "end" => Ok(Self::End),
            other => Err(ParseEnumError::new("block position", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// The three expiry reminders the external daily job may send for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderThreshold {
    SevenDays,
    ThreeDays,
    Expired,
}

impl ReminderThreshold {
    pub const ALL: [ReminderThreshold; 3] = [
        ReminderThreshold::SevenDays,
        ReminderThreshold::ThreeDays,
        ReminderThreshold::Expired,
    ];

    /// Remaining-days value at or below which this reminder is due.
    pub fn days_remaining(self) -> i64 {
        match self {
            Self::SevenDays => 7,
            Self::ThreeDays => 3,
            Self::Expired => 0,
        }
    }

    /// Boolean column on `workout_plans` recording that this reminder went out.
    pub fn column(self) -> &'static str {
        match self {
            Self::SevenDays => "reminder_7d_sent",
            Self::ThreeDays => "reminder_3d_sent",
            Self::Expired => "reminder_expired_sent",
        }
    }
}

impl fmt::Display for ReminderThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SevenDays => "7d",
            Self::ThreeDays => "3d",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Block configuration
// ---------------------------------------------------------------------------

/// Type-specific settings of a workout block, stored as JSONB.
///
/// The `type` tag doubles as the block's [`BlockType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockConfig {
    Cardio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modality: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intensity: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        heart_rate_zone: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        distance_km: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intervals: Option<u32>,
    },
    Warmup {
        #[serde(default)]
        activities: Vec<String>,
    },
    Stretch {
        #[serde(default)]
        stretches: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hold_seconds: Option<u32>,
    },
    Mobility {
        #[serde(default)]
        focus_areas: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool: Option<String>,
    },
    Core {
        #[serde(default)]
        exercises: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rounds: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        work_seconds: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rest_seconds: Option<u32>,
    },
}

impl BlockConfig {
    pub fn block_type(&self) -> BlockType {
        match self {
            Self::Cardio { .. } => BlockType::Cardio,
            Self::Warmup { .. } => BlockType::Warmup,
            Self::Stretch { .. } => BlockType::Stretch,
            Self::Mobility { .. } => BlockType::Mobility,
            Self::Core { .. } => BlockType::Core,
        }
    }

    /// An empty configuration for `block_type`.
    pub fn empty(block_type: BlockType) -> Self {
        match block_type {
            BlockType::Cardio => Self::Cardio {
                modality: None,
                intensity: None,
                heart_rate_zone: None,
                distance_km: None,
                intervals: None,
            },
            BlockType::Warmup => Self::Warmup {
                activities: Vec::new(),
            },
            BlockType::Stretch => Self::Stretch {
                stretches: Vec::new(),
                hold_seconds: None,
            },
            BlockType::Mobility => Self::Mobility {
                focus_areas: Vec::new(),
                tool: None,
            },
            BlockType::Core => Self::Core {
                exercises: Vec::new(),
                rounds: None,
                work_seconds: None,
                rest_seconds: None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A multi-week training program for one student.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkoutPlan {
    pub id: Uuid,
    pub student_id: String,
    pub coach_id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub duration_weeks: i32,
    pub notes: Option<String>,
    pub status: PlanStatus,
    pub reminder_7d_sent: bool,
    pub reminder_3d_sent: bool,
    pub reminder_expired_sent: bool,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl WorkoutPlan {
    /// Length of the plan in days.
    pub fn total_days(&self) -> i64 {
        i64::from(self.duration_weeks.max(0)) * 7
    }

    /// `start_date + duration_weeks * 7` days. Derived, never stored.
    pub fn computed_end_date(&self) -> NaiveDate {
        self.start_date
            .checked_add_days(Days::new(self.total_days() as u64))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn reminder_sent(&self, threshold: ReminderThreshold) -> bool {
        match threshold {
            ReminderThreshold::SevenDays => self.reminder_7d_sent,
            ReminderThreshold::ThreeDays => self.reminder_3d_sent,
            ReminderThreshold::Expired => self.reminder_expired_sent,
        }
    }
}

/// One workout session for a student in a given week and weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DaySchedule {
    pub id: Uuid,
    pub student_id: String,
    pub coach_id: String,
    /// Monday of the week this session belongs to.
    pub week_start: NaiveDate,
    /// ISO weekday, 1 = Monday .. 7 = Sunday.
    pub weekday: i32,
    pub order_in_day: i32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub completed: bool,
    pub source_template_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Natural key of a day schedule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DayKey {
    pub student_id: String,
    pub coach_id: String,
    pub week_start: NaiveDate,
    pub weekday: i32,
    pub order_in_day: i32,
}

/// A prescribed exercise within a day schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Exercise {
    pub id: Uuid,
    pub day_schedule_id: Uuid,
    pub name: String,
    pub video_link: Option<String>,
    #[sqlx(rename = "sort_order")]
    pub order: i32,
    pub sets: i32,
    pub reps: String,
    pub rest_seconds: i32,
    pub load: Option<String>,
    pub executed_load: Option<String>,
    pub notes: Option<String>,
    pub completed: bool,
    pub group_id: Option<String>,
    pub group_type: Option<GroupType>,
    pub order_in_group: Option<i32>,
    pub group_rest_seconds: Option<i32>,
}

impl Exercise {
    /// The prescription of this exercise, without student-recorded state
    /// (completion and executed load).
    pub fn to_draft(&self) -> ExerciseDraft {
        ExerciseDraft {
            name: self.name.clone(),
            video_link: self.video_link.clone(),
            order: self.order,
            sets: self.sets,
            reps: self.reps.clone(),
            rest_seconds: self.rest_seconds,
            load: self.load.clone(),
            notes: self.notes.clone(),
            group_id: self.group_id.clone(),
            group_type: self.group_type,
            order_in_group: self.order_in_group,
            group_rest_seconds: self.group_rest_seconds,
        }
    }
}

/// A non-strength block within a day schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkoutBlock {
    pub id: Uuid,
    pub day_schedule_id: Uuid,
    pub block_type: BlockType,
    pub name: String,
    pub position: BlockPosition,
    #[sqlx(rename = "sort_order")]
    pub order: i32,
    pub estimated_minutes: Option<i32>,
    pub completed: bool,
    pub config: Json<BlockConfig>,
}

impl WorkoutBlock {
    pub fn to_draft(&self) -> BlockDraft {
        BlockDraft {
            name: self.name.clone(),
            position: self.position,
            order: Some(self.order),
            estimated_minutes: self.estimated_minutes,
            config: self.config.0.clone(),
        }
    }
}

/// A coach-authored reusable bundle of exercises and blocks.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkoutTemplate {
    pub id: Uuid,
    pub coach_id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Exercise row owned by a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TemplateExercise {
    pub id: Uuid,
    pub template_id: Uuid,
    pub name: String,
    pub video_link: Option<String>,
    #[sqlx(rename = "sort_order")]
    pub order: i32,
    pub sets: i32,
    pub reps: String,
    pub rest_seconds: i32,
    pub load: Option<String>,
    pub notes: Option<String>,
    pub group_id: Option<String>,
    pub group_type: Option<GroupType>,
    pub order_in_group: Option<i32>,
    pub group_rest_seconds: Option<i32>,
}

impl TemplateExercise {
    pub fn to_draft(&self) -> ExerciseDraft {
        ExerciseDraft {
            name: self.name.clone(),
            video_link: self.video_link.clone(),
            order: self.order,
            sets: self.sets,
            reps: self.reps.clone(),
            rest_seconds: self.rest_seconds,
            load: self.load.clone(),
            notes: self.notes.clone(),
            group_id: self.group_id.clone(),
            group_type: self.group_type,
            order_in_group: self.order_in_group,
            group_rest_seconds: self.group_rest_seconds,
        }
    }
}

/// Block row owned by a template. `order` may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TemplateBlock {
    pub id: Uuid,
    pub template_id: Uuid,
    pub block_type: BlockType,
    pub name: String,
    pub position: BlockPosition,
    #[sqlx(rename = "sort_order")]
    pub order: Option<i32>,
    pub estimated_minutes: Option<i32>,
    pub config: Json<BlockConfig>,
}

impl TemplateBlock {
    pub fn to_draft(&self) -> BlockDraft {
        BlockDraft {
            name: self.name.clone(),
            position: self.position,
            order: self.order,
            estimated_minutes: self.estimated_minutes,
            config: self.config.0.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Insert shapes
// ---------------------------------------------------------------------------

/// An exercise not yet bound to a day or template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseDraft {
    pub name: String,
    pub video_link: Option<String>,
    pub order: i32,
    pub sets: i32,
    pub reps: String,
    pub rest_seconds: i32,
    pub load: Option<String>,
    pub notes: Option<String>,
    pub group_id: Option<String>,
    pub group_type: Option<GroupType>,
    pub order_in_group: Option<i32>,
    pub group_rest_seconds: Option<i32>,
}

impl ExerciseDraft {
    /// A standalone exercise with the given prescription and no group.
    pub fn new(name: impl Into<String>, order: i32, sets: i32, reps: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            video_link: None,
            order,
            sets,
            reps: reps.into(),
            rest_seconds: 60,
            load: None,
            notes: None,
            group_id: None,
            group_type: None,
            order_in_group: None,
            group_rest_seconds: None,
        }
    }

    /// Place the exercise in a group.
    pub fn grouped(mut self, group_id: impl Into<String>, group_type: GroupType, order_in_group: i32) -> Self {
        self.group_id = Some(group_id.into());
        self.group_type = Some(group_type);
        self.order_in_group = Some(order_in_group);
        self
    }
}

/// A block not yet bound to a day or template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDraft {
    pub name: String,
    pub position: BlockPosition,
    /// Missing or non-positive orders are replaced by list position on copy.
    pub order: Option<i32>,
    pub estimated_minutes: Option<i32>,
    pub config: BlockConfig,
}

impl BlockDraft {
    pub fn block_type(&self) -> BlockType {
        self.config.block_type()
    }
}

/// Fields of a new plan row.
#[derive(Debug, Clone)]
pub struct NewPlan<'a> {
    pub student_id: &'a str,
    pub coach_id: &'a str,
    pub name: &'a str,
    pub start_date: NaiveDate,
    pub duration_weeks: i32,
    pub notes: Option<&'a str>,
}

/// Fields of a new template row.
#[derive(Debug, Clone)]
pub struct NewTemplate<'a> {
    pub coach_id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub category: Option<&'a str>,
}
