use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Todo => write!(f, "todo"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task status: {0}")]
pub struct ParseTaskStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    None,
    Low,
    Medium,
    High,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task priority: {0}")]
pub struct ParseTaskPriorityError(String);

impl FromStr for TaskPriority {
    type Err = ParseTaskPriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(TaskPriority::None),
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(ParseTaskPriorityError(s.to_string())),
        }
    }
}

/// How a recurring series repeats. One variant per frequency, so each
/// frequency only carries the fields it actually consults. Unknown or
/// frequency-irrelevant fields in stored JSON are ignored on read.
///
/// Weekdays are numbered 0 (Sunday) through 6 (Saturday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "lowercase")]
pub enum RecurrencePattern {
    Daily {
        #[serde(default = "default_interval")]
        interval: u32,
    },
    Weekly {
        #[serde(default = "default_interval")]
        interval: u32,
        /// Empty set means "same weekday as the anchor".
        #[serde(default)]
        days_of_week: BTreeSet<u8>,
    },
    Monthly {
        #[serde(default = "default_interval")]
        interval: u32,
        /// Unset means "same day of month as the anchor".
        #[serde(default)]
        day_of_month: Option<u32>,
    },
    Yearly {
        #[serde(default = "default_interval")]
        interval: u32,
        #[serde(default)]
        day_of_month: Option<u32>,
        /// Unset means "same month as the anchor".
        #[serde(default)]
        month: Option<u32>,
    },
}

fn default_interval() -> u32 {
    1
}

impl RecurrencePattern {
    pub fn interval(&self) -> u32 {
        match self {
            RecurrencePattern::Daily { interval }
            | RecurrencePattern::Weekly { interval, .. }
            | RecurrencePattern::Monthly { interval, .. }
            | RecurrencePattern::Yearly { interval, .. } => *interval,
        }
    }
}

/// A recurrence pattern together with its series bookkeeping: an optional
/// end date (the series stops producing occurrences strictly after it) and
/// the cached next fire date, advanced after each completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    #[serde(flatten)]
    pub pattern: RecurrencePattern,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub next_occurrence: NaiveDate,
}

/// A persisted recurring series. Occurrence tasks back-reference it through
/// `Task::series_id`; the rule column holds [`RecurrenceRule`] as JSON.
#[derive(Debug, Clone)]
pub struct RecurrenceSeries {
    pub id: Uuid,
    pub rule: RecurrenceRule,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A work item. Occurrences of a recurring series are ordinary tasks that
/// carry a `series_id`; work items generated for maintenance instances are
/// ordinary tasks referenced by `ScheduleInstance::linked_work_item_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub folder_id: Option<Uuid>,
    /// Location the task occupied before completion moved it, restored when
    /// the completion is undone.
    pub previous_folder_id: Option<Uuid>,
    pub series_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_recurring(&self) -> bool {
        self.series_id.is_some()
    }
}

/// A task location. Each owner has an ordered set of folders plus at most
/// one designated completed-holding folder.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Folder {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub ordinal: i64,
    pub is_completed_holder: bool,
    pub created_at: DateTime<Utc>,
}

/// Allowed month strides for a maintenance schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
pub enum IntervalMonths {
    Monthly = 1,
    Bimonthly = 2,
    Quarterly = 3,
    SemiAnnual = 6,
    Annual = 12,
}

impl IntervalMonths {
    pub fn months(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for IntervalMonths {
    type Error = ParseIntervalMonthsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(IntervalMonths::Monthly),
            2 => Ok(IntervalMonths::Bimonthly),
            3 => Ok(IntervalMonths::Quarterly),
            6 => Ok(IntervalMonths::SemiAnnual),
            12 => Ok(IntervalMonths::Annual),
            _ => Err(ParseIntervalMonthsError(value)),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid maintenance interval: {0} months (expected 1, 2, 3, 6 or 12)")]
pub struct ParseIntervalMonthsError(u32);

/// An interval-months upkeep configuration bound to an asset. Immutable once
/// created except for deactivation; deactivation stops future instance
/// generation but never removes already-materialized instances.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MaintenanceSchedule {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub interval_months: IntervalMonths,
    pub first_due_date: NaiveDate,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Pending,
    Completed,
    Skipped,
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Pending => write!(f, "pending"),
            InstanceStatus::Completed => write!(f, "completed"),
            InstanceStatus::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid instance status: {0}")]
pub struct ParseInstanceStatusError(String);

impl FromStr for InstanceStatus {
    type Err = ParseInstanceStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(InstanceStatus::Pending),
            "completed" => Ok(InstanceStatus::Completed),
            "skipped" => Ok(InstanceStatus::Skipped),
            _ => Err(ParseInstanceStatusError(s.to_string())),
        }
    }
}

/// One concrete, independently trackable cycle of a maintenance schedule.
/// At most one instance exists per `(schedule_id, scheduled_date)` pair.
/// `completed_at` is set exactly when `status` is completed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleInstance {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub status: InstanceStatus,
    pub linked_work_item_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Recurrence configuration supplied when creating a recurring task.
#[derive(Debug, Clone)]
pub struct NewRecurrence {
    pub pattern: RecurrencePattern,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub folder_id: Option<Uuid>,
    /// When present, a [`RecurrenceSeries`] is created and the task becomes
    /// its first occurrence.
    pub recurrence: Option<NewRecurrence>,
}

#[derive(Debug, Clone)]
pub struct NewScheduleData {
    pub asset_id: Uuid,
    pub interval_months: IntervalMonths,
    pub first_due_date: NaiveDate,
}

/// Outcome of completing a task.
#[derive(Debug)]
pub enum CompletionResult {
    /// A plain, non-recurring task was completed.
    Single(Task),
    /// A recurring occurrence was completed and the next one was spawned.
    Recurring { completed: Task, next: Task },
    /// A recurring occurrence was completed and its series produced no
    /// further occurrence (end date reached). Not an error.
    SeriesEnded { completed: Task },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_round_trips_through_from_str() {
        for status in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Completed] {
            assert_eq!(status.to_string().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn interval_months_rejects_unsupported_strides() {
        assert_eq!(IntervalMonths::try_from(3).unwrap(), IntervalMonths::Quarterly);
        assert_eq!(IntervalMonths::Annual.months(), 12);
        assert!(IntervalMonths::try_from(5).is_err());
        assert!(IntervalMonths::try_from(0).is_err());
    }

    #[test]
    fn pattern_serializes_with_frequency_tag() {
        let pattern = RecurrencePattern::Weekly {
            interval: 2,
            days_of_week: [1u8, 4].into_iter().collect(),
        };
        let json = serde_json::to_value(&pattern).unwrap();
        assert_eq!(json["frequency"], "weekly");
        assert_eq!(json["interval"], 2);
    }

    #[test]
    fn pattern_read_tolerates_irrelevant_fields() {
        // A daily rule that still carries weekly/monthly leftovers decodes
        // cleanly; the extra fields are simply ignored.
        let json = r#"{"frequency":"daily","interval":3,"days_of_week":[1,2],"day_of_month":15}"#;
        let pattern: RecurrencePattern = serde_json::from_str(json).unwrap();
        assert_eq!(pattern, RecurrencePattern::Daily { interval: 3 });
    }

    #[test]
    fn pattern_read_defaults_missing_interval() {
        let pattern: RecurrencePattern =
            serde_json::from_str(r#"{"frequency":"monthly"}"#).unwrap();
        assert_eq!(
            pattern,
            RecurrencePattern::Monthly { interval: 1, day_of_month: None }
        );
    }

    #[test]
    fn rule_round_trips_as_json() {
        let rule = RecurrenceRule {
            pattern: RecurrencePattern::Monthly { interval: 1, day_of_month: Some(31) },
            end_date: Some(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()),
            next_occurrence: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        };
        let json = serde_json::to_string(&rule).unwrap();
        let decoded: RecurrenceRule = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, rule);
    }
}
