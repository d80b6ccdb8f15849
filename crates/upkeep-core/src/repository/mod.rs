use crate::clock::{Clock, SystemClock};
use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    CompletionResult, Folder, MaintenanceSchedule, NewScheduleData, NewTaskData,
    RecurrenceSeries, ScheduleInstance, Task, TaskStatus,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

// Re-export domain modules
pub mod folders;
pub mod instances;
pub mod schedules;
pub mod tasks;

// Traits are defined in this module and implemented in respective domain modules

/// Domain-specific trait for task operations, including recurring-series
/// advancement on completion.
#[async_trait]
pub trait TaskRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError>;
    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError>;
    async fn find_series_by_id(&self, id: Uuid) -> Result<Option<RecurrenceSeries>, CoreError>;
    /// Marks a task completed, reconciles its folder and, for recurring
    /// occurrences, spawns the next one. The completion itself is committed
    /// before the follow-up steps run; their failures are surfaced as
    /// [`CoreError::Reconciliation`] / [`CoreError::AdvanceFailed`] without
    /// undoing the completion.
    async fn complete_task(&self, id: Uuid) -> Result<CompletionResult, CoreError>;
    /// Moves a completed task back to a non-completed status, restoring its
    /// pre-completion folder.
    async fn reopen_task(&self, id: Uuid, status: TaskStatus) -> Result<Task, CoreError>;
    /// Re-runs the holding-folder move for an already-completed task, for
    /// recovery after a [`CoreError::Reconciliation`]. Idempotent: a task
    /// already parked in the holding folder is returned unchanged.
    async fn reconcile_folder(&self, id: Uuid) -> Result<Task, CoreError>;
    /// Re-runs the series advance for an already-completed occurrence, for
    /// recovery after an [`CoreError::AdvanceFailed`]. Idempotent: if the
    /// next occurrence already exists it is returned instead of duplicated.
    async fn advance_series(&self, completed_task_id: Uuid) -> Result<Option<Task>, CoreError>;
}

/// Domain-specific trait for folder operations
#[async_trait]
pub trait FolderRepository {
    async fn add_folder(&self, owner_id: Uuid, name: String, ordinal: i64) -> Result<Folder, CoreError>;
    async fn find_folders_for_owner(&self, owner_id: Uuid) -> Result<Vec<Folder>, CoreError>;
    /// Resolves the owner's completed holding folder, creating it on first
    /// use.
    async fn ensure_completed_folder(&self, owner_id: Uuid) -> Result<Folder, CoreError>;
}

/// Domain-specific trait for maintenance-schedule operations
#[async_trait]
pub trait ScheduleRepository {
    async fn add_schedule(&self, data: NewScheduleData) -> Result<MaintenanceSchedule, CoreError>;
    async fn find_schedule_by_id(&self, id: Uuid) -> Result<Option<MaintenanceSchedule>, CoreError>;
    async fn find_schedules_for_asset(&self, asset_id: Uuid) -> Result<Vec<MaintenanceSchedule>, CoreError>;
    async fn find_active_schedules(&self) -> Result<Vec<MaintenanceSchedule>, CoreError>;
    async fn deactivate_schedule(&self, id: Uuid) -> Result<MaintenanceSchedule, CoreError>;
    /// Materializes and returns the schedule's instances inside the window.
    /// Idempotent over `(schedule_id, scheduled_date)`: re-running for an
    /// overlapping window returns the existing instances unchanged. A
    /// deactivated schedule generates nothing, but its already-materialized
    /// instances are still returned.
    async fn instances_for(
        &self,
        schedule_id: Uuid,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Vec<ScheduleInstance>, CoreError>;
    /// Runs generation for every active schedule, the entry point for a
    /// periodic caller refreshing the current window.
    async fn refresh_all(
        &self,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Vec<ScheduleInstance>, CoreError>;
}

/// Domain-specific trait for schedule-instance lifecycle operations
#[async_trait]
pub trait InstanceRepository {
    async fn find_instance_by_id(&self, id: Uuid) -> Result<Option<ScheduleInstance>, CoreError>;
    async fn complete_instance(&self, id: Uuid) -> Result<ScheduleInstance, CoreError>;
    async fn skip_instance(&self, id: Uuid) -> Result<ScheduleInstance, CoreError>;
    /// One-way link from a pending instance to an existing work item.
    async fn link_work_item(&self, instance_id: Uuid, work_item_id: Uuid) -> Result<ScheduleInstance, CoreError>;
    /// Creates a work item from the supplied data and links it to the
    /// instance in one transaction.
    async fn create_work_item(&self, instance_id: Uuid, data: NewTaskData) -> Result<Task, CoreError>;
    /// The OR-read: done iff the instance is completed or its linked work
    /// item is.
    async fn is_cycle_done(&self, instance_id: Uuid) -> Result<bool, CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository: TaskRepository + FolderRepository + ScheduleRepository + InstanceRepository {}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl SqliteRepository {
    pub fn new(pool: DbPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub fn with_system_clock(pool: DbPool) -> Self {
        Self::new(pool, Arc::new(SystemClock))
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Get a reference to the injected clock for internal use
    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

impl Repository for SqliteRepository {}

/// The persistence layer enforces uniqueness invariants as constraints;
/// generators treat a violation as "already materialized" and re-fetch.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
    )
}
