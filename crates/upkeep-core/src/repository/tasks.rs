//! Task storage, completion and recurring-series advancement.

use crate::error::CoreError;
use crate::models::{
    CompletionResult, NewTaskData, RecurrenceRule, RecurrenceSeries, Task, TaskPriority,
    TaskStatus,
};
use crate::recurrence;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Sqlite, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

/// Raw series row; the rule column is [`RecurrenceRule`] JSON.
#[derive(Debug, FromRow)]
pub(crate) struct SeriesRow {
    pub id: Uuid,
    pub rule: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SeriesRow {
    pub(crate) fn decode(self) -> Result<RecurrenceSeries, CoreError> {
        let rule: RecurrenceRule = serde_json::from_str(&self.rule)?;
        Ok(RecurrenceSeries {
            id: self.id,
            rule,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl super::TaskRepository for SqliteRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        let now = self.clock().now();
        let mut tx = self.pool().begin().await?;

        let series_id = match &data.recurrence {
            Some(new_recurrence) => {
                recurrence::validate(&new_recurrence.pattern)?;
                let rule = RecurrenceRule {
                    pattern: new_recurrence.pattern.clone(),
                    end_date: new_recurrence.end_date,
                    // The task being created is the first fire of the series.
                    next_occurrence: data.due_date.unwrap_or_else(|| self.clock().today()),
                };
                let series_id = Uuid::now_v7();
                sqlx::query(
                    r#"INSERT INTO recurrence_series (id, rule, created_at, updated_at)
                    VALUES ($1, $2, $3, $4)"#,
                )
                .bind(series_id)
                .bind(serde_json::to_string(&rule)?)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                Some(series_id)
            }
            None => None,
        };

        let task = Self::insert_task_in_tx(&mut tx, data, series_id, now).await?;
        tx.commit().await?;
        Ok(task)
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(task)
    }

    async fn find_series_by_id(&self, id: Uuid) -> Result<Option<RecurrenceSeries>, CoreError> {
        let row: Option<SeriesRow> = sqlx::query_as("SELECT * FROM recurrence_series WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(SeriesRow::decode).transpose()
    }

    async fn complete_task(&self, id: Uuid) -> Result<CompletionResult, CoreError> {
        let now = self.clock().now();
        let mut tx = self.pool().begin().await?;

        let task: Task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        if task.status == TaskStatus::Completed {
            return Err(CoreError::InvalidInput("Task is already completed".to_string()));
        }

        let completed: Task = sqlx::query_as(
            r#"UPDATE tasks
            SET status = $1, completed_at = $2, updated_at = $2
            WHERE id = $3
            RETURNING *"#,
        )
        .bind(TaskStatus::Completed)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        // Folder reconciliation shares the transaction with the status
        // write. If the move fails, the user-visible completion is kept by
        // re-applying the status on its own and the move failure surfaces as
        // a retryable error.
        let completed = match Self::move_to_completed_holder(&mut tx, &completed, now).await {
            Ok(moved) => {
                tx.commit().await?;
                moved
            }
            Err(source) => {
                tx.rollback().await?;
                warn!(task_id = %id, "folder reconciliation failed, committing completion alone");
                sqlx::query(
                    "UPDATE tasks SET status = $1, completed_at = $2, updated_at = $2 WHERE id = $3",
                )
                .bind(TaskStatus::Completed)
                .bind(now)
                .bind(id)
                .execute(self.pool())
                .await?;
                return Err(CoreError::Reconciliation { task_id: id, source: Box::new(source) });
            }
        };

        if completed.series_id.is_none() {
            return Ok(CompletionResult::Single(completed));
        }

        // Completion and reconciliation are committed; a failure past this
        // point must not undo them.
        match self.advance_completed_occurrence(&completed).await {
            Ok(Some(next)) => Ok(CompletionResult::Recurring { completed, next }),
            Ok(None) => Ok(CompletionResult::SeriesEnded { completed }),
            Err(source) => Err(CoreError::AdvanceFailed {
                completed_id: completed.id,
                source: Box::new(source),
            }),
        }
    }

    async fn reopen_task(&self, id: Uuid, status: TaskStatus) -> Result<Task, CoreError> {
        if status == TaskStatus::Completed {
            return Err(CoreError::InvalidInput(
                "Cannot reopen a task into the completed status".to_string(),
            ));
        }

        let now = self.clock().now();
        let mut tx = self.pool().begin().await?;

        let task: Task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        let was_completed = task.status == TaskStatus::Completed;

        let reopened: Task = sqlx::query_as(
            r#"UPDATE tasks
            SET status = $1, completed_at = NULL, updated_at = $2
            WHERE id = $3
            RETURNING *"#,
        )
        .bind(&status)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let reopened = if was_completed {
            Self::restore_previous_folder(&mut tx, &reopened, now).await?
        } else {
            reopened
        };

        tx.commit().await?;
        Ok(reopened)
    }

    async fn reconcile_folder(&self, id: Uuid) -> Result<Task, CoreError> {
        let now = self.clock().now();
        let mut tx = self.pool().begin().await?;

        let task: Task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        if task.status != TaskStatus::Completed {
            return Err(CoreError::InvalidInput(
                "Only a completed task can be moved to its completed folder".to_string(),
            ));
        }

        let holder = Self::ensure_completed_folder_in_tx(&mut tx, task.owner_id, now).await?;
        if task.folder_id == Some(holder.id) {
            tx.commit().await?;
            return Ok(task);
        }

        let moved = Self::move_to_completed_holder(&mut tx, &task, now).await?;
        tx.commit().await?;
        debug!(task_id = %id, "folder reconciliation retried");
        Ok(moved)
    }

    async fn advance_series(&self, completed_task_id: Uuid) -> Result<Option<Task>, CoreError> {
        let task: Task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(completed_task_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| CoreError::NotFound(completed_task_id.to_string()))?;

        if task.status != TaskStatus::Completed {
            return Err(CoreError::InvalidInput(
                "Only a completed occurrence can advance its series".to_string(),
            ));
        }
        if task.series_id.is_none() {
            return Err(CoreError::InvalidInput("Task is not recurring".to_string()));
        }

        self.advance_completed_occurrence(&task).await
    }
}

impl SqliteRepository {
    /// Spawns the next occurrence of a completed recurring task and caches
    /// the new fire date on the series. Returns `None` when the series' end
    /// date cuts the sequence off. Idempotent: an occurrence already due on
    /// the computed date is returned instead of duplicated.
    async fn advance_completed_occurrence(&self, completed: &Task) -> Result<Option<Task>, CoreError> {
        let series_id = completed
            .series_id
            .ok_or_else(|| CoreError::InvalidInput("Task is not recurring".to_string()))?;
        let now = self.clock().now();
        let mut tx = self.pool().begin().await?;

        let series = sqlx::query_as::<_, SeriesRow>("SELECT * FROM recurrence_series WHERE id = $1")
            .bind(series_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Series with id {} not found", series_id)))?
            .decode()?;

        series.rule.validate()?;

        let anchor = completed.due_date.unwrap_or_else(|| self.clock().today());
        let Some(next_due) = series.rule.due_after(anchor) else {
            debug!(series_id = %series_id, "series reached its end date");
            return Ok(None);
        };

        let existing: Option<Task> = sqlx::query_as(
            "SELECT * FROM tasks WHERE series_id = $1 AND due_date = $2 AND id != $3 LIMIT 1",
        )
        .bind(series_id)
        .bind(next_due)
        .bind(completed.id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(task) = existing {
            return Ok(Some(task));
        }

        // The new occurrence is created in the series' normal location: the
        // folder the completed one occupied before it was parked.
        let next = Task {
            id: Uuid::now_v7(),
            owner_id: completed.owner_id,
            title: completed.title.clone(),
            description: completed.description.clone(),
            assignee: completed.assignee.clone(),
            status: TaskStatus::Todo,
            priority: completed.priority.clone(),
            due_date: Some(next_due),
            folder_id: completed.previous_folder_id,
            previous_folder_id: None,
            series_id: Some(series_id),
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        Self::insert_task_row(&mut tx, &next).await?;

        let mut rule = series.rule;
        rule.next_occurrence = next_due;
        sqlx::query("UPDATE recurrence_series SET rule = $1, updated_at = $2 WHERE id = $3")
            .bind(serde_json::to_string(&rule)?)
            .bind(now)
            .bind(series_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(series_id = %series_id, due_date = %next_due, "spawned next occurrence");
        Ok(Some(next))
    }

    /// Builds and inserts a task within an existing transaction.
    pub(crate) async fn insert_task_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        data: NewTaskData,
        series_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Task, CoreError> {
        let task = Task {
            id: Uuid::now_v7(),
            owner_id: data.owner_id,
            title: data.title,
            description: data.description,
            assignee: data.assignee,
            status: TaskStatus::Todo,
            priority: data.priority.unwrap_or(TaskPriority::None),
            due_date: data.due_date,
            folder_id: data.folder_id,
            previous_folder_id: None,
            series_id,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        Self::insert_task_row(tx, &task).await?;
        Ok(task)
    }

    async fn insert_task_row(tx: &mut Transaction<'_, Sqlite>, task: &Task) -> Result<(), CoreError> {
        sqlx::query(
            r#"INSERT INTO tasks (id, owner_id, title, description, assignee, status, priority, due_date, folder_id, previous_folder_id, series_id, completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
        )
        .bind(task.id)
        .bind(task.owner_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.assignee)
        .bind(&task.status)
        .bind(&task.priority)
        .bind(task.due_date)
        .bind(task.folder_id)
        .bind(task.previous_folder_id)
        .bind(task.series_id)
        .bind(task.completed_at)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
