//! Schedule-instance status transitions and work-item linking.

use crate::error::CoreError;
use crate::lifecycle;
use crate::models::{InstanceStatus, NewTaskData, ScheduleInstance, Task};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
impl super::InstanceRepository for SqliteRepository {
    async fn find_instance_by_id(&self, id: Uuid) -> Result<Option<ScheduleInstance>, CoreError> {
        let instance = sqlx::query_as("SELECT * FROM schedule_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(instance)
    }

    async fn complete_instance(&self, id: Uuid) -> Result<ScheduleInstance, CoreError> {
        let instance = self.require_instance(id).await?;
        lifecycle::check_transition(instance.status, InstanceStatus::Completed)?;

        let now = self.clock().now();
        let updated: ScheduleInstance = sqlx::query_as(
            r#"UPDATE schedule_instances
            SET status = $1, completed_at = $2, updated_at = $2
            WHERE id = $3
            RETURNING *"#,
        )
        .bind(InstanceStatus::Completed)
        .bind(now)
        .bind(id)
        .fetch_one(self.pool())
        .await?;

        debug!(instance_id = %id, "instance completed");
        Ok(updated)
    }

    async fn skip_instance(&self, id: Uuid) -> Result<ScheduleInstance, CoreError> {
        let instance = self.require_instance(id).await?;
        lifecycle::check_transition(instance.status, InstanceStatus::Skipped)?;

        let updated: ScheduleInstance = sqlx::query_as(
            r#"UPDATE schedule_instances
            SET status = $1, updated_at = $2
            WHERE id = $3
            RETURNING *"#,
        )
        .bind(InstanceStatus::Skipped)
        .bind(self.clock().now())
        .bind(id)
        .fetch_one(self.pool())
        .await?;

        debug!(instance_id = %id, "instance skipped");
        Ok(updated)
    }

    async fn link_work_item(&self, instance_id: Uuid, work_item_id: Uuid) -> Result<ScheduleInstance, CoreError> {
        let instance = self.require_instance(instance_id).await?;
        Self::check_linkable(&instance)?;

        let work_item: Option<Task> = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(work_item_id)
            .fetch_optional(self.pool())
            .await?;
        if work_item.is_none() {
            return Err(CoreError::NotFound(work_item_id.to_string()));
        }

        let updated: ScheduleInstance = sqlx::query_as(
            r#"UPDATE schedule_instances
            SET linked_work_item_id = $1, updated_at = $2
            WHERE id = $3
            RETURNING *"#,
        )
        .bind(work_item_id)
        .bind(self.clock().now())
        .bind(instance_id)
        .fetch_one(self.pool())
        .await?;

        debug!(instance_id = %instance_id, work_item_id = %work_item_id, "work item linked");
        Ok(updated)
    }

    async fn create_work_item(&self, instance_id: Uuid, data: NewTaskData) -> Result<Task, CoreError> {
        let now = self.clock().now();
        let mut tx = self.pool().begin().await?;

        let instance: ScheduleInstance =
            sqlx::query_as("SELECT * FROM schedule_instances WHERE id = $1")
                .bind(instance_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| CoreError::NotFound(instance_id.to_string()))?;
        Self::check_linkable(&instance)?;

        let mut data = data;
        // The work item inherits the cycle's date unless the caller pinned one.
        data.due_date = data.due_date.or(Some(instance.scheduled_date));
        data.recurrence = None;

        let task = Self::insert_task_in_tx(&mut tx, data, None, now).await?;

        sqlx::query(
            "UPDATE schedule_instances SET linked_work_item_id = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(task.id)
        .bind(now)
        .bind(instance_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(instance_id = %instance_id, work_item_id = %task.id, "work item created and linked");
        Ok(task)
    }

    async fn is_cycle_done(&self, instance_id: Uuid) -> Result<bool, CoreError> {
        let instance = self.require_instance(instance_id).await?;

        let linked: Option<Task> = match instance.linked_work_item_id {
            Some(work_item_id) => {
                sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
                    .bind(work_item_id)
                    .fetch_optional(self.pool())
                    .await?
            }
            None => None,
        };

        Ok(lifecycle::cycle_done(&instance, linked.as_ref()))
    }
}

impl SqliteRepository {
    async fn require_instance(&self, id: Uuid) -> Result<ScheduleInstance, CoreError> {
        sqlx::query_as("SELECT * FROM schedule_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }

    /// The work-item link is a one-way attribute of a pending instance.
    fn check_linkable(instance: &ScheduleInstance) -> Result<(), CoreError> {
        if instance.status != InstanceStatus::Pending {
            return Err(CoreError::InvalidInput(format!(
                "Cannot link a work item to a {} instance",
                instance.status
            )));
        }
        if instance.linked_work_item_id.is_some() {
            return Err(CoreError::InvalidInput(
                "Instance already has a linked work item".to_string(),
            ));
        }
        Ok(())
    }
}
