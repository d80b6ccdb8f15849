//! Maintenance-schedule storage and idempotent instance generation.

use crate::error::CoreError;
use crate::models::{InstanceStatus, MaintenanceSchedule, NewScheduleData, ScheduleInstance};
use crate::repository::{is_unique_violation, SqliteRepository};
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
impl super::ScheduleRepository for SqliteRepository {
    async fn add_schedule(&self, data: NewScheduleData) -> Result<MaintenanceSchedule, CoreError> {
        let now = self.clock().now();
        let schedule = MaintenanceSchedule {
            id: Uuid::now_v7(),
            asset_id: data.asset_id,
            interval_months: data.interval_months,
            first_due_date: data.first_due_date,
            active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO maintenance_schedules (id, asset_id, interval_months, first_due_date, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(schedule.id)
        .bind(schedule.asset_id)
        .bind(schedule.interval_months)
        .bind(schedule.first_due_date)
        .bind(schedule.active)
        .bind(schedule.created_at)
        .bind(schedule.updated_at)
        .execute(self.pool())
        .await?;

        Ok(schedule)
    }

    async fn find_schedule_by_id(&self, id: Uuid) -> Result<Option<MaintenanceSchedule>, CoreError> {
        let schedule = sqlx::query_as("SELECT * FROM maintenance_schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(schedule)
    }

    async fn find_schedules_for_asset(&self, asset_id: Uuid) -> Result<Vec<MaintenanceSchedule>, CoreError> {
        let schedules = sqlx::query_as(
            "SELECT * FROM maintenance_schedules WHERE asset_id = $1 ORDER BY first_due_date",
        )
        .bind(asset_id)
        .fetch_all(self.pool())
        .await?;
        Ok(schedules)
    }

    async fn find_active_schedules(&self) -> Result<Vec<MaintenanceSchedule>, CoreError> {
        let schedules = sqlx::query_as(
            "SELECT * FROM maintenance_schedules WHERE active = 1 ORDER BY first_due_date",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(schedules)
    }

    async fn deactivate_schedule(&self, id: Uuid) -> Result<MaintenanceSchedule, CoreError> {
        let schedule: MaintenanceSchedule = sqlx::query_as(
            r#"UPDATE maintenance_schedules
            SET active = 0, updated_at = $1
            WHERE id = $2
            RETURNING *"#,
        )
        .bind(self.clock().now())
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Schedule with id {} not found", id)))?;

        debug!(schedule_id = %id, "schedule deactivated");
        Ok(schedule)
    }

    async fn instances_for(
        &self,
        schedule_id: Uuid,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Vec<ScheduleInstance>, CoreError> {
        let schedule: MaintenanceSchedule =
            sqlx::query_as("SELECT * FROM maintenance_schedules WHERE id = $1")
                .bind(schedule_id)
                .fetch_optional(self.pool())
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("Schedule with id {} not found", schedule_id)))?;

        // A deactivated schedule generates nothing, but instances that were
        // materialized while it was active remain queryable.
        if schedule.active {
            for scheduled_date in schedule.occurrence_dates(window_start, window_end) {
                self.materialize_instance(schedule_id, scheduled_date).await?;
            }
        }

        let instances = sqlx::query_as(
            r#"SELECT * FROM schedule_instances
            WHERE schedule_id = $1 AND scheduled_date BETWEEN $2 AND $3
            ORDER BY scheduled_date"#,
        )
        .bind(schedule_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_all(self.pool())
        .await?;
        Ok(instances)
    }

    async fn refresh_all(
        &self,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Vec<ScheduleInstance>, CoreError> {
        let mut instances = Vec::new();
        for schedule in self.find_active_schedules().await? {
            instances.extend(self.instances_for(schedule.id, window_start, window_end).await?);
        }
        Ok(instances)
    }
}

impl SqliteRepository {
    /// Ensures one pending instance exists for `(schedule_id, scheduled_date)`.
    /// An existing instance is left untouched; losing an insert race to the
    /// unique constraint counts as already materialized.
    async fn materialize_instance(
        &self,
        schedule_id: Uuid,
        scheduled_date: NaiveDate,
    ) -> Result<(), CoreError> {
        let existing: Option<ScheduleInstance> = sqlx::query_as(
            "SELECT * FROM schedule_instances WHERE schedule_id = $1 AND scheduled_date = $2",
        )
        .bind(schedule_id)
        .bind(scheduled_date)
        .fetch_optional(self.pool())
        .await?;

        if existing.is_some() {
            return Ok(());
        }

        let now = self.clock().now();
        let inserted = sqlx::query(
            r#"INSERT INTO schedule_instances (id, schedule_id, scheduled_date, status, linked_work_item_id, completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NULL, NULL, $5, $5)"#,
        )
        .bind(Uuid::now_v7())
        .bind(schedule_id)
        .bind(scheduled_date)
        .bind(InstanceStatus::Pending)
        .bind(now)
        .execute(self.pool())
        .await;

        match inserted {
            Ok(_) => {
                debug!(schedule_id = %schedule_id, scheduled_date = %scheduled_date, "materialized instance");
                Ok(())
            }
            Err(err) if is_unique_violation(&err) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
