//! Folder storage and completion reconciliation.
//!
//! Completing a task parks it in its owner's completed holding folder and
//! records where it came from; undoing the completion moves it back. The
//! holding folder is resolved per owner and created on first use, inside the
//! same transaction as the move that needs it.

use crate::error::CoreError;
use crate::models::{Folder, Task};
use crate::repository::{is_unique_violation, SqliteRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use tracing::debug;
use uuid::Uuid;

const COMPLETED_FOLDER_NAME: &str = "Completed";

/// Ordinal placing the holding folder after any user-created folder.
const COMPLETED_FOLDER_ORDINAL: i64 = i64::MAX;

#[async_trait]
impl super::FolderRepository for SqliteRepository {
    async fn add_folder(&self, owner_id: Uuid, name: String, ordinal: i64) -> Result<Folder, CoreError> {
        let folder = Folder {
            id: Uuid::now_v7(),
            owner_id,
            name,
            ordinal,
            is_completed_holder: false,
            created_at: self.clock().now(),
        };

        sqlx::query(
            r#"INSERT INTO folders (id, owner_id, name, ordinal, is_completed_holder, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(folder.id)
        .bind(folder.owner_id)
        .bind(&folder.name)
        .bind(folder.ordinal)
        .bind(folder.is_completed_holder)
        .bind(folder.created_at)
        .execute(self.pool())
        .await?;

        Ok(folder)
    }

    async fn find_folders_for_owner(&self, owner_id: Uuid) -> Result<Vec<Folder>, CoreError> {
        let folders = sqlx::query_as(
            "SELECT * FROM folders WHERE owner_id = $1 ORDER BY ordinal, created_at",
        )
        .bind(owner_id)
        .fetch_all(self.pool())
        .await?;
        Ok(folders)
    }

    async fn ensure_completed_folder(&self, owner_id: Uuid) -> Result<Folder, CoreError> {
        let mut tx = self.pool().begin().await?;
        let folder = Self::ensure_completed_folder_in_tx(&mut tx, owner_id, self.clock().now()).await?;
        tx.commit().await?;
        Ok(folder)
    }
}

impl SqliteRepository {
    /// Resolves the owner's completed holding folder inside a transaction,
    /// creating it on first use. A concurrent creation loses the insert to
    /// the per-owner unique index and re-reads the winner's row.
    pub(crate) async fn ensure_completed_folder_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Folder, CoreError> {
        let existing: Option<Folder> = sqlx::query_as(
            "SELECT * FROM folders WHERE owner_id = $1 AND is_completed_holder = 1",
        )
        .bind(owner_id)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(folder) = existing {
            return Ok(folder);
        }

        let folder = Folder {
            id: Uuid::now_v7(),
            owner_id,
            name: COMPLETED_FOLDER_NAME.to_string(),
            ordinal: COMPLETED_FOLDER_ORDINAL,
            is_completed_holder: true,
            created_at: now,
        };

        let inserted = sqlx::query(
            r#"INSERT INTO folders (id, owner_id, name, ordinal, is_completed_holder, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(folder.id)
        .bind(folder.owner_id)
        .bind(&folder.name)
        .bind(folder.ordinal)
        .bind(folder.is_completed_holder)
        .bind(folder.created_at)
        .execute(&mut **tx)
        .await;

        match inserted {
            Ok(_) => {
                debug!(owner_id = %owner_id, folder_id = %folder.id, "created completed folder");
                Ok(folder)
            }
            Err(err) if is_unique_violation(&err) => {
                let folder = sqlx::query_as(
                    "SELECT * FROM folders WHERE owner_id = $1 AND is_completed_holder = 1",
                )
                .bind(owner_id)
                .fetch_one(&mut **tx)
                .await?;
                Ok(folder)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Records the task's current location and moves it into the owner's
    /// completed holding folder. Returns the task with its new location.
    pub(crate) async fn move_to_completed_holder(
        tx: &mut Transaction<'_, Sqlite>,
        task: &Task,
        now: DateTime<Utc>,
    ) -> Result<Task, CoreError> {
        let holder = Self::ensure_completed_folder_in_tx(tx, task.owner_id, now).await?;

        let moved: Task = sqlx::query_as(
            r#"UPDATE tasks
            SET previous_folder_id = folder_id, folder_id = $1, updated_at = $2
            WHERE id = $3
            RETURNING *"#,
        )
        .bind(holder.id)
        .bind(now)
        .bind(task.id)
        .fetch_one(&mut **tx)
        .await?;

        debug!(task_id = %task.id, folder_id = %holder.id, "moved task to completed folder");
        Ok(moved)
    }

    /// Moves a task out of the holding folder: back to its recorded previous
    /// location, or to the owner's lowest-ordinal regular folder if that
    /// location has been deleted meanwhile.
    pub(crate) async fn restore_previous_folder(
        tx: &mut Transaction<'_, Sqlite>,
        task: &Task,
        now: DateTime<Utc>,
    ) -> Result<Task, CoreError> {
        let recorded: Option<Folder> = match task.previous_folder_id {
            Some(folder_id) => {
                sqlx::query_as("SELECT * FROM folders WHERE id = $1")
                    .bind(folder_id)
                    .fetch_optional(&mut **tx)
                    .await?
            }
            None => None,
        };

        let destination = match recorded {
            Some(folder) => Some(folder),
            None => {
                sqlx::query_as(
                    r#"SELECT * FROM folders
                    WHERE owner_id = $1 AND is_completed_holder = 0
                    ORDER BY ordinal, created_at
                    LIMIT 1"#,
                )
                .bind(task.owner_id)
                .fetch_optional(&mut **tx)
                .await?
            }
        };

        let restored: Task = sqlx::query_as(
            r#"UPDATE tasks
            SET folder_id = $1, previous_folder_id = NULL, updated_at = $2
            WHERE id = $3
            RETURNING *"#,
        )
        .bind(destination.map(|f| f.id))
        .bind(now)
        .bind(task.id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(restored)
    }
}
