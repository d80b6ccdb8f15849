use crate::models::InstanceStatus;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Invalid instance transition: {from} -> {to}")]
    InvalidTransition { from: InstanceStatus, to: InstanceStatus },

    /// The task was marked completed but the move to its holding folder
    /// failed. The completion sticks; the caller can retry the move with
    /// `reconcile_folder`.
    #[error("Task {task_id} completed but its folder move failed")]
    Reconciliation {
        task_id: Uuid,
        #[source]
        source: Box<CoreError>,
    },

    /// A recurring occurrence was completed but spawning the next one
    /// failed. The completion sticks; the series can be re-advanced.
    #[error("Task {completed_id} completed but the next occurrence could not be created")]
    AdvanceFailed {
        completed_id: Uuid,
        #[source]
        source: Box<CoreError>,
    },
}
