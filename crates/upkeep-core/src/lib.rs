//! # Upkeep Core Library
//!
//! The recurrence and scheduled-instance engine behind recurring tasks and
//! asset maintenance schedules.
//!
//! ## Features
//!
//! - **Recurring tasks**: daily/weekly/monthly/yearly rules with interval
//!   multipliers, weekday sets, day-of-month pinning and optional end dates;
//!   completing an occurrence spawns the next one
//! - **Maintenance schedules**: interval-month upkeep cycles expanded into
//!   discrete, independently trackable instances, idempotently per window
//! - **Instance lifecycle**: pending/completed/skipped state machine with a
//!   one-way link to a generated work item
//! - **Folder reconciliation**: completed tasks move to a per-owner holding
//!   folder and move back when reopened
//! - **Type safety**: rule variants carry only the fields their frequency
//!   consults; SQL access through sqlx
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Record shapes, status enums and transfer objects
//! - [`repository`]: Data access layer with Repository pattern
//! - [`recurrence`]: Pure recurrence date math and rule validation
//! - [`schedule`]: Pure interval-schedule window expansion
//! - [`lifecycle`]: Schedule-instance state machine
//! - [`clock`]: Injectable time source
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use upkeep_core::{
//!     db,
//!     models::{NewRecurrence, NewTaskData, RecurrencePattern},
//!     repository::{SqliteRepository, TaskRepository},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = db::establish_connection("upkeep.db").await?;
//!     let repo = SqliteRepository::with_system_clock(pool);
//!
//!     let task = repo
//!         .add_task(NewTaskData {
//!             owner_id: uuid::Uuid::now_v7(),
//!             title: "Water the plants".to_string(),
//!             due_date: Some(chrono::Utc::now().date_naive()),
//!             recurrence: Some(NewRecurrence {
//!                 pattern: RecurrencePattern::Weekly {
//!                     interval: 1,
//!                     days_of_week: [1, 4].into_iter().collect(),
//!                 },
//!                 end_date: None,
//!             }),
//!             ..Default::default()
//!         })
//!         .await?;
//!     println!("Created task: {}", task.title);
//!
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod recurrence;
pub mod repository;
pub mod schedule;
