//! Schedule-instance state machine.
//!
//! `pending` may move to `completed` or `skipped`; both are terminal. A
//! pending instance may independently acquire a linked work item without a
//! status change. "Is this cycle done" reads the instance status and the
//! linked work item's status together as an OR: the two fields are written
//! independently and a terminal instance status is never overwritten just
//! because the linked task moved on.

use crate::error::CoreError;
use crate::models::{InstanceStatus, ScheduleInstance, Task, TaskStatus};

/// Checks a status transition against the state machine.
pub fn check_transition(from: InstanceStatus, to: InstanceStatus) -> Result<(), CoreError> {
    match (from, to) {
        (InstanceStatus::Pending, InstanceStatus::Completed)
        | (InstanceStatus::Pending, InstanceStatus::Skipped) => Ok(()),
        (from, to) => Err(CoreError::InvalidTransition { from, to }),
    }
}

pub fn is_terminal(status: InstanceStatus) -> bool {
    matches!(status, InstanceStatus::Completed | InstanceStatus::Skipped)
}

/// Whether this cycle's maintenance has been performed: the instance itself
/// was completed, or its linked work item was.
pub fn cycle_done(instance: &ScheduleInstance, linked_work_item: Option<&Task>) -> bool {
    instance.status == InstanceStatus::Completed
        || linked_work_item.is_some_and(|task| task.status == TaskStatus::Completed)
}

impl ScheduleInstance {
    pub fn is_terminal(&self) -> bool {
        is_terminal(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rstest::rstest;
    use uuid::Uuid;

    fn instance(status: InstanceStatus, linked: Option<Uuid>) -> ScheduleInstance {
        ScheduleInstance {
            id: Uuid::now_v7(),
            schedule_id: Uuid::now_v7(),
            scheduled_date: NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
            status,
            linked_work_item_id: linked,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn work_item(status: TaskStatus) -> Task {
        Task {
            id: Uuid::now_v7(),
            owner_id: Uuid::now_v7(),
            title: "Quarterly maintenance".to_string(),
            description: None,
            assignee: None,
            status,
            priority: crate::models::TaskPriority::None,
            due_date: None,
            folder_id: None,
            previous_folder_id: None,
            series_id: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(InstanceStatus::Pending, InstanceStatus::Completed, true)]
    #[case(InstanceStatus::Pending, InstanceStatus::Skipped, true)]
    #[case(InstanceStatus::Completed, InstanceStatus::Skipped, false)]
    #[case(InstanceStatus::Completed, InstanceStatus::Pending, false)]
    #[case(InstanceStatus::Skipped, InstanceStatus::Completed, false)]
    #[case(InstanceStatus::Skipped, InstanceStatus::Pending, false)]
    fn transition_table(
        #[case] from: InstanceStatus,
        #[case] to: InstanceStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(check_transition(from, to).is_ok(), allowed);
    }

    #[test]
    fn terminal_states() {
        assert!(!is_terminal(InstanceStatus::Pending));
        assert!(is_terminal(InstanceStatus::Completed));
        assert!(is_terminal(InstanceStatus::Skipped));
    }

    #[test]
    fn pending_instance_with_completed_work_item_reads_as_done() {
        let task = work_item(TaskStatus::Completed);
        let inst = instance(InstanceStatus::Pending, Some(task.id));
        assert!(cycle_done(&inst, Some(&task)));
    }

    #[test]
    fn pending_instance_with_open_work_item_is_not_done() {
        let task = work_item(TaskStatus::InProgress);
        let inst = instance(InstanceStatus::Pending, Some(task.id));
        assert!(!cycle_done(&inst, Some(&task)));
    }

    #[test]
    fn completed_instance_is_done_without_any_work_item() {
        let inst = instance(InstanceStatus::Completed, None);
        assert!(cycle_done(&inst, None));
    }

    #[test]
    fn skipped_instance_is_terminal_but_not_done() {
        let inst = instance(InstanceStatus::Skipped, None);
        assert!(inst.is_terminal());
        assert!(!cycle_done(&inst, None));
    }
}
