//! Reassignment workflow.
//!
//! ```text
//! Assigned/Delayed --request--> RequestReassignment --accept--> Assigned/Delayed (new assignee)
//!                                        |
//!                                        +--reject--> Assigned/Delayed (reason recorded)
//!                                                          |
//!                                                          +--handle_self--> Assigned/Delayed
//! ```
//!
//! Each step computes the write. Accept and reject belong to the requested
//! caregiver and handle-self to the current assignee. Role-based access
//! (admins, creators) is decided by the caller before it gets here.

use chrono::{DateTime, Utc};
use db::models::task::{Task, TaskPatch, TaskStatus};
use uuid::Uuid;

use super::{overdue::open_status, tasks::TaskServiceError};

fn ensure_open(task: &Task) -> Result<(), TaskServiceError> {
    if task.status == TaskStatus::Completed {
        return Err(TaskServiceError::InvalidInput(
            "completed tasks cannot be reassigned".to_string(),
        ));
    }
    Ok(())
}

fn ensure_pending(task: &Task) -> Result<(), TaskServiceError> {
    if task.status != TaskStatus::RequestReassignment || task.reassignment_requested_to.is_none()
    {
        return Err(TaskServiceError::InvalidInput(
            "no reassignment request is pending".to_string(),
        ));
    }
    Ok(())
}

fn ensure_request_target(task: &Task, caregiver: Uuid) -> Result<(), TaskServiceError> {
    if task.reassignment_requested_to != Some(caregiver) {
        return Err(TaskServiceError::InvalidInput(
            "reassignment was not requested from this caregiver".to_string(),
        ));
    }
    Ok(())
}

/// Patch that drops every trace of a pending request.
fn cleared() -> TaskPatch {
    TaskPatch {
        reassignment_requested_to: Some(None),
        reassignment_requested_by: Some(None),
        ..Default::default()
    }
}

pub fn request(task: &Task, target: Uuid, requester: Uuid) -> Result<TaskPatch, TaskServiceError> {
    ensure_open(task)?;
    if target == task.assigned_to {
        return Err(TaskServiceError::InvalidInput(
            "task is already assigned to that caregiver".to_string(),
        ));
    }

    Ok(TaskPatch {
        status: Some(TaskStatus::RequestReassignment),
        reassignment_requested_to: Some(Some(target)),
        reassignment_requested_by: Some(Some(requester)),
        reassignment_rejection_reason: Some(None),
        ..Default::default()
    })
}

pub fn accept(
    task: &Task,
    accepting: Uuid,
    now: DateTime<Utc>,
) -> Result<TaskPatch, TaskServiceError> {
    ensure_pending(task)?;
    ensure_request_target(task, accepting)?;
    Ok(TaskPatch {
        assigned_to: Some(accepting),
        status: Some(open_status(task.due_date, now)),
        reassignment_rejection_reason: Some(None),
        ..cleared()
    })
}

pub fn reject(
    task: &Task,
    rejecting: Uuid,
    reason: String,
    now: DateTime<Utc>,
) -> Result<TaskPatch, TaskServiceError> {
    ensure_pending(task)?;
    ensure_request_target(task, rejecting)?;
    Ok(TaskPatch {
        status: Some(open_status(task.due_date, now)),
        reassignment_rejection_reason: Some(Some(reason)),
        ..cleared()
    })
}

pub fn handle_self(
    task: &Task,
    assignee: Uuid,
    now: DateTime<Utc>,
) -> Result<TaskPatch, TaskServiceError> {
    ensure_open(task)?;
    if assignee != task.assigned_to {
        return Err(TaskServiceError::InvalidInput(
            "only the current assignee can keep the task".to_string(),
        ));
    }
    Ok(TaskPatch {
        status: Some(open_status(task.due_date, now)),
        reassignment_rejection_reason: Some(None),
        ..cleared()
    })
}

/// Direct reassignment, bypassing the request step. Completed tasks keep
/// their status.
pub fn reassign(task: &Task, caregiver: Uuid, now: DateTime<Utc>) -> TaskPatch {
    let status = match task.status {
        TaskStatus::Completed => TaskStatus::Completed,
        _ => open_status(task.due_date, now),
    };
    TaskPatch {
        assigned_to: Some(caregiver),
        status: Some(status),
        reassignment_rejection_reason: Some(None),
        ..cleared()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn task(due_date: DateTime<Utc>) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            series_id: None,
            title: "Physio session".to_string(),
            details: String::new(),
            notes: String::new(),
            media: Vec::new(),
            status: TaskStatus::Assigned,
            priority: None,
            category: None,
            start_date: due_date - Duration::hours(1),
            due_date,
            recurring: None,
            end_recurring_date: None,
            remind_prior: None,
            assigned_to: Uuid::new_v4(),
            resident: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            reassignment_requested_to: None,
            reassignment_requested_by: None,
            reassignment_rejection_reason: None,
            created_at: now,
            finished_at: None,
            updated_at: now,
        }
    }

    fn pending(mut task: Task, to: Uuid, by: Uuid) -> Task {
        task.status = TaskStatus::RequestReassignment;
        task.reassignment_requested_to = Some(to);
        task.reassignment_requested_by = Some(by);
        task
    }

    #[test]
    fn request_marks_task_pending() {
        let t = task(Utc::now() + Duration::days(1));
        let (target, requester) = (Uuid::new_v4(), Uuid::new_v4());
        let patch = request(&t, target, requester).unwrap();
        assert_eq!(patch.status, Some(TaskStatus::RequestReassignment));
        assert_eq!(patch.reassignment_requested_to, Some(Some(target)));
        assert_eq!(patch.reassignment_requested_by, Some(Some(requester)));
        assert!(patch.assigned_to.is_none());
    }

    #[test]
    fn request_to_current_assignee_or_on_completed_task_fails() {
        let mut t = task(Utc::now() + Duration::days(1));
        assert!(matches!(
            request(&t, t.assigned_to, Uuid::new_v4()),
            Err(TaskServiceError::InvalidInput(_))
        ));
        t.status = TaskStatus::Completed;
        assert!(matches!(
            request(&t, Uuid::new_v4(), Uuid::new_v4()),
            Err(TaskServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn accept_moves_assignment_and_restores_status_by_due_date() {
        let now = Utc::now();
        let accepting = Uuid::new_v4();

        let future = pending(task(now + Duration::hours(3)), accepting, Uuid::new_v4());
        let patch = accept(&future, accepting, now).unwrap();
        assert_eq!(patch.assigned_to, Some(accepting));
        assert_eq!(patch.status, Some(TaskStatus::Assigned));
        assert_eq!(patch.reassignment_requested_to, Some(None));
        assert_eq!(patch.reassignment_requested_by, Some(None));

        let past = pending(task(now - Duration::hours(3)), accepting, Uuid::new_v4());
        assert_eq!(
            accept(&past, accepting, now).unwrap().status,
            Some(TaskStatus::Delayed)
        );
    }

    #[test]
    fn reject_keeps_assignee_and_records_reason() {
        let now = Utc::now();
        let target = Uuid::new_v4();
        let t = pending(task(now + Duration::hours(3)), target, Uuid::new_v4());
        let patch = reject(&t, target, "on leave this week".to_string(), now).unwrap();
        assert!(patch.assigned_to.is_none());
        assert_eq!(
            patch.reassignment_rejection_reason,
            Some(Some("on leave this week".to_string()))
        );
        assert_eq!(patch.reassignment_requested_to, Some(None));
        assert_eq!(patch.status, Some(TaskStatus::Assigned));
    }

    #[test]
    fn accept_and_reject_need_a_pending_request() {
        let now = Utc::now();
        let t = task(now + Duration::hours(3));
        assert!(accept(&t, Uuid::new_v4(), now).is_err());
        assert!(reject(&t, Uuid::new_v4(), "no".to_string(), now).is_err());
    }

    #[test]
    fn only_the_requested_caregiver_answers() {
        let now = Utc::now();
        let target = Uuid::new_v4();
        let t = pending(task(now + Duration::hours(3)), target, Uuid::new_v4());
        let bystander = Uuid::new_v4();
        assert!(matches!(
            accept(&t, bystander, now),
            Err(TaskServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            reject(&t, bystander, "no".to_string(), now),
            Err(TaskServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            reject(&t, t.assigned_to, "no".to_string(), now),
            Err(TaskServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn handle_self_clears_rejection() {
        let now = Utc::now();
        let mut t = task(now - Duration::minutes(5));
        t.reassignment_rejection_reason = Some("busy".to_string());
        let patch = handle_self(&t, t.assigned_to, now).unwrap();
        assert_eq!(patch.reassignment_rejection_reason, Some(None));
        assert_eq!(patch.status, Some(TaskStatus::Delayed));
        assert!(patch.assigned_to.is_none());
    }

    #[test]
    fn handle_self_belongs_to_the_assignee() {
        let now = Utc::now();
        let t = task(now + Duration::hours(1));
        assert!(matches!(
            handle_self(&t, Uuid::new_v4(), now),
            Err(TaskServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn direct_reassign_keeps_completed_status() {
        let now = Utc::now();
        let mut t = task(now - Duration::days(1));
        t.status = TaskStatus::Completed;
        let caregiver = Uuid::new_v4();
        let patch = reassign(&t, caregiver, now);
        assert_eq!(patch.assigned_to, Some(caregiver));
        assert_eq!(patch.status, Some(TaskStatus::Completed));
    }
}
