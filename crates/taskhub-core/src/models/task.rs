//! Task domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaskhubError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TaskStatus {
    #[default]
    ToDo,
    InProgress,
    InReview,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::ToDo => "ToDo",
            TaskStatus::InProgress => "InProgress",
            TaskStatus::InReview => "InReview",
            TaskStatus::Done => "Done",
            TaskStatus::Cancelled => "Cancelled",
        }
    }

    /// A task is active until it is done or cancelled.
    pub fn is_active(self) -> bool {
        !matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskhubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ToDo" => Ok(TaskStatus::ToDo),
            "InProgress" => Ok(TaskStatus::InProgress),
            "InReview" => Ok(TaskStatus::InReview),
            "Done" => Ok(TaskStatus::Done),
            "Cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(TaskhubError::invalid(format!("unknown task status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Low => "Low",
            TaskPriority::Medium => "Medium",
            TaskPriority::High => "High",
            TaskPriority::Critical => "Critical",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = TaskhubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(TaskPriority::Low),
            "Medium" => Ok(TaskPriority::Medium),
            "High" => Ok(TaskPriority::High),
            "Critical" => Ok(TaskPriority::Critical),
            other => Err(TaskhubError::invalid(format!(
                "unknown task priority: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub due_date: Option<NaiveDate>,
    pub group_id: Uuid,
    /// Weak reference: cleared, never cascaded, when the user is removed.
    pub assigned_user_id: Option<Uuid>,
    /// Immutable after creation.
    pub created_by_id: Uuid,
    pub version: u64,
}

impl Task {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Returns a copy of this task with the change-set applied. Identity,
    /// creator, timestamps and version are never touched here.
    pub fn apply(&self, changes: &UpdateTask) -> Task {
        let mut next = self.clone();
        if let Some(title) = &changes.title {
            next.title = title.clone();
        }
        if let Some(description) = &changes.description {
            next.description = description.clone();
        }
        if let Some(status) = changes.status {
            next.status = status;
        }
        if let Some(priority) = changes.priority {
            next.priority = priority;
        }
        if let Some(due_date) = changes.due_date {
            next.due_date = due_date;
        }
        if let Some(group_id) = changes.group_id {
            next.group_id = group_id;
        }
        if let Some(assigned_user_id) = changes.assigned_user_id {
            next.assigned_user_id = assigned_user_id;
        }
        next
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    /// Defaults to `ToDo`.
    pub status: Option<TaskStatus>,
    /// Defaults to `Medium`.
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub group_id: Uuid,
    pub assigned_user_id: Option<Uuid>,
}

/// Task change-set. `None` = no change; for nullable fields
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub group_id: Option<Uuid>,
    pub assigned_user_id: Option<Option<Uuid>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "Write report".into(),
            description: Some("Quarterly".into()),
            status: TaskStatus::ToDo,
            priority: TaskPriority::Medium,
            created_at: Utc::now(),
            updated_at: None,
            due_date: None,
            group_id: Uuid::new_v4(),
            assigned_user_id: Some(Uuid::new_v4()),
            created_by_id: Uuid::new_v4(),
            version: 1,
        }
    }

    #[test]
    fn done_and_cancelled_are_inactive() {
        assert!(TaskStatus::ToDo.is_active());
        assert!(TaskStatus::InProgress.is_active());
        assert!(TaskStatus::InReview.is_active());
        assert!(!TaskStatus::Done.is_active());
        assert!(!TaskStatus::Cancelled.is_active());
    }

    #[test]
    fn apply_empty_change_set_is_identity() {
        let task = sample();
        assert_eq!(task.apply(&UpdateTask::default()), task);
    }

    #[test]
    fn apply_clears_nullable_fields() {
        let task = sample();
        let next = task.apply(&UpdateTask {
            description: Some(None),
            assigned_user_id: Some(None),
            ..Default::default()
        });
        assert_eq!(next.description, None);
        assert_eq!(next.assigned_user_id, None);
        assert_eq!(next.title, task.title);
    }

    #[test]
    fn unknown_status_is_invalid_input() {
        let err = "Finished".parse::<TaskStatus>().unwrap_err();
        assert!(matches!(err, TaskhubError::InvalidInput { .. }));
    }
}
