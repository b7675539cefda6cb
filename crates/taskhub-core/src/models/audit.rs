//! Audit log domain model.
//!
//! An entry has two parts: the ids inside [`AuditSnapshot`] act as weak
//! references for navigation and may dangle once the referenced entity
//! is removed, while the descriptive snapshot fields are captured by
//! value and remain the authoritative history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::{TaskPriority, TaskStatus};
use crate::error::TaskhubError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuditAction {
    Created,
    Updated,
    Deleted,
    StatusChanged,
    PriorityChanged,
    AssignedToUser,
    UnassignedFromUser,
    DueDateChanged,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Created => "Created",
            AuditAction::Updated => "Updated",
            AuditAction::Deleted => "Deleted",
            AuditAction::StatusChanged => "StatusChanged",
            AuditAction::PriorityChanged => "PriorityChanged",
            AuditAction::AssignedToUser => "AssignedToUser",
            AuditAction::UnassignedFromUser => "UnassignedFromUser",
            AuditAction::DueDateChanged => "DueDateChanged",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = TaskhubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(AuditAction::Created),
            "Updated" => Ok(AuditAction::Updated),
            "Deleted" => Ok(AuditAction::Deleted),
            "StatusChanged" => Ok(AuditAction::StatusChanged),
            "PriorityChanged" => Ok(AuditAction::PriorityChanged),
            "AssignedToUser" => Ok(AuditAction::AssignedToUser),
            "UnassignedFromUser" => Ok(AuditAction::UnassignedFromUser),
            "DueDateChanged" => Ok(AuditAction::DueDateChanged),
            other => Err(TaskhubError::invalid(format!("unknown audit action: {other}"))),
        }
    }
}

/// By-value copy of the affected task, its group and its assignee at the
/// moment of the event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditSnapshot {
    pub task_id: Uuid,
    pub task_title: String,
    pub task_status: TaskStatus,
    pub task_priority: TaskPriority,
    pub group_id: Uuid,
    pub group_name: String,
    pub assigned_user_id: Option<Uuid>,
    pub assigned_user_first_name: Option<String>,
    pub assigned_user_last_name: Option<String>,
}

/// An immutable, persisted audit record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub snapshot: AuditSnapshot,
}

/// An audit record ready to be written alongside the entity change it
/// describes. The store assigns the id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateAuditLogEntry {
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub description: String,
    pub snapshot: AuditSnapshot,
}
