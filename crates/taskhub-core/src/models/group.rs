//! Group domain model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A group of users that owns a collection of tasks. The optional
/// manager is the only non-administrator allowed to manage the group
/// and its tasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Group {
    pub fn is_managed_by(&self, user_id: Uuid) -> bool {
        self.manager_id == Some(user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
    pub member_ids: BTreeSet<Uuid>,
}

/// Group change-set. `None` leaves a field untouched; for nullable
/// fields `Some(None)` clears the value.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UpdateGroup {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub manager_id: Option<Option<Uuid>>,
    /// Full replacement of the member set.
    pub member_ids: Option<BTreeSet<Uuid>>,
}

impl UpdateGroup {
    pub fn is_empty(&self) -> bool {
        *self == UpdateGroup::default()
    }
}

/// Counts a caller reports when deciding on (or explaining a blocked)
/// group deletion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupDeletionSummary {
    pub active_tasks: u64,
    pub total_tasks: u64,
    pub members: u64,
    pub can_delete: bool,
}
