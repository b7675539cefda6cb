//! The authenticated actor a request executes on behalf of.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;
use super::user::User;

/// Principal identity and role set, resolved once per request and
/// passed explicitly into every policy and orchestrator call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub roles: BTreeSet<Role>,
}

impl Principal {
    pub fn new(user_id: Uuid, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            user_id,
            roles: roles.into_iter().collect(),
        }
    }

    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            roles: user.roles.clone(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_administrator(&self) -> bool {
        self.has_role(Role::Administrator)
    }
}
