//! Mutation orchestrators and role-scoped read paths.
//!
//! Each mutation runs the same pipeline: load the target, authorize,
//! project the change-set, validate, run the invariant guards, derive
//! the audit entries, then hand the entity change and its entries to the
//! store as one transaction. Any refusal returns before the store is
//! touched.
//!
//! The services are generic over the repository traits so that the
//! engine has no dependency on the database crate.

mod audit;
mod group;
mod task;
mod user;

pub use audit::AuditService;
pub use group::GroupService;
pub use task::TaskService;
pub use user::{MembershipChange, RoleChange, UserAdminService};

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use taskhub_core::error::{TaskhubError, TaskhubResult};
use taskhub_core::models::principal::Principal;
use taskhub_core::models::role::Role;
use taskhub_core::models::user::User;
use taskhub_core::repository::UserRepository;
use tracing::warn;
use uuid::Uuid;

use crate::guard::GuardVerdict;
use crate::policy::{self, Action, Decision, Target};

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Authorize, logging the denial reason on refusal.
fn authorize(principal: &Principal, action: Action, target: Target<'_>) -> TaskhubResult<Role> {
    let decision = policy::authorize(principal, action, target);
    if let Decision::Deny(reason) = &decision {
        warn!(
            principal = %principal.user_id,
            ?action,
            reason = %reason,
            "Request denied"
        );
    }
    decision.into_result()
}

/// Run a guard verdict, logging a block.
fn guard(principal: &Principal, verdict: GuardVerdict) -> TaskhubResult<()> {
    if let GuardVerdict::Block(reason) = &verdict {
        warn!(principal = %principal.user_id, reason = %reason, "Invariant guard blocked request");
    }
    verdict.into_result()
}

/// Load a user that may legitimately be absent (a weak reference).
async fn find_user<U: UserRepository>(users: &U, id: Option<Uuid>) -> TaskhubResult<Option<User>> {
    let Some(id) = id else {
        return Ok(None);
    };
    match users.get_by_id(id).await {
        Ok(user) => Ok(Some(user)),
        Err(TaskhubError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Union of entity lists keyed by id.
fn merge_by_id<T>(lists: impl IntoIterator<Item = Vec<T>>, id: impl Fn(&T) -> Uuid) -> Vec<T> {
    let mut merged = BTreeMap::new();
    for item in lists.into_iter().flatten() {
        merged.entry(id(&item)).or_insert(item);
    }
    merged.into_values().collect()
}
