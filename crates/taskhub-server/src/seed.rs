//! Demo data for an empty store.
//!
//! Users and groups are written straight through the repositories, which
//! is how the first Administrator comes to exist. Tasks go through
//! [`TaskService`] so each one carries its `Created` audit entry.

use std::collections::BTreeSet;

use chrono::{Days, Utc};
use surrealdb::{Connection, Surreal};
use taskhub_access::config::PolicyConfig;
use taskhub_access::service::TaskService;
use taskhub_core::error::TaskhubResult;
use taskhub_core::models::group::CreateGroup;
use taskhub_core::models::principal::Principal;
use taskhub_core::models::role::Role;
use taskhub_core::models::task::{CreateTask, TaskPriority, TaskStatus};
use taskhub_core::models::user::{CreateUser, User};
use taskhub_core::repository::{GroupRepository, Pagination, UserRepository};
use taskhub_db::repository::{SurrealGroupRepository, SurrealTaskRepository, SurrealUserRepository};
use tracing::info;

/// Seed demo data unless the store already has users. Returns whether
/// anything was written.
pub async fn seed_demo_data<C: Connection>(
    db: &Surreal<C>,
    policy: &PolicyConfig,
) -> TaskhubResult<bool> {
    let users = SurrealUserRepository::new(db.clone());
    let existing = users
        .list(Pagination {
            offset: 0,
            limit: 1,
        })
        .await?;
    if existing.total > 0 {
        info!(users = existing.total, "Store is not empty, skipping demo data");
        return Ok(false);
    }

    // 1. Accounts.
    let admin = users
        .create(person(
            "admin@taskhub.local",
            "Admin",
            "Administrator",
            "+48-111-111-111",
            Role::Administrator,
        ))
        .await?;
    let manager = users
        .create(person(
            "manager@taskhub.local",
            "Jan",
            "Kowalski",
            "+48-222-222-222",
            Role::Manager,
        ))
        .await?;
    let member = users
        .create(person(
            "user@taskhub.local",
            "Anna",
            "Nowak",
            "+48-333-333-333",
            Role::User,
        ))
        .await?;

    // 2. Groups and memberships.
    let groups = SurrealGroupRepository::new(db.clone());
    let marketing = groups
        .create(team(
            "Marketing",
            "Marketing team tasks",
            &manager,
            [&member, &manager],
        ))
        .await?;
    let development = groups
        .create(team(
            "Development",
            "Software development tasks",
            &admin,
            [&admin, &member],
        ))
        .await?;

    // 3. Tasks, each with its creation entry.
    let tasks = TaskService::new(
        SurrealTaskRepository::new(db.clone()),
        groups,
        users,
        policy.clone(),
    );
    let today = Utc::now().date_naive();
    let as_admin = Principal::from_user(&admin);

    let seeded = [
        (
            Principal::from_user(&manager),
            CreateTask {
                title: "Create marketing campaign".into(),
                description: Some("Develop Q1 marketing campaign strategy".into()),
                status: Some(TaskStatus::InProgress),
                priority: Some(TaskPriority::High),
                due_date: today.checked_add_days(Days::new(14)),
                group_id: marketing.id,
                assigned_user_id: Some(member.id),
            },
        ),
        (
            as_admin.clone(),
            CreateTask {
                title: "Fix login bug".into(),
                description: Some("Users reporting login issues on mobile devices".into()),
                status: Some(TaskStatus::ToDo),
                priority: Some(TaskPriority::Critical),
                due_date: today.checked_add_days(Days::new(3)),
                group_id: development.id,
                assigned_user_id: Some(admin.id),
            },
        ),
        (
            as_admin,
            CreateTask {
                title: "Update documentation".into(),
                description: Some("Update user documentation for new features".into()),
                status: Some(TaskStatus::Done),
                priority: Some(TaskPriority::Low),
                due_date: None,
                group_id: development.id,
                assigned_user_id: Some(member.id),
            },
        ),
    ];
    for (principal, input) in seeded {
        tasks.create(&principal, input).await?;
    }

    info!(users = 3, groups = 2, tasks = 3, "Demo data seeded");
    Ok(true)
}

fn person(email: &str, first: &str, last: &str, phone: &str, role: Role) -> CreateUser {
    CreateUser {
        email: email.into(),
        first_name: first.into(),
        last_name: last.into(),
        phone: Some(phone.into()),
        date_of_birth: None,
        roles: BTreeSet::from([role]),
    }
}

fn team<'a>(
    name: &str,
    description: &str,
    manager: &User,
    members: impl IntoIterator<Item = &'a User>,
) -> CreateGroup {
    CreateGroup {
        name: name.into(),
        description: Some(description.into()),
        manager_id: Some(manager.id),
        member_ids: members.into_iter().map(|u| u.id).collect(),
    }
}

#[cfg(test)]
mod tests {
    use surrealdb::engine::local::Mem;
    use taskhub_core::repository::{AuditLogFilter, AuditLogRepository};
    use taskhub_db::repository::SurrealAuditLogRepository;

    use super::*;

    #[tokio::test]
    async fn seeds_once() {
        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        taskhub_db::run_migrations(&db).await.unwrap();

        assert!(seed_demo_data(&db, &PolicyConfig::default()).await.unwrap());
        assert!(!seed_demo_data(&db, &PolicyConfig::default()).await.unwrap());

        let users = SurrealUserRepository::new(db.clone());
        assert_eq!(users.count_with_role(Role::Administrator).await.unwrap(), 1);

        let groups = SurrealGroupRepository::new(db.clone());
        let all = groups.list(Pagination::default()).await.unwrap();
        assert_eq!(all.total, 2);

        let audit = SurrealAuditLogRepository::new(db.clone());
        let entries = audit
            .list(AuditLogFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(entries.total, 3);
    }
}
