//! Integration tests for the User repository using in-memory SurrealDB.

use std::collections::BTreeSet;

use chrono::Utc;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use taskhub_core::error::TaskhubError;
use taskhub_core::models::audit::{AuditAction, AuditSnapshot, CreateAuditLogEntry};
use taskhub_core::models::group::CreateGroup;
use taskhub_core::models::role::Role;
use taskhub_core::models::task::{Task, TaskPriority, TaskStatus};
use taskhub_core::models::user::CreateUser;
use taskhub_core::repository::{
    AuditLogFilter, AuditLogRepository, GroupRepository, Pagination, TaskRepository,
    UserRepository,
};
use taskhub_db::repository::{
    SurrealAuditLogRepository, SurrealGroupRepository, SurrealTaskRepository,
    SurrealUserRepository,
};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    taskhub_db::run_migrations(&db).await.unwrap();
    db
}

fn new_user(email: &str, roles: &[Role]) -> CreateUser {
    CreateUser {
        email: email.into(),
        first_name: "Test".into(),
        last_name: email.split('@').next().unwrap_or("user").into(),
        phone: None,
        date_of_birth: None,
        roles: roles.iter().copied().collect(),
    }
}

#[tokio::test]
async fn create_and_get_user() {
    let db = setup().await;
    let repo = SurrealUserRepository::new(db);

    let user = repo
        .create(CreateUser {
            phone: Some("+1 555 0100".into()),
            date_of_birth: "1990-04-01".parse().ok(),
            ..new_user("alice@example.com", &[Role::Manager, Role::User])
        })
        .await
        .unwrap();

    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.version, 1);
    assert!(user.has_role(Role::Manager));
    assert!(user.has_role(Role::User));
    assert_eq!(user.phone.as_deref(), Some("+1 555 0100"));

    let fetched = repo.get_by_id(user.id).await.unwrap();
    assert_eq!(fetched, user);

    let by_email = repo.get_by_email("alice@example.com").await.unwrap();
    assert_eq!(by_email.id, user.id);
}

#[tokio::test]
async fn get_missing_user_is_not_found() {
    let db = setup().await;
    let repo = SurrealUserRepository::new(db);

    let err = repo.get_by_id(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, TaskhubError::NotFound { .. }));
}

#[tokio::test]
async fn list_and_count_roles() {
    let db = setup().await;
    let repo = SurrealUserRepository::new(db);

    repo.create(new_user("a@example.com", &[Role::Administrator]))
        .await
        .unwrap();
    repo.create(new_user("b@example.com", &[Role::User]))
        .await
        .unwrap();
    repo.create(new_user("c@example.com", &[Role::Administrator, Role::User]))
        .await
        .unwrap();

    let page = repo.list(Pagination::default()).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 3);

    assert_eq!(repo.count_with_role(Role::Administrator).await.unwrap(), 2);
    assert_eq!(repo.count_with_role(Role::User).await.unwrap(), 2);
    assert_eq!(repo.count_with_role(Role::Manager).await.unwrap(), 0);
}

#[tokio::test]
async fn update_roles_bumps_version() {
    let db = setup().await;
    let repo = SurrealUserRepository::new(db);
    let user = repo
        .create(new_user("u@example.com", &[Role::User]))
        .await
        .unwrap();

    let roles: BTreeSet<Role> = [Role::User, Role::Manager].into_iter().collect();
    let updated = repo
        .update_roles(user.id, roles.clone(), user.version)
        .await
        .unwrap();
    assert_eq!(updated.roles, roles);
    assert_eq!(updated.version, user.version + 1);
}

#[tokio::test]
async fn stale_version_is_a_conflict() {
    let db = setup().await;
    let repo = SurrealUserRepository::new(db);
    let user = repo
        .create(new_user("u@example.com", &[Role::User]))
        .await
        .unwrap();

    repo.update_roles(user.id, [Role::Manager].into_iter().collect(), user.version)
        .await
        .unwrap();

    let err = repo
        .update_roles(user.id, BTreeSet::new(), user.version)
        .await
        .unwrap_err();
    assert!(matches!(err, TaskhubError::Conflict { .. }), "got {err:?}");
}

#[tokio::test]
async fn store_refuses_to_demote_last_administrator() {
    let db = setup().await;
    let repo = SurrealUserRepository::new(db);
    let admin = repo
        .create(new_user("root@example.com", &[Role::Administrator]))
        .await
        .unwrap();

    let err = repo
        .update_roles(admin.id, [Role::User].into_iter().collect(), admin.version)
        .await
        .unwrap_err();
    assert!(
        matches!(err, TaskhubError::InvariantViolation { .. }),
        "got {err:?}"
    );

    let unchanged = repo.get_by_id(admin.id).await.unwrap();
    assert!(unchanged.has_role(Role::Administrator));
    assert_eq!(unchanged.version, admin.version);
}

#[tokio::test]
async fn store_refuses_to_delete_last_administrator() {
    let db = setup().await;
    let repo = SurrealUserRepository::new(db);
    let admin = repo
        .create(new_user("root@example.com", &[Role::Administrator]))
        .await
        .unwrap();

    let err = repo
        .delete(admin.id, admin.version, Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TaskhubError::InvariantViolation { .. }));
    assert!(repo.get_by_id(admin.id).await.is_ok());
}

#[tokio::test]
async fn delete_clears_assignments_manager_and_memberships() {
    let db = setup().await;
    let users = SurrealUserRepository::new(db.clone());
    let groups = SurrealGroupRepository::new(db.clone());
    let tasks = SurrealTaskRepository::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db);

    let admin = users
        .create(new_user("root@example.com", &[Role::Administrator]))
        .await
        .unwrap();
    let doomed = users
        .create(new_user("gone@example.com", &[Role::Manager]))
        .await
        .unwrap();

    let group = groups
        .create(CreateGroup {
            name: "Ops".into(),
            description: None,
            manager_id: Some(doomed.id),
            member_ids: [doomed.id, admin.id].into_iter().collect(),
        })
        .await
        .unwrap();

    let task = tasks
        .insert(
            Task {
                id: Uuid::new_v4(),
                title: "Rotate keys".into(),
                description: None,
                status: TaskStatus::InProgress,
                priority: TaskPriority::High,
                created_at: Utc::now(),
                updated_at: None,
                due_date: None,
                group_id: group.id,
                assigned_user_id: Some(doomed.id),
                created_by_id: admin.id,
                version: 1,
            },
            Vec::new(),
        )
        .await
        .unwrap();

    let unassign = CreateAuditLogEntry {
        actor_id: admin.id,
        action: AuditAction::UnassignedFromUser,
        description: "Task unassigned".into(),
        snapshot: AuditSnapshot {
            task_id: task.id,
            task_title: task.title.clone(),
            task_status: task.status,
            task_priority: task.priority,
            group_id: group.id,
            group_name: group.name.clone(),
            assigned_user_id: Some(doomed.id),
            assigned_user_first_name: Some(doomed.first_name.clone()),
            assigned_user_last_name: Some(doomed.last_name.clone()),
        },
    };
    users
        .delete(doomed.id, doomed.version, vec![unassign])
        .await
        .unwrap();

    assert!(matches!(
        users.get_by_id(doomed.id).await.unwrap_err(),
        TaskhubError::NotFound { .. }
    ));

    let task = tasks.get_by_id(task.id).await.unwrap();
    assert_eq!(task.assigned_user_id, None);
    assert_eq!(task.version, 2);

    let group = groups.get_by_id(group.id).await.unwrap();
    assert_eq!(group.manager_id, None);
    let members = groups.member_ids(group.id).await.unwrap();
    assert_eq!(members, [admin.id].into_iter().collect());

    let entries = audit
        .list(
            AuditLogFilter {
                task_id: Some(task.id),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(entries.total, 1);
    assert_eq!(entries.items[0].action, AuditAction::UnassignedFromUser);
    assert_eq!(entries.items[0].snapshot.assigned_user_id, Some(doomed.id));
}

#[tokio::test]
async fn delete_with_unaudited_assignment_is_a_conflict() {
    let db = setup().await;
    let users = SurrealUserRepository::new(db.clone());
    let groups = SurrealGroupRepository::new(db.clone());
    let tasks = SurrealTaskRepository::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db);

    let admin = users
        .create(new_user("root@example.com", &[Role::Administrator]))
        .await
        .unwrap();
    let worker = users
        .create(new_user("wes@example.com", &[Role::User]))
        .await
        .unwrap();
    let group = groups
        .create(CreateGroup {
            name: "Ops".into(),
            description: None,
            manager_id: Some(admin.id),
            member_ids: BTreeSet::new(),
        })
        .await
        .unwrap();

    // Assigned after the caller listed the worker's tasks (none).
    let task = tasks
        .insert(
            Task {
                id: Uuid::new_v4(),
                title: "Late assignment".into(),
                description: None,
                status: TaskStatus::ToDo,
                priority: TaskPriority::Medium,
                created_at: Utc::now(),
                updated_at: None,
                due_date: None,
                group_id: group.id,
                assigned_user_id: Some(worker.id),
                created_by_id: admin.id,
                version: 1,
            },
            Vec::new(),
        )
        .await
        .unwrap();

    let err = users
        .delete(worker.id, worker.version, Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TaskhubError::Conflict { .. }), "got {err:?}");

    assert!(users.get_by_id(worker.id).await.is_ok());
    let task = tasks.get_by_id(task.id).await.unwrap();
    assert_eq!(task.assigned_user_id, Some(worker.id));
    assert_eq!(task.version, 1);
    let entries = audit
        .list(
            AuditLogFilter {
                task_id: Some(task.id),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(entries.total, 0);
}
