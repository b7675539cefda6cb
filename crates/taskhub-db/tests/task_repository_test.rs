//! Integration tests for the Task and audit log repositories using
//! in-memory SurrealDB.

use chrono::{Duration, NaiveDate, Utc};
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

struct Fixture {
    db: Surreal<Db>,
    user_id: Uuid,
    group_id: Uuid,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    taskhub_db::run_migrations(&db).await.unwrap();

    let user = SurrealUserRepository::new(db.clone())
        .create(CreateUser {
            email: "dana@example.com".into(),
            first_name: "Dana".into(),
            last_name: "Reyes".into(),
            phone: None,
            date_of_birth: None,
            roles: [Role::Manager].into_iter().collect(),
        })
        .await
        .unwrap();
    let group = SurrealGroupRepository::new(db.clone())
        .create(CreateGroup {
            name: "Platform".into(),
            description: None,
            manager_id: Some(user.id),
            member_ids: [user.id].into_iter().collect(),
        })
        .await
        .unwrap();

    Fixture {
        db,
        user_id: user.id,
        group_id: group.id,
    }
}

fn new_task(fx: &Fixture) -> Task {
    Task {
        id: Uuid::new_v4(),
        title: "Upgrade database".into(),
        description: Some("Move to the new cluster".into()),
        status: TaskStatus::ToDo,
        priority: TaskPriority::High,
        created_at: Utc::now(),
        updated_at: None,
        due_date: NaiveDate::from_ymd_opt(2030, 1, 15),
        group_id: fx.group_id,
        assigned_user_id: Some(fx.user_id),
        created_by_id: fx.user_id,
        version: 1,
    }
}

fn entry(fx: &Fixture, task: &Task, action: AuditAction, description: &str) -> CreateAuditLogEntry {
    CreateAuditLogEntry {
        actor_id: fx.user_id,
        action,
        description: description.into(),
        snapshot: AuditSnapshot {
            task_id: task.id,
            task_title: task.title.clone(),
            task_status: task.status,
            task_priority: task.priority,
            group_id: task.group_id,
            group_name: "Platform".into(),
            assigned_user_id: task.assigned_user_id,
            assigned_user_first_name: Some("Dana".into()),
            assigned_user_last_name: Some("Reyes".into()),
        },
    }
}

#[tokio::test]
async fn insert_persists_task_and_audit_together() {
    let fx = setup().await;
    let tasks = SurrealTaskRepository::new(fx.db.clone());
    let audit = SurrealAuditLogRepository::new(fx.db.clone());

    let task = new_task(&fx);
    let created = entry(
        &fx,
        &task,
        AuditAction::Created,
        "Task created and assigned to Dana Reyes",
    );
    let stored = tasks.insert(task.clone(), vec![created]).await.unwrap();

    assert_eq!(stored.id, task.id);
    assert_eq!(stored.version, 1);
    assert_eq!(stored.due_date, task.due_date);
    assert_eq!(stored.assigned_user_id, Some(fx.user_id));

    let page = audit
        .list(AuditLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    let logged = &page.items[0];
    assert_eq!(logged.action, AuditAction::Created);
    assert_eq!(logged.snapshot.task_id, task.id);
    assert_eq!(audit.get_by_id(logged.id).await.unwrap(), *logged);
}

#[tokio::test]
async fn insert_into_missing_group_is_not_found() {
    let fx = setup().await;
    let tasks = SurrealTaskRepository::new(fx.db.clone());
    let audit = SurrealAuditLogRepository::new(fx.db.clone());

    let mut task = new_task(&fx);
    task.group_id = Uuid::new_v4();
    let created = entry(&fx, &task, AuditAction::Created, "Task created (unassigned)");

    let err = tasks.insert(task, vec![created]).await.unwrap_err();
    assert!(matches!(err, TaskhubError::NotFound { .. }), "got {err:?}");

    let page = audit
        .list(AuditLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0, "audit entry must roll back with the task");
}

#[tokio::test]
async fn replace_bumps_version_and_writes_entries() {
    let fx = setup().await;
    let tasks = SurrealTaskRepository::new(fx.db.clone());
    let audit = SurrealAuditLogRepository::new(fx.db.clone());

    let task = tasks.insert(new_task(&fx), Vec::new()).await.unwrap();

    let mut next = task.clone();
    next.status = TaskStatus::InProgress;
    next.priority = TaskPriority::Critical;
    next.assigned_user_id = None;
    let entries = vec![
        entry(&fx, &next, AuditAction::StatusChanged, "Status changed from ToDo to InProgress"),
        entry(&fx, &next, AuditAction::PriorityChanged, "Priority changed from High to Critical"),
        entry(&fx, &next, AuditAction::UnassignedFromUser, "Task unassigned"),
    ];

    let stored = tasks.replace(next, task.version, entries).await.unwrap();
    assert_eq!(stored.version, task.version + 1);
    assert_eq!(stored.status, TaskStatus::InProgress);
    assert_eq!(stored.assigned_user_id, None);
    assert!(stored.updated_at.is_some());
    assert_eq!(stored.created_by_id, task.created_by_id);

    let page = audit
        .list(
            AuditLogFilter {
                task_id: Some(task.id),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);

    // Entries of one write list newest first, in reverse of the order given.
    let actions: Vec<_> = page.items.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        [
            AuditAction::UnassignedFromUser,
            AuditAction::PriorityChanged,
            AuditAction::StatusChanged,
        ]
    );
    assert!(page.items[0].timestamp > page.items[2].timestamp);
}

#[tokio::test]
async fn stale_replace_is_a_conflict_and_writes_nothing() {
    let fx = setup().await;
    let tasks = SurrealTaskRepository::new(fx.db.clone());
    let audit = SurrealAuditLogRepository::new(fx.db.clone());

    let task = tasks.insert(new_task(&fx), Vec::new()).await.unwrap();

    let mut first = task.clone();
    first.title = "First writer".into();
    tasks.replace(first, task.version, Vec::new()).await.unwrap();

    let mut second = task.clone();
    second.status = TaskStatus::Done;
    let err = tasks
        .replace(
            second.clone(),
            task.version,
            vec![entry(
                &fx,
                &second,
                AuditAction::StatusChanged,
                "Status changed from ToDo to Done",
            )],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TaskhubError::Conflict { .. }), "got {err:?}");

    let stored = tasks.get_by_id(task.id).await.unwrap();
    assert_eq!(stored.title, "First writer");
    assert_eq!(stored.status, TaskStatus::ToDo);

    let page = audit
        .list(AuditLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn delete_writes_entry_and_entry_outlives_task() {
    let fx = setup().await;
    let tasks = SurrealTaskRepository::new(fx.db.clone());
    let audit = SurrealAuditLogRepository::new(fx.db.clone());

    let task = tasks.insert(new_task(&fx), Vec::new()).await.unwrap();
    let deleted = entry(&fx, &task, AuditAction::Deleted, "Task 'Upgrade database' was deleted");
    tasks.delete(task.id, task.version, deleted).await.unwrap();

    assert!(matches!(
        tasks.get_by_id(task.id).await.unwrap_err(),
        TaskhubError::NotFound { .. }
    ));

    let page = audit
        .list(
            AuditLogFilter {
                task_id: Some(task.id),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].snapshot.task_title, "Upgrade database");
}

#[tokio::test]
async fn delete_missing_task_is_not_found() {
    let fx = setup().await;
    let tasks = SurrealTaskRepository::new(fx.db.clone());
    let ghost = new_task(&fx);

    let err = tasks
        .delete(ghost.id, 1, entry(&fx, &ghost, AuditAction::Deleted, "gone"))
        .await
        .unwrap_err();
    assert!(matches!(err, TaskhubError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn lists_by_group_and_assignee() {
    let fx = setup().await;
    let tasks = SurrealTaskRepository::new(fx.db.clone());

    let assigned = tasks.insert(new_task(&fx), Vec::new()).await.unwrap();
    let mut other = new_task(&fx);
    other.assigned_user_id = None;
    tasks.insert(other, Vec::new()).await.unwrap();

    assert_eq!(tasks.list(Pagination::default()).await.unwrap().total, 2);
    assert_eq!(tasks.list_by_groups(vec![fx.group_id]).await.unwrap().len(), 2);
    assert!(tasks.list_by_groups(Vec::new()).await.unwrap().is_empty());

    let mine = tasks.list_assigned_to(fx.user_id).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, assigned.id);
}

#[tokio::test]
async fn audit_filters_by_group_and_time_window() {
    let fx = setup().await;
    let tasks = SurrealTaskRepository::new(fx.db.clone());
    let audit = SurrealAuditLogRepository::new(fx.db.clone());

    let task = new_task(&fx);
    let created = entry(
        &fx,
        &task,
        AuditAction::Created,
        "Task created and assigned to Dana Reyes",
    );
    tasks.insert(task, vec![created]).await.unwrap();

    let in_group = audit
        .list(
            AuditLogFilter {
                group_ids: Some(vec![fx.group_id]),
                from: Some(Utc::now() - Duration::hours(1)),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(in_group.total, 1);

    let elsewhere = audit
        .list(
            AuditLogFilter {
                group_ids: Some(vec![Uuid::new_v4()]),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(elsewhere.total, 0);

    let future = audit
        .list(
            AuditLogFilter {
                from: Some(Utc::now() + Duration::hours(1)),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(future.total, 0);
}
