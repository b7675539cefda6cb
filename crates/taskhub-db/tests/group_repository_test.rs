//! Integration tests for the Group repository using in-memory SurrealDB.

use chrono::Utc;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use taskhub_core::error::TaskhubError;
use taskhub_core::models::audit::{AuditAction, AuditSnapshot, CreateAuditLogEntry};
use taskhub_core::models::group::{CreateGroup, UpdateGroup};
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

/// Helper: spin up in-memory DB, run migrations, create two users.
async fn setup() -> (Surreal<Db>, Uuid, Uuid) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    taskhub_db::run_migrations(&db).await.unwrap();

    let users = SurrealUserRepository::new(db.clone());
    let mut ids = Vec::new();
    for (email, role) in [("alice@example.com", Role::Manager), ("bob@example.com", Role::User)] {
        let user = users
            .create(CreateUser {
                email: email.into(),
                first_name: "Test".into(),
                last_name: "User".into(),
                phone: None,
                date_of_birth: None,
                roles: [role].into_iter().collect(),
            })
            .await
            .unwrap();
        ids.push(user.id);
    }

    (db, ids[0], ids[1])
}

fn task_in(group_id: Uuid, creator: Uuid, status: TaskStatus) -> Task {
    Task {
        id: Uuid::new_v4(),
        title: format!("{status} task"),
        description: None,
        status,
        priority: TaskPriority::Medium,
        created_at: Utc::now(),
        updated_at: None,
        due_date: None,
        group_id,
        assigned_user_id: None,
        created_by_id: creator,
        version: 1,
    }
}

fn deleted_entry(actor: Uuid, task: &Task, group_name: &str) -> CreateAuditLogEntry {
    CreateAuditLogEntry {
        actor_id: actor,
        action: AuditAction::Deleted,
        description: format!("Task '{}' was deleted", task.title),
        snapshot: AuditSnapshot {
            task_id: task.id,
            task_title: task.title.clone(),
            task_status: task.status,
            task_priority: task.priority,
            group_id: task.group_id,
            group_name: group_name.into(),
            assigned_user_id: None,
            assigned_user_first_name: None,
            assigned_user_last_name: None,
        },
    }
}

#[tokio::test]
async fn create_group_with_members() {
    let (db, alice, bob) = setup().await;
    let repo = SurrealGroupRepository::new(db);

    let group = repo
        .create(CreateGroup {
            name: "Engineering".into(),
            description: Some("Builds things".into()),
            manager_id: Some(alice),
            member_ids: [alice, bob].into_iter().collect(),
        })
        .await
        .unwrap();

    assert_eq!(group.name, "Engineering");
    assert!(group.is_managed_by(alice));
    assert_eq!(group.version, 1);

    let members = repo.member_ids(group.id).await.unwrap();
    assert_eq!(members, [alice, bob].into_iter().collect());
    assert_eq!(
        repo.group_ids_for_user(bob).await.unwrap(),
        [group.id].into_iter().collect()
    );
}

#[tokio::test]
async fn list_managed_and_member_groups() {
    let (db, alice, bob) = setup().await;
    let repo = SurrealGroupRepository::new(db);

    let managed = repo
        .create(CreateGroup {
            name: "Alpha".into(),
            description: None,
            manager_id: Some(alice),
            member_ids: [bob].into_iter().collect(),
        })
        .await
        .unwrap();
    repo.create(CreateGroup {
        name: "Beta".into(),
        description: None,
        manager_id: None,
        member_ids: Default::default(),
    })
    .await
    .unwrap();

    let all = repo.list(Pagination::default()).await.unwrap();
    assert_eq!(all.total, 2);

    let by_manager = repo.list_managed_by(alice).await.unwrap();
    assert_eq!(by_manager.len(), 1);
    assert_eq!(by_manager[0].id, managed.id);

    let for_bob = repo.list_for_member(bob).await.unwrap();
    assert_eq!(for_bob.len(), 1);
    assert_eq!(for_bob[0].id, managed.id);
    assert!(repo.list_for_member(alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_replaces_members_and_clears_manager() {
    let (db, alice, bob) = setup().await;
    let repo = SurrealGroupRepository::new(db);

    let group = repo
        .create(CreateGroup {
            name: "Ops".into(),
            description: Some("On call".into()),
            manager_id: Some(alice),
            member_ids: [alice].into_iter().collect(),
        })
        .await
        .unwrap();

    let updated = repo
        .update(
            group.id,
            UpdateGroup {
                name: Some("Operations".into()),
                description: Some(None),
                manager_id: Some(None),
                member_ids: Some([bob].into_iter().collect()),
            },
            group.version,
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Operations");
    assert_eq!(updated.description, None);
    assert_eq!(updated.manager_id, None);
    assert_eq!(updated.version, group.version + 1);
    assert_eq!(
        repo.member_ids(group.id).await.unwrap(),
        [bob].into_iter().collect()
    );
}

#[tokio::test]
async fn stale_update_is_a_conflict() {
    let (db, alice, _) = setup().await;
    let repo = SurrealGroupRepository::new(db);

    let group = repo
        .create(CreateGroup {
            name: "Ops".into(),
            description: None,
            manager_id: Some(alice),
            member_ids: Default::default(),
        })
        .await
        .unwrap();

    let rename = |name: &str| UpdateGroup {
        name: Some(name.into()),
        ..Default::default()
    };
    repo.update(group.id, rename("First"), group.version)
        .await
        .unwrap();
    let err = repo
        .update(group.id, rename("Second"), group.version)
        .await
        .unwrap_err();
    assert!(matches!(err, TaskhubError::Conflict { .. }), "got {err:?}");
    assert_eq!(repo.get_by_id(group.id).await.unwrap().name, "First");
}

#[tokio::test]
async fn update_missing_group_is_not_found() {
    let (db, _, _) = setup().await;
    let repo = SurrealGroupRepository::new(db);

    let err = repo
        .update(
            Uuid::new_v4(),
            UpdateGroup {
                name: Some("Ghost".into()),
                ..Default::default()
            },
            1,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TaskhubError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn delete_refused_while_tasks_are_active() {
    let (db, alice, _) = setup().await;
    let groups = SurrealGroupRepository::new(db.clone());
    let tasks = SurrealTaskRepository::new(db);

    let group = groups
        .create(CreateGroup {
            name: "Ops".into(),
            description: None,
            manager_id: Some(alice),
            member_ids: Default::default(),
        })
        .await
        .unwrap();
    let active = tasks
        .insert(task_in(group.id, alice, TaskStatus::InReview), Vec::new())
        .await
        .unwrap();

    let err = groups
        .delete(group.id, group.version, vec![deleted_entry(alice, &active, "Ops")])
        .await
        .unwrap_err();
    assert!(
        matches!(err, TaskhubError::InvariantViolation { .. }),
        "got {err:?}"
    );
    assert!(groups.get_by_id(group.id).await.is_ok());
    assert!(tasks.get_by_id(active.id).await.is_ok());
}

#[tokio::test]
async fn delete_removes_closed_tasks_and_audits_each() {
    let (db, alice, bob) = setup().await;
    let groups = SurrealGroupRepository::new(db.clone());
    let tasks = SurrealTaskRepository::new(db.clone());
    let audit = SurrealAuditLogRepository::new(db);

    let group = groups
        .create(CreateGroup {
            name: "Ops".into(),
            description: None,
            manager_id: Some(alice),
            member_ids: [bob].into_iter().collect(),
        })
        .await
        .unwrap();
    let done = tasks
        .insert(task_in(group.id, alice, TaskStatus::Done), Vec::new())
        .await
        .unwrap();
    let cancelled = tasks
        .insert(task_in(group.id, alice, TaskStatus::Cancelled), Vec::new())
        .await
        .unwrap();

    groups
        .delete(
            group.id,
            group.version,
            vec![
                deleted_entry(alice, &done, "Ops"),
                deleted_entry(alice, &cancelled, "Ops"),
            ],
        )
        .await
        .unwrap();

    assert!(matches!(
        groups.get_by_id(group.id).await.unwrap_err(),
        TaskhubError::NotFound { .. }
    ));
    assert!(tasks.get_by_id(done.id).await.is_err());
    assert!(tasks.get_by_id(cancelled.id).await.is_err());
    assert!(groups.group_ids_for_user(bob).await.unwrap().is_empty());

    let entries = audit
        .list(
            AuditLogFilter {
                action: Some(AuditAction::Deleted),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(entries.total, 2);
    assert!(entries.items.iter().all(|e| e.snapshot.group_name == "Ops"));
}

#[tokio::test]
async fn delete_with_unaudited_task_is_a_conflict() {
    let (db, alice, _) = setup().await;
    let groups = SurrealGroupRepository::new(db.clone());
    let tasks = SurrealTaskRepository::new(db);

    let group = groups
        .create(CreateGroup {
            name: "Ops".into(),
            description: None,
            manager_id: Some(alice),
            member_ids: Default::default(),
        })
        .await
        .unwrap();
    tasks
        .insert(task_in(group.id, alice, TaskStatus::Done), Vec::new())
        .await
        .unwrap();

    let err = groups
        .delete(group.id, group.version, Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, TaskhubError::Conflict { .. }), "got {err:?}");
}

#[tokio::test]
async fn replace_user_groups_is_a_full_replace() {
    let (db, alice, bob) = setup().await;
    let repo = SurrealGroupRepository::new(db);

    let mut ids = Vec::new();
    for name in ["A", "B", "C"] {
        let group = repo
            .create(CreateGroup {
                name: name.into(),
                description: None,
                manager_id: Some(alice),
                member_ids: Default::default(),
            })
            .await
            .unwrap();
        ids.push(group.id);
    }

    repo.replace_user_groups(bob, [ids[0], ids[1]].into_iter().collect())
        .await
        .unwrap();
    repo.replace_user_groups(bob, [ids[1], ids[2]].into_iter().collect())
        .await
        .unwrap();

    assert_eq!(
        repo.group_ids_for_user(bob).await.unwrap(),
        [ids[1], ids[2]].into_iter().collect()
    );
    assert!(repo.member_ids(ids[0]).await.unwrap().is_empty());
}

#[tokio::test]
async fn membership_edges_require_existing_records() {
    let (db, alice, bob) = setup().await;
    let repo = SurrealGroupRepository::new(db);

    let ghost = Uuid::new_v4();
    let err = repo
        .create(CreateGroup {
            name: "Haunted".into(),
            description: None,
            manager_id: Some(alice),
            member_ids: [bob, ghost].into_iter().collect(),
        })
        .await
        .unwrap_err();
    match err {
        TaskhubError::NotFound { entity, id } => {
            assert_eq!(entity, "user");
            assert_eq!(id, ghost.to_string());
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert!(repo.group_ids_for_user(bob).await.unwrap().is_empty());

    let group = repo
        .create(CreateGroup {
            name: "Real".into(),
            description: None,
            manager_id: Some(alice),
            member_ids: Default::default(),
        })
        .await
        .unwrap();
    repo.replace_user_groups(bob, [group.id].into_iter().collect())
        .await
        .unwrap();

    // A vanished group leaves the existing memberships in place.
    let err = repo
        .replace_user_groups(bob, [Uuid::new_v4()].into_iter().collect())
        .await
        .unwrap_err();
    assert!(matches!(err, TaskhubError::NotFound { .. }), "got {err:?}");
    assert_eq!(
        repo.group_ids_for_user(bob).await.unwrap(),
        [group.id].into_iter().collect()
    );

    let err = repo
        .replace_user_groups(ghost, [group.id].into_iter().collect())
        .await
        .unwrap_err();
    assert!(matches!(err, TaskhubError::NotFound { .. }), "got {err:?}");
    assert_eq!(repo.member_ids(group.id).await.unwrap(), [bob].into_iter().collect());
}
