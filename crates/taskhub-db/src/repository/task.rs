//! SurrealDB implementation of [`TaskRepository`].

use chrono::{DateTime, NaiveDate, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use taskhub_core::error::TaskhubResult;
use taskhub_core::models::audit::CreateAuditLogEntry;
use taskhub_core::models::task::{Task, TaskPriority, TaskStatus};
use taskhub_core::repository::{PaginatedResult, Pagination, TaskRepository};
use tracing::debug;
use uuid::Uuid;

use super::{
    AuditBatch, CONFLICT_MARKER, CountRow, classify_write_failure, missing_record,
    parse_opt_uuid, parse_uuid, require_record, take_failure,
};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TaskRow {
    record_id: String,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    due_date: Option<String>,
    group_id: String,
    assigned_user_id: Option<String>,
    created_by_id: String,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TaskRow {
    fn try_into_task(self) -> Result<Task, DbError> {
        let status = self
            .status
            .parse::<TaskStatus>()
            .map_err(|e| DbError::Decode(e.to_string()))?;
        let priority = self
            .priority
            .parse::<TaskPriority>()
            .map_err(|e| DbError::Decode(e.to_string()))?;
        let due_date = self
            .due_date
            .map(|d| {
                d.parse::<NaiveDate>()
                    .map_err(|e| DbError::Decode(format!("invalid due date: {e}")))
            })
            .transpose()?;

        Ok(Task {
            id: parse_uuid(&self.record_id, "task")?,
            title: self.title,
            description: self.description,
            status,
            priority,
            created_at: self.created_at,
            updated_at: self.updated_at,
            due_date,
            group_id: parse_uuid(&self.group_id, "group")?,
            assigned_user_id: parse_opt_uuid(self.assigned_user_id, "assignee")?,
            created_by_id: parse_uuid(&self.created_by_id, "creator")?,
            version: self.version,
        })
    }
}

fn rows_into_tasks(rows: Vec<TaskRow>) -> Result<Vec<Task>, DbError> {
    rows.into_iter().map(TaskRow::try_into_task).collect()
}

/// SurrealDB implementation of the Task repository.
#[derive(Clone)]
pub struct SurrealTaskRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTaskRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TaskRepository for SurrealTaskRepository<C> {
    async fn get_by_id(&self, id: Uuid) -> TaskhubResult<Task> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('task', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TaskRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("task", id_str))?;
        Ok(row.try_into_task()?)
    }

    async fn list(&self, pagination: Pagination) -> TaskhubResult<PaginatedResult<Task>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM task GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM task \
                 ORDER BY created_at DESC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TaskRow> = result.take(0).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: rows_into_tasks(rows)?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_by_groups(&self, group_ids: Vec<Uuid>) -> TaskhubResult<Vec<Task>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        let group_ids: Vec<String> = group_ids.iter().map(Uuid::to_string).collect();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM task \
                 WHERE group_id IN $group_ids \
                 ORDER BY created_at DESC",
            )
            .bind(("group_ids", group_ids))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TaskRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_tasks(rows)?)
    }

    async fn list_assigned_to(&self, user_id: Uuid) -> TaskhubResult<Vec<Task>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM task \
                 WHERE assigned_user_id = $user_id \
                 ORDER BY created_at DESC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TaskRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_tasks(rows)?)
    }

    async fn insert(&self, task: Task, audit: Vec<CreateAuditLogEntry>) -> TaskhubResult<Task> {
        let id_str = task.id.to_string();
        let batch = AuditBatch::new(audit);

        let query = format!(
            "BEGIN TRANSACTION;\n\
             {group}\
             CREATE type::record('task', $id) SET \
                 title = $title, description = $description, \
                 status = $status, priority = $priority, \
                 due_date = $due_date, group_id = $group_id, \
                 assigned_user_id = $assigned_user_id, \
                 created_by_id = $created_by_id, \
                 created_at = $created_at, version = 1;\n\
             {audit}\
             COMMIT TRANSACTION;",
            audit = batch.statements,
            group = require_record("group", task.group_id),
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("title", task.title))
            .bind(("description", task.description))
            .bind(("status", task.status.as_str()))
            .bind(("priority", task.priority.as_str()))
            .bind(("due_date", task.due_date.map(|d| d.to_string())))
            .bind(("group_id", task.group_id.to_string()))
            .bind((
                "assigned_user_id",
                task.assigned_user_id.map(|id| id.to_string()),
            ))
            .bind(("created_by_id", task.created_by_id.to_string()))
            .bind(("created_at", task.created_at));
        for binding in batch.bindings {
            builder = builder.bind(binding);
        }

        let mut response = builder.await.map_err(DbError::from)?;
        if let Some(message) = take_failure(&mut response) {
            return Err(missing_record(&message)
                .unwrap_or(DbError::Transaction(message))
                .into());
        }

        debug!(task_id = %task.id, "Task inserted");
        self.get_by_id(task.id).await
    }

    async fn replace(
        &self,
        task: Task,
        expected_version: u64,
        audit: Vec<CreateAuditLogEntry>,
    ) -> TaskhubResult<Task> {
        let id_str = task.id.to_string();
        let batch = AuditBatch::new(audit);

        let query = format!(
            "BEGIN TRANSACTION;\n\
             {group}\
             {audit}\
             LET $updated = (UPDATE type::record('task', $id) SET \
                 title = $title, description = $description, \
                 status = $status, priority = $priority, \
                 due_date = $due_date, group_id = $group_id, \
                 assigned_user_id = $assigned_user_id, \
                 updated_at = time::now(), version = version + 1 \
                 WHERE version = $expected RETURN AFTER);\n\
             IF array::len($updated) = 0 {{ THROW '{CONFLICT_MARKER}' }};\n\
             COMMIT TRANSACTION;",
            audit = batch.statements,
            group = require_record("group", task.group_id),
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("expected", expected_version))
            .bind(("title", task.title))
            .bind(("description", task.description))
            .bind(("status", task.status.as_str()))
            .bind(("priority", task.priority.as_str()))
            .bind(("due_date", task.due_date.map(|d| d.to_string())))
            .bind(("group_id", task.group_id.to_string()))
            .bind((
                "assigned_user_id",
                task.assigned_user_id.map(|id| id.to_string()),
            ));
        for binding in batch.bindings {
            builder = builder.bind(binding);
        }

        let mut response = builder.await.map_err(DbError::from)?;
        if let Some(message) = take_failure(&mut response) {
            return Err(
                classify_write_failure(&self.db, "task", &id_str, expected_version, message)
                    .await
                    .into(),
            );
        }

        self.get_by_id(task.id).await
    }

    async fn delete(
        &self,
        id: Uuid,
        expected_version: u64,
        audit: CreateAuditLogEntry,
    ) -> TaskhubResult<()> {
        let id_str = id.to_string();
        let batch = AuditBatch::new(vec![audit]);

        let query = format!(
            "BEGIN TRANSACTION;\n\
             {audit}\
             LET $deleted = (DELETE type::record('task', $id) \
                 WHERE version = $expected RETURN BEFORE);\n\
             IF array::len($deleted) = 0 {{ THROW '{CONFLICT_MARKER}' }};\n\
             COMMIT TRANSACTION;",
            audit = batch.statements,
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("expected", expected_version));
        for binding in batch.bindings {
            builder = builder.bind(binding);
        }

        let mut response = builder.await.map_err(DbError::from)?;
        if let Some(message) = take_failure(&mut response) {
            return Err(
                classify_write_failure(&self.db, "task", &id_str, expected_version, message)
                    .await
                    .into(),
            );
        }

        debug!(task_id = %id, "Task deleted");
        Ok(())
    }
}
