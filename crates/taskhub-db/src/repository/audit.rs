//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! The table only accepts CREATE and SELECT. Entries are written by the
//! task, group and user repositories inside their own transactions.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use taskhub_core::error::TaskhubResult;
use taskhub_core::models::audit::{AuditAction, AuditLogEntry, AuditSnapshot};
use taskhub_core::models::task::{TaskPriority, TaskStatus};
use taskhub_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};
use uuid::Uuid;

use super::{CountRow, parse_opt_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditLogRow {
    record_id: String,
    actor_id: String,
    action: String,
    description: String,
    timestamp: DateTime<Utc>,
    task_id: String,
    task_title: String,
    task_status: String,
    task_priority: String,
    group_id: String,
    group_name: String,
    assigned_user_id: Option<String>,
    assigned_user_first_name: Option<String>,
    assigned_user_last_name: Option<String>,
}

impl AuditLogRow {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        let decode = |e: taskhub_core::TaskhubError| DbError::Decode(e.to_string());

        Ok(AuditLogEntry {
            id: parse_uuid(&self.record_id, "audit entry")?,
            actor_id: parse_uuid(&self.actor_id, "actor")?,
            action: self.action.parse::<AuditAction>().map_err(decode)?,
            description: self.description,
            timestamp: self.timestamp,
            snapshot: AuditSnapshot {
                task_id: parse_uuid(&self.task_id, "task")?,
                task_title: self.task_title,
                task_status: self.task_status.parse::<TaskStatus>().map_err(decode)?,
                task_priority: self.task_priority.parse::<TaskPriority>().map_err(decode)?,
                group_id: parse_uuid(&self.group_id, "group")?,
                group_name: self.group_name,
                assigned_user_id: parse_opt_uuid(self.assigned_user_id, "assignee")?,
                assigned_user_first_name: self.assigned_user_first_name,
                assigned_user_last_name: self.assigned_user_last_name,
            },
        })
    }
}

/// SurrealDB implementation of the audit log repository.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

/// Build a WHERE clause from the filter. Returns an empty string when no
/// filters are set.
fn build_where_clause(filter: &AuditLogFilter) -> String {
    let mut conditions = Vec::new();
    if filter.actor_id.is_some() {
        conditions.push("actor_id = $actor_id");
    }
    if filter.action.is_some() {
        conditions.push("action = $action");
    }
    if filter.task_id.is_some() {
        conditions.push("task_id = $task_id");
    }
    if filter.group_ids.is_some() {
        conditions.push("group_id IN $group_ids");
    }
    if filter.assigned_user_id.is_some() {
        conditions.push("assigned_user_id = $assigned_user_id");
    }
    if filter.from.is_some() {
        conditions.push("timestamp >= $from");
    }
    if filter.to.is_some() {
        conditions.push("timestamp <= $to");
    }

    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn get_by_id(&self, id: Uuid) -> TaskhubResult<AuditLogEntry> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('audit_log', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AuditLogRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("audit_log", id_str))?;
        Ok(row.try_into_entry()?)
    }

    async fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> TaskhubResult<PaginatedResult<AuditLogEntry>> {
        let where_clause = build_where_clause(&filter);

        let count_query =
            format!("SELECT count() AS total FROM audit_log {where_clause} GROUP ALL");
        let data_query = format!(
            "SELECT meta::id(id) AS record_id, * FROM audit_log {where_clause} \
             ORDER BY timestamp DESC, id DESC \
             LIMIT $limit START $offset"
        );

        let actor_id = filter.actor_id.map(|id| id.to_string());
        let action = filter.action.map(|a| a.as_str());
        let task_id = filter.task_id.map(|id| id.to_string());
        let group_ids: Option<Vec<String>> = filter
            .group_ids
            .map(|ids| ids.iter().map(Uuid::to_string).collect());
        let assigned_user_id = filter.assigned_user_id.map(|id| id.to_string());

        let mut count_builder = self.db.query(&count_query);
        if let Some(ref v) = actor_id {
            count_builder = count_builder.bind(("actor_id", v.clone()));
        }
        if let Some(v) = action {
            count_builder = count_builder.bind(("action", v));
        }
        if let Some(ref v) = task_id {
            count_builder = count_builder.bind(("task_id", v.clone()));
        }
        if let Some(ref v) = group_ids {
            count_builder = count_builder.bind(("group_ids", v.clone()));
        }
        if let Some(ref v) = assigned_user_id {
            count_builder = count_builder.bind(("assigned_user_id", v.clone()));
        }
        if let Some(v) = filter.from {
            count_builder = count_builder.bind(("from", v));
        }
        if let Some(v) = filter.to {
            count_builder = count_builder.bind(("to", v));
        }

        let mut count_result = count_builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut data_builder = self
            .db
            .query(&data_query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(v) = actor_id {
            data_builder = data_builder.bind(("actor_id", v));
        }
        if let Some(v) = action {
            data_builder = data_builder.bind(("action", v));
        }
        if let Some(v) = task_id {
            data_builder = data_builder.bind(("task_id", v));
        }
        if let Some(v) = group_ids {
            data_builder = data_builder.bind(("group_ids", v));
        }
        if let Some(v) = assigned_user_id {
            data_builder = data_builder.bind(("assigned_user_id", v));
        }
        if let Some(v) = filter.from {
            data_builder = data_builder.bind(("from", v));
        }
        if let Some(v) = filter.to {
            data_builder = data_builder.bind(("to", v));
        }

        let mut result = data_builder.await.map_err(DbError::from)?;
        let rows: Vec<AuditLogRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(AuditLogRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
