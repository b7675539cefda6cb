//! SurrealDB repository implementations.

mod audit;
mod group;
mod task;
mod user;

pub use audit::SurrealAuditLogRepository;
pub use group::SurrealGroupRepository;
pub use task::SurrealTaskRepository;
pub use user::SurrealUserRepository;

use chrono::{DateTime, Duration, Utc};
use surrealdb::{Connection, IndexedResults as Response, Surreal};
use surrealdb_types::SurrealValue;
use taskhub_core::models::audit::CreateAuditLogEntry;
use uuid::Uuid;

use crate::error::DbError;

/// Thrown inside a write transaction when the stored version differs
/// from the expected one (or the row is gone).
pub(crate) const CONFLICT_MARKER: &str = "taskhub:version_conflict";
/// Thrown when a write would leave no Administrator behind.
pub(crate) const LAST_ADMIN_MARKER: &str = "taskhub:last_administrator";
/// Thrown when a group delete races with a task becoming active.
pub(crate) const ACTIVE_TASKS_MARKER: &str = "taskhub:active_tasks";

/// Thrown when a record an edge or reference points at no longer exists.
/// Followed by `=<table>:<id>`.
pub(crate) const MISSING_RECORD_MARKER: &str = "taskhub:missing_record";

/// SurrealQL fragment counting Administrators, used before and after a
/// role-affecting write.
pub(crate) const COUNT_ADMINS: &str =
    "array::len((SELECT VALUE id FROM user WHERE roles CONTAINS 'Administrator'))";

#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub total: u64,
}

#[derive(Debug, SurrealValue)]
struct VersionRow {
    version: u64,
}

pub(crate) fn parse_uuid(value: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

pub(crate) fn parse_opt_uuid(value: Option<String>, what: &str) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(&v, what)).transpose()
}

/// Read the current version of a record, `None` if it does not exist.
async fn current_version<C: Connection>(
    db: &Surreal<C>,
    table: &'static str,
    id: &str,
) -> Result<Option<u64>, DbError> {
    let mut result = db
        .query("SELECT version FROM type::record($table, $id)")
        .bind(("table", table))
        .bind(("id", id.to_string()))
        .await?;
    let rows: Vec<VersionRow> = result.take(0)?;
    Ok(rows.first().map(|r| r.version))
}

/// Collect every statement error of a response, in statement order.
///
/// A failed transaction reports the original failure on one statement and
/// "not executed" on the others, so all of them are joined.
pub(crate) fn take_failure(response: &mut Response) -> Option<String> {
    let mut errors: Vec<_> = response.take_errors().into_iter().collect();
    if errors.is_empty() {
        return None;
    }
    errors.sort_by_key(|(index, _)| *index);
    Some(
        errors
            .into_iter()
            .map(|(_, e)| e.to_string())
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// Statement aborting the transaction unless `table:id` exists.
pub(crate) fn require_record(table: &str, id: Uuid) -> String {
    format!(
        "IF array::len((SELECT VALUE id FROM {table}:`{id}`)) = 0 \
         {{ THROW '{MISSING_RECORD_MARKER}={table}:{id}' }};\n"
    )
}

/// The record named by a [`require_record`] failure, as `NotFound`.
pub(crate) fn missing_record(message: &str) -> Option<DbError> {
    let (_, rest) = message.split_once(MISSING_RECORD_MARKER)?;
    let (table, tail) = rest.strip_prefix('=')?.split_once(':')?;
    let id: String = tail
        .chars()
        .take_while(|c| c.is_ascii_hexdigit() || *c == '-')
        .collect();
    Some(DbError::not_found(table, id))
}

/// Turn a failed write transaction into the most specific error.
///
/// Guard markers map to invariant violations. Otherwise the record is
/// re-read: gone means `NotFound`, a moved version means `Conflict`, and
/// anything else is surfaced as a transaction failure.
pub(crate) async fn classify_write_failure<C: Connection>(
    db: &Surreal<C>,
    table: &'static str,
    id: &str,
    expected_version: u64,
    message: String,
) -> DbError {
    if message.contains(LAST_ADMIN_MARKER) {
        return DbError::Invariant(
            "the last Administrator cannot be demoted or removed".into(),
        );
    }
    if message.contains(ACTIVE_TASKS_MARKER) {
        return DbError::Invariant("group still has active tasks".into());
    }
    if let Some(missing) = missing_record(&message) {
        return missing;
    }

    match current_version(db, table, id).await {
        Ok(None) => DbError::not_found(table, id),
        Ok(Some(version)) if version != expected_version || message.contains(CONFLICT_MARKER) => {
            DbError::Conflict {
                entity: table.into(),
                id: id.into(),
            }
        }
        Ok(Some(_)) => DbError::Transaction(message),
        Err(e) => e,
    }
}

/// Audit row content, bound as a single object per entry.
#[derive(Debug, SurrealValue)]
pub(crate) struct AuditContent {
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

/// `CREATE` statements for a set of audit entries, to be spliced into a
/// write transaction, plus the variables they reference.
///
/// Entries are stamped one microsecond apart in the order given, so a
/// newest-first listing shows the entries of one write in reverse order.
pub(crate) struct AuditBatch {
    pub statements: String,
    pub bindings: Vec<(String, AuditContent)>,
}

impl AuditBatch {
    pub(crate) fn new(entries: Vec<CreateAuditLogEntry>) -> Self {
        let base = Utc::now();
        let mut statements = String::new();
        let mut bindings = Vec::with_capacity(entries.len());

        for (i, entry) in entries.into_iter().enumerate() {
            let id = Uuid::new_v4();
            let var = format!("audit_{i}");
            let timestamp = base + Duration::microseconds(i as i64);
            statements.push_str(&format!("CREATE audit_log:`{id}` CONTENT ${var};\n"));

            let snapshot = entry.snapshot;
            bindings.push((
                var,
                AuditContent {
                    actor_id: entry.actor_id.to_string(),
                    action: entry.action.as_str().to_string(),
                    description: entry.description,
                    timestamp,
                    task_id: snapshot.task_id.to_string(),
                    task_title: snapshot.task_title,
                    task_status: snapshot.task_status.as_str().to_string(),
                    task_priority: snapshot.task_priority.as_str().to_string(),
                    group_id: snapshot.group_id.to_string(),
                    group_name: snapshot.group_name,
                    assigned_user_id: snapshot.assigned_user_id.map(|id| id.to_string()),
                    assigned_user_first_name: snapshot.assigned_user_first_name,
                    assigned_user_last_name: snapshot.assigned_user_last_name,
                },
            ));
        }

        Self {
            statements,
            bindings,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.bindings.len()
    }
}
