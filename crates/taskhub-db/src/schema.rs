//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs and dates are
//! stored as strings, enums as strings with ASSERT constraints. Every
//! mutable table carries an integer `version` used for optimistic
//! concurrency.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "audit_actor_index",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD first_name ON TABLE user TYPE string;
DEFINE FIELD last_name ON TABLE user TYPE string;
DEFINE FIELD phone ON TABLE user TYPE option<string>;
DEFINE FIELD date_of_birth ON TABLE user TYPE option<string>;
DEFINE FIELD roles ON TABLE user TYPE array<string> DEFAULT [] \
    ASSERT $value ALLINSIDE ['Administrator', 'Manager', 'User'];
DEFINE FIELD version ON TABLE user TYPE int DEFAULT 1;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- =======================================================================
-- Groups
-- =======================================================================
DEFINE TABLE group SCHEMAFULL;
DEFINE FIELD name ON TABLE group TYPE string \
    ASSERT string::len($value) <= 200;
DEFINE FIELD description ON TABLE group TYPE option<string>;
DEFINE FIELD manager_id ON TABLE group TYPE option<string>;
DEFINE FIELD version ON TABLE group TYPE int DEFAULT 1;
DEFINE FIELD created_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_manager ON TABLE group COLUMNS manager_id;

-- =======================================================================
-- Tasks
-- =======================================================================
DEFINE TABLE task SCHEMAFULL;
DEFINE FIELD title ON TABLE task TYPE string \
    ASSERT string::len($value) <= 200;
DEFINE FIELD description ON TABLE task TYPE option<string>;
DEFINE FIELD status ON TABLE task TYPE string \
    ASSERT $value IN ['ToDo', 'InProgress', 'InReview', 'Done', \
    'Cancelled'];
DEFINE FIELD priority ON TABLE task TYPE string \
    ASSERT $value IN ['Low', 'Medium', 'High', 'Critical'];
DEFINE FIELD due_date ON TABLE task TYPE option<string>;
DEFINE FIELD group_id ON TABLE task TYPE string;
DEFINE FIELD assigned_user_id ON TABLE task TYPE option<string>;
DEFINE FIELD created_by_id ON TABLE task TYPE string;
DEFINE FIELD version ON TABLE task TYPE int DEFAULT 1;
DEFINE FIELD created_at ON TABLE task TYPE datetime;
DEFINE FIELD updated_at ON TABLE task TYPE option<datetime>;
DEFINE INDEX idx_task_group ON TABLE task COLUMNS group_id;
DEFINE INDEX idx_task_assignee ON TABLE task COLUMNS assigned_user_id;

-- =======================================================================
-- Audit Log (append-only, snapshot by value)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD actor_id ON TABLE audit_log TYPE string;
DEFINE FIELD action ON TABLE audit_log TYPE string \
    ASSERT $value IN ['Created', 'Updated', 'Deleted', 'StatusChanged', \
    'PriorityChanged', 'AssignedToUser', 'UnassignedFromUser', \
    'DueDateChanged'];
DEFINE FIELD description ON TABLE audit_log TYPE string;
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD task_id ON TABLE audit_log TYPE string;
DEFINE FIELD task_title ON TABLE audit_log TYPE string;
DEFINE FIELD task_status ON TABLE audit_log TYPE string;
DEFINE FIELD task_priority ON TABLE audit_log TYPE string;
DEFINE FIELD group_id ON TABLE audit_log TYPE string;
DEFINE FIELD group_name ON TABLE audit_log TYPE string;
DEFINE FIELD assigned_user_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD assigned_user_first_name ON TABLE audit_log \
    TYPE option<string>;
DEFINE FIELD assigned_user_last_name ON TABLE audit_log \
    TYPE option<string>;
DEFINE INDEX idx_audit_time ON TABLE audit_log COLUMNS timestamp;
DEFINE INDEX idx_audit_group ON TABLE audit_log COLUMNS group_id;
DEFINE INDEX idx_audit_assignee ON TABLE audit_log \
    COLUMNS assigned_user_id;
DEFINE INDEX idx_audit_task ON TABLE audit_log COLUMNS task_id;

-- =======================================================================
-- Graph Edge Tables (relations)
-- =======================================================================

-- User -> Group membership
DEFINE TABLE member_of TYPE RELATION SCHEMAFULL;
DEFINE INDEX idx_member_of_pair ON TABLE member_of COLUMNS in, out UNIQUE;
";

// -----------------------------------------------------------------------
// Schema v2: audit lookups by actor
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
DEFINE INDEX idx_audit_actor ON TABLE audit_log COLUMNS actor_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client and
/// return how many were applied.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the recorded maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<usize, DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );

        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

        applied += 1;
    }

    if applied > 0 {
        info!(applied, "Schema is up to date");
    }

    Ok(applied)
}
