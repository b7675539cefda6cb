//! SurrealDB implementation of [`UserRepository`].

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use taskhub_core::error::TaskhubResult;
use taskhub_core::models::audit::CreateAuditLogEntry;
use taskhub_core::models::role::Role;
use taskhub_core::models::user::{CreateUser, User};
use taskhub_core::repository::{PaginatedResult, Pagination, UserRepository};
use tracing::debug;
use uuid::Uuid;

use super::{
    AuditBatch, CONFLICT_MARKER, COUNT_ADMINS, CountRow, LAST_ADMIN_MARKER,
    classify_write_failure, parse_uuid, take_failure,
};
use crate::error::DbError;

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    date_of_birth: Option<String>,
    roles: Vec<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        let date_of_birth = self
            .date_of_birth
            .map(|d| {
                d.parse::<NaiveDate>()
                    .map_err(|e| DbError::Decode(format!("invalid date of birth: {e}")))
            })
            .transpose()?;
        let roles = self
            .roles
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(|e| DbError::Decode(e.to_string()))?;

        Ok(User {
            id: parse_uuid(&self.record_id, "user")?,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            date_of_birth,
            roles,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

fn roles_to_strings(roles: &BTreeSet<Role>) -> Vec<String> {
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_one(
        &self,
        query: &'static str,
        key: &'static str,
        value: String,
    ) -> Result<User, DbError> {
        let mut result = self.db.query(query).bind((key, value.clone())).await?;
        let rows: Vec<UserRow> = result.take(0)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", value))?;
        row.try_into_user()
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> TaskhubResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 email = $email, \
                 first_name = $first_name, last_name = $last_name, \
                 phone = $phone, date_of_birth = $date_of_birth, \
                 roles = $roles, version = 1",
            )
            .bind(("id", id_str.clone()))
            .bind(("email", input.email))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .bind(("phone", input.phone))
            .bind(("date_of_birth", input.date_of_birth.map(|d| d.to_string())))
            .bind(("roles", roles_to_strings(&input.roles)))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::Transaction(e.to_string()))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> TaskhubResult<User> {
        Ok(self
            .fetch_one(
                "SELECT meta::id(id) AS record_id, * FROM type::record('user', $id)",
                "id",
                id.to_string(),
            )
            .await?)
    }

    async fn get_by_email(&self, email: &str) -> TaskhubResult<User> {
        Ok(self
            .fetch_one(
                "SELECT meta::id(id) AS record_id, * FROM user WHERE email = $email",
                "email",
                email.to_string(),
            )
            .await?)
    }

    async fn list(&self, pagination: Pagination) -> TaskhubResult<PaginatedResult<User>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM user GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 ORDER BY last_name ASC, first_name ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn count_with_role(&self, role: Role) -> TaskhubResult<u64> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM user WHERE roles CONTAINS $role GROUP ALL")
            .bind(("role", role.as_str().to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn update_roles(
        &self,
        id: Uuid,
        roles: BTreeSet<Role>,
        expected_version: u64,
    ) -> TaskhubResult<User> {
        let id_str = id.to_string();

        let query = format!(
            "BEGIN TRANSACTION;\n\
             LET $admins_before = {COUNT_ADMINS};\n\
             LET $updated = (UPDATE type::record('user', $id) SET \
                 roles = $roles, version = version + 1, updated_at = time::now() \
                 WHERE version = $expected RETURN AFTER);\n\
             IF array::len($updated) = 0 {{ THROW '{CONFLICT_MARKER}' }};\n\
             LET $admins_after = {COUNT_ADMINS};\n\
             IF $admins_before > 0 AND $admins_after = 0 {{ THROW '{LAST_ADMIN_MARKER}' }};\n\
             COMMIT TRANSACTION;"
        );

        let mut response = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("roles", roles_to_strings(&roles)))
            .bind(("expected", expected_version))
            .await
            .map_err(DbError::from)?;

        if let Some(message) = take_failure(&mut response) {
            return Err(
                classify_write_failure(&self.db, "user", &id_str, expected_version, message)
                    .await
                    .into(),
            );
        }

        self.get_by_id(id).await
    }

    async fn delete(
        &self,
        id: Uuid,
        expected_version: u64,
        audit: Vec<CreateAuditLogEntry>,
    ) -> TaskhubResult<()> {
        let id_str = id.to_string();
        let batch = AuditBatch::new(audit);
        let audit_count = batch.len();

        // One unassignment entry per assigned task; an assignment made since
        // the caller listed them surfaces as a conflict.
        let query = format!(
            "BEGIN TRANSACTION;\n\
             LET $admins_before = {COUNT_ADMINS};\n\
             IF array::len((SELECT VALUE id FROM task WHERE assigned_user_id = $id)) \
                 != $audit_count {{ THROW '{CONFLICT_MARKER}' }};\n\
             {audit}\
             UPDATE task SET assigned_user_id = NONE, version = version + 1, \
                 updated_at = time::now() WHERE assigned_user_id = $id;\n\
             UPDATE group SET manager_id = NONE, version = version + 1, \
                 updated_at = time::now() WHERE manager_id = $id;\n\
             DELETE member_of WHERE in = type::record('user', $id);\n\
             LET $deleted = (DELETE type::record('user', $id) \
                 WHERE version = $expected RETURN BEFORE);\n\
             IF array::len($deleted) = 0 {{ THROW '{CONFLICT_MARKER}' }};\n\
             LET $admins_after = {COUNT_ADMINS};\n\
             IF $admins_before > 0 AND $admins_after = 0 {{ THROW '{LAST_ADMIN_MARKER}' }};\n\
             COMMIT TRANSACTION;",
            audit = batch.statements,
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("expected", expected_version))
            .bind(("audit_count", audit_count as u64));
        for binding in batch.bindings {
            builder = builder.bind(binding);
        }

        let mut response = builder.await.map_err(DbError::from)?;
        if let Some(message) = take_failure(&mut response) {
            return Err(
                classify_write_failure(&self.db, "user", &id_str, expected_version, message)
                    .await
                    .into(),
            );
        }

        debug!(user_id = %id, audit_entries = audit_count, "User removed");
        Ok(())
    }
}
