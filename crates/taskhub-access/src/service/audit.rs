//! Audit read side. Entries are written only by the mutation paths.

use taskhub_core::error::{TaskhubError, TaskhubResult};
use taskhub_core::models::audit::AuditLogEntry;
use taskhub_core::models::principal::Principal;
use taskhub_core::models::role::Role;
use taskhub_core::repository::{AuditLogFilter, AuditLogRepository, GroupRepository, Pagination};
use uuid::Uuid;

use super::{authorize, merge_by_id};
use crate::config::PolicyConfig;
use crate::policy::{Action, Target};

pub struct AuditService<A: AuditLogRepository, G: GroupRepository> {
    audit: A,
    groups: G,
    config: PolicyConfig,
}

impl<A: AuditLogRepository, G: GroupRepository> AuditService<A, G> {
    pub fn new(audit: A, groups: G, config: PolicyConfig) -> Self {
        Self {
            audit,
            groups,
            config,
        }
    }

    /// Entries matching `filter` that the principal may read, newest
    /// first and capped at the configured limit.
    ///
    /// Managers are narrowed to the groups they manage and Users to the
    /// entries whose snapshot names them as assignee; a principal holding
    /// both sees the union.
    pub async fn list_visible(
        &self,
        principal: &Principal,
        filter: AuditLogFilter,
    ) -> TaskhubResult<Vec<AuditLogEntry>> {
        let page = Pagination {
            offset: 0,
            limit: self.config.audit_list_limit,
        };

        if principal.is_administrator() {
            return Ok(self.audit.list(filter, page).await?.items);
        }

        let mut lists = Vec::new();
        if principal.has_role(Role::Manager) {
            let managed = self.groups.list_managed_by(principal.user_id).await?;
            let group_ids: Vec<Uuid> = managed
                .into_iter()
                .map(|g| g.id)
                .filter(|id| filter.group_ids.as_ref().is_none_or(|wanted| wanted.contains(id)))
                .collect();
            if !group_ids.is_empty() {
                let scoped = AuditLogFilter {
                    group_ids: Some(group_ids),
                    ..filter.clone()
                };
                lists.push(self.audit.list(scoped, page.clone()).await?.items);
            }
        }
        if principal.has_role(Role::User)
            && filter.assigned_user_id.is_none_or(|id| id == principal.user_id)
        {
            let scoped = AuditLogFilter {
                assigned_user_id: Some(principal.user_id),
                ..filter.clone()
            };
            lists.push(self.audit.list(scoped, page.clone()).await?.items);
        }

        let mut visible = merge_by_id(lists, |e| e.id);
        visible.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        visible.truncate(self.config.audit_list_limit as usize);
        Ok(visible)
    }

    /// A single entry, checked against the group as it exists now. An
    /// entry whose group is gone is readable only by Administrators and
    /// by the assignee it names.
    pub async fn get_if_visible(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> TaskhubResult<AuditLogEntry> {
        let entry = self.audit.get_by_id(id).await?;
        let group = match self.groups.get_by_id(entry.snapshot.group_id).await {
            Ok(group) => Some(group),
            Err(TaskhubError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        authorize(
            principal,
            Action::Read,
            Target::AuditEntry {
                entry: &entry,
                group: group.as_ref(),
            },
        )?;
        Ok(entry)
    }
}
