//! Collaborator interfaces consumed by the aggregator. The SeaORM-backed
//! implementations live in [`crate::storage`].

use std::collections::HashSet;

use async_trait::async_trait;

use crate::aggregator::types::{
    Acl, ResourceGroup, ResourceSelector, Role, RoleAssignment, UserGroup,
};
use crate::errors::AggregatorError;

pub type ServiceResult<T> = Result<T, AggregatorError>;

#[async_trait]
pub trait RoleService: Send + Sync {
    /// Resolve a role as seen from `scope_identifier`; managed roles match any scope.
    async fn get(&self, identifier: &str, scope_identifier: &str) -> ServiceResult<Option<Role>>;

    async fn find_by_id(&self, id: &str) -> ServiceResult<Option<Role>>;
}

#[async_trait]
pub trait UserGroupService: Send + Sync {
    async fn get(
        &self,
        identifier: &str,
        scope_identifier: &str,
    ) -> ServiceResult<Option<UserGroup>>;

    async fn find_by_id(&self, id: &str) -> ServiceResult<Option<UserGroup>>;
}

#[async_trait]
pub trait ResourceGroupService: Send + Sync {
    /// Resolve a resource group as seen from `scope_identifier`; managed
    /// groups match any scope.
    async fn get(
        &self,
        identifier: &str,
        scope_identifier: &str,
    ) -> ServiceResult<Option<ResourceGroup>>;

    async fn find_by_id(&self, id: &str) -> ServiceResult<Option<ResourceGroup>>;
}

#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> ServiceResult<Option<RoleAssignment>>;

    async fn find_by_identifier_and_scope(
        &self,
        identifier: &str,
        scope_identifier: &str,
    ) -> ServiceResult<Option<RoleAssignment>>;

    /// Enabled assignments using the resource group; `scope_identifier`
    /// narrows the search, `None` searches every scope.
    async fn find_enabled_by_resource_group(
        &self,
        resource_group_identifier: &str,
        scope_identifier: Option<&str>,
    ) -> ServiceResult<Vec<RoleAssignment>>;

    async fn find_enabled_by_role(
        &self,
        role_identifier: &str,
        scope_identifier: Option<&str>,
    ) -> ServiceResult<Vec<RoleAssignment>>;

    /// Enabled USER_GROUP assignments whose principal is the group.
    async fn find_enabled_by_user_group(
        &self,
        user_group_identifier: &str,
    ) -> ServiceResult<Vec<RoleAssignment>>;

    async fn find_all_enabled(&self) -> ServiceResult<Vec<RoleAssignment>>;
}

/// Store of materialized ACL rows. Every mutation is idempotent: inserts
/// ignore rows that already exist and deletes are by criteria.
///
/// The distinct-value queries only look at explicit rows.
#[async_trait]
pub trait AclRepository: Send + Sync {
    async fn insert_all_ignoring_duplicates(&self, acls: &[Acl]) -> ServiceResult<u64>;

    async fn delete_by_role_assignment_id(&self, role_assignment_id: &str) -> ServiceResult<u64>;

    /// Deletes explicit rows of the assignment carrying one of `selectors`.
    async fn delete_by_role_assignment_id_and_resource_selectors(
        &self,
        role_assignment_id: &str,
        selectors: &HashSet<ResourceSelector>,
    ) -> ServiceResult<u64>;

    async fn delete_by_role_assignment_id_and_implicit_for_scope(
        &self,
        role_assignment_id: &str,
    ) -> ServiceResult<u64>;

    async fn delete_by_role_assignment_id_and_permissions(
        &self,
        role_assignment_id: &str,
        permissions: &HashSet<String>,
    ) -> ServiceResult<u64>;

    async fn delete_by_role_assignment_id_and_principals(
        &self,
        role_assignment_id: &str,
        principals: &HashSet<String>,
    ) -> ServiceResult<u64>;

    async fn delete_acls(&self, acls: &[Acl]) -> ServiceResult<u64>;

    async fn get_distinct_resource_selectors_in_acls(
        &self,
        role_assignment_id: &str,
    ) -> ServiceResult<HashSet<ResourceSelector>>;

    async fn get_distinct_permissions_in_acls_for_role_assignment(
        &self,
        role_assignment_id: &str,
    ) -> ServiceResult<HashSet<String>>;

    async fn get_distinct_principals_in_acls_for_role_assignment(
        &self,
        role_assignment_id: &str,
    ) -> ServiceResult<HashSet<String>>;

    async fn get_acls_for_role_assignment(&self, role_assignment_id: &str)
        -> ServiceResult<Vec<Acl>>;

    async fn get_distinct_role_assignment_ids(&self) -> ServiceResult<HashSet<String>>;

    async fn has_access(&self, acl_query_string: &str) -> ServiceResult<bool>;
}

/// Hook for concerns outside ACL materialization that follow the role
/// assignment lifecycle.
#[async_trait]
pub trait RoleAssignmentCrudEventHandler: Send + Sync {
    async fn handle_role_assignment_create(
        &self,
        role_assignment: &RoleAssignment,
    ) -> ServiceResult<()>;

    async fn handle_role_assignment_delete(&self, role_assignment_id: &str) -> ServiceResult<()>;
}

/// Handler used when nothing downstream listens to role assignment changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCrudEventHandler;

#[async_trait]
impl RoleAssignmentCrudEventHandler for LoggingCrudEventHandler {
    async fn handle_role_assignment_create(
        &self,
        role_assignment: &RoleAssignment,
    ) -> ServiceResult<()> {
        tracing::debug!(
            role_assignment_id = %role_assignment.id,
            "Role assignment created"
        );
        Ok(())
    }

    async fn handle_role_assignment_delete(&self, role_assignment_id: &str) -> ServiceResult<()> {
        tracing::debug!(role_assignment_id, "Role assignment deleted");
        Ok(())
    }
}
