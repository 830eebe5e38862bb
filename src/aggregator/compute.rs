//! Desired ACL rows for a role assignment: the explicit cross product of
//! permissions, principals and resource selectors, plus the implicit
//! scope-access grants declared by the resource group's scope selectors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::aggregator::services::{
    ResourceGroupService, RoleService, ServiceResult, UserGroupService,
};
use crate::aggregator::types::{
    Acl, Principal, PrincipalType, ResourceGroup, ResourceSelector, RoleAssignment,
};
use crate::scope::{build_scope_from_identifier, to_parent_scope, ScopeLevel};
use crate::settings::ImplicitPermissions;

/// Permissions granted implicitly on a scope, keyed by (level, whether the
/// grant covers child scopes).
#[derive(Debug, Clone, Default)]
pub struct ImplicitPermissionTable {
    by_scope: HashMap<(ScopeLevel, bool), HashSet<String>>,
}

impl ImplicitPermissionTable {
    pub fn from_settings(cfg: &ImplicitPermissions) -> Self {
        let entries = [
            ((ScopeLevel::Account, false), &cfg.account),
            ((ScopeLevel::Account, true), &cfg.account_with_children),
            ((ScopeLevel::Organization, false), &cfg.organization),
            ((ScopeLevel::Organization, true), &cfg.organization_with_children),
            ((ScopeLevel::Project, false), &cfg.project),
            ((ScopeLevel::Project, true), &cfg.project_with_children),
        ];
        let by_scope = entries
            .into_iter()
            .map(|(key, perms)| (key, perms.iter().cloned().collect()))
            .collect();
        Self { by_scope }
    }

    /// Implicit permissions at `level` that the role actually holds.
    fn granted(
        &self,
        level: ScopeLevel,
        give_to_children: bool,
        role_permissions: &HashSet<String>,
    ) -> Vec<&String> {
        self.by_scope
            .get(&(level, give_to_children))
            .map(|perms| {
                perms
                    .iter()
                    .filter(|p| role_permissions.contains(*p))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct AclComputationService {
    roles: Arc<dyn RoleService>,
    user_groups: Arc<dyn UserGroupService>,
    resource_groups: Arc<dyn ResourceGroupService>,
    implicit_permissions: ImplicitPermissionTable,
}

impl AclComputationService {
    pub fn new(
        roles: Arc<dyn RoleService>,
        user_groups: Arc<dyn UserGroupService>,
        resource_groups: Arc<dyn ResourceGroupService>,
        implicit_permissions: ImplicitPermissionTable,
    ) -> Self {
        Self {
            roles,
            user_groups,
            resource_groups,
            implicit_permissions,
        }
    }

    /// Explicit and implicit rows for the assignment's current state.
    pub async fn get_desired_acls(
        &self,
        role_assignment: &RoleAssignment,
    ) -> ServiceResult<Vec<Acl>> {
        if role_assignment.disabled {
            return Ok(Vec::new());
        }
        let principals = self.resolve_principals(role_assignment).await?;
        let mut acls = self.get_explicit_acls(role_assignment, &principals).await?;
        acls.extend(
            self.get_implicit_acls(
                role_assignment,
                &principals,
                &HashSet::new(),
                &HashSet::new(),
            )
            .await?,
        );
        Ok(acls)
    }

    /// Explicit rows, resolving principals first.
    pub async fn get_acls_for_role_assignment(
        &self,
        role_assignment: &RoleAssignment,
    ) -> ServiceResult<Vec<Acl>> {
        let principals = self.resolve_principals(role_assignment).await?;
        self.get_explicit_acls(role_assignment, &principals).await
    }

    /// {permission} x {principal} x {resource selector}, all explicit.
    pub async fn get_explicit_acls(
        &self,
        role_assignment: &RoleAssignment,
        principals: &HashSet<String>,
    ) -> ServiceResult<Vec<Acl>> {
        let permissions = self.permissions_of(role_assignment).await?;
        let selectors = self
            .resource_group_of(role_assignment)
            .await?
            .map(|group| group.all_resource_selectors())
            .unwrap_or_default();

        Ok(explicit_cross_product(
            role_assignment,
            &permissions,
            principals,
            &selectors,
        ))
    }

    /// Scope-access grants. For every scope selector the walk starts at the
    /// declared scope and climbs to the root; only the starting scope honours
    /// `include_child_scopes`.
    ///
    /// Non-empty `added_principals` / `added_permissions` keep only rows for
    /// those principals / permissions.
    pub async fn get_implicit_acls(
        &self,
        role_assignment: &RoleAssignment,
        principals: &HashSet<String>,
        added_principals: &HashSet<String>,
        added_permissions: &HashSet<String>,
    ) -> ServiceResult<Vec<Acl>> {
        let Some(group) = self.resource_group_of(role_assignment).await? else {
            return Ok(Vec::new());
        };
        // A group that selects no resources implies no scope access either
        if group.scope_selectors.is_empty() || group.all_resource_selectors().is_empty() {
            return Ok(Vec::new());
        }

        let role_permissions = self.permissions_of(role_assignment).await?;
        let principal_type = role_assignment.principal_type.materialized();

        let mut seen = HashSet::new();
        let mut acls = Vec::new();
        for scope_selector in &group.scope_selectors {
            let start = build_scope_from_identifier(
                scope_selector
                    .scope_identifier
                    .as_deref()
                    .unwrap_or(&role_assignment.scope_identifier),
            )?;

            let mut give_to_children = scope_selector.include_child_scopes;
            for scope in start.ancestors() {
                let selector = ResourceSelector::unconditional(scope.resource_selector());
                let permissions = self.implicit_permissions.granted(
                    scope.level(),
                    give_to_children,
                    &role_permissions,
                );
                for principal_identifier in principals {
                    if !added_principals.is_empty()
                        && !added_principals.contains(principal_identifier)
                    {
                        continue;
                    }
                    let principal = Principal::of(principal_type, principal_identifier.as_str());
                    for permission in &permissions {
                        if !added_permissions.is_empty() && !added_permissions.contains(*permission)
                        {
                            continue;
                        }
                        let acl = Acl::build(permission, &principal, role_assignment, &selector, true);
                        if seen.insert(acl.row_id()) {
                            acls.push(acl);
                        }
                    }
                }
                give_to_children = false;
            }
        }
        Ok(acls)
    }

    /// Principal identifiers the assignment grants to. User groups expand to
    /// their members, looked up at the group's own scope.
    pub async fn resolve_principals(
        &self,
        role_assignment: &RoleAssignment,
    ) -> ServiceResult<HashSet<String>> {
        match role_assignment.principal_type {
            PrincipalType::UserGroup => {
                let principal_scope = principal_scope_identifier(role_assignment)?;
                let group = self
                    .user_groups
                    .get(&role_assignment.principal_identifier, &principal_scope)
                    .await?;
                Ok(group.map(|g| g.users).unwrap_or_default())
            }
            PrincipalType::User | PrincipalType::ServiceAccount => {
                Ok(HashSet::from([role_assignment.principal_identifier.clone()]))
            }
        }
    }

    pub async fn permissions_of(
        &self,
        role_assignment: &RoleAssignment,
    ) -> ServiceResult<HashSet<String>> {
        let role = self
            .roles
            .get(
                &role_assignment.role_identifier,
                &role_assignment.scope_identifier,
            )
            .await?;
        Ok(role.map(|r| r.permissions).unwrap_or_default())
    }

    pub async fn resource_group_of(
        &self,
        role_assignment: &RoleAssignment,
    ) -> ServiceResult<Option<ResourceGroup>> {
        self.resource_groups
            .get(
                &role_assignment.resource_group_identifier,
                &role_assignment.scope_identifier,
            )
            .await
    }

    pub fn roles(&self) -> &Arc<dyn RoleService> {
        &self.roles
    }

    pub fn user_groups(&self) -> &Arc<dyn UserGroupService> {
        &self.user_groups
    }

    pub fn resource_groups(&self) -> &Arc<dyn ResourceGroupService> {
        &self.resource_groups
    }
}

/// {permission} x {principal} x {selector} as explicit rows of the assignment.
pub fn explicit_cross_product<'a>(
    role_assignment: &RoleAssignment,
    permissions: &HashSet<String>,
    principals: &HashSet<String>,
    selectors: impl IntoIterator<Item = &'a ResourceSelector>,
) -> Vec<Acl> {
    let principal_type = role_assignment.principal_type.materialized();
    let mut acls = Vec::new();
    for selector in selectors {
        for principal_identifier in principals {
            let principal = Principal::of(principal_type, principal_identifier.as_str());
            for permission in permissions {
                acls.push(Acl::build(
                    permission,
                    &principal,
                    role_assignment,
                    selector,
                    false,
                ));
            }
        }
    }
    acls
}

/// Scope the assignment's principal lives in: the ancestor at
/// `principal_scope_level`, or the assignment scope itself.
pub fn principal_scope_identifier(role_assignment: &RoleAssignment) -> ServiceResult<String> {
    let Some(level) = role_assignment.principal_scope_level else {
        return Ok(role_assignment.scope_identifier.clone());
    };
    let scope = build_scope_from_identifier(&role_assignment.scope_identifier)?;
    Ok(to_parent_scope(&scope, level)
        .map(|s| s.identifier().to_string())
        .unwrap_or_else(|| role_assignment.scope_identifier.clone()))
}
