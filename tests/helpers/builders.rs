use acl_aggregator::aggregator::types::{
    Acl, PrincipalType, ResourceGroup, ResourceSelector, Role, RoleAssignment, ScopeSelector,
    UserGroup,
};
use acl_aggregator::scope::ScopeLevel;
use acl_aggregator::storage;
use sea_orm::DatabaseConnection;
use std::collections::BTreeSet;

/// Builder for creating test roles
pub struct RoleBuilder {
    role: Role,
}

impl RoleBuilder {
    pub fn new(identifier: &str) -> Self {
        Self {
            role: Role {
                id: format!("role-{identifier}"),
                identifier: identifier.to_string(),
                scope_identifier: None,
                permissions: Default::default(),
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.role.id = id.to_string();
        self
    }

    pub fn in_scope(mut self, scope: &str) -> Self {
        self.role.scope_identifier = Some(scope.to_string());
        self
    }

    pub fn with_permissions(mut self, permissions: &[&str]) -> Self {
        self.role.permissions = permissions.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn build(self) -> Role {
        self.role
    }

    pub async fn create(self, db: &DatabaseConnection) -> Role {
        storage::upsert_role(db, &self.role)
            .await
            .expect("Failed to create test role");
        self.role
    }
}

/// Builder for creating test user groups
pub struct UserGroupBuilder {
    group: UserGroup,
}

impl UserGroupBuilder {
    pub fn new(identifier: &str, scope: &str) -> Self {
        Self {
            group: UserGroup {
                id: format!("ug-{identifier}"),
                identifier: identifier.to_string(),
                scope_identifier: scope.to_string(),
                users: Default::default(),
            },
        }
    }

    pub fn with_users(mut self, users: &[&str]) -> Self {
        self.group.users = users.iter().map(|u| u.to_string()).collect();
        self
    }

    pub fn build(self) -> UserGroup {
        self.group
    }

    pub async fn create(self, db: &DatabaseConnection) -> UserGroup {
        storage::upsert_user_group(db, &self.group)
            .await
            .expect("Failed to create test user group");
        self.group
    }
}

/// Builder for creating test resource groups
pub struct ResourceGroupBuilder {
    group: ResourceGroup,
}

impl ResourceGroupBuilder {
    pub fn new(identifier: &str) -> Self {
        Self {
            group: ResourceGroup {
                id: format!("rg-{identifier}"),
                identifier: identifier.to_string(),
                scope_identifier: None,
                resource_selectors: vec![],
                resource_selectors_v2: vec![],
                scope_selectors: vec![],
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.group.id = id.to_string();
        self
    }

    pub fn in_scope(mut self, scope: &str) -> Self {
        self.group.scope_identifier = Some(scope.to_string());
        self
    }

    pub fn with_selectors(mut self, selectors: &[&str]) -> Self {
        self.group.resource_selectors = selectors.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_conditional_selector(mut self, selector: &str, condition: &str) -> Self {
        self.group.resource_selectors_v2.push(ResourceSelector {
            selector: selector.to_string(),
            conditional: true,
            condition: Some(condition.to_string()),
        });
        self
    }

    /// Grant scope access on `scope` (the assignment's scope when `None`)
    pub fn with_scope_selector(mut self, scope: Option<&str>, include_child_scopes: bool) -> Self {
        self.group.scope_selectors.push(ScopeSelector {
            scope_identifier: scope.map(str::to_string),
            include_child_scopes,
        });
        self
    }

    pub fn build(self) -> ResourceGroup {
        self.group
    }

    pub async fn create(self, db: &DatabaseConnection) -> ResourceGroup {
        storage::upsert_resource_group(db, &self.group)
            .await
            .expect("Failed to create test resource group");
        self.group
    }
}

/// Builder for creating test role assignments
pub struct RoleAssignmentBuilder {
    role_assignment: RoleAssignment,
}

impl RoleAssignmentBuilder {
    pub fn new(id: &str, scope: &str) -> Self {
        Self {
            role_assignment: RoleAssignment {
                id: id.to_string(),
                identifier: format!("{id}_identifier"),
                scope_identifier: scope.to_string(),
                role_identifier: "viewer".to_string(),
                resource_group_identifier: "all".to_string(),
                principal_type: PrincipalType::User,
                principal_identifier: "u1".to_string(),
                principal_scope_level: None,
                disabled: false,
            },
        }
    }

    pub fn role(mut self, role_identifier: &str) -> Self {
        self.role_assignment.role_identifier = role_identifier.to_string();
        self
    }

    pub fn resource_group(mut self, resource_group_identifier: &str) -> Self {
        self.role_assignment.resource_group_identifier = resource_group_identifier.to_string();
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        self.role_assignment.principal_type = PrincipalType::User;
        self.role_assignment.principal_identifier = user.to_string();
        self
    }

    pub fn service_account(mut self, service_account: &str) -> Self {
        self.role_assignment.principal_type = PrincipalType::ServiceAccount;
        self.role_assignment.principal_identifier = service_account.to_string();
        self
    }

    pub fn user_group(mut self, group: &str, level: Option<ScopeLevel>) -> Self {
        self.role_assignment.principal_type = PrincipalType::UserGroup;
        self.role_assignment.principal_identifier = group.to_string();
        self.role_assignment.principal_scope_level = level;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.role_assignment.disabled = true;
        self
    }

    pub fn build(self) -> RoleAssignment {
        self.role_assignment
    }

    pub async fn create(self, db: &DatabaseConnection) -> RoleAssignment {
        storage::upsert_role_assignment(db, &self.role_assignment)
            .await
            .expect("Failed to create test role assignment");
        self.role_assignment
    }
}

/// (permission, principal, selector, implicit) of each row, ordered
pub fn acl_triples(acls: &[Acl]) -> BTreeSet<(String, String, String, bool)> {
    acls.iter()
        .map(|acl| {
            (
                acl.permission_identifier.clone(),
                acl.principal_identifier.clone(),
                acl.resource_selector.selector.clone(),
                acl.implicit,
            )
        })
        .collect()
}
