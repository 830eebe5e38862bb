use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use base64ct::Encoding;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::AggregatorError;
use crate::scope::ScopeLevel;

const QUERY_DELIMITER: char = '$';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrincipalType {
    User,
    UserGroup,
    ServiceAccount,
}

impl PrincipalType {
    pub fn as_str(self) -> &'static str {
        match self {
            PrincipalType::User => "USER",
            PrincipalType::UserGroup => "USER_GROUP",
            PrincipalType::ServiceAccount => "SERVICE_ACCOUNT",
        }
    }

    /// Principal type carried by materialized rows. Groups are expanded to
    /// their member users, so `UserGroup` never appears on a row.
    pub fn materialized(self) -> PrincipalType {
        match self {
            PrincipalType::User | PrincipalType::UserGroup => PrincipalType::User,
            PrincipalType::ServiceAccount => PrincipalType::ServiceAccount,
        }
    }
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrincipalType {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(PrincipalType::User),
            "USER_GROUP" => Ok(PrincipalType::UserGroup),
            "SERVICE_ACCOUNT" => Ok(PrincipalType::ServiceAccount),
            other => Err(AggregatorError::UnknownPrincipalType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub principal_type: PrincipalType,
    pub identifier: String,
}

impl Principal {
    pub fn of(principal_type: PrincipalType, identifier: impl Into<String>) -> Self {
        Self {
            principal_type,
            identifier: identifier.into(),
        }
    }
}

/// A resource selector, optionally guarded by a condition expression.
/// Legacy string selectors map to unconditional selectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceSelector {
    pub selector: String,
    #[serde(default)]
    pub conditional: bool,
    #[serde(default)]
    pub condition: Option<String>,
}

impl ResourceSelector {
    pub fn unconditional(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            conditional: false,
            condition: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeSelector {
    /// Scope the grant is declared on; `None` means the role assignment's scope.
    #[serde(default)]
    pub scope_identifier: Option<String>,
    #[serde(default)]
    pub include_child_scopes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub identifier: String,
    /// `None` for managed roles, which resolve in every scope.
    #[serde(default)]
    pub scope_identifier: Option<String>,
    #[serde(default)]
    pub permissions: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    pub id: String,
    pub identifier: String,
    pub scope_identifier: String,
    #[serde(default)]
    pub users: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub id: String,
    pub identifier: String,
    /// `None` for managed resource groups.
    #[serde(default)]
    pub scope_identifier: Option<String>,
    #[serde(default)]
    pub resource_selectors: Vec<String>,
    #[serde(default)]
    pub resource_selectors_v2: Vec<ResourceSelector>,
    #[serde(default)]
    pub scope_selectors: Vec<ScopeSelector>,
}

impl ResourceGroup {
    /// Union of the legacy and structured selector lists.
    pub fn all_resource_selectors(&self) -> HashSet<ResourceSelector> {
        self.resource_selectors
            .iter()
            .map(ResourceSelector::unconditional)
            .chain(self.resource_selectors_v2.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: String,
    pub identifier: String,
    pub scope_identifier: String,
    pub role_identifier: String,
    pub resource_group_identifier: String,
    pub principal_type: PrincipalType,
    pub principal_identifier: String,
    /// Level the principal lives at, when it differs from the assignment scope.
    #[serde(default)]
    pub principal_scope_level: Option<ScopeLevel>,
    #[serde(default)]
    pub disabled: bool,
}

/// One materialized grant owned by a role assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Acl {
    pub role_assignment_id: String,
    pub scope_identifier: String,
    pub permission_identifier: String,
    pub principal_type: PrincipalType,
    pub principal_identifier: String,
    pub resource_selector: ResourceSelector,
    pub implicit: bool,
    pub role_identifier: String,
    pub resource_group_identifier: String,
    pub user_group_identifier: Option<String>,
}

impl Acl {
    pub fn build(
        permission: &str,
        principal: &Principal,
        role_assignment: &RoleAssignment,
        resource_selector: &ResourceSelector,
        implicit: bool,
    ) -> Self {
        let user_group_identifier = match role_assignment.principal_type {
            PrincipalType::UserGroup => Some(role_assignment.principal_identifier.clone()),
            PrincipalType::User | PrincipalType::ServiceAccount => None,
        };
        Self {
            role_assignment_id: role_assignment.id.clone(),
            scope_identifier: role_assignment.scope_identifier.clone(),
            permission_identifier: permission.to_string(),
            principal_type: principal.principal_type,
            principal_identifier: principal.identifier.clone(),
            resource_selector: resource_selector.clone(),
            implicit,
            role_identifier: role_assignment.role_identifier.clone(),
            resource_group_identifier: role_assignment.resource_group_identifier.clone(),
            user_group_identifier,
        }
    }

    /// Lookup key answering "can principal do permission on selector in scope".
    pub fn acl_query_string(&self) -> String {
        acl_query_string(
            &self.scope_identifier,
            &self.resource_selector.selector,
            self.principal_type,
            &self.principal_identifier,
            &self.permission_identifier,
        )
    }

    /// Stable row id; two rows with the same identity collide on insert.
    pub fn row_id(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.role_assignment_id.as_str(),
            self.scope_identifier.as_str(),
            self.permission_identifier.as_str(),
            self.principal_type.as_str(),
            self.principal_identifier.as_str(),
            self.resource_selector.selector.as_str(),
            if self.resource_selector.conditional { "1" } else { "0" },
            self.resource_selector.condition.as_deref().unwrap_or(""),
            if self.implicit { "1" } else { "0" },
            self.role_identifier.as_str(),
            self.resource_group_identifier.as_str(),
            self.user_group_identifier.as_deref().unwrap_or(""),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        base64ct::Base64UrlUnpadded::encode_string(&hasher.finalize())
    }
}

pub fn acl_query_string(
    scope_identifier: &str,
    resource_selector: &str,
    principal_type: PrincipalType,
    principal_identifier: &str,
    permission_identifier: &str,
) -> String {
    [
        scope_identifier,
        permission_identifier,
        resource_selector,
        principal_type.as_str(),
        principal_identifier,
    ]
    .join(&QUERY_DELIMITER.to_string())
}

/// Rows created and deleted while handling one event or unit of work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AclCounts {
    pub created: u64,
    pub deleted: u64,
}

impl AclCounts {
    pub fn total(&self) -> u64 {
        self.created + self.deleted
    }
}

impl std::ops::AddAssign for AclCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.deleted += rhs.deleted;
    }
}

impl std::iter::Sum for AclCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(AclCounts::default(), |mut acc, c| {
            acc += c;
            acc
        })
    }
}

// ---------- Change feed payloads ----------

/// Fields of a role assignment touched by an update. Only fields that
/// changed are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignmentUpdate {
    #[serde(default)]
    pub role_identifier: Option<String>,
    #[serde(default)]
    pub resource_group_identifier: Option<String>,
    #[serde(default)]
    pub principal_identifier: Option<String>,
    #[serde(default)]
    pub disabled: Option<bool>,
}

impl RoleAssignmentUpdate {
    pub fn affects_acls(&self) -> bool {
        let changed = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.is_empty());
        changed(&self.role_identifier)
            || changed(&self.resource_group_identifier)
            || changed(&self.principal_identifier)
            || self.disabled.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroupUpdate {
    #[serde(default)]
    pub resource_selectors: Option<Vec<String>>,
    #[serde(default)]
    pub resource_selectors_v2: Option<Vec<ResourceSelector>>,
    #[serde(default)]
    pub scope_selectors: Option<Vec<ScopeSelector>>,
}

impl ResourceGroupUpdate {
    pub fn resource_selectors_changed(&self) -> bool {
        self.resource_selectors.is_some() || self.resource_selectors_v2.is_some()
    }

    pub fn scope_selectors_changed(&self) -> bool {
        self.scope_selectors.is_some()
    }

    pub fn affects_acls(&self) -> bool {
        self.resource_selectors_changed() || self.scope_selectors_changed()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUpdate {
    #[serde(default)]
    pub permissions: Option<HashSet<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroupUpdate {
    #[serde(default)]
    pub users: Option<HashSet<String>>,
}
