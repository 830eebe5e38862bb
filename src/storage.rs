use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, Database, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use sea_orm_migration::MigratorTrait;

use crate::aggregator::services::{
    AclRepository, ResourceGroupService, RoleAssignmentRepository, RoleService, ServiceResult,
    UserGroupService,
};
use crate::aggregator::types::{
    acl_query_string, Acl, PrincipalType, ResourceGroup, ResourceSelector, Role, RoleAssignment,
    UserGroup,
};
use crate::entities;
use crate::errors::AggregatorError;
use crate::scope::ScopeLevel;
use crate::settings::Database as DbCfg;

/// Rows per bulk statement, keeps SQLite under its bind parameter limit.
const BATCH_SIZE: usize = 500;

pub async fn init(cfg: &DbCfg) -> Result<DatabaseConnection, AggregatorError> {
    let db = Database::connect(&cfg.url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

// ---------- Model conversions ----------

fn role_from_model(model: entities::role::Model) -> Result<Role, AggregatorError> {
    Ok(Role {
        permissions: serde_json::from_str(&model.permissions)?,
        id: model.id,
        identifier: model.identifier,
        scope_identifier: model.scope_identifier,
    })
}

fn user_group_from_model(model: entities::user_group::Model) -> Result<UserGroup, AggregatorError> {
    Ok(UserGroup {
        users: serde_json::from_str(&model.users)?,
        id: model.id,
        identifier: model.identifier,
        scope_identifier: model.scope_identifier,
    })
}

fn resource_group_from_model(
    model: entities::resource_group::Model,
) -> Result<ResourceGroup, AggregatorError> {
    Ok(ResourceGroup {
        resource_selectors: serde_json::from_str(&model.resource_selectors)?,
        resource_selectors_v2: serde_json::from_str(&model.resource_selectors_v2)?,
        scope_selectors: serde_json::from_str(&model.scope_selectors)?,
        id: model.id,
        identifier: model.identifier,
        scope_identifier: model.scope_identifier,
    })
}

fn role_assignment_from_model(
    model: entities::role_assignment::Model,
) -> Result<RoleAssignment, AggregatorError> {
    Ok(RoleAssignment {
        principal_type: model.principal_type.parse()?,
        principal_scope_level: model
            .principal_scope_level
            .as_deref()
            .map(str::parse::<ScopeLevel>)
            .transpose()?,
        id: model.id,
        identifier: model.identifier,
        scope_identifier: model.scope_identifier,
        role_identifier: model.role_identifier,
        resource_group_identifier: model.resource_group_identifier,
        principal_identifier: model.principal_identifier,
        disabled: model.disabled,
    })
}

fn acl_from_model(model: entities::acl::Model) -> Result<Acl, AggregatorError> {
    Ok(Acl {
        principal_type: model.principal_type.parse()?,
        role_assignment_id: model.role_assignment_id,
        scope_identifier: model.scope_identifier,
        permission_identifier: model.permission_identifier,
        principal_identifier: model.principal_identifier,
        resource_selector: ResourceSelector {
            selector: model.resource_selector,
            conditional: model.conditional,
            condition: model.condition,
        },
        implicit: model.implicit,
        role_identifier: model.role_identifier,
        resource_group_identifier: model.resource_group_identifier,
        user_group_identifier: model.user_group_identifier,
    })
}

fn acl_to_active_model(acl: &Acl, id: String, created_at: i64) -> entities::acl::ActiveModel {
    entities::acl::ActiveModel {
        id: Set(id),
        role_assignment_id: Set(acl.role_assignment_id.clone()),
        scope_identifier: Set(acl.scope_identifier.clone()),
        permission_identifier: Set(acl.permission_identifier.clone()),
        principal_type: Set(acl.principal_type.as_str().to_string()),
        principal_identifier: Set(acl.principal_identifier.clone()),
        resource_selector: Set(acl.resource_selector.selector.clone()),
        conditional: Set(acl.resource_selector.conditional),
        condition: Set(acl.resource_selector.condition.clone()),
        implicit: Set(acl.implicit),
        role_identifier: Set(acl.role_identifier.clone()),
        resource_group_identifier: Set(acl.resource_group_identifier.clone()),
        user_group_identifier: Set(acl.user_group_identifier.clone()),
        acl_query_string: Set(acl.acl_query_string()),
        created_at: Set(created_at),
    }
}

/// Serialize a set in a stable order so unchanged documents compare equal.
fn sorted_json(values: &HashSet<String>) -> Result<String, AggregatorError> {
    let mut sorted: Vec<&String> = values.iter().collect();
    sorted.sort();
    Ok(serde_json::to_string(&sorted)?)
}

/// Managed entities (no scope) are visible everywhere but lose to a scoped
/// entity with the same identifier.
fn prefer_scoped<T>(candidates: Vec<T>, scope_of: impl Fn(&T) -> bool) -> Option<T> {
    let mut managed = None;
    for candidate in candidates {
        if scope_of(&candidate) {
            return Some(candidate);
        }
        managed.get_or_insert(candidate);
    }
    managed
}

// ---------- Roles ----------

pub async fn upsert_role(db: &DatabaseConnection, role: &Role) -> Result<UpsertOutcome, AggregatorError> {
    use entities::role::{ActiveModel, Entity};

    let existing = Entity::find_by_id(role.id.clone()).one(db).await?;
    let permissions = sorted_json(&role.permissions)?;
    let now = Utc::now().timestamp();

    match existing {
        None => {
            ActiveModel {
                id: Set(role.id.clone()),
                identifier: Set(role.identifier.clone()),
                scope_identifier: Set(role.scope_identifier.clone()),
                permissions: Set(permissions),
                updated_at: Set(now),
            }
            .insert(db)
            .await?;
            Ok(UpsertOutcome::Created)
        }
        Some(model) => {
            if role_from_model(model.clone())? == *role {
                return Ok(UpsertOutcome::Unchanged);
            }
            let mut active = model.into_active_model();
            active.identifier = Set(role.identifier.clone());
            active.scope_identifier = Set(role.scope_identifier.clone());
            active.permissions = Set(permissions);
            active.updated_at = Set(now);
            active.update(db).await?;
            Ok(UpsertOutcome::Updated)
        }
    }
}

pub async fn get_role_by_id(db: &DatabaseConnection, id: &str) -> Result<Option<Role>, AggregatorError> {
    entities::Role::find_by_id(id.to_string())
        .one(db)
        .await?
        .map(role_from_model)
        .transpose()
}

pub async fn get_role(
    db: &DatabaseConnection,
    identifier: &str,
    scope_identifier: &str,
) -> Result<Option<Role>, AggregatorError> {
    use entities::role::{Column, Entity};

    let candidates = Entity::find()
        .filter(Column::Identifier.eq(identifier))
        .filter(
            Condition::any()
                .add(Column::ScopeIdentifier.eq(scope_identifier))
                .add(Column::ScopeIdentifier.is_null()),
        )
        .all(db)
        .await?;

    prefer_scoped(candidates, |m| m.scope_identifier.is_some())
        .map(role_from_model)
        .transpose()
}

// ---------- User groups ----------

pub async fn upsert_user_group(
    db: &DatabaseConnection,
    group: &UserGroup,
) -> Result<UpsertOutcome, AggregatorError> {
    use entities::user_group::{ActiveModel, Entity};

    let existing = Entity::find_by_id(group.id.clone()).one(db).await?;
    let users = sorted_json(&group.users)?;
    let now = Utc::now().timestamp();

    match existing {
        None => {
            ActiveModel {
                id: Set(group.id.clone()),
                identifier: Set(group.identifier.clone()),
                scope_identifier: Set(group.scope_identifier.clone()),
                users: Set(users),
                updated_at: Set(now),
            }
            .insert(db)
            .await?;
            Ok(UpsertOutcome::Created)
        }
        Some(model) => {
            if user_group_from_model(model.clone())? == *group {
                return Ok(UpsertOutcome::Unchanged);
            }
            let mut active = model.into_active_model();
            active.identifier = Set(group.identifier.clone());
            active.scope_identifier = Set(group.scope_identifier.clone());
            active.users = Set(users);
            active.updated_at = Set(now);
            active.update(db).await?;
            Ok(UpsertOutcome::Updated)
        }
    }
}

pub async fn get_user_group_by_id(
    db: &DatabaseConnection,
    id: &str,
) -> Result<Option<UserGroup>, AggregatorError> {
    entities::UserGroup::find_by_id(id.to_string())
        .one(db)
        .await?
        .map(user_group_from_model)
        .transpose()
}

pub async fn get_user_group(
    db: &DatabaseConnection,
    identifier: &str,
    scope_identifier: &str,
) -> Result<Option<UserGroup>, AggregatorError> {
    use entities::user_group::{Column, Entity};

    Entity::find()
        .filter(Column::Identifier.eq(identifier))
        .filter(Column::ScopeIdentifier.eq(scope_identifier))
        .one(db)
        .await?
        .map(user_group_from_model)
        .transpose()
}

// ---------- Resource groups ----------

pub async fn upsert_resource_group(
    db: &DatabaseConnection,
    group: &ResourceGroup,
) -> Result<UpsertOutcome, AggregatorError> {
    use entities::resource_group::{ActiveModel, Entity};

    let existing = Entity::find_by_id(group.id.clone()).one(db).await?;
    let resource_selectors = serde_json::to_string(&group.resource_selectors)?;
    let resource_selectors_v2 = serde_json::to_string(&group.resource_selectors_v2)?;
    let scope_selectors = serde_json::to_string(&group.scope_selectors)?;
    let now = Utc::now().timestamp();

    match existing {
        None => {
            ActiveModel {
                id: Set(group.id.clone()),
                identifier: Set(group.identifier.clone()),
                scope_identifier: Set(group.scope_identifier.clone()),
                resource_selectors: Set(resource_selectors),
                resource_selectors_v2: Set(resource_selectors_v2),
                scope_selectors: Set(scope_selectors),
                updated_at: Set(now),
            }
            .insert(db)
            .await?;
            Ok(UpsertOutcome::Created)
        }
        Some(model) => {
            if resource_group_from_model(model.clone())? == *group {
                return Ok(UpsertOutcome::Unchanged);
            }
            let mut active = model.into_active_model();
            active.identifier = Set(group.identifier.clone());
            active.scope_identifier = Set(group.scope_identifier.clone());
            active.resource_selectors = Set(resource_selectors);
            active.resource_selectors_v2 = Set(resource_selectors_v2);
            active.scope_selectors = Set(scope_selectors);
            active.updated_at = Set(now);
            active.update(db).await?;
            Ok(UpsertOutcome::Updated)
        }
    }
}

pub async fn get_resource_group_by_id(
    db: &DatabaseConnection,
    id: &str,
) -> Result<Option<ResourceGroup>, AggregatorError> {
    entities::ResourceGroup::find_by_id(id.to_string())
        .one(db)
        .await?
        .map(resource_group_from_model)
        .transpose()
}

pub async fn get_resource_group(
    db: &DatabaseConnection,
    identifier: &str,
    scope_identifier: &str,
) -> Result<Option<ResourceGroup>, AggregatorError> {
    use entities::resource_group::{Column, Entity};

    let candidates = Entity::find()
        .filter(Column::Identifier.eq(identifier))
        .filter(
            Condition::any()
                .add(Column::ScopeIdentifier.eq(scope_identifier))
                .add(Column::ScopeIdentifier.is_null()),
        )
        .all(db)
        .await?;

    prefer_scoped(candidates, |m| m.scope_identifier.is_some())
        .map(resource_group_from_model)
        .transpose()
}

// ---------- Role assignments ----------

pub async fn upsert_role_assignment(
    db: &DatabaseConnection,
    role_assignment: &RoleAssignment,
) -> Result<UpsertOutcome, AggregatorError> {
    use entities::role_assignment::{ActiveModel, Entity};

    let existing = Entity::find_by_id(role_assignment.id.clone()).one(db).await?;
    let now = Utc::now().timestamp();
    let principal_scope_level = role_assignment
        .principal_scope_level
        .map(|level| level.path_key().to_string());

    match existing {
        None => {
            ActiveModel {
                id: Set(role_assignment.id.clone()),
                identifier: Set(role_assignment.identifier.clone()),
                scope_identifier: Set(role_assignment.scope_identifier.clone()),
                role_identifier: Set(role_assignment.role_identifier.clone()),
                resource_group_identifier: Set(role_assignment.resource_group_identifier.clone()),
                principal_type: Set(role_assignment.principal_type.as_str().to_string()),
                principal_identifier: Set(role_assignment.principal_identifier.clone()),
                principal_scope_level: Set(principal_scope_level),
                disabled: Set(role_assignment.disabled),
                updated_at: Set(now),
            }
            .insert(db)
            .await?;
            Ok(UpsertOutcome::Created)
        }
        Some(model) => {
            if role_assignment_from_model(model.clone())? == *role_assignment {
                return Ok(UpsertOutcome::Unchanged);
            }
            let mut active = model.into_active_model();
            active.identifier = Set(role_assignment.identifier.clone());
            active.scope_identifier = Set(role_assignment.scope_identifier.clone());
            active.role_identifier = Set(role_assignment.role_identifier.clone());
            active.resource_group_identifier =
                Set(role_assignment.resource_group_identifier.clone());
            active.principal_type = Set(role_assignment.principal_type.as_str().to_string());
            active.principal_identifier = Set(role_assignment.principal_identifier.clone());
            active.principal_scope_level = Set(principal_scope_level);
            active.disabled = Set(role_assignment.disabled);
            active.updated_at = Set(now);
            active.update(db).await?;
            Ok(UpsertOutcome::Updated)
        }
    }
}

pub async fn delete_role_assignment(db: &DatabaseConnection, id: &str) -> Result<u64, AggregatorError> {
    let result = entities::RoleAssignment::delete_by_id(id.to_string())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn get_role_assignment_by_id(
    db: &DatabaseConnection,
    id: &str,
) -> Result<Option<RoleAssignment>, AggregatorError> {
    entities::RoleAssignment::find_by_id(id.to_string())
        .one(db)
        .await?
        .map(role_assignment_from_model)
        .transpose()
}

pub async fn get_role_assignment(
    db: &DatabaseConnection,
    identifier: &str,
    scope_identifier: &str,
) -> Result<Option<RoleAssignment>, AggregatorError> {
    use entities::role_assignment::{Column, Entity};

    Entity::find()
        .filter(Column::Identifier.eq(identifier))
        .filter(Column::ScopeIdentifier.eq(scope_identifier))
        .one(db)
        .await?
        .map(role_assignment_from_model)
        .transpose()
}

async fn find_enabled_role_assignments(
    db: &DatabaseConnection,
    filter: Condition,
) -> Result<Vec<RoleAssignment>, AggregatorError> {
    use entities::role_assignment::{Column, Entity};

    Entity::find()
        .filter(Column::Disabled.eq(false))
        .filter(filter)
        .order_by_asc(Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(role_assignment_from_model)
        .collect()
}

pub async fn find_enabled_role_assignments_by_resource_group(
    db: &DatabaseConnection,
    resource_group_identifier: &str,
    scope_identifier: Option<&str>,
) -> Result<Vec<RoleAssignment>, AggregatorError> {
    use entities::role_assignment::Column;

    let mut filter =
        Condition::all().add(Column::ResourceGroupIdentifier.eq(resource_group_identifier));
    if let Some(scope) = scope_identifier {
        filter = filter.add(Column::ScopeIdentifier.eq(scope));
    }
    find_enabled_role_assignments(db, filter).await
}

pub async fn find_enabled_role_assignments_by_role(
    db: &DatabaseConnection,
    role_identifier: &str,
    scope_identifier: Option<&str>,
) -> Result<Vec<RoleAssignment>, AggregatorError> {
    use entities::role_assignment::Column;

    let mut filter = Condition::all().add(Column::RoleIdentifier.eq(role_identifier));
    if let Some(scope) = scope_identifier {
        filter = filter.add(Column::ScopeIdentifier.eq(scope));
    }
    find_enabled_role_assignments(db, filter).await
}

pub async fn find_enabled_role_assignments_by_user_group(
    db: &DatabaseConnection,
    user_group_identifier: &str,
) -> Result<Vec<RoleAssignment>, AggregatorError> {
    use entities::role_assignment::Column;

    let filter = Condition::all()
        .add(Column::PrincipalType.eq(PrincipalType::UserGroup.as_str()))
        .add(Column::PrincipalIdentifier.eq(user_group_identifier));
    find_enabled_role_assignments(db, filter).await
}

pub async fn find_all_enabled_role_assignments(
    db: &DatabaseConnection,
) -> Result<Vec<RoleAssignment>, AggregatorError> {
    find_enabled_role_assignments(db, Condition::all()).await
}

// ---------- ACLs ----------

/// Insert rows, skipping any whose id already exists. Returns how many were
/// actually written.
pub async fn insert_acls(db: &DatabaseConnection, acls: &[Acl]) -> Result<u64, AggregatorError> {
    use entities::acl::{Column, Entity};

    let now = Utc::now().timestamp();
    let mut seen = HashSet::new();
    let models: Vec<_> = acls
        .iter()
        .filter_map(|acl| {
            let id = acl.row_id();
            seen.insert(id.clone())
                .then(|| acl_to_active_model(acl, id, now))
        })
        .collect();

    let mut inserted = 0;
    for chunk in models.chunks(BATCH_SIZE) {
        inserted += Entity::insert_many(chunk.to_vec())
            .on_conflict(OnConflict::column(Column::Id).do_nothing().to_owned())
            .exec_without_returning(db)
            .await?;
    }
    Ok(inserted)
}

pub async fn delete_acls_by_role_assignment(
    db: &DatabaseConnection,
    role_assignment_id: &str,
) -> Result<u64, AggregatorError> {
    delete_acls_where(db, role_assignment_id, Condition::all()).await
}

async fn delete_acls_where(
    db: &DatabaseConnection,
    role_assignment_id: &str,
    filter: Condition,
) -> Result<u64, AggregatorError> {
    use entities::acl::{Column, Entity};

    let result = Entity::delete_many()
        .filter(Column::RoleAssignmentId.eq(role_assignment_id))
        .filter(filter)
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Deletes the assignment's explicit rows on any of `selectors`.
pub async fn delete_acls_by_resource_selectors(
    db: &DatabaseConnection,
    role_assignment_id: &str,
    selectors: &HashSet<ResourceSelector>,
) -> Result<u64, AggregatorError> {
    use entities::acl::Column;

    if selectors.is_empty() {
        return Ok(0);
    }
    let mut any_selector = Condition::any();
    for selector in selectors {
        let condition = match &selector.condition {
            Some(expr) => Column::Condition.eq(expr.as_str()),
            None => Column::Condition.is_null(),
        };
        any_selector = any_selector.add(
            Condition::all()
                .add(Column::ResourceSelector.eq(selector.selector.as_str()))
                .add(Column::Conditional.eq(selector.conditional))
                .add(condition),
        );
    }
    delete_acls_where(
        db,
        role_assignment_id,
        Condition::all()
            .add(Column::Implicit.eq(false))
            .add(any_selector),
    )
    .await
}

pub async fn delete_implicit_acls(
    db: &DatabaseConnection,
    role_assignment_id: &str,
) -> Result<u64, AggregatorError> {
    use entities::acl::Column;

    delete_acls_where(
        db,
        role_assignment_id,
        Condition::all().add(Column::Implicit.eq(true)),
    )
    .await
}

pub async fn delete_acls_by_permissions(
    db: &DatabaseConnection,
    role_assignment_id: &str,
    permissions: &HashSet<String>,
) -> Result<u64, AggregatorError> {
    use entities::acl::Column;

    if permissions.is_empty() {
        return Ok(0);
    }
    delete_acls_where(
        db,
        role_assignment_id,
        Condition::all().add(Column::PermissionIdentifier.is_in(permissions.iter().cloned())),
    )
    .await
}

pub async fn delete_acls_by_principals(
    db: &DatabaseConnection,
    role_assignment_id: &str,
    principals: &HashSet<String>,
) -> Result<u64, AggregatorError> {
    use entities::acl::Column;

    if principals.is_empty() {
        return Ok(0);
    }
    delete_acls_where(
        db,
        role_assignment_id,
        Condition::all().add(Column::PrincipalIdentifier.is_in(principals.iter().cloned())),
    )
    .await
}

pub async fn delete_acls(db: &DatabaseConnection, acls: &[Acl]) -> Result<u64, AggregatorError> {
    use entities::acl::{Column, Entity};

    let ids: Vec<String> = acls.iter().map(Acl::row_id).collect();
    let mut deleted = 0;
    for chunk in ids.chunks(BATCH_SIZE) {
        let result = Entity::delete_many()
            .filter(Column::Id.is_in(chunk.iter().cloned()))
            .exec(db)
            .await?;
        deleted += result.rows_affected;
    }
    Ok(deleted)
}

pub async fn get_distinct_resource_selectors(
    db: &DatabaseConnection,
    role_assignment_id: &str,
) -> Result<HashSet<ResourceSelector>, AggregatorError> {
    use entities::acl::{Column, Entity};

    let rows: Vec<(String, bool, Option<String>)> = Entity::find()
        .select_only()
        .column(Column::ResourceSelector)
        .column(Column::Conditional)
        .column(Column::Condition)
        .distinct()
        .filter(Column::RoleAssignmentId.eq(role_assignment_id))
        .filter(Column::Implicit.eq(false))
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(selector, conditional, condition)| ResourceSelector {
            selector,
            conditional,
            condition,
        })
        .collect())
}

async fn get_distinct_acl_column(
    db: &DatabaseConnection,
    role_assignment_id: &str,
    column: entities::acl::Column,
) -> Result<HashSet<String>, AggregatorError> {
    use entities::acl::{Column, Entity};

    let values: Vec<String> = Entity::find()
        .select_only()
        .column(column)
        .distinct()
        .filter(Column::RoleAssignmentId.eq(role_assignment_id))
        .filter(Column::Implicit.eq(false))
        .into_tuple()
        .all(db)
        .await?;
    Ok(values.into_iter().collect())
}

pub async fn get_distinct_permissions(
    db: &DatabaseConnection,
    role_assignment_id: &str,
) -> Result<HashSet<String>, AggregatorError> {
    get_distinct_acl_column(
        db,
        role_assignment_id,
        entities::acl::Column::PermissionIdentifier,
    )
    .await
}

pub async fn get_distinct_principals(
    db: &DatabaseConnection,
    role_assignment_id: &str,
) -> Result<HashSet<String>, AggregatorError> {
    get_distinct_acl_column(
        db,
        role_assignment_id,
        entities::acl::Column::PrincipalIdentifier,
    )
    .await
}

pub async fn get_acls_by_role_assignment(
    db: &DatabaseConnection,
    role_assignment_id: &str,
) -> Result<Vec<Acl>, AggregatorError> {
    use entities::acl::{Column, Entity};

    Entity::find()
        .filter(Column::RoleAssignmentId.eq(role_assignment_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(acl_from_model)
        .collect()
}

pub async fn get_distinct_role_assignment_ids(
    db: &DatabaseConnection,
) -> Result<HashSet<String>, AggregatorError> {
    use entities::acl::{Column, Entity};

    let ids: Vec<String> = Entity::find()
        .select_only()
        .column(Column::RoleAssignmentId)
        .distinct()
        .into_tuple()
        .all(db)
        .await?;
    Ok(ids.into_iter().collect())
}

pub async fn count_acls(db: &DatabaseConnection) -> Result<u64, AggregatorError> {
    Ok(entities::Acl::find().count(db).await?)
}

pub async fn has_access_by_query_string(
    db: &DatabaseConnection,
    query_string: &str,
) -> Result<bool, AggregatorError> {
    use entities::acl::{Column, Entity};

    let count = Entity::find()
        .filter(Column::AclQueryString.eq(query_string))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Can `principal` perform `permission` on `resource_selector` in `scope`.
pub async fn has_access(
    db: &DatabaseConnection,
    scope_identifier: &str,
    permission_identifier: &str,
    resource_selector: &str,
    principal_type: PrincipalType,
    principal_identifier: &str,
) -> Result<bool, AggregatorError> {
    let query = acl_query_string(
        scope_identifier,
        resource_selector,
        principal_type,
        principal_identifier,
        permission_identifier,
    );
    has_access_by_query_string(db, &query).await
}

// ---------- Collaborator implementations ----------

/// All aggregator collaborators backed by one SeaORM connection.
#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl RoleService for SeaOrmStore {
    async fn get(&self, identifier: &str, scope_identifier: &str) -> ServiceResult<Option<Role>> {
        get_role(&self.db, identifier, scope_identifier).await
    }

    async fn find_by_id(&self, id: &str) -> ServiceResult<Option<Role>> {
        get_role_by_id(&self.db, id).await
    }
}

#[async_trait]
impl UserGroupService for SeaOrmStore {
    async fn get(
        &self,
        identifier: &str,
        scope_identifier: &str,
    ) -> ServiceResult<Option<UserGroup>> {
        get_user_group(&self.db, identifier, scope_identifier).await
    }

    async fn find_by_id(&self, id: &str) -> ServiceResult<Option<UserGroup>> {
        get_user_group_by_id(&self.db, id).await
    }
}

#[async_trait]
impl ResourceGroupService for SeaOrmStore {
    async fn get(
        &self,
        identifier: &str,
        scope_identifier: &str,
    ) -> ServiceResult<Option<ResourceGroup>> {
        get_resource_group(&self.db, identifier, scope_identifier).await
    }

    async fn find_by_id(&self, id: &str) -> ServiceResult<Option<ResourceGroup>> {
        get_resource_group_by_id(&self.db, id).await
    }
}

#[async_trait]
impl RoleAssignmentRepository for SeaOrmStore {
    async fn find_by_id(&self, id: &str) -> ServiceResult<Option<RoleAssignment>> {
        get_role_assignment_by_id(&self.db, id).await
    }

    async fn find_by_identifier_and_scope(
        &self,
        identifier: &str,
        scope_identifier: &str,
    ) -> ServiceResult<Option<RoleAssignment>> {
        get_role_assignment(&self.db, identifier, scope_identifier).await
    }

    async fn find_enabled_by_resource_group(
        &self,
        resource_group_identifier: &str,
        scope_identifier: Option<&str>,
    ) -> ServiceResult<Vec<RoleAssignment>> {
        find_enabled_role_assignments_by_resource_group(
            &self.db,
            resource_group_identifier,
            scope_identifier,
        )
        .await
    }

    async fn find_enabled_by_role(
        &self,
        role_identifier: &str,
        scope_identifier: Option<&str>,
    ) -> ServiceResult<Vec<RoleAssignment>> {
        find_enabled_role_assignments_by_role(&self.db, role_identifier, scope_identifier).await
    }

    async fn find_enabled_by_user_group(
        &self,
        user_group_identifier: &str,
    ) -> ServiceResult<Vec<RoleAssignment>> {
        find_enabled_role_assignments_by_user_group(&self.db, user_group_identifier).await
    }

    async fn find_all_enabled(&self) -> ServiceResult<Vec<RoleAssignment>> {
        find_all_enabled_role_assignments(&self.db).await
    }
}

#[async_trait]
impl AclRepository for SeaOrmStore {
    async fn insert_all_ignoring_duplicates(&self, acls: &[Acl]) -> ServiceResult<u64> {
        insert_acls(&self.db, acls).await
    }

    async fn delete_by_role_assignment_id(&self, role_assignment_id: &str) -> ServiceResult<u64> {
        delete_acls_by_role_assignment(&self.db, role_assignment_id).await
    }

    async fn delete_by_role_assignment_id_and_resource_selectors(
        &self,
        role_assignment_id: &str,
        selectors: &HashSet<ResourceSelector>,
    ) -> ServiceResult<u64> {
        delete_acls_by_resource_selectors(&self.db, role_assignment_id, selectors).await
    }

    async fn delete_by_role_assignment_id_and_implicit_for_scope(
        &self,
        role_assignment_id: &str,
    ) -> ServiceResult<u64> {
        delete_implicit_acls(&self.db, role_assignment_id).await
    }

    async fn delete_by_role_assignment_id_and_permissions(
        &self,
        role_assignment_id: &str,
        permissions: &HashSet<String>,
    ) -> ServiceResult<u64> {
        delete_acls_by_permissions(&self.db, role_assignment_id, permissions).await
    }

    async fn delete_by_role_assignment_id_and_principals(
        &self,
        role_assignment_id: &str,
        principals: &HashSet<String>,
    ) -> ServiceResult<u64> {
        delete_acls_by_principals(&self.db, role_assignment_id, principals).await
    }

    async fn delete_acls(&self, acls: &[Acl]) -> ServiceResult<u64> {
        delete_acls(&self.db, acls).await
    }

    async fn get_distinct_resource_selectors_in_acls(
        &self,
        role_assignment_id: &str,
    ) -> ServiceResult<HashSet<ResourceSelector>> {
        get_distinct_resource_selectors(&self.db, role_assignment_id).await
    }

    async fn get_distinct_permissions_in_acls_for_role_assignment(
        &self,
        role_assignment_id: &str,
    ) -> ServiceResult<HashSet<String>> {
        get_distinct_permissions(&self.db, role_assignment_id).await
    }

    async fn get_distinct_principals_in_acls_for_role_assignment(
        &self,
        role_assignment_id: &str,
    ) -> ServiceResult<HashSet<String>> {
        get_distinct_principals(&self.db, role_assignment_id).await
    }

    async fn get_acls_for_role_assignment(
        &self,
        role_assignment_id: &str,
    ) -> ServiceResult<Vec<Acl>> {
        get_acls_by_role_assignment(&self.db, role_assignment_id).await
    }

    async fn get_distinct_role_assignment_ids(&self) -> ServiceResult<HashSet<String>> {
        get_distinct_role_assignment_ids(&self.db).await
    }

    async fn has_access(&self, acl_query_string: &str) -> ServiceResult<bool> {
        has_access_by_query_string(&self.db, acl_query_string).await
    }
}
