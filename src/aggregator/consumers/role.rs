use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{unit_failed, ChangeConsumer};
use crate::aggregator::compute::{explicit_cross_product, AclComputationService};
use crate::aggregator::pool::WorkerPool;
use crate::aggregator::services::{AclRepository, RoleAssignmentRepository, ServiceResult};
use crate::aggregator::types::{AclCounts, Role, RoleAssignment, RoleUpdate};

/// Applies role permission changes to every assignment of the role.
pub struct RoleChangeConsumer {
    acls: Arc<dyn AclRepository>,
    role_assignments: Arc<dyn RoleAssignmentRepository>,
    computation: Arc<AclComputationService>,
    pool: WorkerPool,
}

impl RoleChangeConsumer {
    pub fn new(
        acls: Arc<dyn AclRepository>,
        role_assignments: Arc<dyn RoleAssignmentRepository>,
        computation: Arc<AclComputationService>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            acls,
            role_assignments,
            computation,
            pool,
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    async fn affected_role_assignments(&self, role: &Role) -> ServiceResult<Vec<RoleAssignment>> {
        let candidates = self
            .role_assignments
            .find_enabled_by_role(&role.identifier, role.scope_identifier.as_deref())
            .await?;

        let mut affected = Vec::with_capacity(candidates.len());
        for role_assignment in candidates {
            let resolved = self
                .computation
                .roles()
                .get(
                    &role_assignment.role_identifier,
                    &role_assignment.scope_identifier,
                )
                .await?;
            if resolved.is_some_and(|r| r.id == role.id) {
                affected.push(role_assignment);
            }
        }
        Ok(affected)
    }
}

#[async_trait]
impl ChangeConsumer for RoleChangeConsumer {
    type Created = Role;
    type Updated = RoleUpdate;

    async fn consume_create_event(&self, id: &str, created: Role) -> ServiceResult<AclCounts> {
        // A scoped role can take over assignments from a managed one
        debug!(
            role_id = id,
            scoped = created.scope_identifier.is_some(),
            "Role created"
        );
        self.consume_update_event(
            id,
            RoleUpdate {
                permissions: Some(created.permissions),
            },
        )
        .await
    }

    async fn consume_update_event(&self, id: &str, updated: RoleUpdate) -> ServiceResult<AclCounts> {
        if updated.permissions.is_none() {
            debug!(role_id = id, "Update does not touch permissions");
            return Ok(AclCounts::default());
        }

        let started = Instant::now();
        let Some(role) = self.computation.roles().find_by_id(id).await? else {
            debug!(role_id = id, "Role no longer exists");
            return Ok(AclCounts::default());
        };

        let role_assignments = self.affected_role_assignments(&role).await?;
        let units = role_assignments.len();

        let tasks: Vec<_> = role_assignments
            .into_iter()
            .map(|role_assignment| {
                let unit = PermissionDiffUnit {
                    acls: Arc::clone(&self.acls),
                    computation: Arc::clone(&self.computation),
                    new_permissions: role.permissions.clone(),
                    role_assignment,
                };
                move || unit.run()
            })
            .collect();

        let counts: AclCounts = self.pool.invoke_all(tasks).await?.into_iter().sum();

        info!(
            role_id = id,
            units,
            created = counts.created,
            deleted = counts.deleted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Role change applied"
        );
        Ok(counts)
    }

    async fn consume_delete_event(&self, id: &str) -> ServiceResult<AclCounts> {
        debug!(role_id = id, "Role delete ignored");
        Ok(AclCounts::default())
    }
}

struct PermissionDiffUnit {
    acls: Arc<dyn AclRepository>,
    computation: Arc<AclComputationService>,
    role_assignment: RoleAssignment,
    new_permissions: HashSet<String>,
}

impl PermissionDiffUnit {
    async fn run(self) -> ServiceResult<AclCounts> {
        let id = self.role_assignment.id.clone();
        self.apply().await.map_err(unit_failed(&id))
    }

    async fn apply(&self) -> ServiceResult<AclCounts> {
        let ra = &self.role_assignment;
        let existing_permissions = self
            .acls
            .get_distinct_permissions_in_acls_for_role_assignment(&ra.id)
            .await?;
        let removed: HashSet<String> = existing_permissions
            .difference(&self.new_permissions)
            .cloned()
            .collect();
        let added: HashSet<String> = self
            .new_permissions
            .difference(&existing_permissions)
            .cloned()
            .collect();

        let existing_principals = self
            .acls
            .get_distinct_principals_in_acls_for_role_assignment(&ra.id)
            .await?;
        let existing_selectors = self.acls.get_distinct_resource_selectors_in_acls(&ra.id).await?;

        let mut counts = AclCounts::default();
        if self.new_permissions.is_empty() {
            counts.deleted += self.acls.delete_by_role_assignment_id(&ra.id).await?;
        } else {
            // Implicit rows carry role permissions too and go with them
            counts.deleted += self
                .acls
                .delete_by_role_assignment_id_and_permissions(&ra.id, &removed)
                .await?;
        }

        if added.is_empty() {
            return Ok(counts);
        }

        let to_create = if existing_principals.is_empty() || existing_selectors.is_empty() {
            self.computation.get_acls_for_role_assignment(ra).await?
        } else {
            explicit_cross_product(ra, &added, &existing_principals, &existing_selectors)
        };
        counts.created += self.acls.insert_all_ignoring_duplicates(&to_create).await?;

        let principals = self.computation.resolve_principals(ra).await?;
        let implicit = self
            .computation
            .get_implicit_acls(ra, &principals, &HashSet::new(), &added)
            .await?;
        counts.created += self.acls.insert_all_ignoring_duplicates(&implicit).await?;

        Ok(counts)
    }
}
