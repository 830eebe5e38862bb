use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{unit_failed, ChangeConsumer};
use crate::aggregator::compute::{explicit_cross_product, AclComputationService};
use crate::aggregator::pool::WorkerPool;
use crate::aggregator::services::{AclRepository, RoleAssignmentRepository, ServiceResult};
use crate::aggregator::types::{
    AclCounts, ResourceGroup, ResourceGroupUpdate, ResourceSelector, RoleAssignment,
};

/// Applies resource group selector changes to every assignment using the
/// group, diffing selectors instead of recomputing whole assignments.
pub struct ResourceGroupChangeConsumer {
    acls: Arc<dyn AclRepository>,
    role_assignments: Arc<dyn RoleAssignmentRepository>,
    computation: Arc<AclComputationService>,
    pool: WorkerPool,
}

impl ResourceGroupChangeConsumer {
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

    /// Enabled assignments that resolve this group from their own scope.
    async fn affected_role_assignments(
        &self,
        group: &ResourceGroup,
    ) -> ServiceResult<Vec<RoleAssignment>> {
        let candidates = self
            .role_assignments
            .find_enabled_by_resource_group(&group.identifier, group.scope_identifier.as_deref())
            .await?;

        let mut affected = Vec::with_capacity(candidates.len());
        for role_assignment in candidates {
            // A managed group can be shadowed by a scoped group of the same name
            let resolved = self
                .computation
                .resource_group_of(&role_assignment)
                .await?;
            if resolved.is_some_and(|g| g.id == group.id) {
                affected.push(role_assignment);
            }
        }
        Ok(affected)
    }
}

#[async_trait]
impl ChangeConsumer for ResourceGroupChangeConsumer {
    type Created = ResourceGroup;
    type Updated = ResourceGroupUpdate;

    /// Assignments may already resolve to a new group, either because their
    /// own events arrived first or because a scoped group now shadows a
    /// managed one. Both are handled as a change of every selector.
    async fn consume_create_event(
        &self,
        id: &str,
        created: ResourceGroup,
    ) -> ServiceResult<AclCounts> {
        debug!(
            resource_group_id = id,
            scoped = created.scope_identifier.is_some(),
            "Resource group created"
        );
        self.consume_update_event(
            id,
            ResourceGroupUpdate {
                resource_selectors: Some(created.resource_selectors),
                resource_selectors_v2: Some(created.resource_selectors_v2),
                scope_selectors: Some(created.scope_selectors),
            },
        )
        .await
    }

    async fn consume_update_event(
        &self,
        id: &str,
        updated: ResourceGroupUpdate,
    ) -> ServiceResult<AclCounts> {
        if !updated.affects_acls() {
            debug!(resource_group_id = id, "Update does not touch selectors");
            return Ok(AclCounts::default());
        }

        let started = Instant::now();
        let Some(group) = self.computation.resource_groups().find_by_id(id).await? else {
            debug!(resource_group_id = id, "Resource group no longer exists");
            return Ok(AclCounts::default());
        };

        let role_assignments = self.affected_role_assignments(&group).await?;
        let units = role_assignments.len();
        let recompute_scope = updated.scope_selectors_changed();

        let tasks: Vec<_> = role_assignments
            .into_iter()
            .map(|role_assignment| {
                let unit = SelectorDiffUnit {
                    acls: Arc::clone(&self.acls),
                    computation: Arc::clone(&self.computation),
                    new_selectors: group.all_resource_selectors(),
                    recompute_scope,
                    role_assignment,
                };
                move || unit.run()
            })
            .collect();

        let counts: AclCounts = self.pool.invoke_all(tasks).await?.into_iter().sum();

        info!(
            resource_group_id = id,
            units,
            created = counts.created,
            deleted = counts.deleted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Resource group change applied"
        );
        Ok(counts)
    }

    async fn consume_delete_event(&self, id: &str) -> ServiceResult<AclCounts> {
        // Referencing assignments are deleted separately and take their rows with them
        debug!(resource_group_id = id, "Resource group delete ignored");
        Ok(AclCounts::default())
    }
}

/// Reprocesses one assignment after its resource group's selectors changed.
struct SelectorDiffUnit {
    acls: Arc<dyn AclRepository>,
    computation: Arc<AclComputationService>,
    role_assignment: RoleAssignment,
    new_selectors: HashSet<ResourceSelector>,
    recompute_scope: bool,
}

impl SelectorDiffUnit {
    async fn run(self) -> ServiceResult<AclCounts> {
        let id = self.role_assignment.id.clone();
        self.apply().await.map_err(unit_failed(&id))
    }

    async fn apply(&self) -> ServiceResult<AclCounts> {
        let ra = &self.role_assignment;
        let existing_selectors = self.acls.get_distinct_resource_selectors_in_acls(&ra.id).await?;
        let removed: HashSet<ResourceSelector> = existing_selectors
            .difference(&self.new_selectors)
            .cloned()
            .collect();
        let added: HashSet<ResourceSelector> = self
            .new_selectors
            .difference(&existing_selectors)
            .cloned()
            .collect();

        let existing_permissions = self
            .acls
            .get_distinct_permissions_in_acls_for_role_assignment(&ra.id)
            .await?;
        let existing_principals = self
            .acls
            .get_distinct_principals_in_acls_for_role_assignment(&ra.id)
            .await?;

        let mut counts = AclCounts::default();
        if self.new_selectors.is_empty() {
            counts.deleted += self.acls.delete_by_role_assignment_id(&ra.id).await?;
        } else {
            counts.deleted += self
                .acls
                .delete_by_role_assignment_id_and_resource_selectors(&ra.id, &removed)
                .await?;
        }

        let to_create = if existing_permissions.is_empty() || existing_principals.is_empty() {
            self.computation.get_acls_for_role_assignment(ra).await?
        } else {
            explicit_cross_product(ra, &existing_permissions, &existing_principals, &added)
        };
        counts.created += self.acls.insert_all_ignoring_duplicates(&to_create).await?;

        // Implicit grants exist only while the group selects something, so a
        // group going from empty to non-empty needs them rebuilt as well
        let regained_selectors = existing_selectors.is_empty() && !self.new_selectors.is_empty();
        if self.recompute_scope || regained_selectors {
            counts.deleted += self
                .acls
                .delete_by_role_assignment_id_and_implicit_for_scope(&ra.id)
                .await?;
            let principals = self.computation.resolve_principals(ra).await?;
            let implicit = self
                .computation
                .get_implicit_acls(ra, &principals, &HashSet::new(), &HashSet::new())
                .await?;
            counts.created += self.acls.insert_all_ignoring_duplicates(&implicit).await?;
        }

        debug!(
            role_assignment_id = %ra.id,
            created = counts.created,
            deleted = counts.deleted,
            "Resource group unit finished"
        );
        Ok(counts)
    }
}
