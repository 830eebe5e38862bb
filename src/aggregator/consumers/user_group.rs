use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{unit_failed, ChangeConsumer};
use crate::aggregator::compute::{
    explicit_cross_product, principal_scope_identifier, AclComputationService,
};
use crate::aggregator::pool::WorkerPool;
use crate::aggregator::services::{AclRepository, RoleAssignmentRepository, ServiceResult};
use crate::aggregator::types::{AclCounts, RoleAssignment, UserGroup, UserGroupUpdate};

/// Applies membership changes to every assignment granted to the group.
pub struct UserGroupChangeConsumer {
    acls: Arc<dyn AclRepository>,
    role_assignments: Arc<dyn RoleAssignmentRepository>,
    computation: Arc<AclComputationService>,
    pool: WorkerPool,
}

impl UserGroupChangeConsumer {
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

    /// Group assignments whose principal resolves to this group's scope.
    async fn affected_role_assignments(
        &self,
        group: &UserGroup,
    ) -> ServiceResult<Vec<RoleAssignment>> {
        let candidates = self
            .role_assignments
            .find_enabled_by_user_group(&group.identifier)
            .await?;

        let mut affected = Vec::with_capacity(candidates.len());
        for role_assignment in candidates {
            if principal_scope_identifier(&role_assignment)? == group.scope_identifier {
                affected.push(role_assignment);
            }
        }
        Ok(affected)
    }
}

#[async_trait]
impl ChangeConsumer for UserGroupChangeConsumer {
    type Created = UserGroup;
    type Updated = UserGroupUpdate;

    async fn consume_create_event(&self, id: &str, created: UserGroup) -> ServiceResult<AclCounts> {
        debug!(user_group_id = id, "User group created");
        self.consume_update_event(
            id,
            UserGroupUpdate {
                users: Some(created.users),
            },
        )
        .await
    }

    async fn consume_update_event(
        &self,
        id: &str,
        updated: UserGroupUpdate,
    ) -> ServiceResult<AclCounts> {
        if updated.users.is_none() {
            debug!(user_group_id = id, "Update does not touch members");
            return Ok(AclCounts::default());
        }

        let started = Instant::now();
        let Some(group) = self.computation.user_groups().find_by_id(id).await? else {
            debug!(user_group_id = id, "User group no longer exists");
            return Ok(AclCounts::default());
        };

        let role_assignments = self.affected_role_assignments(&group).await?;
        let units = role_assignments.len();

        let tasks: Vec<_> = role_assignments
            .into_iter()
            .map(|role_assignment| {
                let unit = MembershipDiffUnit {
                    acls: Arc::clone(&self.acls),
                    computation: Arc::clone(&self.computation),
                    new_principals: group.users.clone(),
                    role_assignment,
                };
                move || unit.run()
            })
            .collect();

        let counts: AclCounts = self.pool.invoke_all(tasks).await?.into_iter().sum();

        info!(
            user_group_id = id,
            units,
            created = counts.created,
            deleted = counts.deleted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "User group change applied"
        );
        Ok(counts)
    }

    async fn consume_delete_event(&self, id: &str) -> ServiceResult<AclCounts> {
        debug!(user_group_id = id, "User group delete ignored");
        Ok(AclCounts::default())
    }
}

struct MembershipDiffUnit {
    acls: Arc<dyn AclRepository>,
    computation: Arc<AclComputationService>,
    role_assignment: RoleAssignment,
    new_principals: HashSet<String>,
}

impl MembershipDiffUnit {
    async fn run(self) -> ServiceResult<AclCounts> {
        let id = self.role_assignment.id.clone();
        self.apply().await.map_err(unit_failed(&id))
    }

    async fn apply(&self) -> ServiceResult<AclCounts> {
        let ra = &self.role_assignment;
        let existing_principals = self
            .acls
            .get_distinct_principals_in_acls_for_role_assignment(&ra.id)
            .await?;
        let removed: HashSet<String> = existing_principals
            .difference(&self.new_principals)
            .cloned()
            .collect();
        let added: HashSet<String> = self
            .new_principals
            .difference(&existing_principals)
            .cloned()
            .collect();

        let existing_permissions = self
            .acls
            .get_distinct_permissions_in_acls_for_role_assignment(&ra.id)
            .await?;
        let existing_selectors = self.acls.get_distinct_resource_selectors_in_acls(&ra.id).await?;

        let mut counts = AclCounts::default();
        if self.new_principals.is_empty() {
            counts.deleted += self.acls.delete_by_role_assignment_id(&ra.id).await?;
        } else {
            counts.deleted += self
                .acls
                .delete_by_role_assignment_id_and_principals(&ra.id, &removed)
                .await?;
        }

        if added.is_empty() {
            return Ok(counts);
        }

        let to_create = if existing_permissions.is_empty() || existing_selectors.is_empty() {
            self.computation.get_acls_for_role_assignment(ra).await?
        } else {
            explicit_cross_product(ra, &existing_permissions, &added, &existing_selectors)
        };
        counts.created += self.acls.insert_all_ignoring_duplicates(&to_create).await?;

        let implicit = self
            .computation
            .get_implicit_acls(ra, &self.new_principals, &added, &HashSet::new())
            .await?;
        counts.created += self.acls.insert_all_ignoring_duplicates(&implicit).await?;

        Ok(counts)
    }
}
