use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use super::ChangeConsumer;
use crate::aggregator::compute::AclComputationService;
use crate::aggregator::services::{
    AclRepository, RoleAssignmentCrudEventHandler, RoleAssignmentRepository, ServiceResult,
};
use crate::aggregator::types::{AclCounts, RoleAssignment, RoleAssignmentUpdate};

/// Recomputes an assignment's rows from scratch on every relevant change.
/// Runs on the calling task.
pub struct RoleAssignmentChangeConsumer {
    acls: Arc<dyn AclRepository>,
    role_assignments: Arc<dyn RoleAssignmentRepository>,
    computation: Arc<AclComputationService>,
    crud_events: Arc<dyn RoleAssignmentCrudEventHandler>,
}

impl RoleAssignmentChangeConsumer {
    pub fn new(
        acls: Arc<dyn AclRepository>,
        role_assignments: Arc<dyn RoleAssignmentRepository>,
        computation: Arc<AclComputationService>,
        crud_events: Arc<dyn RoleAssignmentCrudEventHandler>,
    ) -> Self {
        Self {
            acls,
            role_assignments,
            computation,
            crud_events,
        }
    }

    async fn create_acls(&self, role_assignment: &RoleAssignment) -> ServiceResult<u64> {
        let desired = self.computation.get_desired_acls(role_assignment).await?;
        self.acls.insert_all_ignoring_duplicates(&desired).await
    }
}

#[async_trait]
impl ChangeConsumer for RoleAssignmentChangeConsumer {
    type Created = RoleAssignment;
    type Updated = RoleAssignmentUpdate;

    async fn consume_create_event(
        &self,
        id: &str,
        created: RoleAssignment,
    ) -> ServiceResult<AclCounts> {
        let started = Instant::now();
        // The feed may lag behind a delete; only the stored state counts
        let Some(current) = self
            .role_assignments
            .find_by_identifier_and_scope(&created.identifier, &created.scope_identifier)
            .await?
        else {
            debug!(
                role_assignment_id = id,
                "Role assignment no longer exists, skipping create event"
            );
            return Ok(AclCounts::default());
        };

        self.crud_events.handle_role_assignment_create(&current).await?;
        let created_count = self.create_acls(&current).await?;

        debug!(
            role_assignment_id = id,
            created = created_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Role assignment create processed"
        );
        Ok(AclCounts {
            created: created_count,
            deleted: 0,
        })
    }

    async fn consume_update_event(
        &self,
        id: &str,
        updated: RoleAssignmentUpdate,
    ) -> ServiceResult<AclCounts> {
        if !updated.affects_acls() {
            debug!(role_assignment_id = id, "Update does not affect ACLs");
            return Ok(AclCounts::default());
        }

        let started = Instant::now();
        let deleted = self.acls.delete_by_role_assignment_id(id).await?;
        let created = match self.role_assignments.find_by_id(id).await? {
            Some(current) => self.create_acls(&current).await?,
            None => 0,
        };

        info!(
            role_assignment_id = id,
            created,
            deleted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Role assignment ACLs replaced"
        );
        Ok(AclCounts { created, deleted })
    }

    async fn consume_delete_event(&self, id: &str) -> ServiceResult<AclCounts> {
        let started = Instant::now();
        self.crud_events.handle_role_assignment_delete(id).await?;
        let deleted = self.acls.delete_by_role_assignment_id(id).await?;

        debug!(
            role_assignment_id = id,
            deleted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Role assignment delete processed"
        );
        Ok(AclCounts {
            created: 0,
            deleted,
        })
    }
}
