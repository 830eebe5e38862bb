use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::aggregator::compute::AclComputationService;
use crate::aggregator::consumers::unit_failed;
use crate::aggregator::pool::WorkerPool;
use crate::aggregator::services::{AclRepository, RoleAssignmentRepository, ServiceResult};
use crate::aggregator::types::{Acl, AclCounts, RoleAssignment};

/// Outcome of a full reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub role_assignments: usize,
    pub orphans_purged: usize,
    pub counts: AclCounts,
}

/// Brings the ACL table back in line with the sources by set difference,
/// for when events were lost or the table was edited out of band.
pub struct Reconciler {
    acls: Arc<dyn AclRepository>,
    role_assignments: Arc<dyn RoleAssignmentRepository>,
    computation: Arc<AclComputationService>,
    pool: WorkerPool,
}

impl Reconciler {
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

    /// Insert missing rows and delete stale ones for a single assignment.
    pub async fn reconcile_role_assignment(
        &self,
        role_assignment: &RoleAssignment,
    ) -> ServiceResult<AclCounts> {
        reconcile_one(&*self.acls, &self.computation, role_assignment).await
    }

    pub async fn reconcile_all(&self) -> ServiceResult<ReconcileReport> {
        let started = Instant::now();
        let enabled = self.role_assignments.find_all_enabled().await?;
        let enabled_ids: HashSet<String> = enabled.iter().map(|ra| ra.id.clone()).collect();

        let tasks: Vec<_> = enabled
            .into_iter()
            .map(|role_assignment| {
                let acls = Arc::clone(&self.acls);
                let computation = Arc::clone(&self.computation);
                move || async move {
                    reconcile_one(&*acls, &computation, &role_assignment)
                        .await
                        .map_err(unit_failed(&role_assignment.id))
                }
            })
            .collect();
        let mut counts: AclCounts = self.pool.invoke_all(tasks).await?.into_iter().sum();

        // Rows of deleted or disabled assignments. An id missing from the
        // snapshot may belong to an assignment created since, so it is re-read
        // before anything is purged.
        let mut orphans_purged = 0;
        for id in self.acls.get_distinct_role_assignment_ids().await? {
            if enabled_ids.contains(&id) {
                continue;
            }
            if let Some(current) = self.role_assignments.find_by_id(&id).await? {
                if !current.disabled {
                    debug!(
                        role_assignment_id = %id,
                        "Assignment appeared during reconciliation, keeping rows"
                    );
                    continue;
                }
            }
            counts.deleted += self.acls.delete_by_role_assignment_id(&id).await?;
            orphans_purged += 1;
        }

        let report = ReconcileReport {
            role_assignments: enabled_ids.len(),
            orphans_purged,
            counts,
        };
        info!(
            role_assignments = report.role_assignments,
            orphans_purged = report.orphans_purged,
            created = counts.created,
            deleted = counts.deleted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reconciliation finished"
        );
        Ok(report)
    }
}

async fn reconcile_one(
    acls: &dyn AclRepository,
    computation: &AclComputationService,
    role_assignment: &RoleAssignment,
) -> ServiceResult<AclCounts> {
    let desired = keyed(computation.get_desired_acls(role_assignment).await?);
    let existing = keyed(
        acls.get_acls_for_role_assignment(&role_assignment.id)
            .await?,
    );

    let stale: Vec<Acl> = existing
        .iter()
        .filter(|(id, _)| !desired.contains_key(*id))
        .map(|(_, acl)| acl.clone())
        .collect();
    let missing: Vec<Acl> = desired
        .into_iter()
        .filter(|(id, _)| !existing.contains_key(id))
        .map(|(_, acl)| acl)
        .collect();

    let counts = AclCounts {
        deleted: acls.delete_acls(&stale).await?,
        created: acls.insert_all_ignoring_duplicates(&missing).await?,
    };
    if counts.total() > 0 {
        debug!(
            role_assignment_id = %role_assignment.id,
            created = counts.created,
            deleted = counts.deleted,
            "Role assignment drifted"
        );
    }
    Ok(counts)
}

fn keyed(acls: Vec<Acl>) -> HashMap<String, Acl> {
    acls.into_iter().map(|acl| (acl.row_id(), acl)).collect()
}
