//! The ACL aggregator: keeps the materialized `acls` table consistent with
//! role assignments, roles, user groups and resource groups.

pub mod compute;
pub mod consumers;
pub mod driver;
pub mod feed;
pub mod pool;
pub mod reconcile;
pub mod services;
pub mod types;

use std::sync::Arc;

use crate::aggregator::compute::{AclComputationService, ImplicitPermissionTable};
use crate::aggregator::consumers::{
    ResourceGroupChangeConsumer, RoleAssignmentChangeConsumer, RoleChangeConsumer,
    UserGroupChangeConsumer,
};
use crate::aggregator::driver::ChangeFeedDriver;
use crate::aggregator::pool::WorkerPool;
use crate::aggregator::reconcile::Reconciler;
use crate::aggregator::services::{
    AclRepository, LoggingCrudEventHandler, ResourceGroupService, RoleAssignmentCrudEventHandler,
    RoleAssignmentRepository, RoleService, UserGroupService,
};
use crate::settings::Settings;

/// External collaborators the aggregator reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub roles: Arc<dyn RoleService>,
    pub user_groups: Arc<dyn UserGroupService>,
    pub resource_groups: Arc<dyn ResourceGroupService>,
    pub role_assignments: Arc<dyn RoleAssignmentRepository>,
    pub acls: Arc<dyn AclRepository>,
    pub crud_events: Arc<dyn RoleAssignmentCrudEventHandler>,
}

impl Collaborators {
    /// Every collaborator served by one store.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: RoleService
            + UserGroupService
            + ResourceGroupService
            + RoleAssignmentRepository
            + AclRepository
            + 'static,
    {
        Self {
            roles: store.clone(),
            user_groups: store.clone(),
            resource_groups: store.clone(),
            role_assignments: store.clone(),
            acls: store,
            crud_events: Arc::new(LoggingCrudEventHandler),
        }
    }

    pub fn with_crud_events(mut self, handler: Arc<dyn RoleAssignmentCrudEventHandler>) -> Self {
        self.crud_events = handler;
        self
    }
}

/// Fully wired aggregator. Owns the worker pools of its consumers.
pub struct Aggregator {
    computation: Arc<AclComputationService>,
    driver: ChangeFeedDriver,
    reconciler: Reconciler,
}

impl Aggregator {
    pub fn new(parts: Collaborators, settings: &Settings) -> Self {
        let computation = Arc::new(AclComputationService::new(
            parts.roles.clone(),
            parts.user_groups.clone(),
            parts.resource_groups.clone(),
            ImplicitPermissionTable::from_settings(&settings.implicit_permissions),
        ));
        let pool_size = settings.aggregator.pool_size();

        let driver = ChangeFeedDriver::new(
            RoleAssignmentChangeConsumer::new(
                parts.acls.clone(),
                parts.role_assignments.clone(),
                computation.clone(),
                parts.crud_events.clone(),
            ),
            ResourceGroupChangeConsumer::new(
                parts.acls.clone(),
                parts.role_assignments.clone(),
                computation.clone(),
                WorkerPool::new("resource-group-change-consumer", pool_size),
            ),
            RoleChangeConsumer::new(
                parts.acls.clone(),
                parts.role_assignments.clone(),
                computation.clone(),
                WorkerPool::new("role-change-consumer", pool_size),
            ),
            UserGroupChangeConsumer::new(
                parts.acls.clone(),
                parts.role_assignments.clone(),
                computation.clone(),
                WorkerPool::new("user-group-change-consumer", pool_size),
            ),
            &settings.aggregator,
        );

        let reconciler = Reconciler::new(
            parts.acls,
            parts.role_assignments,
            computation.clone(),
            WorkerPool::new("reconciler", pool_size),
        );

        tracing::debug!(pool_size, "Aggregator initialized");
        Self {
            computation,
            driver,
            reconciler,
        }
    }

    pub fn computation(&self) -> &Arc<AclComputationService> {
        &self.computation
    }

    pub fn driver(&self) -> &ChangeFeedDriver {
        &self.driver
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn shutdown(&self) {
        self.driver.shutdown();
        self.reconciler.pool().close();
    }
}
