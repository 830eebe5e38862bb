use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::aggregator::consumers::{
    ChangeConsumer, ResourceGroupChangeConsumer, RoleAssignmentChangeConsumer,
    RoleChangeConsumer, UserGroupChangeConsumer,
};
use crate::aggregator::services::ServiceResult;
use crate::aggregator::types::{
    AclCounts, ResourceGroup, ResourceGroupUpdate, Role, RoleAssignment, RoleAssignmentUpdate,
    RoleUpdate, UserGroup, UserGroupUpdate,
};
use crate::settings;

const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// One notification from the change feed.
///
/// JSON form: `{"entity": "role_assignment", "op": "update", "id": "...", "document": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum ChangeEvent {
    RoleAssignment(ChangeOperation<RoleAssignment, RoleAssignmentUpdate>),
    ResourceGroup(ChangeOperation<ResourceGroup, ResourceGroupUpdate>),
    Role(ChangeOperation<Role, RoleUpdate>),
    UserGroup(ChangeOperation<UserGroup, UserGroupUpdate>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChangeOperation<C, U> {
    Create { id: String, document: C },
    Update { id: String, document: U },
    Delete { id: String },
}

impl<C, U> ChangeOperation<C, U> {
    pub fn id(&self) -> &str {
        match self {
            ChangeOperation::Create { id, .. }
            | ChangeOperation::Update { id, .. }
            | ChangeOperation::Delete { id } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChangeOperation::Create { .. } => "create",
            ChangeOperation::Update { .. } => "update",
            ChangeOperation::Delete { .. } => "delete",
        }
    }
}

impl ChangeEvent {
    pub fn entity(&self) -> &'static str {
        match self {
            ChangeEvent::RoleAssignment(_) => "role_assignment",
            ChangeEvent::ResourceGroup(_) => "resource_group",
            ChangeEvent::Role(_) => "role",
            ChangeEvent::UserGroup(_) => "user_group",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ChangeEvent::RoleAssignment(op) => op.id(),
            ChangeEvent::ResourceGroup(op) => op.id(),
            ChangeEvent::Role(op) => op.id(),
            ChangeEvent::UserGroup(op) => op.id(),
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            ChangeEvent::RoleAssignment(op) => op.kind(),
            ChangeEvent::ResourceGroup(op) => op.kind(),
            ChangeEvent::Role(op) => op.kind(),
            ChangeEvent::UserGroup(op) => op.kind(),
        }
    }
}

async fn deliver<T>(
    consumer: &T,
    operation: &ChangeOperation<T::Created, T::Updated>,
) -> ServiceResult<AclCounts>
where
    T: ChangeConsumer,
    T::Created: Clone,
    T::Updated: Clone,
{
    match operation {
        ChangeOperation::Create { id, document } => {
            consumer.consume_create_event(id, document.clone()).await
        }
        ChangeOperation::Update { id, document } => {
            consumer.consume_update_event(id, document.clone()).await
        }
        ChangeOperation::Delete { id } => consumer.consume_delete_event(id).await,
    }
}

/// Routes change events to their consumers with at-least-once retries.
pub struct ChangeFeedDriver {
    role_assignments: RoleAssignmentChangeConsumer,
    resource_groups: ResourceGroupChangeConsumer,
    roles: RoleChangeConsumer,
    user_groups: UserGroupChangeConsumer,
    max_delivery_attempts: u32,
    slow_event_threshold: Duration,
}

impl ChangeFeedDriver {
    pub fn new(
        role_assignments: RoleAssignmentChangeConsumer,
        resource_groups: ResourceGroupChangeConsumer,
        roles: RoleChangeConsumer,
        user_groups: UserGroupChangeConsumer,
        cfg: &settings::Aggregator,
    ) -> Self {
        Self {
            role_assignments,
            resource_groups,
            roles,
            user_groups,
            max_delivery_attempts: cfg.max_delivery_attempts.max(1),
            slow_event_threshold: Duration::from_millis(cfg.slow_event_threshold_ms),
        }
    }

    /// Hand one event to its consumer, once.
    pub async fn dispatch(&self, event: &ChangeEvent) -> ServiceResult<AclCounts> {
        match event {
            ChangeEvent::RoleAssignment(op) => deliver(&self.role_assignments, op).await,
            ChangeEvent::ResourceGroup(op) => deliver(&self.resource_groups, op).await,
            ChangeEvent::Role(op) => deliver(&self.roles, op).await,
            ChangeEvent::UserGroup(op) => deliver(&self.user_groups, op).await,
        }
    }

    /// Dispatch with retries. Every consumer is idempotent, so a redelivery
    /// after partial progress converges to the same rows.
    pub async fn process(&self, event: &ChangeEvent) -> ServiceResult<AclCounts> {
        let started = Instant::now();
        let mut attempt = 1;
        let counts = loop {
            match self.dispatch(event).await {
                Ok(counts) => break counts,
                Err(e) if attempt < self.max_delivery_attempts && e.is_retryable() => {
                    error!(
                        entity = event.entity(),
                        id = event.id(),
                        attempt,
                        error = %e,
                        "Change event failed, retrying"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        entity = event.entity(),
                        id = event.id(),
                        attempt,
                        error = %e,
                        "Change event failed"
                    );
                    return Err(e);
                }
            }
        };

        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        if elapsed > self.slow_event_threshold {
            warn!(
                entity = event.entity(),
                op = event.op(),
                id = event.id(),
                created = counts.created,
                deleted = counts.deleted,
                elapsed_ms,
                "Slow change event"
            );
        } else if counts.total() == 0 {
            debug!(
                entity = event.entity(),
                op = event.op(),
                id = event.id(),
                elapsed_ms,
                "Change event processed without ACL changes"
            );
        } else {
            info!(
                entity = event.entity(),
                op = event.op(),
                id = event.id(),
                created = counts.created,
                deleted = counts.deleted,
                elapsed_ms,
                "Change event processed"
            );
        }
        Ok(counts)
    }

    /// Consume the feed until the sender side closes. Stops at the first
    /// event that still fails after all delivery attempts.
    pub async fn run(&self, mut events: mpsc::Receiver<ChangeEvent>) -> ServiceResult<u64> {
        let mut processed = 0u64;
        while let Some(event) = events.recv().await {
            self.process(&event).await?;
            processed += 1;
        }
        info!(processed, "Change feed drained");
        Ok(processed)
    }

    /// Release the consumers' worker pools.
    pub fn shutdown(&self) {
        for pool in [
            self.resource_groups.pool(),
            self.roles.pool(),
            self.user_groups.pool(),
        ] {
            pool.close();
        }
        debug!("Change feed driver shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.resource_groups.pool().is_closed()
    }
}
