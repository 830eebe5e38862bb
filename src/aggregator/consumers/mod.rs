//! Change consumers: one per source entity type, each turning a change
//! notification into inserts and deletes against the ACL store.

mod resource_group;
mod role;
mod role_assignment;
mod user_group;

pub use resource_group::ResourceGroupChangeConsumer;
pub use role::RoleChangeConsumer;
pub use role_assignment::RoleAssignmentChangeConsumer;
pub use user_group::UserGroupChangeConsumer;

use async_trait::async_trait;

use crate::aggregator::services::ServiceResult;
use crate::aggregator::types::AclCounts;
use crate::errors::AggregatorError;

#[async_trait]
pub trait ChangeConsumer: Send + Sync {
    /// Full document carried by create events.
    type Created: Send + 'static;
    /// Partial document carried by update events; only changed fields are set.
    type Updated: Send + 'static;

    async fn consume_create_event(&self, id: &str, created: Self::Created)
        -> ServiceResult<AclCounts>;

    async fn consume_update_event(&self, id: &str, updated: Self::Updated)
        -> ServiceResult<AclCounts>;

    async fn consume_delete_event(&self, id: &str) -> ServiceResult<AclCounts>;
}

/// Tag a unit failure with the assignment it was processing.
pub(crate) fn unit_failed(role_assignment_id: &str) -> impl FnOnce(AggregatorError) -> AggregatorError + '_ {
    move |source| AggregatorError::UnitFailed {
        role_assignment_id: role_assignment_id.to_string(),
        source: Box::new(source),
    }
}
