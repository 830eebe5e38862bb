pub mod acl;
pub mod job_execution;
pub mod resource_group;
pub mod role;
pub mod role_assignment;
pub mod user_group;

pub use acl::Entity as Acl;
pub use job_execution::Entity as JobExecution;
pub use resource_group::Entity as ResourceGroup;
pub use role::Entity as Role;
pub use role_assignment::Entity as RoleAssignment;
pub use user_group::Entity as UserGroup;
