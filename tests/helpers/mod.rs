#![allow(dead_code)]

pub mod builders;
pub mod db;
pub mod faulty;

pub use builders::{
    acl_triples, ResourceGroupBuilder, RoleAssignmentBuilder, RoleBuilder, UserGroupBuilder,
};
pub use db::TestDb;
pub use faulty::{FaultyAcls, LateRoleAssignments, RecordingCrudEvents};

pub const ACCOUNT: &str = "/ACCOUNT/acc1";
pub const ORG: &str = "/ACCOUNT/acc1/ORGANIZATION/org1";
pub const PROJECT: &str = "/ACCOUNT/acc1/ORGANIZATION/org1/PROJECT/proj1";
