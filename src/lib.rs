//! ACL aggregator
//!
//! Materializes a flat, query-optimized ACL table from role assignments,
//! roles, user groups and resource groups, and keeps it consistent as those
//! sources change. It exposes all modules for testing purposes.

pub mod aggregator;
pub mod entities;
pub mod errors;
pub mod jobs;
pub mod scope;
pub mod settings;
pub mod source_sync;
pub mod storage;
