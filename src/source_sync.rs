use crate::aggregator::types::{ResourceGroup, Role, RoleAssignment, UserGroup};
use crate::storage::{self, UpsertOutcome};
use miette::{IntoDiagnostic, Result};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::fs;

/// Root structure of the sources JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesFile {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub user_groups: Vec<UserGroup>,
    #[serde(default)]
    pub resource_groups: Vec<ResourceGroup>,
    #[serde(default)]
    pub role_assignments: Vec<RoleAssignment>,
}

impl SourcesFile {
    pub fn len(&self) -> usize {
        self.roles.len()
            + self.user_groups.len()
            + self.resource_groups.len()
            + self.role_assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl SyncSummary {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Sync source entities from a JSON file to the database (idempotent)
pub async fn sync_sources_from_file(db: &DatabaseConnection, file_path: &str) -> Result<SyncSummary> {
    tracing::info!("Loading sources from {}", file_path);

    let content = fs::read_to_string(file_path)
        .into_diagnostic()
        .map_err(|e| miette::miette!("Failed to read sources file at '{}': {}", file_path, e))?;

    let sources: SourcesFile = serde_json::from_str(&content)
        .into_diagnostic()
        .map_err(|e| {
            miette::miette!(
                "Failed to parse sources JSON file: {}\n\nExpected format:\n{{\n  \"roles\": [{{\"id\": \"role-1\", \"identifier\": \"viewer\", \"permissions\": [\"core_project_view\"]}}],\n  \"user_groups\": [],\n  \"resource_groups\": [],\n  \"role_assignments\": []\n}}",
                e
            )
        })?;

    tracing::info!("Found {} source entities in file", sources.len());

    let summary = sync_sources(db, &sources).await?;

    tracing::info!(
        "Source sync complete: {} created, {} updated, {} unchanged",
        summary.created,
        summary.updated,
        summary.unchanged
    );

    Ok(summary)
}

/// Upsert every entity. Assignments go last so the roles, groups and
/// resource groups they reference already exist.
pub async fn sync_sources(db: &DatabaseConnection, sources: &SourcesFile) -> Result<SyncSummary> {
    let mut summary = SyncSummary::default();

    for role in &sources.roles {
        summary.record(storage::upsert_role(db, role).await.into_diagnostic()?);
    }
    for group in &sources.user_groups {
        summary.record(storage::upsert_user_group(db, group).await.into_diagnostic()?);
    }
    for group in &sources.resource_groups {
        summary.record(
            storage::upsert_resource_group(db, group)
                .await
                .into_diagnostic()?,
        );
    }
    for role_assignment in &sources.role_assignments {
        // Reject bad scopes here rather than at event time
        crate::scope::build_scope_from_identifier(&role_assignment.scope_identifier)
            .into_diagnostic()?;
        summary.record(
            storage::upsert_role_assignment(db, role_assignment)
                .await
                .into_diagnostic()?,
        );
    }

    Ok(summary)
}
