//! Account / organization / project scope hierarchy.
//!
//! A scope identifier is a path of `LEVEL/id` pairs, e.g.
//! `/ACCOUNT/acc1/ORGANIZATION/org1/PROJECT/proj1`. Parsing yields an
//! immutable chain of [`Scope`] nodes linked toward the root.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::AggregatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeLevel {
    Account,
    Organization,
    Project,
}

impl ScopeLevel {
    /// Depth of the level in the hierarchy; the account root is 0.
    pub fn rank(self) -> usize {
        match self {
            ScopeLevel::Account => 0,
            ScopeLevel::Organization => 1,
            ScopeLevel::Project => 2,
        }
    }

    /// Path segment used in scope identifiers.
    pub fn path_key(self) -> &'static str {
        match self {
            ScopeLevel::Account => "ACCOUNT",
            ScopeLevel::Organization => "ORGANIZATION",
            ScopeLevel::Project => "PROJECT",
        }
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_key())
    }
}

impl FromStr for ScopeLevel {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACCOUNT" => Ok(ScopeLevel::Account),
            "ORGANIZATION" | "ORG" => Ok(ScopeLevel::Organization),
            "PROJECT" => Ok(ScopeLevel::Project),
            _ => Err(AggregatorError::malformed_scope(s, "unknown scope level")),
        }
    }
}

/// One node of the scope hierarchy. The parent link always points toward
/// the account root, so a chain can never loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    level: ScopeLevel,
    instance_id: String,
    parent: Option<Arc<Scope>>,
    identifier: String,
}

impl Scope {
    pub fn level(&self) -> ScopeLevel {
        self.level
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn parent(&self) -> Option<&Arc<Scope>> {
        self.parent.as_ref()
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Selector matching every resource that lives directly in this scope.
    pub fn resource_selector(&self) -> String {
        format!("{}/*/*", self.identifier)
    }

    /// Iterates from this scope up to the root, inclusive on both ends.
    pub fn ancestors(self: &Arc<Self>) -> Ancestors {
        Ancestors {
            next: Some(Arc::clone(self)),
        }
    }

    fn child(parent: Option<Arc<Scope>>, level: ScopeLevel, instance_id: &str) -> Arc<Scope> {
        let prefix = parent
            .as_ref()
            .map(|p| p.identifier.clone())
            .unwrap_or_default();
        Arc::new(Scope {
            identifier: format!("{}/{}/{}", prefix, level.path_key(), instance_id),
            level,
            instance_id: instance_id.to_string(),
            parent,
        })
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

pub struct Ancestors {
    next: Option<Arc<Scope>>,
}

impl Iterator for Ancestors {
    type Item = Arc<Scope>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.parent.clone();
        Some(current)
    }
}

/// Parse a scope identifier into its scope chain.
pub fn build_scope_from_identifier(identifier: &str) -> Result<Arc<Scope>, AggregatorError> {
    let trimmed = identifier.trim();
    let path = trimmed
        .strip_prefix('/')
        .ok_or_else(|| AggregatorError::malformed_scope(identifier, "must start with '/'"))?;

    let segments: Vec<&str> = path.split('/').collect();
    if segments.is_empty() || segments.len() % 2 != 0 {
        return Err(AggregatorError::malformed_scope(
            identifier,
            "expected LEVEL/id pairs",
        ));
    }

    let mut current: Option<Arc<Scope>> = None;
    for (depth, pair) in segments.chunks(2).enumerate() {
        let level: ScopeLevel = pair[0]
            .parse()
            .map_err(|_| AggregatorError::malformed_scope(identifier, "unknown scope level"))?;
        if level.rank() != depth {
            return Err(AggregatorError::malformed_scope(
                identifier,
                format!("{level} cannot appear at depth {depth}"),
            ));
        }
        let instance_id = pair[1];
        if instance_id.is_empty() {
            return Err(AggregatorError::malformed_scope(
                identifier,
                format!("missing identifier for {level}"),
            ));
        }
        current = Some(Scope::child(current, level, instance_id));
    }

    current.ok_or_else(|| AggregatorError::malformed_scope(identifier, "empty scope"))
}

/// Walk up from `scope` to the first scope at `level`. Returns `None` when
/// `level` is deeper than `scope`.
pub fn to_parent_scope(scope: &Arc<Scope>, level: ScopeLevel) -> Option<Arc<Scope>> {
    scope.ancestors().find(|s| s.level() == level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_project_scope() {
        let scope =
            build_scope_from_identifier("/ACCOUNT/acc1/ORGANIZATION/org1/PROJECT/proj1").unwrap();
        assert_eq!(scope.level(), ScopeLevel::Project);
        assert_eq!(scope.instance_id(), "proj1");
        assert_eq!(
            scope.to_string(),
            "/ACCOUNT/acc1/ORGANIZATION/org1/PROJECT/proj1"
        );

        let org = scope.parent().unwrap();
        assert_eq!(org.level(), ScopeLevel::Organization);
        assert_eq!(org.identifier(), "/ACCOUNT/acc1/ORGANIZATION/org1");

        let account = org.parent().unwrap();
        assert_eq!(account.identifier(), "/ACCOUNT/acc1");
        assert!(account.parent().is_none());
    }

    #[test]
    fn test_ancestors_walk_to_root() {
        let scope =
            build_scope_from_identifier("/ACCOUNT/acc1/ORGANIZATION/org1/PROJECT/proj1").unwrap();
        let levels: Vec<ScopeLevel> = scope.ancestors().map(|s| s.level()).collect();
        assert_eq!(
            levels,
            vec![
                ScopeLevel::Project,
                ScopeLevel::Organization,
                ScopeLevel::Account
            ]
        );
    }

    #[test]
    fn test_resource_selector() {
        let scope = build_scope_from_identifier("/ACCOUNT/acc1").unwrap();
        assert_eq!(scope.resource_selector(), "/ACCOUNT/acc1/*/*");
    }

    #[test]
    fn test_to_parent_scope() {
        let scope =
            build_scope_from_identifier("/ACCOUNT/acc1/ORGANIZATION/org1/PROJECT/proj1").unwrap();

        let account = to_parent_scope(&scope, ScopeLevel::Account).unwrap();
        assert_eq!(account.identifier(), "/ACCOUNT/acc1");

        let same = to_parent_scope(&scope, ScopeLevel::Project).unwrap();
        assert_eq!(same.identifier(), scope.identifier());

        let org = build_scope_from_identifier("/ACCOUNT/acc1/ORGANIZATION/org1").unwrap();
        assert!(to_parent_scope(&org, ScopeLevel::Project).is_none());
    }

    #[test]
    fn test_malformed_scopes() {
        for bad in [
            "",
            "ACCOUNT/acc1",
            "/ACCOUNT",
            "/ACCOUNT/",
            "/ORGANIZATION/org1",
            "/ACCOUNT/acc1/PROJECT/proj1",
            "/ACCOUNT/acc1/GALAXY/g1",
        ] {
            let err = build_scope_from_identifier(bad).unwrap_err();
            assert!(
                matches!(err, AggregatorError::MalformedScope { .. }),
                "expected malformed scope for {bad:?}"
            );
        }
    }

    #[test]
    fn test_scope_level_parse() {
        assert_eq!("account".parse::<ScopeLevel>().unwrap(), ScopeLevel::Account);
        assert_eq!("ORG".parse::<ScopeLevel>().unwrap(), ScopeLevel::Organization);
        assert_eq!("Project".parse::<ScopeLevel>().unwrap(), ScopeLevel::Project);
        assert!("team".parse::<ScopeLevel>().is_err());
    }
}
