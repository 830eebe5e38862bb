use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AggregatorError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(acl_aggregator::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(acl_aggregator::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(acl_aggregator::serde))]
    Serde(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    #[diagnostic(code(acl_aggregator::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("Malformed scope identifier `{identifier}`: {reason}")]
    #[diagnostic(
        code(acl_aggregator::scope),
        help("Scope identifiers look like /ACCOUNT/<id>/ORGANIZATION/<id>/PROJECT/<id>")
    )]
    MalformedScope { identifier: String, reason: String },

    #[error("Unknown principal type `{0}`")]
    #[diagnostic(code(acl_aggregator::principal_type))]
    UnknownPrincipalType(String),

    #[error("Failed to recompute ACLs for role assignment `{role_assignment_id}`")]
    #[diagnostic(code(acl_aggregator::unit_failed))]
    UnitFailed {
        role_assignment_id: String,
        #[source]
        source: Box<AggregatorError>,
    },

    #[error("Worker task did not complete: {0}")]
    #[diagnostic(code(acl_aggregator::interrupted))]
    Interrupted(String),

    #[error("Worker pool `{0}` is shut down")]
    #[diagnostic(code(acl_aggregator::pool_closed))]
    PoolClosed(String),

    #[error("Scheduler error: {0}")]
    #[diagnostic(code(acl_aggregator::scheduler))]
    Scheduler(String),

    #[error("{0}")]
    #[diagnostic(code(acl_aggregator::other))]
    Other(String),
}

impl AggregatorError {
    /// Whether delivering the same event again can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AggregatorError::MalformedScope { .. }
            | AggregatorError::UnknownPrincipalType(_)
            | AggregatorError::Serde(_)
            | AggregatorError::Interrupted(_)
            | AggregatorError::PoolClosed(_) => false,
            AggregatorError::UnitFailed { source, .. } => source.is_retryable(),
            _ => true,
        }
    }

    pub(crate) fn malformed_scope(identifier: &str, reason: impl Into<String>) -> Self {
        AggregatorError::MalformedScope {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }
}
