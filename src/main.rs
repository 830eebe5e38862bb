use std::path::PathBuf;
use std::sync::Arc;

use acl_aggregator::aggregator::{feed, Aggregator, Collaborators};
use acl_aggregator::aggregator::types::PrincipalType;
use acl_aggregator::errors::AggregatorError;
use acl_aggregator::{jobs, settings, source_sync, storage};
use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "acl-aggregator",
    version,
    about = "Materializes ACLs from role assignments, roles and resource groups"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consume a JSON-lines change feed until it ends
    Run {
        /// Feed file, stdin when omitted or `-`
        #[arg(long)]
        feed: Option<PathBuf>,
    },
    /// Run one full reconciliation of the ACL table
    Reconcile,
    /// Upsert source entities from a JSON file, then reconcile
    Seed {
        file: String,
        /// Only write the sources
        #[arg(long)]
        no_reconcile: bool,
    },
    /// Look up a single permission
    Check {
        #[arg(long)]
        scope: String,
        #[arg(long)]
        permission: String,
        #[arg(long)]
        selector: String,
        #[arg(long, default_value = "USER")]
        principal_type: String,
        #[arg(long)]
        principal: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // init storage (database + migrations)
    let db = storage::init(&settings.database).await?;
    let store = Arc::new(storage::SeaOrmStore::new(db.clone()));
    let aggregator = Arc::new(Aggregator::new(Collaborators::from_store(store), &settings));

    let outcome: Result<()> = match cli.command {
        Command::Run { feed } => {
            let scheduler = match settings.aggregator.reconcile_schedule.as_deref() {
                Some(schedule) => {
                    Some(jobs::init_scheduler(db.clone(), Arc::clone(&aggregator), schedule).await?)
                }
                None => None,
            };

            let source = feed::open(feed.as_deref()).await?;
            let (events, reader) = feed::spawn_reader(source, feed::DEFAULT_CAPACITY);

            let result = tokio::select! {
                processed = aggregator.driver().run(events) => processed.map(|n| {
                    tracing::info!(processed = n, "Change feed finished");
                }),
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, shutting down");
                    Ok(())
                }
            };
            reader.abort();

            if let Some(mut scheduler) = scheduler {
                scheduler.shutdown().await.map_err(|e| {
                    AggregatorError::Scheduler(format!("Failed to stop job scheduler: {}", e))
                })?;
            }
            result.map_err(Into::into)
        }
        Command::Reconcile => {
            let records = jobs::trigger_job_manually(&db, &aggregator, jobs::RECONCILE_ACLS).await?;
            println!("Reconciliation changed {records} ACL rows");
            Ok(())
        }
        Command::Seed { file, no_reconcile } => {
            let summary = source_sync::sync_sources_from_file(&db, &file).await?;
            println!(
                "Sources: {} created, {} updated, {} unchanged",
                summary.created, summary.updated, summary.unchanged
            );
            if !no_reconcile {
                let report = aggregator.reconciler().reconcile_all().await?;
                println!(
                    "ACLs: {} created, {} deleted across {} role assignments",
                    report.counts.created, report.counts.deleted, report.role_assignments
                );
            }
            Ok(())
        }
        Command::Check {
            scope,
            permission,
            selector,
            principal_type,
            principal,
        } => {
            let principal_type: PrincipalType = principal_type.parse()?;
            let allowed = storage::has_access(
                &db,
                &scope,
                &permission,
                &selector,
                principal_type,
                &principal,
            )
            .await?;
            println!("{}", if allowed { "ALLOWED" } else { "DENIED" });
            Ok(())
        }
    };

    aggregator.shutdown();
    outcome
}
