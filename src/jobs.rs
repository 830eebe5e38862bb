use crate::aggregator::Aggregator;
use crate::entities;
use crate::errors::AggregatorError;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

pub const RECONCILE_ACLS: &str = "reconcile_acls";

/// Initialize and start the scheduler running full reconciliation on `schedule`
pub async fn init_scheduler(
    db: DatabaseConnection,
    aggregator: Arc<Aggregator>,
    schedule: &str,
) -> Result<JobScheduler, AggregatorError> {
    let sched = JobScheduler::new()
        .await
        .map_err(|e| AggregatorError::Scheduler(format!("Failed to create job scheduler: {}", e)))?;

    let reconcile_job = Job::new_async(schedule, move |_uuid, _l| {
        let db = db.clone();
        let aggregator = Arc::clone(&aggregator);
        Box::pin(async move {
            info!("Running {} job", RECONCILE_ACLS);
            // Failures are recorded on the execution row; the next tick retries
            let _ = run_recorded(&db, &aggregator, RECONCILE_ACLS).await;
        })
    })
    .map_err(|e| {
        AggregatorError::Scheduler(format!(
            "Failed to create reconcile job with schedule '{}': {}",
            schedule, e
        ))
    })?;

    sched
        .add(reconcile_job)
        .await
        .map_err(|e| AggregatorError::Scheduler(format!("Failed to add reconcile job: {}", e)))?;

    sched
        .start()
        .await
        .map_err(|e| AggregatorError::Scheduler(format!("Failed to start job scheduler: {}", e)))?;

    info!(schedule, "Job scheduler started");

    Ok(sched)
}

/// Run a job once, recording the execution. Returns the number of ACL rows
/// the job created or deleted.
async fn run_recorded(
    db: &DatabaseConnection,
    aggregator: &Aggregator,
    job_name: &str,
) -> Result<u64, AggregatorError> {
    let execution_id = start_job_execution(db, job_name).await?;

    let result = match job_name {
        RECONCILE_ACLS => aggregator
            .reconciler()
            .reconcile_all()
            .await
            .map(|report| report.counts.total()),
        _ => Err(AggregatorError::Other(format!("Unknown job name: {}", job_name))),
    };

    match &result {
        Ok(count) => {
            info!("Job {} completed: {} records", job_name, count);
            complete_job_execution(db, execution_id, true, None, Some(*count as i64)).await?;
        }
        Err(e) => {
            error!("Job {} failed: {}", job_name, e);
            complete_job_execution(db, execution_id, false, Some(e.to_string()), None).await?;
        }
    }

    result
}

/// Record the start of a job execution
pub async fn start_job_execution(
    db: &DatabaseConnection,
    job_name: &str,
) -> Result<i64, AggregatorError> {
    use entities::job_execution;

    let now = Utc::now().timestamp();

    let execution = job_execution::ActiveModel {
        job_name: Set(job_name.to_string()),
        started_at: Set(now),
        completed_at: Set(None),
        success: Set(None),
        error_message: Set(None),
        records_processed: Set(None),
        ..Default::default()
    };

    let result = execution.insert(db).await?;
    Ok(result.id)
}

/// Record the completion of a job execution
pub async fn complete_job_execution(
    db: &DatabaseConnection,
    execution_id: i64,
    success: bool,
    error_message: Option<String>,
    records_processed: Option<i64>,
) -> Result<(), AggregatorError> {
    use entities::job_execution::{Column, Entity};

    let now = Utc::now().timestamp();

    if let Some(execution) = Entity::find()
        .filter(Column::Id.eq(execution_id))
        .one(db)
        .await?
    {
        let mut active: entities::job_execution::ActiveModel = execution.into_active_model();
        active.completed_at = Set(Some(now));
        active.success = Set(Some(if success { 1 } else { 0 }));
        active.error_message = Set(error_message);
        active.records_processed = Set(records_processed);
        active.update(db).await?;
    }

    Ok(())
}

/// Most recent executions of a job, newest first
pub async fn recent_job_executions(
    db: &DatabaseConnection,
    job_name: &str,
) -> Result<Vec<entities::job_execution::Model>, AggregatorError> {
    use entities::job_execution::{Column, Entity};

    Ok(Entity::find()
        .filter(Column::JobName.eq(job_name))
        .order_by_desc(Column::Id)
        .all(db)
        .await?)
}

/// Manually trigger a job by name (used by the `reconcile` command)
pub async fn trigger_job_manually(
    db: &DatabaseConnection,
    aggregator: &Aggregator,
    job_name: &str,
) -> Result<u64, AggregatorError> {
    info!("Manually triggering job: {}", job_name);
    if job_name != RECONCILE_ACLS {
        return Err(AggregatorError::Other(format!("Unknown job name: {}", job_name)));
    }
    run_recorded(db, aggregator, job_name).await
}
