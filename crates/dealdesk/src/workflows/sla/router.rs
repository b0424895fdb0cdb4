use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;

use super::scheduler::{Scheduler, SchedulerStatus};
use super::sweeps::{SweepJob, SweepReport};
use crate::workflows::common::{Principal, Role};
use crate::workflows::error::DomainError;

const OPERATORS: [Role; 2] = [Role::OpsManager, Role::System];

#[derive(Debug, Serialize)]
pub struct CronRunResponse {
    pub success: bool,
    pub reports: Vec<SweepReport>,
}

pub fn cron_router(scheduler: Arc<Scheduler>) -> Router {
    Router::new()
        .route("/cron/run/:job", post(run_handler))
        .route("/cron/status", get(status_handler))
        .with_state(scheduler)
}

/// `job` is a job name or `all`.
async fn run_handler(
    State(scheduler): State<Arc<Scheduler>>,
    Extension(principal): Extension<Principal>,
    Path(job): Path<String>,
) -> Result<Json<CronRunResponse>, DomainError> {
    principal.require(&OPERATORS, "run scheduled jobs")?;
    let reports = if job == "all" {
        scheduler.run_all_now()
    } else {
        let job = job
            .parse::<SweepJob>()
            .map_err(|err| DomainError::not_found("job", &err.0))?;
        vec![scheduler.run_now(job)]
    };
    Ok(Json(CronRunResponse {
        success: reports.iter().all(SweepReport::is_clean),
        reports,
    }))
}

async fn status_handler(
    State(scheduler): State<Arc<Scheduler>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<SchedulerStatus>, DomainError> {
    principal.require(&OPERATORS, "view scheduler status")?;
    Ok(Json(scheduler.status()))
}
