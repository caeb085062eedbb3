use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::{
    domain::jobs::{JobStatus, JobType},
    error::{AppError, AppResult},
    infrastructure::repositories::{JobRepository, MetricRepository, MetricsSummary},
};

const DEFAULT_REPLAY_LIMIT: i64 = 50;
const MAX_REPLAY_LIMIT: i64 = 500;
const DEFAULT_METRICS_WINDOW_MINUTES: i64 = 60;

#[derive(Debug, Deserialize)]
pub struct ReplayRequest {
    pub reason: String,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    #[serde(default)]
    pub window_minutes: Option<i64>,
}

pub struct AdminController {
    job_repo: Arc<JobRepository>,
    metric_repo: Arc<MetricRepository>,
}

impl AdminController {
    pub fn new(job_repo: Arc<JobRepository>, metric_repo: Arc<MetricRepository>) -> Self {
        Self {
            job_repo,
            metric_repo,
        }
    }

    /// GET /admin/jobs/stats - Queue depth per job type and status
    pub async fn job_stats(
        State(controller): State<Arc<AdminController>>,
    ) -> AppResult<Json<serde_json::Value>> {
        let mut stats = serde_json::Map::new();

        for job_type in [JobType::AudioRequested, JobType::DigestGenerate] {
            let mut per_status = serde_json::Map::new();
            for status in [
                JobStatus::Queued,
                JobStatus::Processing,
                JobStatus::Completed,
                JobStatus::Failed,
                JobStatus::DeadLetter,
            ] {
                let count = controller.job_repo.count_by_status(job_type, status).await?;
                per_status.insert(status.to_string(), json!(count));
            }
            stats.insert(job_type.to_string(), json!(per_status));
        }

        Ok(Json(json!(stats)))
    }

    /// POST /admin/jobs/:jobType/replay - Requeue dead-lettered jobs
    pub async fn replay_jobs(
        State(controller): State<Arc<AdminController>>,
        Path(job_type): Path<String>,
        Json(request): Json<ReplayRequest>,
    ) -> AppResult<Json<serde_json::Value>> {
        let job_type: JobType = job_type
            .parse()
            .map_err(|_| AppError::BadRequest(format!("Unknown job type: {}", job_type)))?;

        if request.reason.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Replay reason is required".to_string(),
            ));
        }

        let limit = request
            .limit
            .unwrap_or(DEFAULT_REPLAY_LIMIT)
            .clamp(1, MAX_REPLAY_LIMIT);

        let replayed = controller
            .job_repo
            .replay(job_type, limit, request.reason.trim())
            .await?;

        Ok(Json(json!({
            "job_type": job_type.to_string(),
            "replayed": replayed,
        })))
    }

    /// GET /admin/metrics/summary - Synthesis metrics over a recent window
    pub async fn metrics_summary(
        State(controller): State<Arc<AdminController>>,
        Query(query): Query<MetricsQuery>,
    ) -> AppResult<Json<MetricsSummary>> {
        let window = query
            .window_minutes
            .unwrap_or(DEFAULT_METRICS_WINDOW_MINUTES)
            .clamp(1, 24 * 60);

        let summary = controller.metric_repo.summarize(window).await?;
        Ok(Json(summary))
    }
}
