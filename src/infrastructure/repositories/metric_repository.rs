use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

pub const EVENT_CACHE_HIT: &str = "cache_hit";
pub const EVENT_CACHE_MISS: &str = "cache_miss";
pub const EVENT_SYNTHESIS_SUCCESS: &str = "synthesis_success";
pub const EVENT_SYNTHESIS_FAILURE: &str = "synthesis_failure";

/// Windowed aggregate over raw metric rows
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub window_minutes: i64,
    pub success_count: i64,
    pub failure_count: i64,
    pub cache_hits: i64,
    pub cache_misses: i64,
    pub cache_hit_rate: f64,
    pub latency_p50_ms: Option<i64>,
    pub latency_p95_ms: Option<i64>,
}

pub struct MetricRepository {
    pool: Arc<DbPool>,
}

impl MetricRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        event: &str,
        duration_ms: Option<i64>,
        detail: Option<&str>,
    ) -> AppResult<()> {
        let pool = self.pool.as_ref();

        sqlx::query(
            r#"
            INSERT INTO synthesis_metrics (id, event, duration_ms, detail, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event)
        .bind(duration_ms)
        .bind(detail)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn summarize(&self, window_minutes: i64) -> AppResult<MetricsSummary> {
        let pool = self.pool.as_ref();
        let since = Utc::now() - chrono::Duration::minutes(window_minutes);

        let rows: Vec<(String, Option<i64>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT event, duration_ms, recorded_at FROM synthesis_metrics WHERE recorded_at >= $1",
        )
        .bind(since)
        .fetch_all(pool)
        .await?;

        let mut success_count = 0i64;
        let mut failure_count = 0i64;
        let mut cache_hits = 0i64;
        let mut cache_misses = 0i64;
        let mut latencies: Vec<i64> = Vec::new();

        for (event, duration_ms, _) in rows {
            match event.as_str() {
                EVENT_SYNTHESIS_SUCCESS => {
                    success_count += 1;
                    if let Some(ms) = duration_ms {
                        latencies.push(ms);
                    }
                }
                EVENT_SYNTHESIS_FAILURE => failure_count += 1,
                EVENT_CACHE_HIT => cache_hits += 1,
                EVENT_CACHE_MISS => cache_misses += 1,
                _ => {}
            }
        }

        latencies.sort_unstable();
        let cache_lookups = cache_hits + cache_misses;
        let cache_hit_rate = if cache_lookups > 0 {
            cache_hits as f64 / cache_lookups as f64
        } else {
            0.0
        };

        Ok(MetricsSummary {
            window_minutes,
            success_count,
            failure_count,
            cache_hits,
            cache_misses,
            cache_hit_rate,
            latency_p50_ms: percentile(&latencies, 50),
            latency_p95_ms: percentile(&latencies, 95),
        })
    }
}

/// Nearest-rank percentile over an already-sorted slice
fn percentile(sorted: &[i64], pct: usize) -> Option<i64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (pct * sorted.len()).div_ceil(100);
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    Some(sorted[index])
}
