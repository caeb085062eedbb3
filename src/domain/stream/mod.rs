use crate::domain::synthesis::NarrationStatus;
use crate::error::AppResult;
use crate::infrastructure::repositories::NarrationRepository;
use axum::response::sse::Event;
use futures::stream::Stream;
use moka::future::Cache;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const STATUS_CACHE_TTL_MS: u64 = 900;
const STATUS_CACHE_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub status: NarrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Bridges the polling database model to server-sent events.
///
/// Each subscriber polls on its own timer, but lookups are deduplicated
/// through a short-lived cache so many clients watching the same record do
/// not multiply database reads.
pub struct StatusStreamService {
    narration_repo: Arc<NarrationRepository>,
    status_cache: Cache<String, Option<StatusSnapshot>>,
    poll_interval: Duration,
    max_lifetime: Duration,
}

impl StatusStreamService {
    pub fn new(
        narration_repo: Arc<NarrationRepository>,
        poll_interval_ms: u64,
        max_lifetime_secs: u64,
    ) -> Self {
        let status_cache = Cache::builder()
            .max_capacity(STATUS_CACHE_CAPACITY)
            .time_to_live(Duration::from_millis(STATUS_CACHE_TTL_MS))
            .build();

        Self {
            narration_repo,
            status_cache,
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_lifetime: Duration::from_secs(max_lifetime_secs),
        }
    }

    pub async fn snapshot(
        &self,
        account_id: Uuid,
        record_key: &str,
    ) -> AppResult<Option<StatusSnapshot>> {
        let cache_key = format!("{}:{}", account_id, record_key);
        if let Some(cached) = self.status_cache.get(&cache_key).await {
            return Ok(cached);
        }

        let snapshot = self
            .narration_repo
            .find(account_id, record_key)
            .await?
            .map(|n| StatusSnapshot {
                status: n.status,
                error_message: n.error_message,
            });

        self.status_cache.insert(cache_key, snapshot.clone()).await;
        Ok(snapshot)
    }

    /// Event stream for one record: the current status immediately, then one
    /// event per poll until the status is terminal or the lifetime budget is
    /// spent. The client is expected to reconnect if it still cares.
    pub fn status_events(
        self: Arc<Self>,
        account_id: Uuid,
        record_key: String,
    ) -> impl Stream<Item = Result<Event, Infallible>> {
        let max_polls = (self.max_lifetime.as_millis() / self.poll_interval.as_millis().max(1))
            .max(1) as u32;

        futures::stream::unfold(Some(0u32), move |state| {
            let service = Arc::clone(&self);
            let record_key = record_key.clone();

            async move {
                let polls_done = state?;

                if polls_done > 0 {
                    tokio::time::sleep(service.poll_interval).await;
                }

                let snapshot = match service.snapshot(account_id, &record_key).await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        tracing::error!(
                            account_id = %account_id,
                            record_key = %record_key,
                            error = %e,
                            "Status stream lookup failed"
                        );
                        return Some((status_event(None), None));
                    }
                };

                let terminal = snapshot
                    .as_ref()
                    .map(|s| s.status.is_terminal())
                    .unwrap_or(false);
                let exhausted = polls_done + 1 >= max_polls;

                let next_state = if terminal || exhausted {
                    None
                } else {
                    Some(polls_done + 1)
                };

                Some((status_event(snapshot), next_state))
            }
        })
    }
}

fn status_event(snapshot: Option<StatusSnapshot>) -> Result<Event, Infallible> {
    let event = match snapshot {
        Some(snapshot) => Event::default()
            .event("status")
            .json_data(&snapshot)
            .unwrap_or_else(|_| Event::default().event("status").data("{}")),
        None => Event::default().event("status").data("{\"status\":null}"),
    };
    Ok(event)
}
