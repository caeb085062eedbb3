use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::sse::{KeepAlive, Sse},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entitlement::EntitlementService,
        jobs::NarrationMode,
        stream::StatusStreamService,
        synthesis::{Narration, NarrationStatus, SynthesisService},
    },
    error::{AppError, AppResult},
    infrastructure::auth::AuthAccount,
};

/// Request for POST /api/audio/issues/:issueId
#[derive(Debug, Default, Deserialize)]
pub struct NarrationRequest {
    #[serde(default)]
    pub mode: Option<NarrationMode>,
}

#[derive(Debug, Serialize)]
pub struct NarrationResponse {
    pub id: Uuid,
    pub status: NarrationStatus,
    pub mode: NarrationMode,
    pub audio_available: bool,
    pub preview_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_charged: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Narration> for NarrationResponse {
    fn from(n: Narration) -> Self {
        Self {
            id: n.id,
            status: n.status,
            mode: n.mode,
            audio_available: n.audio_data.is_some(),
            preview_available: n.first_chunk_data.is_some(),
            credits_charged: n.credits_charged,
            error_message: n.error_message,
            generation_completed_at: n.generation_completed_at,
            created_at: n.created_at,
        }
    }
}

pub struct AudioController {
    synthesis_service: Arc<SynthesisService>,
    entitlement_service: Arc<EntitlementService>,
    stream_service: Arc<StatusStreamService>,
}

impl AudioController {
    pub fn new(
        synthesis_service: Arc<SynthesisService>,
        entitlement_service: Arc<EntitlementService>,
        stream_service: Arc<StatusStreamService>,
    ) -> Self {
        Self {
            synthesis_service,
            entitlement_service,
            stream_service,
        }
    }

    /// POST /api/audio/issues/:issueId - Request narration of an issue
    pub async fn request_narration(
        State(controller): State<Arc<AudioController>>,
        Extension(auth): Extension<AuthAccount>,
        Path(issue_id): Path<Uuid>,
        body: Option<Json<NarrationRequest>>,
    ) -> AppResult<(StatusCode, Json<NarrationResponse>)> {
        let mode = body
            .and_then(|Json(req)| req.mode)
            .unwrap_or(NarrationMode::Full);

        if mode == NarrationMode::Digest {
            return Err(AppError::BadRequest(
                "Digest mode cannot be requested per issue".to_string(),
            ));
        }

        let narration = controller
            .synthesis_service
            .request_issue_narration(auth.account_id, issue_id, mode)
            .await
            .map_err(AppError::from)?;

        let status = if narration.status == NarrationStatus::Ready {
            StatusCode::OK
        } else {
            StatusCode::ACCEPTED
        };

        Ok((status, Json(narration.into())))
    }

    /// GET /api/audio/issues/:issueId - Current narration state
    pub async fn get_narration(
        State(controller): State<Arc<AudioController>>,
        Extension(auth): Extension<AuthAccount>,
        Path(issue_id): Path<Uuid>,
    ) -> AppResult<Json<NarrationResponse>> {
        let narration = controller
            .synthesis_service
            .get_narration(auth.account_id, issue_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Narration not found".to_string()))?;

        Ok(Json(narration.into()))
    }

    /// DELETE /api/audio/issues/:issueId - Cancel an in-flight narration
    pub async fn cancel_narration(
        State(controller): State<Arc<AudioController>>,
        Extension(auth): Extension<AuthAccount>,
        Path(issue_id): Path<Uuid>,
    ) -> AppResult<StatusCode> {
        let canceled = controller
            .synthesis_service
            .cancel(auth.account_id, issue_id)
            .await?;

        if canceled {
            Ok(StatusCode::NO_CONTENT)
        } else {
            Err(AppError::Conflict(
                "Narration is not queued or processing".to_string(),
            ))
        }
    }

    /// GET /api/audio/issues/:issueId/audio - Serve the finished audio.
    /// Supports single byte ranges for seeking.
    pub async fn get_audio(
        State(controller): State<Arc<AudioController>>,
        Extension(auth): Extension<AuthAccount>,
        Path(issue_id): Path<Uuid>,
        headers: HeaderMap,
    ) -> AppResult<(StatusCode, HeaderMap, Body)> {
        let narration = controller
            .synthesis_service
            .get_narration(auth.account_id, issue_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Narration not found".to_string()))?;

        if narration.status != NarrationStatus::Ready {
            return Err(AppError::Conflict(format!(
                "Narration is {}, not ready",
                narration.status
            )));
        }

        let audio = narration
            .audio_data
            .ok_or_else(|| AppError::Internal("Ready narration has no audio".to_string()))?;
        let mime_type = narration
            .mime_type
            .unwrap_or_else(|| "audio/mpeg".to_string());

        serve_audio(&audio, &mime_type, headers.get(header::RANGE))
    }

    /// GET /api/audio/issues/:issueId/preview - First synthesized chunk,
    /// available before the full narration is ready
    pub async fn get_preview(
        State(controller): State<Arc<AudioController>>,
        Extension(auth): Extension<AuthAccount>,
        Path(issue_id): Path<Uuid>,
    ) -> AppResult<(StatusCode, HeaderMap, Body)> {
        let narration = controller
            .synthesis_service
            .get_narration(auth.account_id, issue_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Narration not found".to_string()))?;

        let chunk = narration
            .first_chunk_data
            .ok_or_else(|| AppError::NotFound("No preview available yet".to_string()))?;
        let mime_type = narration
            .mime_type
            .unwrap_or_else(|| "audio/mpeg".to_string());

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            mime_type
                .parse()
                .map_err(|_| AppError::Internal("Invalid mime type".to_string()))?,
        );
        headers.insert(header::CONTENT_LENGTH, chunk.len().into());

        Ok((StatusCode::OK, headers, Body::from(chunk)))
    }

    /// GET /api/audio/issues/:issueId/events - SSE status stream
    pub async fn status_events(
        State(controller): State<Arc<AudioController>>,
        Extension(auth): Extension<AuthAccount>,
        Path(issue_id): Path<Uuid>,
    ) -> Sse<impl futures::Stream<Item = Result<axum::response::sse::Event, std::convert::Infallible>>>
    {
        let stream = Arc::clone(&controller.stream_service)
            .status_events(auth.account_id, Narration::issue_record_key(issue_id));

        Sse::new(stream).keep_alive(KeepAlive::default())
    }

    /// GET /api/usage - Current entitlement balance
    pub async fn get_usage(
        State(controller): State<Arc<AudioController>>,
        Extension(auth): Extension<AuthAccount>,
    ) -> AppResult<Json<serde_json::Value>> {
        let check = controller
            .entitlement_service
            .ensure_available(auth.account_id, 0)
            .await?;

        Ok(Json(serde_json::json!({
            "tier": check.tier,
            "limit": check.limit,
            "available": check.available,
            "reset_at": check.reset_at,
        })))
    }
}

/// Build a 200 or 206 response for the audio bytes, honoring a single byte
/// range when one is present.
fn serve_audio(
    audio: &[u8],
    mime_type: &str,
    range_header: Option<&header::HeaderValue>,
) -> AppResult<(StatusCode, HeaderMap, Body)> {
    let total = audio.len() as u64;
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        mime_type
            .parse()
            .map_err(|_| AppError::Internal("Invalid mime type".to_string()))?,
    );
    headers.insert(header::ACCEPT_RANGES, "bytes".parse().map_err(|_| {
        AppError::Internal("Invalid header value".to_string())
    })?);

    let range = match range_header {
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| AppError::BadRequest("Invalid Range header".to_string()))?;
            match parse_byte_range(raw, total) {
                Some(range) => Some(range),
                None => {
                    // 416 carries the resource length so the client can retry
                    headers.insert(
                        header::CONTENT_RANGE,
                        format!("bytes */{}", total).parse().map_err(|_| {
                            AppError::Internal("Invalid header value".to_string())
                        })?,
                    );
                    return Ok((StatusCode::RANGE_NOT_SATISFIABLE, headers, Body::empty()));
                }
            }
        }
        None => None,
    };

    match range {
        Some((start, end)) => {
            let slice = audio[start as usize..=end as usize].to_vec();
            headers.insert(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end, total)
                    .parse()
                    .map_err(|_| AppError::Internal("Invalid header value".to_string()))?,
            );
            headers.insert(header::CONTENT_LENGTH, slice.len().into());
            Ok((StatusCode::PARTIAL_CONTENT, headers, Body::from(slice)))
        }
        None => {
            headers.insert(header::CONTENT_LENGTH, audio.len().into());
            Ok((StatusCode::OK, headers, Body::from(audio.to_vec())))
        }
    }
}

/// Parse a single `bytes=` range against a resource of `total` bytes.
/// Multi-range requests and malformed or unsatisfiable ranges return None.
fn parse_byte_range(raw: &str, total: u64) -> Option<(u64, u64)> {
    if total == 0 {
        return None;
    }

    let spec = raw.strip_prefix("bytes=")?.trim();
    if spec.contains(',') {
        return None;
    }

    let (start_str, end_str) = spec.split_once('-')?;

    if start_str.is_empty() {
        // Suffix range: last N bytes
        let suffix: u64 = end_str.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        let start = total.saturating_sub(suffix);
        return Some((start, total - 1));
    }

    let start: u64 = start_str.parse().ok()?;
    if start >= total {
        return None;
    }

    let end = if end_str.is_empty() {
        total - 1
    } else {
        let end: u64 = end_str.parse().ok()?;
        end.min(total - 1)
    };

    if start > end {
        return None;
    }

    Some((start, end))
}
