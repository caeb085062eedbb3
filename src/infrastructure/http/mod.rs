use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::infrastructure::config::Config;
use crate::infrastructure::db::DbPool;
use crate::{
    controllers::{admin::AdminController, audio::AudioController, health},
    infrastructure::auth::{admin_middleware, auth_middleware, request_id_middleware},
};

use crate::infrastructure::repositories::AccountRepository;

/// Assemble the full application router. Shared with the test harness so
/// requests in tests go through the same middleware stack.
pub fn build_router(
    pool: Arc<DbPool>,
    config: Arc<Config>,
    account_repo: Arc<AccountRepository>,
    audio_controller: Arc<AudioController>,
    admin_controller: Arc<AdminController>,
) -> Router {
    // Caller-facing routes (need account auth)
    let audio_routes = Router::new()
        .route(
            "/api/audio/issues/:issueId",
            post(AudioController::request_narration)
                .get(AudioController::get_narration)
                .delete(AudioController::cancel_narration),
        )
        .route(
            "/api/audio/issues/:issueId/audio",
            get(AudioController::get_audio),
        )
        .route(
            "/api/audio/issues/:issueId/preview",
            get(AudioController::get_preview),
        )
        .route(
            "/api/audio/issues/:issueId/events",
            get(AudioController::status_events),
        )
        .route("/api/usage", get(AudioController::get_usage))
        .with_state(audio_controller.clone())
        .layer(middleware::from_fn_with_state(
            (account_repo.clone(), config.clone()),
            auth_middleware,
        ));

    // Administrative routes (static bearer token)
    let admin_routes = Router::new()
        .route("/admin/jobs/stats", get(AdminController::job_stats))
        .route("/admin/jobs/:jobType/replay", post(AdminController::replay_jobs))
        .route("/admin/metrics/summary", get(AdminController::metrics_summary))
        .with_state(admin_controller.clone())
        .layer(middleware::from_fn_with_state(
            config.clone(),
            admin_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state(pool.clone())
        .merge(audio_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve the router until the process exits
pub async fn start_http_server(
    config: Arc<Config>,
    app: Router,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
