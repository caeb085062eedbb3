use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use echopost_backend::infrastructure::config::{Config, LogFormat};
use echopost_backend::infrastructure::db::{check_connection, create_pool, run_migrations};
use echopost_backend::infrastructure::http::{build_router, start_http_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        "Starting EchoPost Backend on {}:{}",
        config.host,
        config.port
    );

    // Create database connection pool
    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Database connection pool created");

    // Verify database connection and apply pending migrations
    check_connection(&pool).await?;
    run_migrations(&pool).await?;
    tracing::info!("Database ready");

    let pool = Arc::new(pool);
    let config = Arc::new(config);

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Instantiate repositories (inject db pool)
    tracing::info!("Instantiating repositories...");
    let account_repo = Arc::new(
        echopost_backend::infrastructure::repositories::AccountRepository::new(pool.clone()),
    );
    let issue_repo = Arc::new(
        echopost_backend::infrastructure::repositories::IssueRepository::new(pool.clone()),
    );
    let narration_repo = Arc::new(
        echopost_backend::infrastructure::repositories::NarrationRepository::new(pool.clone()),
    );
    let audio_cache_repo = Arc::new(
        echopost_backend::infrastructure::repositories::AudioCacheRepository::new(pool.clone()),
    );
    let entitlement_repo = Arc::new(
        echopost_backend::infrastructure::repositories::EntitlementRepository::new(pool.clone()),
    );
    let job_repo = Arc::new(
        echopost_backend::infrastructure::repositories::JobRepository::new(pool.clone()),
    );
    let metric_repo = Arc::new(
        echopost_backend::infrastructure::repositories::MetricRepository::new(pool.clone()),
    );

    // 2. Instantiate speech and condenser providers
    tracing::info!(
        models = ?config.speech_models,
        voice = %config.speech_voice,
        "Instantiating speech provider..."
    );
    let speech_repo: Arc<dyn echopost_backend::infrastructure::repositories::SpeechRepository> =
        Arc::new(
            echopost_backend::infrastructure::repositories::OpenAiSpeechRepository::new(
                config.speech_api_base.clone(),
                config.speech_api_key.clone(),
                config.speech_models.clone(),
            ),
        );
    let condenser_repo: Arc<dyn echopost_backend::infrastructure::repositories::CondenserRepository> =
        Arc::new(
            echopost_backend::infrastructure::repositories::OpenAiCondenserRepository::new(
                config.speech_api_base.clone(),
                config.speech_api_key.clone(),
                config.condense_model.clone(),
            ),
        );

    // 3. Instantiate services (inject repositories and providers)
    tracing::info!("Instantiating services...");
    let entitlement_service = Arc::new(echopost_backend::domain::entitlement::EntitlementService::new(
        account_repo.clone(),
        entitlement_repo.clone(),
    ));
    let synthesis_service = Arc::new(echopost_backend::domain::synthesis::SynthesisService::new(
        issue_repo.clone(),
        narration_repo.clone(),
        audio_cache_repo.clone(),
        metric_repo.clone(),
        job_repo.clone(),
        entitlement_service.clone(),
        speech_repo,
        condenser_repo,
        config.speech_voice.clone(),
        config.condense_word_threshold,
        config.record_stale_after_secs,
    ));
    let stream_service = Arc::new(echopost_backend::domain::stream::StatusStreamService::new(
        narration_repo.clone(),
        config.stream_poll_interval_ms,
        config.stream_max_lifetime_secs,
    ));

    // 4. Instantiate controllers (inject services)
    tracing::info!("Instantiating controllers...");
    let audio_controller = Arc::new(echopost_backend::controllers::audio::AudioController::new(
        synthesis_service.clone(),
        entitlement_service.clone(),
        stream_service,
    ));
    let admin_controller = Arc::new(echopost_backend::controllers::admin::AdminController::new(
        job_repo.clone(),
        metric_repo.clone(),
    ));

    // 5. Spawn the job worker alongside the server
    if config.worker_enabled {
        let worker = echopost_backend::domain::jobs::Worker::new(
            job_repo.clone(),
            account_repo.clone(),
            synthesis_service.clone(),
            echopost_backend::domain::jobs::WorkerConfig {
                poll_interval_secs: config.worker_poll_interval_secs,
                batch_size: config.worker_batch_size,
                lease_duration_secs: config.lease_duration_secs,
            },
        );
        tokio::spawn(worker.run());
    } else {
        tracing::warn!("Job worker disabled, narrations will stay queued");
    }

    // Start HTTP server with all routes
    let app = build_router(
        pool,
        config.clone(),
        account_repo,
        audio_controller,
        admin_controller,
    );
    start_http_server(config, app).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "echopost_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "echopost_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
