use anyhow::Result;
use axum::Router;
use echopost_backend::infrastructure::config::{Config, Environment, LogFormat};
use once_cell::sync::Lazy;
use sqlx::PgPool;
use std::sync::Arc;
use test_context::AsyncTestContext;
use testcontainers::{clients::Cli, Container};
use testcontainers_modules::postgres::Postgres;
use tokio::net::TcpListener;
use uuid::Uuid;

pub mod db_pool;
pub mod fake_providers;
pub mod fixtures;

use api_client::TestClient;
use db_pool::{DatabasePool, PooledDatabase};
use fake_providers::{FakeCondenserRepository, FakeSpeechRepository};
use fixtures::{TestFixtures, TEST_ADMIN_TOKEN, TEST_JWT_SECRET};

// Docker client for test containers
static DOCKER: Lazy<Cli> = Lazy::new(Cli::default);

// Shared PostgreSQL container for all tests
static SHARED_CONTAINER: Lazy<SharedContainer> = Lazy::new(SharedContainer::new);

// Global database pool
static DB_POOL: Lazy<DatabasePool> = Lazy::new(|| DatabasePool::new(SHARED_CONTAINER.port));

/// Shared container that lives for the duration of all tests
struct SharedContainer {
    _container: Container<'static, Postgres>,
    port: u16,
}

impl SharedContainer {
    fn new() -> Self {
        let container = DOCKER.run(Postgres::default());
        let port = container.get_host_port_ipv4(5432);

        println!("Started shared PostgreSQL container on port {}", port);

        Self {
            _container: container,
            port,
        }
    }
}

pub struct TestContext {
    pub client: TestClient,
    pub pool: PgPool,
    pub config: Config,
    pub fixtures: TestFixtures,
    pub speech: Arc<FakeSpeechRepository>,
    pub condenser: Arc<FakeCondenserRepository>,
    pub synthesis: Arc<echopost_backend::domain::synthesis::SynthesisService>,
    _db: PooledDatabase,
}

impl AsyncTestContext for TestContext {
    fn setup() -> impl std::future::Future<Output = Self> + Send {
        async {
            let pooled_db = DB_POOL
                .get_database()
                .await
                .expect("Failed to get database from pool");

            let config = test_config(&pooled_db.database_url);

            let speech = FakeSpeechRepository::new();
            let condenser = FakeCondenserRepository::new();

            let (app, synthesis) = create_test_app(
                config.clone(),
                pooled_db.pool.clone(),
                speech.clone(),
                condenser.clone(),
            )
            .await
            .expect("Failed to create app");

            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("Failed to bind listener");
            let addr = listener.local_addr().expect("Failed to get local addr");
            let base_url = format!("http://{}", addr);

            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            // Wait for server to be ready
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

            let client = TestClient::new(&base_url);
            let fixtures = TestFixtures::new(pooled_db.pool.clone());

            Self {
                client,
                pool: pooled_db.pool.clone(),
                config,
                fixtures,
                speech,
                condenser,
                synthesis,
                _db: pooled_db,
            }
        }
    }

    fn teardown(self) -> impl std::future::Future<Output = ()> + Send {
        async {
            // Database cleanup happens automatically via Drop on PooledDatabase
        }
    }
}

/// Database-only context for repository-level tests. No HTTP server and no
/// background worker, so the test is the only thing touching the queue.
pub struct DbTestContext {
    pub pool: PgPool,
    pub fixtures: TestFixtures,
    _db: PooledDatabase,
}

impl AsyncTestContext for DbTestContext {
    fn setup() -> impl std::future::Future<Output = Self> + Send {
        async {
            let pooled_db = DB_POOL
                .get_database()
                .await
                .expect("Failed to get database from pool");

            let fixtures = TestFixtures::new(pooled_db.pool.clone());

            Self {
                pool: pooled_db.pool.clone(),
                fixtures,
                _db: pooled_db,
            }
        }
    }

    fn teardown(self) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }
}

impl TestContext {
    /// Poll the narration status until it reaches `expected` or times out
    pub async fn wait_for_status(&self, token: &str, issue_id: Uuid, expected: &str) {
        let path = format!("/api/audio/issues/{}", issue_id);
        let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(20);

        loop {
            let response = self
                .client
                .get_with_auth(&path, token)
                .await
                .expect("Status request failed");

            if response.status.is_success() && response.json_str("/status") == expected {
                return;
            }

            assert!(
                tokio::time::Instant::now() < deadline,
                "Timed out waiting for status '{}', last response: {:?}",
                expected,
                response.body
            );
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    }
}

fn test_config(database_url: &str) -> Config {
    Config {
        database_url: database_url.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0, // Will be assigned by the OS
        jwt_secret: TEST_JWT_SECRET.to_string(),
        jwt_expiration_hours: 1,
        admin_token: TEST_ADMIN_TOKEN.to_string(),
        environment: Environment::Development,
        log_format: LogFormat::Pretty,
        speech_api_base: "http://localhost:1/v1".to_string(),
        speech_api_key: "test-key".to_string(),
        speech_models: vec!["fake-tts".to_string()],
        speech_voice: "alloy".to_string(),
        condense_model: "fake-condenser".to_string(),
        // High threshold keeps the condenser out of tests unless asked for
        condense_word_threshold: 100_000,
        worker_enabled: true,
        worker_poll_interval_secs: 1,
        worker_batch_size: 5,
        lease_duration_secs: 300,
        record_stale_after_secs: 120,
        stream_poll_interval_ms: 100,
        stream_max_lifetime_secs: 3,
    }
}

async fn create_test_app(
    config: Config,
    pool: PgPool,
    speech: Arc<FakeSpeechRepository>,
    condenser: Arc<FakeCondenserRepository>,
) -> Result<(Router, Arc<echopost_backend::domain::synthesis::SynthesisService>)> {
    use echopost_backend::{
        controllers::{admin::AdminController, audio::AudioController},
        domain::{
            entitlement::EntitlementService,
            jobs::{Worker, WorkerConfig},
            stream::StatusStreamService,
            synthesis::SynthesisService,
        },
        infrastructure::{
            http::build_router,
            repositories::{
                AccountRepository, AudioCacheRepository, CondenserRepository,
                EntitlementRepository, IssueRepository, JobRepository, MetricRepository,
                NarrationRepository, SpeechRepository,
            },
        },
    };

    let pool = Arc::new(pool);
    let config = Arc::new(config);

    let account_repo = Arc::new(AccountRepository::new(pool.clone()));
    let issue_repo = Arc::new(IssueRepository::new(pool.clone()));
    let narration_repo = Arc::new(NarrationRepository::new(pool.clone()));
    let audio_cache_repo = Arc::new(AudioCacheRepository::new(pool.clone()));
    let entitlement_repo = Arc::new(EntitlementRepository::new(pool.clone()));
    let job_repo = Arc::new(JobRepository::new(pool.clone()));
    let metric_repo = Arc::new(MetricRepository::new(pool.clone()));

    let speech: Arc<dyn SpeechRepository> = speech;
    let condenser: Arc<dyn CondenserRepository> = condenser;

    let entitlement_service = Arc::new(EntitlementService::new(
        account_repo.clone(),
        entitlement_repo.clone(),
    ));
    let synthesis_service = Arc::new(SynthesisService::new(
        issue_repo.clone(),
        narration_repo.clone(),
        audio_cache_repo.clone(),
        metric_repo.clone(),
        job_repo.clone(),
        entitlement_service.clone(),
        speech,
        condenser,
        config.speech_voice.clone(),
        config.condense_word_threshold,
        config.record_stale_after_secs,
    ));
    let stream_service = Arc::new(StatusStreamService::new(
        narration_repo.clone(),
        config.stream_poll_interval_ms,
        config.stream_max_lifetime_secs,
    ));

    let audio_controller = Arc::new(AudioController::new(
        synthesis_service.clone(),
        entitlement_service.clone(),
        stream_service,
    ));
    let admin_controller = Arc::new(AdminController::new(job_repo.clone(), metric_repo.clone()));

    let worker = Worker::new(
        job_repo.clone(),
        account_repo.clone(),
        synthesis_service.clone(),
        WorkerConfig {
            poll_interval_secs: config.worker_poll_interval_secs,
            batch_size: config.worker_batch_size,
            lease_duration_secs: config.lease_duration_secs,
        },
    );
    tokio::spawn(worker.run());

    let router = build_router(
        pool,
        config,
        account_repo,
        audio_controller,
        admin_controller,
    );

    Ok((router, synthesis_service))
}
