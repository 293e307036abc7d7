use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use story_buddy::{
    app_state::AppState,
    config::AppConfig,
    db::{
        self,
        memory::InMemoryStore,
        store::{JobStore, PersonaStore, PgStore},
    },
    routes::{self, auth::OwnerResolver},
    services::{
        clock::SystemClock,
        dedup::DuplicateGuard,
        fun_facts::FunFactsService,
        jobs::StoryService,
        openai::OpenAiClient,
        orchestrator::{Collaborators, PipelineSettings, StoryPipeline},
        storage::{DisabledObjectStore, ObjectStore, S3ObjectStore},
    },
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing story-buddy server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("story_jobs_submitted_total", "Story jobs accepted");
    metrics::describe_counter!(
        "story_jobs_rejected_total",
        "Story submissions rejected before a job was created"
    );
    metrics::describe_counter!(
        "story_jobs_completed_total",
        "Story jobs that stored generated content"
    );
    metrics::describe_counter!(
        "story_jobs_failed_total",
        "Story jobs that stored the failure record"
    );
    metrics::describe_counter!(
        "story_panels_failed_total",
        "Panels replaced by the failure placeholder"
    );
    metrics::describe_counter!(
        "story_jobs_unpersisted_total",
        "Story jobs whose terminal write did not happen"
    );
    metrics::describe_counter!(
        "fun_facts_failed_total",
        "Fun facts requests whose text completion failed"
    );
    metrics::describe_histogram!(
        "story_job_duration_seconds",
        "Time from pipeline start to terminal write"
    );

    // Job and persona store
    let (jobs, personas, pool) =
        match &config.database_url {
            Some(url) => {
                tracing::info!("Connecting to PostgreSQL database");
                let pool = db::init_pool(url)
                    .await
                    .expect("Failed to connect to database");

                tracing::info!("Running database migrations");
                db::run_migrations(&pool)
                    .await
                    .expect("Failed to run database migrations");

                let store = Arc::new(PgStore::new(pool.clone()));
                (store.clone() as Arc<dyn JobStore>, store as Arc<dyn PersonaStore>, Some(pool))
            }
            None => {
                tracing::warn!("DATABASE_URL not set, stories are kept in memory");
                let store = Arc::new(InMemoryStore::new());
                (store.clone() as Arc<dyn JobStore>, store as Arc<dyn PersonaStore>, None)
            }
        };

    let openai = Arc::new(
        OpenAiClient::new(
            &config.openai_base_url,
            &config.openai_api_key,
            &config.text_model,
            &config.image_model,
            &config.image_size,
            config.upstream_timeout(),
        )
        .expect("Failed to initialize OpenAI client"),
    );

    let objects: Arc<dyn ObjectStore> = match config.s3() {
        Some(settings) => {
            tracing::info!(bucket = %settings.bucket, "Initializing S3 storage client");
            Arc::new(S3ObjectStore::new(&settings).expect("Failed to initialize S3 client"))
        }
        None => {
            tracing::warn!("S3 not configured, panel uploads are disabled");
            Arc::new(DisabledObjectStore)
        }
    };

    let pipeline = Arc::new(StoryPipeline::new(
        Collaborators {
            text: openai.clone(),
            images: openai.clone(),
            objects,
            jobs: jobs.clone(),
            personas,
        },
        PipelineSettings {
            failure_policy: config.illustration_failure_policy,
            dev_panels: config.dev_panels(),
        },
    ));

    let guard = Arc::new(DuplicateGuard::new(
        config.duplicate_cooldown(),
        config.duplicate_retention(),
    ));
    let stories = StoryService::new(jobs, guard, Arc::new(SystemClock), pipeline);

    let fun_facts = FunFactsService::new(openai);

    let state = AppState::new(
        stories,
        fun_facts,
        pool,
        OwnerResolver::new(config.jwt_secret.as_deref()),
    );
    let app = routes::router(state, Some(prometheus_handle));

    tracing::info!("Starting story-buddy on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
