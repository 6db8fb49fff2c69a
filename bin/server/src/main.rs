use nodeflow_nodes::{NodeDependencies, standard_registry};
use nodeflow_server::{
    app::{self, AppState},
    config::ServerConfig,
    db::{PgCredentialStore, PgExecutionStore, PgStepStore, PgWorkflowSource},
    webhook::TelegramConnect,
    worker,
};
use nodeflow_workflow::RunDriver;
use nodeflow_workflow::nats::{self, NatsStatusPublisher, NatsTriggerQueue};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    // Connect to NATS and set up the trigger stream
    let nats_client = nats::connect(&config.nats)
        .await
        .expect("failed to connect to NATS");
    let trigger_queue = Arc::new(
        NatsTriggerQueue::new(nats_client.clone(), config.nats.clone())
            .await
            .expect("failed to set up trigger stream"),
    );
    let status = Arc::new(NatsStatusPublisher::new(nats_client, config.nats.clone()));

    let http_client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .expect("failed to build HTTP client");

    let telegram_connect = TelegramConnect::new(
        http_client.clone(),
        config.telegram.api_base.clone(),
        config.public_base_url.clone(),
    );

    let registry = standard_registry(NodeDependencies {
        client: http_client,
        credentials: Arc::new(PgCredentialStore::new(db_pool.clone())),
        openrouter: config.openrouter.clone(),
        telegram: config.telegram.clone(),
    });

    let executions = Arc::new(PgExecutionStore::new(db_pool.clone()));
    let driver = Arc::new(
        RunDriver::new(
            Arc::new(PgWorkflowSource::new(db_pool.clone())),
            Arc::new(registry),
            executions.clone(),
            Arc::new(PgStepStore::new(db_pool)),
            status,
        )
        .with_retry_policy(config.retry.policy()),
    );

    let _worker = worker::spawn(trigger_queue.clone(), driver);

    let app = app::router(AppState::new(trigger_queue, executions).with_telegram(telegram_connect));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("Shutting down");
}
