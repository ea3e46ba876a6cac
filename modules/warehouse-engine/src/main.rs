use axum::routing::get;
use axum::Router;
use event_bus::{EventBus, InMemoryBus, NatsBus};
use event_consumer::{AgentRegistry, AgentRuntime, RuntimeConfig};
use outbox::OutboxStore;
use scheduler::Scheduler;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use warehouse_engine::agents::{ExpirySweepAgent, FefoReservationAgent, LowStockAlertAgent, ReceiptPutawayAgent};
use warehouse_engine::directory::PgTenantDirectory;
use warehouse_engine::health::{health, ready, HealthState};
use warehouse_engine::internal_jobs::OutboxGcHandler;
use warehouse_engine::{config::Config, consumer, db, dispatcher, Metrics};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("starting warehouse engine");

    let config = Config::from_env().expect("failed to load configuration from environment");

    tracing::info!(host = %config.host, port = config.port, bus_type = %config.bus_type, "configuration loaded");

    let pool = db::init_pool(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("running migrations");
    sqlx::migrate!("./db/migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let bus: Arc<dyn EventBus> = match config.bus_type.to_lowercase().as_str() {
        "inmemory" => {
            tracing::info!("using in-memory event bus");
            Arc::new(InMemoryBus::new())
        }
        "nats" => {
            tracing::info!(nats_url = %config.nats_url, "connecting to NATS");
            let client = async_nats::connect(&config.nats_url)
                .await
                .expect("failed to connect to NATS");
            Arc::new(NatsBus::new(client))
        }
        other => panic!("invalid BUS_TYPE: {other}. must be 'inmemory' or 'nats'"),
    };

    let outbox = Arc::new(OutboxStore::new(pool.clone()));
    let metrics = Arc::new(Metrics::new());

    let mut registry = AgentRegistry::default();
    registry.register(Arc::new(ReceiptPutawayAgent::new(pool.clone())));
    registry.register(Arc::new(FefoReservationAgent::new(pool.clone())));
    registry.register(Arc::new(LowStockAlertAgent::new(pool.clone())));
    registry.register(Arc::new(ExpirySweepAgent::new(pool.clone())));
    let registry = Arc::new(registry);

    let runtime_config = RuntimeConfig {
        concurrency: config.agent_concurrency,
        agent_timeout: config.agent_timeout(),
        continue_on_error: config.continue_on_error,
    };
    let agent_runtime = Arc::new(AgentRuntime::new(registry, runtime_config));

    let cancel = CancellationToken::new();

    let dispatcher_handle = {
        let outbox = Arc::clone(&outbox);
        let bus = Arc::clone(&bus);
        let metrics = Arc::clone(&metrics);
        let cancel = cancel.clone();
        let dispatcher_config = dispatcher::DispatcherConfig {
            poll_interval: config.poll_interval(),
            batch_size: config.batch_size,
        };
        tokio::spawn(dispatcher::run(outbox, bus, metrics, dispatcher_config, cancel))
    };

    let consumer_handle = {
        let bus = Arc::clone(&bus);
        let outbox = Arc::clone(&outbox);
        let consumer_config = consumer::ConsumerConfig {
            max_retries: config.max_retries_consumer,
        };
        tokio::spawn(consumer::run(bus, agent_runtime, outbox, consumer_config))
    };

    let scheduler_handle = {
        let tenant_directory = Arc::new(PgTenantDirectory::new(pool.clone()));
        let mut sched = Scheduler::new(tenant_directory, Arc::clone(&outbox))
            .expect("default job cron expressions are valid");
        sched.register_internal_handler(
            "outbox-cleanup",
            Arc::new(OutboxGcHandler::new(Arc::clone(&outbox), config.outbox_gc_days)),
        );
        let cancel = cancel.clone();
        tokio::spawn(sched.start(cancel))
    };

    let health_state = HealthState { metrics: Arc::clone(&metrics) };
    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/ready", get(ready))
        .with_state(health_state)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "warehouse engine listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind address");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(error) = result {
                tracing::error!(%error, "http server failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    cancel.cancel();
    let _ = tokio::join!(dispatcher_handle, consumer_handle, scheduler_handle);
}
