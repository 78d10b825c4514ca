//! HTTP server implementation using Axum.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post, put},
};
use localboost_channels::ChannelRegistry;
use localboost_core::config::LocalBoostConfig;
use localboost_keywords::KeywordStore;
use localboost_scheduler::{
    PostHistory, PublishPipeline, ScheduleRegistry, SchedulerHandle, SyncAggregator, TemplateStore,
    spawn_job_scheduler,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub business_name: String,
    pub generator_name: String,
    pub start_time: std::time::Instant,
    /// Schedule CRUD plus the arm/cancel bookkeeping behind it.
    pub registry: Arc<ScheduleRegistry>,
    /// Mailbox of the timer driver, for live job-state queries.
    pub scheduler: SchedulerHandle,
    /// Channel-stats sync loop and its latest snapshot.
    pub aggregator: Arc<SyncAggregator>,
    /// Post outcome history (SQLite).
    pub history: Arc<tokio::sync::Mutex<PostHistory>>,
    /// Per-area keyword clusters.
    pub keywords: Arc<KeywordStore>,
    /// Channel adapters, keyed by platform.
    pub channels: ChannelRegistry,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    build_router_from_arc(Arc::new(state))
}

pub fn build_router_from_arc(shared: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(super::routes::health_check))
        .route("/api/v1/info", get(super::routes::system_info))
        // Schedule API
        .route("/api/v1/schedules", get(super::routes::list_schedules))
        .route("/api/v1/schedules", post(super::routes::create_schedule))
        .route("/api/v1/schedules/{id}", put(super::routes::update_schedule))
        .route(
            "/api/v1/schedules/{id}",
            axum::routing::delete(super::routes::delete_schedule),
        )
        .route(
            "/api/v1/schedules/{id}/active",
            post(super::routes::set_schedule_active),
        )
        .route(
            "/api/v1/schedules/{id}/fire",
            post(super::routes::fire_schedule),
        )
        // Post history
        .route("/api/v1/posts", get(super::routes::list_posts))
        // Dashboard snapshot + sync
        .route("/api/v1/snapshot", get(super::routes::get_snapshot))
        .route("/api/v1/sync", post(super::routes::run_sync))
        // Keyword clusters
        .route("/api/v1/keywords", get(super::routes::list_keywords))
        .route("/api/v1/keywords", post(super::routes::refresh_keywords))
        // Live snapshot feed
        .route("/ws", get(super::ws::ws_handler))
        .layer({
            let cors = CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
                .max_age(Duration::from_secs(3600));

            // Restrict CORS origins in production via env var
            // Example: LOCALBOOST_CORS_ORIGINS=https://dash.example.com
            if let Ok(origins_str) = std::env::var("LOCALBOOST_CORS_ORIGINS") {
                let origins: Vec<_> = origins_str
                    .split(',')
                    .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
                    .collect();
                cors.allow_origin(origins)
            } else {
                cors.allow_origin(Any)
            }
        })
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Wire up every engine component and serve the dashboard API.
///
/// The scheduler timer loop, the publish pipeline and the sync loop all
/// start here; the HTTP router only holds handles to them.
pub async fn start(config: &LocalBoostConfig) -> anyhow::Result<()> {
    let tz = config.business.tz()?;

    // Keyword clusters scoped to the configured serving areas
    let keywords = Arc::new(KeywordStore::open(
        &KeywordStore::default_dir(),
        config.business.serving_areas.clone(),
    ));

    // Post outcome history
    let history = Arc::new(tokio::sync::Mutex::new(PostHistory::open_default()?));

    // Content generator + channel adapters
    let generator = localboost_generator::create_generator(config)?;
    let generator_name = generator.name().to_string();
    tracing::info!("📝 Content generator ready: {generator_name}");
    let channels = ChannelRegistry::from_config(&config.channels);

    let pipeline = Arc::new(PublishPipeline::new(
        generator,
        channels.clone(),
        keywords.clone(),
        history.clone(),
        config.business.profile_id.clone(),
        Duration::from_secs(config.scheduler.generation_timeout_secs),
        Duration::from_secs(config.scheduler.publish_timeout_secs),
    ));

    // Timer driver: every firing runs the publish pipeline end to end
    let pipeline_for_fire = pipeline.clone();
    let scheduler = spawn_job_scheduler(tz, move |template, scheduled_for| {
        let pipeline = pipeline_for_fire.clone();
        async move {
            pipeline.execute(&template, scheduled_for).await;
        }
    });

    // Load persisted templates and arm the active ones
    let registry = Arc::new(ScheduleRegistry::new(
        TemplateStore::new(&TemplateStore::default_dir()),
        scheduler.clone(),
    ));
    registry.load().await;

    // Channel-stats sync loop
    let aggregator = Arc::new(SyncAggregator::new(
        channels.clone(),
        Duration::from_secs(config.sync.fetch_timeout_secs),
    ));
    aggregator
        .start(Duration::from_secs(config.sync.interval_secs))
        .await;

    let state = AppState {
        business_name: config.business.name.clone(),
        generator_name,
        start_time: std::time::Instant::now(),
        registry,
        scheduler,
        aggregator,
        history,
        keywords,
        channels,
    };
    let app = build_router(state);

    if !config.gateway.enabled {
        tracing::info!("⏸️ Gateway HTTP disabled — scheduler and sync loops running headless");
        std::future::pending::<()>().await;
        return Ok(());
    }

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
