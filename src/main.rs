use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use group_sentinel::adapters::{
    websocket_router, FanoutHub, InMemoryConnectionProvider, InMemoryFloodTracker,
    InMemoryLogRepository, InMemoryPolicyRepository, InMemoryTenantDirectory, TokenVerifier,
    WebSocketState,
};
use group_sentinel::application::{
    AuditTrail, BotProfile, MuteScheduler, OrchestratorParts, OrchestratorSettings, PolicyService,
    SessionOrchestrator,
};
use group_sentinel::config::{AppConfig, ServerConfig};
use group_sentinel::ports::FloodTracker;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    tracing::info!(
        name = %config.bot.name,
        version = %config.bot.version,
        environment = ?config.server.environment,
        "Starting Group Sentinel"
    );

    let hub = Arc::new(FanoutHub::new(config.realtime.channel_capacity));
    let verifier = Arc::new(TokenVerifier::hs256(&config.realtime.jwt_secret));

    let (audit, audit_task) = AuditTrail::spawn(
        Arc::new(InMemoryLogRepository::new()),
        config.orchestrator.audit_buffer,
    );
    let policies = Arc::new(PolicyService::new(
        Arc::new(InMemoryPolicyRepository::new()),
        hub.clone(),
        Arc::new(MuteScheduler::new()),
    ));
    let flood = Arc::new(InMemoryFloodTracker::new());
    let provider = InMemoryConnectionProvider::new()
        .with_auto_pairing()
        .with_event_buffer(config.orchestrator.event_buffer);

    let orchestrator = SessionOrchestrator::new(
        OrchestratorParts {
            provider: Arc::new(provider),
            tenants: Arc::new(InMemoryTenantDirectory::new()),
            policies,
            flood: flood.clone(),
            publisher: hub.clone(),
            audit: audit.clone(),
            bot: BotProfile::new(config.bot.name.clone(), config.bot.version.clone()),
        },
        OrchestratorSettings::from(&config.orchestrator),
    );

    let sweep_every = config.moderation.flood_sweep_interval();
    let idle = config.moderation.flood_idle();
    let sweeper = tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        interval.tick().await;
        loop {
            interval.tick().await;
            let pruned = flood.prune(idle).await;
            if pruned > 0 {
                tracing::debug!(pruned, "Pruned idle flood windows");
            }
        }
    });

    let cors = if config.is_production() {
        CorsLayer::new()
    } else {
        CorsLayer::permissive()
    };
    let health_orchestrator = orchestrator.clone();
    let app = Router::new()
        .route(
            "/health",
            get(move || health(health_orchestrator.clone())),
        )
        .merge(websocket_router().with_state(WebSocketState::new(hub, verifier)))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    sweeper.abort();
    orchestrator.shutdown();
    audit.flush().await;
    audit_task.abort();
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if server.is_production() {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn health(orchestrator: SessionOrchestrator) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": orchestrator.session_count(),
    }))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
}
