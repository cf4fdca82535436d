// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RadSched — HIPAA-grade SMS radiology scheduling core
//
//  Inbound edge:  axum, serving order/SMS/IE-callback webhooks
//  Admin API:     axum on a dedicated tokio thread
//  Background:    stuck-session monitor + expiry/retention sweeps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

mod auth;
mod effects;
mod error;
mod handlers;
mod monitor;
mod resend;
mod secrets;
mod state;
mod sweep;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use radsched_admin::server::AdminServer;
use radsched_audit::metrics::SchedulerMetrics;
use radsched_core::config::AppConfig;
use radsched_ie::IeClient;
use radsched_sms::{Dispatcher, ProviderRegistry, TwilioProvider};
use radsched_store::{AuditRepo, ConsentRepo, ConversationRepo, OrgConfigCache, OrgConfigRepo};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::resend::ServerResendSink;
use crate::secrets::Secrets;
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "radsched-server", version, about = "RadSched scheduling core")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Tracing ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "RadSched starting");

    // ── Config ──
    let config = AppConfig::load(cli.config.as_ref().and_then(|p| p.to_str()))?;
    let secrets = Secrets::load_from_env()?;

    // ── Database ──
    let pool = radsched_store::pool::connect(&config.database).await?;
    sqlx::migrate!("../radsched-store/migrations").run(&pool).await?;
    info!("database migrations applied");

    // ── Repositories ──
    let conversations = ConversationRepo::new(pool.clone());
    let consent = ConsentRepo::new(pool.clone());
    let org_config = OrgConfigRepo::new(pool.clone(), OrgConfigCache::new(Duration::from_secs(30)));
    let audit = AuditRepo::new(pool.clone());

    // ── SMS dispatch ──
    let mut registry = ProviderRegistry::new();
    if let (Some(sid), Some(token)) = (&secrets.twilio_account_sid, &secrets.twilio_auth_token) {
        registry.register(Arc::new(TwilioProvider::new(sid.clone(), token.clone())));
        info!("twilio provider registered");
    }
    let dispatcher = Dispatcher::new(org_config.clone(), consent.clone(), Arc::new(audit.clone()), registry);

    // ── Interface engine client ──
    let ie = IeClient::new(config.ie.clone())?;

    // ── Metrics ──
    let metrics = Arc::new(SchedulerMetrics::new()?);

    let state = Arc::new(AppState {
        db_pool: pool.clone(),
        conversations: conversations.clone(),
        consent,
        org_config,
        audit: audit.clone(),
        dispatcher,
        ie,
        session: config.session.clone(),
        safety: AppState::default_safety(),
        metrics: metrics.clone(),
        phone_hash_key: secrets.phone_hash_key,
        phone_enc_key: secrets.phone_enc_key,
        order_webhook_secret: secrets.order_webhook_secret,
        ie_bearer_token: secrets.ie_bearer_token,
        sms_provider_secrets: secrets.sms_provider_secrets,
    });

    // ── Admin API, on a dedicated tokio thread ──
    let admin_config = config.admin.clone();
    if admin_config.enabled {
        let admin_state = Arc::new(radsched_admin::server::AppState {
            conversations: conversations.clone(),
            audit,
            resend_sink: Arc::new(ServerResendSink { state: state.clone() }),
            metrics: metrics.clone(),
            api_key: admin_config.api_key.clone(),
        });
        let addr = admin_config.addr;

        std::thread::Builder::new()
            .name("radsched-admin".to_string())
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build tokio runtime for admin API");

                rt.block_on(async {
                    if let Err(e) = AdminServer::new(admin_config, admin_state).start().await {
                        tracing::error!(error = %e, "admin API failed");
                    }
                });
            })
            .expect("failed to spawn admin thread");

        info!(addr = %addr, "admin API started");
    }

    // ── Background loops ──
    tokio::spawn(monitor::run(state.clone(), config.sweeps.stuck_monitor_interval_seconds));
    tokio::spawn(sweep::run_expiry_sweep(state.clone(), config.sweeps.expiry_sweep_interval_seconds));
    tokio::spawn(sweep::run_retention_sweep(
        state.clone(),
        config.sweeps.retention_sweep_interval_seconds,
        config.audit.retention_days,
    ));

    // ── Inbound webhook edge ──
    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route("/orders/webhook", post(handlers::orders::orders_webhook))
        .route("/sms/webhook/{organization_id}/{provider}", post(handlers::sms::sms_webhook))
        .route("/webhooks/hl7/schedule-response", post(handlers::ie_callbacks::schedule_response))
        .route("/webhooks/hl7/appointment-notification", post(handlers::ie_callbacks::appointment_notification))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.server.http_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "inbound edge ready — serving traffic");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("radsched-server stopped");
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    radsched_audit::prometheus_exporter::render_metrics(&state.metrics)
}

/// Waits for SIGTERM (docker stop) or Ctrl+C, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, draining in-flight requests");
}
