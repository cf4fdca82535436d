use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router as AxumRouter;
use radsched_core::config::AdminConfig;
use radsched_core::ResendSink;
use radsched_store::{AuditRepo, ConversationRepo};
use radsched_audit::metrics::SchedulerMetrics;
use http::Method;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use crate::{handlers, middleware};

/// Shared state for the admin API. Deliberately holds no `radsched-crypto`
/// handle and no plaintext-phone-capable type — see [`ResendSink`] for how
/// the resend endpoint still works without one.
#[derive(Clone)]
pub struct AppState {
    pub conversations: ConversationRepo,
    pub audit: AuditRepo,
    pub resend_sink: Arc<dyn ResendSink>,
    pub metrics: Arc<SchedulerMetrics>,
    pub api_key: Option<String>,
}

/// Admin/analytics read API server, run on its own listener
/// (`admin.addr`), separate from the inbound webhook edge.
pub struct AdminServer {
    config: AdminConfig,
    state: Arc<AppState>,
}

impl AdminServer {
    pub fn new(config: AdminConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    pub async fn start(self) -> anyhow::Result<()> {
        if !self.config.enabled {
            info!("Admin API disabled");
            return Ok(());
        }

        let addr = self.config.addr;
        let app = build_admin_router(self.state.clone()).layer(cors_layer(&self.config.cors_origins));

        info!(addr = %addr, "Starting Admin API server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Build the admin router standalone, so `radsched-server` can nest it
/// under `/admin` in the main process and integration tests can drive it
/// directly via `tower::ServiceExt::oneshot`.
pub fn build_admin_router(state: Arc<AppState>) -> AxumRouter {
    let protected = AxumRouter::new()
        .route("/conversations", get(handlers::conversations::list_conversations))
        .route("/conversations/{id}", get(handlers::conversations::get_conversation))
        .route("/conversations/{id}/transition", post(handlers::conversations::transition_conversation))
        .route("/conversations/{id}/resend", post(handlers::conversations::resend_conversation))
        .route("/stats/counts-by-state", get(handlers::stats::counts_by_state))
        .route("/stats/avg-time-in-state", get(handlers::stats::avg_time_in_state))
        .route("/stats/sms-volume", get(handlers::stats::sms_volume))
        .route("/metrics", get(metrics_handler))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), middleware::bearer_auth));

    AxumRouter::new().route("/health", get(handlers::health::health_check)).merge(protected).with_state(state)
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics.gather_text()
}

/// No configured origins disables cross-origin requests entirely (the
/// safe default for a PHI-adjacent read API); configured origins are
/// allow-listed exactly, never wildcarded.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new();
    }
    let allowed = origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect::<Vec<_>>();
    CorsLayer::new().allow_origin(AllowOrigin::list(allowed)).allow_methods([Method::GET, Method::POST])
}
