//! Integration tests for the admin REST API.
//!
//! Uses `#[sqlx::test]` for a fresh, migrated Postgres database per test
//! (requires `DATABASE_URL` to point at a reachable server at test time,
//! same as any other `sqlx::test` suite) and `tower::ServiceExt::oneshot`
//! to drive the router without binding a TCP port.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use radsched_admin::server::{build_admin_router, AppState};
use radsched_audit::metrics::SchedulerMetrics;
use radsched_core::ids::{ConversationId, PhoneEncrypted, PhoneHash};
use radsched_core::{Conversation, CoreError, OrderData, ResendSink, State};
use radsched_store::{AuditRepo, ConversationRepo};
use serde_json::Value;
use tower::ServiceExt;

/// Records every conversation id it was asked to resend, instead of
/// actually decrypting a phone number and calling an SMS provider.
#[derive(Default)]
struct RecordingResendSink {
    calls: std::sync::Mutex<Vec<ConversationId>>,
}

#[async_trait]
impl ResendSink for RecordingResendSink {
    async fn resend(&self, conversation_id: ConversationId) -> Result<(), CoreError> {
        self.calls.lock().unwrap().push(conversation_id);
        Ok(())
    }
}

fn test_state(pool: sqlx::PgPool, resend_sink: Arc<dyn ResendSink>, api_key: Option<String>) -> Arc<AppState> {
    Arc::new(AppState {
        conversations: ConversationRepo::new(pool.clone()),
        audit: AuditRepo::new(pool),
        resend_sink,
        metrics: Arc::new(SchedulerMetrics::new().unwrap()),
        api_key,
    })
}

async fn seed_conversation(repo: &ConversationRepo, state: State) -> Conversation {
    let c = Conversation::new(
        PhoneHash("hash-1".into()),
        PhoneEncrypted("enc-1".into()),
        "org1",
        state,
        OrderData::default(),
        Utc::now(),
        24,
    );
    repo.create(&c).await.unwrap();
    c
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[sqlx::test(migrations = "../radsched-store/migrations")]
async fn health_check_requires_no_auth(pool: sqlx::PgPool) {
    let state = test_state(pool, Arc::new(RecordingResendSink::default()), Some("secret".into()));
    let app = build_admin_router(state);

    let resp = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../radsched-store/migrations")]
async fn protected_routes_reject_missing_bearer_token(pool: sqlx::PgPool) {
    let state = test_state(pool, Arc::new(RecordingResendSink::default()), Some("secret".into()));
    let app = build_admin_router(state);

    let resp =
        app.oneshot(Request::builder().uri("/conversations").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../radsched-store/migrations")]
async fn list_conversations_returns_seeded_row_with_correct_bearer_token(pool: sqlx::PgPool) {
    let repo = ConversationRepo::new(pool.clone());
    let seeded = seed_conversation(&repo, State::ChoosingLocation).await;

    let state = test_state(pool, Arc::new(RecordingResendSink::default()), Some("secret".into()));
    let app = build_admin_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/conversations")
                .header("Authorization", "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], seeded.id.0.to_string());
    assert_eq!(rows[0]["state"], "CHOOSING_LOCATION");
    assert!(rows[0].get("phone_encrypted").is_none());
}

#[sqlx::test(migrations = "../radsched-store/migrations")]
async fn list_conversations_filters_by_state(pool: sqlx::PgPool) {
    let repo = ConversationRepo::new(pool.clone());
    seed_conversation(&repo, State::ChoosingLocation).await;

    let mut confirmed = Conversation::new(
        PhoneHash("hash-2".into()),
        PhoneEncrypted("enc-2".into()),
        "org1",
        State::Confirmed,
        OrderData::default(),
        Utc::now(),
        24,
    );
    confirmed.completed_at = Some(Utc::now());
    repo.create(&confirmed).await.unwrap();

    let state = test_state(pool, Arc::new(RecordingResendSink::default()), None);
    let app = build_admin_router(state);

    let resp = app
        .oneshot(Request::builder().uri("/conversations?state=CONFIRMED").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["state"], "CONFIRMED");
}

#[sqlx::test(migrations = "../radsched-store/migrations")]
async fn get_conversation_detail_includes_order_data(pool: sqlx::PgPool) {
    let repo = ConversationRepo::new(pool.clone());
    let seeded = seed_conversation(&repo, State::ConsentPending).await;

    let state = test_state(pool, Arc::new(RecordingResendSink::default()), None);
    let app = build_admin_router(state);

    let resp = app
        .oneshot(
            Request::builder().uri(format!("/conversations/{}", seeded.id.0)).body(Body::empty()).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["id"], seeded.id.0.to_string());
    assert!(body["order_data"].is_object());
}

#[sqlx::test(migrations = "../radsched-store/migrations")]
async fn get_conversation_detail_404s_for_unknown_id(pool: sqlx::PgPool) {
    let state = test_state(pool, Arc::new(RecordingResendSink::default()), None);
    let app = build_admin_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .uri(format!("/conversations/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../radsched-store/migrations")]
async fn transition_requires_a_reason(pool: sqlx::PgPool) {
    let repo = ConversationRepo::new(pool.clone());
    let seeded = seed_conversation(&repo, State::ChoosingLocation).await;

    let state = test_state(pool, Arc::new(RecordingResendSink::default()), None);
    let app = build_admin_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/conversations/{}/transition", seeded.id.0))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"to_state":"CANCELLED","reason":""}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../radsched-store/migrations")]
async fn transition_forces_state_and_writes_admin_override_audit_entry(pool: sqlx::PgPool) {
    let repo = ConversationRepo::new(pool.clone());
    let seeded = seed_conversation(&repo, State::ChoosingLocation).await;

    let audit = AuditRepo::new(pool.clone());
    let state = test_state(pool, Arc::new(RecordingResendSink::default()), None);
    let app = build_admin_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/conversations/{}/transition", seeded.id.0))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"to_state":"CANCELLED","reason":"duplicate patient record"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["state"], "CANCELLED");

    let updated = repo.get(seeded.id).await.unwrap();
    assert_eq!(updated.state, State::Cancelled);
    assert!(updated.completed_at.is_some());

    let entries = audit.find_by_conversation(seeded.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message_type, radsched_core::MessageType::AdminOverride);
    assert!(entries[0].error_code.as_deref().unwrap().contains("duplicate patient record"));
}

#[sqlx::test(migrations = "../radsched-store/migrations")]
async fn resend_delegates_to_the_resend_sink_without_touching_storage(pool: sqlx::PgPool) {
    let repo = ConversationRepo::new(pool.clone());
    let seeded = seed_conversation(&repo, State::ChoosingTime).await;

    let sink = Arc::new(RecordingResendSink::default());
    let state = test_state(pool, sink.clone(), None);
    let app = build_admin_router(state);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/conversations/{}/resend", seeded.id.0))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(*sink.calls.lock().unwrap(), vec![seeded.id]);
}

#[sqlx::test(migrations = "../radsched-store/migrations")]
async fn counts_by_state_and_sms_volume_report_seeded_data(pool: sqlx::PgPool) {
    let repo = ConversationRepo::new(pool.clone());
    seed_conversation(&repo, State::ChoosingLocation).await;
    seed_conversation(&repo, State::ChoosingTime).await;

    let state = test_state(pool, Arc::new(RecordingResendSink::default()), None);
    let app = build_admin_router(state);

    let from = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    let to = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/stats/counts-by-state?from={from}&to={to}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let resp = app
        .oneshot(
            Request::builder()
                .uri(format!("/stats/sms-volume?from={from}&to={to}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 0);
}
