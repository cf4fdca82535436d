use std::time::Duration;

use radsched_core::config::IeConfig;
use radsched_core::conversation::Location;
use reqwest::Client;
use tracing::{info, warn};

use crate::error::IeError;
use crate::idempotency::booking_idempotency_key;
use crate::retry::retry_with_backoff;
use crate::types::{BookingRequest, IeAck, LocationsResponse, SlotRequest};

/// REST client for the three interface-engine operations: locations lookup,
/// slot request, and booking.
///
/// Holds one shared [`reqwest::Client`] for the process lifetime, a
/// process-global HTTP client rather than one per call, wrapping every call
/// in the bounded-retry helper in [`crate::retry`].
#[derive(Clone)]
pub struct IeClient {
    http: Client,
    config: IeConfig,
}

impl IeClient {
    pub fn new(config: IeConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { http, config })
    }

    fn base_delay(&self) -> Duration {
        Duration::from_millis(self.config.retry_base_delay_ms)
    }

    /// `GET locations(modality)` — synchronous, used only when the order
    /// webhook did not already supply `availableLocations`.
    pub async fn locations(&self, modality: &str) -> Result<Vec<Location>, IeError> {
        let url = format!("{}/locations", self.config.base_url);
        let modality = modality.to_string();
        retry_with_backoff(self.config.retry_attempts, self.base_delay(), || {
            let url = url.clone();
            let modality = modality.clone();
            async move {
                let resp = self
                    .http
                    .get(&url)
                    .query(&[("modality", modality)])
                    .send()
                    .await
                    .map_err(|e| IeError::Transient(e.to_string()))?;

                if resp.status().is_server_error() {
                    return Err(IeError::Transient(format!("IE {} on GET locations", resp.status())));
                }
                if !resp.status().is_success() {
                    return Err(IeError::Terminal(format!("IE {} on GET locations", resp.status())));
                }

                resp.json::<LocationsResponse>()
                    .await
                    .map(|body| body.locations)
                    .map_err(|e| IeError::Terminal(format!("malformed locations response: {e}")))
            }
        })
        .await
    }

    /// `POST slot-request` — fire-and-forget; the caller is responsible for
    /// setting `slot_request_sent_at` on success.
    pub async fn request_slots(&self, request: &SlotRequest) -> Result<(), IeError> {
        let url = format!("{}/schedule-requests", self.config.base_url);
        info!(
            conversation_id = %request.conversation_id,
            order_count = request.order_ids.len(),
            "issuing IE slot request"
        );
        retry_with_backoff(self.config.retry_attempts, self.base_delay(), || {
            let url = url.clone();
            async move { self.post_ack(&url, request, None).await }
        })
        .await
    }

    /// `POST book-appointment` — fire-and-forget; confirmation arrives via
    /// the appointment-notification callback. Idempotency key is derived from
    /// `(conversation_id, selected_slot.id, sorted(order_ids))`.
    pub async fn book_appointment(&self, request: &BookingRequest) -> Result<(), IeError> {
        let url = format!("{}/appointments", self.config.base_url);
        let idempotency_key = booking_idempotency_key(
            &request.conversation_id,
            &request.selected_slot.slot_id,
            &request.order_ids,
        );
        info!(
            conversation_id = %request.conversation_id,
            idempotency_key = %idempotency_key,
            "issuing IE booking request"
        );
        retry_with_backoff(self.config.retry_attempts, self.base_delay(), || {
            let url = url.clone();
            let idempotency_key = idempotency_key.clone();
            async move { self.post_ack(&url, request, Some(&idempotency_key)).await }
        })
        .await
    }

    async fn post_ack<B: serde::Serialize>(
        &self,
        url: &str,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> Result<(), IeError> {
        let mut req = self.http.post(url).json(body);
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }

        let resp = req.send().await.map_err(|e| IeError::Transient(e.to_string()))?;

        if resp.status().is_server_error() {
            return Err(IeError::Transient(format!("IE {} on POST {}", resp.status(), url)));
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let ack = resp.json::<IeAck>().await.unwrap_or(IeAck {
                accepted: false,
                error: None,
            });
            return Err(IeError::Terminal(
                ack.error.unwrap_or_else(|| format!("IE rejected with {status}")),
            ));
        }

        match resp.json::<IeAck>().await {
            Ok(ack) if !ack.accepted => {
                warn!(error = ?ack.error, "IE accepted the HTTP call but declined the request");
                Err(IeError::Terminal(ack.error.unwrap_or_else(|| "IE declined request".into())))
            }
            Ok(_) => Ok(()),
            // A 2xx with no/unparseable body is still a successful accept —
            // not every IE deployment echoes a JSON envelope.
            Err(_) => Ok(()),
        }
    }
}
