pub mod client;
pub mod error;
pub mod idempotency;
pub mod retry;
pub mod types;

pub use client::IeClient;
pub use error::IeError;
pub use idempotency::booking_idempotency_key;
pub use types::{BookingRequest, IeAck, LocationsResponse, SlotRequest};
