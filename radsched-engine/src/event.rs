use radsched_core::{Appointment, Slot};

/// Inputs the engine reacts to, one variant per row of the transition
/// table. Order ingest for a *new* conversation is handled separately by
/// [`crate::ingest::ingest_order`] — [`decide`](crate::decide::decide) only
/// ever operates on an existing, non-terminal conversation.
#[derive(Debug, Clone)]
pub enum Event {
    /// An additional order arrived for an existing conversation.
    OrderAppended {
        order: radsched_core::Order,
    },
    InboundSms {
        body: String,
    },
    SlotsReturned {
        slots: Vec<Slot>,
    },
    SlotsEmpty,
    SlotRequestFailed {
        retries_exhausted: bool,
    },
    BookingConfirmed {
        appointment: Appointment,
        order_ids: Vec<String>,
    },
    BookingFailed {
        retries_exhausted: bool,
    },
    /// Monitor-issued: the slot response SLA elapsed with no callback.
    SlotRequestTimeout {
        retries_exhausted: bool,
    },
    /// Monitor-issued: the booking SLA elapsed with no callback.
    BookingTimeout {
        retries_exhausted: bool,
    },
    ExpirySweep,
}
