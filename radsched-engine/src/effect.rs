use radsched_core::{Location, MessageType, Slot};

/// A side effect the engine decided is necessary, returned as data rather
/// than performed inline — the caller (inbound-edge handler, monitor tick)
/// executes each effect against the SMS dispatcher / IE client / consent
/// store. Keeps decision-making separate from execution, so `decide()`
/// stays free of I/O and unit-testable on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SendSms {
        message_type: MessageType,
        body: String,
    },
    IssueSlotRequest {
        selected_location: Location,
        order_ids: Vec<String>,
        duration_minutes: i32,
    },
    IssueBookingRequest {
        order_ids: Vec<String>,
        selected_slot: Slot,
    },
    RecordConsentGrant,
    RecordConsentRevoke,
}
