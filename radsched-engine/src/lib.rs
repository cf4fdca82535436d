pub mod consolidation;
pub mod decide;
pub mod effect;
pub mod event;
pub mod ingest;
pub mod messages;
pub mod parser;
pub mod patch;
pub mod safety;

pub use decide::{current_prompt_for, decide, Decision};
pub use effect::Effect;
pub use event::Event;
pub use ingest::{ingest_new_order, ingest_order_for_existing, AppendOrderOutcome, NewConversationOutcome};
pub use parser::{parse_inbound, ParsedReply};
pub use patch::{apply_patch, ConversationPatch};
pub use safety::{NoopSafetyCheck, SafetyCheck, SafetyVerdict};
