pub mod audit;
pub mod config;
pub mod consent;
pub mod conversation;
pub mod error;
pub mod ids;
pub mod org_config;
pub mod resend;
pub mod state;

pub use audit::{AuditEntry, Direction, MessageType};
pub use config::AppConfig;
pub use consent::{Consent, ConsentMethod};
pub use conversation::{Appointment, Conversation, Location, Order, OrderData, PatientIdentifiers, Procedure, Slot};
pub use error::CoreError;
pub use ids::{ConversationId, PhoneEncrypted, PhoneHash};
pub use org_config::OrganizationSmsConfig;
pub use resend::ResendSink;
pub use state::State;
