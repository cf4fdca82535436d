use serde::{Deserialize, Serialize};

/// Conversation lifecycle state.
///
/// Forms a DAG: `CONSENT_PENDING -> CHOOSING_LOCATION -> CHOOSING_TIME ->
/// CONFIRMED`, with no back-edges except the explicit CHOOSING_TIME ->
/// CHOOSING_LOCATION retry (no slots available at the selected location).
/// `CoordinatorReview` is reserved for a future safety-check subsystem; it
/// is reachable but unused while [`crate::SafetyVerdict`]'s default
/// implementation always proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    ConsentPending,
    ChoosingLocation,
    ChoosingTime,
    CoordinatorReview,
    Confirmed,
    Cancelled,
    Expired,
}

impl State {
    /// Terminal states : no further transitions, and
    /// `completed_at` must be set.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Confirmed | State::Cancelled | State::Expired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::ConsentPending => "CONSENT_PENDING",
            State::ChoosingLocation => "CHOOSING_LOCATION",
            State::ChoosingTime => "CHOOSING_TIME",
            State::CoordinatorReview => "COORDINATOR_REVIEW",
            State::Confirmed => "CONFIRMED",
            State::Cancelled => "CANCELLED",
            State::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for State {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONSENT_PENDING" => Ok(State::ConsentPending),
            "CHOOSING_LOCATION" => Ok(State::ChoosingLocation),
            "CHOOSING_TIME" => Ok(State::ChoosingTime),
            "COORDINATOR_REVIEW" => Ok(State::CoordinatorReview),
            "CONFIRMED" => Ok(State::Confirmed),
            "CANCELLED" => Ok(State::Cancelled),
            "EXPIRED" => Ok(State::Expired),
            other => Err(format!("unknown conversation state: {other}")),
        }
    }
}
