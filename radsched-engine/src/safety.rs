/// Verdict a clinical-safety subsystem returns for a given order's
/// `patient_context`. The engine consumes only the verdict;
/// it never interprets `patient_context` itself.
#[derive(Debug, Clone, PartialEq)]
pub enum SafetyVerdict {
    Proceed,
    /// Booking may continue but not before `min_schedule_date`.
    Warn { min_schedule_date: Option<String> },
    /// Route to `COORDINATOR_REVIEW` instead of booking.
    Block,
}

/// Pluggable clinical-safety collaborator. The clinical-context safety-rule
/// content itself is a planned collaborator, not implemented here; this
/// trait is the seam, and no implementation other than the no-op default
/// ships in this workspace.
pub trait SafetyCheck: Send + Sync {
    fn check(&self, patient_context: Option<&serde_json::Value>) -> SafetyVerdict;
}

/// Default implementation: always proceeds. `COORDINATOR_REVIEW` is
/// therefore reachable but unused until a real safety-check implementation
/// is plugged in.
#[derive(Debug, Clone, Default)]
pub struct NoopSafetyCheck;

impl SafetyCheck for NoopSafetyCheck {
    fn check(&self, _patient_context: Option<&serde_json::Value>) -> SafetyVerdict {
        SafetyVerdict::Proceed
    }
}
