//! Validation result types

use thiserror::Error;

/// First rule a request's attribute bag violated.
///
/// The `Display` text is sent to the client verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("Missing required additional property: {param}")]
    MissingField { param: String },

    #[error("Invalid value for {param}. Allowed: {}", .allowed.join(", "))]
    DisallowedValue { param: String, allowed: Vec<String> },

    #[error("Invalid value for {param} (regex: {pattern})")]
    PatternMismatch { param: String, pattern: String },
}

impl ValidationFailure {
    /// Name of the offending attribute
    pub fn param(&self) -> &str {
        match self {
            ValidationFailure::MissingField { param }
            | ValidationFailure::DisallowedValue { param, .. }
            | ValidationFailure::PatternMismatch { param, .. } => param,
        }
    }
}

/// Why a request was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    /// Method or path is not guarded
    Unprotected,
    /// Every rule of the selected group passed
    Validated,
    /// Resolver did not know the subtype; validation bypassed
    UnknownSubtype,
    /// No rule group for this subtype and trigger value; validation bypassed
    NoMatchingGroup,
}

impl std::fmt::Display for PassReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassReason::Unprotected => write!(f, "unprotected"),
            PassReason::Validated => write!(f, "validated"),
            PassReason::UnknownSubtype => write!(f, "unknown subtype"),
            PassReason::NoMatchingGroup => write!(f, "no matching rule group"),
        }
    }
}

/// Outcome of running a request through the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Request proceeds to the backend with its body untouched
    Forward(PassReason),

    /// Request stops here
    Reject {
        /// HTTP status code to return
        status_code: u16,

        /// Reason for rejection (sent to client)
        reason: String,
    },
}

impl GateDecision {
    pub fn reject(status_code: u16, reason: impl Into<String>) -> Self {
        GateDecision::Reject {
            status_code,
            reason: reason.into(),
        }
    }

    pub fn is_forwarded(&self) -> bool {
        matches!(self, GateDecision::Forward(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, GateDecision::Reject { .. })
    }
}

impl From<ValidationFailure> for GateDecision {
    fn from(failure: ValidationFailure) -> Self {
        GateDecision::reject(400, failure.to_string())
    }
}
