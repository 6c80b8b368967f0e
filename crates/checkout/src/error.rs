//! Crate-level error taxonomy for the checkout path.
//!
//! Raw provider errors never cross a component boundary: each service client
//! has its own error enum, and the orchestrator translates those into
//! [`CheckoutError::Upstream`] values that name the step that failed. Local
//! validation failures ([`CheckoutError::Validation`]) are produced before
//! any network call is made.

use thiserror::Error;

use crate::storage::StorageError;

/// The checkout step being attempted when an upstream call failed.
///
/// Used in user-facing messages so failures are never reported as a generic
/// "something went wrong".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStep {
    AddressValidation,
    OrderSubmission,
    PaymentInitialization,
    PaymentPresentation,
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AddressValidation => "address validation",
            Self::OrderSubmission => "order submission",
            Self::PaymentInitialization => "payment setup",
            Self::PaymentPresentation => "payment collection",
        };
        write!(f, "{name}")
    }
}

/// Errors that abort a checkout attempt.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A local validation rule failed; nothing was sent upstream.
    #[error("{0}")]
    Validation(String),

    /// An external service call failed during the named step.
    #[error("{step} failed: {message}")]
    Upstream {
        step: CheckoutStep,
        message: String,
    },

    /// Local durable storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CheckoutError {
    /// Wrap an upstream service error with the step it occurred in.
    pub fn upstream(step: CheckoutStep, source: &impl std::fmt::Display) -> Self {
        Self::Upstream {
            step,
            message: source.to_string(),
        }
    }

    /// Whether the user may re-run the whole checkout sequence after this
    /// error. Retries are never automatic.
    #[must_use]
    pub const fn user_may_retry(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }
}

/// Result type alias for checkout operations.
pub type Result<T, E = CheckoutError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_names_the_step() {
        let err = CheckoutError::upstream(CheckoutStep::OrderSubmission, &"provider said no");
        assert_eq!(err.to_string(), "order submission failed: provider said no");
    }

    #[test]
    fn test_validation_errors_are_not_retryable() {
        let err = CheckoutError::Validation("cart is empty".to_string());
        assert!(!err.user_may_retry());
    }

    #[test]
    fn test_upstream_errors_are_user_retryable() {
        let err = CheckoutError::upstream(CheckoutStep::PaymentInitialization, &"503");
        assert!(err.user_may_retry());
    }
}
