//! Remote address validation with a configurable decision policy.
//!
//! The validator converts [`ShippingInfo`] to the fulfillment provider's
//! address schema, asks the provider whether the address is deliverable,
//! and turns the answer into a checkout decision. Two suggestion policies
//! have shipped at different times, so the choice is configuration rather
//! than code: `strict` blocks until the user fixes the address, while
//! `permissive` lets the user continue after one explicit confirmation.
//!
//! A transport failure is a soft failure: the user may bypass validation
//! after confirming a clear "address not verified" warning.

use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;
use tracing::instrument;

use super::ShippingInfo;
use crate::services::fulfillment::{FulfillmentError, ShippingAddress, SuggestedAddress};

/// Policy applied when the validation service suggests a corrected address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressPolicy {
    /// Block checkout until the user edits the address.
    Strict,
    /// Allow "continue anyway" after one explicit confirmation.
    #[default]
    Permissive,
}

impl std::str::FromStr for AddressPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            other => Err(format!("unknown address policy '{other}'")),
        }
    }
}

/// The remote service's classification of an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressCheck {
    /// Accepted as deliverable.
    Deliverable,
    /// Rejected; the address must be fixed.
    Undeliverable { message: String },
    /// The service proposed a corrected address.
    Corrected { suggested: SuggestedAddress },
}

/// What the checkout flow should do with the address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressDecision {
    /// Proceed to checkout.
    Proceed,
    /// Blocked until the user edits the address. No bypass.
    Blocked { message: String },
    /// Proceed only after one explicit user confirmation.
    ConfirmFirst {
        warning: String,
        suggested: Option<SuggestedAddress>,
    },
}

/// Seam for the provider's address-validation endpoint.
#[async_trait]
pub trait ValidateAddress: Send + Sync {
    /// Ask the remote service to classify an address.
    async fn check_address(
        &self,
        address: &ShippingAddress,
    ) -> Result<AddressCheck, FulfillmentError>;
}

/// Address validator combining local pre-validation, the remote check, and
/// the configured suggestion policy.
pub struct AddressValidator<V> {
    api: V,
    policy: AddressPolicy,
    cache: Cache<String, AddressCheck>,
}

impl<V: ValidateAddress> AddressValidator<V> {
    /// Remote results are memoized briefly so re-validating an unchanged
    /// address (e.g. returning to the checkout screen) is free.
    const CACHE_CAPACITY: u64 = 256;
    const CACHE_TTL: Duration = Duration::from_secs(10 * 60);

    pub fn new(api: V, policy: AddressPolicy) -> Self {
        Self {
            api,
            policy,
            cache: Cache::builder()
                .max_capacity(Self::CACHE_CAPACITY)
                .time_to_live(Self::CACHE_TTL)
                .build(),
        }
    }

    /// Validate shipping info and decide whether checkout may proceed.
    ///
    /// Local failures (missing fields, bad postal code) block without a
    /// network call.
    #[instrument(skip_all)]
    pub async fn validate(&self, info: &ShippingInfo) -> AddressDecision {
        if let Err(e) = info.validate_complete() {
            return AddressDecision::Blocked {
                message: e.to_string(),
            };
        }

        let address = ShippingAddress::from(info);
        let key = address.cache_key();

        let check = if let Some(hit) = self.cache.get(&key).await {
            hit
        } else {
            match self.api.check_address(&address).await {
                Ok(check) => {
                    self.cache.insert(key, check.clone()).await;
                    check
                }
                Err(err) => {
                    tracing::warn!(error = %err, "address validation unavailable");
                    return AddressDecision::ConfirmFirst {
                        warning: "We could not verify your shipping address right now. \
                                  You can continue, but delivery problems will be your \
                                  responsibility."
                            .to_string(),
                        suggested: None,
                    };
                }
            }
        };

        match check {
            AddressCheck::Deliverable => AddressDecision::Proceed,
            AddressCheck::Undeliverable { message } => AddressDecision::Blocked {
                message: format!("Please fix your shipping address: {message}"),
            },
            AddressCheck::Corrected { suggested } => match self.policy {
                AddressPolicy::Strict => AddressDecision::Blocked {
                    message: format!(
                        "Your address could not be verified as entered. Did you mean: {}?",
                        suggested.summary()
                    ),
                },
                AddressPolicy::Permissive => AddressDecision::ConfirmFirst {
                    warning: format!(
                        "Your address could not be verified as entered. Suggested: {}. \
                         Continue with the address as entered?",
                        suggested.summary()
                    ),
                    suggested: Some(suggested),
                },
            },
        }
    }
}
