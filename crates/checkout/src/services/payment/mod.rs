//! Payment intent lifecycle.
//!
//! [`StripeClient`] talks to the payment API; [`PaymentCoordinator`] owns
//! the phase machine around a single intent. The coordinator refuses
//! out-of-phase calls rather than silently re-running network work, so a
//! failed initialization is terminal for that coordinator and a fresh one
//! is required per attempt.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use storyprint_core::Price;

use crate::config::StripeConfig;

/// Errors from the payment layer.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The payment API returned an error response.
    #[error("payment API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a payment API response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The charge amount could not be expressed in minor units.
    #[error("invalid charge amount: {0}")]
    Amount(String),

    /// A lifecycle call arrived in the wrong phase.
    #[error("cannot {action} while payment is {phase}")]
    Phase {
        action: &'static str,
        phase: PaymentPhase,
    },
}

/// Where a payment attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentPhase {
    #[default]
    Idle,
    Initializing,
    Ready,
    Presenting,
    Succeeded,
    Cancelled,
    Failed,
}

impl std::fmt::Display for PaymentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Presenting => "presenting",
            Self::Succeeded => "succeeded",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Customer details attached to the payment intent.
#[derive(Debug, Clone)]
pub struct BillingDetails {
    pub name: String,
    pub email: String,
}

/// A created payment intent, ready to be presented for collection.
pub struct PaymentSession {
    pub intent_id: String,
    client_secret: SecretString,
}

impl PaymentSession {
    #[must_use]
    pub fn new(intent_id: String, client_secret: SecretString) -> Self {
        Self {
            intent_id,
            client_secret,
        }
    }

    /// Client secret handed to the payment collection surface.
    #[must_use]
    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }
}

impl std::fmt::Debug for PaymentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentSession")
            .field("intent_id", &self.intent_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// How presenting the payment surface ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The charge went through.
    Succeeded,
    /// The user backed out without paying.
    Cancelled,
    /// The charge was attempted and declined.
    Failed { reason: String },
}

/// Creates payment intents.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount: Price,
        billing: &BillingDetails,
    ) -> Result<PaymentSession, PaymentError>;
}

/// Collects payment for an already-created intent.
#[async_trait]
pub trait PaymentSheet: Send + Sync {
    async fn present(&self, session: &PaymentSession) -> Result<PresentOutcome, PaymentError>;
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Payment API client.
///
/// Cheaply cloneable; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeInner>,
}

struct StripeInner {
    client: reqwest::Client,
    base_url: String,
    secret_key: SecretString,
}

impl StripeClient {
    /// Create a new payment API client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            inner: Arc::new(StripeInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.clone(),
                secret_key: config.secret_key.clone(),
            }),
        }
    }

    /// Create a payment intent for `amount`.
    ///
    /// Each call sends a fresh idempotency key, so retries after a failure
    /// create a new intent rather than replaying the old one.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Amount`] if the amount cannot be expressed
    /// in minor units and [`PaymentError::Api`] on an error response.
    #[instrument(skip_all, fields(amount = %amount.display()))]
    pub async fn create_payment_intent(
        &self,
        amount: Price,
        billing: &BillingDetails,
    ) -> Result<PaymentSession, PaymentError> {
        let minor = amount
            .minor_units()
            .ok_or_else(|| PaymentError::Amount(amount.display()))?;
        if minor <= 0 {
            return Err(PaymentError::Amount(amount.display()));
        }

        let params = [
            ("amount", minor.to_string()),
            ("currency", amount.currency().code().to_string()),
            ("receipt_email", billing.email.clone()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let response = self
            .inner
            .client
            .post(format!("{}/v1/payment_intents", self.inner.base_url))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .header("Idempotency-Key", Uuid::new_v4().to_string())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), response.text().await.ok()));
        }

        let intent: IntentResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;
        tracing::info!(intent_id = %intent.id, "payment intent created");
        Ok(PaymentSession::new(
            intent.id,
            SecretString::from(intent.client_secret),
        ))
    }

    /// Confirm an intent server-side with a named payment method.
    ///
    /// This backs non-interactive collection surfaces; a decline comes back
    /// as [`PresentOutcome::Failed`] rather than an error so the caller can
    /// offer a retry.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Api`] for non-decline error responses.
    #[instrument(skip(self, payment_method))]
    pub async fn confirm_payment_intent(
        &self,
        intent_id: &str,
        payment_method: &str,
    ) -> Result<PresentOutcome, PaymentError> {
        let response = self
            .inner
            .client
            .post(format!(
                "{}/v1/payment_intents/{intent_id}/confirm",
                self.inner.base_url
            ))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(&[("payment_method", payment_method)])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 402 {
            let reason = error_message(response.text().await.ok())
                .unwrap_or_else(|| "card declined".to_string());
            return Ok(PresentOutcome::Failed { reason });
        }
        if !status.is_success() {
            return Err(api_error(status.as_u16(), response.text().await.ok()));
        }

        let intent: IntentResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;
        match intent.status.as_str() {
            "succeeded" | "processing" => Ok(PresentOutcome::Succeeded),
            other => Ok(PresentOutcome::Failed {
                reason: format!("payment ended in status {other}"),
            }),
        }
    }
}

fn error_message(body: Option<String>) -> Option<String> {
    let body = body?;
    let parsed: ApiErrorBody = serde_json::from_str(&body).ok()?;
    parsed.error.message.or(parsed.error.kind)
}

fn api_error(status: u16, body: Option<String>) -> PaymentError {
    PaymentError::Api {
        status,
        message: error_message(body).unwrap_or_else(|| "unknown error".to_string()),
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_intent(
        &self,
        amount: Price,
        billing: &BillingDetails,
    ) -> Result<PaymentSession, PaymentError> {
        self.create_payment_intent(amount, billing).await
    }
}

/// Phase machine for a single payment attempt.
///
/// One coordinator covers one intent from creation through collection.
/// After a terminal phase the coordinator is done; a new attempt needs a
/// new coordinator so stale client secrets never get represented.
#[derive(Default)]
pub struct PaymentCoordinator {
    phase: PaymentPhase,
    session: Option<PaymentSession>,
}

impl PaymentCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> PaymentPhase {
        self.phase
    }

    /// Intent id of the current or most recent session, if any.
    #[must_use]
    pub fn intent_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.intent_id.as_str())
    }

    /// Create the payment intent. Only valid from [`PaymentPhase::Idle`].
    ///
    /// On failure the coordinator moves to [`PaymentPhase::Failed`] and
    /// stays there; the caller decides whether to start over.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Phase`] when called out of phase, otherwise
    /// propagates the gateway error.
    pub async fn initialize<G: PaymentGateway + ?Sized>(
        &mut self,
        gateway: &G,
        amount: Price,
        billing: &BillingDetails,
    ) -> Result<(), PaymentError> {
        if self.phase != PaymentPhase::Idle {
            return Err(PaymentError::Phase {
                action: "initialize",
                phase: self.phase,
            });
        }
        self.phase = PaymentPhase::Initializing;
        match gateway.create_intent(amount, billing).await {
            Ok(session) => {
                self.session = Some(session);
                self.phase = PaymentPhase::Ready;
                Ok(())
            }
            Err(e) => {
                self.phase = PaymentPhase::Failed;
                Err(e)
            }
        }
    }

    /// Present the collection surface. Only valid from [`PaymentPhase::Ready`].
    ///
    /// Presentation happens at most once per session; afterwards the phase
    /// forbids a second presentation even when the user cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Phase`] when called out of phase, otherwise
    /// propagates the sheet error.
    pub async fn present<S: PaymentSheet + ?Sized>(
        &mut self,
        sheet: &S,
    ) -> Result<PresentOutcome, PaymentError> {
        if self.phase != PaymentPhase::Ready {
            return Err(PaymentError::Phase {
                action: "present",
                phase: self.phase,
            });
        }
        let Some(session) = self.session.as_ref() else {
            return Err(PaymentError::Phase {
                action: "present",
                phase: self.phase,
            });
        };
        self.phase = PaymentPhase::Presenting;
        let outcome = match sheet.present(session).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.phase = PaymentPhase::Failed;
                return Err(e);
            }
        };
        self.phase = match &outcome {
            PresentOutcome::Succeeded => PaymentPhase::Succeeded,
            PresentOutcome::Cancelled => PaymentPhase::Cancelled,
            PresentOutcome::Failed { .. } => PaymentPhase::Failed,
        };
        Ok(outcome)
    }
}
