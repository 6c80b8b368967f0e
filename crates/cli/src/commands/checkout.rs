//! Checkout command.
//!
//! Validates the saved address, then runs one checkout attempt per user
//! confirmation. Retries are only offered for outcomes where retrying is
//! safe (cancel, declined card); a fulfillment failure after a successful
//! charge ends the loop and prints the payment reference for support.

use async_trait::async_trait;
use storyprint_checkout::{AppState, CheckoutOutcome};
use storyprint_checkout::services::payment::{
    PaymentError, PaymentSession, PaymentSheet, PresentOutcome, StripeClient,
};

use super::confirm;

/// Terminal payment collection surface.
///
/// Confirms the intent server-side with the configured test payment
/// method. Without one the user has nothing to pay with, so presentation
/// resolves to a cancel rather than an error.
struct TerminalPaymentSheet {
    payments: StripeClient,
    payment_method: Option<String>,
}

#[async_trait]
impl PaymentSheet for TerminalPaymentSheet {
    async fn present(&self, session: &PaymentSession) -> Result<PresentOutcome, PaymentError> {
        let Some(method) = self.payment_method.as_deref() else {
            tracing::warn!("STRIPE_TEST_PAYMENT_METHOD is not set; cannot collect payment");
            return Ok(PresentOutcome::Cancelled);
        };
        if !confirm("Confirm payment?") {
            return Ok(PresentOutcome::Cancelled);
        }
        self.payments
            .confirm_payment_intent(&session.intent_id, method)
            .await
    }
}

/// Run checkout for the current cart and saved shipping info.
pub async fn run(state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    let Some(shipping) = state.shipping().await else {
        tracing::error!("No shipping info saved; run 'storyprint shipping set' first");
        return Ok(());
    };

    if !super::shipping::validate(state).await? {
        return Ok(());
    }

    let orchestrator = state.orchestrator_with_sheet(TerminalPaymentSheet {
        payments: state.payments().clone(),
        payment_method: state.config().stripe.test_payment_method.clone(),
    });

    loop {
        let outcome = orchestrator.run(state.cart(), &shipping).await?;
        match &outcome {
            CheckoutOutcome::Completed { .. } => {
                tracing::info!("{}", outcome.message());
                return Ok(());
            }
            CheckoutOutcome::FulfillmentFailedAfterPayment { .. } => {
                tracing::error!("{}", outcome.message());
                return Ok(());
            }
            CheckoutOutcome::Cancelled | CheckoutOutcome::PaymentFailed { .. } => {
                tracing::warn!("{}", outcome.message());
                if !outcome.user_may_retry() || !confirm("Try again?") {
                    return Ok(());
                }
            }
        }
    }
}
