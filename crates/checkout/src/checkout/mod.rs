//! Checkout orchestration.
//!
//! Drives one checkout attempt end to end: shipping validation has already
//! happened by the time [`CheckoutOrchestrator::run`] is called, so this
//! module sequences order submission against payment collection and maps
//! every failure to the step it happened in.
//!
//! The default ordering submits the print order first and only then takes
//! payment, so a customer is never charged for an order the print provider
//! refused. The inverse ordering is available for deployments that prefer
//! to hold funds up front; a fulfillment failure after a successful charge
//! is then surfaced as a distinct outcome carrying the intent id so support
//! can refund it.

use std::str::FromStr;

use async_trait::async_trait;
use tracing::instrument;

use crate::cart::{CartItem, CartStore};
use crate::error::{CheckoutError, CheckoutStep, Result};
use crate::services::fulfillment::{FulfillmentError, PrintApiClient, PrintJob};
use crate::services::payment::{
    BillingDetails, PaymentCoordinator, PaymentGateway, PaymentSheet, PresentOutcome,
};
use crate::shipping::ShippingInfo;

/// Submits a print order for the cart.
#[async_trait]
pub trait OrderApi: Send + Sync {
    async fn submit_order(
        &self,
        shipping: &ShippingInfo,
        items: &[CartItem],
        cover_template_url: &str,
    ) -> Result<PrintJob, FulfillmentError>;
}

#[async_trait]
impl OrderApi for PrintApiClient {
    async fn submit_order(
        &self,
        shipping: &ShippingInfo,
        items: &[CartItem],
        cover_template_url: &str,
    ) -> Result<PrintJob, FulfillmentError> {
        self.submit(shipping, items, cover_template_url).await
    }
}

/// Whether the print order is placed before or after payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutOrdering {
    /// Submit the print order, then charge. No charge without an accepted
    /// order.
    #[default]
    FulfillThenPay,
    /// Charge first, then submit the print order.
    PayThenFulfill,
}

impl FromStr for CheckoutOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fulfill-then-pay" => Ok(Self::FulfillThenPay),
            "pay-then-fulfill" => Ok(Self::PayThenFulfill),
            other => Err(format!(
                "unknown checkout ordering '{other}' (expected 'fulfill-then-pay' or 'pay-then-fulfill')"
            )),
        }
    }
}

/// How a checkout attempt ended.
#[derive(Debug)]
pub enum CheckoutOutcome {
    /// Order placed and paid. The cart has been cleared.
    Completed { job: PrintJob },
    /// The user backed out of payment. Cart and order intent untouched.
    Cancelled,
    /// The charge was declined. The user may retry with another card.
    PaymentFailed { reason: String },
    /// The charge succeeded but the print order was refused. Terminal for
    /// this attempt; the intent id identifies the charge to refund.
    FulfillmentFailedAfterPayment { intent_id: String, detail: String },
}

impl CheckoutOutcome {
    /// Whether offering the user another attempt makes sense.
    #[must_use]
    pub fn user_may_retry(&self) -> bool {
        matches!(self, Self::Cancelled | Self::PaymentFailed { .. })
    }

    /// One-line summary for display.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Completed { job } => {
                format!("order placed, print job {} ({})", job.id, job.status.name)
            }
            Self::Cancelled => "checkout cancelled".to_string(),
            Self::PaymentFailed { reason } => format!("payment failed: {reason}"),
            Self::FulfillmentFailedAfterPayment { intent_id, detail } => format!(
                "payment {intent_id} succeeded but the print order failed: {detail}. \
                 Contact support to resolve the charge."
            ),
        }
    }
}

/// Runs a single checkout attempt.
///
/// Generic over the order API, payment gateway and collection surface so
/// the sequencing rules are testable without network access.
pub struct CheckoutOrchestrator<F, G, S> {
    orders: F,
    gateway: G,
    sheet: S,
    ordering: CheckoutOrdering,
    cover_template_url: String,
}

impl<F, G, S> CheckoutOrchestrator<F, G, S>
where
    F: OrderApi,
    G: PaymentGateway,
    S: PaymentSheet,
{
    #[must_use]
    pub fn new(
        orders: F,
        gateway: G,
        sheet: S,
        ordering: CheckoutOrdering,
        cover_template_url: String,
    ) -> Self {
        Self {
            orders,
            gateway,
            sheet,
            ordering,
            cover_template_url,
        }
    }

    /// Run one checkout attempt for the current cart.
    ///
    /// Exactly one attempt per call. The cart is cleared only on
    /// [`CheckoutOutcome::Completed`]; every other outcome leaves it intact
    /// so the caller can offer a retry where [`CheckoutOutcome::user_may_retry`]
    /// allows one.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Validation`] for an empty cart or incomplete
    /// shipping info, and [`CheckoutError::Upstream`] tagged with the failing
    /// [`CheckoutStep`] for service errors.
    #[instrument(skip_all, fields(ordering = ?self.ordering))]
    pub async fn run(
        &self,
        cart: &CartStore,
        shipping: &ShippingInfo,
    ) -> Result<CheckoutOutcome> {
        shipping
            .validate_complete()
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;

        let items = cart.items().await;
        if items.is_empty() {
            return Err(CheckoutError::Validation(
                "the cart is empty".to_string(),
            ));
        }
        let total = cart.total().await;
        let billing = BillingDetails {
            name: shipping.name.clone(),
            email: shipping.email.clone(),
        };

        let outcome = match self.ordering {
            CheckoutOrdering::FulfillThenPay => {
                self.fulfill_then_pay(shipping, &items, total, &billing).await?
            }
            CheckoutOrdering::PayThenFulfill => {
                self.pay_then_fulfill(shipping, &items, total, &billing).await?
            }
        };

        if matches!(outcome, CheckoutOutcome::Completed { .. }) {
            cart.clear().await;
        }
        Ok(outcome)
    }

    async fn fulfill_then_pay(
        &self,
        shipping: &ShippingInfo,
        items: &[CartItem],
        total: storyprint_core::Price,
        billing: &BillingDetails,
    ) -> Result<CheckoutOutcome> {
        let job = self
            .orders
            .submit_order(shipping, items, &self.cover_template_url)
            .await
            .map_err(|e| CheckoutError::upstream(CheckoutStep::OrderSubmission, &e))?;

        let mut payment = PaymentCoordinator::new();
        payment
            .initialize(&self.gateway, total, billing)
            .await
            .map_err(|e| CheckoutError::upstream(CheckoutStep::PaymentInitialization, &e))?;

        match payment.present(&self.sheet).await {
            Ok(PresentOutcome::Succeeded) => Ok(CheckoutOutcome::Completed { job }),
            Ok(PresentOutcome::Cancelled) => Ok(CheckoutOutcome::Cancelled),
            Ok(PresentOutcome::Failed { reason }) => {
                Ok(CheckoutOutcome::PaymentFailed { reason })
            }
            Err(e) => Err(CheckoutError::upstream(
                CheckoutStep::PaymentPresentation,
                &e,
            )),
        }
    }

    async fn pay_then_fulfill(
        &self,
        shipping: &ShippingInfo,
        items: &[CartItem],
        total: storyprint_core::Price,
        billing: &BillingDetails,
    ) -> Result<CheckoutOutcome> {
        let mut payment = PaymentCoordinator::new();
        payment
            .initialize(&self.gateway, total, billing)
            .await
            .map_err(|e| CheckoutError::upstream(CheckoutStep::PaymentInitialization, &e))?;
        let intent_id = payment
            .intent_id()
            .unwrap_or_default()
            .to_string();

        match payment.present(&self.sheet).await {
            Ok(PresentOutcome::Succeeded) => {}
            Ok(PresentOutcome::Cancelled) => return Ok(CheckoutOutcome::Cancelled),
            Ok(PresentOutcome::Failed { reason }) => {
                return Ok(CheckoutOutcome::PaymentFailed { reason });
            }
            Err(e) => {
                return Err(CheckoutError::upstream(
                    CheckoutStep::PaymentPresentation,
                    &e,
                ));
            }
        }

        // Money has moved. A refused order is no longer a retryable error.
        match self
            .orders
            .submit_order(shipping, items, &self.cover_template_url)
            .await
        {
            Ok(job) => Ok(CheckoutOutcome::Completed { job }),
            Err(e) => {
                tracing::error!(%intent_id, error = %e, "order failed after successful charge");
                Ok(CheckoutOutcome::FulfillmentFailedAfterPayment {
                    intent_id,
                    detail: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use secrecy::SecretString;

    use crate::cart::tests::item;
    use crate::config::PricingConfig;
    use crate::services::fulfillment::{JobStatus, PrintJob};
    use crate::services::payment::{PaymentError, PaymentSession};
    use crate::shipping::tests::complete_info;
    use crate::storage::JsonStore;

    use super::*;

    #[derive(Clone)]
    struct CallLog(std::sync::Arc<Mutex<Vec<&'static str>>>);

    impl CallLog {
        fn new() -> Self {
            Self(std::sync::Arc::new(Mutex::new(Vec::new())))
        }

        fn push(&self, call: &'static str) {
            self.0.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().clone()
        }
    }

    struct FakeOrders {
        log: CallLog,
        fail: bool,
        submissions: AtomicUsize,
    }

    impl FakeOrders {
        fn ok(log: CallLog) -> Self {
            Self {
                log,
                fail: false,
                submissions: AtomicUsize::new(0),
            }
        }

        fn failing(log: CallLog) -> Self {
            Self {
                log,
                fail: true,
                submissions: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OrderApi for &FakeOrders {
        async fn submit_order(
            &self,
            _shipping: &ShippingInfo,
            _items: &[CartItem],
            _cover_template_url: &str,
        ) -> Result<PrintJob, FulfillmentError> {
            self.log.push("submit_order");
            self.submissions.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FulfillmentError::Submission {
                    status: 400,
                    message: "no such package".to_string(),
                });
            }
            Ok(PrintJob {
                id: 4242,
                status: JobStatus {
                    name: "CREATED".to_string(),
                    message: None,
                    changed: None,
                },
                line_items: Vec::new(),
                costs: None,
            })
        }
    }

    struct FakeGateway {
        log: CallLog,
        charges: AtomicUsize,
    }

    #[async_trait]
    impl PaymentGateway for &FakeGateway {
        async fn create_intent(
            &self,
            _amount: storyprint_core::Price,
            _billing: &BillingDetails,
        ) -> Result<PaymentSession, PaymentError> {
            self.log.push("create_intent");
            self.charges.fetch_add(1, Ordering::SeqCst);
            Ok(PaymentSession::new(
                "pi_fake_7".to_string(),
                SecretString::from("pi_fake_7_secret"),
            ))
        }
    }

    struct FakeSheet {
        log: CallLog,
        outcome: PresentOutcome,
    }

    #[async_trait]
    impl PaymentSheet for &FakeSheet {
        async fn present(
            &self,
            _session: &PaymentSession,
        ) -> Result<PresentOutcome, PaymentError> {
            self.log.push("present");
            Ok(self.outcome.clone())
        }
    }

    struct Fixture {
        log: CallLog,
        cart: CartStore,
        shipping: ShippingInfo,
        _dir: std::path::PathBuf,
    }

    async fn fixture() -> Fixture {
        let dir =
            std::env::temp_dir().join(format!("storyprint-checkout-{}", uuid::Uuid::new_v4()));
        let store = JsonStore::open(&dir).await.unwrap();
        let cart = CartStore::new(PricingConfig::default(), store);
        cart.add(item("story-1")).await;
        cart.add(item("story-2")).await;
        Fixture {
            log: CallLog::new(),
            cart,
            shipping: complete_info(),
            _dir: dir,
        }
    }

    fn orchestrator<'a>(
        orders: &'a FakeOrders,
        gateway: &'a FakeGateway,
        sheet: &'a FakeSheet,
        ordering: CheckoutOrdering,
    ) -> CheckoutOrchestrator<&'a FakeOrders, &'a FakeGateway, &'a FakeSheet> {
        CheckoutOrchestrator::new(
            orders,
            gateway,
            sheet,
            ordering,
            "https://cdn.example.com/cover.pdf".to_string(),
        )
    }

    #[tokio::test]
    async fn test_fulfill_then_pay_submits_before_charging() {
        let f = fixture().await;
        let orders = FakeOrders::ok(f.log.clone());
        let gateway = FakeGateway {
            log: f.log.clone(),
            charges: AtomicUsize::new(0),
        };
        let sheet = FakeSheet {
            log: f.log.clone(),
            outcome: PresentOutcome::Succeeded,
        };
        let orch = orchestrator(&orders, &gateway, &sheet, CheckoutOrdering::FulfillThenPay);

        let outcome = orch.run(&f.cart, &f.shipping).await.unwrap();
        assert!(matches!(outcome, CheckoutOutcome::Completed { .. }));
        assert_eq!(f.log.calls(), vec!["submit_order", "create_intent", "present"]);
        assert!(f.cart.is_empty().await);
    }

    #[tokio::test]
    async fn test_fulfill_then_pay_refused_order_never_charges() {
        let f = fixture().await;
        let orders = FakeOrders::failing(f.log.clone());
        let gateway = FakeGateway {
            log: f.log.clone(),
            charges: AtomicUsize::new(0),
        };
        let sheet = FakeSheet {
            log: f.log.clone(),
            outcome: PresentOutcome::Succeeded,
        };
        let orch = orchestrator(&orders, &gateway, &sheet, CheckoutOrdering::FulfillThenPay);

        let err = orch.run(&f.cart, &f.shipping).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Upstream {
                step: CheckoutStep::OrderSubmission,
                ..
            }
        ));
        assert_eq!(gateway.charges.load(Ordering::SeqCst), 0);
        assert_eq!(f.cart.len().await, 2);
    }

    #[tokio::test]
    async fn test_cancel_keeps_cart_and_does_not_rerun() {
        let f = fixture().await;
        let orders = FakeOrders::ok(f.log.clone());
        let gateway = FakeGateway {
            log: f.log.clone(),
            charges: AtomicUsize::new(0),
        };
        let sheet = FakeSheet {
            log: f.log.clone(),
            outcome: PresentOutcome::Cancelled,
        };
        let orch = orchestrator(&orders, &gateway, &sheet, CheckoutOrdering::FulfillThenPay);

        let outcome = orch.run(&f.cart, &f.shipping).await.unwrap();
        assert!(matches!(outcome, CheckoutOutcome::Cancelled));
        assert!(outcome.user_may_retry());
        assert_eq!(f.cart.len().await, 2);
        // One attempt per run call, no automatic rerun after a cancel.
        assert_eq!(f.log.calls(), vec!["submit_order", "create_intent", "present"]);
    }

    #[tokio::test]
    async fn test_pay_then_fulfill_order_failure_is_terminal_with_intent() {
        let f = fixture().await;
        let orders = FakeOrders::failing(f.log.clone());
        let gateway = FakeGateway {
            log: f.log.clone(),
            charges: AtomicUsize::new(0),
        };
        let sheet = FakeSheet {
            log: f.log.clone(),
            outcome: PresentOutcome::Succeeded,
        };
        let orch = orchestrator(&orders, &gateway, &sheet, CheckoutOrdering::PayThenFulfill);

        let outcome = orch.run(&f.cart, &f.shipping).await.unwrap();
        match &outcome {
            CheckoutOutcome::FulfillmentFailedAfterPayment { intent_id, detail } => {
                assert_eq!(intent_id, "pi_fake_7");
                assert!(detail.contains("no such package"));
            }
            other => panic!("expected FulfillmentFailedAfterPayment, got {other:?}"),
        }
        assert!(!outcome.user_may_retry());
        // Exactly one charge, placed before the order attempt.
        assert_eq!(gateway.charges.load(Ordering::SeqCst), 1);
        assert_eq!(f.log.calls(), vec!["create_intent", "present", "submit_order"]);
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected_before_any_call() {
        let f = fixture().await;
        f.cart.clear().await;
        let orders = FakeOrders::ok(f.log.clone());
        let gateway = FakeGateway {
            log: f.log.clone(),
            charges: AtomicUsize::new(0),
        };
        let sheet = FakeSheet {
            log: f.log.clone(),
            outcome: PresentOutcome::Succeeded,
        };
        let orch = orchestrator(&orders, &gateway, &sheet, CheckoutOrdering::FulfillThenPay);

        let err = orch.run(&f.cart, &f.shipping).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
        assert!(f.log.calls().is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_shipping_is_rejected() {
        let f = fixture().await;
        let mut shipping = f.shipping.clone();
        shipping.phone = String::new();
        let orders = FakeOrders::ok(f.log.clone());
        let gateway = FakeGateway {
            log: f.log.clone(),
            charges: AtomicUsize::new(0),
        };
        let sheet = FakeSheet {
            log: f.log.clone(),
            outcome: PresentOutcome::Succeeded,
        };
        let orch = orchestrator(&orders, &gateway, &sheet, CheckoutOrdering::FulfillThenPay);

        let err = orch.run(&f.cart, &shipping).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
    }

    #[test]
    fn test_ordering_from_str() {
        assert_eq!(
            "fulfill-then-pay".parse::<CheckoutOrdering>().unwrap(),
            CheckoutOrdering::FulfillThenPay
        );
        assert_eq!(
            "PAY-THEN-FULFILL".parse::<CheckoutOrdering>().unwrap(),
            CheckoutOrdering::PayThenFulfill
        );
        assert!("pay-first".parse::<CheckoutOrdering>().is_err());
    }
}
