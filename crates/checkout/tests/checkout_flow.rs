//! End-to-end checkout flow against a persisted cart and fake providers.
//!
//! Exercises the public surface the way a command surface would: build a
//! cart on disk, save shipping info, run the orchestrator, and check what
//! each outcome leaves behind.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::SecretString;

use storyprint_checkout::cart::{CartItem, CartStore};
use storyprint_checkout::checkout::{
    CheckoutOrchestrator, CheckoutOrdering, CheckoutOutcome, OrderApi,
};
use storyprint_checkout::config::PricingConfig;
use storyprint_checkout::error::{CheckoutError, CheckoutStep};
use storyprint_checkout::services::fulfillment::{
    FulfillmentError, JobStatus, PrintJob, PrintJobRequest,
};
use storyprint_checkout::services::payment::{
    BillingDetails, PaymentError, PaymentGateway, PaymentSession, PaymentSheet, PresentOutcome,
};
use storyprint_checkout::shipping::ShippingInfo;
use storyprint_checkout::storage::{CART_KEY, JsonStore};
use storyprint_core::{ItemId, Price};

fn shipping() -> ShippingInfo {
    ShippingInfo {
        name: "Jordan Reyes".to_string(),
        company: None,
        address1: "500 Treat Ave".to_string(),
        address2: None,
        city: "San Francisco".to_string(),
        state: "CA".to_string(),
        postal: "94110".to_string(),
        country: "US".to_string(),
        phone: "+14155550123".to_string(),
        email: "jordan@example.com".to_string(),
    }
}

fn item(id: &str, title: &str) -> CartItem {
    CartItem {
        id: ItemId::new(id),
        title: title.to_string(),
        content: "Once upon a time".to_string(),
        pdf_url: format!("https://cdn.example.com/{id}.pdf"),
        cover_image_url: format!("https://cdn.example.com/{id}.png"),
        price: Price::new(Decimal::new(2199, 2), storyprint_core::Currency::USD),
    }
}

struct Harness {
    dir: PathBuf,
    store: JsonStore,
    cart: CartStore,
}

async fn harness() -> Harness {
    let dir = std::env::temp_dir().join(format!("storyprint-flow-{}", uuid::Uuid::new_v4()));
    let store = JsonStore::open(&dir).await.unwrap();
    let cart = CartStore::new(PricingConfig::default(), store.clone());
    Harness { dir, store, cart }
}

#[derive(Default)]
struct FakeOrders {
    submissions: AtomicUsize,
    requests: Mutex<Vec<PrintJobRequest>>,
    fail: bool,
}

#[async_trait]
impl OrderApi for &FakeOrders {
    async fn submit_order(
        &self,
        shipping: &ShippingInfo,
        items: &[CartItem],
        cover_template_url: &str,
    ) -> Result<PrintJob, FulfillmentError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(PrintJobRequest::build(
            shipping,
            items,
            cover_template_url,
            "0600X0900FCSTDPB080CW444GXX",
            "MAIL",
        ));
        if self.fail {
            return Err(FulfillmentError::Submission {
                status: 400,
                message: "interior rejected".to_string(),
            });
        }
        Ok(PrintJob {
            id: 90125,
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

#[derive(Default)]
struct FakeGateway {
    charges: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for &FakeGateway {
    async fn create_intent(
        &self,
        _amount: Price,
        _billing: &BillingDetails,
    ) -> Result<PaymentSession, PaymentError> {
        self.charges.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentSession::new(
            "pi_flow_1".to_string(),
            SecretString::from("pi_flow_1_secret"),
        ))
    }
}

struct ScriptedSheet {
    outcomes: Mutex<Vec<PresentOutcome>>,
}

impl ScriptedSheet {
    fn new(outcomes: Vec<PresentOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
        }
    }
}

#[async_trait]
impl PaymentSheet for &ScriptedSheet {
    async fn present(&self, _session: &PaymentSession) -> Result<PresentOutcome, PaymentError> {
        Ok(self.outcomes.lock().unwrap().remove(0))
    }
}

fn orchestrator<'a>(
    orders: &'a FakeOrders,
    gateway: &'a FakeGateway,
    sheet: &'a ScriptedSheet,
    ordering: CheckoutOrdering,
) -> CheckoutOrchestrator<&'a FakeOrders, &'a FakeGateway, &'a ScriptedSheet> {
    CheckoutOrchestrator::new(
        orders,
        gateway,
        sheet,
        ordering,
        "https://cdn.example.com/cover-template.pdf".to_string(),
    )
}

#[tokio::test]
async fn completed_checkout_clears_the_persisted_cart() {
    let h = harness().await;
    h.cart.add(item("story-1", "Road Trip")).await;
    h.cart.add(item("story-2", "Snow Day")).await;

    let orders = FakeOrders::default();
    let gateway = FakeGateway::default();
    let sheet = ScriptedSheet::new(vec![PresentOutcome::Succeeded]);
    let orch = orchestrator(&orders, &gateway, &sheet, CheckoutOrdering::FulfillThenPay);

    let outcome = orch.run(&h.cart, &shipping()).await.unwrap();
    assert!(matches!(outcome, CheckoutOutcome::Completed { .. }));

    // The order carried both items, discounted pricing intact.
    let requests = orders.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].line_items.len(), 2);

    // The cleared cart is what a fresh process restores.
    let reloaded = CartStore::load(PricingConfig::default(), h.store.clone())
        .await
        .unwrap();
    assert!(reloaded.is_empty().await);
}

#[tokio::test]
async fn declined_card_keeps_cart_and_allows_a_second_run() {
    let h = harness().await;
    h.cart.add(item("story-1", "Road Trip")).await;

    let orders = FakeOrders::default();
    let gateway = FakeGateway::default();
    let sheet = ScriptedSheet::new(vec![
        PresentOutcome::Failed {
            reason: "card declined".to_string(),
        },
        PresentOutcome::Succeeded,
    ]);
    let orch = orchestrator(&orders, &gateway, &sheet, CheckoutOrdering::FulfillThenPay);
    let info = shipping();

    let first = orch.run(&h.cart, &info).await.unwrap();
    assert!(matches!(first, CheckoutOutcome::PaymentFailed { .. }));
    assert!(first.user_may_retry());
    assert_eq!(h.cart.len().await, 1);

    // A user-confirmed second run succeeds with a fresh order and intent.
    let second = orch.run(&h.cart, &info).await.unwrap();
    assert!(matches!(second, CheckoutOutcome::Completed { .. }));
    assert_eq!(orders.submissions.load(Ordering::SeqCst), 2);
    assert_eq!(gateway.charges.load(Ordering::SeqCst), 2);
    assert!(h.cart.is_empty().await);
}

#[tokio::test]
async fn refused_order_blocks_payment_under_default_ordering() {
    let h = harness().await;
    h.cart.add(item("story-1", "Road Trip")).await;

    let orders = FakeOrders {
        fail: true,
        ..FakeOrders::default()
    };
    let gateway = FakeGateway::default();
    let sheet = ScriptedSheet::new(vec![PresentOutcome::Succeeded]);
    let orch = orchestrator(&orders, &gateway, &sheet, CheckoutOrdering::FulfillThenPay);

    let err = orch.run(&h.cart, &shipping()).await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Upstream {
            step: CheckoutStep::OrderSubmission,
            ..
        }
    ));
    assert_eq!(gateway.charges.load(Ordering::SeqCst), 0);
    assert_eq!(h.cart.len().await, 1);
}

#[tokio::test]
async fn order_failure_after_charge_is_terminal_with_payment_reference() {
    let h = harness().await;
    h.cart.add(item("story-1", "Road Trip")).await;

    let orders = FakeOrders {
        fail: true,
        ..FakeOrders::default()
    };
    let gateway = FakeGateway::default();
    let sheet = ScriptedSheet::new(vec![PresentOutcome::Succeeded]);
    let orch = orchestrator(&orders, &gateway, &sheet, CheckoutOrdering::PayThenFulfill);

    let outcome = orch.run(&h.cart, &shipping()).await.unwrap();
    match &outcome {
        CheckoutOutcome::FulfillmentFailedAfterPayment { intent_id, .. } => {
            assert_eq!(intent_id, "pi_flow_1");
        }
        other => panic!("expected FulfillmentFailedAfterPayment, got {other:?}"),
    }
    assert!(!outcome.user_may_retry());
    assert_eq!(gateway.charges.load(Ordering::SeqCst), 1);
    // Cart is kept so support can reconstruct the order.
    assert_eq!(h.cart.len().await, 1);
}

#[tokio::test]
async fn missing_shipping_fields_stop_checkout_before_any_provider_call() {
    let h = harness().await;
    h.cart.add(item("story-1", "Road Trip")).await;

    let orders = FakeOrders::default();
    let gateway = FakeGateway::default();
    let sheet = ScriptedSheet::new(vec![PresentOutcome::Succeeded]);
    let orch = orchestrator(&orders, &gateway, &sheet, CheckoutOrdering::FulfillThenPay);

    let mut info = shipping();
    info.postal = String::new();
    let err = orch.run(&h.cart, &info).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Validation(_)));
    assert_eq!(orders.submissions.load(Ordering::SeqCst), 0);
    assert_eq!(gateway.charges.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cart_pricing_survives_a_process_restart() {
    let h = harness().await;
    h.cart.add(item("story-1", "Road Trip")).await;
    h.cart.add(item("story-2", "Snow Day")).await;
    h.cart.add(item("story-3", "First Day")).await;

    let reloaded = CartStore::load(PricingConfig::default(), h.store.clone())
        .await
        .unwrap();
    let items = reloaded.items().await;
    assert_eq!(items[0].price.display(), "$21.99");
    assert_eq!(items[1].price.display(), "$18.69");
    assert_eq!(items[2].price.display(), "$18.69");
    assert_eq!(reloaded.total().await.display(), "$59.37");

    // Raw persisted blob lives under the cart key.
    let raw: Option<Vec<CartItem>> = h.store.get(CART_KEY).await.unwrap();
    assert_eq!(raw.unwrap().len(), 3);
}

#[tokio::test]
async fn harness_directories_are_isolated() {
    let a = harness().await;
    let b = harness().await;
    assert_ne!(a.dir, b.dir);

    a.cart.add(item("story-1", "Road Trip")).await;
    assert!(b.cart.is_empty().await);
}
