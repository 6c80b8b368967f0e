//! Shared application state.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::cart::CartStore;
use crate::checkout::CheckoutOrchestrator;
use crate::config::CheckoutConfig;
use crate::error::Result;
use crate::services::fulfillment::PrintApiClient;
use crate::services::payment::{PaymentSheet, StripeClient};
use crate::shipping::ShippingInfo;
use crate::shipping::validator::AddressValidator;
use crate::storage::{JsonStore, SHIPPING_KEY};

/// Everything a command surface needs: config, persisted cart, saved
/// shipping info and the two API clients.
///
/// Cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: CheckoutConfig,
    storage: JsonStore,
    cart: CartStore,
    payments: StripeClient,
    print_api: PrintApiClient,
    shipping: RwLock<Option<ShippingInfo>>,
}

impl AppState {
    /// Build the state: open storage, construct API clients and restore
    /// the cart and shipping info saved by previous runs.
    ///
    /// # Errors
    ///
    /// Fails if the storage directory cannot be opened or a saved record
    /// cannot be read.
    pub async fn init(config: CheckoutConfig) -> Result<Self> {
        let storage = JsonStore::open(&config.storage_dir).await?;
        let payments = StripeClient::new(&config.stripe);
        let print_api = PrintApiClient::new(&config.print_api);

        let (cart, shipping) = tokio::join!(
            CartStore::load(config.pricing.clone(), storage.clone()),
            storage.get::<ShippingInfo>(SHIPPING_KEY),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                storage,
                cart: cart?,
                payments,
                print_api,
                shipping: RwLock::new(shipping?),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &CheckoutConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn payments(&self) -> &StripeClient {
        &self.inner.payments
    }

    #[must_use]
    pub fn print_api(&self) -> &PrintApiClient {
        &self.inner.print_api
    }

    /// Address validator backed by the print API, with the configured
    /// correction policy.
    #[must_use]
    pub fn validator(&self) -> AddressValidator<PrintApiClient> {
        AddressValidator::new(
            self.inner.print_api.clone(),
            self.inner.config.address_policy,
        )
    }

    /// Orchestrator wired to the real order and payment APIs, with the
    /// given collection surface.
    pub fn orchestrator_with_sheet<S: PaymentSheet>(
        &self,
        sheet: S,
    ) -> CheckoutOrchestrator<PrintApiClient, StripeClient, S> {
        CheckoutOrchestrator::new(
            self.inner.print_api.clone(),
            self.inner.payments.clone(),
            sheet,
            self.inner.config.ordering,
            self.inner.config.cover_template_url.clone(),
        )
    }

    /// The saved shipping info, if any.
    pub async fn shipping(&self) -> Option<ShippingInfo> {
        self.inner.shipping.read().await.clone()
    }

    /// Save new shipping info, persisting it for future runs.
    ///
    /// # Errors
    ///
    /// Fails if the record cannot be written.
    pub async fn set_shipping(&self, info: ShippingInfo) -> Result<()> {
        self.inner.storage.put(SHIPPING_KEY, &info).await?;
        *self.inner.shipping.write().await = Some(info);
        Ok(())
    }
}
