//! Cart store with the multi-item discount pricing rule.
//!
//! The cart is the only state shared across screens, so all mutation goes
//! through a single async mutex: mutate-then-persist is one atomic step and
//! concurrent add/remove can never violate the uniqueness or pricing
//! invariants.
//!
//! # Pricing rule
//!
//! After every mutation, all prices are recomputed from scratch over the
//! post-mutation sequence in insertion order: the item at position 0 costs
//! the base price and every later item costs the base price discounted by
//! the fixed rate, rounded to two decimals. This deliberately reprices the
//! whole cart rather than just the changed item: removing the first item
//! promotes the next one to the full base price.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storyprint_core::{ItemId, Price};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::config::PricingConfig;
use crate::storage::{CART_KEY, JsonStore, StorageError};

/// A finalized storybook awaiting purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Unique per storybook; duplicate adds are rejected.
    pub id: ItemId,
    /// Story title shown on the order summary.
    pub title: String,
    /// Generated story text.
    pub content: String,
    /// URL of the rendered interior PDF.
    pub pdf_url: String,
    /// URL of the selected cover image.
    pub cover_image_url: String,
    /// Current price under the cart pricing rule.
    pub price: Price,
}

/// Outcome of a cart mutation.
///
/// Duplicate adds and missing removes are user notices, not errors: the
/// cart is left unchanged and the caller shows the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartNotice {
    /// The mutation applied and was persisted.
    Updated,
    /// An item with this id is already in the cart; nothing changed.
    AlreadyInCart(ItemId),
    /// No item with this id exists; nothing changed.
    NotInCart(ItemId),
    /// The in-memory mutation applied but writing it to disk failed.
    /// The mutation is not rolled back.
    PersistFailed(String),
}

impl CartNotice {
    /// Whether the in-memory cart changed.
    #[must_use]
    pub const fn mutated(&self) -> bool {
        matches!(self, Self::Updated | Self::PersistFailed(_))
    }

    /// Human-readable notice text.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Updated => "Cart updated.".to_string(),
            Self::AlreadyInCart(id) => {
                format!("This item is already in your cart ({id}).")
            }
            Self::NotInCart(id) => {
                format!("The item you are trying to remove does not exist ({id}).")
            }
            Self::PersistFailed(detail) => {
                format!("Failed to save cart data: {detail}")
            }
        }
    }
}

/// The cart: an ordered sequence of [`CartItem`] with a pricing invariant.
///
/// Cheaply cloneable; all clones share the same underlying cart.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<Mutex<Vec<CartItem>>>,
    pricing: PricingConfig,
    store: JsonStore,
}

impl CartStore {
    /// Create an empty cart.
    #[must_use]
    pub fn new(pricing: PricingConfig, store: JsonStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
            pricing,
            store,
        }
    }

    /// Load a previously persisted cart, or start empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted blob exists but cannot be read.
    pub async fn load(pricing: PricingConfig, store: JsonStore) -> Result<Self, StorageError> {
        let items: Vec<CartItem> = store.get(CART_KEY).await?.unwrap_or_default();
        Ok(Self {
            inner: Arc::new(Mutex::new(items)),
            pricing,
            store,
        })
    }

    /// Add an item, then reprice the whole cart and persist it.
    ///
    /// Rejected with [`CartNotice::AlreadyInCart`] if an item with the same
    /// id exists; the cart is left unchanged.
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    pub async fn add(&self, item: CartItem) -> CartNotice {
        let mut items = self.inner.lock().await;
        if items.iter().any(|existing| existing.id == item.id) {
            return CartNotice::AlreadyInCart(item.id);
        }
        items.push(item);
        reprice(&mut items, &self.pricing);
        self.persist(&items).await
    }

    /// Remove the item with the given id, then reprice and persist.
    ///
    /// Rejected with [`CartNotice::NotInCart`] if no such item exists.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &ItemId) -> CartNotice {
        let mut items = self.inner.lock().await;
        let before = items.len();
        items.retain(|item| item.id != *id);
        if items.len() == before {
            return CartNotice::NotInCart(id.clone());
        }
        reprice(&mut items, &self.pricing);
        self.persist(&items).await
    }

    /// Empty the cart unconditionally and persist the empty state.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> CartNotice {
        let mut items = self.inner.lock().await;
        items.clear();
        self.persist(&items).await
    }

    /// Snapshot of the cart contents in insertion order.
    pub async fn items(&self) -> Vec<CartItem> {
        self.inner.lock().await.clone()
    }

    /// Number of items in the cart.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether the cart is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Sum of all item prices, rounded to two decimals.
    pub async fn total(&self) -> Price {
        let items = self.inner.lock().await;
        let sum: Decimal = items.iter().map(|item| item.price.amount()).sum();
        Price::new(Price::round2(sum), self.pricing.currency)
    }

    /// Write the cart to durable storage. Failure surfaces as a notice and
    /// is not rolled back.
    async fn persist(&self, items: &[CartItem]) -> CartNotice {
        match self.store.put(CART_KEY, &items.to_vec()).await {
            Ok(()) => CartNotice::Updated,
            Err(e) => {
                tracing::warn!(error = %e, "failed to persist cart");
                CartNotice::PersistFailed(e.to_string())
            }
        }
    }
}

/// Recompute every price from the pricing rule.
fn reprice(items: &mut [CartItem], pricing: &PricingConfig) {
    let discounted = Price::round2(pricing.base_price * (Decimal::ONE - pricing.discount_rate));
    for (index, item) in items.iter_mut().enumerate() {
        let amount = if index == 0 {
            pricing.base_price
        } else {
            discounted
        };
        item.price = Price::new(amount, pricing.currency);
    }
}
