//! Cart commands.
//!
//! Every mutation is persisted immediately; the cart survives across runs.

use storyprint_checkout::{AppState, CartItem};
use storyprint_core::ItemId;

/// List cart items with the discount pricing applied and the total.
pub async fn list(state: &AppState) {
    let items = state.cart().items().await;
    if items.is_empty() {
        tracing::info!("The cart is empty");
        return;
    }
    for item in &items {
        tracing::info!("{} - {} ({})", item.id, item.title, item.price.display());
    }
    tracing::info!("Total: {}", state.cart().total().await.display());
}

/// Add a story to the cart.
pub async fn add(
    state: &AppState,
    id: String,
    title: String,
    content: String,
    pdf_url: String,
    cover_image_url: String,
) {
    let pricing = state.config().pricing.clone();
    let notice = state
        .cart()
        .add(CartItem {
            id: ItemId::new(id),
            title,
            content,
            pdf_url,
            cover_image_url,
            // Placed at the configured base price; the store reprices the
            // whole cart on insert.
            price: storyprint_core::Price::new(pricing.base_price, pricing.currency),
        })
        .await;
    report(&notice, state).await;
}

/// Remove an item from the cart after confirmation.
pub async fn remove(state: &AppState, id: &str) {
    if !super::confirm("Remove this storybook from your cart?") {
        return;
    }
    let notice = state.cart().remove(&ItemId::new(id)).await;
    report(&notice, state).await;
}

/// Empty the cart after confirmation.
pub async fn clear(state: &AppState) {
    if state.cart().is_empty().await {
        tracing::info!("The cart is already empty");
        return;
    }
    if !super::confirm("Remove every storybook from your cart?") {
        return;
    }
    let notice = state.cart().clear().await;
    report(&notice, state).await;
}

async fn report(notice: &storyprint_checkout::CartNotice, state: &AppState) {
    if matches!(notice, storyprint_checkout::CartNotice::Updated) {
        tracing::info!("{}", notice.message());
    } else {
        tracing::warn!("{}", notice.message());
    }
    if notice.mutated() {
        tracing::info!(
            "Cart now holds {} item(s), total {}",
            state.cart().len().await,
            state.cart().total().await.display()
        );
    }
}
