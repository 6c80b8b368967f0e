//! Storyprint Checkout - cart, shipping, payment, and fulfillment coordination.
//!
//! This crate implements the purchase path for Storyprint: a cart of
//! finalized storybooks with a multi-item discount rule, shipping capture
//! and validation, a payment-intent lifecycle, and print-job submission to
//! the fulfillment provider, sequenced by a single orchestrator.
//!
//! # Architecture
//!
//! - [`cart`] - Cart store with single-writer mutation and persist-on-change
//! - [`shipping`] - Shipping info, local postal validation, remote address validation
//! - [`services::payment`] - Payment-intent client and payment collection state machine
//! - [`services::fulfillment`] - Print API client (OAuth2 client credentials, job submission)
//! - [`checkout`] - The orchestrator; the only place cross-component ordering is decided
//! - [`storage`] - Durable local JSON key-value store (cart and shipping blobs)
//! - [`state`] - Shared application state wiring config, clients, and the cart
//!
//! External side effects (charging a card, creating a print job) are
//! irreversible, so nothing in this crate retries a checkout step on its
//! own: every retry is a fresh, user-confirmed call into the orchestrator.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod services;
pub mod shipping;
pub mod state;
pub mod storage;

pub use cart::{CartItem, CartNotice, CartStore};
pub use checkout::{CheckoutOrchestrator, CheckoutOrdering, CheckoutOutcome, OrderApi};
pub use config::{CheckoutConfig, ConfigError};
pub use error::{CheckoutError, CheckoutStep};
pub use shipping::validator::{AddressDecision, AddressPolicy, AddressValidator};
pub use shipping::{AddressError, ShippingInfo};
pub use state::AppState;
