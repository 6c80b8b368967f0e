//! External service clients.

pub mod fulfillment;
pub mod payment;
