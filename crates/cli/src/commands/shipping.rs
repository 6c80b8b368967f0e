//! Shipping info commands.
//!
//! `set` runs the local completeness and ZIP checks before saving.
//! `validate` additionally asks the print provider whether the address is
//! deliverable; a suggested correction can be accepted at the prompt.

use storyprint_checkout::{AddressDecision, AppState, ShippingInfo};

use super::confirm;

/// Validate and save shipping info.
pub async fn set(
    state: &AppState,
    info: ShippingInfo,
) -> Result<(), Box<dyn std::error::Error>> {
    info.validate_complete()?;
    state.set_shipping(info).await?;
    tracing::info!("Shipping info saved");
    Ok(())
}

/// Show the saved shipping info.
pub async fn show(state: &AppState) {
    match state.shipping().await {
        Some(info) => {
            tracing::info!("{}", info.name);
            tracing::info!("{}", info.address1);
            if let Some(address2) = &info.address2 {
                tracing::info!("{address2}");
            }
            tracing::info!("{}, {} {}", info.city, info.state, info.postal);
            tracing::info!("{}", info.country);
            tracing::info!("{} / {}", info.phone, info.email);
        }
        None => tracing::info!("No shipping info saved"),
    }
}

/// Ask the print provider whether the saved address is deliverable.
///
/// Returns `true` when checkout may proceed with the saved address.
pub async fn validate(state: &AppState) -> Result<bool, Box<dyn std::error::Error>> {
    let Some(info) = state.shipping().await else {
        tracing::warn!("No shipping info saved; run 'storyprint shipping set' first");
        return Ok(false);
    };

    match state.validator().validate(&info).await {
        AddressDecision::Proceed => {
            tracing::info!("Address verified");
            Ok(true)
        }
        AddressDecision::Blocked { message } => {
            tracing::error!("Address rejected: {message}");
            Ok(false)
        }
        AddressDecision::ConfirmFirst { warning, suggested } => {
            tracing::warn!("{warning}");
            if let Some(suggested) = suggested {
                tracing::warn!("Suggested: {}", suggested.summary());
            }
            Ok(confirm("Use the address as entered?"))
        }
    }
}
