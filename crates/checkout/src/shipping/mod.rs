//! Shipping info capture and validation.
//!
//! Shipping info is captured once via a form, persisted to the local store,
//! and loaded once per checkout session. Local validation (completeness,
//! postal format, state ZIP ranges) runs before anything is sent upstream;
//! remote deliverability checks live in [`validator`].

pub mod postal;
pub mod validator;

use serde::{Deserialize, Serialize};
use storyprint_core::Email;
use thiserror::Error;

/// Shipping contact and address captured from the address form.
///
/// All fields except `company` and `address2` are required before checkout
/// may proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub address1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    pub city: String,
    /// Two-letter state or province code.
    pub state: String,
    pub postal: String,
    /// Two-letter country code.
    pub country: String,
    pub phone: String,
    pub email: String,
}

/// Local shipping-address validation failures.
///
/// These block the Save action before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("postal code must be exactly 5 digits")]
    PostalFormat,

    #[error("postal code {postal} is outside {state}'s valid range {min:05}-{max:05}")]
    PostalOutOfRange {
        postal: String,
        state: String,
        min: u32,
        max: u32,
    },
}

impl ShippingInfo {
    /// Check that every required field is present and locally valid.
    ///
    /// # Errors
    ///
    /// Returns the first failing rule: a missing required field, a
    /// malformed email, or a postal code failing [`postal::validate`].
    pub fn validate_complete(&self) -> Result<(), AddressError> {
        required("name", &self.name)?;
        required("address1", &self.address1)?;
        required("city", &self.city)?;
        required("state", &self.state)?;
        required("postal code", &self.postal)?;
        required("country", &self.country)?;
        required("phone", &self.phone)?;
        required("email", &self.email)?;

        Email::parse(&self.email).map_err(|e| AddressError::InvalidEmail(e.to_string()))?;
        postal::validate(&self.postal, &self.state)
    }
}

fn required(field: &'static str, value: &str) -> Result<(), AddressError> {
    if value.trim().is_empty() {
        Err(AddressError::MissingField { field })
    } else {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn complete_info() -> ShippingInfo {
        ShippingInfo {
            name: "Jordan Reyes".to_string(),
            company: None,
            address1: "500 Treat Ave".to_string(),
            address2: Some("Apt 2".to_string()),
            city: "San Francisco".to_string(),
            state: "CA".to_string(),
            postal: "94110".to_string(),
            country: "US".to_string(),
            phone: "+1 415 555 0100".to_string(),
            email: "jordan@example.com".to_string(),
        }
    }

    #[test]
    fn test_complete_info_validates() {
        assert!(complete_info().validate_complete().is_ok());
    }

    #[test]
    fn test_missing_email_blocks_locally() {
        let info = ShippingInfo {
            email: String::new(),
            ..complete_info()
        };
        assert_eq!(
            info.validate_complete(),
            Err(AddressError::MissingField { field: "email" })
        );
    }

    #[test]
    fn test_blank_name_blocks_locally() {
        let info = ShippingInfo {
            name: "   ".to_string(),
            ..complete_info()
        };
        assert_eq!(
            info.validate_complete(),
            Err(AddressError::MissingField { field: "name" })
        );
    }

    #[test]
    fn test_company_and_address2_are_optional() {
        let info = ShippingInfo {
            company: None,
            address2: None,
            ..complete_info()
        };
        assert!(info.validate_complete().is_ok());
    }

    #[test]
    fn test_malformed_email_blocks_locally() {
        let info = ShippingInfo {
            email: "not-an-email".to_string(),
            ..complete_info()
        };
        assert!(matches!(
            info.validate_complete(),
            Err(AddressError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_out_of_range_postal_blocks_locally() {
        let info = ShippingInfo {
            state: "NY".to_string(),
            postal: "94110".to_string(),
            ..complete_info()
        };
        assert!(matches!(
            info.validate_complete(),
            Err(AddressError::PostalOutOfRange { .. })
        ));
    }
}
