//! Request and response types for the print fulfillment API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storyprint_core::OrderRef;

use crate::cart::CartItem;
use crate::shipping::ShippingInfo;

/// Shipping address in the provider's schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub street1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    pub city: String,
    pub state_code: String,
    pub postcode: String,
    pub country_code: String,
    pub phone_number: String,
}

impl ShippingAddress {
    /// Normalized key for memoizing validation results.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.street1.trim().to_ascii_uppercase(),
            self.street2
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_ascii_uppercase(),
            self.city.trim().to_ascii_uppercase(),
            self.state_code.trim().to_ascii_uppercase(),
            self.postcode.trim(),
            self.country_code.trim().to_ascii_uppercase(),
        )
    }
}

impl From<&ShippingInfo> for ShippingAddress {
    fn from(info: &ShippingInfo) -> Self {
        Self {
            name: info.name.clone(),
            street1: info.address1.clone(),
            street2: info.address2.clone(),
            city: info.city.clone(),
            state_code: info.state.clone(),
            postcode: info.postal.clone(),
            country_code: info.country.clone(),
            phone_number: info.phone.clone(),
        }
    }
}

/// A corrected address proposed by the validation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedAddress {
    pub street1: String,
    pub city: String,
    pub state_code: String,
    pub postcode: String,
    pub country_code: String,
}

impl SuggestedAddress {
    /// One-line rendering for notices and prompts.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}, {}, {} {}, {}",
            self.street1, self.city, self.state_code, self.postcode, self.country_code
        )
    }
}

/// A print-job creation request.
#[derive(Debug, Clone, Serialize)]
pub struct PrintJobRequest {
    pub contact_email: String,
    pub external_id: String,
    pub line_items: Vec<LineItem>,
    /// Minutes the provider holds the job before moving it to production.
    pub production_delay: u32,
    pub shipping_address: ShippingAddress,
    pub shipping_level: String,
}

impl PrintJobRequest {
    /// Minutes before the provider moves an accepted job to production.
    pub const PRODUCTION_DELAY_MINUTES: u32 = 120;

    /// Build a request with one quantity-1 line item per cart entry.
    ///
    /// Every line item shares the fixed print package and the cover
    /// template URL; the interior comes from each item's rendered PDF.
    #[must_use]
    pub fn build(
        shipping: &ShippingInfo,
        items: &[CartItem],
        cover_template_url: &str,
        pod_package_id: &str,
        shipping_level: &str,
    ) -> Self {
        let line_items = items
            .iter()
            .map(|item| LineItem {
                external_id: item.id.as_str().to_owned(),
                title: item.title.clone(),
                quantity: 1,
                printable_normalization: PrintableNormalization {
                    cover: PrintableSource {
                        source_url: cover_template_url.to_owned(),
                    },
                    interior: PrintableSource {
                        source_url: item.pdf_url.clone(),
                    },
                    pod_package_id: pod_package_id.to_owned(),
                },
            })
            .collect();

        Self {
            contact_email: shipping.email.clone(),
            external_id: format!("order-{}", OrderRef::generate()),
            line_items,
            production_delay: Self::PRODUCTION_DELAY_MINUTES,
            shipping_address: ShippingAddress::from(shipping),
            shipping_level: shipping_level.to_owned(),
        }
    }
}

/// One printed copy of one storybook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub external_id: String,
    pub title: String,
    pub quantity: u32,
    pub printable_normalization: PrintableNormalization,
}

/// Printable sources and package for a line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintableNormalization {
    pub cover: PrintableSource,
    pub interior: PrintableSource,
    pub pod_package_id: String,
}

/// A printable artifact addressed by URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintableSource {
    pub source_url: String,
}

/// An accepted print job, as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct PrintJob {
    pub id: i64,
    pub status: JobStatus,
    #[serde(default)]
    pub line_items: Vec<JobLineItem>,
    #[serde(default)]
    pub costs: Option<JobCosts>,
}

/// Provider-side job status.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    pub name: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub changed: Option<String>,
}

/// Provider-side view of one submitted line item.
#[derive(Debug, Clone, Deserialize)]
pub struct JobLineItem {
    pub id: i64,
    pub title: String,
    pub quantity: u32,
}

/// Cost breakdown attached to an accepted job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobCosts {
    #[serde(default)]
    pub shipping_cost: Option<Decimal>,
    #[serde(default)]
    pub line_item_costs: Option<Decimal>,
    #[serde(default)]
    pub total_cost_excl_tax: Option<Decimal>,
    #[serde(default)]
    pub total_tax: Option<Decimal>,
    #[serde(default)]
    pub total_cost_incl_tax: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// OAuth token endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Address validation endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct AddressValidationResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub suggested_address: Option<SuggestedAddress>,
}
