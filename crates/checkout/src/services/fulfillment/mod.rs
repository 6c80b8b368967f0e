//! Print fulfillment API client.
//!
//! Authenticates with an OAuth2 client-credentials grant and submits print
//! jobs built from the cart and the saved shipping info. The bearer token
//! is cached in-process until shortly before the provider-reported expiry,
//! so back-to-back calls (validate address, then submit) reuse one token.
//!
//! Auth failures and submission failures are distinct error variants so
//! the user always learns which step failed.

pub mod types;

pub use types::*;

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::config::PrintApiConfig;
use crate::shipping::ShippingInfo;
use crate::shipping::validator::{AddressCheck, ValidateAddress};
use crate::cart::CartItem;

/// Seconds subtracted from the provider's token lifetime before we consider
/// it expired.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Assumed token lifetime when the provider omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 300;

/// Errors from the fulfillment provider.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The token exchange was rejected.
    #[error("print service authentication failed: {status} - {message}")]
    Auth { status: u16, message: String },

    /// The provider rejected the print job (e.g. malformed shipping fields).
    #[error("print job submission rejected: {status} - {message}")]
    Submission { status: u16, message: String },

    /// The address-validation endpoint failed.
    #[error("address validation error: {status} - {message}")]
    Validation { status: u16, message: String },

    /// Failed to parse a provider response.
    #[error("parse error: {0}")]
    Parse(String),
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

/// Client for the print fulfillment API.
///
/// Cheaply cloneable; clones share the HTTP connection pool and token cache.
#[derive(Clone)]
pub struct PrintApiClient {
    inner: Arc<PrintApiInner>,
}

struct PrintApiInner {
    client: reqwest::Client,
    base_url: String,
    auth_url: String,
    client_id: String,
    client_secret: SecretString,
    pod_package_id: String,
    shipping_level: String,
    token: Mutex<Option<CachedToken>>,
}

impl PrintApiClient {
    /// Create a new fulfillment API client.
    #[must_use]
    pub fn new(config: &PrintApiConfig) -> Self {
        Self {
            inner: Arc::new(PrintApiInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.clone(),
                auth_url: config.auth_url.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                pod_package_id: config.pod_package_id.clone(),
                shipping_level: config.shipping_level.clone(),
                token: Mutex::new(None),
            }),
        }
    }

    /// Exchange client credentials for a short-lived bearer token.
    ///
    /// Serves a cached token while it has more than the expiry margin left.
    ///
    /// # Errors
    ///
    /// Returns [`FulfillmentError::Auth`] if the provider rejects the grant.
    #[instrument(skip(self))]
    pub async fn authenticate(&self) -> Result<SecretString, FulfillmentError> {
        let mut guard = self.inner.token.lock().await;
        if let Some(cached) = guard.as_ref()
            && cached.expires_at > Utc::now()
        {
            return Ok(cached.token.clone());
        }

        let credentials = BASE64.encode(format!(
            "{}:{}",
            self.inner.client_id,
            self.inner.client_secret.expose_secret()
        ));

        let response = self
            .inner
            .client
            .post(&self.inner.auth_url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {credentials}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FulfillmentError::Auth {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| FulfillmentError::Parse(e.to_string()))?;

        let lifetime =
            i64::try_from(token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)).unwrap_or(0);
        let expires_at =
            Utc::now() + TimeDelta::seconds((lifetime - TOKEN_EXPIRY_MARGIN_SECS).max(0));
        let secret = SecretString::from(token.access_token);

        *guard = Some(CachedToken {
            token: secret.clone(),
            expires_at,
        });
        tracing::debug!("obtained fresh print API token");
        Ok(secret)
    }

    /// Submit a print job: one quantity-1 line item per cart entry, the
    /// fixed print package, and the cover template URL.
    ///
    /// # Errors
    ///
    /// Returns [`FulfillmentError::Auth`] if the token exchange fails and
    /// [`FulfillmentError::Submission`] if the provider rejects the job.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn submit(
        &self,
        shipping: &ShippingInfo,
        items: &[CartItem],
        cover_template_url: &str,
    ) -> Result<PrintJob, FulfillmentError> {
        let token = self.authenticate().await?;
        let request = PrintJobRequest::build(
            shipping,
            items,
            cover_template_url,
            &self.inner.pod_package_id,
            &self.inner.shipping_level,
        );

        let response = self
            .inner
            .client
            .post(format!("{}/print-jobs/", self.inner.base_url))
            .bearer_auth(token.expose_secret())
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FulfillmentError::Submission {
                status: status.as_u16(),
                message,
            });
        }

        let job: PrintJob = response
            .json()
            .await
            .map_err(|e| FulfillmentError::Parse(e.to_string()))?;
        tracing::info!(job_id = job.id, status = %job.status.name, "print job accepted");
        Ok(job)
    }
}

#[async_trait]
impl ValidateAddress for PrintApiClient {
    #[instrument(skip_all)]
    async fn check_address(
        &self,
        address: &ShippingAddress,
    ) -> Result<AddressCheck, FulfillmentError> {
        let token = self.authenticate().await?;

        let response = self
            .inner
            .client
            .post(format!(
                "{}/shipping-address-validations/",
                self.inner.base_url
            ))
            .bearer_auth(token.expose_secret())
            .json(address)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FulfillmentError::Validation {
                status: status.as_u16(),
                message,
            });
        }

        let body: AddressValidationResponse = response
            .json()
            .await
            .map_err(|e| FulfillmentError::Parse(e.to_string()))?;

        Ok(classify(body))
    }
}

/// Map the provider's validation response onto the checkout-side
/// classification.
fn classify(body: AddressValidationResponse) -> AddressCheck {
    match (body.status.to_ascii_uppercase().as_str(), body.suggested_address) {
        ("OK" | "VALID", _) => AddressCheck::Deliverable,
        ("SUGGESTED" | "CORRECTED", Some(suggested)) => AddressCheck::Corrected { suggested },
        (_, _) => AddressCheck::Undeliverable {
            message: body
                .message
                .unwrap_or_else(|| "the address could not be verified".to_string()),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn response(status: &str, message: Option<&str>, suggested: bool) -> AddressValidationResponse {
        AddressValidationResponse {
            status: status.to_string(),
            message: message.map(ToOwned::to_owned),
            suggested_address: suggested.then(|| SuggestedAddress {
                street1: "1 MAIN ST".to_string(),
                city: "SPRINGFIELD".to_string(),
                state_code: "IL".to_string(),
                postcode: "62701".to_string(),
                country_code: "US".to_string(),
            }),
        }
    }

    #[test]
    fn test_classify_ok() {
        assert_eq!(
            classify(response("OK", None, false)),
            AddressCheck::Deliverable
        );
        assert_eq!(
            classify(response("valid", None, false)),
            AddressCheck::Deliverable
        );
    }

    #[test]
    fn test_classify_suggestion() {
        assert!(matches!(
            classify(response("SUGGESTED", None, true)),
            AddressCheck::Corrected { .. }
        ));
    }

    #[test]
    fn test_classify_suggestion_without_address_is_undeliverable() {
        assert!(matches!(
            classify(response("SUGGESTED", Some("missing unit"), false)),
            AddressCheck::Undeliverable { .. }
        ));
    }

    #[test]
    fn test_classify_incomplete_carries_message() {
        match classify(response("INCOMPLETE", Some("street not found"), false)) {
            AddressCheck::Undeliverable { message } => {
                assert_eq!(message, "street not found");
            }
            other => panic!("expected Undeliverable, got {other:?}"),
        }
    }
}
