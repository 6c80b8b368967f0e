//! Checkout configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STRIPE_SECRET_KEY` - Payment provider secret API key
//! - `PRINT_API_CLIENT_ID` - Fulfillment API OAuth client ID
//! - `PRINT_API_CLIENT_SECRET` - Fulfillment API OAuth client secret
//! - `STORYPRINT_COVER_TEMPLATE_URL` - Cover source URL attached to each print line item
//!
//! ## Optional
//! - `STORYPRINT_STORAGE_DIR` - Local state directory (default: .storyprint)
//! - `STORYPRINT_BASE_PRICE` - First-item price (default: 21.99)
//! - `STORYPRINT_DISCOUNT_RATE` - Multi-item discount rate (default: 0.15)
//! - `STORYPRINT_ADDRESS_POLICY` - `strict` or `permissive` (default: permissive)
//! - `STORYPRINT_CHECKOUT_ORDERING` - `fulfill-then-pay` or `pay-then-fulfill`
//!   (default: fulfill-then-pay)
//! - `STRIPE_BASE_URL` - Payment API base URL (default: <https://api.stripe.com>)
//! - `STRIPE_TEST_PAYMENT_METHOD` - Test-mode payment method for the CLI sheet
//! - `PRINT_API_BASE_URL` - Fulfillment API base URL (default: <https://api.lulu.com>)
//! - `PRINT_API_AUTH_URL` - OAuth token endpoint (default derived from base URL)
//! - `PRINT_API_POD_PACKAGE_ID` - Print package identifier (default: 6x9 color paperback)
//! - `PRINT_API_SHIPPING_LEVEL` - Shipping service level (default: MAIL)

use std::collections::HashMap;
use std::path::PathBuf;

use rust_decimal::Decimal;
use secrecy::SecretString;
use storyprint_core::Currency;
use thiserror::Error;

use crate::checkout::CheckoutOrdering;
use crate::shipping::validator::AddressPolicy;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Top-level checkout configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Directory for the local JSON store (cart, shipping info)
    pub storage_dir: PathBuf,
    /// Cart pricing rule parameters
    pub pricing: PricingConfig,
    /// Payment provider configuration
    pub stripe: StripeConfig,
    /// Print fulfillment provider configuration
    pub print_api: PrintApiConfig,
    /// Policy applied when address validation suggests a correction
    pub address_policy: AddressPolicy,
    /// Order-vs-payment sequencing strategy
    pub ordering: CheckoutOrdering,
    /// Cover source URL attached to every print line item
    pub cover_template_url: String,
}

/// Cart pricing rule parameters.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Price of the first item in the cart
    pub base_price: Decimal,
    /// Discount applied to every item after the first (e.g. 0.15)
    pub discount_rate: Decimal,
    /// Currency all cart prices are denominated in
    pub currency: Currency,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_price: Decimal::new(2199, 2),
            discount_rate: Decimal::new(15, 2),
            currency: Currency::USD,
        }
    }
}

/// Payment provider configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    /// Payment API base URL
    pub base_url: String,
    /// Secret API key (server-side only)
    pub secret_key: SecretString,
    /// Test-mode payment method used by the CLI payment sheet
    pub test_payment_method: Option<String>,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("base_url", &self.base_url)
            .field("secret_key", &"[REDACTED]")
            .field("test_payment_method", &self.test_payment_method)
            .finish()
    }
}

/// Print fulfillment provider configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct PrintApiConfig {
    /// Fulfillment API base URL
    pub base_url: String,
    /// OAuth2 token endpoint (client-credentials grant)
    pub auth_url: String,
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
    /// Fixed print package identifier applied to every line item
    pub pod_package_id: String,
    /// Shipping service level submitted with each job
    pub shipping_level: String,
}

impl std::fmt::Debug for PrintApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintApiConfig")
            .field("base_url", &self.base_url)
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("pod_package_id", &self.pod_package_id)
            .field("shipping_level", &self.shipping_level)
            .finish()
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let storage_dir = PathBuf::from(get_env_or_default("STORYPRINT_STORAGE_DIR", ".storyprint"));
        let pricing = PricingConfig::from_env()?;
        let stripe = StripeConfig::from_env()?;
        let print_api = PrintApiConfig::from_env()?;
        let address_policy = parse_env("STORYPRINT_ADDRESS_POLICY", "permissive")?;
        let ordering = parse_env("STORYPRINT_CHECKOUT_ORDERING", "fulfill-then-pay")?;
        let cover_template_url = get_required_env("STORYPRINT_COVER_TEMPLATE_URL")?;

        Ok(Self {
            storage_dir,
            pricing,
            stripe,
            print_api,
            address_policy,
            ordering,
            cover_template_url,
        })
    }
}

impl PricingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let base_price = get_optional_env("STORYPRINT_BASE_PRICE")
            .map(|v| parse_decimal("STORYPRINT_BASE_PRICE", &v))
            .transpose()?
            .unwrap_or(defaults.base_price);
        let discount_rate = get_optional_env("STORYPRINT_DISCOUNT_RATE")
            .map(|v| parse_decimal("STORYPRINT_DISCOUNT_RATE", &v))
            .transpose()?
            .unwrap_or(defaults.discount_rate);

        Ok(Self {
            base_price,
            discount_rate,
            currency: defaults.currency,
        })
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_env_or_default("STRIPE_BASE_URL", "https://api.stripe.com"),
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            test_payment_method: get_optional_env("STRIPE_TEST_PAYMENT_METHOD"),
        })
    }
}

impl PrintApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_env_or_default("PRINT_API_BASE_URL", "https://api.lulu.com");
        let auth_url = get_optional_env("PRINT_API_AUTH_URL").unwrap_or_else(|| {
            format!("{base_url}/auth/realms/glasstree/protocol/openid-connect/token")
        });

        Ok(Self {
            base_url,
            auth_url,
            client_id: get_required_env("PRINT_API_CLIENT_ID")?,
            client_secret: get_validated_secret("PRINT_API_CLIENT_SECRET")?,
            pod_package_id: get_env_or_default(
                "PRINT_API_POD_PACKAGE_ID",
                "0600X0900FCSTDPB080CW444GXX",
            ),
            shipping_level: get_env_or_default("PRINT_API_SHIPPING_LEVEL", "MAIL"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (with default) via `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = get_env_or_default(key, default);
    value
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a decimal environment variable value.
fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value
        .parse()
        .map_err(|e: rust_decimal::Error| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
