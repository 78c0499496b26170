//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL of the shop, used for CSRF origin checks and Stripe return URLs
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `STRIPE_SECRET_KEY` - Stripe API secret key
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `BASE_PRICE` - Base katana price in euros (default: 420)
//! - `DEFAULT_SHIPPING_CENTS` - Shipping charged by default (default: 2500)
//! - `STRIPE_WEBHOOK_SECRET` - Webhook signing secret; the webhook answers 500 without it
//! - `STRIPE_API_BASE` - Stripe API origin (default: <https://api.stripe.com>)
//! - `SMTP_HOST` / `SMTP_PORT` / `SMTP_USER` / `SMTP_PASS` - Mail relay (default: localhost:1025)
//! - `MAIL_FROM` - Sender of quote emails
//! - `PDF_STORAGE_BACKEND` - `local`, `gcs` or `azure` (default: local)
//! - `PDF_STORAGE_DIR` - Local directory for quote PDFs (default: ./storage/quotes)
//! - `PDF_STORAGE_BUCKET` - GCS bucket (required for `gcs`)
//! - `GCS_SIGNED_URL_TTL_SECONDS` - Signed URL lifetime (default: 3600)
//! - `AZURE_BLOB_CONTAINER_URL` / `AZURE_BLOB_SAS_TOKEN` - Azure container (required for `azure`)
//! - `COMPANY_NAME`, `COMPANY_SIRET`, `COMPANY_VAT`, `COMPANY_ADDRESS` (`|` separated),
//!   `COMPANY_PHONE`, `COMPANY_WEBSITE` - Identity printed on quotes
//! - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` - Enables Google sign-in
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use katana_forge_core::Cents;
use katana_forge_core::cart::DEFAULT_SHIPPING_CENTS;
use katana_forge_core::pricing::DEFAULT_BASE_PRICE_EUR;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront, without trailing slash
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Pricing defaults
    pub pricing: PricingConfig,
    /// Stripe API configuration
    pub stripe: StripeConfig,
    /// Outgoing mail configuration
    pub email: EmailConfig,
    /// Where quote PDFs are kept
    pub storage: StorageConfig,
    /// Seller identity printed on quotes
    pub company: CompanyConfig,
    /// Google sign-in, when configured
    pub google: Option<GoogleOAuthConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Pricing defaults.
#[derive(Debug, Clone, Copy)]
pub struct PricingConfig {
    /// Base katana price in euros
    pub base_price_eur: f64,
    /// Shipping used by new carts
    pub default_shipping_cents: Cents,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`)
    pub secret_key: SecretString,
    /// Webhook signing secret (`whsec_...`)
    pub webhook_secret: Option<SecretString>,
    /// API origin, overridable for stripe-mock
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// SMTP configuration.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    /// Sender mailbox, e.g. `Katana Forge <no-reply@kfor.ge>`
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field(
                "smtp_password",
                &self.smtp_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Quote PDF storage backend.
#[derive(Clone)]
pub enum StorageConfig {
    /// Files on the local disk.
    Local { dir: PathBuf },
    /// Google Cloud Storage bucket, authenticated through the metadata server.
    Gcs {
        bucket: String,
        signed_url_ttl_seconds: u64,
    },
    /// Azure Blob Storage container with a SAS token.
    Azure {
        container_url: String,
        sas_token: SecretString,
    },
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { dir } => f.debug_struct("Local").field("dir", dir).finish(),
            Self::Gcs {
                bucket,
                signed_url_ttl_seconds,
            } => f
                .debug_struct("Gcs")
                .field("bucket", bucket)
                .field("signed_url_ttl_seconds", signed_url_ttl_seconds)
                .finish(),
            Self::Azure { container_url, .. } => f
                .debug_struct("Azure")
                .field("container_url", container_url)
                .field("sas_token", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Seller identity printed on quotes.
#[derive(Debug, Clone)]
pub struct CompanyConfig {
    pub name: String,
    pub siret: String,
    pub vat_number: String,
    pub address_lines: Vec<String>,
    pub phone: String,
    pub website: String,
    /// Contact address, taken from the `MAIL_FROM` mailbox.
    pub email: String,
}

/// Google OAuth client.
#[derive(Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for GoogleOAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleOAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl StorefrontConfig {
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

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = normalize_base_url(&get_required_env("STOREFRONT_BASE_URL")?)?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let pricing = PricingConfig::from_env()?;
        let stripe = StripeConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let storage = StorageConfig::from_env()?;
        let company = CompanyConfig::from_env(&base_url, &email.from_address);
        let google = GoogleOAuthConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            pricing,
            stripe,
            email,
            storage,
            company,
            google,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Origin (`scheme://host[:port]`) of the public base URL.
    #[must_use]
    pub fn base_origin(&self) -> String {
        Url::parse(&self.base_url).map_or_else(
            |_| self.base_url.clone(),
            |url| url.origin().ascii_serialization(),
        )
    }

    /// Whether cookies must carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl PricingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_price_eur: f64 =
            parse_env("BASE_PRICE", &DEFAULT_BASE_PRICE_EUR.to_string())?;
        if !base_price_eur.is_finite() || base_price_eur < 0.0 {
            return Err(ConfigError::InvalidEnvVar(
                "BASE_PRICE".to_string(),
                "must be a non-negative number".to_string(),
            ));
        }

        let shipping: u64 = parse_env(
            "DEFAULT_SHIPPING_CENTS",
            &DEFAULT_SHIPPING_CENTS.get().to_string(),
        )?;
        let default_shipping_cents = Cents::new(shipping).map_err(|e| {
            ConfigError::InvalidEnvVar("DEFAULT_SHIPPING_CENTS".to_string(), e.to_string())
        })?;

        Ok(Self {
            base_price_eur,
            default_shipping_cents,
        })
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let webhook_secret = match get_optional_env("STRIPE_WEBHOOK_SECRET") {
            Some(value) => {
                validate_secret_strength(&value, "STRIPE_WEBHOOK_SECRET")?;
                Some(SecretString::from(value))
            }
            None => None,
        };

        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret,
            api_base: get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com")
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            smtp_host: get_env_or_default("SMTP_HOST", "localhost"),
            smtp_port: parse_env("SMTP_PORT", "1025")?,
            smtp_username: get_optional_env("SMTP_USER"),
            smtp_password: get_optional_env("SMTP_PASS").map(SecretString::from),
            from_address: get_env_or_default("MAIL_FROM", "Katana Forge <no-reply@kfor.ge>"),
        })
    }

    /// Credentials are only used when both user and password are set.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &SecretString)> {
        match (&self.smtp_username, &self.smtp_password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass)),
            _ => None,
        }
    }

    /// Port 465 speaks implicit TLS.
    #[must_use]
    pub const fn implicit_tls(&self) -> bool {
        self.smtp_port == 465
    }
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let backend = get_env_or_default("PDF_STORAGE_BACKEND", "local");
        match backend.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local {
                dir: PathBuf::from(get_env_or_default("PDF_STORAGE_DIR", "./storage/quotes")),
            }),
            "gcs" => {
                let ttl: u64 = parse_env("GCS_SIGNED_URL_TTL_SECONDS", "3600")?;
                if ttl == 0 {
                    return Err(ConfigError::InvalidEnvVar(
                        "GCS_SIGNED_URL_TTL_SECONDS".to_string(),
                        "must be positive".to_string(),
                    ));
                }
                Ok(Self::Gcs {
                    bucket: get_required_env("PDF_STORAGE_BUCKET")?,
                    signed_url_ttl_seconds: ttl,
                })
            }
            "azure" => Ok(Self::Azure {
                container_url: get_required_env("AZURE_BLOB_CONTAINER_URL")?
                    .trim_end_matches('/')
                    .to_string(),
                sas_token: SecretString::from(
                    get_required_env("AZURE_BLOB_SAS_TOKEN")?
                        .trim_start_matches('?')
                        .to_string(),
                ),
            }),
            other => Err(ConfigError::InvalidEnvVar(
                "PDF_STORAGE_BACKEND".to_string(),
                format!("unknown backend '{other}' (expected local, gcs or azure)"),
            )),
        }
    }
}

impl CompanyConfig {
    pub(crate) fn from_env(base_url: &str, mail_from: &str) -> Self {
        Self {
            name: get_env_or_default("COMPANY_NAME", "Katana Forge"),
            siret: get_env_or_default("COMPANY_SIRET", "000 000 000 00000"),
            vat_number: get_env_or_default("COMPANY_VAT", "FRXX999999999"),
            address_lines: parse_address_lines(&get_env_or_default(
                "COMPANY_ADDRESS",
                "123 Rue du Sabre|75000 Paris|France",
            )),
            phone: get_env_or_default("COMPANY_PHONE", "+33 1 23 45 67 89"),
            website: get_env_or_default("COMPANY_WEBSITE", base_url),
            email: mailbox_address(mail_from).to_string(),
        }
    }
}

impl GoogleOAuthConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        match (
            get_optional_env("GOOGLE_CLIENT_ID"),
            get_optional_env("GOOGLE_CLIENT_SECRET"),
        ) {
            (Some(client_id), Some(_)) => Ok(Some(Self {
                client_id,
                client_secret: get_validated_secret("GOOGLE_CLIENT_SECRET")?,
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::MissingEnvVar(
                "GOOGLE_CLIENT_SECRET".to_string(),
            )),
            (None, Some(_)) => Err(ConfigError::MissingEnvVar("GOOGLE_CLIENT_ID".to_string())),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable; blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Check the base URL is absolute http(s) and drop any trailing slash.
fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            "STOREFRONT_BASE_URL".to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(raw.trim().trim_end_matches('/').to_string())
}

/// The bare address of a `Name <address>` mailbox.
fn mailbox_address(mailbox: &str) -> &str {
    match (mailbox.find('<'), mailbox.rfind('>')) {
        (Some(start), Some(end)) if start < end => mailbox[start + 1..end].trim(),
        _ => mailbox.trim(),
    }
}

/// Split `|` separated address lines, dropping blanks.
fn parse_address_lines(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

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
