use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub integrations: IntegrationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_busy_timeout_secs() -> u64 {
    5
}

/// Which gateway `beginPayment` and the callback endpoint talk to.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    /// Local order ids and self-signed callbacks, used when no provider
    /// credentials are configured.
    #[default]
    Sandbox,
    Razorpay,
    Stripe,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    #[serde(default)]
    pub provider: PaymentProvider,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_sandbox_secret")]
    pub sandbox_secret: String,
    pub razorpay: Option<RazorpayConfig>,
    pub stripe: Option<StripeConfig>,
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_sandbox_secret() -> String {
    "sandbox-secret-change-me".to_string()
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            provider: PaymentProvider::Sandbox,
            currency: default_currency(),
            sandbox_secret: default_sandbox_secret(),
            razorpay: None,
            stripe: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    #[serde(default = "default_razorpay_api_base")]
    pub api_base: String,
}

fn default_razorpay_api_base() -> String {
    "https://api.razorpay.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    /// Pending bookings older than this are failed by the sweeper and their
    /// seat or zone units released. Zero disables the sweeper.
    pub pending_timeout_minutes: i64,
    pub sweep_interval_secs: u64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            pending_timeout_minutes: 15,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IntegrationConfig {
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://boxoffice.db")?
            .set_default("database.max_connections", 10)?
            .set_default("payments.provider", "sandbox")?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with BOXOFFICE__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("BOXOFFICE").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://boxoffice.db".to_string(),
                max_connections: 10,
                busy_timeout_secs: default_busy_timeout_secs(),
            },
            payments: PaymentsConfig::default(),
            booking: BookingConfig::default(),
            integrations: IntegrationConfig { webhook: None },
        }
    }
}
