use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Payment provider a park receives deposits through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Payme,
    Click,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Payme => "payme",
            Provider::Click => "click",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "payme" => Ok(Provider::Payme),
            "click" => Ok(Provider::Click),
            other => Err(AppError::Config(format!("unknown provider {other:?}"))),
        }
    }
}

/// One configured integration tenant: credentials, routing identifiers and
/// fee rate scoping everything the pipeline does for a message. Immutable,
/// passed into the orchestrator per invocation.
#[derive(Debug, Clone)]
pub struct ParkContext {
    pub name: String,
    pub provider: Provider,
    pub park_id: String,
    pub client_id: String,
    pub api_key: String,
    /// Raw fee value as configured; normalized by the fee engine.
    pub fee_rate_raw: Option<String>,
    /// Park's own stored default category, if any.
    pub category_id: Option<String>,
    /// Telegram group ids whose messages belong to this park.
    pub telegram_groups: Vec<String>,
    pub currency: String,
}

/// Ordered category resolution sources (tenant-suffix overrides first,
/// provider defaults next, the global default last).
#[derive(Debug, Clone)]
pub struct CategoryDefaults {
    pub by_park_suffix: Vec<(String, String)>,
    pub by_provider: HashMap<Provider, String>,
    pub global: String,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
    pub sticker_success: Option<String>,
    pub sticker_error: Option<String>,
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub fleet_api_base: String,
    pub currency: String,
    pub parks: Vec<ParkContext>,
    pub categories: CategoryDefaults,
    pub telegram: TelegramConfig,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://payments.db?mode=rwc".to_string());
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let fleet_api_base = std::env::var("FLEET_API_BASE")
            .unwrap_or_else(|_| "https://fleet-api.taxi.yandex.net".to_string());
        let currency = std::env::var("CURRENCY").unwrap_or_else(|_| "UZS".to_string());

        let parks = load_parks(&currency)?;
        if parks.is_empty() {
            return Err(AppError::Config(
                "no parks configured: set PARKS to a comma-separated list of park names".into(),
            ));
        }

        Ok(Self {
            database_url,
            bind_address,
            fleet_api_base,
            currency,
            parks,
            categories: load_category_defaults()?,
            telegram: load_telegram_config(),
        })
    }

    /// Resolve the park a Telegram group belongs to.
    pub fn park_for_group(&self, group_id: &str) -> Option<&ParkContext> {
        self.parks
            .iter()
            .find(|park| park.telegram_groups.iter().any(|g| g == group_id))
    }
}

fn load_parks(currency: &str) -> AppResult<Vec<ParkContext>> {
    let names = std::env::var("PARKS").unwrap_or_default();
    let mut parks = Vec::new();

    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let prefix = name.to_uppercase();
        let provider: Provider = require_env(&format!("{prefix}_PROVIDER"))?.parse()?;
        parks.push(ParkContext {
            name: name.to_string(),
            provider,
            park_id: require_env(&format!("{prefix}_PARK_ID"))?,
            client_id: require_env(&format!("{prefix}_CLIENT_ID"))?,
            api_key: require_env(&format!("{prefix}_API_KEY"))?,
            fee_rate_raw: std::env::var(format!("{prefix}_FEE")).ok(),
            category_id: std::env::var(format!("{prefix}_CATEGORY_ID")).ok(),
            telegram_groups: std::env::var(format!("{prefix}_GROUPS"))
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(String::from)
                .collect(),
            currency: currency.to_string(),
        });
    }

    Ok(parks)
}

fn load_category_defaults() -> AppResult<CategoryDefaults> {
    let mut by_provider = HashMap::new();
    if let Ok(category) = std::env::var("PROVIDER_PAYME") {
        by_provider.insert(Provider::Payme, category);
    }
    if let Ok(category) = std::env::var("PROVIDER_CLICK") {
        by_provider.insert(Provider::Click, category);
    }

    // CATEGORY_SUFFIX_OVERRIDES="suffix=category,suffix2=category2"
    let mut by_park_suffix = Vec::new();
    for pair in std::env::var("CATEGORY_SUFFIX_OVERRIDES")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        let (suffix, category) = pair.split_once('=').ok_or_else(|| {
            AppError::Config(format!(
                "CATEGORY_SUFFIX_OVERRIDES entry {pair:?} is not suffix=category"
            ))
        })?;
        by_park_suffix.push((suffix.trim().to_string(), category.trim().to_string()));
    }

    Ok(CategoryDefaults {
        by_park_suffix,
        by_provider,
        global: std::env::var("CATEGORY_DEFAULT").unwrap_or_else(|_| "manual".to_string()),
    })
}

fn load_telegram_config() -> TelegramConfig {
    TelegramConfig {
        enabled: env_bool("TELEGRAM_ENABLED", true),
        bot_token: std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
        chat_id: std::env::var("TELEGRAM_CHAT_ID").unwrap_or_default(),
        sticker_success: std::env::var("TELEGRAM_STICKER_SUCCESS").ok(),
        sticker_error: std::env::var("TELEGRAM_STICKER_ERROR").ok(),
    }
}

fn require_env(key: &str) -> AppResult<String> {
    std::env::var(key).map_err(|_| AppError::Config(format!("{key} must be set")))
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(val) => matches!(
            val.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        Err(_) => default,
    }
}
