use crate::datasource::coingecko::DEFAULT_PRICE_API_URL;
use crate::domain::Decimal;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub ledger_rpc_url: String,
    pub price_api_url: String,
    pub price_cache_path: String,
    /// Default account for trades and valuation. Validated where used, so
    /// price-only deployments can omit it.
    pub fund_address: Option<String>,
    pub pool_module: String,
    pub quote_asset: String,
    pub base_asset: String,
    pub fee_asset: String,
    pub shares_outstanding: Decimal,
    pub page_limit: usize,
    pub page_delay_ms: u64,
    /// When set, spot prices come from this candle CSV instead of the
    /// HTTP price API.
    pub candle_feed_path: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let ledger_rpc_url = env_map
            .get("LEDGER_RPC_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("LEDGER_RPC_URL".to_string()))?;

        let price_api_url = env_map
            .get("PRICE_API_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PRICE_API_URL.to_string());

        let price_cache_path = env_map
            .get("PRICE_CACHE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("PRICE_CACHE_PATH".to_string()))?;

        let fund_address = env_map
            .get("FUND_ADDRESS")
            .filter(|s| !s.is_empty())
            .cloned();

        let pool_module = env_map
            .get("POOL_MODULE")
            .cloned()
            .unwrap_or_else(|| "pool".to_string());

        let quote_asset = env_map
            .get("QUOTE_ASSET")
            .cloned()
            .unwrap_or_else(|| "USDC".to_string());

        let base_asset = env_map
            .get("BASE_ASSET")
            .cloned()
            .unwrap_or_else(|| "SUI".to_string());

        let fee_asset = env_map
            .get("FEE_ASSET")
            .cloned()
            .unwrap_or_else(|| "DEEP".to_string());

        let shares_outstanding = Decimal::from_str_canonical(
            env_map
                .get("SHARES_OUTSTANDING")
                .map(|s| s.as_str())
                .unwrap_or("998942"),
        )
        .map_err(|_| {
            ConfigError::InvalidValue(
                "SHARES_OUTSTANDING".to_string(),
                "must be numeric".to_string(),
            )
        })?;

        let page_limit = env_map
            .get("PAGE_LIMIT")
            .map(|s| s.as_str())
            .unwrap_or("50")
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "PAGE_LIMIT".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let page_delay_ms = env_map
            .get("PAGE_DELAY_MS")
            .map(|s| s.as_str())
            .unwrap_or("200")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "PAGE_DELAY_MS".to_string(),
                    "must be an integer (milliseconds)".to_string(),
                )
            })?;

        let candle_feed_path = env_map
            .get("CANDLE_FEED_PATH")
            .filter(|s| !s.is_empty())
            .cloned();

        Ok(Config {
            port,
            ledger_rpc_url,
            price_api_url,
            price_cache_path,
            fund_address,
            pool_module,
            quote_asset,
            base_asset,
            fee_asset,
            shares_outstanding,
            page_limit,
            page_delay_ms,
            candle_feed_path,
        })
    }
}
