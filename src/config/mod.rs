use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub apis: ApiConfig,
    pub http: HttpConfig,
}

/// Optional per-provider credentials. A missing key disables that provider's
/// functions with a configuration error record; nothing panics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub alpha_vantage_api_key: Option<String>,
    pub news_api_key: Option<String>,
    pub fred_api_key: Option<String>,
    pub etherscan_api_key: Option<String>,
    pub glassnode_api_key: Option<String>,
    /// SEC EDGAR requires a descriptive User-Agent identifying the caller
    pub sec_user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
}

const DEFAULT_SEC_USER_AGENT: &str =
    concat!("findata/", env!("CARGO_PKG_VERSION"), " research@findata.dev");

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file - this sets env vars that aren't already set
        dotenv::dotenv().ok();

        let config = Config {
            apis: ApiConfig {
                alpha_vantage_api_key: env::var("ALPHA_VANTAGE_API_KEY").ok(),
                news_api_key: env::var("NEWS_API_KEY").ok(),
                fred_api_key: env::var("FRED_API_KEY").ok(),
                etherscan_api_key: env::var("ETHERSCAN_API_KEY").ok(),
                glassnode_api_key: env::var("GLASSNODE_API_KEY").ok(),
                sec_user_agent: env::var("SEC_USER_AGENT")
                    .unwrap_or_else(|_| DEFAULT_SEC_USER_AGENT.to_string()),
            },
            http: HttpConfig {
                timeout_seconds: env::var("FINDATA_HTTP_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .context("Invalid FINDATA_HTTP_TIMEOUT_SECONDS value")?,
            },
        };

        Ok(config)
    }

    /// Providers with credentials configured, for startup logging
    pub fn enabled_providers(&self) -> Vec<&'static str> {
        let mut enabled = vec!["sec_edgar", "yahoo", "defillama", "coingecko"];
        if self.apis.alpha_vantage_api_key.is_some() {
            enabled.push("alpha_vantage");
        }
        if self.apis.news_api_key.is_some() {
            enabled.push("newsapi");
        }
        if self.apis.fred_api_key.is_some() {
            enabled.push("fred");
        }
        if self.apis.etherscan_api_key.is_some() {
            enabled.push("etherscan");
        }
        if self.apis.glassnode_api_key.is_some() {
            enabled.push("glassnode");
        }
        enabled
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            apis: ApiConfig {
                alpha_vantage_api_key: None,
                news_api_key: None,
                fred_api_key: None,
                etherscan_api_key: None,
                glassnode_api_key: None,
                sec_user_agent: DEFAULT_SEC_USER_AGENT.to_string(),
            },
            http: HttpConfig {
                timeout_seconds: 15,
            },
        }
    }
}
