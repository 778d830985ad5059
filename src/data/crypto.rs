//! Crypto on-chain and market-structure data
//!
//! DeFiLlama (TVL) and CoinGecko (exchanges) are keyless; Etherscan gas
//! prices and Glassnode exchange flows need keys and degrade gracefully
//! without them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{DataError, DataResult};

const LLAMA_URL: &str = "https://api.llama.fi";
const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";
const ETHERSCAN_URL: &str = "https://api.etherscan.io/api";
const GLASSNODE_URL: &str = "https://api.glassnode.com/v1/metrics/flows";

/// Daily exchange inflow/outflow for one asset
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeFlow {
    pub timestamp: String,
    pub exchange: String,
    pub inflow: f64,
    pub outflow: f64,
    pub netflow: f64,
    pub asset: String,
    /// "glassnode" for real data, "synthetic" for the keyless zero series
    pub source: &'static str,
}

/// One exchange row from CoinGecko
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeInfo {
    pub name: Option<String>,
    pub id: Option<String>,
    pub trust_score: Option<i64>,
    #[serde(rename = "trade_volume_24h_btc")]
    pub volume_24h_btc: Option<f64>,
    #[serde(rename = "trade_volume_24h_btc_normalized")]
    pub volume_24h_normalized: Option<f64>,
    pub year_established: Option<i64>,
    pub country: Option<String>,
    pub url: Option<String>,
}

/// Ethereum gas oracle snapshot, in gwei
#[derive(Debug, Clone, Serialize)]
pub struct GasPrices {
    pub safe_low: Option<String>,
    pub standard: Option<String>,
    pub fast: Option<String>,
    pub base_fee: Option<String>,
    pub unit: &'static str,
}

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    result: Option<GasOracle>,
}

#[derive(Debug, Deserialize)]
struct GasOracle {
    #[serde(rename = "SafeGasPrice")]
    safe_gas_price: Option<String>,
    #[serde(rename = "ProposeGasPrice")]
    propose_gas_price: Option<String>,
    #[serde(rename = "FastGasPrice")]
    fast_gas_price: Option<String>,
    #[serde(rename = "suggestBaseFee")]
    suggest_base_fee: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlassnodePoint {
    t: i64,
    v: f64,
}

pub struct CryptoClient {
    client: reqwest::Client,
    etherscan_api_key: Option<String>,
    glassnode_api_key: Option<String>,
}

impl CryptoClient {
    pub fn new(etherscan_api_key: Option<String>, glassnode_api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("findata/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            etherscan_api_key,
            glassnode_api_key,
        }
    }

    /// DeFi total value locked: one protocol, or the global aggregate with a
    /// 30-day history
    pub async fn defi_tvl(&self, protocol: Option<&str>) -> DataResult<serde_json::Value> {
        match protocol {
            Some(name) => {
                let slug = validate_protocol_slug(name)?;
                tracing::info!("Fetching DeFiLlama TVL for {}", slug);

                let url = format!("{}/protocol/{}", LLAMA_URL, slug);
                let body: serde_json::Value = self.get_json(&url).await?;
                if body.get("name").is_none() {
                    return Err(DataError::no_data(slug.as_str(), "defillama"));
                }

                let current_tvl = body["tvl"]
                    .as_array()
                    .and_then(|points| points.last())
                    .and_then(|p| p["totalLiquidityUSD"].as_f64());

                Ok(json!({
                    "protocol": body["name"],
                    "category": body["category"],
                    "chain": body["chain"],
                    "chains": body["chains"],
                    "current_tvl_usd": current_tvl,
                }))
            }
            None => {
                tracing::info!("Fetching global DeFi TVL");
                let url = format!("{}/charts", LLAMA_URL);
                let body: serde_json::Value = self.get_json(&url).await?;
                let points = body
                    .as_array()
                    .ok_or_else(|| DataError::parse_error("expected a TVL point array"))?;
                let latest = points
                    .last()
                    .ok_or_else(|| DataError::no_data("defi", "defillama"))?;

                let history: Vec<serde_json::Value> = points
                    .iter()
                    .rev()
                    .take(30)
                    .rev()
                    .map(|p| {
                        json!({
                            "date": p["date"],
                            "tvl": p["totalLiquidityUSD"],
                        })
                    })
                    .collect();

                Ok(json!({
                    "total_tvl_usd": latest["totalLiquidityUSD"],
                    "date": latest["date"],
                    "historical": history,
                }))
            }
        }
    }

    /// Top exchanges by 24h volume
    pub async fn top_exchanges(&self, limit: usize) -> DataResult<Vec<ExchangeInfo>> {
        let limit = limit.clamp(1, 100);
        tracing::info!("Fetching top {} exchanges from CoinGecko", limit);

        let url = format!("{}/exchanges?per_page={}&page=1", COINGECKO_URL, limit);
        let mut exchanges: Vec<ExchangeInfo> = self.get_json(&url).await?;
        exchanges.truncate(limit);
        Ok(exchanges)
    }

    /// Current Ethereum gas prices from the Etherscan oracle
    pub async fn gas_prices(&self) -> DataResult<GasPrices> {
        let api_key = self.etherscan_api_key.as_deref().ok_or_else(|| {
            DataError::Config("ETHERSCAN_API_KEY not set; gas prices unavailable.".to_string())
        })?;

        let url = format!(
            "{}?module=gastracker&action=gasoracle&apikey={}",
            ETHERSCAN_URL, api_key
        );
        let body: EtherscanResponse = self.get_json(&url).await?;

        if body.status != "1" {
            return Err(DataError::no_data("ethereum_gas", "etherscan"));
        }
        let oracle = body
            .result
            .ok_or_else(|| DataError::parse_error("gas oracle payload missing result"))?;

        Ok(GasPrices {
            safe_low: oracle.safe_gas_price,
            standard: oracle.propose_gas_price,
            fast: oracle.fast_gas_price,
            base_fee: oracle.suggest_base_fee,
            unit: "gwei",
        })
    }

    /// Daily exchange flows for an asset. Real data needs a Glassnode key;
    /// without one a zero-valued series is synthesized so callers keep a
    /// stable shape, tagged by its `source` field.
    pub async fn exchange_flows(&self, asset: &str, days: i64) -> DataResult<Vec<ExchangeFlow>> {
        let asset = super::validation::sanitize_ticker(asset)?;
        if !(1..=365).contains(&days) {
            return Err(DataError::validation_error(
                "days",
                "must be between 1 and 365",
            ));
        }

        match self.glassnode_api_key.as_deref() {
            Some(key) => self.glassnode_flows(&asset, days, key).await,
            None => {
                tracing::warn!("GLASSNODE_API_KEY not set; returning synthetic zero flows");
                Ok(synthetic_flows(&asset, days, Utc::now()))
            }
        }
    }

    async fn glassnode_flows(
        &self,
        asset: &str,
        days: i64,
        api_key: &str,
    ) -> DataResult<Vec<ExchangeFlow>> {
        let until = Utc::now();
        let since = until - chrono::Duration::days(days);

        let inflow = self
            .glassnode_metric("exchange_inflow", asset, since.timestamp(), until.timestamp(), api_key)
            .await?;
        let outflow = self
            .glassnode_metric("exchange_outflow", asset, since.timestamp(), until.timestamp(), api_key)
            .await?;

        Ok(pair_flows(asset, &inflow, &outflow))
    }

    async fn glassnode_metric(
        &self,
        metric: &str,
        asset: &str,
        since: i64,
        until: i64,
        api_key: &str,
    ) -> DataResult<Vec<GlassnodePoint>> {
        let url = format!(
            "{}/{}?a={}&s={}&u={}&i=24h&api_key={}",
            GLASSNODE_URL, metric, asset, since, until, api_key
        );
        tracing::debug!(
            "Glassnode request: GET {}",
            super::redact_key(&url, api_key)
        );
        self.get_json(&url).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> DataResult<T> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(DataError::api_error(
                response.status().as_u16(),
                "crypto data request failed",
            ));
        }
        Ok(response.json().await?)
    }
}

/// DeFiLlama protocol slugs are lowercase with dashes (e.g. `aave-v3`)
fn validate_protocol_slug(raw: &str) -> DataResult<String> {
    let slug = raw.trim().to_lowercase();
    let valid = !slug.is_empty()
        && slug.len() <= 100
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(slug)
    } else {
        Err(DataError::Validation {
            field: "protocol".to_string(),
            message: format!("'{}' is not a valid protocol slug", raw),
        })
    }
}

/// Pair inflow/outflow samples by index into daily net flows
fn pair_flows(asset: &str, inflow: &[GlassnodePoint], outflow: &[GlassnodePoint]) -> Vec<ExchangeFlow> {
    inflow
        .iter()
        .enumerate()
        .filter_map(|(i, point)| {
            let timestamp = DateTime::from_timestamp(point.t, 0)?;
            let out = outflow.get(i).map(|p| p.v).unwrap_or(0.0);
            Some(ExchangeFlow {
                timestamp: timestamp.to_rfc3339(),
                exchange: "aggregated".to_string(),
                inflow: point.v,
                outflow: out,
                netflow: point.v - out,
                asset: asset.to_string(),
                source: "glassnode",
            })
        })
        .collect()
}

/// Keyless fallback: one zero-valued row per day, newest first
fn synthetic_flows(asset: &str, days: i64, now: DateTime<Utc>) -> Vec<ExchangeFlow> {
    (0..days)
        .map(|i| ExchangeFlow {
            timestamp: (now - chrono::Duration::days(i)).to_rfc3339(),
            exchange: "aggregated".to_string(),
            inflow: 0.0,
            outflow: 0.0,
            netflow: 0.0,
            asset: asset.to_string(),
            source: "synthetic",
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_protocol_slug_validation() {
        assert_eq!(validate_protocol_slug("Aave-V3").expect("valid"), "aave-v3");
        assert_eq!(validate_protocol_slug("uniswap").expect("valid"), "uniswap");
        assert!(validate_protocol_slug("../secrets").is_err());
        assert!(validate_protocol_slug("").is_err());
        assert!(validate_protocol_slug("name with spaces").is_err());
    }

    #[test]
    fn test_parse_exchange_rows() {
        let raw = r#"[{
            "id": "binance",
            "name": "Binance",
            "year_established": 2017,
            "country": "Cayman Islands",
            "url": "https://www.binance.com/",
            "trust_score": 10,
            "trade_volume_24h_btc": 214000.5,
            "trade_volume_24h_btc_normalized": 180000.25
        }]"#;

        let exchanges: Vec<ExchangeInfo> = serde_json::from_str(raw).expect("fixture parses");
        assert_eq!(exchanges[0].name.as_deref(), Some("Binance"));
        assert_eq!(exchanges[0].trust_score, Some(10));
        assert_eq!(exchanges[0].volume_24h_btc, Some(214000.5));
    }

    #[test]
    fn test_parse_gas_oracle() {
        let raw = r#"{
            "status": "1",
            "message": "OK",
            "result": {
                "LastBlock": "19999999",
                "SafeGasPrice": "8",
                "ProposeGasPrice": "9",
                "FastGasPrice": "12",
                "suggestBaseFee": "7.41"
            }
        }"#;

        let parsed: EtherscanResponse = serde_json::from_str(raw).expect("fixture parses");
        assert_eq!(parsed.status, "1");
        let oracle = parsed.result.expect("result present");
        assert_eq!(oracle.propose_gas_price.as_deref(), Some("9"));
    }

    #[test]
    fn test_pair_flows_net() {
        let inflow = vec![
            GlassnodePoint { t: 1717372800, v: 1200.0 },
            GlassnodePoint { t: 1717459200, v: 800.0 },
        ];
        let outflow = vec![GlassnodePoint { t: 1717372800, v: 900.0 }];

        let flows = pair_flows("BTC", &inflow, &outflow);
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[0].netflow, 300.0);
        // Missing outflow sample falls back to zero
        assert_eq!(flows[1].netflow, 800.0);
        assert_eq!(flows[0].source, "glassnode");
    }

    #[test]
    fn test_synthetic_flows_shape() {
        let now = Utc.with_ymd_and_hms(2024, 6, 5, 0, 0, 0).single().expect("valid");
        let flows = synthetic_flows("BTC", 7, now);

        assert_eq!(flows.len(), 7);
        assert!(flows.iter().all(|f| f.source == "synthetic"));
        assert!(flows.iter().all(|f| f.netflow == 0.0));
        assert!(flows[0].timestamp.starts_with("2024-06-05"));
        assert!(flows[6].timestamp.starts_with("2024-05-30"));
    }

    #[tokio::test]
    async fn test_gas_without_key_is_config_error() {
        let client = CryptoClient::new(None, None);
        match client.gas_prices().await {
            Err(DataError::Config(msg)) => assert!(msg.contains("ETHERSCAN_API_KEY")),
            other => panic!("expected config error, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_flows_without_key_are_synthetic() {
        let client = CryptoClient::new(None, None);
        let flows = client.exchange_flows("BTC", 5).await.expect("synthetic series");
        assert_eq!(flows.len(), 5);
        assert_eq!(flows[0].source, "synthetic");
    }

    #[tokio::test]
    async fn test_flow_days_bounds() {
        let client = CryptoClient::new(None, None);
        assert!(matches!(
            client.exchange_flows("BTC", 0).await,
            Err(DataError::Validation { .. })
        ));
    }
}
