//! Yahoo Finance client for global market data
//!
//! Covers any listing Yahoo quotes: US equities, exchange-suffixed Asian and
//! European listings, world indices, futures and commodity ETF proxies.
//! Uses the unofficial v8/v10 endpoints; data is delayed ~15 minutes and
//! intended for personal/research use.

use std::time::Duration;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::validation::sanitize_ticker;
use super::{DataError, DataResult, PricePoint};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

/// Exchange suffix for a non-US listing, e.g. `("0700", "hong_kong")` -> `0700.HK`
pub const MARKET_SUFFIXES: &[(&str, &str)] = &[
    ("hong_kong", ".HK"),
    ("tokyo", ".T"),
    ("taiwan", ".TW"),
    ("korea", ".KS"),
    ("shanghai", ".SS"),
    ("shenzhen", ".SZ"),
    ("singapore", ".SI"),
    ("australia", ".AX"),
    ("london", ".L"),
    ("germany", ".DE"),
    ("paris", ".PA"),
    ("toronto", ".TO"),
    ("bombay", ".BO"),
    ("nse", ".NS"),
];

/// Major world indices by friendly key
pub const MAJOR_INDICES: &[(&str, &str)] = &[
    ("sp500", "^GSPC"),
    ("dow_jones", "^DJI"),
    ("nasdaq", "^IXIC"),
    ("russell2000", "^RUT"),
    ("vix", "^VIX"),
    ("nikkei225", "^N225"),
    ("hang_seng", "^HSI"),
    ("shanghai_composite", "000001.SS"),
    ("csi300", "000300.SS"),
    ("taiwan_weighted", "^TWII"),
    ("kospi", "^KS11"),
    ("sensex", "^BSESN"),
    ("nifty50", "^NSEI"),
    ("straits_times", "^STI"),
    ("ftse100", "^FTSE"),
    ("dax", "^GDAXI"),
    ("cac40", "^FCHI"),
    ("euro_stoxx50", "^STOXX50E"),
    ("asx200", "^AXJO"),
    ("tsx", "^GSPTSE"),
];

/// Index and commodity futures by friendly key
pub const FUTURES: &[(&str, &str)] = &[
    ("es", "ES=F"),
    ("nq", "NQ=F"),
    ("ym", "YM=F"),
    ("rty", "RTY=F"),
    ("nikkei_futures", "NKD=F"),
    ("crude_oil", "CL=F"),
    ("brent_oil", "BZ=F"),
    ("natural_gas", "NG=F"),
    ("gold", "GC=F"),
    ("silver", "SI=F"),
    ("copper", "HG=F"),
    ("platinum", "PL=F"),
    ("palladium", "PA=F"),
    ("corn", "ZC=F"),
    ("wheat", "ZW=F"),
    ("soybeans", "ZS=F"),
    ("coffee", "KC=F"),
    ("sugar", "SB=F"),
    ("cotton", "CT=F"),
];

/// Commodity ETFs usable as spot-price proxies
pub const COMMODITY_ETFS: &[(&str, &str)] = &[
    ("gold_spot", "GLD"),
    ("silver_spot", "SLV"),
    ("gold_miners", "GDX"),
    ("junior_gold", "GDXJ"),
    ("oil_etf", "USO"),
    ("brent_etf", "BNO"),
    ("natural_gas_etf", "UNG"),
    ("commodities_broad", "DBC"),
    ("agriculture", "DBA"),
    ("base_metals", "DBB"),
    ("energy", "DBE"),
    ("uranium", "URA"),
    ("lithium", "LIT"),
    ("copper_miners", "COPX"),
];

fn catalog_lookup(catalog: &[(&'static str, &'static str)], kind: &str, key: &str) -> DataResult<&'static str> {
    catalog
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, symbol)| *symbol)
        .ok_or_else(|| DataError::Validation {
            field: kind.to_string(),
            message: format!(
                "unknown {} '{}'. Available: {}",
                kind,
                key,
                catalog
                    .iter()
                    .map(|(k, _)| *k)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
}

/// Resolve a friendly index key (`sp500`, `nikkei225`, ...) to its symbol
pub fn index_symbol(key: &str) -> DataResult<&'static str> {
    catalog_lookup(MAJOR_INDICES, "index", key)
}

/// Resolve a friendly futures key (`es`, `crude_oil`, ...) to its symbol
pub fn future_symbol(key: &str) -> DataResult<&'static str> {
    catalog_lookup(FUTURES, "future", key)
}

/// Resolve a commodity ETF key (`gold_spot`, `oil_etf`, ...) to its symbol
pub fn commodity_etf_symbol(key: &str) -> DataResult<&'static str> {
    catalog_lookup(COMMODITY_ETFS, "commodity_etf", key)
}

/// Build the Yahoo symbol for a local exchange code,
/// e.g. `listed_symbol("0700", "hong_kong")` -> `0700.HK`
pub fn listed_symbol(code: &str, market: &str) -> DataResult<String> {
    let suffix = catalog_lookup(MARKET_SUFFIXES, "market", market)?;
    sanitize_ticker(&format!("{}{}", code.trim(), suffix))
}

/// Company/listing metadata from quoteSummary
#[derive(Debug, Clone, Serialize)]
pub struct StockInfo {
    pub symbol: String,
    pub name: String,
    pub currency: String,
    pub market: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
}

/// Lightweight realtime quote from the chart meta block
#[derive(Debug, Clone, Serialize)]
pub struct CurrentPrice {
    pub symbol: String,
    pub price: Option<f64>,
    pub previous_close: Option<f64>,
    pub currency: Option<String>,
    pub exchange: Option<String>,
    pub market_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartSection,
}

#[derive(Debug, Deserialize)]
struct ChartSection {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(rename = "previousClose")]
    previous_close: Option<f64>,
    currency: Option<String>,
    #[serde(rename = "exchangeName")]
    exchange_name: Option<String>,
    #[serde(rename = "marketState")]
    market_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
    adjclose: Option<Vec<AdjCloseBlock>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseBlock {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

pub struct YahooFinanceClient {
    client: reqwest::Client,
}

impl YahooFinanceClient {
    pub fn new() -> Self {
        // Yahoo rejects non-browser user agents on some edges
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }

    /// Historical bars for any Yahoo symbol, oldest first.
    /// `period`: 1d 5d 1mo 3mo 6mo 1y 2y 5y 10y ytd max
    /// `interval`: 1m 2m 5m 15m 30m 60m 90m 1h 1d 5d 1wk 1mo 3mo
    pub async fn price_history(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> DataResult<Vec<PricePoint>> {
        let symbol = sanitize_ticker(symbol)?;
        validate_interval(interval)?;

        let now = Utc::now();
        let start = period_start(period, now)?;
        tracing::info!("Fetching Yahoo history for {} over {}", symbol, period);

        let url = format!("{}/{}", CHART_URL, symbol);
        let params = [
            ("period1", start.timestamp().to_string()),
            ("period2", now.timestamp().to_string()),
            ("interval", interval.to_string()),
            ("events", "history".to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ];

        super::retry::retry_with_backoff(
            || async {
                let response = self.client.get(&url).query(&params).send().await?;
                if !response.status().is_success() {
                    return Err(DataError::api_error(
                        response.status().as_u16(),
                        "Yahoo Finance chart request failed",
                    ));
                }

                let body: ChartResponse = response.json().await?;
                let result = body
                    .chart
                    .result
                    .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
                    .ok_or_else(|| DataError::no_data(symbol.as_str(), "yahoo"))?;

                let bars = bars_from_chart(&result);
                if bars.is_empty() {
                    return Err(DataError::no_data(symbol.as_str(), "yahoo"));
                }
                Ok(bars)
            },
            2,
        )
        .await
    }

    /// Listing metadata: name, exchange, sector, valuation ratios
    pub async fn stock_info(&self, symbol: &str) -> DataResult<StockInfo> {
        let symbol = sanitize_ticker(symbol)?;
        tracing::info!("Fetching Yahoo quote summary for {}", symbol);

        let url = format!("{}/{}", SUMMARY_URL, symbol);
        let response = self
            .client
            .get(&url)
            .query(&[("modules", "assetProfile,summaryDetail,price")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataError::api_error(
                response.status().as_u16(),
                "Yahoo Finance quoteSummary request failed",
            ));
        }

        let body: serde_json::Value = response.json().await?;
        let result = &body["quoteSummary"]["result"][0];
        if result.is_null() {
            return Err(DataError::no_data(symbol.as_str(), "yahoo"));
        }

        let profile = &result["assetProfile"];
        let summary = &result["summaryDetail"];
        let price = &result["price"];

        Ok(StockInfo {
            name: price["longName"]
                .as_str()
                .or_else(|| price["shortName"].as_str())
                .unwrap_or(symbol.as_str())
                .to_string(),
            currency: price["currency"].as_str().unwrap_or("USD").to_string(),
            market: price["exchangeName"].as_str().unwrap_or("Unknown").to_string(),
            sector: profile["sector"].as_str().map(String::from),
            industry: profile["industry"].as_str().map(String::from),
            market_cap: raw_number(&summary["marketCap"]),
            pe_ratio: raw_number(&summary["trailingPE"]),
            dividend_yield: raw_number(&summary["dividendYield"]),
            fifty_two_week_high: raw_number(&summary["fiftyTwoWeekHigh"]),
            fifty_two_week_low: raw_number(&summary["fiftyTwoWeekLow"]),
            symbol,
        })
    }

    /// Realtime quote (price, previous close, market state)
    pub async fn current_price(&self, symbol: &str) -> DataResult<CurrentPrice> {
        let symbol = sanitize_ticker(symbol)?;

        let url = format!("{}/{}", CHART_URL, symbol);
        let response = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", "1d")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataError::api_error(
                response.status().as_u16(),
                "Yahoo Finance chart request failed",
            ));
        }

        let body: ChartResponse = response.json().await?;
        let meta = body
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .map(|r| r.meta)
            .ok_or_else(|| DataError::no_data(symbol.as_str(), "yahoo"))?;

        Ok(CurrentPrice {
            symbol,
            price: meta.regular_market_price,
            previous_close: meta.previous_close,
            currency: meta.currency,
            exchange: meta.exchange_name,
            market_state: meta.market_state,
        })
    }

    /// History for a major index by friendly key
    pub async fn index_history(&self, key: &str, period: &str) -> DataResult<Vec<PricePoint>> {
        self.price_history(index_symbol(key)?, period, "1d").await
    }

    /// History for a futures contract by friendly key
    pub async fn future_history(&self, key: &str, period: &str) -> DataResult<Vec<PricePoint>> {
        self.price_history(future_symbol(key)?, period, "1d").await
    }

    /// History for a commodity ETF proxy by friendly key
    pub async fn commodity_etf_history(
        &self,
        key: &str,
        period: &str,
    ) -> DataResult<Vec<PricePoint>> {
        self.price_history(commodity_etf_symbol(key)?, period, "1d")
            .await
    }
}

impl Default for YahooFinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Yahoo wraps scalar fields as {raw, fmt}; older payloads inline the number
fn raw_number(value: &serde_json::Value) -> Option<f64> {
    value["raw"].as_f64().or_else(|| value.as_f64())
}

/// Zip timestamps with the quote/adjclose arrays, skipping null slots
fn bars_from_chart(result: &ChartResult) -> Vec<PricePoint> {
    let quote = match result.indicators.quote.first() {
        Some(q) => q,
        None => return Vec::new(),
    };
    let adjclose = result
        .indicators
        .adjclose
        .as_ref()
        .and_then(|blocks| blocks.first());

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let date = match DateTime::from_timestamp(ts, 0) {
            Some(dt) => dt.date_naive().to_string(),
            None => continue,
        };
        let (open, high, low, close) = match (
            slot(&quote.open, i),
            slot(&quote.high, i),
            slot(&quote.low, i),
            slot(&quote.close, i),
        ) {
            (Some(o), Some(h), Some(l), Some(c)) => (o, h, l, c),
            _ => continue,
        };

        bars.push(PricePoint {
            date,
            open,
            high,
            low,
            close,
            volume: slot(&quote.volume, i).unwrap_or(0),
            adjusted_close: adjclose.and_then(|a| slot(&a.adjclose, i)).or(Some(close)),
        });
    }
    bars
}

fn slot<T: Copy>(values: &[Option<T>], i: usize) -> Option<T> {
    values.get(i).copied().flatten()
}

fn validate_interval(interval: &str) -> DataResult<()> {
    const ALLOWED: &[&str] = &[
        "1m", "2m", "5m", "15m", "30m", "60m", "90m", "1h", "1d", "5d", "1wk", "1mo", "3mo",
    ];
    if ALLOWED.contains(&interval) {
        Ok(())
    } else {
        Err(DataError::Validation {
            field: "interval".to_string(),
            message: format!("unsupported interval '{}'", interval),
        })
    }
}

/// Convert a period token to the chart window start
fn period_start(period: &str, now: DateTime<Utc>) -> DataResult<DateTime<Utc>> {
    let days = match period {
        "1d" => 1,
        "5d" => 5,
        "1mo" => 30,
        "3mo" => 90,
        "6mo" => 180,
        "1y" => 365,
        "2y" => 730,
        "5y" => 1825,
        "10y" => 3650,
        "max" => 365 * 20,
        "ytd" => {
            return Utc
                .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
                .single()
                .ok_or_else(|| DataError::Internal("year start out of range".to_string()));
        }
        other => {
            return Err(DataError::Validation {
                field: "period".to_string(),
                message: format!(
                    "unknown period '{}', expected 1d 5d 1mo 3mo 6mo 1y 2y 5y 10y ytd max",
                    other
                ),
            });
        }
    };
    Ok(now - chrono::Duration::days(days))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHART_FIXTURE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "regularMarketPrice": 430.5,
                    "previousClose": 428.0,
                    "currency": "USD",
                    "exchangeName": "NasdaqGS",
                    "marketState": "CLOSED"
                },
                "timestamp": [1717372800, 1717459200, 1717545600],
                "indicators": {
                    "quote": [{
                        "open": [427.1, null, 430.0],
                        "high": [429.9, 430.2, 432.5],
                        "low": [426.0, 428.1, 429.4],
                        "close": [428.0, 429.7, 430.5],
                        "volume": [41000000, 38000000, null]
                    }],
                    "adjclose": [{"adjclose": [427.6, 429.3, 430.5]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_bars_skip_null_slots() {
        let body: ChartResponse = serde_json::from_str(CHART_FIXTURE).expect("fixture parses");
        let result = &body.chart.result.expect("result present")[0];
        let bars = bars_from_chart(result);

        // The middle bar has a null open and is dropped
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, "2024-06-03");
        assert_eq!(bars[1].date, "2024-06-05");
        assert_eq!(bars[0].adjusted_close, Some(427.6));
        assert_eq!(bars[1].volume, 0);
    }

    #[test]
    fn test_meta_parses() {
        let body: ChartResponse = serde_json::from_str(CHART_FIXTURE).expect("fixture parses");
        let meta = &body.chart.result.expect("result present")[0].meta;
        assert_eq!(meta.regular_market_price, Some(430.5));
        assert_eq!(meta.market_state.as_deref(), Some("CLOSED"));
    }

    #[test]
    fn test_period_start_tokens() {
        let now = Utc.with_ymd_and_hms(2024, 6, 5, 12, 0, 0).single().expect("valid");
        let start = period_start("1y", now).expect("valid period");
        assert_eq!((now - start).num_days(), 365);

        let ytd = period_start("ytd", now).expect("valid period");
        assert_eq!(ytd.date_naive().to_string(), "2024-01-01");

        assert!(period_start("7w", now).is_err());
    }

    #[test]
    fn test_catalog_lookups() {
        assert_eq!(index_symbol("sp500").expect("known"), "^GSPC");
        assert_eq!(index_symbol("hang_seng").expect("known"), "^HSI");
        assert_eq!(future_symbol("gold").expect("known"), "GC=F");
        assert_eq!(commodity_etf_symbol("oil_etf").expect("known"), "USO");

        match index_symbol("sp9000") {
            Err(DataError::Validation { message, .. }) => {
                assert!(message.contains("sp500"), "lists available keys");
            }
            other => panic!("expected validation error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_listed_symbol_suffixes() {
        assert_eq!(listed_symbol("0700", "hong_kong").expect("valid"), "0700.HK");
        assert_eq!(listed_symbol("7203", "tokyo").expect("valid"), "7203.T");
        assert_eq!(listed_symbol("005930", "korea").expect("valid"), "005930.KS");
        assert!(listed_symbol("0700", "mars").is_err());
    }

    #[test]
    fn test_interval_allow_list() {
        assert!(validate_interval("1d").is_ok());
        assert!(validate_interval("1wk").is_ok());
        assert!(validate_interval("4h").is_err());
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_live_current_price() {
        let client = YahooFinanceClient::new();
        let quote = client.current_price("SPY").await.expect("quote works");
        assert!(quote.price.unwrap_or(0.0) > 0.0);
    }
}
