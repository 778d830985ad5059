//! Options chain client and flow analytics
//!
//! Fetches chains from Yahoo Finance's v7 options endpoint and derives the
//! usual positioning heuristics: Max Pain, call/put ratios, unusual volume
//! and the largest open-interest strikes.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use super::validation::sanitize_ticker;
use super::{DataError, DataResult};

const OPTIONS_URL: &str = "https://query1.finance.yahoo.com/v7/finance/options";

/// Contracts are exchange-standard 100 shares
const CONTRACT_MULTIPLIER: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Call,
    Put,
}

/// One normalized option contract
#[derive(Debug, Clone, Serialize)]
pub struct OptionContract {
    pub symbol: Option<String>,
    pub strike: f64,
    pub expiration: NaiveDate,
    pub option_type: OptionType,
    pub last_price: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume: u64,
    pub open_interest: u64,
    pub implied_volatility: f64,
}

/// A full chain for one expiration
#[derive(Debug, Clone, Serialize)]
pub struct OptionsChain {
    pub ticker: String,
    pub expiration: NaiveDate,
    pub underlying_price: Option<f64>,
    pub available_expirations: Vec<NaiveDate>,
    pub calls: Vec<OptionContract>,
    pub puts: Vec<OptionContract>,
}

/// Aggregate flow statistics for one chain
#[derive(Debug, Clone, Serialize)]
pub struct FlowStats {
    pub call_volume: u64,
    pub put_volume: u64,
    pub total_volume: u64,
    /// None when no puts traded (ratio undefined)
    pub call_put_ratio: Option<f64>,
    pub call_open_interest: u64,
    pub put_open_interest: u64,
    pub total_open_interest: u64,
    /// Mean implied volatility as a percentage, over contracts quoting IV
    pub avg_implied_volatility_pct: f64,
    pub max_pain: Option<f64>,
    pub distance_to_max_pain: Option<f64>,
    pub sentiment: SentimentVerdict,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentVerdict {
    pub bias: &'static str,
    pub strength: &'static str,
    pub description: &'static str,
}

/// A contract trading well above the chain's average volume
#[derive(Debug, Clone, Serialize)]
pub struct UnusualActivity {
    pub option_type: OptionType,
    pub strike: f64,
    pub volume: u64,
    pub open_interest: u64,
    pub implied_volatility_pct: f64,
    pub tag: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionEntry {
    pub option_type: OptionType,
    pub strike: f64,
    pub open_interest: u64,
    pub implied_volatility_pct: f64,
}

/// Full flow analysis report
#[derive(Debug, Clone, Serialize)]
pub struct FlowAnalysis {
    pub ticker: String,
    pub expiration: NaiveDate,
    pub underlying_price: Option<f64>,
    pub analysis: FlowStats,
    pub unusual_activity: Vec<UnusualActivity>,
    pub largest_positions: Vec<PositionEntry>,
    pub available_expirations: Vec<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct OptionsResponse {
    #[serde(rename = "optionChain")]
    option_chain: OptionChainSection,
}

#[derive(Debug, Deserialize)]
struct OptionChainSection {
    result: Option<Vec<OptionChainResult>>,
}

#[derive(Debug, Deserialize)]
struct OptionChainResult {
    #[serde(rename = "expirationDates", default)]
    expiration_dates: Vec<i64>,
    quote: Option<UnderlyingQuote>,
    #[serde(default)]
    options: Vec<RawOptions>,
}

#[derive(Debug, Deserialize)]
struct UnderlyingQuote {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawOptions {
    #[serde(default)]
    calls: Vec<RawContract>,
    #[serde(default)]
    puts: Vec<RawContract>,
}

#[derive(Debug, Deserialize)]
struct RawContract {
    #[serde(rename = "contractSymbol")]
    contract_symbol: Option<String>,
    strike: Option<f64>,
    expiration: Option<i64>,
    #[serde(rename = "lastPrice")]
    last_price: Option<f64>,
    bid: Option<f64>,
    ask: Option<f64>,
    volume: Option<u64>,
    #[serde(rename = "openInterest")]
    open_interest: Option<u64>,
    #[serde(rename = "impliedVolatility")]
    implied_volatility: Option<f64>,
}

pub struct OptionsClient {
    client: reqwest::Client,
}

impl OptionsClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }

    async fn fetch(&self, ticker: &str, date: Option<i64>) -> DataResult<OptionChainResult> {
        let url = format!("{}/{}", OPTIONS_URL, ticker);
        let mut request = self.client.get(&url);
        if let Some(ts) = date {
            request = request.query(&[("date", ts.to_string())]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(DataError::api_error(
                response.status().as_u16(),
                "Yahoo Finance options request failed",
            ));
        }

        let body: OptionsResponse = response.json().await?;
        body.option_chain
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| DataError::no_data(ticker, "yahoo_options"))
    }

    /// Fetch the chain for one expiration (nearest when unspecified)
    pub async fn chain(
        &self,
        ticker: &str,
        expiration: Option<NaiveDate>,
    ) -> DataResult<OptionsChain> {
        let ticker = sanitize_ticker(ticker)?;
        tracing::info!("Fetching options chain for {}", ticker);

        let listing = self.fetch(&ticker, None).await?;
        if listing.expiration_dates.is_empty() {
            return Err(DataError::no_data(ticker.as_str(), "yahoo_options"));
        }

        let available: Vec<NaiveDate> = listing
            .expiration_dates
            .iter()
            .filter_map(|&ts| DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive()))
            .collect();

        let (target_ts, target_date) = match expiration {
            Some(wanted) => {
                let ts = listing
                    .expiration_dates
                    .iter()
                    .copied()
                    .find(|&ts| {
                        DateTime::from_timestamp(ts, 0)
                            .map(|dt| dt.date_naive() == wanted)
                            .unwrap_or(false)
                    })
                    .ok_or_else(|| DataError::Validation {
                        field: "expiration".to_string(),
                        message: format!(
                            "{} is not an available expiration. Nearest: {}",
                            wanted,
                            available
                                .iter()
                                .take(5)
                                .map(|d| d.to_string())
                                .collect::<Vec<_>>()
                                .join(", ")
                        ),
                    })?;
                (ts, wanted)
            }
            None => (
                listing.expiration_dates[0],
                *available
                    .first()
                    .ok_or_else(|| DataError::no_data(ticker.as_str(), "yahoo_options"))?,
            ),
        };

        let chain_result = self.fetch(&ticker, Some(target_ts)).await?;
        let underlying_price = chain_result
            .quote
            .as_ref()
            .and_then(|q| q.regular_market_price);

        let (calls, puts) = match chain_result.options.first() {
            Some(raw) => (
                normalize_contracts(&raw.calls, target_date, OptionType::Call),
                normalize_contracts(&raw.puts, target_date, OptionType::Put),
            ),
            None => (Vec::new(), Vec::new()),
        };

        tracing::info!(
            "Chain for {} {}: {} calls, {} puts",
            ticker,
            target_date,
            calls.len(),
            puts.len()
        );

        Ok(OptionsChain {
            ticker,
            expiration: target_date,
            underlying_price,
            available_expirations: available,
            calls,
            puts,
        })
    }

    /// Fetch a chain and run the full flow analysis over it
    pub async fn analyze_flow(
        &self,
        ticker: &str,
        expiration: Option<NaiveDate>,
        volume_threshold: f64,
    ) -> DataResult<FlowAnalysis> {
        if !(volume_threshold.is_finite() && volume_threshold > 0.0) {
            return Err(DataError::validation_error(
                "volume_threshold",
                "must be a positive number",
            ));
        }
        let chain = self.chain(ticker, expiration).await?;
        Ok(analyze_chain(&chain, volume_threshold))
    }
}

impl Default for OptionsClient {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_contracts(
    raw: &[RawContract],
    default_expiration: NaiveDate,
    option_type: OptionType,
) -> Vec<OptionContract> {
    raw.iter()
        .filter_map(|c| {
            let strike = c.strike?;
            let expiration = c
                .expiration
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
                .map(|dt| dt.date_naive())
                .unwrap_or(default_expiration);
            Some(OptionContract {
                symbol: c.contract_symbol.clone(),
                strike,
                expiration,
                option_type,
                last_price: c.last_price.unwrap_or(0.0),
                bid: c.bid.unwrap_or(0.0),
                ask: c.ask.unwrap_or(0.0),
                volume: c.volume.unwrap_or(0),
                open_interest: c.open_interest.unwrap_or(0),
                implied_volatility: c.implied_volatility.unwrap_or(0.0),
            })
        })
        .collect()
}

/// Max Pain: the strike minimizing the aggregate intrinsic value of all
/// outstanding contracts at expiration. For each candidate settle price S,
/// ITM calls pay (S - K) and ITM puts pay (K - S), each scaled by open
/// interest and the contract multiplier.
pub fn max_pain(chain: &OptionsChain) -> Option<f64> {
    let strikes: BTreeSet<u64> = chain
        .calls
        .iter()
        .chain(chain.puts.iter())
        .map(|c| c.strike.to_bits())
        .collect();
    if strikes.is_empty() {
        return None;
    }

    let mut best: Option<(f64, f64)> = None;
    for bits in strikes {
        let settle = f64::from_bits(bits);
        let mut pain = 0.0;

        for call in &chain.calls {
            if settle > call.strike {
                pain += (settle - call.strike) * call.open_interest as f64 * CONTRACT_MULTIPLIER;
            }
        }
        for put in &chain.puts {
            if settle < put.strike {
                pain += (put.strike - settle) * put.open_interest as f64 * CONTRACT_MULTIPLIER;
            }
        }

        match best {
            Some((_, best_pain)) if pain >= best_pain => {}
            _ => best = Some((settle, pain)),
        }
    }

    best.map(|(strike, _)| strike)
}

/// Derive the full flow report from an already-fetched chain
pub fn analyze_chain(chain: &OptionsChain, volume_threshold: f64) -> FlowAnalysis {
    let call_volume: u64 = chain.calls.iter().map(|c| c.volume).sum();
    let put_volume: u64 = chain.puts.iter().map(|p| p.volume).sum();
    let call_oi: u64 = chain.calls.iter().map(|c| c.open_interest).sum();
    let put_oi: u64 = chain.puts.iter().map(|p| p.open_interest).sum();

    let call_put_ratio = if put_volume > 0 {
        Some(round2(call_volume as f64 / put_volume as f64))
    } else {
        None
    };

    let ivs: Vec<f64> = chain
        .calls
        .iter()
        .chain(chain.puts.iter())
        .map(|c| c.implied_volatility)
        .filter(|&iv| iv > 0.0)
        .collect();
    let avg_iv_pct = if ivs.is_empty() {
        0.0
    } else {
        round2(ivs.iter().sum::<f64>() / ivs.len() as f64 * 100.0)
    };

    let pain = max_pain(chain);
    let distance = match (pain, chain.underlying_price) {
        (Some(p), Some(u)) => Some(round2((u - p).abs())),
        _ => None,
    };

    let sentiment = interpret_sentiment(call_volume, put_volume, call_oi, put_oi);

    FlowAnalysis {
        ticker: chain.ticker.clone(),
        expiration: chain.expiration,
        underlying_price: chain.underlying_price,
        analysis: FlowStats {
            call_volume,
            put_volume,
            total_volume: call_volume + put_volume,
            call_put_ratio,
            call_open_interest: call_oi,
            put_open_interest: put_oi,
            total_open_interest: call_oi + put_oi,
            avg_implied_volatility_pct: avg_iv_pct,
            max_pain: pain,
            distance_to_max_pain: distance,
            sentiment,
        },
        unusual_activity: detect_unusual_volume(chain, volume_threshold),
        largest_positions: largest_positions(chain),
        available_expirations: chain.available_expirations.clone(),
    }
}

/// Contracts trading at `threshold` times the chain's mean volume or more
/// (and at least 10 contracts), largest first, top 10.
fn detect_unusual_volume(chain: &OptionsChain, threshold: f64) -> Vec<UnusualActivity> {
    let all: Vec<&OptionContract> = chain.calls.iter().chain(chain.puts.iter()).collect();
    if all.is_empty() {
        return Vec::new();
    }

    let avg_volume = all.iter().map(|c| c.volume).sum::<u64>() as f64 / all.len() as f64;
    if avg_volume == 0.0 {
        return Vec::new();
    }
    let threshold_volume = avg_volume * threshold;

    let mut alerts: Vec<UnusualActivity> = all
        .iter()
        .filter(|c| c.volume as f64 >= threshold_volume && c.volume > 10)
        .map(|c| UnusualActivity {
            option_type: c.option_type,
            strike: c.strike,
            volume: c.volume,
            open_interest: c.open_interest,
            implied_volatility_pct: round2(c.implied_volatility * 100.0),
            tag: activity_tag(c, chain.underlying_price),
        })
        .collect();

    alerts.sort_by(|a, b| b.volume.cmp(&a.volume));
    alerts.truncate(10);
    alerts
}

/// Tag a high-volume contract by moneyness: out-of-the-money calls read as
/// speculation and out-of-the-money puts as hedges; the rest are plain
/// directional bets.
fn activity_tag(contract: &OptionContract, underlying: Option<f64>) -> &'static str {
    match (contract.option_type, underlying) {
        (OptionType::Call, Some(spot)) if contract.strike > spot => "SPECULATIVE",
        (OptionType::Call, _) => "BULLISH",
        (OptionType::Put, Some(spot)) if contract.strike < spot => "HEDGE",
        (OptionType::Put, _) => "BEARISH",
    }
}

fn largest_positions(chain: &OptionsChain) -> Vec<PositionEntry> {
    let mut positions: Vec<PositionEntry> = chain
        .calls
        .iter()
        .chain(chain.puts.iter())
        .map(|c| PositionEntry {
            option_type: c.option_type,
            strike: c.strike,
            open_interest: c.open_interest,
            implied_volatility_pct: round2(c.implied_volatility * 100.0),
        })
        .collect();

    positions.sort_by(|a, b| b.open_interest.cmp(&a.open_interest));
    positions.truncate(10);
    positions
}

fn interpret_sentiment(
    call_volume: u64,
    put_volume: u64,
    call_oi: u64,
    put_oi: u64,
) -> SentimentVerdict {
    let volume_ratio = if put_volume > 0 {
        call_volume as f64 / put_volume as f64
    } else {
        f64::INFINITY
    };
    let oi_ratio = if put_oi > 0 {
        call_oi as f64 / put_oi as f64
    } else {
        f64::INFINITY
    };

    if volume_ratio > 1.5 && oi_ratio > 1.2 {
        SentimentVerdict {
            bias: "BULLISH",
            strength: "STRONG",
            description: "High call volume and open interest",
        }
    } else if volume_ratio > 1.2 {
        SentimentVerdict {
            bias: "BULLISH",
            strength: "MODERATE",
            description: "Elevated call activity",
        }
    } else if volume_ratio < 0.7 && oi_ratio < 0.8 {
        SentimentVerdict {
            bias: "BEARISH",
            strength: "STRONG",
            description: "High put volume and open interest",
        }
    } else if volume_ratio < 0.9 {
        SentimentVerdict {
            bias: "BEARISH",
            strength: "MODERATE",
            description: "Elevated put activity",
        }
    } else {
        SentimentVerdict {
            bias: "NEUTRAL",
            strength: "WEAK",
            description: "Balanced call/put activity",
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(
        option_type: OptionType,
        strike: f64,
        volume: u64,
        open_interest: u64,
        iv: f64,
    ) -> OptionContract {
        OptionContract {
            symbol: None,
            strike,
            expiration: NaiveDate::from_ymd_opt(2024, 6, 21).expect("valid date"),
            option_type,
            last_price: 1.0,
            bid: 0.9,
            ask: 1.1,
            volume,
            open_interest,
            implied_volatility: iv,
        }
    }

    fn test_chain(calls: Vec<OptionContract>, puts: Vec<OptionContract>) -> OptionsChain {
        OptionsChain {
            ticker: "SPY".to_string(),
            expiration: NaiveDate::from_ymd_opt(2024, 6, 21).expect("valid date"),
            underlying_price: Some(100.0),
            available_expirations: vec![NaiveDate::from_ymd_opt(2024, 6, 21).expect("valid date")],
            calls,
            puts,
        }
    }

    #[test]
    fn test_max_pain_balances_call_and_put_pain() {
        // Heavy put OI at 100 pushes pain away from low settles; heavy call
        // OI at 100 pushes it away from high settles. 100 is the pin.
        let chain = test_chain(
            vec![
                contract(OptionType::Call, 95.0, 0, 100, 0.2),
                contract(OptionType::Call, 100.0, 0, 1000, 0.2),
                contract(OptionType::Call, 105.0, 0, 100, 0.2),
            ],
            vec![
                contract(OptionType::Put, 95.0, 0, 100, 0.2),
                contract(OptionType::Put, 100.0, 0, 1000, 0.2),
                contract(OptionType::Put, 105.0, 0, 100, 0.2),
            ],
        );

        assert_eq!(max_pain(&chain), Some(100.0));
    }

    #[test]
    fn test_max_pain_skews_toward_heavy_put_oi() {
        // All the open interest is in puts struck at 110: settling below 110
        // costs put writers, so pain is minimized at the top strike.
        let chain = test_chain(
            vec![contract(OptionType::Call, 90.0, 0, 1, 0.2)],
            vec![contract(OptionType::Put, 110.0, 0, 10_000, 0.2)],
        );

        assert_eq!(max_pain(&chain), Some(110.0));
    }

    #[test]
    fn test_max_pain_empty_chain() {
        let chain = test_chain(vec![], vec![]);
        assert_eq!(max_pain(&chain), None);
    }

    #[test]
    fn test_flow_ratios_and_iv() {
        let chain = test_chain(
            vec![
                contract(OptionType::Call, 100.0, 300, 500, 0.25),
                contract(OptionType::Call, 105.0, 150, 200, 0.35),
            ],
            vec![contract(OptionType::Put, 95.0, 150, 400, 0.30)],
        );

        let report = analyze_chain(&chain, 1.5);
        assert_eq!(report.analysis.call_volume, 450);
        assert_eq!(report.analysis.put_volume, 150);
        assert_eq!(report.analysis.call_put_ratio, Some(3.0));
        assert_eq!(report.analysis.total_open_interest, 1100);
        assert!((report.analysis.avg_implied_volatility_pct - 30.0).abs() < 1e-9);
        assert_eq!(report.analysis.sentiment.bias, "BULLISH");
        assert_eq!(report.analysis.sentiment.strength, "STRONG");
    }

    #[test]
    fn test_flow_ratio_undefined_without_put_volume() {
        let chain = test_chain(
            vec![contract(OptionType::Call, 100.0, 100, 100, 0.2)],
            vec![contract(OptionType::Put, 95.0, 0, 0, 0.2)],
        );
        let report = analyze_chain(&chain, 1.5);
        assert_eq!(report.analysis.call_put_ratio, None);
        assert_eq!(report.analysis.sentiment.bias, "BULLISH");
    }

    #[test]
    fn test_unusual_volume_detection() {
        // Mean volume is (1000 + 20 + 12 + 0) / 4 = 258; at threshold 1.5 the
        // bar is 387, so only the 1000-lot call qualifies.
        let chain = test_chain(
            vec![
                contract(OptionType::Call, 110.0, 1000, 50, 0.4),
                contract(OptionType::Call, 100.0, 20, 10, 0.2),
            ],
            vec![
                contract(OptionType::Put, 95.0, 12, 10, 0.2),
                contract(OptionType::Put, 90.0, 0, 5, 0.2),
            ],
        );

        let alerts = detect_unusual_volume(&chain, 1.5);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].volume, 1000);
        // Strike 110 vs spot 100: an OTM call reads as speculation
        assert_eq!(alerts[0].tag, "SPECULATIVE");
    }

    #[test]
    fn test_largest_positions_ordering() {
        let chain = test_chain(
            vec![
                contract(OptionType::Call, 100.0, 0, 500, 0.2),
                contract(OptionType::Call, 105.0, 0, 2000, 0.2),
            ],
            vec![contract(OptionType::Put, 95.0, 0, 900, 0.2)],
        );

        let positions = largest_positions(&chain);
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0].open_interest, 2000);
        assert_eq!(positions[1].open_interest, 900);
    }

    #[test]
    fn test_bearish_sentiment_thresholds() {
        let verdict = interpret_sentiment(50, 100, 40, 100);
        assert_eq!(verdict.bias, "BEARISH");
        assert_eq!(verdict.strength, "STRONG");

        let verdict = interpret_sentiment(85, 100, 100, 100);
        assert_eq!(verdict.bias, "BEARISH");
        assert_eq!(verdict.strength, "MODERATE");

        let verdict = interpret_sentiment(100, 100, 100, 100);
        assert_eq!(verdict.bias, "NEUTRAL");
    }

    #[test]
    fn test_parse_raw_chain_payload() {
        let raw = r#"{
            "optionChain": {
                "result": [{
                    "expirationDates": [1718928000],
                    "quote": {"regularMarketPrice": 543.2},
                    "options": [{
                        "calls": [{
                            "contractSymbol": "SPY240621C00540000",
                            "strike": 540.0,
                            "expiration": 1718928000,
                            "lastPrice": 6.1,
                            "bid": 6.0,
                            "ask": 6.2,
                            "volume": 1200,
                            "openInterest": 9000,
                            "impliedVolatility": 0.142
                        }],
                        "puts": []
                    }]
                }]
            }
        }"#;

        let parsed: OptionsResponse = serde_json::from_str(raw).expect("fixture parses");
        let result = &parsed.option_chain.result.expect("result present")[0];
        assert_eq!(result.expiration_dates, vec![1_718_928_000]);

        let calls = normalize_contracts(
            &result.options[0].calls,
            NaiveDate::from_ymd_opt(2024, 6, 21).expect("valid date"),
            OptionType::Call,
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].open_interest, 9000);
        assert_eq!(calls[0].expiration.to_string(), "2024-06-21");
    }
}
