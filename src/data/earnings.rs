//! Earnings history and beat/miss analytics from Yahoo Finance

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;

use super::validation::sanitize_ticker;
use super::{DataError, DataResult};

const SUMMARY_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";

/// One reported quarter
#[derive(Debug, Clone, Serialize)]
pub struct EarningsQuarter {
    pub ticker: String,
    pub report_date: Option<String>,
    pub eps_actual: Option<f64>,
    pub eps_estimate: Option<f64>,
    pub surprise_pct: Option<f64>,
    /// true = beat consensus, false = missed, None = incomplete data
    pub beat: Option<bool>,
}

/// Run of consecutive beats or misses ending at the latest quarter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Streak {
    pub kind: &'static str,
    pub count: usize,
}

/// Beat/miss consistency over recent quarters
#[derive(Debug, Clone, Serialize)]
pub struct EarningsTrend {
    pub ticker: String,
    pub total_quarters: usize,
    pub beats: usize,
    pub misses: usize,
    pub beat_rate_pct: f64,
    pub current_streak: Option<Streak>,
    pub avg_surprise_pct: Option<f64>,
    pub recent_history: Vec<EarningsQuarter>,
}

pub struct EarningsClient {
    client: reqwest::Client,
}

impl EarningsClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }

    async fn quote_summary(&self, ticker: &str, modules: &str) -> DataResult<serde_json::Value> {
        let url = format!("{}/{}", SUMMARY_URL, ticker);
        let response = self
            .client
            .get(&url)
            .query(&[("modules", modules)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataError::api_error(
                response.status().as_u16(),
                "Yahoo Finance quoteSummary request failed",
            ));
        }

        Ok(response.json().await?)
    }

    /// Reported quarters, newest first, at most `limit`
    pub async fn history(&self, ticker: &str, limit: usize) -> DataResult<Vec<EarningsQuarter>> {
        let ticker = sanitize_ticker(ticker)?;
        tracing::info!("Fetching earnings history for {}", ticker);

        let body = self.quote_summary(&ticker, "earningsHistory").await?;
        let quarters = parse_history(&body, &ticker, limit);
        if quarters.is_empty() {
            return Err(DataError::no_data(ticker.as_str(), "yahoo_earnings"));
        }
        Ok(quarters)
    }

    /// Next scheduled report date, if Yahoo lists one
    pub async fn next_earnings_date(&self, ticker: &str) -> DataResult<Option<NaiveDate>> {
        let ticker = sanitize_ticker(ticker)?;

        let body = self.quote_summary(&ticker, "calendarEvents").await?;
        let dates = &body["quoteSummary"]["result"][0]["calendarEvents"]["earnings"]
            ["earningsDate"];

        let next = dates
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(parse_event_date);
        Ok(next)
    }

    /// Beat/miss consistency over the last two years of quarters
    pub async fn trend(&self, ticker: &str) -> DataResult<EarningsTrend> {
        let history = self.history(ticker, 8).await?;
        Ok(compute_trend(ticker, history))
    }

    /// Whether the next report falls within `days`, with the historical
    /// context attached. Volatility tends to spike around these dates.
    pub async fn earnings_soon(&self, ticker: &str, days: i64) -> DataResult<serde_json::Value> {
        let ticker = sanitize_ticker(ticker)?;

        let next = match self.next_earnings_date(&ticker).await? {
            Some(date) => date,
            None => {
                return Ok(json!({
                    "ticker": ticker,
                    "has_earnings_soon": false,
                    "message": "No upcoming earnings date found",
                }))
            }
        };

        let days_until = (next - Utc::now().date_naive()).num_days();
        let trend = self.trend(&ticker).await.ok();

        Ok(json!({
            "ticker": ticker,
            "has_earnings_soon": days_until <= days,
            "earnings_date": next.to_string(),
            "days_until": days_until,
            "historical_beat_rate_pct": trend.as_ref().map(|t| t.beat_rate_pct),
            "avg_surprise_pct": trend.as_ref().and_then(|t| t.avg_surprise_pct),
        }))
    }
}

impl Default for EarningsClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Yahoo wraps scalars as {raw, fmt}; tolerate both shapes
fn raw_f64(value: &serde_json::Value) -> Option<f64> {
    value["raw"].as_f64().or_else(|| value.as_f64())
}

fn raw_i64(value: &serde_json::Value) -> Option<i64> {
    value["raw"].as_i64().or_else(|| value.as_i64())
}

fn parse_event_date(value: &serde_json::Value) -> Option<NaiveDate> {
    raw_i64(value)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.date_naive())
}

/// EPS surprise relative to consensus, in percent
pub fn surprise_pct(actual: f64, estimate: f64) -> Option<f64> {
    if estimate == 0.0 {
        return None;
    }
    Some(((actual - estimate) / estimate.abs() * 100.0 * 100.0).round() / 100.0)
}

fn parse_history(body: &serde_json::Value, ticker: &str, limit: usize) -> Vec<EarningsQuarter> {
    let history = &body["quoteSummary"]["result"][0]["earningsHistory"]["history"];
    let entries = match history.as_array() {
        Some(e) => e,
        None => return Vec::new(),
    };

    entries
        .iter()
        .take(limit)
        .map(|item| {
            let eps_actual = raw_f64(&item["epsActual"]);
            let eps_estimate = raw_f64(&item["epsEstimate"]);
            let surprise = match (eps_actual, eps_estimate) {
                (Some(a), Some(e)) => surprise_pct(a, e),
                _ => None,
            };
            let beat = match (eps_actual, eps_estimate) {
                (Some(a), Some(e)) => Some(a > e),
                _ => None,
            };

            EarningsQuarter {
                ticker: ticker.to_string(),
                report_date: raw_i64(&item["quarter"])
                    .and_then(|ts| DateTime::from_timestamp(ts, 0))
                    .map(|dt| dt.date_naive().to_string()),
                eps_actual,
                eps_estimate,
                surprise_pct: surprise,
                beat,
            }
        })
        .collect()
}

/// Aggregate a newest-first history into the trend report
fn compute_trend(ticker: &str, history: Vec<EarningsQuarter>) -> EarningsTrend {
    let beats = history.iter().filter(|h| h.beat == Some(true)).count();
    let misses = history.iter().filter(|h| h.beat == Some(false)).count();

    let surprises: Vec<f64> = history.iter().filter_map(|h| h.surprise_pct).collect();
    let avg_surprise = if surprises.is_empty() {
        None
    } else {
        Some(
            (surprises.iter().sum::<f64>() / surprises.len() as f64 * 100.0).round() / 100.0,
        )
    };

    let beat_rate = if history.is_empty() {
        0.0
    } else {
        (beats as f64 / history.len() as f64 * 1000.0).round() / 10.0
    };

    EarningsTrend {
        ticker: ticker.trim().to_uppercase(),
        total_quarters: history.len(),
        beats,
        misses,
        beat_rate_pct: beat_rate,
        current_streak: current_streak(&history),
        avg_surprise_pct: avg_surprise,
        recent_history: history.into_iter().take(4).collect(),
    }
}

/// Consecutive beats or misses starting at the most recent quarter.
/// A quarter without complete data ends the streak.
fn current_streak(history: &[EarningsQuarter]) -> Option<Streak> {
    let first = history.first().and_then(|h| h.beat)?;
    let count = history
        .iter()
        .take_while(|h| h.beat == Some(first))
        .count();
    Some(Streak {
        kind: if first { "beat" } else { "miss" },
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quarter(beat: Option<bool>, surprise: Option<f64>) -> EarningsQuarter {
        EarningsQuarter {
            ticker: "AAPL".to_string(),
            report_date: Some("2024-05-02".to_string()),
            eps_actual: Some(1.5),
            eps_estimate: Some(1.4),
            surprise_pct: surprise,
            beat,
        }
    }

    const HISTORY_FIXTURE: &str = r#"{
        "quoteSummary": {
            "result": [{
                "earningsHistory": {
                    "history": [
                        {"epsActual": {"raw": 1.53}, "epsEstimate": {"raw": 1.50}, "quarter": {"raw": 1711843200}},
                        {"epsActual": {"raw": 2.18}, "epsEstimate": {"raw": 2.10}, "quarter": {"raw": 1703980800}},
                        {"epsActual": {"raw": 1.40}, "epsEstimate": {"raw": 1.45}, "quarter": {"raw": 1696032000}},
                        {"epsActual": null, "epsEstimate": {"raw": 1.20}, "quarter": {"raw": 1688083200}}
                    ]
                }
            }]
        }
    }"#;

    #[test]
    fn test_parse_history_fixture() {
        let body: serde_json::Value = serde_json::from_str(HISTORY_FIXTURE).expect("fixture parses");
        let quarters = parse_history(&body, "AAPL", 8);

        assert_eq!(quarters.len(), 4);
        assert_eq!(quarters[0].beat, Some(true));
        assert_eq!(quarters[0].report_date.as_deref(), Some("2024-03-31"));
        assert_eq!(quarters[2].beat, Some(false));
        assert_eq!(quarters[3].beat, None);
        // (1.53 - 1.50) / 1.50 * 100 = 2.0
        assert_eq!(quarters[0].surprise_pct, Some(2.0));
    }

    #[test]
    fn test_parse_history_respects_limit() {
        let body: serde_json::Value = serde_json::from_str(HISTORY_FIXTURE).expect("fixture parses");
        assert_eq!(parse_history(&body, "AAPL", 2).len(), 2);
    }

    #[test]
    fn test_surprise_pct() {
        assert_eq!(surprise_pct(1.10, 1.00), Some(10.0));
        assert_eq!(surprise_pct(0.90, 1.00), Some(-10.0));
        // Negative estimates normalize by magnitude: losing less than feared
        // is a positive surprise
        assert_eq!(surprise_pct(-0.50, -1.00), Some(50.0));
        assert_eq!(surprise_pct(1.0, 0.0), None);
    }

    #[test]
    fn test_streak_counts_from_most_recent() {
        let history = vec![
            quarter(Some(true), Some(2.0)),
            quarter(Some(true), Some(4.0)),
            quarter(Some(false), Some(-1.0)),
            quarter(Some(true), Some(3.0)),
        ];
        assert_eq!(
            current_streak(&history),
            Some(Streak { kind: "beat", count: 2 })
        );
    }

    #[test]
    fn test_streak_ends_on_incomplete_quarter() {
        let history = vec![
            quarter(Some(false), None),
            quarter(None, None),
            quarter(Some(false), None),
        ];
        assert_eq!(
            current_streak(&history),
            Some(Streak { kind: "miss", count: 1 })
        );

        let no_data = vec![quarter(None, None)];
        assert_eq!(current_streak(&no_data), None);
    }

    #[test]
    fn test_trend_aggregates() {
        let history = vec![
            quarter(Some(true), Some(2.0)),
            quarter(Some(true), Some(6.0)),
            quarter(Some(false), Some(-2.0)),
            quarter(Some(true), Some(10.0)),
        ];
        let trend = compute_trend("aapl", history);

        assert_eq!(trend.ticker, "AAPL");
        assert_eq!(trend.beats, 3);
        assert_eq!(trend.misses, 1);
        assert_eq!(trend.beat_rate_pct, 75.0);
        assert_eq!(trend.avg_surprise_pct, Some(4.0));
        assert_eq!(trend.recent_history.len(), 4);
    }

    #[test]
    fn test_event_date_parsing() {
        let wrapped = serde_json::json!({"raw": 1711843200, "fmt": "2024-03-31"});
        assert_eq!(
            parse_event_date(&wrapped).map(|d| d.to_string()),
            Some("2024-03-31".to_string())
        );

        let bare = serde_json::json!(1711843200);
        assert_eq!(
            parse_event_date(&bare).map(|d| d.to_string()),
            Some("2024-03-31".to_string())
        );
    }
}
