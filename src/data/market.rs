//! Alpha Vantage client for US market data
//! Needs an API key (free tier: 25 requests/day); without one every call
//! returns a configuration error record so the host can degrade gracefully.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::validation::{sanitize_ticker, validate_range};
use super::{rate_limit, DataError, DataResult, PricePoint, RateLimiter};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Bar aggregation requested from Alpha Vantage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Daily,
    Weekly,
    Monthly,
    Intraday,
}

impl Interval {
    fn function(self) -> &'static str {
        match self {
            Interval::Daily => "TIME_SERIES_DAILY",
            Interval::Weekly => "TIME_SERIES_WEEKLY",
            Interval::Monthly => "TIME_SERIES_MONTHLY",
            Interval::Intraday => "TIME_SERIES_INTRADAY",
        }
    }
}

impl std::str::FromStr for Interval {
    type Err = DataError;

    fn from_str(s: &str) -> DataResult<Self> {
        match s {
            "daily" => Ok(Interval::Daily),
            "weekly" => Ok(Interval::Weekly),
            "monthly" => Ok(Interval::Monthly),
            "intraday" => Ok(Interval::Intraday),
            other => Err(DataError::Validation {
                field: "interval".to_string(),
                message: format!(
                    "unknown interval '{}', expected daily|weekly|monthly|intraday",
                    other
                ),
            }),
        }
    }
}

/// Real-time quote from GLOBAL_QUOTE
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: String,
    pub volume: i64,
    pub latest_trading_day: String,
}

/// Company fundamentals from OVERVIEW
#[derive(Debug, Clone, Serialize)]
pub struct CompanyOverview {
    pub symbol: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<String>,
    pub pe_ratio: Option<String>,
    pub dividend_yield: Option<String>,
    pub week_52_high: Option<String>,
    pub week_52_low: Option<String>,
    pub analyst_target_price: Option<String>,
}

/// One row of the earnings calendar
#[derive(Debug, Clone, Serialize)]
pub struct EarningsEvent {
    pub report_date: String,
    pub eps_estimate: Option<f64>,
    pub eps_actual: Option<f64>,
    pub revenue_estimate: Option<f64>,
    pub revenue_actual: Option<f64>,
    pub surprise_pct: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: String,
    #[serde(rename = "05. price")]
    price: String,
    #[serde(rename = "06. volume")]
    volume: String,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: String,
    #[serde(rename = "09. change")]
    change: String,
    #[serde(rename = "10. change percent")]
    change_percent: String,
}

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    #[serde(rename = "earningsCalendar", default)]
    earnings_calendar: Vec<CalendarEntry>,
}

#[derive(Debug, Deserialize)]
struct CalendarEntry {
    #[serde(rename = "reportDate", default)]
    report_date: String,
    #[serde(rename = "epsEstimate")]
    eps_estimate: Option<String>,
    #[serde(rename = "epsActual")]
    eps_actual: Option<String>,
    #[serde(rename = "revenueEstimate")]
    revenue_estimate: Option<String>,
    #[serde(rename = "revenueActual")]
    revenue_actual: Option<String>,
    #[serde(rename = "surprisePercentage")]
    surprise_percentage: Option<String>,
}

pub struct AlphaVantageClient {
    client: reqwest::Client,
    api_key: Option<String>,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl AlphaVantageClient {
    pub fn new(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("findata/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        if api_key.is_none() {
            tracing::info!(
                "Alpha Vantage API key not configured; US market functions disabled. \
                 Free keys: https://www.alphavantage.co/support/#api-key"
            );
        }

        Self {
            client,
            api_key,
            rate_limiter: Arc::new(Mutex::new(rate_limit::alpha_vantage())),
        }
    }

    fn key(&self) -> DataResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            DataError::Config(
                "ALPHA_VANTAGE_API_KEY not set; US market data unavailable. \
                 Use the Yahoo Finance client for keyless price data."
                    .to_string(),
            )
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> DataResult<T> {
        let key = self.key()?.to_string();
        self.rate_limiter.lock().await.acquire()?;

        let request = self.client.get(BASE_URL).query(params).query(&[("apikey", key.as_str())]);
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            tracing::error!("Alpha Vantage request failed with status {}", status);
            return Err(DataError::api_error(status, "Alpha Vantage request failed"));
        }

        Ok(response.json().await?)
    }

    /// Historical bars, oldest first, at most `days` points
    pub async fn price_history(
        &self,
        ticker: &str,
        days: usize,
        interval: Interval,
    ) -> DataResult<Vec<PricePoint>> {
        let ticker = sanitize_ticker(ticker)?;
        if !validate_range(days as f64, Some(1.0), Some(5000.0)) {
            return Err(DataError::validation_error(
                "days",
                "must be between 1 and 5000",
            ));
        }
        tracing::info!("Fetching {} days of Alpha Vantage history for {}", days, ticker);

        let outputsize = if days <= 100 { "compact" } else { "full" };
        let mut params = vec![
            ("function", interval.function()),
            ("symbol", ticker.as_str()),
            ("outputsize", outputsize),
        ];
        if interval == Interval::Intraday {
            params.push(("interval", "60min"));
        }

        let body: serde_json::Value = self.get_json(&params).await?;
        let points = parse_time_series(&body, days)?;
        if points.is_empty() {
            return Err(DataError::no_data(ticker.as_str(), "alpha_vantage"));
        }
        Ok(points)
    }

    /// Real-time quote
    pub async fn quote(&self, ticker: &str) -> DataResult<Quote> {
        let ticker = sanitize_ticker(ticker)?;
        tracing::info!("Fetching Alpha Vantage quote for {}", ticker);

        let body: GlobalQuoteResponse = self
            .get_json(&[("function", "GLOBAL_QUOTE"), ("symbol", ticker.as_str())])
            .await?;

        let raw = body
            .global_quote
            .ok_or_else(|| DataError::no_data(ticker.as_str(), "alpha_vantage"))?;

        Ok(Quote {
            symbol: raw.symbol,
            price: parse_f64("price", &raw.price)?,
            change: parse_f64("change", &raw.change)?,
            change_percent: raw.change_percent,
            volume: raw.volume.parse().unwrap_or(0),
            latest_trading_day: raw.latest_trading_day,
        })
    }

    /// Company fundamentals and key ratios
    pub async fn company_overview(&self, ticker: &str) -> DataResult<CompanyOverview> {
        let ticker = sanitize_ticker(ticker)?;
        tracing::info!("Fetching company overview for {}", ticker);

        let body: serde_json::Value = self
            .get_json(&[("function", "OVERVIEW"), ("symbol", ticker.as_str())])
            .await?;

        if body.get("Symbol").and_then(|v| v.as_str()).is_none() {
            return Err(DataError::no_data(ticker.as_str(), "alpha_vantage"));
        }

        let field = |name: &str| body.get(name).and_then(|v| v.as_str()).map(String::from);

        Ok(CompanyOverview {
            symbol: ticker,
            name: field("Name"),
            description: field("Description"),
            sector: field("Sector"),
            industry: field("Industry"),
            market_cap: field("MarketCapitalization"),
            pe_ratio: field("PERatio"),
            dividend_yield: field("DividendYield"),
            week_52_high: field("52WeekHigh"),
            week_52_low: field("52WeekLow"),
            analyst_target_price: field("AnalystTargetPrice"),
        })
    }

    /// Upcoming earnings, optionally for one ticker.
    /// horizon: 3month | 6month | 12month
    pub async fn earnings_calendar(
        &self,
        ticker: Option<&str>,
        horizon: &str,
    ) -> DataResult<Vec<EarningsEvent>> {
        if !matches!(horizon, "3month" | "6month" | "12month") {
            return Err(DataError::validation_error(
                "horizon",
                "expected 3month, 6month or 12month",
            ));
        }

        let sanitized = match ticker {
            Some(t) => Some(sanitize_ticker(t)?),
            None => None,
        };

        let mut params = vec![("function", "EARNINGS_CALENDAR"), ("horizon", horizon)];
        if let Some(t) = sanitized.as_deref() {
            params.push(("symbol", t));
        }

        let body: CalendarResponse = self.get_json(&params).await?;
        Ok(body
            .earnings_calendar
            .into_iter()
            .map(|e| EarningsEvent {
                report_date: e.report_date,
                eps_estimate: opt_f64(e.eps_estimate),
                eps_actual: opt_f64(e.eps_actual),
                revenue_estimate: opt_f64(e.revenue_estimate),
                revenue_actual: opt_f64(e.revenue_actual),
                surprise_pct: opt_f64(e.surprise_percentage),
            })
            .collect())
    }

}

fn parse_f64(field: &str, raw: &str) -> DataResult<f64> {
    raw.parse().map_err(|_| {
        DataError::parse_error(format!("non-numeric {} value in quote payload", field))
    })
}

fn opt_f64(raw: Option<String>) -> Option<f64> {
    raw.as_deref().and_then(|s| s.parse().ok())
}

/// Pull the newest `days` bars out of a `Time Series ...` object and return
/// them oldest first. Alpha Vantage keys bars by date string, so
/// lexicographic order is chronological order.
fn parse_time_series(body: &serde_json::Value, days: usize) -> DataResult<Vec<PricePoint>> {
    let object = body
        .as_object()
        .ok_or_else(|| DataError::parse_error("expected a JSON object from Alpha Vantage"))?;

    // Upstream error payloads come back as {"Note": ...} or {"Error Message": ...}
    if let Some(note) = object.get("Note").and_then(|v| v.as_str()) {
        tracing::warn!("Alpha Vantage throttle note: {}", note);
        return Err(DataError::RateLimit { retry_after: 60 });
    }
    if object.contains_key("Error Message") {
        return Err(DataError::parse_error("Alpha Vantage rejected the request"));
    }

    let series = object
        .iter()
        .find(|(k, _)| k.contains("Time Series"))
        .map(|(_, v)| v)
        .and_then(|v| v.as_object())
        .ok_or_else(|| DataError::parse_error("no time series section in response"))?;

    let mut points: Vec<PricePoint> = series
        .iter()
        .filter_map(|(date, values)| {
            let get = |key: &str| {
                values
                    .as_object()?
                    .iter()
                    .find(|(k, _)| k.ends_with(key))
                    .and_then(|(_, v)| v.as_str())
                    .and_then(|s| s.parse::<f64>().ok())
            };
            Some(PricePoint {
                date: date.clone(),
                open: get("open")?,
                high: get("high")?,
                low: get("low")?,
                close: get("close")?,
                volume: get("volume").map(|v| v as i64).unwrap_or(0),
                adjusted_close: None,
            })
        })
        .collect();

    points.sort_by(|a, b| b.date.cmp(&a.date));
    points.truncate(days);
    points.reverse();
    Ok(points)
}
