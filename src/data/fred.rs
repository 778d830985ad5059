//! FRED (Federal Reserve Economic Data) client for macro indicators

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;

use super::validation::validate_date;
use super::{rate_limit, DataError, DataResult, RateLimiter};

const BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// Indicators on the standard macro dashboard
const DASHBOARD_SERIES: &[(&str, &str)] = &[
    ("fed_funds_rate", "DFF"),
    ("cpi", "CPIAUCSL"),
    ("unemployment", "UNRATE"),
    ("gdp_growth", "A191RL1Q225SBEA"),
    ("yield_spread", "T10Y2Y"),
    ("consumer_sentiment", "UMCSENT"),
];

/// One observation; `value` is None where FRED reports a missing point
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub date: String,
    pub value: Option<f64>,
}

/// A series with its latest reading and recent history
#[derive(Debug, Clone, Serialize)]
pub struct SeriesData {
    pub series_id: String,
    pub latest_value: f64,
    pub latest_date: String,
    pub observations: Vec<Observation>,
}

/// Series metadata
#[derive(Debug, Clone, Serialize)]
pub struct SeriesInfo {
    pub id: String,
    pub title: String,
    pub units: String,
    pub frequency: String,
    pub seasonal_adjustment: Option<String>,
    pub last_updated: Option<String>,
    pub notes: String,
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    #[serde(rename = "seriess", default)]
    series: Vec<RawSeries>,
}

#[derive(Debug, Deserialize)]
struct RawSeries {
    id: String,
    title: String,
    units: String,
    frequency: String,
    seasonal_adjustment: Option<String>,
    last_updated: Option<String>,
    #[serde(default)]
    notes: String,
}

pub struct FredClient {
    client: reqwest::Client,
    api_key: Option<String>,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl FredClient {
    pub fn new(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("findata/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        if api_key.is_none() {
            tracing::info!(
                "FRED API key not configured; macro data disabled. \
                 Free keys: https://fred.stlouisfed.org/docs/api/api_key.html"
            );
        }

        Self {
            client,
            api_key,
            rate_limiter: Arc::new(Mutex::new(rate_limit::fred())),
        }
    }

    fn key(&self) -> DataResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            DataError::Config("FRED_API_KEY not set; macro data unavailable.".to_string())
        })
    }

    /// Observations for one series: latest non-missing value plus the last
    /// 30 points. Common ids: DFF, CPIAUCSL, UNRATE, GDP, T10Y2Y.
    pub async fn series(
        &self,
        series_id: &str,
        observation_start: Option<&str>,
    ) -> DataResult<SeriesData> {
        let series_id = validate_series_id(series_id)?;
        let key = self.key()?.to_string();

        if let Some(start) = observation_start {
            if !validate_date(start) {
                return Err(DataError::validation_error(
                    "observation_start",
                    "expected YYYY-MM-DD",
                ));
            }
        }

        self.rate_limiter.lock().await.acquire()?;
        tracing::info!("Fetching FRED series {}", series_id);

        let mut params = vec![
            ("series_id", series_id.clone()),
            ("api_key", key),
            ("file_type", "json".to_string()),
            ("sort_order", "desc".to_string()),
            ("limit", "100".to_string()),
        ];
        if let Some(start) = observation_start {
            params.push(("observation_start", start.to_string()));
        }

        let url = format!("{}/series/observations", BASE_URL);
        let response = self.client.get(&url).query(&params).send().await?;
        if !response.status().is_success() {
            return Err(DataError::api_error(
                response.status().as_u16(),
                "FRED observations request failed",
            ));
        }

        let body: ObservationsResponse = response.json().await?;
        latest_reading(&series_id, &body.observations)
    }

    /// Metadata for one series
    pub async fn series_info(&self, series_id: &str) -> DataResult<SeriesInfo> {
        let series_id = validate_series_id(series_id)?;
        let key = self.key()?.to_string();

        self.rate_limiter.lock().await.acquire()?;

        let url = format!("{}/series", BASE_URL);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("series_id", series_id.as_str()),
                ("api_key", key.as_str()),
                ("file_type", "json"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DataError::api_error(
                response.status().as_u16(),
                "FRED series request failed",
            ));
        }

        let body: SeriesResponse = response.json().await?;
        let raw = body
            .series
            .into_iter()
            .next()
            .ok_or_else(|| DataError::no_data(series_id.as_str(), "fred"))?;

        Ok(SeriesInfo {
            id: raw.id,
            title: raw.title,
            units: raw.units,
            frequency: raw.frequency,
            seasonal_adjustment: raw.seasonal_adjustment,
            last_updated: raw.last_updated,
            notes: truncate_notes(&raw.notes, 500),
        })
    }

    /// Key macro indicators in one report. Per-indicator failures are
    /// embedded as error records so one bad series does not sink the rest.
    pub async fn dashboard(&self) -> DataResult<serde_json::Value> {
        // Surface the missing-key error once instead of six times
        self.key()?;

        let mut indicators = serde_json::Map::new();
        for (name, series_id) in DASHBOARD_SERIES {
            let entry = match self.series(series_id, None).await {
                Ok(data) => json!({
                    "value": data.latest_value,
                    "date": data.latest_date,
                    "recent_history": data.observations.iter().take(5).collect::<Vec<_>>(),
                }),
                Err(e) => {
                    tracing::warn!("Dashboard indicator {} failed: {}", name, e);
                    serde_json::to_value(e.to_record())?
                }
            };
            indicators.insert((*name).to_string(), entry);
        }

        Ok(json!({
            "generated_at": Utc::now().to_rfc3339(),
            "indicators": indicators,
        }))
    }
}

/// FRED series ids are short uppercase alphanumerics (DFF, T10Y2Y, ...)
fn validate_series_id(raw: &str) -> DataResult<String> {
    let id = raw.trim().to_uppercase();
    let valid = !id.is_empty()
        && id.len() <= 30
        && id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if valid {
        Ok(id)
    } else {
        Err(DataError::Validation {
            field: "series_id".to_string(),
            message: format!("'{}' is not a valid FRED series id", raw),
        })
    }
}

/// Find the newest non-missing value in a descending observation list.
/// FRED encodes missing points as ".".
fn latest_reading(series_id: &str, observations: &[RawObservation]) -> DataResult<SeriesData> {
    let parsed: Vec<Observation> = observations
        .iter()
        .take(30)
        .map(|o| Observation {
            date: o.date.clone(),
            value: parse_value(&o.value),
        })
        .collect();

    let latest = observations
        .iter()
        .find_map(|o| parse_value(&o.value).map(|v| (o.date.clone(), v)))
        .ok_or_else(|| DataError::no_data(series_id, "fred"))?;

    Ok(SeriesData {
        series_id: series_id.to_string(),
        latest_value: latest.1,
        latest_date: latest.0,
        observations: parsed,
    })
}

fn parse_value(raw: &str) -> Option<f64> {
    if raw == "." {
        return None;
    }
    raw.parse().ok()
}

fn truncate_notes(notes: &str, max_len: usize) -> String {
    if notes.len() <= max_len {
        return notes.to_string();
    }
    let mut cut = max_len;
    while !notes.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &notes[..cut])
}
