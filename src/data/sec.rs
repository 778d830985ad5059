//! SEC EDGAR filings client
//! Resolves tickers to CIK numbers and lists recent filings per company.
//! EDGAR requires a descriptive User-Agent and allows ~10 requests/second;
//! we stay well under that with a 10/minute window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::validation::sanitize_ticker;
use super::{rate_limit, DataError, DataResult, RateLimiter};

const TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";

/// One EDGAR filing, normalized
#[derive(Debug, Clone, Serialize)]
pub struct Filing {
    pub accession_number: String,
    pub form: String,
    pub filed_date: NaiveDate,
    pub document_url: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    cik_str: u64,
    ticker: String,
}

#[derive(Debug, Deserialize)]
struct SubmissionsResponse {
    filings: FilingsSection,
}

#[derive(Debug, Deserialize)]
struct FilingsSection {
    recent: RecentFilings,
}

/// EDGAR serves the recent-filings table as parallel arrays
#[derive(Debug, Deserialize)]
struct RecentFilings {
    #[serde(rename = "form")]
    forms: Vec<String>,
    #[serde(rename = "filingDate")]
    filing_dates: Vec<String>,
    #[serde(rename = "accessionNumber")]
    accession_numbers: Vec<String>,
    #[serde(rename = "primaryDocDescription", default)]
    primary_doc_descriptions: Vec<String>,
}

pub struct SecFilingsClient {
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl SecFilingsClient {
    pub fn new(user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(user_agent.to_string())
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            rate_limiter: Arc::new(Mutex::new(rate_limit::sec_edgar())),
        }
    }

    /// Resolve a ticker to its CIK number
    pub async fn cik_for_ticker(&self, ticker: &str) -> DataResult<Option<u64>> {
        let ticker = sanitize_ticker(ticker)?;
        self.rate_limiter.lock().await.acquire()?;

        let response = self.client.get(TICKERS_URL).send().await?;
        if !response.status().is_success() {
            return Err(DataError::api_error(
                response.status().as_u16(),
                "SEC ticker directory request failed",
            ));
        }

        let entries: HashMap<String, TickerEntry> = response.json().await?;
        Ok(entries
            .values()
            .find(|e| e.ticker.eq_ignore_ascii_case(&ticker))
            .map(|e| e.cik_str))
    }

    /// List recent filings for a ticker, optionally restricted to one form
    /// type (10-K, 10-Q, 8-K, ...), newest first as EDGAR reports them.
    pub async fn recent_filings(
        &self,
        ticker: &str,
        form: Option<&str>,
        limit: usize,
        days_back: i64,
    ) -> DataResult<Vec<Filing>> {
        let ticker = sanitize_ticker(ticker)?;
        tracing::info!("Fetching EDGAR filings for {}", ticker);

        let cik = self
            .cik_for_ticker(&ticker)
            .await?
            .ok_or_else(|| DataError::no_data(ticker.as_str(), "sec_edgar"))?;

        self.rate_limiter.lock().await.acquire()?;

        let url = format!("https://data.sec.gov/submissions/CIK{:010}.json", cik);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(DataError::api_error(
                response.status().as_u16(),
                "SEC submissions request failed",
            ));
        }

        let submissions: SubmissionsResponse = response.json().await?;
        let cutoff = (Utc::now() - chrono::Duration::days(days_back)).date_naive();
        let filings = collect_filings(&submissions.filings.recent, cik, form, limit, cutoff);

        tracing::info!("Found {} matching filings for {}", filings.len(), ticker);
        Ok(filings)
    }

    /// Summary of the most recent 10-K, if one exists in the window
    pub async fn latest_10k(&self, ticker: &str) -> DataResult<Option<serde_json::Value>> {
        let filings = self.recent_filings(ticker, Some("10-K"), 1, 730).await?;
        Ok(filings.first().map(|f| {
            serde_json::json!({
                "ticker": ticker.trim().to_uppercase(),
                "form": f.form,
                "filed_date": f.filed_date.to_string(),
                "document_url": f.document_url,
                "description": f.description,
            })
        }))
    }
}

/// Walk EDGAR's parallel arrays, filtering by form type and filing date
fn collect_filings(
    recent: &RecentFilings,
    cik: u64,
    form: Option<&str>,
    limit: usize,
    cutoff: NaiveDate,
) -> Vec<Filing> {
    let mut filings = Vec::new();

    for i in 0..recent.forms.len() {
        if filings.len() >= limit {
            break;
        }

        let filed_date = match recent
            .filing_dates
            .get(i)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        {
            Some(d) => d,
            None => continue,
        };
        if filed_date < cutoff {
            continue;
        }

        if let Some(wanted) = form {
            if recent.forms[i] != wanted {
                continue;
            }
        }

        let accession = match recent.accession_numbers.get(i) {
            Some(a) => a.clone(),
            None => continue,
        };

        filings.push(Filing {
            document_url: index_url(cik, &accession),
            accession_number: accession,
            form: recent.forms[i].clone(),
            filed_date,
            description: recent
                .primary_doc_descriptions
                .get(i)
                .cloned()
                .unwrap_or_default(),
        });
    }

    filings
}

/// EDGAR index page for one accession number
fn index_url(cik: u64, accession: &str) -> String {
    let no_dashes = accession.replace('-', "");
    format!(
        "https://www.sec.gov/Archives/edgar/data/{}/{}/{}-index.htm",
        cik, no_dashes, accession
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICKERS_FIXTURE: &str = r#"{
        "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
        "1": {"cik_str": 789019, "ticker": "MSFT", "title": "MICROSOFT CORP"}
    }"#;

    fn sample_recent() -> RecentFilings {
        serde_json::from_str(
            r#"{
                "form": ["10-K", "8-K", "10-Q", "10-K"],
                "filingDate": ["2024-11-01", "2024-08-05", "2024-08-02", "2023-11-03"],
                "accessionNumber": [
                    "0000320193-24-000123",
                    "0000320193-24-000101",
                    "0000320193-24-000081",
                    "0000320193-23-000106"
                ],
                "primaryDocDescription": ["10-K", "8-K", "10-Q", "10-K"]
            }"#,
        )
        .expect("fixture parses")
    }

    #[test]
    fn test_parse_ticker_directory() {
        let entries: HashMap<String, TickerEntry> =
            serde_json::from_str(TICKERS_FIXTURE).expect("fixture parses");
        let apple = entries
            .values()
            .find(|e| e.ticker == "AAPL")
            .expect("AAPL present");
        assert_eq!(apple.cik_str, 320193);
    }

    #[test]
    fn test_index_url_strips_dashes() {
        let url = index_url(320193, "0000320193-24-000123");
        assert_eq!(
            url,
            "https://www.sec.gov/Archives/edgar/data/320193/000032019324000123/0000320193-24-000123-index.htm"
        );
    }

    #[test]
    fn test_collect_filters_by_form_and_cutoff() {
        let recent = sample_recent();
        let cutoff = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");

        let tenks = collect_filings(&recent, 320193, Some("10-K"), 10, cutoff);
        assert_eq!(tenks.len(), 1);
        assert_eq!(tenks[0].accession_number, "0000320193-24-000123");

        let all = collect_filings(&recent, 320193, None, 10, cutoff);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_collect_respects_limit() {
        let recent = sample_recent();
        let cutoff = NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid date");
        let filings = collect_filings(&recent, 320193, None, 2, cutoff);
        assert_eq!(filings.len(), 2);
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_live_cik_lookup() {
        let client = SecFilingsClient::new("findata test suite test@example.com");
        let cik = client.cik_for_ticker("AAPL").await.expect("lookup works");
        assert_eq!(cik, Some(320193));
    }
}
