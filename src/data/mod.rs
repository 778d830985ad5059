//! Data clients for external financial APIs
//! Each submodule wraps one provider family and returns normalized records

pub mod crypto;
pub mod earnings;
pub mod errors;
pub mod fred;
pub mod market;
pub mod news;
pub mod options;
pub mod rate_limit;
pub mod retry;
pub mod sec;
pub mod yahoo;

// Re-export commonly used types
pub use crypto::CryptoClient;
pub use earnings::EarningsClient;
pub use errors::{redact_key, DataError, DataResult, ErrorKind, ErrorRecord};
pub use fred::FredClient;
pub use market::AlphaVantageClient;
pub use news::NewsClient;
pub use options::OptionsClient;
pub use rate_limit::RateLimiter;
pub use sec::SecFilingsClient;
pub use yahoo::YahooFinanceClient;

use serde::{Deserialize, Serialize};

/// One daily (or weekly/monthly) price bar, shared by the Alpha Vantage and
/// Yahoo Finance clients. `adjusted_close` is only populated by providers
/// that report it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_close: Option<f64>,
}

/// Input validation helpers. Every ticker passes through here before being
/// interpolated into a URL.
pub mod validation {
    use super::{DataError, DataResult};
    use chrono::NaiveDate;

    const MAX_TICKER_LEN: usize = 20;

    /// Check a ticker against the fixed allow-list. Accepts US symbols
    /// (AAPL, BRK.B), exchange-suffixed listings (0700.HK, 7203.T,
    /// 005930.KS), indices (^GSPC) and futures (CL=F).
    pub fn validate_ticker(ticker: &str) -> bool {
        if ticker.is_empty() || ticker.len() > MAX_TICKER_LEN {
            return false;
        }
        if ticker.contains("..") {
            return false;
        }
        ticker
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '^' | '.' | '=' | '-'))
    }

    /// Trim, uppercase, and validate a raw ticker
    pub fn sanitize_ticker(raw: &str) -> DataResult<String> {
        let cleaned = raw.trim().to_uppercase();
        if validate_ticker(&cleaned) {
            Ok(cleaned)
        } else {
            Err(DataError::InvalidSymbol(raw.to_string()))
        }
    }

    /// Validate a YYYY-MM-DD date string
    pub fn validate_date(date_str: &str) -> bool {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").is_ok()
    }

    /// Validate a numeric parameter with optional bounds
    pub fn validate_range(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
        if !value.is_finite() {
            return false;
        }
        if let Some(lo) = min {
            if value < lo {
                return false;
            }
        }
        if let Some(hi) = max {
            if value > hi {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::validation::*;

    #[test]
    fn test_accepts_supported_ticker_formats() {
        for t in [
            "AAPL", "BRK.B", "BF.A", "0700.HK", "7203.T", "2330.TW", "005930.KS", "600519.SS",
            "000001.SZ", "^GSPC", "^N225", "ES=F", "CL=F",
        ] {
            assert!(validate_ticker(t), "should accept {}", t);
        }
    }

    #[test]
    fn test_rejects_hostile_tickers() {
        for t in [
            "",
            "AAPL; DROP TABLE--",
            "../etc/passwd",
            "AAPL/..",
            "A..B",
            "aapl",
            "SPY OR 1=1",
            "WAYTOOLONGTICKERSYMBOL",
        ] {
            assert!(!validate_ticker(t), "should reject {:?}", t);
        }
    }

    #[test]
    fn test_sanitize_normalizes_case_and_whitespace() {
        assert_eq!(sanitize_ticker("  aapl ").expect("valid"), "AAPL");
        assert_eq!(sanitize_ticker("0700.hk").expect("valid"), "0700.HK");
        assert!(sanitize_ticker("bad ticker").is_err());
    }

    #[test]
    fn test_date_validation() {
        assert!(validate_date("2024-02-29"));
        assert!(!validate_date("2023-02-29"));
        assert!(!validate_date("02/29/2024"));
        assert!(!validate_date("not-a-date"));
    }

    #[test]
    fn test_numeric_range() {
        assert!(validate_range(30.0, Some(1.0), Some(5000.0)));
        assert!(!validate_range(0.0, Some(1.0), None));
        assert!(!validate_range(f64::NAN, None, None));
        assert!(!validate_range(9000.0, None, Some(5000.0)));
    }
}
