// findata - API clients for financial data providers
// Fetches SEC filings, stock prices, options chains, earnings history, news
// sentiment, crypto on-chain metrics and macro indicators, and reshapes each
// provider's payload into normalized records for an AI assistant runtime.

#![deny(clippy::unwrap_used)]

pub mod config;
pub mod data;

// Re-export commonly used items
pub use config::Config;
pub use data::{DataError, DataResult, ErrorKind, ErrorRecord, PricePoint};
