use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

use findata::data::market::Interval;
use findata::data::{
    AlphaVantageClient, CryptoClient, DataResult, EarningsClient, FredClient, NewsClient,
    OptionsClient, SecFilingsClient, YahooFinanceClient,
};
use findata::Config;

/// Print a result as pretty JSON; failures become structured error records
/// on stdout rather than process aborts.
fn emit<T: Serialize>(result: DataResult<T>) -> Result<()> {
    match result {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(e) => println!("{}", serde_json::to_string_pretty(&e.to_record())?),
    }
    Ok(())
}

pub async fn filings(
    config: &Config,
    ticker: &str,
    form: Option<&str>,
    limit: usize,
    days_back: i64,
) -> Result<()> {
    let client = SecFilingsClient::new(&config.apis.sec_user_agent);
    emit(client.recent_filings(ticker, form, limit, days_back).await)
}

pub async fn quote(config: &Config, ticker: &str, source: &str) -> Result<()> {
    match source {
        "alpha-vantage" => {
            let client = AlphaVantageClient::new(config.apis.alpha_vantage_api_key.clone());
            emit(client.quote(ticker).await)
        }
        _ => {
            let client = YahooFinanceClient::new();
            emit(client.current_price(ticker).await)
        }
    }
}

pub async fn history(
    config: &Config,
    symbol: &str,
    period: &str,
    interval: &str,
    source: &str,
    days: usize,
) -> Result<()> {
    match source {
        "alpha-vantage" => {
            let client = AlphaVantageClient::new(config.apis.alpha_vantage_api_key.clone());
            let parsed = match interval.parse::<Interval>() {
                Ok(i) => i,
                Err(e) => return emit::<()>(Err(e)),
            };
            emit(client.price_history(symbol, days, parsed).await)
        }
        _ => {
            let client = YahooFinanceClient::new();
            emit(client.price_history(symbol, period, interval).await)
        }
    }
}

pub async fn info(symbol: &str) -> Result<()> {
    let client = YahooFinanceClient::new();
    emit(client.stock_info(symbol).await)
}

pub async fn index(key: &str, period: &str) -> Result<()> {
    let client = YahooFinanceClient::new();
    emit(client.index_history(key, period).await)
}

pub async fn future(key: &str, period: &str) -> Result<()> {
    let client = YahooFinanceClient::new();
    emit(client.future_history(key, period).await)
}

pub async fn commodity_etf(key: &str, period: &str) -> Result<()> {
    let client = YahooFinanceClient::new();
    emit(client.commodity_etf_history(key, period).await)
}

pub async fn overview(config: &Config, ticker: &str) -> Result<()> {
    let client = AlphaVantageClient::new(config.apis.alpha_vantage_api_key.clone());
    emit(client.company_overview(ticker).await)
}

pub async fn calendar(config: &Config, ticker: Option<&str>, horizon: &str) -> Result<()> {
    let client = AlphaVantageClient::new(config.apis.alpha_vantage_api_key.clone());
    emit(client.earnings_calendar(ticker, horizon).await)
}

pub async fn options(
    ticker: &str,
    expiration: Option<NaiveDate>,
    analyze: bool,
    threshold: f64,
) -> Result<()> {
    let client = OptionsClient::new();
    if analyze {
        emit(client.analyze_flow(ticker, expiration, threshold).await)
    } else {
        emit(client.chain(ticker, expiration).await)
    }
}

pub async fn earnings(
    ticker: &str,
    limit: usize,
    trend: bool,
    soon_days: Option<i64>,
) -> Result<()> {
    let client = EarningsClient::new();
    if let Some(days) = soon_days {
        emit(client.earnings_soon(ticker, days).await)
    } else if trend {
        emit(client.trend(ticker).await)
    } else {
        emit(client.history(ticker, limit).await)
    }
}

pub async fn news(
    config: &Config,
    ticker: Option<&str>,
    query: Option<&str>,
    days: i64,
    summary: bool,
) -> Result<()> {
    let client = NewsClient::new(config.apis.news_api_key.clone());
    if summary {
        emit(client.sentiment_summary(ticker, days).await)
    } else {
        emit(client.financial_news(query, ticker, days, 20).await)
    }
}

fn crypto_client(config: &Config) -> CryptoClient {
    CryptoClient::new(
        config.apis.etherscan_api_key.clone(),
        config.apis.glassnode_api_key.clone(),
    )
}

pub async fn tvl(config: &Config, protocol: Option<&str>) -> Result<()> {
    emit(crypto_client(config).defi_tvl(protocol).await)
}

pub async fn exchanges(config: &Config, limit: usize) -> Result<()> {
    emit(crypto_client(config).top_exchanges(limit).await)
}

pub async fn gas(config: &Config) -> Result<()> {
    emit(crypto_client(config).gas_prices().await)
}

pub async fn flows(config: &Config, asset: &str, days: i64) -> Result<()> {
    emit(crypto_client(config).exchange_flows(asset, days).await)
}

pub async fn series(config: &Config, series_id: &str, start: Option<&str>) -> Result<()> {
    let client = FredClient::new(config.apis.fred_api_key.clone());
    emit(client.series(series_id, start).await)
}

pub async fn dashboard(config: &Config) -> Result<()> {
    let client = FredClient::new(config.apis.fred_api_key.clone());
    emit(client.dashboard().await)
}
