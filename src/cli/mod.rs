use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use findata::Config;
use tracing::info;

pub mod commands;

#[derive(Parser)]
#[command(
    name = "findata",
    about = "Financial data fetchers returning normalized JSON",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List recent SEC EDGAR filings for a ticker
    Filings {
        #[arg(short, long)]
        ticker: String,

        /// Restrict to one form type (10-K, 10-Q, 8-K, ...)
        #[arg(short, long)]
        form: Option<String>,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// How many days back to search
        #[arg(short, long, default_value_t = 365)]
        days_back: i64,
    },

    /// Real-time quote
    Quote {
        #[arg(short, long)]
        ticker: String,

        /// Data source (yahoo or alpha-vantage)
        #[arg(short, long, default_value = "yahoo")]
        source: String,
    },

    /// Historical price bars
    History {
        #[arg(short, long)]
        symbol: String,

        /// Yahoo period token (1d 5d 1mo 3mo 6mo 1y 2y 5y 10y ytd max)
        #[arg(short, long, default_value = "1y")]
        period: String,

        /// Bar interval
        #[arg(short, long, default_value = "1d")]
        interval: String,

        /// Data source (yahoo or alpha-vantage)
        #[arg(long, default_value = "yahoo")]
        source: String,

        /// Days of history (alpha-vantage only)
        #[arg(long, default_value_t = 30)]
        days: usize,
    },

    /// Listing metadata (name, exchange, sector, valuation)
    Info {
        #[arg(short, long)]
        symbol: String,
    },

    /// History for a major index by friendly key (sp500, nikkei225, ...)
    Index {
        #[arg(short, long)]
        key: String,

        #[arg(short, long, default_value = "1y")]
        period: String,
    },

    /// History for a futures contract by friendly key (es, gold, ...)
    Future {
        #[arg(short, long)]
        key: String,

        #[arg(short, long, default_value = "1y")]
        period: String,
    },

    /// History for a commodity ETF proxy (gold_spot, oil_etf, ...)
    CommodityEtf {
        #[arg(short, long)]
        key: String,

        #[arg(short, long, default_value = "1y")]
        period: String,
    },

    /// Company fundamentals from Alpha Vantage
    Overview {
        #[arg(short, long)]
        ticker: String,
    },

    /// Upcoming earnings calendar from Alpha Vantage
    Calendar {
        #[arg(short, long)]
        ticker: Option<String>,

        /// 3month, 6month or 12month
        #[arg(long, default_value = "3month")]
        horizon: String,
    },

    /// Options chain and flow analysis
    Options {
        #[arg(short, long)]
        ticker: String,

        /// Expiration date (defaults to nearest)
        #[arg(short, long)]
        expiration: Option<NaiveDate>,

        /// Run the flow analysis instead of printing the raw chain
        #[arg(short, long)]
        analyze: bool,

        /// Unusual-volume multiplier over the chain average
        #[arg(long, default_value_t = 1.5)]
        threshold: f64,
    },

    /// Earnings history and beat/miss trend
    Earnings {
        #[arg(short, long)]
        ticker: String,

        #[arg(short, long, default_value_t = 4)]
        limit: usize,

        /// Print the beat/miss trend analysis
        #[arg(long)]
        trend: bool,

        /// Check whether earnings fall within N days
        #[arg(long)]
        soon_days: Option<i64>,
    },

    /// Financial news with lexicon sentiment
    News {
        #[arg(short, long)]
        ticker: Option<String>,

        #[arg(short, long)]
        query: Option<String>,

        #[arg(short, long, default_value_t = 7)]
        days: i64,

        /// Print the aggregated sentiment summary instead of articles
        #[arg(long)]
        summary: bool,
    },

    /// DeFi total value locked (global, or one protocol)
    Tvl {
        #[arg(short, long)]
        protocol: Option<String>,
    },

    /// Top crypto exchanges by volume
    Exchanges {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Current Ethereum gas prices
    Gas,

    /// Exchange inflow/outflow series for an asset
    Flows {
        #[arg(short, long, default_value = "BTC")]
        asset: String,

        #[arg(short, long, default_value_t = 7)]
        days: i64,
    },

    /// One FRED macro series
    Series {
        #[arg(short, long)]
        series_id: String,

        /// Observation start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
    },

    /// Key macro indicators in one report
    Dashboard,
}

/// Dispatch a parsed command
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Filings {
            ticker,
            form,
            limit,
            days_back,
        } => {
            info!("Fetching filings for {}", ticker);
            commands::filings(&config, &ticker, form.as_deref(), limit, days_back).await
        }
        Commands::Quote { ticker, source } => commands::quote(&config, &ticker, &source).await,
        Commands::History {
            symbol,
            period,
            interval,
            source,
            days,
        } => commands::history(&config, &symbol, &period, &interval, &source, days).await,
        Commands::Info { symbol } => commands::info(&symbol).await,
        Commands::Index { key, period } => commands::index(&key, &period).await,
        Commands::Future { key, period } => commands::future(&key, &period).await,
        Commands::CommodityEtf { key, period } => commands::commodity_etf(&key, &period).await,
        Commands::Overview { ticker } => commands::overview(&config, &ticker).await,
        Commands::Calendar { ticker, horizon } => {
            commands::calendar(&config, ticker.as_deref(), &horizon).await
        }
        Commands::Options {
            ticker,
            expiration,
            analyze,
            threshold,
        } => commands::options(&ticker, expiration, analyze, threshold).await,
        Commands::Earnings {
            ticker,
            limit,
            trend,
            soon_days,
        } => commands::earnings(&ticker, limit, trend, soon_days).await,
        Commands::News {
            ticker,
            query,
            days,
            summary,
        } => commands::news(&config, ticker.as_deref(), query.as_deref(), days, summary).await,
        Commands::Tvl { protocol } => commands::tvl(&config, protocol.as_deref()).await,
        Commands::Exchanges { limit } => commands::exchanges(&config, limit).await,
        Commands::Gas => commands::gas(&config).await,
        Commands::Flows { asset, days } => commands::flows(&config, &asset, days).await,
        Commands::Series { series_id, start } => {
            commands::series(&config, &series_id, start.as_deref()).await
        }
        Commands::Dashboard => commands::dashboard(&config).await,
    }
}
