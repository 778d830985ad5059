//! Financial news client with lexicon-based sentiment scoring
//! Backed by NewsAPI; requires a key (free tier: 100 requests/day).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;

use super::validation::sanitize_ticker;
use super::{rate_limit, redact_key, DataError, DataResult, RateLimiter};

const BASE_URL: &str = "https://newsapi.org/v2";

/// Words that read bullish in a financial headline
const POSITIVE_WORDS: &[&str] = &[
    "surge", "soar", "jump", "rally", "gain", "rise", "boost", "growth", "profit", "beat",
    "exceed", "strong", "bullish", "optimistic", "recovery", "outperform", "upgrade", "buy",
    "opportunity",
];

/// Words that read bearish
const NEGATIVE_WORDS: &[&str] = &[
    "crash", "plunge", "drop", "fall", "decline", "loss", "bearish", "miss", "weak", "downgrade",
    "sell", "risk", "concern", "worry", "recession", "inflation", "debt", "crisis", "fraud",
    "investigation",
];

/// One scored article
#[derive(Debug, Clone, Serialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub published_at: String,
    pub source: String,
    pub sentiment_score: f64,
}

pub struct NewsClient {
    client: reqwest::Client,
    api_key: Option<String>,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl NewsClient {
    pub fn new(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("findata/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        if api_key.is_none() {
            tracing::info!(
                "NewsAPI key not configured; news sentiment disabled. \
                 Free keys: https://newsapi.org/register"
            );
        }

        Self {
            client,
            api_key,
            rate_limiter: Arc::new(Mutex::new(rate_limit::news_api())),
        }
    }

    /// Fetch recent financial news, scored per article.
    /// `query` and `ticker` are combined; both empty falls back to a broad
    /// market search.
    pub async fn financial_news(
        &self,
        query: Option<&str>,
        ticker: Option<&str>,
        days: i64,
        page_size: usize,
    ) -> DataResult<Vec<NewsArticle>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            DataError::Config(
                "NEWS_API_KEY not set; news sentiment unavailable.".to_string(),
            )
        })?;

        let sanitized_ticker = match ticker {
            Some(t) => Some(sanitize_ticker(t)?),
            None => None,
        };

        let mut search = query.unwrap_or("").trim().to_string();
        if let Some(t) = sanitized_ticker.as_deref() {
            if search.is_empty() {
                search = t.to_string();
            } else {
                search = format!("{} {}", search, t);
            }
        }
        if search.is_empty() {
            search = "finance OR stock OR market".to_string();
        }

        self.rate_limiter.lock().await.acquire()?;

        let from_date = (Utc::now() - chrono::Duration::days(days)).date_naive();
        let url = format!(
            "{}/everything?q={}&from={}&language=en&sortBy=publishedAt&pageSize={}&apiKey={}",
            BASE_URL,
            urlencoding::encode(&search),
            from_date,
            page_size.min(100),
            api_key
        );
        tracing::debug!("NewsAPI request: GET {}", redact_key(&url, api_key));

        super::retry::retry_with_backoff(
            || async {
                let response = self.client.get(&url).send().await?;
                if !response.status().is_success() {
                    return Err(DataError::api_error(
                        response.status().as_u16(),
                        "NewsAPI request failed",
                    ));
                }

                let body: serde_json::Value = response.json().await?;
                if body["status"].as_str() != Some("ok") {
                    return Err(DataError::parse_error("NewsAPI rejected the query"));
                }

                let articles = parse_articles(&body);
                tracing::info!("Fetched {} news articles", articles.len());
                Ok(articles)
            },
            2,
        )
        .await
    }

    /// Aggregated sentiment for a ticker (or the broad market)
    pub async fn sentiment_summary(
        &self,
        ticker: Option<&str>,
        days: i64,
    ) -> DataResult<serde_json::Value> {
        let articles = self.financial_news(None, ticker, days, 50).await?;
        Ok(summarize(ticker, &articles))
    }
}

fn parse_articles(body: &serde_json::Value) -> Vec<NewsArticle> {
    let raw = match body["articles"].as_array() {
        Some(a) => a,
        None => return Vec::new(),
    };

    raw.iter()
        .map(|article| {
            let title = article["title"].as_str().unwrap_or("").to_string();
            let description = article["description"].as_str().map(String::from);
            NewsArticle {
                sentiment_score: sentiment_score(&title, description.as_deref()),
                title,
                description,
                url: article["url"].as_str().unwrap_or("").to_string(),
                published_at: article["publishedAt"].as_str().unwrap_or("").to_string(),
                source: article["source"]["name"].as_str().unwrap_or("Unknown").to_string(),
            }
        })
        .collect()
}

/// Lexicon score over the distinct words of title + description,
/// normalized to [-1, 1]. 0.0 when no lexicon word appears.
pub fn sentiment_score(title: &str, description: Option<&str>) -> f64 {
    let text = format!("{} {}", title, description.unwrap_or("")).to_lowercase();
    let words: HashSet<&str> = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let positive = POSITIVE_WORDS.iter().filter(|w| words.contains(**w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| words.contains(**w)).count();
    let total = positive + negative;

    if total == 0 {
        return 0.0;
    }
    (positive as f64 - negative as f64) / total as f64
}

/// Most frequent words of at least 4 letters across headlines, top 10
fn key_topics(articles: &[NewsArticle]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for article in articles {
        for word in article
            .title
            .to_lowercase()
            .split(|c: char| !c.is_ascii_alphabetic())
        {
            if word.len() >= 4 {
                *counts.entry(word.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(10).map(|(word, _)| word).collect()
}

fn summarize(ticker: Option<&str>, articles: &[NewsArticle]) -> serde_json::Value {
    if articles.is_empty() {
        return json!({
            "ticker": ticker,
            "article_count": 0,
            "average_sentiment": null,
            "sentiment_label": "No data",
        });
    }

    let scores: Vec<f64> = articles.iter().map(|a| a.sentiment_score).collect();
    let avg = scores.iter().sum::<f64>() / scores.len() as f64;

    let label = if avg > 0.2 {
        "Bullish"
    } else if avg < -0.2 {
        "Bearish"
    } else {
        "Neutral"
    };

    json!({
        "ticker": ticker,
        "article_count": articles.len(),
        "average_sentiment": (avg * 1000.0).round() / 1000.0,
        "sentiment_label": label,
        "positive_articles": scores.iter().filter(|&&s| s > 0.1).count(),
        "negative_articles": scores.iter().filter(|&&s| s < -0.1).count(),
        "neutral_articles": scores.iter().filter(|&&s| (-0.1..=0.1).contains(&s)).count(),
        "key_topics": key_topics(articles),
        "latest_headlines": articles.iter().take(5).map(|a| json!({
            "title": a.title,
            "sentiment": a.sentiment_score,
            "source": a.source,
        })).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, score: f64) -> NewsArticle {
        NewsArticle {
            title: title.to_string(),
            description: None,
            url: "https://example.com".to_string(),
            published_at: "2024-06-05T12:00:00Z".to_string(),
            source: "Test Wire".to_string(),
            sentiment_score: score,
        }
    }

    #[test]
    fn test_sentiment_score_directions() {
        assert!(sentiment_score("Stocks surge as earnings beat expectations", None) > 0.5);
        assert!(sentiment_score("Markets crash on recession fears, heavy loss", None) < -0.5);
        assert_eq!(sentiment_score("Company announces quarterly report", None), 0.0);
    }

    #[test]
    fn test_sentiment_score_mixed_text() {
        // One bullish word, one bearish word: (1 - 1) / 2 = 0
        let score = sentiment_score("Shares rally despite inflation", None);
        assert_eq!(score, 0.0);

        // Description contributes too
        let score = sentiment_score("Quarterly results", Some("strong growth and record profit"));
        assert!(score > 0.9);
    }

    #[test]
    fn test_duplicate_words_count_once() {
        let repeated = sentiment_score("rally rally rally crash", None);
        // Distinct words: {rally, crash} -> (1 - 1) / 2
        assert_eq!(repeated, 0.0);
    }

    #[test]
    fn test_parse_articles_fixture() {
        let body: serde_json::Value = serde_json::from_str(
            r#"{
                "status": "ok",
                "articles": [{
                    "source": {"id": null, "name": "Example Wire"},
                    "title": "Tech stocks rally on strong earnings",
                    "description": "Chipmakers jump after results beat estimates",
                    "url": "https://example.com/a",
                    "publishedAt": "2024-06-05T09:30:00Z"
                }]
            }"#,
        )
        .expect("fixture parses");

        let articles = parse_articles(&body);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].source, "Example Wire");
        assert!(articles[0].sentiment_score > 0.0);
    }

    #[test]
    fn test_summary_labels() {
        let bullish = summarize(
            Some("AAPL"),
            &[article("a", 0.8), article("b", 0.4), article("c", 0.0)],
        );
        assert_eq!(bullish["sentiment_label"], "Bullish");
        assert_eq!(bullish["positive_articles"], 2);
        assert_eq!(bullish["neutral_articles"], 1);

        let bearish = summarize(Some("AAPL"), &[article("a", -0.9), article("b", -0.5)]);
        assert_eq!(bearish["sentiment_label"], "Bearish");

        let empty = summarize(None, &[]);
        assert_eq!(empty["sentiment_label"], "No data");
        assert_eq!(empty["article_count"], 0);
    }

    #[test]
    fn test_key_topics_frequency() {
        let articles = vec![
            article("Nvidia earnings preview", 0.0),
            article("Nvidia earnings beat", 0.5),
            article("Fed holds rates", 0.0),
        ];
        let topics = key_topics(&articles);
        assert_eq!(topics[0], "earnings");
        assert!(topics.contains(&"nvidia".to_string()));
        // Three-letter words are dropped
        assert!(!topics.contains(&"fed".to_string()));
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let client = NewsClient::new(None);
        match client.financial_news(None, Some("AAPL"), 7, 20).await {
            Err(DataError::Config(msg)) => assert!(msg.contains("NEWS_API_KEY")),
            other => panic!("expected config error, got {:?}", other.err()),
        }
    }
}
