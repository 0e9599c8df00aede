use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::news::Category;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Timeout applied to every remote call, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub stocks: StocksConfig,
    #[serde(default)]
    pub polls: PollsConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewsConfig {
    #[serde(default = "default_news_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            base_url: default_news_base_url(),
            api_key: String::new(),
            categories: default_categories(),
        }
    }
}

fn default_news_base_url() -> String {
    "https://newsapi.org/v2".to_string()
}

fn default_categories() -> Vec<Category> {
    Category::ALL.to_vec()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StocksConfig {
    #[serde(default = "default_stocks_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_markets")]
    pub markets: Vec<MarketConfig>,
}

impl Default for StocksConfig {
    fn default() -> Self {
        Self {
            base_url: default_stocks_base_url(),
            api_key: String::new(),
            markets: default_markets(),
        }
    }
}

fn default_stocks_base_url() -> String {
    "https://www.alphavantage.co".to_string()
}

fn default_markets() -> Vec<MarketConfig> {
    vec![
        MarketConfig {
            name: "Global".to_string(),
            currency: "$".to_string(),
            symbols: ["AAPL", "TSLA", "AMZN", "GOOGL", "MSFT"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        },
        MarketConfig {
            name: "India".to_string(),
            currency: "₹".to_string(),
            symbols: [
                "RELIANCE.BSE",
                "TCS.BSE",
                "INFY.BSE",
                "HDFCBANK.BSE",
                "ICICIBANK.BSE",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        },
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketConfig {
    pub name: String,
    pub currency: String,
    pub symbols: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollsConfig {
    #[serde(default = "default_polls_base_url")]
    pub base_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for PollsConfig {
    fn default() -> Self {
        Self {
            base_url: default_polls_base_url(),
            collection: default_collection(),
        }
    }
}

fn default_polls_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_collection() -> String {
    "polls".to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        // A zero timeout fails every remote call immediately
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Replace API keys with `NEWS_API_KEY` / `STOCK_API_KEY` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("NEWS_API_KEY") {
            self.news.api_key = key;
        }
        if let Ok(key) = std::env::var("STOCK_API_KEY") {
            self.stocks.api_key = key;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
