use std::time::Duration;

use chrono::NaiveDate;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{MarketConfig, StocksConfig};
use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change_percent: Option<String>,
    pub latest_trading_day: Option<NaiveDate>,
}

/// A quote formatted for display in a market list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteView {
    pub name: String,
    pub price: String,
    pub change: String,
    pub latest_trading_day: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuotes {
    pub name: String,
    pub quotes: Vec<QuoteView>,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<RawQuote>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

impl RawQuote {
    fn into_quote(self) -> Option<Quote> {
        let symbol = self.symbol.filter(|s| !s.is_empty())?;
        let price = self.price?.trim().parse::<f64>().ok()?;

        Some(Quote {
            symbol,
            price,
            change_percent: self.change_percent.filter(|c| !c.is_empty()),
            latest_trading_day: self
                .latest_trading_day
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        })
    }
}

pub fn format_price(currency: &str, price: f64) -> String {
    format!("{}{:.2}", currency, price)
}

/// Positive changes get a leading `+`; anything unparsable is shown as-is.
pub fn format_change(change_percent: Option<&str>) -> String {
    let Some(change) = change_percent else {
        return "N/A".to_string();
    };

    let value = change.trim().trim_end_matches('%').parse::<f64>();
    match value {
        Ok(v) if v > 0.0 => format!("+{}", change),
        _ => change.to_string(),
    }
}

impl QuoteView {
    pub fn from_quote(quote: &Quote, currency: &str) -> Self {
        Self {
            name: quote.symbol.clone(),
            price: format_price(currency, quote.price),
            change: format_change(quote.change_percent.as_deref()),
            latest_trading_day: quote.latest_trading_day,
        }
    }
}

pub struct StockClient {
    client: Client,
    base_url: String,
    api_key: String,
    markets: Vec<MarketConfig>,
}

impl StockClient {
    pub fn new(config: &StocksConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("PulseNews/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            markets: config.markets.clone(),
        })
    }

    /// Latest quote for `symbol`, or `None` when the API has no usable data.
    pub async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>, FetchError> {
        let response = self
            .client
            .get(format!("{}/query", self.base_url))
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body: QuoteResponse = response.json().await?;
        if let Some(note) = body.note.or(body.information) {
            return Err(FetchError::Api(note));
        }

        Ok(body.global_quote.and_then(RawQuote::into_quote))
    }

    /// Quotes for every symbol in `market`. Symbols that fail or come back
    /// empty are left out.
    pub async fn fetch_market(&self, market: &MarketConfig) -> MarketQuotes {
        let results = join_all(market.symbols.iter().map(|s| self.fetch_quote(s))).await;

        let quotes: Vec<QuoteView> = market
            .symbols
            .iter()
            .zip(results)
            .filter_map(|(symbol, result)| match result {
                Ok(Some(quote)) => Some(QuoteView::from_quote(&quote, &market.currency)),
                Ok(None) => {
                    warn!("No data for {}", symbol);
                    None
                }
                Err(e) => {
                    warn!("Failed to fetch quote for {}: {}", symbol, e);
                    None
                }
            })
            .collect();

        info!(
            "Fetched {}/{} quotes for market '{}'",
            quotes.len(),
            market.symbols.len(),
            market.name
        );

        MarketQuotes {
            name: market.name.clone(),
            quotes,
        }
    }

    pub async fn fetch_markets(&self) -> Vec<MarketQuotes> {
        join_all(self.markets.iter().map(|m| self.fetch_market(m))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, markets: Vec<MarketConfig>) -> StockClient {
        let config = StocksConfig {
            base_url: server.uri(),
            api_key: "demo".to_string(),
            markets,
        };
        StockClient::new(&config, Duration::from_secs(5)).unwrap()
    }

    fn market(name: &str, currency: &str, symbols: &[&str]) -> MarketConfig {
        MarketConfig {
            name: name.to_string(),
            currency: currency.to_string(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn quote_body(symbol: &str, price: &str, change: &str) -> serde_json::Value {
        json!({
            "Global Quote": {
                "01. symbol": symbol,
                "02. open": "1.0",
                "05. price": price,
                "07. latest trading day": "2024-12-09",
                "10. change percent": change
            }
        })
    }

    async fn mount_quote(server: &MockServer, symbol: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("function", "GLOBAL_QUOTE"))
            .and(query_param("symbol", symbol))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    mod format_tests {
        use super::*;

        #[test]
        fn test_format_price() {
            assert_eq!(format_price("$", 189.98), "$189.98");
            assert_eq!(format_price("₹", 2950.0), "₹2950.00");
        }

        #[test]
        fn test_format_positive_change() {
            assert_eq!(format_change(Some("0.5000%")), "+0.5000%");
        }

        #[test]
        fn test_format_negative_and_zero_change() {
            assert_eq!(format_change(Some("-1.2500%")), "-1.2500%");
            assert_eq!(format_change(Some("0.0000%")), "0.0000%");
        }

        #[test]
        fn test_format_missing_change() {
            assert_eq!(format_change(None), "N/A");
        }
    }

    mod fetch_quote_tests {
        use super::*;

        #[tokio::test]
        async fn test_fetch_quote() {
            let server = MockServer::start().await;
            mount_quote(&server, "AAPL", quote_body("AAPL", "189.9800", "0.5000%")).await;

            let client = client_for(&server, vec![]);
            let quote = client.fetch_quote("AAPL").await.unwrap().unwrap();

            assert_eq!(quote.symbol, "AAPL");
            assert!((quote.price - 189.98).abs() < f64::EPSILON);
            assert_eq!(quote.change_percent.as_deref(), Some("0.5000%"));
            assert_eq!(
                quote.latest_trading_day,
                NaiveDate::from_ymd_opt(2024, 12, 9)
            );
        }

        #[tokio::test]
        async fn test_empty_quote_is_none() {
            let server = MockServer::start().await;
            mount_quote(&server, "NOPE", json!({ "Global Quote": {} })).await;

            let client = client_for(&server, vec![]);
            assert_eq!(client.fetch_quote("NOPE").await.unwrap(), None);
        }

        #[tokio::test]
        async fn test_unparsable_price_is_none() {
            let server = MockServer::start().await;
            mount_quote(&server, "BAD", quote_body("BAD", "n/a", "1%")).await;

            let client = client_for(&server, vec![]);
            assert_eq!(client.fetch_quote("BAD").await.unwrap(), None);
        }

        #[tokio::test]
        async fn test_rate_limit_note_is_error() {
            let server = MockServer::start().await;
            mount_quote(
                &server,
                "AAPL",
                json!({ "Note": "API call frequency exceeded" }),
            )
            .await;

            let client = client_for(&server, vec![]);
            let result = client.fetch_quote("AAPL").await;
            assert!(matches!(result, Err(FetchError::Api(_))));
        }
    }

    mod fetch_market_tests {
        use super::*;

        #[tokio::test]
        async fn test_malformed_quotes_are_filtered() {
            let server = MockServer::start().await;
            mount_quote(&server, "AAPL", quote_body("AAPL", "189.9800", "0.5000%")).await;
            mount_quote(&server, "TSLA", json!({ "Global Quote": {} })).await;
            mount_quote(&server, "MSFT", quote_body("MSFT", "420.1", "-0.2000%")).await;
            Mock::given(method("GET"))
                .and(path("/query"))
                .and(query_param("symbol", "AMZN"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;

            let global = market("Global", "$", &["AAPL", "TSLA", "AMZN", "MSFT"]);
            let client = client_for(&server, vec![global.clone()]);
            let result = client.fetch_market(&global).await;

            assert_eq!(result.name, "Global");
            assert_eq!(result.quotes.len(), 2);
            assert_eq!(result.quotes[0].name, "AAPL");
            assert_eq!(result.quotes[0].price, "$189.98");
            assert_eq!(result.quotes[0].change, "+0.5000%");
            assert_eq!(result.quotes[1].name, "MSFT");
            assert_eq!(result.quotes[1].change, "-0.2000%");
        }

        #[tokio::test]
        async fn test_fetch_markets_uses_market_currency() {
            let server = MockServer::start().await;
            mount_quote(&server, "AAPL", quote_body("AAPL", "10", "1%")).await;
            mount_quote(&server, "TCS.BSE", quote_body("TCS.BSE", "4100.5", "")).await;

            let client = client_for(
                &server,
                vec![
                    market("Global", "$", &["AAPL"]),
                    market("India", "₹", &["TCS.BSE"]),
                ],
            );
            let markets = client.fetch_markets().await;

            assert_eq!(markets.len(), 2);
            assert_eq!(markets[0].quotes[0].price, "$10.00");
            assert_eq!(markets[1].name, "India");
            assert_eq!(markets[1].quotes[0].price, "₹4100.50");
            assert_eq!(markets[1].quotes[0].change, "N/A");
        }
    }
}
