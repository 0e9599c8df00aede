use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::NewsConfig;
use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Business,
    Politics,
    Entertainment,
    Sports,
    Technology,
    Health,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown category '{0}'")]
pub struct UnknownCategory(pub String);

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Business,
        Category::Politics,
        Category::Entertainment,
        Category::Sports,
        Category::Technology,
        Category::Health,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Business => "Business",
            Category::Politics => "Politics",
            Category::Entertainment => "Entertainment",
            Category::Sports => "Sports",
            Category::Technology => "Technology",
            Category::Health => "Health",
        }
    }

    /// Value sent as the `category` query parameter
    pub fn query_value(&self) -> String {
        self.name().to_lowercase()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// What the headline screen asks for: every category, the saved list, or one
/// category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlineSelector {
    All,
    Saves,
    Category(Category),
}

impl FromStr for HeadlineSelector {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(HeadlineSelector::All),
            "saves" => Ok(HeadlineSelector::Saves),
            _ => s.parse().map(HeadlineSelector::Category),
        }
    }
}

/// A news article as the client displays and saves it.
///
/// Also accepts a raw headline item as the news API returns it: `source` may
/// be the `{id, name}` object and nullable text fields may be `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticleRecord {
    #[serde(deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub description: String,
    pub content: Option<String>,
    #[serde(rename = "urlToImage")]
    pub image_url: Option<String>,
    pub category: Option<String>,
    #[serde(deserialize_with = "source_name")]
    pub source: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// `"Wire"` or `{"id": ..., "name": "Wire"}`
#[derive(Deserialize)]
#[serde(untagged)]
enum SourceField {
    Name(String),
    Object(ApiSource),
}

fn source_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<SourceField>::deserialize(deserializer)? {
        Some(SourceField::Name(name)) => Some(name),
        Some(SourceField::Object(source)) => source.name,
        None => None,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeadlinesResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<ApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiArticle {
    source: Option<ApiSource>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<DateTime<Utc>>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiSource {
    name: Option<String>,
}

impl ApiArticle {
    fn into_record(self, category: Category) -> Option<ArticleRecord> {
        let title = self.title.unwrap_or_else(|| "Untitled".to_string());

        let url = match self.url {
            Some(url) if !url.trim().is_empty() => url,
            _ => {
                warn!("Skipping article with no link: {}", title);
                return None;
            }
        };

        Some(ArticleRecord {
            url,
            title,
            description: self.description.unwrap_or_default(),
            content: self.content,
            image_url: self.url_to_image,
            category: Some(category.name().to_string()),
            source: self.source.and_then(|s| s.name),
            author: self.author,
            published_at: self.published_at,
        })
    }
}

pub struct NewsClient {
    client: Client,
    base_url: String,
    api_key: String,
    categories: Vec<Category>,
}

impl NewsClient {
    pub fn new(config: &NewsConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("PulseNews/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            categories: config.categories.clone(),
        })
    }

    /// Top headlines for one category, in the order the API returns them.
    pub async fn fetch_category(&self, category: Category) -> Result<Vec<ArticleRecord>, FetchError> {
        info!("Fetching headlines for {}", category);

        let response = self
            .client
            .get(format!("{}/top-headlines", self.base_url))
            .query(&[("category", category.query_value())])
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        let body: HeadlinesResponse = match response.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => return Err(FetchError::Status(status)),
            Err(e) => return Err(e.into()),
        };

        if body.status != "ok" {
            return Err(FetchError::Api(
                body.message.unwrap_or_else(|| format!("status {}", status)),
            ));
        }
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let articles: Vec<ArticleRecord> = body
            .articles
            .into_iter()
            .filter_map(|a| a.into_record(category))
            .collect();

        info!("Fetched {} headlines for {}", articles.len(), category);
        Ok(articles)
    }

    /// Headlines for every configured category, fetched concurrently and
    /// concatenated in category order. One failed category fails the batch.
    pub async fn fetch_all(&self) -> Result<Vec<ArticleRecord>, FetchError> {
        let batches = try_join_all(self.categories.iter().map(|c| self.fetch_category(*c))).await?;
        Ok(batches.into_iter().flatten().collect())
    }
}
