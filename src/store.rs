//! Per-device preferences kept in the key-value store: saved articles and
//! the ids of polls this device has voted in.
//!
//! Each collection is one JSON blob under a fixed key and is rewritten whole
//! on every change. Read-modify-write sequences hold the store's mutex, so a
//! store shared between request handlers behaves as a single writer.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::db::KeyValueStore;
use crate::error::StorageError;
use crate::news::ArticleRecord;

pub const SAVED_ARTICLES_KEY: &str = "savedNews";
pub const VOTED_POLLS_KEY: &str = "votedPolls";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub added: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveOutcome {
    pub removed: bool,
}

/// Load a JSON array blob. A missing or malformed blob reads as empty; only a
/// failing backend is an error.
async fn load_list<T: DeserializeOwned>(
    kv: &dyn KeyValueStore,
    key: &str,
) -> Result<Vec<T>, StorageError> {
    let Some(raw) = kv.get(key).await? else {
        return Ok(Vec::new());
    };

    match serde_json::from_str(&raw) {
        Ok(items) => Ok(items),
        Err(e) => {
            warn!("Discarding malformed blob under '{}': {}", key, e);
            Ok(Vec::new())
        }
    }
}

async fn store_list<T: Serialize>(
    kv: &dyn KeyValueStore,
    key: &str,
    items: &[T],
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(items)?;
    kv.set(key, &raw).await
}

pub struct SavedArticlesStore {
    kv: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
}

impl SavedArticlesStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            lock: Mutex::new(()),
        }
    }

    /// Saved articles in the order they were saved.
    pub async fn list(&self) -> Vec<ArticleRecord> {
        match load_list(self.kv.as_ref(), SAVED_ARTICLES_KEY).await {
            Ok(articles) => articles,
            Err(e) => {
                warn!("Failed to load saved articles: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn save(&self, article: ArticleRecord) -> Result<SaveOutcome, StorageError> {
        if article.url.trim().is_empty() {
            return Err(StorageError::MissingUrl);
        }

        let _guard = self.lock.lock().await;
        let mut articles: Vec<ArticleRecord> =
            load_list(self.kv.as_ref(), SAVED_ARTICLES_KEY).await?;

        if articles.iter().any(|a| a.url == article.url) {
            info!("Article already saved: {}", article.url);
            return Ok(SaveOutcome { added: false });
        }

        info!("Saving article: {}", article.url);
        articles.push(article);
        store_list(self.kv.as_ref(), SAVED_ARTICLES_KEY, &articles).await?;

        Ok(SaveOutcome { added: true })
    }

    pub async fn remove(&self, url: &str) -> Result<RemoveOutcome, StorageError> {
        let _guard = self.lock.lock().await;
        let articles: Vec<ArticleRecord> =
            load_list(self.kv.as_ref(), SAVED_ARTICLES_KEY).await?;

        let before = articles.len();
        let remaining: Vec<ArticleRecord> =
            articles.into_iter().filter(|a| a.url != url).collect();
        store_list(self.kv.as_ref(), SAVED_ARTICLES_KEY, &remaining).await?;

        Ok(RemoveOutcome {
            removed: remaining.len() < before,
        })
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        self.kv.remove(SAVED_ARTICLES_KEY).await
    }
}

pub struct VotedPollsStore {
    kv: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
}

impl VotedPollsStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            lock: Mutex::new(()),
        }
    }

    pub async fn voted(&self) -> Vec<String> {
        match load_list(self.kv.as_ref(), VOTED_POLLS_KEY).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to load voted polls: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn has_voted(&self, poll_id: &str) -> bool {
        self.voted().await.iter().any(|id| id == poll_id)
    }

    /// Like `has_voted`, but an unreadable backend is an error rather than
    /// "not voted". A malformed blob still reads as empty.
    pub async fn try_has_voted(&self, poll_id: &str) -> Result<bool, StorageError> {
        let ids: Vec<String> = load_list(self.kv.as_ref(), VOTED_POLLS_KEY).await?;
        Ok(ids.iter().any(|id| id == poll_id))
    }

    /// Append `poll_id` to the voted set. Does not check whether a vote is
    /// allowed; that is the coordinator's job.
    pub async fn record_vote(&self, poll_id: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut ids: Vec<String> = load_list(self.kv.as_ref(), VOTED_POLLS_KEY).await?;

        if ids.iter().any(|id| id == poll_id) {
            return Ok(());
        }

        ids.push(poll_id.to_string());
        store_list(self.kv.as_ref(), VOTED_POLLS_KEY, &ids).await
    }
}
