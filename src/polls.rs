use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::PollsConfig;
use crate::error::{FetchError, VoteError};
use crate::store::VotedPollsStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    #[serde(rename = "option")]
    pub label: String,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollAggregate {
    pub id: String,
    pub question: String,
    pub options: Vec<PollOption>,
}

impl PollAggregate {
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.votes).sum()
    }

    /// Copy of this poll with one more vote on `option_index`.
    pub fn with_vote(&self, option_index: usize) -> Result<PollAggregate, VoteError> {
        if option_index >= self.options.len() {
            return Err(VoteError::InvalidOption {
                index: option_index,
                len: self.options.len(),
            });
        }

        let mut updated = self.clone();
        let option = &mut updated.options[option_index];
        option.votes = option.votes.saturating_add(1);
        Ok(updated)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionView {
    pub label: String,
    pub votes: u64,
    pub percentage: f64,
}

/// A poll as the client renders it, including whether this device voted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollView {
    pub id: String,
    pub question: String,
    pub options: Vec<OptionView>,
    pub total_votes: u64,
    pub has_voted: bool,
}

impl PollView {
    pub fn new(poll: PollAggregate, has_voted: bool) -> Self {
        let total_votes = poll.total_votes();
        let options = poll
            .options
            .into_iter()
            .map(|o| {
                let percentage = if total_votes > 0 {
                    o.votes as f64 / total_votes as f64 * 100.0
                } else {
                    0.0
                };
                OptionView {
                    label: o.label,
                    votes: o.votes,
                    percentage,
                }
            })
            .collect();

        Self {
            id: poll.id,
            question: poll.question,
            options,
            total_votes,
            has_voted,
        }
    }
}

/// Remote document collection holding the poll aggregates.
#[async_trait]
pub trait PollRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<PollAggregate>, FetchError>;
    async fn get(&self, id: &str) -> Result<Option<PollAggregate>, FetchError>;
    async fn update_options(&self, id: &str, options: &[PollOption]) -> Result<(), FetchError>;
}

/// JSON document store reached over HTTP:
/// `GET {base}/{collection}`, `GET|PATCH {base}/{collection}/{id}`.
pub struct HttpPollRepository {
    client: Client,
    base_url: Url,
    collection: String,
}

/// Ids that would not name a single document once placed in a path segment.
fn is_valid_document_id(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".."
}

impl HttpPollRepository {
    pub fn new(config: &PollsConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("PulseNews/1.0")
            .build()?;

        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Poll store URL '{}' cannot be a base URL", config.base_url);
        }

        Ok(Self {
            client,
            base_url,
            collection: config.collection.clone(),
        })
    }

    /// `{base}/{collection}[/{id}]`, each segment percent-encoded.
    fn url(&self, id: Option<&str>) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| FetchError::Api(format!("invalid poll store URL {}", self.base_url)))?;
            segments.pop_if_empty().push(&self.collection);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl PollRepository for HttpPollRepository {
    async fn list_all(&self) -> Result<Vec<PollAggregate>, FetchError> {
        let response = self.client.get(self.url(None)?).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    async fn get(&self, id: &str) -> Result<Option<PollAggregate>, FetchError> {
        if !is_valid_document_id(id) {
            warn!("Ignoring lookup of invalid poll id '{}'", id);
            return Ok(None);
        }

        let response = self.client.get(self.url(Some(id))?).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(FetchError::Status(status)),
        }
    }

    async fn update_options(&self, id: &str, options: &[PollOption]) -> Result<(), FetchError> {
        if !is_valid_document_id(id) {
            return Err(FetchError::Api(format!("invalid poll id '{}'", id)));
        }

        let response = self
            .client
            .patch(self.url(Some(id))?)
            .json(&json!({ "options": options }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        Ok(())
    }
}

/// Applies votes to remote polls at most once per device.
///
/// The remote write always lands before the poll is recorded locally, so a
/// failed or timed-out write never locks the user out of voting. Votes are
/// serialized through one mutex.
pub struct VoteCoordinator {
    polls: Arc<dyn PollRepository>,
    voted: Arc<VotedPollsStore>,
    timeout: Duration,
    lock: Mutex<()>,
}

impl VoteCoordinator {
    pub fn new(polls: Arc<dyn PollRepository>, voted: Arc<VotedPollsStore>, timeout: Duration) -> Self {
        Self {
            polls,
            voted,
            timeout,
            lock: Mutex::new(()),
        }
    }

    async fn remote<T, F>(&self, call: F) -> Result<T, String>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("timed out after {:?}", self.timeout)),
        }
    }

    pub async fn polls(&self) -> Result<Vec<PollView>, VoteError> {
        let polls = self
            .remote(self.polls.list_all())
            .await
            .map_err(VoteError::Remote)?;
        let voted = self.voted.voted().await;

        Ok(polls
            .into_iter()
            .map(|p| {
                let has_voted = voted.contains(&p.id);
                PollView::new(p, has_voted)
            })
            .collect())
    }

    pub async fn vote(&self, poll_id: &str, option_index: usize) -> Result<PollAggregate, VoteError> {
        let _guard = self.lock.lock().await;

        // An unreadable local store must not let the vote through
        if self.voted.try_has_voted(poll_id).await? {
            info!("Rejecting repeat vote on poll '{}'", poll_id);
            return Err(VoteError::AlreadyVoted);
        }

        let poll = self
            .remote(self.polls.get(poll_id))
            .await
            .map_err(VoteError::Remote)?
            .ok_or_else(|| VoteError::NotFound(poll_id.to_string()))?;

        let updated = poll.with_vote(option_index)?;

        if let Err(e) = self
            .remote(self.polls.update_options(poll_id, &updated.options))
            .await
        {
            warn!("Vote on poll '{}' was not recorded remotely: {}", poll_id, e);
            return Err(VoteError::RemoteWriteFailed(e));
        }

        if let Err(e) = self.voted.record_vote(poll_id).await {
            error!("Vote on poll '{}' landed but could not be recorded locally: {}", poll_id, e);
            return Err(e.into());
        }

        info!("Recorded vote on poll '{}' option {}", poll_id, option_index);
        Ok(updated)
    }
}
