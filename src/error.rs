use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Error encoding stored value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Article has no URL and cannot be saved")]
    MissingUrl,
}

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("You have already voted in this poll")]
    AlreadyVoted,

    #[error("Poll '{0}' not found")]
    NotFound(String),

    #[error("Option {index} is out of range for a poll with {len} options")]
    InvalidOption { index: usize, len: usize },

    #[error("Failed to record vote remotely: {0}")]
    RemoteWriteFailed(String),

    #[error("Poll store unavailable: {0}")]
    Remote(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {0}")]
    Status(reqwest::StatusCode),

    #[error("API error: {0}")]
    Api(String),
}
