use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::{FetchError, StorageError, VoteError};
use crate::news::{ArticleRecord, HeadlineSelector, NewsClient, UnknownCategory};
use crate::polls::VoteCoordinator;
use crate::stocks::StockClient;
use crate::store::{SavedArticlesStore, VotedPollsStore};

pub struct AppState {
    pub saves: Arc<SavedArticlesStore>,
    pub voted: Arc<VotedPollsStore>,
    pub votes: Arc<VoteCoordinator>,
    pub news: Arc<NewsClient>,
    pub stocks: Arc<StockClient>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/news/:selector", get(news))
        .route(
            "/saves",
            get(list_saves).post(save_article).delete(remove_saved),
        )
        .route("/saves/all", delete(clear_saves))
        .route("/polls", get(list_polls))
        .route("/polls/voted", get(voted_polls))
        .route("/polls/:id/vote", post(vote))
        .route("/stocks", get(stocks))
        .with_state(state)
}

// Error responses carry a JSON `{"error": ...}` body
pub enum AppError {
    BadRequest(String),
    Storage(StorageError),
    Vote(VoteError),
    Fetch(FetchError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(StorageError::MissingUrl) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Vote(e) => match e {
                VoteError::AlreadyVoted => StatusCode::CONFLICT,
                VoteError::NotFound(_) => StatusCode::NOT_FOUND,
                VoteError::InvalidOption { .. } => StatusCode::BAD_REQUEST,
                VoteError::RemoteWriteFailed(_) | VoteError::Remote(_) => StatusCode::BAD_GATEWAY,
                VoteError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Fetch(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::BadRequest(message) => message.clone(),
            AppError::Storage(e) => e.to_string(),
            AppError::Vote(e) => e.to_string(),
            AppError::Fetch(e) => e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<VoteError> for AppError {
    fn from(err: VoteError) -> Self {
        AppError::Vote(err)
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError::Fetch(err)
    }
}

impl From<UnknownCategory> for AppError {
    fn from(err: UnknownCategory) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

// Route handlers
pub async fn health() -> impl IntoResponse {
    Html("OK")
}

pub async fn news(
    State(state): State<Arc<AppState>>,
    Path(selector): Path<String>,
) -> Result<Json<Vec<ArticleRecord>>, AppError> {
    let articles = match selector.parse::<HeadlineSelector>()? {
        HeadlineSelector::Saves => state.saves.list().await,
        HeadlineSelector::All => state.news.fetch_all().await?,
        HeadlineSelector::Category(category) => state.news.fetch_category(category).await?,
    };
    Ok(Json(articles))
}

pub async fn list_saves(State(state): State<Arc<AppState>>) -> Json<Vec<ArticleRecord>> {
    Json(state.saves.list().await)
}

pub async fn save_article(
    State(state): State<Arc<AppState>>,
    Json(article): Json<ArticleRecord>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.saves.save(article).await?;
    let status = if outcome.added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

#[derive(Deserialize)]
pub struct RemoveQuery {
    pub url: String,
}

pub async fn remove_saved(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RemoveQuery>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.saves.remove(&query.url).await?;
    Ok(Json(outcome))
}

pub async fn clear_saves(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    state.saves.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_polls(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let polls = state.votes.polls().await?;
    Ok(Json(polls))
}

pub async fn voted_polls(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.voted.voted().await)
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub option: usize,
}

pub async fn vote(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
    Json(request): Json<VoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let updated = state.votes.vote(&poll_id, request.option).await?;
    Ok(Json(updated))
}

pub async fn stocks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.stocks.fetch_markets().await)
}
