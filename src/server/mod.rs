//! Axum HTTP API over `VotingService`.
//!
//! Provides:
//!   GET  /api/voting/poll-count            → {count}
//!   GET  /api/voting/poll/:id              → Poll, 404 if the id has no record
//!   GET  /api/voting/all-polls?windowed=   → PollCatalog
//!   GET  /api/voting/user-votes/:address   → {address, votedPolls}
//!   GET  /api/voting/poll-voters/:id       → PollVoters
//!   POST /api/voting/clear-cache           → {success, message}
//!   GET  /api/network/block-info           → ChainInfo
//!   GET  /api/network/balance/:address     → AccountBalance
//!   GET  /api/network/status               → NetworkStatus
//!   GET  /health

use crate::hiro::{ApiError, StacksApi};
use crate::service::VotingService;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("poll {0} not found")]
    NotFound(u128),
    #[error("invalid poll id `{0}`")]
    BadPollId(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Api(ApiError::Validation(_)) | AppError::BadPollId(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Api(ApiError::Transport(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Api(ApiError::Decode(_)) => StatusCode::BAD_GATEWAY,
            AppError::Api(ApiError::Upstream { status, .. }) => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AppError::Api(ApiError::Validation(_)) | AppError::BadPollId(_) => "Invalid request",
            AppError::NotFound(_) => "Not found",
            AppError::Api(ApiError::Transport(_)) => "Hiro API unreachable",
            AppError::Api(ApiError::Decode(_)) => "Malformed contract value",
            AppError::Api(ApiError::Upstream { .. }) => "Hiro API error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    details: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.label(),
            details: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub struct AppState<A> {
    pub service: Arc<VotingService<A>>,
}

impl<A> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CountResponse {
    count: u128,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserVotesResponse {
    address: String,
    voted_polls: Vec<u128>,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    success: bool,
    message: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct AllPollsQuery {
    #[serde(default)]
    pub windowed: bool,
}

fn parse_poll_id(raw: &str) -> Result<u128, AppError> {
    raw.parse::<u128>()
        .map_err(|_| AppError::BadPollId(raw.to_string()))
}

/// Build the Axum router.
pub fn build_router<A: StacksApi>(service: Arc<VotingService<A>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/voting/poll-count", get(poll_count::<A>))
        .route("/api/voting/poll/:id", get(poll::<A>))
        .route("/api/voting/all-polls", get(all_polls::<A>))
        .route("/api/voting/user-votes/:address", get(user_votes::<A>))
        .route("/api/voting/poll-voters/:id", get(poll_voters::<A>))
        .route("/api/voting/clear-cache", post(clear_cache::<A>))
        .route("/api/voting/block-info", get(block_info::<A>))
        .route("/api/network/block-info", get(block_info::<A>))
        .route("/api/network/balance/:address", get(balance::<A>))
        .route("/api/network/status", get(network_status::<A>))
        .with_state(AppState { service })
}

/// Serve until `shutdown` resolves.
pub async fn serve<A: StacksApi>(
    service: Arc<VotingService<A>>,
    bind_addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(service);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = bind_addr, "api listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// --- API Handlers ---

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn poll_count<A: StacksApi>(
    State(state): State<AppState<A>>,
) -> Result<impl IntoResponse, AppError> {
    let count = state.service.get_poll_count().await?;
    Ok(Json(CountResponse { count }))
}

async fn poll<A: StacksApi>(
    State(state): State<AppState<A>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let poll_id = parse_poll_id(&id)?;
    match state.service.get_poll(poll_id).await? {
        Some(poll) => Ok(Json(poll)),
        None => Err(AppError::NotFound(poll_id)),
    }
}

async fn all_polls<A: StacksApi>(
    State(state): State<AppState<A>>,
    Query(query): Query<AllPollsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let catalog = state.service.get_all_polls(query.windowed).await?;
    Ok(Json(catalog))
}

async fn user_votes<A: StacksApi>(
    State(state): State<AppState<A>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let voted = state.service.get_user_votes(&address).await?;
    Ok(Json(UserVotesResponse {
        address,
        voted_polls: voted.into_iter().collect(),
    }))
}

async fn poll_voters<A: StacksApi>(
    State(state): State<AppState<A>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let poll_id = parse_poll_id(&id)?;
    let voters = state.service.get_poll_voters(poll_id).await?;
    Ok(Json(voters))
}

async fn clear_cache<A: StacksApi>(State(state): State<AppState<A>>) -> impl IntoResponse {
    state.service.clear_cache();
    Json(MessageResponse {
        success: true,
        message: "Cache cleared",
    })
}

async fn block_info<A: StacksApi>(
    State(state): State<AppState<A>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.service.get_chain_info().await?))
}

async fn balance<A: StacksApi>(
    State(state): State<AppState<A>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.service.get_balance(&address).await?))
}

async fn network_status<A: StacksApi>(
    State(state): State<AppState<A>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.service.get_network_status().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (AppError::Api(ApiError::Validation("x".into())), 400),
            (AppError::BadPollId("abc".into()), 400),
            (AppError::NotFound(3), 404),
            (AppError::Api(ApiError::Transport("reset".into())), 503),
            (
                AppError::Api(ApiError::Upstream {
                    status: 429,
                    body: String::new(),
                }),
                429,
            ),
            (
                AppError::Api(ApiError::Upstream {
                    status: 200,
                    body: "NoSuchContract".into(),
                }),
                502,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status().as_u16(), expected, "{err}");
        }
    }

    #[test]
    fn test_parse_poll_id() {
        assert_eq!(parse_poll_id("12").unwrap(), 12);
        assert!(matches!(parse_poll_id("-1"), Err(AppError::BadPollId(_))));
        assert!(matches!(parse_poll_id("u3"), Err(AppError::BadPollId(_))));
    }
}
