use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::{CompletedGame, LeaderboardRow, ParticipantId, ServiceError};

use crate::websocket::{websocket_handler, AppState};

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
const DEFAULT_HISTORY_LIMIT: usize = 20;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .route("/leaderboard", get(leaderboard))
        .route("/participants/{id}/games", get(participant_games))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<LeaderboardRow>>, ApiError> {
    let rows = state
        .coordinator
        .leaderboard()
        .top_n(page.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT))
        .await?;
    Ok(Json(rows))
}

async fn participant_games(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<CompletedGame>>, ApiError> {
    let participant_id = ParticipantId::new(id)?;
    let games = state
        .coordinator
        .history()
        .recent_for_participant(
            &participant_id,
            page.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
            page.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(games))
}

/// HTTP face of `ServiceError`.
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    reason: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };

        if !self.0.is_caller_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let message = if self.0.is_caller_error() {
            self.0.to_string()
        } else {
            "Service temporarily unavailable".to_string()
        };

        let body = Json(ErrorBody {
            reason: self.0.reason(),
            message,
        });

        (status, body).into_response()
    }
}
