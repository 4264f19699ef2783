use axum::{
    extract::State,
    response::{IntoResponse, Json, Response},
};

use crate::dto::matchmaking_dto::{MatchRequest, MatchResponse};
use crate::middleware::identity::Identity;
use crate::AppState;

#[axum::debug_handler]
pub async fn request_match(
    State(state): State<AppState>,
    Identity(user_id): Identity,
    Json(req): Json<MatchRequest>,
) -> crate::error::Result<Response> {
    let result = state.matchmaking.request_match(user_id, req.quiz_id).await?;
    let response = MatchResponse {
        duel_id: result.duel.id,
        room_token: result.duel.room_token,
        status: result.duel.status,
        question_count: result.duel.question_count,
        expires_at: result.duel.expires_at,
        opponent: result.opponent.into(),
    };
    Ok(Json(response).into_response())
}
