use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::duel_dto::{
    answer_views, AnswersResponse, CreateChallengeRequest, DuelView, OptionView, QuestionView,
    SubmitAnswerRequest, SubmitAnswerResponse,
};
use crate::error::Error;
use crate::middleware::identity::Identity;
use crate::models::duel::{self, Duel};
use crate::services::answer_service::AnswerSubmission;
use crate::services::{scoring_service, sequencer};
use crate::AppState;

#[axum::debug_handler]
pub async fn create_challenge(
    State(state): State<AppState>,
    Identity(user_id): Identity,
    Json(req): Json<CreateChallengeRequest>,
) -> crate::error::Result<Response> {
    let created = state
        .duels
        .create_challenge(user_id, req.opponent_id, req.quiz_id)
        .await?;
    let view = duel_view(&state, created, user_id).await?;
    Ok(Json(view).into_response())
}

#[axum::debug_handler]
pub async fn get_duel(
    State(state): State<AppState>,
    Identity(user_id): Identity,
    Path(duel_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let mut found = state.duels.get_duel(duel_id).await?;
    if !found.is_participant(user_id) {
        return Err(Error::Unauthorized("Not a participant of this duel".to_string()));
    }

    // Fetching the duel view is the "first sequence fetch" trigger.
    if found.status == duel::ACCEPTED {
        state.duels.mark_in_progress(duel_id).await?;
        found = state.duels.get_duel(duel_id).await?;
    }

    let view = duel_view(&state, found, user_id).await?;
    Ok(Json(view).into_response())
}

#[axum::debug_handler]
pub async fn accept_duel(
    State(state): State<AppState>,
    Identity(user_id): Identity,
    Path(duel_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let updated = state.duels.accept(duel_id, user_id).await?;
    let view = duel_view(&state, updated, user_id).await?;
    Ok(Json(view).into_response())
}

#[axum::debug_handler]
pub async fn decline_duel(
    State(state): State<AppState>,
    Identity(user_id): Identity,
    Path(duel_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let updated = state.duels.decline(duel_id, user_id).await?;
    let view = duel_view(&state, updated, user_id).await?;
    Ok(Json(view).into_response())
}

#[axum::debug_handler]
pub async fn cancel_duel(
    State(state): State<AppState>,
    Identity(user_id): Identity,
    Path(duel_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let updated = state.duels.cancel(duel_id, user_id).await?;
    let view = duel_view(&state, updated, user_id).await?;
    Ok(Json(view).into_response())
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Identity(user_id): Identity,
    Path(duel_id): Path<Uuid>,
    Json(req): Json<SubmitAnswerRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let outcome = state
        .answers
        .submit(
            duel_id,
            user_id,
            AnswerSubmission {
                question_index: req.question_index,
                option_id: req.option_id,
                time_spent_ms: req.time_spent_ms,
            },
        )
        .await?;
    Ok(Json(SubmitAnswerResponse {
        question_index: outcome.answer.question_index,
        is_correct: outcome.answer.is_correct,
        correct_option_id: outcome.correct_option_id,
        time_spent_ms: outcome.answer.time_spent_ms,
        replayed: outcome.replayed,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn get_answers(
    State(state): State<AppState>,
    Identity(user_id): Identity,
    Path(duel_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let found = state.duels.get_duel(duel_id).await?;
    if !found.is_participant(user_id) {
        return Err(Error::Unauthorized("Not a participant of this duel".to_string()));
    }

    let answers = state.duels.get_answers(duel_id).await?;
    let point_value = crate::config::get_config().point_value;
    let your_score = scoring_service::score_for(&answers, user_id, point_value);
    let opponent_score =
        scoring_service::score_for(&answers, found.other_participant(user_id), point_value);

    let terminal = found.is_terminal();
    Ok(Json(AnswersResponse {
        duel_id,
        status: found.status,
        your_score,
        opponent_score,
        answers: answer_views(answers, user_id, terminal),
    })
    .into_response())
}

/// Builds the participant view: opponent display info plus, once play has
/// begun, the sequenced (and sanitized) question list. Acceptance alone does
/// not reveal questions; the first duel fetch starts play and serves them.
async fn duel_view(state: &AppState, found: Duel, user_id: Uuid) -> crate::error::Result<DuelView> {
    let opponent = state
        .ledger
        .get_user(found.other_participant(user_id))
        .await?;

    let questions = match found.status.as_str() {
        duel::IN_PROGRESS | duel::COMPLETED => {
            let stored = state.content.get_questions(found.quiz_id).await?;
            let order = sequencer::question_order(found.id, stored.len());
            Some(
                order
                    .iter()
                    .enumerate()
                    .map(|(index, &original)| {
                        let q = &stored[original];
                        QuestionView {
                            index: index as i32,
                            text: q.text.clone(),
                            options: q
                                .parsed_options()
                                .into_iter()
                                .map(|o| OptionView {
                                    id: o.id,
                                    text: o.text,
                                })
                                .collect(),
                        }
                    })
                    .collect(),
            )
        }
        _ => None,
    };

    Ok(DuelView {
        id: found.id,
        quiz_id: found.quiz_id,
        status: found.status,
        room_token: found.room_token,
        question_count: found.question_count,
        opponent: opponent.into(),
        winner_id: found.winner_id,
        created_at: found.created_at,
        expires_at: found.expires_at,
        questions,
    })
}
