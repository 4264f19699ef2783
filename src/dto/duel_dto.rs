use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::matchmaking_dto::OpponentInfo;
use crate::models::answer::DuelAnswer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChallengeRequest {
    pub opponent_id: Uuid,
    pub quiz_id: Uuid,
}

/// A question as shown to participants: sequence position, text and options.
/// The correct option never appears here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub index: i32,
    pub text: String,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionView {
    pub id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuelView {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub status: String,
    pub room_token: String,
    pub question_count: i32,
    pub opponent: OpponentInfo,
    pub winner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Present once play has started (in progress or completed).
    pub questions: Option<Vec<QuestionView>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(range(min = 0))]
    pub question_index: i32,
    pub option_id: Option<Uuid>,
    #[validate(range(min = 0))]
    pub time_spent_ms: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerResponse {
    pub question_index: i32,
    pub is_correct: bool,
    pub correct_option_id: Uuid,
    pub time_spent_ms: i32,
    /// True when this response is the idempotent replay of an earlier
    /// submission for the same question.
    pub replayed: bool,
}

/// One recorded answer as shown to a participant. `option_id` and
/// `is_correct` are null on opponent rows that are still redacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerView {
    pub participant_id: Uuid,
    pub question_index: i32,
    pub option_id: Option<Uuid>,
    pub is_correct: Option<bool>,
    pub time_spent_ms: i32,
    pub created_at: DateTime<Utc>,
}

impl From<DuelAnswer> for AnswerView {
    fn from(a: DuelAnswer) -> Self {
        Self {
            participant_id: a.participant_id,
            question_index: a.question_index,
            option_id: a.option_id,
            is_correct: Some(a.is_correct),
            time_spent_ms: a.time_spent_ms,
            created_at: a.created_at,
        }
    }
}

impl AnswerView {
    fn redacted(a: DuelAnswer) -> Self {
        Self {
            participant_id: a.participant_id,
            question_index: a.question_index,
            option_id: None,
            is_correct: None,
            time_spent_ms: a.time_spent_ms,
            created_at: a.created_at,
        }
    }
}

/// Builds the viewer's answer list. While the duel is live, an opponent row
/// for a question the viewer has not answered yet is redacted: a correct
/// opponent pick would disclose the correct option of a still-open question,
/// since both sides play the same sequence.
pub fn answer_views(answers: Vec<DuelAnswer>, viewer: Uuid, terminal: bool) -> Vec<AnswerView> {
    let answered: std::collections::HashSet<i32> = answers
        .iter()
        .filter(|a| a.participant_id == viewer)
        .map(|a| a.question_index)
        .collect();

    answers
        .into_iter()
        .map(|a| {
            let visible =
                terminal || a.participant_id == viewer || answered.contains(&a.question_index);
            if visible {
                AnswerView::from(a)
            } else {
                AnswerView::redacted(a)
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswersResponse {
    pub duel_id: Uuid,
    pub status: String,
    pub your_score: i32,
    pub opponent_score: i32,
    pub answers: Vec<AnswerView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn answer(participant: Uuid, index: i32, correct: bool) -> DuelAnswer {
        DuelAnswer {
            duel_id: Uuid::nil(),
            participant_id: participant,
            question_index: index,
            option_id: Some(Uuid::new_v4()),
            is_correct: correct,
            time_spent_ms: 1500,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn live_duel_redacts_opponent_rows_for_open_questions() {
        let viewer = Uuid::new_v4();
        let opponent = Uuid::new_v4();
        let answers = vec![
            answer(viewer, 0, true),
            answer(opponent, 0, true),
            answer(opponent, 1, true),
        ];

        let views = answer_views(answers, viewer, false);
        let at = |p: Uuid, i: i32| {
            views
                .iter()
                .find(|v| v.participant_id == p && v.question_index == i)
                .unwrap()
        };

        // Viewer rows are always complete.
        assert!(at(viewer, 0).is_correct.is_some());
        // Opponent row for a question the viewer has answered is visible.
        assert!(at(opponent, 0).is_correct.is_some());
        assert!(at(opponent, 0).option_id.is_some());
        // Opponent row for a still-open question reveals nothing.
        assert!(at(opponent, 1).is_correct.is_none());
        assert!(at(opponent, 1).option_id.is_none());
    }

    #[test]
    fn terminal_duel_reveals_every_row() {
        let viewer = Uuid::new_v4();
        let opponent = Uuid::new_v4();
        let answers = vec![answer(opponent, 0, true), answer(opponent, 1, false)];

        let views = answer_views(answers, viewer, true);
        assert!(views.iter().all(|v| v.is_correct.is_some()));
        assert!(views.iter().all(|v| v.option_id.is_some()));
    }
}
