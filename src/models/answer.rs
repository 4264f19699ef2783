use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One recorded answer. Identity is (duel_id, participant_id,
/// question_index); rows are immutable once written. A null `option_id`
/// records a timeout and is always incorrect.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DuelAnswer {
    pub duel_id: Uuid,
    pub participant_id: Uuid,
    pub question_index: i32,
    pub option_id: Option<Uuid>,
    pub is_correct: bool,
    pub time_spent_ms: i32,
    pub created_at: DateTime<Utc>,
}
