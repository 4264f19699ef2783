use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    pub quiz_id: Uuid,
}

/// Public opponent shape. Identical for real and simulated accounts; no
/// field reveals the difference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpponentInfo {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub level: i32,
}

impl From<User> for OpponentInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            level: user.level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResponse {
    pub duel_id: Uuid,
    pub room_token: String,
    pub status: String,
    pub question_count: i32,
    pub expires_at: DateTime<Utc>,
    pub opponent: OpponentInfo,
}
