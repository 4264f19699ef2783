use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const WAITING: &str = "waiting";
pub const MATCHED: &str = "matched";

/// A queue slot. Whoever flips `status` from waiting to matched owns the
/// pairing and is responsible for creating the duel and writing `duel_id`
/// back so the waiting side can find it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchmakingEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub level: i32,
    pub status: String,
    pub matched_with: Option<Uuid>,
    pub duel_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
