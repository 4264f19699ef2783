use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const PENDING: &str = "pending";
pub const ACCEPTED: &str = "accepted";
pub const IN_PROGRESS: &str = "in_progress";
pub const COMPLETED: &str = "completed";
pub const EXPIRED: &str = "expired";
pub const DECLINED: &str = "declined";
pub const CANCELLED: &str = "cancelled";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Duel {
    pub id: Uuid,
    pub challenger_id: Uuid,
    pub opponent_id: Uuid,
    pub quiz_id: Uuid,
    pub status: String,
    pub room_token: String,
    pub question_count: i32,
    pub reward_win: i32,
    pub reward_loss: i32,
    pub winner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl Duel {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.challenger_id == user_id || self.opponent_id == user_id
    }

    pub fn other_participant(&self, user_id: Uuid) -> Uuid {
        if self.challenger_id == user_id {
            self.opponent_id
        } else {
            self.challenger_id
        }
    }

    pub fn is_terminal(&self) -> bool {
        is_terminal(&self.status)
    }

    /// The instant both sides agreed to play; plausibility timing is measured
    /// from here.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.accepted_at.unwrap_or(self.created_at)
    }
}

pub fn is_terminal(status: &str) -> bool {
    matches!(status, COMPLETED | EXPIRED | DECLINED | CANCELLED)
}

/// The allowed edges of the duel state machine. Everything not listed here is
/// a state conflict.
pub fn transition_allowed(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        (PENDING, ACCEPTED)
            | (PENDING, DECLINED)
            | (PENDING, EXPIRED)
            | (PENDING, CANCELLED)
            | (ACCEPTED, IN_PROGRESS)
            | (ACCEPTED, EXPIRED)
            | (ACCEPTED, CANCELLED)
            | (IN_PROGRESS, COMPLETED)
            | (IN_PROGRESS, EXPIRED)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [COMPLETED, EXPIRED, DECLINED, CANCELLED] {
            for to in [
                PENDING, ACCEPTED, IN_PROGRESS, COMPLETED, EXPIRED, DECLINED, CANCELLED,
            ] {
                assert!(!transition_allowed(from, to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn happy_path_edges_are_allowed() {
        assert!(transition_allowed(PENDING, ACCEPTED));
        assert!(transition_allowed(ACCEPTED, IN_PROGRESS));
        assert!(transition_allowed(IN_PROGRESS, COMPLETED));
    }

    #[test]
    fn in_progress_cannot_be_cancelled() {
        assert!(!transition_allowed(IN_PROGRESS, CANCELLED));
    }
}
