use crate::config::get_config;
use crate::error::Result;
use crate::models::answer::DuelAnswer;
use crate::models::duel::{self, Duel};
use crate::services::ledger_service::LedgerService;
use crate::services::notification_service::NotificationService;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

/// Score is a pure function of the recorded answers: correct count times the
/// configured point value. Timing and submission order never enter into it.
pub fn score_for(answers: &[DuelAnswer], participant_id: Uuid, point_value: i32) -> i32 {
    let correct = answers
        .iter()
        .filter(|a| a.participant_id == participant_id && a.is_correct)
        .count();
    correct as i32 * point_value
}

#[derive(Clone)]
pub struct ScoringService {
    pool: PgPool,
    ledger: LedgerService,
}

impl ScoringService {
    pub fn new(pool: PgPool) -> Self {
        let ledger = LedgerService::new(pool.clone());
        Self { pool, ledger }
    }

    /// Completes and settles a duel. Safe to call from both completion
    /// triggers (final answer, expiry sweep): the conditional status flip
    /// admits exactly one caller, every other invocation is a no-op.
    ///
    /// Returns true if this call performed the settlement.
    pub async fn settle(&self, duel_id: Uuid, notifications: &NotificationService) -> Result<bool> {
        let current = sqlx::query_as::<_, Duel>(r#"SELECT * FROM duels WHERE id = $1"#)
            .bind(duel_id)
            .fetch_one(&self.pool)
            .await?;
        if current.is_terminal() {
            return Ok(false);
        }

        // Win the flip before reading a single answer. A final answer
        // racing us is either already on record (and counted below) or
        // refused by the answer insert's liveness guard; either way the
        // settled result agrees with the stored rows.
        let result = sqlx::query(
            r#"
            UPDATE duels
            SET status = $1, settled_at = NOW()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(duel::COMPLETED)
        .bind(duel_id)
        .bind(duel::IN_PROGRESS)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Lost the settlement race or the duel was already terminal.
            return Ok(false);
        }

        let answers = sqlx::query_as::<_, DuelAnswer>(
            r#"SELECT * FROM duel_answers WHERE duel_id = $1"#,
        )
        .bind(duel_id)
        .fetch_all(&self.pool)
        .await?;

        let point_value = get_config().point_value;
        let challenger_score = score_for(&answers, current.challenger_id, point_value);
        let opponent_score = score_for(&answers, current.opponent_id, point_value);

        let winner_id = match challenger_score.cmp(&opponent_score) {
            std::cmp::Ordering::Greater => Some(current.challenger_id),
            std::cmp::Ordering::Less => Some(current.opponent_id),
            std::cmp::Ordering::Equal => None,
        };

        sqlx::query(r#"UPDATE duels SET winner_id = $1 WHERE id = $2"#)
            .bind(winner_id)
            .bind(duel_id)
            .execute(&self.pool)
            .await?;

        if let Some(winner) = winner_id {
            let loser = current.other_participant(winner);
            self.ledger
                .apply_delta(winner, current.reward_win as i64)
                .await?;
            self.ledger
                .apply_delta(loser, -(current.reward_loss as i64))
                .await?;
        }

        tracing::info!(
            duel_id = %duel_id,
            challenger_score,
            opponent_score,
            winner = ?winner_id,
            "duel settled"
        );

        // Best-effort: a failed notification must never unwind a settlement.
        let payload = json!({
            "event": "duel_completed",
            "duel_id": duel_id,
            "challenger_id": current.challenger_id,
            "opponent_id": current.opponent_id,
            "challenger_score": challenger_score,
            "opponent_score": opponent_score,
            "winner_id": winner_id,
        });
        if let Err(e) = notifications.enqueue("duel_completed", &payload).await {
            tracing::warn!(duel_id = %duel_id, error = ?e, "failed to enqueue result notification");
        }

        Ok(true)
    }
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
            option_id: correct.then(Uuid::new_v4),
            is_correct: correct,
            time_spent_ms: 1000,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn score_is_correct_count_times_point_value() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let answers = vec![
            answer(a, 0, true),
            answer(a, 1, true),
            answer(a, 2, false),
            answer(b, 0, true),
            answer(b, 1, false),
            answer(b, 2, false),
        ];
        assert_eq!(score_for(&answers, a, 100), 200);
        assert_eq!(score_for(&answers, b, 100), 100);
    }

    #[test]
    fn score_ignores_order_and_timing() {
        let a = Uuid::new_v4();
        let mut answers = vec![
            answer(a, 2, true),
            answer(a, 0, false),
            answer(a, 1, true),
        ];
        let forward = score_for(&answers, a, 50);
        answers.reverse();
        assert_eq!(score_for(&answers, a, 50), forward);
        assert_eq!(forward, 100);
    }

    #[test]
    fn score_of_absent_participant_is_zero() {
        let answers = vec![answer(Uuid::new_v4(), 0, true)];
        assert_eq!(score_for(&answers, Uuid::new_v4(), 100), 0);
    }
}
