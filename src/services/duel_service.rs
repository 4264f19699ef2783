use crate::config::get_config;
use crate::error::{Error, Result};
use crate::models::answer::DuelAnswer;
use crate::models::duel::{self, Duel};
use crate::services::content_service::ContentService;
use crate::services::notification_service::NotificationService;
use crate::services::scoring_service::ScoringService;
use crate::utils::token::generate_room_token;
use chrono::{Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct DuelService {
    pool: PgPool,
    content: ContentService,
}

impl DuelService {
    pub fn new(pool: PgPool) -> Self {
        let content = ContentService::new(pool.clone());
        Self { pool, content }
    }

    /// Inserts a new duel. Matchmaking passes `accepted` (pairing implies
    /// mutual consent); direct challenges start out `pending`.
    pub async fn create_duel(
        &self,
        challenger_id: Uuid,
        opponent_id: Uuid,
        quiz_id: Uuid,
        status: &str,
        question_count: i32,
    ) -> Result<Duel> {
        let config = get_config();
        let now = Utc::now();
        let accepted_at = (status == duel::ACCEPTED).then_some(now);

        let created = sqlx::query_as::<_, Duel>(
            r#"
            INSERT INTO duels (
                challenger_id, opponent_id, quiz_id, status, room_token,
                question_count, reward_win, reward_loss, accepted_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(challenger_id)
        .bind(opponent_id)
        .bind(quiz_id)
        .bind(status)
        .bind(generate_room_token(24))
        .bind(question_count)
        .bind(config.reward_win)
        .bind(config.reward_loss)
        .bind(accepted_at)
        .bind(now + Duration::seconds(config.duel_ttl_secs))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            duel_id = %created.id,
            challenger = %challenger_id,
            opponent = %opponent_id,
            status,
            "duel created"
        );
        Ok(created)
    }

    pub async fn get_duel(&self, duel_id: Uuid) -> Result<Duel> {
        let found = sqlx::query_as::<_, Duel>(r#"SELECT * FROM duels WHERE id = $1"#)
            .bind(duel_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Duel not found".to_string()))?;
        Ok(found)
    }

    pub async fn create_challenge(
        &self,
        challenger_id: Uuid,
        opponent_id: Uuid,
        quiz_id: Uuid,
    ) -> Result<Duel> {
        if challenger_id == opponent_id {
            return Err(Error::BadRequest("Cannot challenge yourself".to_string()));
        }
        let opponent = sqlx::query_as::<_, crate::models::user::User>(
            r#"SELECT * FROM users WHERE id = $1"#,
        )
        .bind(opponent_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Opponent not found".to_string()))?;
        if opponent.is_bot {
            return Err(Error::NotFound("Opponent not found".to_string()));
        }

        self.content.get_active_quiz(quiz_id).await?;
        let questions = self.content.get_questions(quiz_id).await?;
        if questions.is_empty() {
            return Err(Error::BadRequest("Quiz has no questions".to_string()));
        }

        self.create_duel(
            challenger_id,
            opponent_id,
            quiz_id,
            duel::PENDING,
            questions.len() as i32,
        )
        .await
    }

    /// Transitions the duel between two lifecycle states. The update is
    /// conditioned on the expected prior status; losing that check surfaces
    /// the duel's actual status as a state conflict.
    async fn transition(&self, duel_id: Uuid, from: &str, to: &str) -> Result<Duel> {
        debug_assert!(duel::transition_allowed(from, to), "{} -> {}", from, to);
        let updated = sqlx::query_as::<_, Duel>(
            r#"
            UPDATE duels
            SET status = $1, accepted_at = CASE WHEN $1 = 'accepted' THEN NOW() ELSE accepted_at END
            WHERE id = $2 AND status = $3
            RETURNING *
            "#,
        )
        .bind(to)
        .bind(duel_id)
        .bind(from)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(d) => Ok(d),
            None => {
                let current = self.get_duel(duel_id).await?;
                Err(Error::StateConflict {
                    current: current.status,
                })
            }
        }
    }

    pub async fn accept(&self, duel_id: Uuid, user_id: Uuid) -> Result<Duel> {
        let found = self.get_duel(duel_id).await?;
        if found.opponent_id != user_id {
            return Err(Error::Unauthorized(
                "Only the invited player can accept".to_string(),
            ));
        }
        self.transition(duel_id, duel::PENDING, duel::ACCEPTED).await
    }

    pub async fn decline(&self, duel_id: Uuid, user_id: Uuid) -> Result<Duel> {
        let found = self.get_duel(duel_id).await?;
        if found.opponent_id != user_id {
            return Err(Error::Unauthorized(
                "Only the invited player can decline".to_string(),
            ));
        }
        self.transition(duel_id, duel::PENDING, duel::DECLINED).await
    }

    /// Cancellation is a sender-only, pre-acceptance operation. Once the
    /// opponent has accepted, the only exits are completion and expiry.
    pub async fn cancel(&self, duel_id: Uuid, user_id: Uuid) -> Result<Duel> {
        let found = self.get_duel(duel_id).await?;
        if found.challenger_id != user_id {
            return Err(Error::Unauthorized(
                "Only the challenger can cancel".to_string(),
            ));
        }
        self.transition(duel_id, duel::PENDING, duel::CANCELLED).await
    }

    /// First answer or first sequence fetch moves an accepted duel into
    /// progress. Racing callers are fine: one flips it, the rest observe
    /// the already-updated row.
    pub async fn mark_in_progress(&self, duel_id: Uuid) -> Result<()> {
        sqlx::query(r#"UPDATE duels SET status = $1 WHERE id = $2 AND status = $3"#)
            .bind(duel::IN_PROGRESS)
            .bind(duel_id)
            .bind(duel::ACCEPTED)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_answers(&self, duel_id: Uuid) -> Result<Vec<DuelAnswer>> {
        let answers = sqlx::query_as::<_, DuelAnswer>(
            r#"SELECT * FROM duel_answers
               WHERE duel_id = $1
               ORDER BY participant_id, question_index"#,
        )
        .bind(duel_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(answers)
    }

    /// Periodic sweep: past-due pending/accepted duels expire; past-due
    /// in-progress duels are settled with whatever answers were recorded.
    /// The settle path races the final-answer trigger safely.
    pub async fn sweep_expired(
        &self,
        scoring: &ScoringService,
        notifications: &NotificationService,
    ) -> Result<()> {
        let expired = sqlx::query(
            r#"
            UPDATE duels
            SET status = $1
            WHERE status IN ($2, $3) AND expires_at <= NOW()
            "#,
        )
        .bind(duel::EXPIRED)
        .bind(duel::PENDING)
        .bind(duel::ACCEPTED)
        .execute(&self.pool)
        .await?;
        if expired.rows_affected() > 0 {
            tracing::info!(count = expired.rows_affected(), "expired unstarted duels");
        }

        let overdue = sqlx::query(
            r#"SELECT id FROM duels WHERE status = $1 AND expires_at <= NOW()"#,
        )
        .bind(duel::IN_PROGRESS)
        .fetch_all(&self.pool)
        .await?;

        for row in overdue {
            let id: Uuid = row.try_get("id")?;
            if let Err(e) = scoring.settle(id, notifications).await {
                tracing::error!(duel_id = %id, error = ?e, "failed to settle overdue duel");
            }
        }

        Ok(())
    }
}
