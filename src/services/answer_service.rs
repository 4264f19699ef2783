use crate::config::get_config;
use crate::error::{Error, Result};
use crate::middleware::rate_limit::KeyedRateLimiter;
use crate::models::answer::DuelAnswer;
use crate::models::duel::{self, Duel};
use crate::models::quiz::Question;
use crate::services::content_service::ContentService;
use crate::services::duel_service::DuelService;
use crate::services::notification_service::NotificationService;
use crate::services::scoring_service::ScoringService;
use crate::services::sequencer;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct AnswerSubmission {
    pub question_index: i32,
    pub option_id: Option<Uuid>,
    pub time_spent_ms: i32,
}

#[derive(Debug)]
pub struct AnswerOutcome {
    pub answer: DuelAnswer,
    pub correct_option_id: Uuid,
    /// True when this call served an already-recorded answer instead of
    /// recording a new one.
    pub replayed: bool,
}

pub fn clamp_time(ms: i32, min_ms: i32, max_ms: i32) -> i32 {
    ms.clamp(min_ms, max_ms)
}

/// Server-side answer validation. Clients supply nothing the server trusts:
/// correctness comes from the stored question, ordering from the sequencer,
/// and timing is clamped before storage.
#[derive(Clone)]
pub struct AnswerService {
    pool: PgPool,
    content: ContentService,
    duels: DuelService,
    scoring: ScoringService,
    notifications: NotificationService,
    limiter: Option<KeyedRateLimiter>,
}

impl AnswerService {
    pub fn new(pool: PgPool, limiter: Option<KeyedRateLimiter>) -> Self {
        let config = get_config();
        Self {
            content: ContentService::new(pool.clone()),
            duels: DuelService::new(pool.clone()),
            scoring: ScoringService::new(pool.clone()),
            notifications: NotificationService::new(
                pool.clone(),
                config.result_webhook_url.clone(),
            ),
            pool,
            limiter,
        }
    }

    pub async fn submit(
        &self,
        duel_id: Uuid,
        participant_id: Uuid,
        submission: AnswerSubmission,
    ) -> Result<AnswerOutcome> {
        let config = get_config();

        let found = self.duels.get_duel(duel_id).await?;
        if !found.is_participant(participant_id) {
            return Err(Error::Unauthorized(
                "Not a participant of this duel".to_string(),
            ));
        }

        if let Some(limiter) = &self.limiter {
            let key = format!("{}:{}", duel_id, participant_id);
            if let Err(retry_after_ms) = limiter.check(&key) {
                return Err(Error::RateLimited { retry_after_ms });
            }
        }

        if submission.question_index < 0 || submission.question_index >= found.question_count {
            return Err(Error::BadRequest(format!(
                "Question index {} out of range",
                submission.question_index
            )));
        }

        // Replay takes precedence over every state check: retrying a
        // recorded answer returns the stored result even after the duel has
        // settled. The common case is resubmitting the final answer whose
        // first delivery completed the duel.
        if let Some(stored) = self
            .stored_answer(duel_id, participant_id, submission.question_index)
            .await?
        {
            let question = self
                .sequenced_question(&found, submission.question_index as usize)
                .await?;
            tracing::debug!(
                duel_id = %duel_id,
                participant = %participant_id,
                question_index = submission.question_index,
                "idempotent answer replay"
            );
            return Ok(AnswerOutcome {
                answer: stored,
                correct_option_id: question.correct_option_id,
                replayed: true,
            });
        }

        // First answer starts the duel; if someone else already flipped it
        // the conditional update is a no-op.
        let found = if found.status == duel::ACCEPTED {
            self.duels.mark_in_progress(duel_id).await?;
            self.duels.get_duel(duel_id).await?
        } else {
            found
        };
        if found.status != duel::IN_PROGRESS {
            return Err(Error::StateConflict {
                current: found.status,
            });
        }

        let question = self
            .sequenced_question(&found, submission.question_index as usize)
            .await?;

        if let Some(option_id) = submission.option_id {
            if !question.has_option(option_id) {
                return Err(Error::BadRequest(
                    "Option does not belong to this question".to_string(),
                ));
            }
        }

        let time_spent_ms = clamp_time(
            submission.time_spent_ms,
            config.answer_min_time_ms,
            config.answer_max_time_ms,
        );

        // Soft anti-cheat: answering question N implies at least N minimum
        // answer windows have elapsed. Implausible timing is audited, never
        // rejected.
        let elapsed_ms = (Utc::now() - found.started_at()).num_milliseconds();
        let floor_ms = submission.question_index as i64 * config.answer_min_time_ms as i64;
        if elapsed_ms < floor_ms {
            tracing::warn!(
                duel_id = %duel_id,
                participant = %participant_id,
                question_index = submission.question_index,
                elapsed_ms,
                floor_ms,
                "implausibly fast answer submission"
            );
        }

        let is_correct = submission.option_id == Some(question.correct_option_id);

        // The insert carries its own liveness guard: between our status
        // check and here the duel may have been settled or expired, and no
        // answer row may exist for a terminal duel.
        let inserted = sqlx::query(
            r#"
            INSERT INTO duel_answers (
                duel_id, participant_id, question_index, option_id, is_correct, time_spent_ms
            )
            SELECT $1, $2, $3, $4, $5, $6
            WHERE EXISTS (SELECT 1 FROM duels WHERE id = $1 AND status = $7)
            ON CONFLICT (duel_id, participant_id, question_index) DO NOTHING
            "#,
        )
        .bind(duel_id)
        .bind(participant_id)
        .bind(submission.question_index)
        .bind(submission.option_id)
        .bind(is_correct)
        .bind(time_spent_ms)
        .bind(duel::IN_PROGRESS)
        .execute(&self.pool)
        .await?;

        // The stored row is canonical whether we just wrote it or a
        // concurrent duplicate did. Neither having written it means the
        // guard refused the row: the duel went terminal mid-flight.
        let stored = self
            .stored_answer(duel_id, participant_id, submission.question_index)
            .await?;

        let Some(stored) = stored else {
            let current = self.duels.get_duel(duel_id).await?;
            return Err(Error::StateConflict {
                current: current.status,
            });
        };

        let replayed = inserted.rows_affected() == 0;
        if replayed {
            tracing::debug!(
                duel_id = %duel_id,
                participant = %participant_id,
                question_index = submission.question_index,
                "idempotent answer replay"
            );
        } else {
            self.maybe_settle(&found).await?;
        }

        Ok(AnswerOutcome {
            answer: stored,
            correct_option_id: question.correct_option_id,
            replayed,
        })
    }

    async fn stored_answer(
        &self,
        duel_id: Uuid,
        participant_id: Uuid,
        question_index: i32,
    ) -> Result<Option<DuelAnswer>> {
        let stored = sqlx::query_as::<_, DuelAnswer>(
            r#"SELECT * FROM duel_answers
               WHERE duel_id = $1 AND participant_id = $2 AND question_index = $3"#,
        )
        .bind(duel_id)
        .bind(participant_id)
        .bind(question_index)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stored)
    }

    /// Resolves the question shown at `index` of this duel's sequence.
    async fn sequenced_question(&self, duel: &Duel, index: usize) -> Result<Question> {
        let questions = self.content.get_questions(duel.quiz_id).await?;
        if questions.len() != duel.question_count as usize {
            return Err(Error::Internal(format!(
                "Quiz {} question count changed mid-duel",
                duel.quiz_id
            )));
        }
        let order = sequencer::question_order(duel.id, questions.len());
        let original = order
            .get(index)
            .copied()
            .ok_or_else(|| Error::BadRequest("Question index out of range".to_string()))?;
        Ok(questions[original].clone())
    }

    async fn maybe_settle(&self, duel: &Duel) -> Result<()> {
        let total: i64 = sqlx::query(
            r#"SELECT COUNT(*) AS n FROM duel_answers WHERE duel_id = $1"#,
        )
        .bind(duel.id)
        .fetch_one(&self.pool)
        .await?
        .try_get("n")?;

        if total >= 2 * duel.question_count as i64 {
            self.scoring.settle(duel.id, &self.notifications).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::clamp_time;

    #[test]
    fn time_is_clamped_into_window() {
        assert_eq!(clamp_time(-5, 500, 30_000), 500);
        assert_eq!(clamp_time(0, 500, 30_000), 500);
        assert_eq!(clamp_time(1_250, 500, 30_000), 1_250);
        assert_eq!(clamp_time(120_000, 500, 30_000), 30_000);
    }
}
