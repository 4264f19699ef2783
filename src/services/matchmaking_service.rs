use crate::config::get_config;
use crate::error::{Error, Result};
use crate::models::duel::{self, Duel};
use crate::models::matchmaking::{self, MatchmakingEntry};
use crate::models::user::User;
use crate::services::bot_service::BotService;
use crate::services::content_service::ContentService;
use crate::services::duel_service::DuelService;
use crate::services::ledger_service::LedgerService;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

/// Pairs a requester with an opponent. The contract is unconditional: every
/// call returns a duel, falling back to a standing simulated opponent when
/// no symmetric match appears within the poll budget. All race handling is
/// the conditional claim on the queue row; there is no lock anywhere.
#[derive(Clone)]
pub struct MatchmakingService {
    pool: PgPool,
    content: ContentService,
    duels: DuelService,
    ledger: LedgerService,
    bots: BotService,
}

#[derive(Debug)]
pub struct MatchResult {
    pub duel: Duel,
    pub opponent: User,
}

impl MatchmakingService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            content: ContentService::new(pool.clone()),
            duels: DuelService::new(pool.clone()),
            ledger: LedgerService::new(pool.clone()),
            bots: BotService::new(pool.clone()),
            pool,
        }
    }

    pub async fn request_match(&self, user_id: Uuid, quiz_id: Uuid) -> Result<MatchResult> {
        let config = get_config();

        self.content.get_active_quiz(quiz_id).await?;
        let questions = self.content.get_questions(quiz_id).await?;
        if questions.is_empty() {
            return Err(Error::BadRequest("Quiz has no questions".to_string()));
        }
        let question_count = questions.len() as i32;
        let requester = self.ledger.get_user(user_id).await?;

        // Someone may already be waiting for us.
        if let Some(result) = self.try_claim(&requester, quiz_id, question_count).await? {
            return Ok(result);
        }

        // Nobody to claim: take a queue slot and wait for a later requester
        // to claim us. Purge our own leftovers first so the partial unique
        // index never trips.
        self.purge_own_entries(user_id, quiz_id).await?;
        let entry = sqlx::query_as::<_, MatchmakingEntry>(
            r#"
            INSERT INTO matchmaking_entries (user_id, quiz_id, level, status)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(quiz_id)
        .bind(requester.level)
        .bind(matchmaking::WAITING)
        .fetch_one(&self.pool)
        .await?;

        for _ in 0..config.match_poll_attempts {
            tokio::time::sleep(Duration::from_millis(config.match_poll_interval_ms)).await;
            if let Some(result) = self.check_own_entry(entry.id, user_id).await? {
                return Ok(result);
            }
        }

        // Poll budget exhausted. Release our slot before the last-chance
        // claim, conditioned on it still being waiting: two boundary racers
        // must not each claim the other. Losing the release means somebody
        // claimed us in the meantime.
        let released = sqlx::query(
            r#"DELETE FROM matchmaking_entries WHERE id = $1 AND status = $2"#,
        )
        .bind(entry.id)
        .bind(matchmaking::WAITING)
        .execute(&self.pool)
        .await?;

        if released.rows_affected() == 0 {
            // Claimed at the boundary; give the claimant time to write the
            // duel id back.
            for _ in 0..config.match_poll_attempts.max(4) {
                if let Some(result) = self.check_own_entry(entry.id, user_id).await? {
                    return Ok(result);
                }
                tokio::time::sleep(Duration::from_millis(config.match_poll_interval_ms)).await;
            }
            tracing::warn!(entry_id = %entry.id, "claimant never produced a duel, falling back");
        } else if let Some(result) = self.try_claim(&requester, quiz_id, question_count).await? {
            return Ok(result);
        }

        self.purge_own_entries(user_id, quiz_id).await?;

        let bot = self.bots.standing_bot_for_level(requester.level).await?;
        let created = self
            .duels
            .create_duel(user_id, bot.id, quiz_id, duel::ACCEPTED, question_count)
            .await?;
        tracing::info!(
            duel_id = %created.id,
            requester = %user_id,
            "no symmetric match within budget, paired with standing opponent"
        );
        Ok(MatchResult {
            duel: created,
            opponent: bot,
        })
    }

    /// Steps 1-3: find the longest-waiting compatible entry and try to flip
    /// it waiting -> matched. A zero affected-row count means another
    /// requester won the race; that is not an error, just "nothing found".
    async fn try_claim(
        &self,
        requester: &User,
        quiz_id: Uuid,
        question_count: i32,
    ) -> Result<Option<MatchResult>> {
        let config = get_config();

        let candidate = sqlx::query_as::<_, MatchmakingEntry>(
            r#"
            SELECT e.*
            FROM matchmaking_entries e
            JOIN users u ON u.id = e.user_id
            WHERE e.quiz_id = $1
              AND e.status = $2
              AND e.user_id <> $3
              AND NOT u.is_bot
              AND e.level BETWEEN $4 AND $5
              AND e.created_at > NOW() - ($6::bigint * INTERVAL '1 second')
            ORDER BY e.created_at ASC
            LIMIT 1
            "#,
        )
        .bind(quiz_id)
        .bind(matchmaking::WAITING)
        .bind(requester.id)
        .bind(requester.level - config.match_level_range)
        .bind(requester.level + config.match_level_range)
        .bind(config.match_freshness_secs)
        .fetch_optional(&self.pool)
        .await?;

        let Some(candidate) = candidate else {
            return Ok(None);
        };

        let claimed = sqlx::query(
            r#"
            UPDATE matchmaking_entries
            SET status = $1, matched_with = $2
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(matchmaking::MATCHED)
        .bind(requester.id)
        .bind(candidate.id)
        .bind(matchmaking::WAITING)
        .execute(&self.pool)
        .await?;

        if claimed.rows_affected() == 0 {
            tracing::debug!(entry_id = %candidate.id, "lost matchmaking claim race");
            return Ok(None);
        }

        // The claim is won; the waiter polls for the duel id we write back.
        let created = self
            .duels
            .create_duel(
                candidate.user_id,
                requester.id,
                quiz_id,
                duel::ACCEPTED,
                question_count,
            )
            .await?;
        sqlx::query(r#"UPDATE matchmaking_entries SET duel_id = $1 WHERE id = $2"#)
            .bind(created.id)
            .bind(candidate.id)
            .execute(&self.pool)
            .await?;

        let opponent = self.ledger.get_user(candidate.user_id).await?;
        Ok(Some(MatchResult {
            duel: created,
            opponent,
        }))
    }

    /// Step 4 body: has a later requester claimed our entry? Once the duel
    /// id shows up we can resolve and release the slot.
    async fn check_own_entry(&self, entry_id: Uuid, user_id: Uuid) -> Result<Option<MatchResult>> {
        let entry = sqlx::query_as::<_, MatchmakingEntry>(
            r#"SELECT * FROM matchmaking_entries WHERE id = $1"#,
        )
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(entry) = entry else { return Ok(None) };
        if entry.status != matchmaking::MATCHED {
            return Ok(None);
        }
        let Some(duel_id) = entry.duel_id else {
            // Claimed, but the claimant has not written the duel back yet.
            return Ok(None);
        };

        let found = self.duels.get_duel(duel_id).await?;
        sqlx::query(r#"DELETE FROM matchmaking_entries WHERE id = $1"#)
            .bind(entry_id)
            .execute(&self.pool)
            .await?;

        let opponent = self.ledger.get_user(found.other_participant(user_id)).await?;
        Ok(Some(MatchResult {
            duel: found,
            opponent,
        }))
    }

    async fn purge_own_entries(&self, user_id: Uuid, quiz_id: Uuid) -> Result<()> {
        sqlx::query(r#"DELETE FROM matchmaking_entries WHERE user_id = $1 AND quiz_id = $2"#)
            .bind(user_id)
            .bind(quiz_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Called from the periodic sweep: drops queue rows whose owner never
    /// came back for them.
    pub async fn purge_abandoned(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"DELETE FROM matchmaking_entries WHERE created_at < NOW() - INTERVAL '1 hour'"#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
