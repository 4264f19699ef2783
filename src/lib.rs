pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::middleware::rate_limit::KeyedRateLimiter;
use crate::services::{
    answer_service::AnswerService, bot_service::BotService, content_service::ContentService,
    duel_service::DuelService, ledger_service::LedgerService,
    matchmaking_service::MatchmakingService, notification_service::NotificationService,
    scoring_service::ScoringService,
};
use sqlx::PgPool;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub matchmaking: MatchmakingService,
    pub duels: DuelService,
    pub answers: AnswerService,
    pub content: ContentService,
    pub ledger: LedgerService,
    pub scoring: ScoringService,
    pub bots: BotService,
    pub notifications: NotificationService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();

        let limiter = (config.answer_rate_limit > 0).then(|| {
            KeyedRateLimiter::new(
                config.answer_rate_limit,
                Duration::from_secs(config.answer_rate_window_secs),
            )
        });

        Self {
            matchmaking: MatchmakingService::new(pool.clone()),
            duels: DuelService::new(pool.clone()),
            answers: AnswerService::new(pool.clone(), limiter),
            content: ContentService::new(pool.clone()),
            ledger: LedgerService::new(pool.clone()),
            scoring: ScoringService::new(pool.clone()),
            bots: BotService::new(pool.clone()),
            notifications: NotificationService::new(
                pool.clone(),
                config.result_webhook_url.clone(),
            ),
            pool,
        }
    }
}
