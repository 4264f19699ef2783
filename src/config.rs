use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    /// Where duel-result notifications are delivered. Unset means
    /// notifications are skipped entirely.
    pub result_webhook_url: Option<String>,
    pub public_rps: u32,

    // Matchmaking
    pub match_level_range: i32,
    pub match_freshness_secs: i64,
    pub match_poll_interval_ms: u64,
    pub match_poll_attempts: u32,

    // Duels & scoring
    pub duel_ttl_secs: i64,
    pub point_value: i32,
    pub reward_win: i32,
    pub reward_loss: i32,

    // Answer validation
    pub answer_min_time_ms: i32,
    pub answer_max_time_ms: i32,
    /// Submissions allowed per participant per duel per window. 0 disables
    /// throttling.
    pub answer_rate_limit: u32,
    pub answer_rate_window_secs: u64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            result_webhook_url: env::var("RESULT_WEBHOOK_URL").ok(),
            public_rps: get_env_parse_or("PUBLIC_RPS", 50)?,
            match_level_range: get_env_parse_or("MATCH_LEVEL_RANGE", 5)?,
            match_freshness_secs: get_env_parse_or("MATCH_FRESHNESS_SECS", 60)?,
            match_poll_interval_ms: get_env_parse_or("MATCH_POLL_INTERVAL_MS", 1000)?,
            match_poll_attempts: get_env_parse_or("MATCH_POLL_ATTEMPTS", 8)?,
            duel_ttl_secs: get_env_parse_or("DUEL_TTL_SECS", 600)?,
            point_value: get_env_parse_or("POINT_VALUE", 100)?,
            reward_win: get_env_parse_or("REWARD_WIN", 50)?,
            reward_loss: get_env_parse_or("REWARD_LOSS", 20)?,
            answer_min_time_ms: get_env_parse_or("ANSWER_MIN_TIME_MS", 500)?,
            answer_max_time_ms: get_env_parse_or("ANSWER_MAX_TIME_MS", 30_000)?,
            answer_rate_limit: get_env_parse_or("ANSWER_RATE_LIMIT", 10)?,
            answer_rate_window_secs: get_env_parse_or("ANSWER_RATE_WINDOW_SECS", 10)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
