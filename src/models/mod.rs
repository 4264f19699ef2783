pub mod answer;
pub mod duel;
pub mod matchmaking;
pub mod quiz;
pub mod user;
pub mod webhook_log;
