pub mod duel;
pub mod health;
pub mod matchmaking;
