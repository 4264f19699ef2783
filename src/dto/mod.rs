pub mod duel_dto;
pub mod matchmaking_dto;
