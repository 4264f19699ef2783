pub mod answer_service;
pub mod bot_service;
pub mod content_service;
pub mod duel_service;
pub mod ledger_service;
pub mod matchmaking_service;
pub mod notification_service;
pub mod scoring_service;
pub mod sequencer;
