use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub is_active: bool,
}

/// One quiz question as stored. `options` is a JSONB array of
/// `QuestionOption`; `correct_option_id` never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub position: i32,
    pub text: String,
    pub options: serde_json::Value,
    pub correct_option_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: Uuid,
    pub text: String,
}

impl Question {
    pub fn parsed_options(&self) -> Vec<QuestionOption> {
        serde_json::from_value(self.options.clone()).unwrap_or_default()
    }

    pub fn has_option(&self, option_id: Uuid) -> bool {
        self.parsed_options().iter().any(|o| o.id == option_id)
    }
}
