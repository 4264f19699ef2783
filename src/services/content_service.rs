use crate::error::{Error, Result};
use crate::models::quiz::{Question, Quiz};
use sqlx::PgPool;
use uuid::Uuid;

/// Read-only access to quiz content. Question order here is the authored
/// order; per-duel shuffling happens in the sequencer.
#[derive(Clone)]
pub struct ContentService {
    pool: PgPool,
}

impl ContentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_active_quiz(&self, quiz_id: Uuid) -> Result<Quiz> {
        let quiz = sqlx::query_as::<_, Quiz>(
            r#"SELECT id, title, is_active FROM quizzes WHERE id = $1"#,
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Quiz not found".to_string()))?;

        if !quiz.is_active {
            return Err(Error::BadRequest("Quiz is not active".to_string()));
        }
        Ok(quiz)
    }

    pub async fn get_questions(&self, quiz_id: Uuid) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(
            r#"SELECT id, quiz_id, position, text, options, correct_option_id
               FROM questions WHERE quiz_id = $1 ORDER BY position ASC"#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }
}
