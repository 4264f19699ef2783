use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn setup_pool() -> PgPool {
    dotenvy::dotenv().ok();
    std::env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    std::env::set_var("MATCH_POLL_INTERVAL_MS", "50");
    std::env::set_var("MATCH_POLL_ATTEMPTS", "4");
    std::env::set_var("MATCH_FRESHNESS_SECS", "60");
    std::env::set_var("ANSWER_RATE_LIMIT", "0");
    std::env::set_var("POINT_VALUE", "100");
    std::env::set_var("REWARD_WIN", "50");
    std::env::set_var("REWARD_LOSS", "20");
    let _ = duelground_backend::config::init_config();

    let pool = duelground_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");
    pool
}

pub async fn seed_user(pool: &PgPool, level: i32, xp: i64) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO users (id, username, display_name, level, xp, is_bot)
           VALUES ($1, $2, $3, $4, $5, FALSE)"#,
    )
    .bind(id)
    .bind(format!("user_{}", id.simple()))
    .bind("Test Player")
    .bind(level)
    .bind(xp)
    .execute(pool)
    .await
    .expect("seed user");
    id
}

pub struct SeededQuestion {
    pub id: Uuid,
    pub correct_option_id: Uuid,
    pub wrong_option_id: Uuid,
}

pub async fn seed_quiz(pool: &PgPool, question_count: usize) -> (Uuid, Vec<SeededQuestion>) {
    let quiz_id = Uuid::new_v4();
    sqlx::query(r#"INSERT INTO quizzes (id, title, is_active) VALUES ($1, $2, TRUE)"#)
        .bind(quiz_id)
        .bind("Seeded Quiz")
        .execute(pool)
        .await
        .expect("seed quiz");

    let mut questions = Vec::new();
    for position in 0..question_count {
        let question_id = Uuid::new_v4();
        let correct = Uuid::new_v4();
        let wrong = Uuid::new_v4();
        let options = json!([
            { "id": correct, "text": "right" },
            { "id": wrong, "text": "wrong" },
            { "id": Uuid::new_v4(), "text": "also wrong" },
        ]);
        sqlx::query(
            r#"INSERT INTO questions (id, quiz_id, position, text, options, correct_option_id)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(question_id)
        .bind(quiz_id)
        .bind(position as i32)
        .bind(format!("Question {}", position))
        .bind(options)
        .bind(correct)
        .execute(pool)
        .await
        .expect("seed question");
        questions.push(SeededQuestion {
            id: question_id,
            correct_option_id: correct,
            wrong_option_id: wrong,
        });
    }

    (quiz_id, questions)
}

/// Maps a sequence index to the seeded question shown there, mirroring what
/// any client would derive for the duel.
pub fn question_at<'a>(
    duel_id: Uuid,
    questions: &'a [SeededQuestion],
    index: usize,
) -> &'a SeededQuestion {
    let order = duelground_backend::services::sequencer::question_order(duel_id, questions.len());
    &questions[order[index]]
}
