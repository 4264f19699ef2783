mod common;

use duelground_backend::error::Error;
use duelground_backend::services::answer_service::{AnswerService, AnswerSubmission};
use duelground_backend::services::duel_service::DuelService;
use sqlx::Row;

#[tokio::test]
async fn scores_and_settles_three_question_duel() {
    let pool = common::setup_pool().await;
    let (quiz_id, questions) = common::seed_quiz(&pool, 3).await;
    let alice = common::seed_user(&pool, 5, 1000).await;
    let bob = common::seed_user(&pool, 5, 1000).await;

    let duels = DuelService::new(pool.clone());
    let answers = AnswerService::new(pool.clone(), None);
    let duel = duels
        .create_duel(alice, bob, quiz_id, "accepted", 3)
        .await
        .expect("create duel");

    // Alice: correct, correct, incorrect. Bob: correct, incorrect, incorrect.
    for (participant, picks) in [(alice, [true, true, false]), (bob, [true, false, false])] {
        for (index, correct) in picks.into_iter().enumerate() {
            let q = common::question_at(duel.id, &questions, index);
            let option_id = if correct {
                q.correct_option_id
            } else {
                q.wrong_option_id
            };
            let outcome = answers
                .submit(
                    duel.id,
                    participant,
                    AnswerSubmission {
                        question_index: index as i32,
                        option_id: Some(option_id),
                        time_spent_ms: 3000,
                    },
                )
                .await
                .expect("submit");
            assert_eq!(outcome.answer.is_correct, correct);
            assert!(!outcome.replayed);
        }
    }

    // The sixth answer was the last outstanding one; settlement fires.
    let settled = duels.get_duel(duel.id).await.unwrap();
    assert_eq!(settled.status, "completed");
    assert_eq!(settled.winner_id, Some(alice));

    let recorded = duels.get_answers(duel.id).await.unwrap();
    let point_value = duelground_backend::config::get_config().point_value;
    assert_eq!(
        duelground_backend::services::scoring_service::score_for(&recorded, alice, point_value),
        200
    );
    assert_eq!(
        duelground_backend::services::scoring_service::score_for(&recorded, bob, point_value),
        100
    );

    // Reward deltas applied exactly once: +50 winner, -20 loser.
    let alice_xp: i64 = sqlx::query(r#"SELECT xp FROM users WHERE id = $1"#)
        .bind(alice)
        .fetch_one(&pool)
        .await
        .unwrap()
        .try_get("xp")
        .unwrap();
    let bob_xp: i64 = sqlx::query(r#"SELECT xp FROM users WHERE id = $1"#)
        .bind(bob)
        .fetch_one(&pool)
        .await
        .unwrap()
        .try_get("xp")
        .unwrap();
    assert_eq!(alice_xp, 1050);
    assert_eq!(bob_xp, 980);

    // Retrying a recorded answer after settlement replays the stored
    // result; a dropped response to the final answer is the usual cause.
    let q = common::question_at(duel.id, &questions, 0);
    let retried = answers
        .submit(
            duel.id,
            alice,
            AnswerSubmission {
                question_index: 0,
                option_id: Some(q.wrong_option_id),
                time_spent_ms: 1000,
            },
        )
        .await
        .expect("recorded answers replay even on a completed duel");
    assert!(retried.replayed);
    assert!(retried.answer.is_correct);
    assert_eq!(retried.answer.option_id, Some(q.correct_option_id));
}

#[tokio::test]
async fn resubmission_replays_the_stored_answer() {
    let pool = common::setup_pool().await;
    let (quiz_id, questions) = common::seed_quiz(&pool, 3).await;
    let alice = common::seed_user(&pool, 5, 0).await;
    let bob = common::seed_user(&pool, 5, 0).await;

    let duels = DuelService::new(pool.clone());
    let answers = AnswerService::new(pool.clone(), None);
    let duel = duels
        .create_duel(alice, bob, quiz_id, "accepted", 3)
        .await
        .unwrap();

    let q = common::question_at(duel.id, &questions, 1);
    let first = answers
        .submit(
            duel.id,
            alice,
            AnswerSubmission {
                question_index: 1,
                option_id: Some(q.wrong_option_id),
                time_spent_ms: 2000,
            },
        )
        .await
        .unwrap();
    assert!(!first.answer.is_correct);
    assert!(!first.replayed);

    // Second submission with a different (correct!) option must not
    // re-evaluate: the stored result stands.
    let second = answers
        .submit(
            duel.id,
            alice,
            AnswerSubmission {
                question_index: 1,
                option_id: Some(q.correct_option_id),
                time_spent_ms: 50,
            },
        )
        .await
        .unwrap();
    assert!(second.replayed);
    assert!(!second.answer.is_correct);
    assert_eq!(second.answer.option_id, Some(q.wrong_option_id));
    assert_eq!(second.answer.time_spent_ms, first.answer.time_spent_ms);

    // And it did not double-count: one row, one potential score event.
    let recorded = duels.get_answers(duel.id).await.unwrap();
    assert_eq!(
        recorded
            .iter()
            .filter(|a| a.participant_id == alice && a.question_index == 1)
            .count(),
        1
    );
}

#[tokio::test]
async fn validator_rejects_bad_input() {
    let pool = common::setup_pool().await;
    let (quiz_id, questions) = common::seed_quiz(&pool, 3).await;
    let alice = common::seed_user(&pool, 5, 0).await;
    let bob = common::seed_user(&pool, 5, 0).await;
    let mallory = common::seed_user(&pool, 5, 0).await;

    let duels = DuelService::new(pool.clone());
    let answers = AnswerService::new(pool.clone(), None);
    let duel = duels
        .create_duel(alice, bob, quiz_id, "accepted", 3)
        .await
        .unwrap();

    // Non-participant.
    let q = common::question_at(duel.id, &questions, 0);
    let err = answers
        .submit(
            duel.id,
            mallory,
            AnswerSubmission {
                question_index: 0,
                option_id: Some(q.correct_option_id),
                time_spent_ms: 1000,
            },
        )
        .await
        .expect_err("non-participant");
    assert!(matches!(err, Error::Unauthorized(_)));

    // Index out of range.
    let err = answers
        .submit(
            duel.id,
            alice,
            AnswerSubmission {
                question_index: 7,
                option_id: None,
                time_spent_ms: 1000,
            },
        )
        .await
        .expect_err("index out of range");
    assert!(matches!(err, Error::BadRequest(_)));

    // Option from another question.
    let foreign = common::question_at(duel.id, &questions, 2);
    let err = answers
        .submit(
            duel.id,
            alice,
            AnswerSubmission {
                question_index: 0,
                option_id: Some(foreign.correct_option_id),
                time_spent_ms: 1000,
            },
        )
        .await
        .expect_err("foreign option");
    assert!(matches!(err, Error::BadRequest(_)));

    // Null option is accepted and always incorrect; absurd timing is
    // clamped, not rejected.
    let outcome = answers
        .submit(
            duel.id,
            alice,
            AnswerSubmission {
                question_index: 0,
                option_id: None,
                time_spent_ms: 10_000_000,
            },
        )
        .await
        .unwrap();
    assert!(!outcome.answer.is_correct);
    let config = duelground_backend::config::get_config();
    assert_eq!(outcome.answer.time_spent_ms, config.answer_max_time_ms);
}

#[tokio::test]
async fn challenge_lifecycle_enforces_roles_and_states() {
    let pool = common::setup_pool().await;
    let (quiz_id, _) = common::seed_quiz(&pool, 3).await;
    let alice = common::seed_user(&pool, 5, 0).await;
    let bob = common::seed_user(&pool, 5, 0).await;

    let duels = DuelService::new(pool.clone());
    let duel = duels
        .create_challenge(alice, bob, quiz_id)
        .await
        .expect("challenge");
    assert_eq!(duel.status, "pending");

    // Only the invitee may accept; only the sender may cancel.
    let err = duels.accept(duel.id, alice).await.expect_err("sender accept");
    assert!(matches!(err, Error::Unauthorized(_)));
    let err = duels.cancel(duel.id, bob).await.expect_err("invitee cancel");
    assert!(matches!(err, Error::Unauthorized(_)));

    let accepted = duels.accept(duel.id, bob).await.expect("accept");
    assert_eq!(accepted.status, "accepted");

    // Post-acceptance cancellation is a state conflict, not a silent no-op.
    let err = duels.cancel(duel.id, alice).await.expect_err("late cancel");
    assert!(matches!(err, Error::StateConflict { .. }));

    // Declining an accepted duel conflicts too.
    let err = duels.decline(duel.id, bob).await.expect_err("late decline");
    assert!(matches!(err, Error::StateConflict { .. }));

    // Self-challenge is rejected outright.
    let err = duels
        .create_challenge(alice, alice, quiz_id)
        .await
        .expect_err("self challenge");
    assert!(matches!(err, Error::BadRequest(_)));
}
