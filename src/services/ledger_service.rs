use crate::error::{Error, Result};
use crate::models::user::User;
use sqlx::PgPool;
use uuid::Uuid;

/// XP thresholds: level n requires n*n*100 total xp.
fn level_for_xp(xp: i64) -> i32 {
    let mut level = 1;
    while (level as i64 + 1).pow(2) * 100 <= xp.max(0) {
        level += 1;
    }
    level
}

#[derive(Clone)]
pub struct LedgerService {
    pool: PgPool,
}

impl LedgerService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
        let user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE id = $1"#)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;
        Ok(user)
    }

    /// Applies an xp delta atomically, flooring at zero, and recomputes the
    /// stored level from the new balance.
    pub async fn apply_delta(&self, user_id: Uuid, delta: i64) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET xp = GREATEST(0, xp + $1), updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(delta)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let level = level_for_xp(user.xp);
        if level != user.level {
            let user = sqlx::query_as::<_, User>(
                r#"UPDATE users SET level = $1, updated_at = NOW() WHERE id = $2 RETURNING *"#,
            )
            .bind(level)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
            return Ok(user);
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::level_for_xp;

    #[test]
    fn level_thresholds() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(399), 1);
        assert_eq!(level_for_xp(400), 2);
        assert_eq!(level_for_xp(900), 3);
        assert_eq!(level_for_xp(-50), 1);
    }
}
