use crate::error::Result;
use crate::models::webhook_log::WebhookLog;
use reqwest::Client;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Outbound duel-event notifications. Events are queued in `webhook_logs`
/// and delivered by a background worker with bounded exponential retry.
/// Delivery is best-effort throughout; no caller depends on it succeeding.
#[derive(Clone)]
pub struct NotificationService {
    pool: PgPool,
    client: Client,
    target_url: Option<String>,
}

impl NotificationService {
    pub fn new(pool: PgPool, target_url: Option<String>) -> Self {
        Self {
            pool,
            client: Client::new(),
            target_url,
        }
    }

    pub async fn enqueue(&self, event_type: &str, payload: &JsonValue) -> Result<()> {
        let Some(target_url) = &self.target_url else {
            tracing::debug!(event_type, "no webhook target configured, skipping notification");
            return Ok(());
        };

        sqlx::query(
            r#"
            INSERT INTO webhook_logs (event_type, payload, target_url, status)
            VALUES ($1, $2, $3, 'pending')
            "#,
        )
        .bind(event_type)
        .bind(payload)
        .bind(target_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deliver_once(&self, log_id: Uuid) -> Result<()> {
        let log = sqlx::query_as::<_, WebhookLog>(r#"SELECT * FROM webhook_logs WHERE id = $1"#)
            .bind(log_id)
            .fetch_one(&self.pool)
            .await?;

        let res = self
            .client
            .post(&log.target_url)
            .json(&log.payload)
            .send()
            .await;
        match res {
            Ok(resp) => {
                let status = resp.status().as_u16() as i32;
                let body = resp.text().await.unwrap_or_default();
                sqlx::query(
                    r#"UPDATE webhook_logs
                       SET http_status = $1, response_body = $2,
                           status = CASE WHEN $1 BETWEEN 200 AND 299 THEN 'success' ELSE 'failed' END,
                           attempts = attempts + 1, updated_at = NOW()
                       WHERE id = $3"#,
                )
                .bind(status)
                .bind(body)
                .bind(log.id)
                .execute(&self.pool)
                .await?;
            }
            Err(err) => {
                sqlx::query(
                    r#"UPDATE webhook_logs
                       SET response_body = $1, status = 'failed',
                           attempts = attempts + 1, updated_at = NOW()
                       WHERE id = $2"#,
                )
                .bind(format!("{}", err))
                .bind(log.id)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    /// One worker step: pick the oldest due pending log, deliver it, and
    /// schedule a retry on failure. Returns false when the queue is empty.
    pub async fn run_once(&self) -> Result<bool> {
        let row_opt = sqlx::query(
            r#"SELECT id FROM webhook_logs
               WHERE status = 'pending' AND (next_retry_at IS NULL OR next_retry_at <= NOW())
               ORDER BY created_at ASC
               FOR UPDATE SKIP LOCKED
               LIMIT 1"#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row_opt else { return Ok(false) };
        let id: Uuid = row.try_get("id")?;

        let _ = self.deliver_once(id).await;

        let row2 = sqlx::query(
            r#"SELECT attempts, max_attempts, status FROM webhook_logs WHERE id = $1"#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        let attempts: i32 = row2.try_get("attempts")?;
        let max_attempts: i32 = row2.try_get("max_attempts")?;
        let status: String = row2.try_get("status")?;

        if status == "failed" && attempts < max_attempts {
            sqlx::query(
                r#"UPDATE webhook_logs
                   SET status = 'pending',
                       next_retry_at = NOW() + make_interval(secs => LEAST(3600, 30 * power(2::float, GREATEST(0, attempts - 1))::int))
                   WHERE id = $1"#,
            )
            .bind(id)
            .execute(&self.pool)
            .await?;
        }

        Ok(true)
    }
}
